//! Composer configuration.
//!
//! Defaults reproduce the wire output table clients have always sent:
//! unprefixed parameter names, `+08:00` appended to `dateTime` filters and a
//! page size cap of 1000.
//!
//! # Example
//! ```rust,no_run
//! use table_odata::ComposerConfig;
//!
//! // Defaults, then `table-odata.yaml`, then `TABLE_ODATA_*` variables.
//! let config = ComposerConfig::load(Some("table-odata.yaml".as_ref())).unwrap();
//! ```

use std::path::Path;

use chrono::FixedOffset;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How query parameter names are written on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamNaming {
    /// `count`, `top`, `skip`, `filter`, `orderby`, `expand`
    #[default]
    Plain,
    /// `$count`, `$top`, ... as in the `OData` v4 URL conventions
    Dollar,
}

impl ParamNaming {
    #[must_use]
    pub fn key(self, name: &str) -> String {
        match self {
            ParamNaming::Plain => name.to_owned(),
            ParamNaming::Dollar => format!("${name}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposerConfig {
    /// UTC offset appended to `dateTime` filter values (default: `+08:00`)
    pub datetime_offset: String,
    /// Parameter naming on the wire (default: plain)
    pub param_naming: ParamNaming,
    /// Largest accepted page size (default: 1000)
    pub max_page_size: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            datetime_offset: Self::DEFAULT_DATETIME_OFFSET.to_owned(),
            param_naming: ParamNaming::Plain,
            max_page_size: 1000,
        }
    }
}

impl ComposerConfig {
    /// Prefix for environment overrides, e.g. `TABLE_ODATA_MAX_PAGE_SIZE`.
    pub const ENV_PREFIX: &'static str = "TABLE_ODATA_";
    pub const DEFAULT_DATETIME_OFFSET: &'static str = "+08:00";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_datetime_offset(mut self, offset: impl Into<String>) -> Self {
        self.datetime_offset = offset.into();
        self
    }

    #[must_use]
    pub fn with_param_naming(mut self, naming: ParamNaming) -> Self {
        self.param_naming = naming;
        self
    }

    #[must_use]
    pub fn with_max_page_size(mut self, max: u64) -> Self {
        self.max_page_size = max;
        self
    }

    /// Extract and validate configuration from a figment.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Layer defaults, an optional YAML file and `TABLE_ODATA_*` variables.
    ///
    /// A missing file is treated as empty.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if a layer cannot be parsed or the
    /// merged configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(Self::ENV_PREFIX));
        Self::from_figment(&figment)
    }

    /// # Errors
    /// Returns `Error::InvalidConfig` for a malformed offset or a zero page size cap.
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(Error::InvalidConfig(
                "max_page_size must be at least 1".to_owned(),
            ));
        }
        self.utc_offset()?;
        Ok(())
    }

    /// Parse `datetime_offset`. Accepts `Z`, `+HH:MM`, `-HH:MM` and `+HHMM`.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the offset is malformed or out of range.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.datetime_offset)
    }

    /// The offset normalized to `+HH:MM` or `-HH:MM`, ready to append to a timestamp.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the offset is malformed.
    pub fn offset_suffix(&self) -> Result<String> {
        Ok(self.utc_offset()?.to_string())
    }
}

fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let invalid = || Error::InvalidConfig(format!("invalid datetime_offset `{raw}`"));

    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }
    // chrono stops at the offset and ignores whatever follows it.
    if !raw.bytes().skip(1).all(|b| b.is_ascii_digit() || b == b':') {
        return Err(invalid());
    }
    raw.parse::<FixedOffset>().map_err(|_| invalid())
}
