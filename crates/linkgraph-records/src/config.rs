use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, RecordResult};
use crate::schema::Schema;

/// Paging limits for reverse queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Page size when the caller does not ask for one.
    pub default_page_size: usize,
    /// Upper bound on any requested page size.
    pub max_page_size: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

impl PagingConfig {
    /// Effective page size for a request.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }
}

/// Configuration for a record graph: the schema plus operational knobs.
///
/// In TOML the entity declarations sit at the top level:
///
/// ```toml
/// require_live_targets = true
///
/// [paging]
/// default_page_size = 50
///
/// [entities.economic_event.fields.inputOf]
/// kind = "link"
/// target = "process"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(flatten)]
    pub schema: Schema,
    #[serde(default)]
    pub paging: PagingConfig,
    /// Refuse writes that add a link to an absent or tombstoned record, or
    /// to a record of the wrong type.
    #[serde(default = "default_require_live_targets")]
    pub require_live_targets: bool,
}

fn default_require_live_targets() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            schema: Schema::default(),
            paging: PagingConfig::default(),
            require_live_targets: default_require_live_targets(),
        }
    }
}

impl GraphConfig {
    /// A configuration with default knobs around `schema`.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Default::default()
        }
    }

    /// Parse and check a TOML configuration.
    pub fn from_toml_str(text: &str) -> RecordResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RecordError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Read, parse, and check a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> RecordResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecordError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check the schema and the paging limits.
    pub fn check(&self) -> RecordResult<()> {
        self.schema
            .check()
            .map_err(|e| RecordError::Config(e.to_string()))?;
        if self.paging.max_page_size == 0 {
            return Err(RecordError::Config("paging.max_page_size must be positive".into()));
        }
        if self.paging.default_page_size > self.paging.max_page_size {
            return Err(RecordError::Config(
                "paging.default_page_size exceeds paging.max_page_size".into(),
            ));
        }
        Ok(())
    }
}
