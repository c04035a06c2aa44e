//! Entry point resolution

use tracing::info;

use crate::error::{Error, Result};

use super::ClosureDescription;

/// Module used when the closure does not name one
pub const DEFAULT_MODULE: &str = "index";

/// Resolved module and handler of a closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub module: String,
    pub handler: String,
}

impl EntryPoint {
    /// Derive the entry point from a closure description
    ///
    /// `pkg.sub.Handler` splits at the last dot. An empty or absent
    /// entrypoint falls back to the `index` module with the closure name as
    /// handler.
    pub fn resolve(description: &ClosureDescription) -> Result<Self> {
        match description.entrypoint.as_deref() {
            Some(entrypoint) if !entrypoint.is_empty() => {
                let (module, handler) = entrypoint
                    .rsplit_once('.')
                    .ok_or_else(|| Error::InvalidEntrypoint {
                        entrypoint: entrypoint.to_string(),
                    })?;
                Ok(Self {
                    module: module.to_string(),
                    handler: handler.to_string(),
                })
            }
            Some(_) => Ok(Self::fallback(description)),
            None => {
                info!(
                    handler = %description.name,
                    "Entrypoint is empty. Will use closure name for a handler name"
                );
                Ok(Self::fallback(description))
            }
        }
    }

    fn fallback(description: &ClosureDescription) -> Self {
        Self {
            module: DEFAULT_MODULE.to_string(),
            handler: description.name.clone(),
        }
    }

    /// File name of the materialized module
    pub fn source_file(&self, extension: &str) -> String {
        format!("{}.{}", self.module, extension)
    }
}
