//! File-backed policy source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use strata_authz::{PolicyDocument, PolicySource, PolicySourceError};

use crate::error::{PolicyFileError, Result};
use crate::parser::{parse_ini, parse_toml};

/// Policy file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    /// `[groups]` / `[roles]` / `[users]` INI.
    Ini,
    /// The same sections as TOML tables of arrays.
    Toml,
}

impl PolicyFormat {
    /// Pick the format from the file extension: `.toml` is TOML, anything
    /// else is INI.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Ini,
        }
    }

    /// Parse `text` in this format.
    ///
    /// # Errors
    ///
    /// Returns the parser's [`PolicyFileError`].
    pub fn parse(self, text: &str) -> Result<PolicyDocument> {
        match self {
            Self::Ini => parse_ini(text),
            Self::Toml => parse_toml(text),
        }
    }
}

/// Reads a policy file on every load.
#[derive(Debug, Clone)]
pub struct FilePolicySource {
    path: PathBuf,
    format: PolicyFormat,
    name: String,
}

impl FilePolicySource {
    /// Create a source for `path`, with the format taken from its extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = PolicyFormat::from_path(&path);
        let name = path.display().to_string();
        Self { path, format, name }
    }

    /// Override the format.
    #[must_use]
    pub fn with_format(mut self, format: PolicyFormat) -> Self {
        self.format = format;
        self
    }

    /// Path of the policy file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format used to parse the file.
    #[must_use]
    pub fn format(&self) -> PolicyFormat {
        self.format
    }

    /// Read and parse the file.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyFileError::Io`] if the file cannot be read and a parse
    /// error if its content is invalid.
    pub async fn read(&self) -> Result<PolicyDocument> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| PolicyFileError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.format.parse(&text)
    }
}

#[async_trait]
impl PolicySource for FilePolicySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> std::result::Result<PolicyDocument, PolicySourceError> {
        let document = self
            .read()
            .await
            .map_err(|e| e.into_source_error(&self.name))?;
        tracing::debug!(path = %self.path.display(), "Policy file loaded");
        Ok(document)
    }
}
