//! Policy sources.
//!
//! A [`PolicySource`] produces a [`PolicyDocument`] on demand. The store and
//! the reload service only ever see this trait; files, databases or remote
//! services plug in behind it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PolicySourceError;
use crate::policy::document::PolicyDocument;

/// A provider of raw policy entries.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Load the current policy document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicySourceError::Unavailable`] when the backing store
    /// cannot be reached (retried by the reload service) and
    /// [`PolicySourceError::Malformed`] when its content cannot be parsed.
    async fn load(&self) -> Result<PolicyDocument, PolicySourceError>;
}

#[async_trait]
impl<T: PolicySource + ?Sized> PolicySource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn load(&self) -> Result<PolicyDocument, PolicySourceError> {
        (**self).load().await
    }
}

/// An in-memory source whose document can be replaced at runtime.
pub struct StaticPolicySource {
    name: String,
    document: RwLock<PolicyDocument>,
}

impl StaticPolicySource {
    /// Create a source serving `document`.
    #[must_use]
    pub fn new(document: PolicyDocument) -> Self {
        Self {
            name: "static".to_string(),
            document: RwLock::new(document),
        }
    }

    /// Set the name reported in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the served document. Takes effect on the next load.
    pub async fn replace(&self, document: PolicyDocument) {
        *self.document.write().await = document;
    }
}

#[async_trait]
impl PolicySource for StaticPolicySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<PolicyDocument, PolicySourceError> {
        Ok(self.document.read().await.clone())
    }
}
