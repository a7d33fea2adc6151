use crate::domain::Topic;

/// Third-party spam classification
#[mockall::automock]
#[async_trait::async_trait]
pub trait SpamPort {
    /// Whether a new topic with its starter content looks like spam
    async fn is_spam(&self, topic: &Topic, content: &str) -> Result<bool, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter, such as the classification
    /// service being unreachable.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
