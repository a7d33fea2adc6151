/// Outgoing mail delivery
#[mockall::automock]
#[async_trait::async_trait]
pub trait EmailPort {
    async fn send_mail(&self, emails: Vec<Email>) -> Result<(), Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub email_from: String,
    pub email_to: String,
    pub name_to: String,
    pub subject: String,
    /// HTML body
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
