use crate::ports::email::{Email, EmailPort, Error};
use std::sync::{Arc, Mutex, PoisonError};

/// Keeps every sent email in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MemoryOutbox {
    pub fn sent(&self) -> Result<Vec<Email>, Error> {
        Ok(self.sent.lock()?.clone())
    }
}

#[async_trait::async_trait]
impl EmailPort for MemoryOutbox {
    async fn send_mail(&self, emails: Vec<Email>) -> Result<(), Error> {
        for email in &emails {
            tracing::info!(to = %email.email_to, subject = %email.subject, "sending email");
        }
        self.sent.lock()?.extend(emails);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
