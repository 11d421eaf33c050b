use crate::domain_port::*;
use crate::logger::*;

/// Writes outgoing mail to the log instead of delivering it.
///
/// The body carries one-time codes, so it is only emitted at `trace`.
pub struct LogMailSender {
    from: String,
}

impl LogMailSender {
    pub fn new(from: impl Into<String>) -> Self {
        LogMailSender { from: from.into() }
    }
}

#[async_trait::async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if mail.to.is_empty() {
            return Err(MailError::Delivery("no recipient".into()));
        }
        info!(from = %self.from, subject = %mail.subject, "mail queued");
        trace!(to = %mail.to, html = %mail.html, "mail body");
        Ok(())
    }
}
