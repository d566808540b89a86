use async_trait::async_trait;
use tuma_core::repository::Mailer;
use tuma_core::Result;

/// Mailer that logs instead of sending. Outbound email transport is an
/// external collaborator; this stands in for it in development and tests.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to, subject, body_len = body.len(), "email dispatched");
        Ok(())
    }
}
