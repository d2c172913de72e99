use async_trait::async_trait;
use tracing::info;

use crate::common::errors::Result;
use crate::common::traits::Notifier;
use crate::common::types::UserId;

/// Notifier that only writes deliveries to the log
///
/// Used when no bot token is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, user: UserId, message: &str) -> Result<()> {
        info!(user, "Notification: {}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_delivers() {
        assert!(LogNotifier.deliver(1, "hello").await.is_ok());
    }
}
