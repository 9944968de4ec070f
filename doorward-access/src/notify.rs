//! Post-grant notification hooks.
//!
//! The push integration is inert: only the extension point and a
//! tracing-backed stand-in exist.

use async_trait::async_trait;
use tracing::info;

use doorward_core::error::Result;
use doorward_core::traits::Notifier;
use doorward_core::types::GrantMatch;

/// Does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _grant: &GrantMatch) -> Result<()> {
        Ok(())
    }
}

/// Logs the push that would be published to the room's topic.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier {
    region: Option<String>,
}

impl LogNotifier {
    /// Creates a notifier for the given push region.
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, grant: &GrantMatch) -> Result<()> {
        let Some(topic) = grant.room_notification_topic.as_deref() else {
            return Ok(());
        };
        info!(
            topic,
            region = self.region.as_deref().unwrap_or("default"),
            user = %grant.user_name,
            room_id = %grant.room_id,
            "Entry notification (not published)"
        );
        Ok(())
    }
}
