use async_trait::async_trait;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Critical,
}

impl Urgency {
    fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// Desktop notification sink. The ingestion loop calls this exactly once per
/// newly inserted failing record and does not care whether delivery succeeds;
/// there is no retry contract on this edge.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str, urgency: Urgency);
}

/// Shells out to a desktop notification command (`notify-send` by default,
/// invoked as `<command> -u <urgency> <title> <body>`). Failures are logged
/// and swallowed.
pub struct CommandNotifier {
    command: String,
}

impl CommandNotifier {
    pub fn new(command: String) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, title: &str, body: &str, urgency: Urgency) {
        let result = tokio::process::Command::new(&self.command)
            .arg("-u")
            .arg(urgency.as_str())
            .arg(title)
            .arg(body)
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {
                tracing::debug!(title, "notification sent");
            }
            Ok(output) => {
                warn!(
                    command = %self.command,
                    status = %output.status,
                    "notification command failed"
                );
            }
            Err(e) => {
                warn!(command = %self.command, error = %e, "could not run notification command");
            }
        }
    }
}

/// Drops notifications. Used by one-shot modes.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _title: &str, _body: &str, _urgency: Urgency) {}
}
