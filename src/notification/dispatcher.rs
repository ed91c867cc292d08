//! Alert dispatcher - fans alerts out to every channel without blocking callers

use super::channel::{AlertChannel, AlertMessage, SendResult};
use super::throttle::{AlertThrottle, ThrottleDecision};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Delivers owner alerts through the registered channels
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
    throttle: Mutex<AlertThrottle>,
    dry_run: bool,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            throttle: Mutex::new(AlertThrottle::new()),
            dry_run: false,
        }
    }

    pub fn with_throttle(mut self, throttle: AlertThrottle) -> Self {
        self.throttle = Mutex::new(throttle);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn register_channel(&mut self, channel: Arc<dyn AlertChannel>) {
        info!(channel = channel.name(), "Registering alert channel");
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send to all channels and wait for the results
    pub async fn send(&self, message: &AlertMessage) -> Vec<(String, SendResult)> {
        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let name = channel.name().to_string();

            if self.dry_run {
                info!(channel = %name, content = %message.content, "[DRY-RUN] alert");
                results.push((name, SendResult::Skipped("dry-run".to_string())));
                continue;
            }

            let result = match channel.send(message).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(channel = %name, error = %e, "Alert channel send failed");
                    SendResult::Failed(e.to_string())
                }
            };
            results.push((name, result));
        }

        results
    }

    /// Throttle, then deliver on a detached task; returns immediately
    ///
    /// Returns whether the alert passed the throttle.
    pub fn dispatch(self: &Arc<Self>, message: AlertMessage) -> bool {
        let decision = match self.throttle.lock() {
            Ok(mut throttle) => throttle.check(&message.throttle_key),
            Err(_) => ThrottleDecision::Send { suppressed: 0 },
        };

        let message = match decision {
            ThrottleDecision::Suppress => {
                debug!(key = %message.throttle_key, "Alert suppressed by throttle");
                return false;
            }
            ThrottleDecision::Send { suppressed: 0 } => message,
            ThrottleDecision::Send { suppressed } => AlertMessage {
                content: format!("{}\n(+{} earlier alerts held back)", message.content, suppressed),
                ..message
            },
        };

        self.spawn_send(message);
        true
    }

    /// Send a digest line for every source whose throttle window closed with
    /// alerts held back
    pub fn flush_digests(self: &Arc<Self>) -> usize {
        let digests = match self.throttle.lock() {
            Ok(mut throttle) => throttle.flush_expired(),
            Err(_) => return 0,
        };

        let count = digests.len();
        for digest in digests {
            let content = format!("🔕 {} more alert(s) from {}", digest.count, digest.key);
            self.spawn_send(AlertMessage::new(content, digest.key));
        }
        count
    }

    fn spawn_send(self: &Arc<Self>, message: AlertMessage) {
        if self.channels.is_empty() {
            debug!(content = %message.content, "No alert channels registered");
            return;
        }
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            for (channel, result) in dispatcher.send(&message).await {
                if let SendResult::Failed(err) = result {
                    warn!(channel = %channel, error = %err, "Alert not delivered");
                }
            }
        });
    }
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
