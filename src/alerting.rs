//! Shared alert plumbing used by the Risk Budget Manager, the System Risk
//! Controller, and the health registry.
//!
//! Transport failures (a `NotificationSink` erroring) are logged and
//! swallowed — alerting must never block the control path (spec §7). Rate
//! limiting is per `(category, key)` so a single flapping source cannot
//! flood an operator's phone.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
            AlertSeverity::Emergency => "EMERGENCY",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
}

/// Destination for alerts. A Telegram/webhook implementation is explicitly
/// out of scope (spec §1); only console/log and null sinks are provided.
pub trait NotificationSink: Send + Sync {
    fn send(&self, alert: &Alert) -> Result<(), String>;
}

/// Logs the alert via `tracing` at a level proportional to severity.
#[derive(Debug, Default)]
pub struct ConsoleAlertSender;

impl NotificationSink for ConsoleAlertSender {
    fn send(&self, alert: &Alert) -> Result<(), String> {
        match alert.severity {
            AlertSeverity::Info => tracing::info!(title = %alert.title, message = %alert.message, "alert"),
            AlertSeverity::Warning => warn!(title = %alert.title, message = %alert.message, "alert"),
            AlertSeverity::Critical => error!(title = %alert.title, message = %alert.message, "alert"),
            AlertSeverity::Emergency => {
                error!(emergency = true, title = %alert.title, message = %alert.message, "alert")
            }
        }
        Ok(())
    }
}

/// Discards alerts. Used in tests where the transport is irrelevant.
#[derive(Debug, Default)]
pub struct NullAlertSender;

impl NotificationSink for NullAlertSender {
    fn send(&self, _alert: &Alert) -> Result<(), String> {
        Ok(())
    }
}

/// Wraps a `NotificationSink` with per-key rate limiting and guarantees
/// transport failures never propagate to the caller.
pub struct AlertingService {
    sink: Box<dyn NotificationSink>,
    min_interval: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl AlertingService {
    pub fn new(sink: Box<dyn NotificationSink>, min_interval: Duration) -> Self {
        Self {
            sink,
            min_interval,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Emit an alert, rate-limited by `key` (e.g. `"{trigger}:{symbol}"`).
    /// Returns `true` if the alert was actually sent (not suppressed).
    pub fn emit(&self, key: &str, alert: Alert) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last_sent.lock();
            if let Some(prev) = last.get(key) {
                if now.duration_since(*prev) < self.min_interval && alert.severity != AlertSeverity::Emergency {
                    return false;
                }
            }
            last.insert(key.to_string(), now);
        }

        if let Err(e) = self.sink.send(&alert) {
            warn!(error = %e, "alert transport failed; swallowing");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);
    impl NotificationSink for CountingSink {
        fn send(&self, _alert: &Alert) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn rate_limits_by_key() {
        let count = Arc::new(AtomicUsize::new(0));
        let svc = AlertingService::new(Box::new(CountingSink(count.clone())), Duration::from_secs(60));
        let alert = Alert {
            severity: AlertSeverity::Warning,
            title: "t".into(),
            message: "m".into(),
        };
        assert!(svc.emit("k", alert.clone()));
        assert!(!svc.emit("k", alert.clone()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emergency_always_bypasses_rate_limit() {
        let count = Arc::new(AtomicUsize::new(0));
        let svc = AlertingService::new(Box::new(CountingSink(count.clone())), Duration::from_secs(60));
        let alert = Alert {
            severity: AlertSeverity::Emergency,
            title: "t".into(),
            message: "m".into(),
        };
        assert!(svc.emit("k", alert.clone()));
        assert!(svc.emit("k", alert));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transport_failure_is_swallowed() {
        struct FailingSink;
        impl NotificationSink for FailingSink {
            fn send(&self, _alert: &Alert) -> Result<(), String> {
                Err("boom".into())
            }
        }
        let svc = AlertingService::new(Box::new(FailingSink), Duration::from_secs(1));
        let sent = svc.emit(
            "k",
            Alert {
                severity: AlertSeverity::Info,
                title: "t".into(),
                message: "m".into(),
            },
        );
        assert!(sent);
    }
}
