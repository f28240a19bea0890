//! Fire-and-forget round-trip reports to `POST /log-timing`.

use bessie_core::Timing;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// One `/log-timing` body. `roundtrip` is in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingEntry {
    pub timestamp: String,
    pub action: String,
    pub roundtrip: f64,
}

impl TimingEntry {
    pub fn new(timing: &Timing, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            action: timing.action.to_string(),
            roundtrip: timing.roundtrip.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimingReporter {
    target: Option<(reqwest::Client, String)>,
}

impl TimingReporter {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self {
            target: Some((client, url)),
        }
    }

    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Post `timing`. Failures are logged and otherwise ignored.
    pub async fn report(&self, timing: &Timing) {
        let Some((client, url)) = &self.target else {
            return;
        };
        let entry = TimingEntry::new(timing, Utc::now());
        match client.post(url).json(&entry).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(status = %response.status(), action = %entry.action, "timing report rejected");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, action = %entry.action, "timing report failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_entry_body_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = TimingEntry::new(
            &Timing {
                action: "arrow_right",
                roundtrip: Duration::from_millis(250),
            },
            at,
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "arrow_right");
        assert_eq!(json["roundtrip"], 0.25);
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00.000Z");
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_silent() {
        let reporter = TimingReporter::disabled();
        assert!(!reporter.is_enabled());
        reporter
            .report(&Timing {
                action: "initial_load",
                roundtrip: Duration::ZERO,
            })
            .await;
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_swallowed() {
        let reporter = TimingReporter::new(reqwest::Client::new(), "http://127.0.0.1:9/api/log-timing".into());
        reporter
            .report(&Timing {
                action: "initial_load",
                roundtrip: Duration::from_millis(5),
            })
            .await;
    }
}
