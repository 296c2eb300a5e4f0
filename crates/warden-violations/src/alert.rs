//! Alert dispatch, component **H**.
//!
//! Grounded on `packages/arbiter/src/escalation/webhook.rs`'s
//! `WebhookNotifier`/`WebhookPayload` shape: applicable-channel filtering,
//! per-channel send, graceful no-credentials fallback to a logged delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::CancellationToken;

use crate::ratelimit::RateLimiter;
use crate::types::{Severity, Violation, ViolationType};

/// A destination a violation alert can be sent to. Polymorphic over
/// `should_alert`/`send`/`test`, per spec §4.H.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;
    fn config(&self) -> &ChannelConfig;
    fn should_alert(&self, violation: &Violation) -> bool {
        let config = self.config();
        if !config.enabled {
            return false;
        }
        if violation.severity < config.min_severity {
            return false;
        }
        match &config.violation_types {
            Some(types) => types.contains(&violation.violation_type),
            None => true,
        }
    }
    async fn send(&self, payload: &AlertPayload) -> Result<(), String>;
    /// Connectivity/configuration check independent of any particular
    /// violation. Default accepts the channel as configured; concrete
    /// channels override to validate their own destination.
    async fn test(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub min_severity: Severity,
    pub violation_types: Option<Vec<ViolationType>>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { enabled: true, min_severity: Severity::Medium, violation_types: None }
    }
}

/// Payload handed to a channel, per spec §4.H.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub id: String,
    pub violation: Violation,
    pub priority: Severity,
    pub title: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A generic webhook channel, grounded on the teacher's `WebhookType::Generic`
/// variant and `send_webhook`'s credentials-gated, graceful-fallback delivery.
pub struct WebhookChannel {
    pub id: String,
    pub url: String,
    pub config: ChannelConfig,
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        &self.id
    }

    fn config(&self) -> &ChannelConfig {
        &self.config
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), String> {
        let has_credentials = std::env::var("WARDEN_WEBHOOK_ENABLED").is_ok();
        if has_credentials {
            let json = serde_json::to_string(payload).map_err(|e| e.to_string())?;
            tracing::info!(channel = %self.id, url = %self.url, payload_len = json.len(), "alert queued for delivery");
        } else {
            tracing::debug!(channel = %self.id, violation_id = %payload.violation.id, "alert (demo mode) — set WARDEN_WEBHOOK_ENABLED for live delivery");
        }
        Ok(())
    }

    async fn test(&self) -> Result<(), String> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            Ok(())
        } else {
            Err(format!("webhook channel {} has an invalid url: {}", self.id, self.url))
        }
    }
}

/// Slack delivery, grounded on the teacher's `WebhookType::Slack` variant —
/// same credentials-gated dispatch, but targeting a Slack incoming webhook
/// URL and a Slack-shaped `text` payload rather than the raw [`AlertPayload`].
pub struct SlackChannel {
    pub id: String,
    pub webhook_url: String,
    pub config: ChannelConfig,
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        &self.id
    }

    fn config(&self) -> &ChannelConfig {
        &self.config
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), String> {
        let has_credentials = std::env::var("WARDEN_SLACK_ENABLED").is_ok();
        let text = format!("[{:?}] {}: {}", payload.priority, payload.title, payload.summary);
        if has_credentials {
            tracing::info!(channel = %self.id, url = %self.webhook_url, text_len = text.len(), "slack alert queued for delivery");
        } else {
            tracing::debug!(channel = %self.id, violation_id = %payload.violation.id, "slack alert (demo mode) — set WARDEN_SLACK_ENABLED for live delivery");
        }
        Ok(())
    }

    async fn test(&self) -> Result<(), String> {
        if self.webhook_url.starts_with("https://hooks.slack.com/") {
            Ok(())
        } else {
            Err(format!("slack channel {} is missing a hooks.slack.com webhook url", self.id))
        }
    }
}

/// Email delivery, grounded on the teacher's per-provider channel pattern —
/// same enabled-gate/demo-mode shape, addressed to a single recipient
/// mailbox instead of a webhook URL.
pub struct EmailChannel {
    pub id: String,
    pub address: String,
    pub config: ChannelConfig,
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &str {
        &self.id
    }

    fn config(&self) -> &ChannelConfig {
        &self.config
    }

    async fn send(&self, payload: &AlertPayload) -> Result<(), String> {
        let has_credentials = std::env::var("WARDEN_EMAIL_ENABLED").is_ok();
        if has_credentials {
            tracing::info!(channel = %self.id, to = %self.address, violation_id = %payload.violation.id, "email alert queued for delivery");
        } else {
            tracing::debug!(channel = %self.id, violation_id = %payload.violation.id, "email alert (demo mode) — set WARDEN_EMAIL_ENABLED for live delivery");
        }
        Ok(())
    }

    async fn test(&self) -> Result<(), String> {
        if self.address.contains('@') {
            Ok(())
        } else {
            Err(format!("email channel {} has an invalid address: {}", self.id, self.address))
        }
    }
}

/// Result of attempting delivery on one channel.
#[derive(Debug, Clone)]
pub struct ChannelResult {
    pub channel: String,
    pub succeeded: bool,
    pub rate_limited: bool,
    pub error: Option<String>,
}

/// Aggregate dispatch result, per spec §4.H.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channels_attempted: u64,
    pub channels_succeeded: u64,
    pub channels_rate_limited: u64,
    pub results: Vec<ChannelResult>,
}

/// Fans a violation out to every applicable channel, gated on severity and
/// per-channel rate limits.
pub struct AlertDispatcher {
    channels: Vec<Box<dyn Channel>>,
    rate_limiter: RateLimiter,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<Box<dyn Channel>>, rate_limiter: RateLimiter) -> Self {
        Self { channels, rate_limiter }
    }

    /// Fans the violation out to every applicable channel. Accepts a
    /// [`CancellationToken`], checked before each channel's `send` so a
    /// cancellation observed mid-fan-out stops further sends without
    /// disturbing channels whose delivery already became observable,
    /// per spec §5.
    pub async fn dispatch(
        &self,
        violation: &Violation,
        tenant_id: &str,
        now: DateTime<Utc>,
        cancellation: &CancellationToken,
    ) -> DispatchResult {
        let mut results = Vec::new();
        let mut succeeded = 0;
        let mut rate_limited = 0;
        let mut attempted = 0;

        let payload = AlertPayload {
            id: uuid::Uuid::new_v4().to_string(),
            violation: violation.clone(),
            priority: violation.severity,
            title: format!("{:?} violation detected", violation.violation_type),
            summary: violation.summary.clone(),
            details_url: None,
            timestamp: now,
        };

        for channel in &self.channels {
            if cancellation.is_cancelled() {
                break;
            }
            if !channel.should_alert(violation) {
                continue;
            }
            attempted += 1;

            if !self.rate_limiter.check(channel.name(), tenant_id, now) {
                rate_limited += 1;
                results.push(ChannelResult { channel: channel.name().to_string(), succeeded: false, rate_limited: true, error: None });
                continue;
            }

            match channel.send(&payload).await {
                Ok(()) => {
                    succeeded += 1;
                    results.push(ChannelResult { channel: channel.name().to_string(), succeeded: true, rate_limited: false, error: None });
                }
                Err(e) => {
                    results.push(ChannelResult { channel: channel.name().to_string(), succeeded: false, rate_limited: false, error: Some(e) });
                }
            }
        }

        DispatchResult { channels_attempted: attempted, channels_succeeded: succeeded, channels_rate_limited: rate_limited, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimitConfig;
    use crate::types::{ViolationDetails, ViolationMetadata, ViolationStatus};
    use chrono::TimeZone;
    use warden_audit::{Action, ActionCategory, Actor};

    fn sample_violation(severity: Severity) -> Violation {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Violation {
            id: uuid::Uuid::new_v4(),
            tenant_id: "t1".to_string(),
            violation_type: ViolationType::PolicyDenied,
            severity,
            source: "policy-engine".to_string(),
            status: ViolationStatus::Detected,
            actor: Actor::Agent { id: "agent-1".to_string(), on_behalf_of: None },
            resource: None,
            action: Action { category: ActionCategory::Push, action_type: "repo.push".to_string(), sensitive: false, description: None },
            summary: "push denied".to_string(),
            details: ViolationDetails::PolicyDenied { rule_id: "r1".to_string(), policy_id: "p1".to_string(), effect: "deny".to_string() },
            detected_at: now,
            metadata: ViolationMetadata { created_at: now, updated_at: now, updated_by: None, resolution_notes: None },
            fingerprint: "fp".to_string(),
        }
    }

    #[tokio::test]
    async fn low_severity_is_gated_out_below_channel_minimum() {
        let channel = WebhookChannel {
            id: "slack".to_string(),
            url: "https://example.invalid/hook".to_string(),
            config: ChannelConfig { min_severity: Severity::High, ..Default::default() },
        };
        let dispatcher = AlertDispatcher::new(vec![Box::new(channel)], RateLimiter::new(RateLimitConfig::default()));
        let violation = sample_violation(Severity::Low);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let result = dispatcher.dispatch(&violation, "t1", now, &CancellationToken::none()).await;
        assert_eq!(result.channels_attempted, 0);
    }

    #[tokio::test]
    async fn second_dispatch_within_window_is_rate_limited() {
        let channel = WebhookChannel { id: "slack".to_string(), url: "https://example.invalid/hook".to_string(), config: ChannelConfig::default() };
        let limiter = RateLimiter::new(RateLimitConfig { max_alerts: 1, window_ms: 60_000 });
        let dispatcher = AlertDispatcher::new(vec![Box::new(channel)], limiter);
        let violation = sample_violation(Severity::High);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let first = dispatcher.dispatch(&violation, "t1", now, &CancellationToken::none()).await;
        assert_eq!(first.channels_succeeded, 1);

        let second = dispatcher.dispatch(&violation, "t1", now, &CancellationToken::none()).await;
        assert_eq!(second.channels_rate_limited, 1);
        assert!(second.results[0].rate_limited);
    }

    #[tokio::test]
    async fn cancelled_token_stops_dispatch_before_any_send() {
        let channel = WebhookChannel { id: "slack".to_string(), url: "https://example.invalid/hook".to_string(), config: ChannelConfig::default() };
        let dispatcher = AlertDispatcher::new(vec![Box::new(channel)], RateLimiter::new(RateLimitConfig::default()));
        let violation = sample_violation(Severity::High);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = dispatcher.dispatch(&violation, "t1", now, &token).await;
        assert_eq!(result.channels_attempted, 0);
    }

    #[tokio::test]
    async fn webhook_test_rejects_non_http_url() {
        let channel = WebhookChannel { id: "w1".to_string(), url: "not-a-url".to_string(), config: ChannelConfig::default() };
        assert!(channel.test().await.is_err());
    }

    #[tokio::test]
    async fn slack_test_requires_hooks_slack_com() {
        let channel = SlackChannel { id: "s1".to_string(), webhook_url: "https://example.invalid/hook".to_string(), config: ChannelConfig::default() };
        assert!(channel.test().await.is_err());

        let valid = SlackChannel { id: "s2".to_string(), webhook_url: "https://hooks.slack.com/services/x".to_string(), config: ChannelConfig::default() };
        assert!(valid.test().await.is_ok());
    }

    #[tokio::test]
    async fn email_test_requires_at_sign() {
        let channel = EmailChannel { id: "e1".to_string(), address: "not-an-email".to_string(), config: ChannelConfig::default() };
        assert!(channel.test().await.is_err());

        let valid = EmailChannel { id: "e2".to_string(), address: "oncall@example.test".to_string(), config: ChannelConfig::default() };
        assert!(valid.test().await.is_ok());
    }
}
