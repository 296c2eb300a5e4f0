pub mod alert;
pub mod detector;
pub mod error;
pub mod fingerprint;
pub mod incident;
pub mod ratelimit;
pub mod store;
pub mod types;

pub use alert::{
    AlertDispatcher, AlertPayload, Channel, ChannelConfig, ChannelResult, DispatchResult, EmailChannel, SlackChannel,
    WebhookChannel,
};
pub use detector::{DetectionInput, DetectionOutcome, DetectorConfig, ViolationDetector};
pub use error::ViolationError;
pub use incident::{IncidentGenerator, WorkflowMapping};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use store::{AggregateOptions, GroupBy, InMemoryViolationStore, QueryFilter, RecentOptions, SortBy, ViolationStore};
pub use types::{
    ExpectedOutput, GoldenTask, GoldenTaskSource, Pattern, Severity, Sla, Violation, ViolationDetails,
    ViolationMetadata, ViolationStatus, ViolationType,
};
