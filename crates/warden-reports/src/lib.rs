pub mod cron;
pub mod error;
pub mod evidence;
pub mod generator;
pub mod period;
pub mod schedule;
pub mod store;
pub mod templates;
pub mod types;

pub use error::ReportError;
pub use evidence::{CollectedEvidence, EvidenceCollector, EvidenceQuery, EvidenceSource, GovernanceEvidenceCollector};
pub use generator::{GenerateRequest, GeneratedReport, OutputFormat, ReportGenerator};
pub use period::{compute_period, ReportPeriodKind};
pub use schedule::{RunStatus, Schedule, ScheduleManager, ScheduledReportRun};
pub use store::{InMemoryReportStore, ListOptions, ReportRecord, ReportStore, SaveOptions, SortField, VersionRecord};
pub use templates::{template_for, ControlDef, FrameworkTemplate};
pub use types::{
    Attestation, ComplianceReport, Control, ControlStatus, EvidenceRef, FrameworkId, FrameworkInfo, Period, PeriodType,
    Remediation, RemediationStatus, ReportSignature, ReportStatus, ReportSummary,
};
