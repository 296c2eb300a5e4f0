//! Report store, component **L**.
//!
//! Grounded on the `InMemoryAuditStore`/`InMemoryViolationStore` pattern:
//! per-tenant namespace, `tokio::sync::RwLock`-guarded maps.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ReportError;
use crate::types::{ComplianceReport, FrameworkId, ReportStatus};

#[derive(Debug, Clone, Copy)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Status,
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub status: Option<ReportStatus>,
    pub statuses: Option<Vec<ReportStatus>>,
    pub framework: Option<FrameworkId>,
    pub period_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub signed: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub created_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub sort_by: Option<SortField>,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub report: ComplianceReport,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct VersionRecord {
    pub version: u32,
    pub report: ComplianceReport,
    pub change_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct TenantStore {
    current: HashMap<Uuid, ReportRecord>,
    history: HashMap<Uuid, Vec<VersionRecord>>,
}

impl TenantStore {
    fn new() -> Self {
        Self { current: HashMap::new(), history: HashMap::new() }
    }

    fn matches(&self, record: &ReportRecord, opts: &ListOptions) -> bool {
        if let Some(status) = opts.status {
            if record.report.status != status {
                return false;
            }
        }
        if let Some(statuses) = &opts.statuses {
            if !statuses.contains(&record.report.status) {
                return false;
            }
        }
        if let Some(framework) = opts.framework {
            if record.report.framework.id != framework {
                return false;
            }
        }
        if let Some((start, end)) = opts.period_window {
            if record.report.period.start < start || record.report.period.end > end {
                return false;
            }
        }
        if let Some(signed) = opts.signed {
            if record.report.signature.is_some() != signed {
                return false;
            }
        }
        if let Some(tags) = &opts.tags {
            if !tags.iter().all(|t| record.tags.contains(t)) {
                return false;
            }
        }
        if let Some((start, end)) = opts.created_window {
            if record.created_at < start || record.created_at > end {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, tenant_id: &str, report: ComplianceReport, opts: SaveOptions, now: DateTime<Utc>) -> ReportRecord;
    async fn save_signed(&self, tenant_id: &str, report: ComplianceReport, opts: SaveOptions, now: DateTime<Utc>) -> ReportRecord;
    async fn get(&self, tenant_id: &str, report_id: Uuid) -> Result<ComplianceReport, ReportError>;
    async fn get_metadata(&self, tenant_id: &str, report_id: Uuid) -> Result<ReportRecord, ReportError>;
    async fn delete(&self, tenant_id: &str, report_id: Uuid) -> Result<(), ReportError>;
    async fn list(&self, tenant_id: &str, opts: &ListOptions) -> Vec<ReportRecord>;
    async fn count(&self, tenant_id: &str, opts: &ListOptions) -> u64;
    async fn update_status(&self, tenant_id: &str, report_id: Uuid, status: ReportStatus, now: DateTime<Utc>) -> Result<(), ReportError>;
    async fn create_version(
        &self,
        tenant_id: &str,
        report_id: Uuid,
        new_report: ComplianceReport,
        change_description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<u32, ReportError>;
    async fn get_version_history(&self, tenant_id: &str, report_id: Uuid) -> Vec<VersionRecord>;
    async fn get_version(&self, tenant_id: &str, report_id: Uuid, version: u32) -> Result<ComplianceReport, ReportError>;
    async fn archive_older_than(&self, tenant_id: &str, cutoff: DateTime<Utc>, exclude_statuses: &[ReportStatus]) -> u64;
    async fn get_many(&self, tenant_id: &str, ids: &[Uuid]) -> Vec<ComplianceReport>;
    async fn clear(&self, tenant_id: &str);
}

#[derive(Default)]
pub struct InMemoryReportStore {
    tenants: RwLock<HashMap<String, TenantStore>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

const MAX_LIST_LIMIT: usize = 1000;
const DEFAULT_LIST_LIMIT: usize = 100;

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save(&self, tenant_id: &str, report: ComplianceReport, opts: SaveOptions, now: DateTime<Utc>) -> ReportRecord {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(tenant_id.to_string()).or_insert_with(TenantStore::new);

        let record = if let Some(existing) = tenant.current.get(&report.report_id) {
            ReportRecord {
                report,
                tags: opts.tags,
                created_at: existing.created_at,
                created_by: existing.created_by.clone(),
                updated_at: now,
                updated_by: opts.updated_by,
                version: existing.version,
            }
        } else {
            ReportRecord { report, tags: opts.tags, created_at: now, created_by: opts.created_by, updated_at: now, updated_by: opts.updated_by, version: 1 }
        };

        tenant.current.insert(record.report.report_id, record.clone());
        record
    }

    async fn save_signed(&self, tenant_id: &str, report: ComplianceReport, opts: SaveOptions, now: DateTime<Utc>) -> ReportRecord {
        self.save(tenant_id, report, opts, now).await
    }

    async fn get(&self, tenant_id: &str, report_id: Uuid) -> Result<ComplianceReport, ReportError> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant_id)
            .and_then(|t| t.current.get(&report_id))
            .map(|r| r.report.clone())
            .ok_or(ReportError::ReportNotFound(report_id))
    }

    async fn get_metadata(&self, tenant_id: &str, report_id: Uuid) -> Result<ReportRecord, ReportError> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant_id)
            .and_then(|t| t.current.get(&report_id))
            .cloned()
            .ok_or(ReportError::ReportNotFound(report_id))
    }

    async fn delete(&self, tenant_id: &str, report_id: Uuid) -> Result<(), ReportError> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.get_mut(tenant_id).ok_or_else(|| ReportError::StoreNotInitialised(tenant_id.to_string()))?;
        tenant.current.remove(&report_id).ok_or(ReportError::ReportNotFound(report_id))?;
        tenant.history.remove(&report_id);
        Ok(())
    }

    async fn list(&self, tenant_id: &str, opts: &ListOptions) -> Vec<ReportRecord> {
        let tenants = self.tenants.read().await;
        let Some(tenant) = tenants.get(tenant_id) else { return Vec::new() };

        let mut matched: Vec<ReportRecord> = tenant.current.values().filter(|r| tenant.matches(r, opts)).cloned().collect();

        match opts.sort_by {
            Some(SortField::CreatedAt) | None => matched.sort_by_key(|r| r.created_at),
            Some(SortField::UpdatedAt) => matched.sort_by_key(|r| r.updated_at),
            Some(SortField::Title) => matched.sort_by(|a, b| a.report.title.cmp(&b.report.title)),
            Some(SortField::Status) => matched.sort_by_key(|r| format!("{:?}", r.report.status)),
        }

        let start = opts.offset.min(matched.len());
        let limit = opts.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
        matched[start..].iter().take(limit).cloned().collect()
    }

    async fn count(&self, tenant_id: &str, opts: &ListOptions) -> u64 {
        let tenants = self.tenants.read().await;
        let Some(tenant) = tenants.get(tenant_id) else { return 0 };
        tenant.current.values().filter(|r| tenant.matches(r, opts)).count() as u64
    }

    async fn update_status(&self, tenant_id: &str, report_id: Uuid, status: ReportStatus, now: DateTime<Utc>) -> Result<(), ReportError> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.get_mut(tenant_id).ok_or_else(|| ReportError::StoreNotInitialised(tenant_id.to_string()))?;
        let record = tenant.current.get_mut(&report_id).ok_or(ReportError::ReportNotFound(report_id))?;
        record.report.status = status;
        record.updated_at = now;
        Ok(())
    }

    async fn create_version(
        &self,
        tenant_id: &str,
        report_id: Uuid,
        new_report: ComplianceReport,
        change_description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<u32, ReportError> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.get_mut(tenant_id).ok_or_else(|| ReportError::StoreNotInitialised(tenant_id.to_string()))?;
        let current = tenant.current.get(&report_id).ok_or(ReportError::ReportNotFound(report_id))?.clone();

        let next_version = current.version + 1;
        let history = tenant.history.entry(report_id).or_default();
        history.push(VersionRecord { version: current.version, report: current.report.clone(), change_description, created_at: now });

        let mut updated = current;
        updated.report = new_report;
        updated.version = next_version;
        updated.updated_at = now;
        tenant.current.insert(report_id, updated);

        Ok(next_version)
    }

    async fn get_version_history(&self, tenant_id: &str, report_id: Uuid) -> Vec<VersionRecord> {
        let tenants = self.tenants.read().await;
        tenants.get(tenant_id).and_then(|t| t.history.get(&report_id)).cloned().unwrap_or_default()
    }

    async fn get_version(&self, tenant_id: &str, report_id: Uuid, version: u32) -> Result<ComplianceReport, ReportError> {
        let tenants = self.tenants.read().await;
        let tenant = tenants.get(tenant_id).ok_or_else(|| ReportError::StoreNotInitialised(tenant_id.to_string()))?;

        if let Some(current) = tenant.current.get(&report_id) {
            if current.version == version {
                return Ok(current.report.clone());
            }
        }
        tenant
            .history
            .get(&report_id)
            .and_then(|history| history.iter().find(|v| v.version == version))
            .map(|v| v.report.clone())
            .ok_or(ReportError::ReportNotFound(report_id))
    }

    async fn archive_older_than(&self, tenant_id: &str, cutoff: DateTime<Utc>, exclude_statuses: &[ReportStatus]) -> u64 {
        let mut tenants = self.tenants.write().await;
        let Some(tenant) = tenants.get_mut(tenant_id) else { return 0 };
        let mut archived = 0u64;
        for record in tenant.current.values_mut() {
            if record.created_at < cutoff && !exclude_statuses.contains(&record.report.status) {
                record.report.status = ReportStatus::Archived;
                archived += 1;
            }
        }
        archived
    }

    async fn get_many(&self, tenant_id: &str, ids: &[Uuid]) -> Vec<ComplianceReport> {
        let tenants = self.tenants.read().await;
        let Some(tenant) = tenants.get(tenant_id) else { return Vec::new() };
        ids.iter().filter_map(|id| tenant.current.get(id).map(|r| r.report.clone())).collect()
    }

    async fn clear(&self, tenant_id: &str) {
        let mut tenants = self.tenants.write().await;
        tenants.remove(tenant_id);
    }
}
