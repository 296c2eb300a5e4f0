//! Schedule manager, component **K**'s recurring-run half.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use warden_core::{CancellationToken, Deadline};

use crate::cron;
use crate::error::ReportError;
use crate::types::FrameworkId;

const RUN_HISTORY_CAPACITY: usize = 50;
const DEFAULT_RUN_DEADLINE_MINUTES: u64 = 30;
const DEADLINE_EXCEEDED: &str = "deadline_exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ScheduledReportRun {
    pub run_id: Uuid,
    pub schedule_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: String,
    pub tenant_id: String,
    pub framework: FrameworkId,
    pub cron_expression: String,
    pub enabled: bool,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
}

struct ScheduleEntry {
    schedule: Schedule,
    runs: VecDeque<ScheduledReportRun>,
}

/// Maintains schedules and their due-run bookkeeping. Report execution
/// itself is injected via the closure passed to `process_due_schedules`, so
/// this module owns no dependency on the generator or store directly.
pub struct ScheduleManager {
    schedules: RwLock<HashMap<String, ScheduleEntry>>,
    run_deadline: Duration,
}

impl ScheduleManager {
    pub fn new() -> Self {
        Self::with_deadline_minutes(DEFAULT_RUN_DEADLINE_MINUTES)
    }

    /// Builds a manager whose runs are bounded by `minutes`, per spec §5's
    /// per-run deadline (`ReportsConfig::schedule_run_deadline_minutes`).
    pub fn with_deadline_minutes(minutes: u64) -> Self {
        Self { schedules: RwLock::new(HashMap::new()), run_deadline: Duration::from_secs(minutes * 60) }
    }

    pub fn add_schedule(
        &self,
        id: String,
        tenant_id: String,
        framework: FrameworkId,
        cron_expression: String,
        now: DateTime<Utc>,
    ) -> Result<Schedule, ReportError> {
        let next_run_at = cron::next_run_after(&cron_expression, now)?;
        let schedule = Schedule { id: id.clone(), tenant_id, framework, cron_expression, enabled: true, next_run_at, last_run_at: None };
        self.schedules.write().insert(id, ScheduleEntry { schedule: schedule.clone(), runs: VecDeque::new() });
        Ok(schedule)
    }

    pub fn disable(&self, id: &str) {
        if let Some(entry) = self.schedules.write().get_mut(id) {
            entry.schedule.enabled = false;
        }
    }

    pub fn get(&self, id: &str) -> Option<Schedule> {
        self.schedules.read().get(id).map(|e| e.schedule.clone())
    }

    fn due_schedule_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        self.schedules
            .read()
            .values()
            .filter(|e| e.schedule.enabled && e.schedule.next_run_at <= now)
            .map(|e| e.schedule.id.clone())
            .collect()
    }

    fn record_run(&self, id: &str, run: ScheduledReportRun, now: DateTime<Utc>, cron_expr_for_next: &str) {
        let mut schedules = self.schedules.write();
        if let Some(entry) = schedules.get_mut(id) {
            entry.runs.push_back(run.clone());
            while entry.runs.len() > RUN_HISTORY_CAPACITY {
                entry.runs.pop_front();
            }
            entry.schedule.last_run_at = Some(run.started_at);
            if let Ok(next) = cron::next_run_after(cron_expr_for_next, now) {
                entry.schedule.next_run_at = next;
            }
        }
    }

    /// Runs every eligible schedule once, invoking `runner` for each due
    /// schedule. Ticks never overlap for the same schedule (spec §5). Each
    /// run is bounded by this manager's deadline; a run that doesn't finish
    /// in time is recorded as failed with `error = "deadline_exceeded"`.
    /// `cancellation` is checked before each schedule's run starts — once a
    /// run has started, it is left to finish or hit its deadline rather than
    /// abandoned mid-flight.
    pub async fn process_due_schedules<F, Fut>(
        &self,
        now: DateTime<Utc>,
        cancellation: &CancellationToken,
        mut runner: F,
    ) -> Vec<ScheduledReportRun>
    where
        F: FnMut(Schedule) -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        let mut completed_runs = Vec::new();
        for id in self.due_schedule_ids(now) {
            if cancellation.is_cancelled() {
                break;
            }
            let Some(schedule) = self.get(&id) else { continue };
            let run_id = Uuid::new_v4();
            let started_at = now;

            let (status, error) = self.run_with_deadline(runner(schedule.clone())).await;

            let run = ScheduledReportRun { run_id, schedule_id: id.clone(), status, started_at, completed_at: Some(Utc::now()), error };
            self.record_run(&id, run.clone(), now, &schedule.cron_expression);
            completed_runs.push(run);
        }
        completed_runs
    }

    /// Runs one schedule immediately regardless of `next_run_at`, per spec
    /// §4.K ("Manual runSchedule(id) is always allowed"). Bounded by this
    /// manager's deadline, same as `process_due_schedules`.
    pub async fn run_schedule<F, Fut>(
        &self,
        id: &str,
        now: DateTime<Utc>,
        cancellation: &CancellationToken,
        runner: F,
    ) -> Result<ScheduledReportRun, ReportError>
    where
        F: FnOnce(Schedule) -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        if cancellation.is_cancelled() {
            return Err(ReportError::Cancelled);
        }
        let schedule = self.get(id).ok_or_else(|| ReportError::InvalidRequest(format!("no schedule with id {id}")))?;
        let run_id = Uuid::new_v4();
        let (status, error) = self.run_with_deadline(runner(schedule.clone())).await;
        let run = ScheduledReportRun { run_id, schedule_id: id.to_string(), status, started_at: now, completed_at: Some(Utc::now()), error };
        self.record_run(id, run.clone(), now, &schedule.cron_expression);
        Ok(run)
    }

    async fn run_with_deadline<Fut>(&self, fut: Fut) -> (RunStatus, Option<String>)
    where
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        let deadline = Deadline::after(self.run_deadline);
        let instant = deadline.instant().expect("Deadline::after always sets an instant");
        match tokio::time::timeout_at(tokio::time::Instant::from_std(instant), fut).await {
            Ok(Ok(())) => (RunStatus::Completed, None),
            Ok(Err(e)) => (RunStatus::Failed, Some(e)),
            Err(_elapsed) => (RunStatus::Failed, Some(DEADLINE_EXCEEDED.to_string())),
        }
    }
}

impl Default for ScheduleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn add_schedule_computes_next_run_from_cron() {
        let manager = ScheduleManager::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let schedule = manager.add_schedule("s1".to_string(), "t1".to_string(), FrameworkId::Soc2Type2, "0 9 * * *".to_string(), now).unwrap();
        assert!(schedule.next_run_at > now);
    }

    #[tokio::test]
    async fn disabled_schedule_is_skipped() {
        let manager = ScheduleManager::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 1).unwrap();
        manager.add_schedule("s1".to_string(), "t1".to_string(), FrameworkId::Soc2Type2, "0 9 * * *".to_string(), now - chrono::Duration::days(1)).unwrap();
        manager.disable("s1");

        let runs = manager.process_due_schedules(now, &CancellationToken::none(), |_| async { Ok(()) }).await;
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn manual_run_is_always_allowed() {
        let manager = ScheduleManager::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        manager.add_schedule("s1".to_string(), "t1".to_string(), FrameworkId::Soc2Type2, "0 9 * * *".to_string(), now).unwrap();

        let run = manager.run_schedule("s1", now, &CancellationToken::none(), |_| async { Ok(()) }).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn cancelled_token_stops_process_due_schedules_before_any_run() {
        let manager = ScheduleManager::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 1).unwrap();
        manager.add_schedule("s1".to_string(), "t1".to_string(), FrameworkId::Soc2Type2, "0 9 * * *".to_string(), now - chrono::Duration::days(1)).unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let runs = manager.process_due_schedules(now, &token, |_| async { Ok(()) }).await;
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_rejects_manual_run_schedule() {
        let manager = ScheduleManager::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        manager.add_schedule("s1".to_string(), "t1".to_string(), FrameworkId::Soc2Type2, "0 9 * * *".to_string(), now).unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let err = manager.run_schedule("s1", now, &token, |_| async { Ok(()) }).await.unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
    }

    #[tokio::test]
    async fn run_exceeding_deadline_is_recorded_as_failed_with_deadline_exceeded() {
        let manager = ScheduleManager::with_deadline_minutes(0);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        manager.add_schedule("s1".to_string(), "t1".to_string(), FrameworkId::Soc2Type2, "0 9 * * *".to_string(), now).unwrap();

        let run = manager
            .run_schedule("s1", now, &CancellationToken::none(), |_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("deadline_exceeded"));
    }
}
