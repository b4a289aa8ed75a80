//! Tag-scoped job scheduler
//!
//! Two disjoint job sets live here: the `history` tag holds the history
//! sampler, the `user` tag holds jobs built from admin schedule rows. A
//! tag is always cleared and rebuilt as a whole, never diffed.

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Utc, Weekday};
use mcpanel_core::{
    CommandKind, Error, IntervalUnit, RemoteCommand, Result, ScheduleAction, ScheduleDefinition,
};
use mcpanel_db::Database;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::backup::BackupEngine;
use crate::history::HistoryEngine;
use crate::registry::ServerRegistry;

pub const HISTORY_TAG: &str = "history";
pub const USER_TAG: &str = "user";

/// Source recorded on mailbox rows submitted by the scheduler
pub const SCHEDULER_SOURCE: &str = "scheduler";

const TICK: Duration = Duration::from_secs(1);
const HISTORY_SYNC_TICKS: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum JobAction {
    SampleHistory,
    /// Lifecycle actions go back through the mailbox
    Submit { kind: CommandKind, server_id: u32 },
    Backup { server_id: u32 },
    Command { server_id: u32, text: String },
}

/// When a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed period measured from the last run
    Every(chrono::Duration),
    /// Every `days` days at a wall-clock time
    Daily { days: u32, at: NaiveTime },
    /// Every `weeks` weeks on a weekday at a wall-clock time
    Weekly {
        weekday: Weekday,
        weeks: u32,
        at: NaiveTime,
    },
}

impl Cadence {
    pub fn from_definition(def: &ScheduleDefinition) -> Result<Self> {
        if def.interval == 0 {
            return Err(Error::InvalidSchedule(format!(
                "schedule {} has a zero interval",
                def.id
            )));
        }
        let n = i64::from(def.interval);
        let at = def.start_time()?;

        Ok(match (def.unit()?, at) {
            (IntervalUnit::Seconds, _) => Cadence::Every(chrono::Duration::seconds(n)),
            (IntervalUnit::Minutes, _) => Cadence::Every(chrono::Duration::minutes(n)),
            (IntervalUnit::Hours, _) => Cadence::Every(chrono::Duration::hours(n)),
            (IntervalUnit::Days, None) => Cadence::Every(chrono::Duration::days(n)),
            (IntervalUnit::Days, Some(at)) => Cadence::Daily {
                days: def.interval,
                at,
            },
            (IntervalUnit::Weekday(weekday), at) => Cadence::Weekly {
                weekday,
                weeks: def.interval,
                at: at.unwrap_or_default(),
            },
        })
    }

    /// First run at or after `now`
    pub fn first_run(&self, now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            Cadence::Every(period) => now + period,
            Cadence::Daily { at, .. } => {
                let today = now.date().and_time(at);
                if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                }
            }
            Cadence::Weekly { weekday, at, .. } => {
                let ahead = (7 + weekday.num_days_from_monday() as i64
                    - now.weekday().num_days_from_monday() as i64)
                    % 7;
                let candidate = now.date().and_time(at) + chrono::Duration::days(ahead);
                if candidate > now {
                    candidate
                } else {
                    candidate + chrono::Duration::weeks(1)
                }
            }
        }
    }

    /// Next run after the one scheduled at `previous` fired at `now`
    pub fn next_run(&self, previous: NaiveDateTime, now: NaiveDateTime) -> NaiveDateTime {
        let period = match *self {
            Cadence::Every(period) => return now + period,
            Cadence::Daily { days, .. } => chrono::Duration::days(i64::from(days)),
            Cadence::Weekly { weeks, .. } => chrono::Duration::weeks(i64::from(weeks)),
        };

        // Missed runs are skipped, not replayed
        let mut next = previous + period;
        while next <= now {
            next += period;
        }
        next
    }
}

#[derive(Debug, Clone)]
struct Job {
    tag: &'static str,
    action: JobAction,
    cadence: Cadence,
    next_run: NaiveDateTime,
}

pub struct Scheduler {
    db: Database,
    registry: Arc<ServerRegistry>,
    backups: Arc<BackupEngine>,
    history: Arc<HistoryEngine>,
    jobs: Mutex<Vec<Job>>,
    history_interval: Mutex<Option<u32>>,
}

impl Scheduler {
    pub fn new(
        db: Database,
        registry: Arc<ServerRegistry>,
        backups: Arc<BackupEngine>,
        history: Arc<HistoryEngine>,
    ) -> Self {
        Self {
            db,
            registry,
            backups,
            history,
            jobs: Mutex::new(Vec::new()),
            history_interval: Mutex::new(None),
        }
    }

    pub fn clear_tag(&self, tag: &str) {
        self.jobs.lock().retain(|job| job.tag != tag);
    }

    pub fn job_count(&self, tag: &str) -> usize {
        self.jobs.lock().iter().filter(|job| job.tag == tag).count()
    }

    /// Upcoming run times of a tag's jobs
    pub fn next_runs(&self, tag: &str) -> Vec<NaiveDateTime> {
        self.jobs
            .lock()
            .iter()
            .filter(|job| job.tag == tag)
            .map(|job| job.next_run)
            .collect()
    }

    fn push(&self, tag: &'static str, action: JobAction, cadence: Cadence, now: NaiveDateTime) {
        let next_run = cadence.first_run(now);
        debug!("Scheduled {:?} ({}) first at {}", action, tag, next_run);
        self.jobs.lock().push(Job {
            tag,
            action,
            cadence,
            next_run,
        });
    }

    /// Register the history sampler, replacing it if the interval changed.
    ///
    /// Returns whether the job was (re)registered.
    pub async fn sync_history_job(&self, now: NaiveDateTime) -> Result<bool> {
        let interval = self.db.panel().get().await?.history_interval.max(1);

        if *self.history_interval.lock() == Some(interval) && self.job_count(HISTORY_TAG) > 0 {
            return Ok(false);
        }

        self.clear_tag(HISTORY_TAG);
        self.push(
            HISTORY_TAG,
            JobAction::SampleHistory,
            Cadence::Every(chrono::Duration::minutes(i64::from(interval))),
            now,
        );
        *self.history_interval.lock() = Some(interval);
        info!("History sampling every {} minute(s)", interval);
        Ok(true)
    }

    /// Clear and rebuild every user job from the store.
    ///
    /// Disabled and malformed definitions are skipped. Returns the number
    /// of jobs registered.
    pub async fn reload_user_jobs(&self, now: NaiveDateTime) -> Result<usize> {
        let definitions = self.db.schedules().get_all().await?;
        self.clear_tag(USER_TAG);

        let mut loaded = 0;
        for def in &definitions {
            if !def.enabled {
                debug!("Schedule {} is disabled", def.id);
                continue;
            }
            match user_job(def) {
                Ok((action, cadence)) => {
                    self.push(USER_TAG, action, cadence, now);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping schedule {}: {}", def.id, e),
            }
        }

        info!("Loaded {} of {} user schedule(s)", loaded, definitions.len());
        Ok(loaded)
    }

    /// Run every job due at `now`; returns how many ran
    pub async fn run_pending(&self, now: NaiveDateTime) -> usize {
        let due: Vec<JobAction> = {
            let mut jobs = self.jobs.lock();
            jobs.iter_mut()
                .filter(|job| job.next_run <= now)
                .map(|job| {
                    job.next_run = job.cadence.next_run(job.next_run, now);
                    job.action.clone()
                })
                .collect()
        };

        for action in &due {
            if let Err(e) = self.execute(action).await {
                error!("Scheduled job {:?} failed: {}", action, e);
            }
        }
        due.len()
    }

    async fn execute(&self, action: &JobAction) -> Result<()> {
        match action {
            JobAction::SampleHistory => {
                self.history.sample_all(Utc::now()).await;
            }
            JobAction::Submit { kind, server_id } => {
                let command = RemoteCommand::new(*kind, *server_id, SCHEDULER_SOURCE);
                if !self.db.remote().submit(&command).await? {
                    warn!(
                        "Command slot busy, scheduled {} for server {} dropped",
                        kind, server_id
                    );
                }
            }
            JobAction::Backup { server_id } => {
                self.backups.backup(*server_id, true).await?;
            }
            JobAction::Command { server_id, text } => {
                self.registry.get(*server_id)?.send_command(text)?;
            }
        }
        Ok(())
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticks = 0u32;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Scheduler stopping");
                    break;
                }
                _ = tokio::time::sleep(TICK) => {
                    let now = Local::now().naive_local();
                    ticks += 1;
                    if ticks % HISTORY_SYNC_TICKS == 0 {
                        if let Err(e) = self.sync_history_job(now).await {
                            warn!("Failed to refresh history schedule: {}", e);
                        }
                    }
                    self.run_pending(now).await;
                }
            }
        }
    }
}

fn user_job(def: &ScheduleDefinition) -> Result<(JobAction, Cadence)> {
    let cadence = Cadence::from_definition(def)?;
    let server_id = def.server_id;

    let action = match def.action()? {
        ScheduleAction::Start => JobAction::Submit {
            kind: CommandKind::StartServer,
            server_id,
        },
        ScheduleAction::Stop => JobAction::Submit {
            kind: CommandKind::StopServer,
            server_id,
        },
        ScheduleAction::Restart => JobAction::Submit {
            kind: CommandKind::RestartServer,
            server_id,
        },
        ScheduleAction::Backup => JobAction::Backup { server_id },
        ScheduleAction::Command => {
            let text = def
                .command
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    Error::InvalidSchedule(format!("schedule {} has no command text", def.id))
                })?;
            JobAction::Command {
                server_id,
                text: text.to_string(),
            }
        }
    };

    Ok((action, cadence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::TarGzArchiver;
    use crate::test_support::{fixture, Fixture, MockPinger};
    use chrono::NaiveDate;
    use mcpanel_core::PanelSettings;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn definition(action: &str, interval: u32, unit: &str, start: Option<&str>) -> ScheduleDefinition {
        ScheduleDefinition {
            id: 0,
            server_id: 1,
            enabled: true,
            action: action.to_string(),
            interval,
            interval_type: unit.to_string(),
            start_time: start.map(str::to_string),
            command: None,
            comment: String::new(),
        }
    }

    fn scheduler(fx: &Fixture) -> Scheduler {
        let backups = Arc::new(BackupEngine::new(
            fx.db.clone(),
            fx.registry.clone(),
            Arc::new(TarGzArchiver),
        ));
        let history = Arc::new(HistoryEngine::new(
            fx.db.clone(),
            fx.registry.clone(),
            fx.pinger.clone(),
            fx.ctx.host.clone(),
        ));
        Scheduler::new(fx.db.clone(), fx.registry.clone(), backups, history)
    }

    #[test]
    fn test_interval_cadence() {
        let now = at(2024, 3, 6, 10, 0);
        let cadence = Cadence::from_definition(&definition("restart", 30, "minutes", None)).unwrap();
        assert_eq!(cadence.first_run(now), at(2024, 3, 6, 10, 30));
        assert_eq!(cadence.next_run(at(2024, 3, 6, 10, 30), at(2024, 3, 6, 10, 31)), at(2024, 3, 6, 11, 1));
    }

    #[test]
    fn test_daily_cadence() {
        let cadence = Cadence::from_definition(&definition("backup", 1, "days", Some("04:30"))).unwrap();
        assert_eq!(cadence.first_run(at(2024, 3, 6, 3, 0)), at(2024, 3, 6, 4, 30));
        assert_eq!(cadence.first_run(at(2024, 3, 6, 10, 0)), at(2024, 3, 7, 4, 30));

        let every_other = Cadence::from_definition(&definition("backup", 2, "days", Some("04:30"))).unwrap();
        assert_eq!(
            every_other.next_run(at(2024, 3, 7, 4, 30), at(2024, 3, 7, 4, 30)),
            at(2024, 3, 9, 4, 30)
        );
    }

    #[test]
    fn test_weekday_cadence() {
        // 2024-03-06 is a Wednesday
        let cadence = Cadence::from_definition(&definition("stop", 2, "monday", Some("08:00"))).unwrap();
        assert_eq!(cadence.first_run(at(2024, 3, 6, 12, 0)), at(2024, 3, 11, 8, 0));
        assert_eq!(
            cadence.next_run(at(2024, 3, 11, 8, 0), at(2024, 3, 11, 8, 0)),
            at(2024, 3, 25, 8, 0)
        );

        let same_day = Cadence::from_definition(&definition("stop", 1, "wednesday", Some("18:00"))).unwrap();
        assert_eq!(same_day.first_run(at(2024, 3, 6, 12, 0)), at(2024, 3, 6, 18, 0));
    }

    #[test]
    fn test_missed_runs_are_skipped() {
        let cadence = Cadence::from_definition(&definition("backup", 1, "days", Some("04:30"))).unwrap();
        let next = cadence.next_run(at(2024, 3, 1, 4, 30), at(2024, 3, 5, 12, 0));
        assert_eq!(next, at(2024, 3, 6, 4, 30));
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(Cadence::from_definition(&definition("start", 0, "minutes", None)).is_err());
        assert!(Cadence::from_definition(&definition("start", 1, "fortnights", None)).is_err());
        assert!(user_job(&definition("command", 1, "hours", None)).is_err());
        assert!(user_job(&definition("explode", 1, "hours", None)).is_err());
    }

    #[tokio::test]
    async fn test_reload_rebuilds_user_jobs() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sched = scheduler(&fx);
        let now = at(2024, 3, 6, 10, 0);

        let mut disabled = definition("start", 1, "hours", None);
        disabled.enabled = false;
        for def in [
            definition("backup", 1, "days", Some("04:30")),
            definition("restart", 6, "hours", None),
            disabled,
            definition("start", 1, "fortnights", None),
        ] {
            fx.db.schedules().insert(&def).await.unwrap();
        }

        assert_eq!(sched.reload_user_jobs(now).await.unwrap(), 2);
        assert_eq!(sched.reload_user_jobs(now).await.unwrap(), 2);
        assert_eq!(sched.job_count(USER_TAG), 2);

        sched.sync_history_job(now).await.unwrap();
        sched.clear_tag(USER_TAG);
        assert_eq!(sched.job_count(USER_TAG), 0);
        assert_eq!(sched.job_count(HISTORY_TAG), 1);
    }

    #[tokio::test]
    async fn test_history_job_follows_interval() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sched = scheduler(&fx);
        let now = at(2024, 3, 6, 10, 0);

        assert!(sched.sync_history_job(now).await.unwrap());
        assert!(!sched.sync_history_job(now).await.unwrap());
        assert_eq!(sched.next_runs(HISTORY_TAG), vec![at(2024, 3, 6, 11, 0)]);

        fx.db
            .panel()
            .set(&PanelSettings {
                history_interval: 5,
                history_max_age: 2,
            })
            .await
            .unwrap();
        assert!(sched.sync_history_job(now).await.unwrap());
        assert_eq!(sched.job_count(HISTORY_TAG), 1);
        assert_eq!(sched.next_runs(HISTORY_TAG), vec![at(2024, 3, 6, 10, 5)]);
    }

    #[tokio::test]
    async fn test_lifecycle_jobs_go_through_mailbox() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sched = scheduler(&fx);
        let now = at(2024, 3, 6, 10, 0);

        let mut def = definition("restart", 1, "minutes", None);
        def.server_id = 7;
        fx.db.schedules().insert(&def).await.unwrap();
        sched.reload_user_jobs(now).await.unwrap();

        assert_eq!(sched.run_pending(now).await, 0);
        assert_eq!(sched.run_pending(at(2024, 3, 6, 10, 1)).await, 1);

        let slot = fx.db.remote().peek().await.unwrap().unwrap();
        let command = slot.to_command().unwrap();
        assert_eq!(command.kind, CommandKind::RestartServer);
        assert_eq!(command.server_id, 7);
        assert_eq!(command.source, SCHEDULER_SOURCE);
        assert_eq!(sched.next_runs(USER_TAG), vec![at(2024, 3, 6, 10, 2)]);
    }

    #[tokio::test]
    async fn test_failing_job_does_not_stop_others() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;
        let sched = scheduler(&fx);
        let now = at(2024, 3, 6, 10, 0);

        // Console command to a stopped server fails; the submit still runs
        let mut console = definition("command", 1, "minutes", None);
        console.server_id = sup.id();
        console.command = Some("say hello".to_string());
        let mut start = definition("start", 1, "minutes", None);
        start.server_id = sup.id();
        fx.db.schedules().insert(&console).await.unwrap();
        fx.db.schedules().insert(&start).await.unwrap();
        sched.reload_user_jobs(now).await.unwrap();

        assert_eq!(sched.run_pending(at(2024, 3, 6, 10, 1)).await, 2);
        assert!(fx.db.remote().peek().await.unwrap().is_some());
    }
}
