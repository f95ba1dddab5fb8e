//! Competition scheduler
//!
//! ## Overview
//!
//! Two independent timers drive the lifecycle engine:
//! 1. Nightly tick (configured local wall-clock time): ends the due
//!    competition and pre-creates tomorrow's, each error-isolated
//! 2. Hourly tick: transitions upcoming competitions whose start time
//!    has passed
//!
//! The scheduler is an explicit object owning its timer tasks - no
//! global timer registry. Every operation it invokes is idempotent or
//! guarded by a conditional state check, so overlapping ticks and
//! manual invocations of the same engine methods are safe.
//!
//! On start it ensures today's competition exists (covering a process
//! that boots mid-day after a missed nightly run) and runs one status
//! pass immediately.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::competition::CompetitionEngine;
use crate::types::Result;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Hour of the nightly tick (local wall clock, 0-23)
    pub nightly_hour: u32,
    /// Minute of the nightly tick (0-59)
    pub nightly_minute: u32,
    /// Deployment timezone as an offset from UTC in minutes
    pub utc_offset_minutes: i32,
    /// Interval of the status-transition tick in seconds
    pub status_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            nightly_hour: 23,
            nightly_minute: 59,
            utc_offset_minutes: 0,
            status_interval_secs: 3600,
        }
    }
}

/// Scheduler owning the nightly and hourly timer tasks
pub struct CompetitionScheduler {
    config: SchedulerConfig,
    engine: Arc<CompetitionEngine>,
    nightly_shutdown: Option<mpsc::Sender<()>>,
    hourly_shutdown: Option<mpsc::Sender<()>>,
}

impl CompetitionScheduler {
    pub fn new(engine: Arc<CompetitionEngine>, config: SchedulerConfig) -> Self {
        Self {
            config,
            engine,
            nightly_shutdown: None,
            hourly_shutdown: None,
        }
    }

    /// Start both timer tasks. Runs the startup self-heal first:
    /// today's competition is created retroactively if missing and one
    /// status pass is executed immediately.
    pub async fn start(&mut self) -> Result<()> {
        info!(
            nightly = %format!("{:02}:{:02}", self.config.nightly_hour, self.config.nightly_minute),
            utc_offset_minutes = self.config.utc_offset_minutes,
            status_interval_secs = self.config.status_interval_secs,
            "Starting competition scheduler"
        );

        if let Err(e) = self.engine.create_daily_competition().await {
            error!(error = %e, "Startup: failed to ensure today's competition");
        }
        if let Err(e) = self.engine.update_competition_statuses().await {
            error!(error = %e, "Startup: status pass failed");
        }

        let (nightly_tx, mut nightly_rx) = mpsc::channel(1);
        self.nightly_shutdown = Some(nightly_tx);
        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        tokio::spawn(async move {
            loop {
                let delay = next_nightly_delay(Utc::now(), &config);
                debug!(delay_secs = delay.as_secs(), "Nightly tick sleeping");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => run_nightly_tick(&engine).await,
                    _ = nightly_rx.recv() => {
                        info!("Nightly tick stopped");
                        break;
                    }
                }
            }
        });

        let (hourly_tx, mut hourly_rx) = mpsc::channel(1);
        self.hourly_shutdown = Some(hourly_tx);
        let engine = Arc::clone(&self.engine);
        let interval = std::time::Duration::from_secs(self.config.status_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = engine.update_competition_statuses().await {
                            error!(error = %e, "Status tick failed");
                        }
                    }
                    _ = hourly_rx.recv() => {
                        info!("Status tick stopped");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop both timer tasks
    pub async fn stop(&mut self) {
        info!("Stopping competition scheduler");
        if let Some(tx) = self.nightly_shutdown.take() {
            let _ = tx.send(()).await;
        }
        if let Some(tx) = self.hourly_shutdown.take() {
            let _ = tx.send(()).await;
        }
    }
}

/// One nightly tick: end the due competition, then pre-create
/// tomorrow's. The two calls are error-isolated - a failure in the
/// first never prevents the second from running, and failures are
/// logged rather than crashing the loop.
async fn run_nightly_tick(engine: &CompetitionEngine) {
    match engine.end_competition_and_select_winners().await {
        Ok(Some(completed)) => info!(
            date = %completed.competition.date,
            winners = completed.winners.len(),
            "Nightly tick: competition completed"
        ),
        Ok(None) => debug!("Nightly tick: no competition due"),
        Err(e) => error!(error = %e, "Nightly tick: ending competition failed"),
    }

    if let Err(e) = engine.create_tomorrow_competition().await {
        error!(error = %e, "Nightly tick: creating tomorrow's competition failed");
    }
}

/// Duration until the next nightly fire instant. Local wall clock is
/// UTC plus the configured offset.
pub fn next_nightly_delay(now: DateTime<Utc>, config: &SchedulerConfig) -> std::time::Duration {
    let offset = Duration::minutes(config.utc_offset_minutes as i64);
    let local_now = now + offset;

    let fire_time =
        NaiveTime::from_hms_opt(config.nightly_hour.min(23), config.nightly_minute.min(59), 0)
            .unwrap_or(NaiveTime::MIN);

    let mut target = local_now.date_naive().and_time(fire_time).and_utc();
    if target <= local_now {
        target += Duration::days(1);
    }

    (target - local_now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60))
}
