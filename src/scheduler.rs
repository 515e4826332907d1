// Repeats archive passes on a cron expression (local time) or a fixed interval.
// A pass always runs to completion before the next delay starts, so passes never overlap.

use crate::config::ScheduleConfig;
use chrono::{DateTime, Local};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub enum Schedule {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl Schedule {
    pub fn from_config(config: &ScheduleConfig) -> anyhow::Result<Self> {
        match (&config.cron, config.interval_secs) {
            (Some(expr), None) => {
                let schedule = cron::Schedule::from_str(expr)
                    .map_err(|e| anyhow::anyhow!("invalid cron expression {:?}: {}", expr, e))?;
                Ok(Schedule::Cron(Box::new(schedule)))
            }
            (None, Some(secs)) if secs > 0 => Ok(Schedule::Every(Duration::from_secs(secs))),
            _ => anyhow::bail!("schedule must set exactly one of cron or interval_secs"),
        }
    }

    /// Delay from `now` until the next pass, or None when the cron expression has no future firing.
    pub fn next_delay(&self, now: DateTime<Local>) -> Option<Duration> {
        match self {
            Schedule::Cron(schedule) => {
                let next = schedule.after(&now).next()?;
                Some((next - now).to_std().unwrap_or(Duration::from_secs(1)))
            }
            Schedule::Every(interval) => Some(*interval),
        }
    }

    /// Interval schedules run a pass at startup; cron schedules wait for the first firing.
    fn runs_at_startup(&self) -> bool {
        matches!(self, Schedule::Every(_))
    }
}

/// Run `job` on `schedule` until `shutdown_rx` fires. Returns the number of passes run.
pub async fn run<F, Fut>(
    schedule: Schedule,
    mut shutdown_rx: oneshot::Receiver<()>,
    mut job: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut passes: u64 = 0;
    if schedule.runs_at_startup() {
        job().await;
        passes += 1;
    }

    loop {
        let Some(delay) = schedule.next_delay(Local::now()) else {
            warn!("schedule has no upcoming run; stopping");
            break;
        };
        debug!(delay_secs = delay.as_secs(), "next archive pass scheduled");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                job().await;
                passes += 1;
            }
            _ = &mut shutdown_rx => {
                info!(passes, "scheduler shutting down");
                break;
            }
        }
    }
    passes
}
