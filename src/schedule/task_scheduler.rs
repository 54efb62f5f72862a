//! Windows Task Scheduler backend (`schtasks`)

use chrono::NaiveTime;
use tracing::{debug, info, warn};

use crate::models::{Frequency, Outcome};

use super::command::{run_with_timeout, ScheduledCommand};
use super::{Scheduler, SchedulerKind, SchedulerStatus, Timeouts, TASK_NAME};

/// Trigger flags for a frequency at a local time of day
pub fn schedule_args(frequency: Frequency, time: NaiveTime) -> Vec<String> {
    let start = time.format("%H:%M").to_string();
    let args: Vec<&str> = match frequency {
        Frequency::Daily => vec!["/SC", "DAILY", "/ST", start.as_str()],
        Frequency::Every12Hours => {
            vec!["/SC", "DAILY", "/ST", start.as_str(), "/RI", "720", "/DU", "24:00"]
        }
        Frequency::Every6Hours => {
            vec!["/SC", "DAILY", "/ST", start.as_str(), "/RI", "360", "/DU", "24:00"]
        }
        Frequency::Weekly => vec!["/SC", "WEEKLY", "/D", "SUN", "/ST", start.as_str()],
    };
    args.into_iter().map(String::from).collect()
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Scheduler backed by `schtasks.exe`
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    command: ScheduledCommand,
    timeouts: Timeouts,
}

impl TaskScheduler {
    pub fn new(command: ScheduledCommand, timeouts: Timeouts) -> Self {
        Self { command, timeouts }
    }

    /// Full `schtasks /Create` argument list
    pub fn create_args(&self, frequency: Frequency, time: NaiveTime) -> Vec<String> {
        let mut create = args(&["/Create", "/TN", TASK_NAME, "/F"]);
        create.extend(schedule_args(frequency, time));
        create.push("/TR".to_string());
        create.push(self.command.render());
        create
    }
}

impl Scheduler for TaskScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::TaskScheduler
    }

    fn setup_schedule(&self, frequency: Frequency, time: NaiveTime) -> Outcome {
        self.remove_schedule();

        let create = self.create_args(frequency, time);
        match run_with_timeout("schtasks", &create, None, self.timeouts.create) {
            Ok(output) if output.success => {
                info!(frequency = %frequency, "scheduled task created");
                Outcome::ok("Scheduled task created.")
            }
            Ok(output) => {
                warn!(code = ?output.code, "schtasks rejected the task");
                Outcome::failed(format!(
                    "Could not create scheduled task: {}",
                    output.stderr.trim()
                ))
            }
            Err(e) => {
                warn!(error = %e, "could not run schtasks");
                Outcome::failed(format!("Could not create scheduled task: {}", e))
            }
        }
    }

    fn remove_schedule(&self) {
        let delete = args(&["/Delete", "/TN", TASK_NAME, "/F"]);
        match run_with_timeout("schtasks", &delete, None, self.timeouts.query) {
            Ok(output) if output.success => debug!("scheduled task removed"),
            Ok(_) => debug!("no scheduled task to remove"),
            Err(e) => warn!(error = %e, "could not remove scheduled task"),
        }
    }

    fn status(&self) -> SchedulerStatus {
        let query = args(&["/Query", "/TN", TASK_NAME, "/FO", "LIST", "/V"]);
        match run_with_timeout("schtasks", &query, None, self.timeouts.query) {
            Ok(output) if output.success => SchedulerStatus::scheduled(output.stdout),
            Ok(_) => SchedulerStatus::not_scheduled(""),
            Err(e) => SchedulerStatus::not_scheduled(format!(
                "Could not query the task scheduler: {}",
                e
            )),
        }
    }
}
