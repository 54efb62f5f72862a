//! OS-level scheduling of unattended backups
//!
//! The trigger lives in the host scheduler (cron on Unix, Task Scheduler on
//! Windows) and runs `gastro backup create --scheduled --cleanup`. Nothing
//! here runs inside the process on a timer.

mod command;
mod cron;
mod task_scheduler;

use std::fmt;
use std::time::Duration;

use chrono::NaiveTime;
use serde::Serialize;

use crate::models::{Frequency, Outcome};

pub use command::{run_with_timeout, CommandOutput, ScheduledCommand};
pub use cron::{cron_expression, CronScheduler, CrontabBackend, SystemCrontab};
pub use task_scheduler::{schedule_args, TaskScheduler};

/// Identity of the installed trigger (task name, cron marker comment)
pub const TASK_NAME: &str = "GastroSaaS_DatabaseBackup";

/// Upper bounds for OS tool invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Queries and removals
    pub query: Duration,
    /// Creating the trigger
    pub create: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            query: Duration::from_secs(10),
            create: Duration::from_secs(15),
        }
    }
}

impl Timeouts {
    /// Same bound for every invocation
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            query: timeout,
            create: timeout,
        }
    }
}

/// Whether the trigger is installed, plus whatever the OS reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub is_scheduled: bool,
    pub details: String,
}

impl SchedulerStatus {
    pub fn scheduled(details: impl Into<String>) -> Self {
        Self {
            is_scheduled: true,
            details: details.into(),
        }
    }

    pub fn not_scheduled(details: impl Into<String>) -> Self {
        Self {
            is_scheduled: false,
            details: details.into(),
        }
    }
}

/// Which host scheduler is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerKind {
    Cron,
    TaskScheduler,
    Unsupported,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron => write!(f, "cron"),
            Self::TaskScheduler => write!(f, "Task Scheduler"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// A host scheduler able to hold one backup trigger
pub trait Scheduler {
    fn kind(&self) -> SchedulerKind;

    /// Replace any existing trigger with one for `frequency` at `time`
    fn setup_schedule(&self, frequency: Frequency, time: NaiveTime) -> Outcome;

    /// Remove the trigger if present; errors are only logged
    fn remove_schedule(&self);

    fn status(&self) -> SchedulerStatus;
}

/// Stand-in for platforms with no supported scheduler
#[derive(Debug, Clone)]
pub struct UnsupportedScheduler {
    os: String,
}

impl UnsupportedScheduler {
    pub fn new(os: impl Into<String>) -> Self {
        Self { os: os.into() }
    }

    fn message(&self) -> String {
        format!("Unsupported platform: {}", self.os)
    }
}

impl Scheduler for UnsupportedScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Unsupported
    }

    fn setup_schedule(&self, _frequency: Frequency, _time: NaiveTime) -> Outcome {
        Outcome::failed(self.message())
    }

    fn remove_schedule(&self) {}

    fn status(&self) -> SchedulerStatus {
        SchedulerStatus::not_scheduled(self.message())
    }
}

/// Pick the scheduler for the host platform
pub fn detect_scheduler(command: ScheduledCommand, timeouts: Timeouts) -> Box<dyn Scheduler> {
    if cfg!(windows) {
        Box::new(TaskScheduler::new(command, timeouts))
    } else if cfg!(unix) {
        Box::new(CronScheduler::new(SystemCrontab::new(timeouts), command))
    } else {
        Box::new(UnsupportedScheduler::new(std::env::consts::OS))
    }
}
