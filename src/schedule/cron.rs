//! Unix cron backend
//!
//! The installed trigger is a single crontab line ending in
//! `# GastroSaaS_DatabaseBackup`. Every write filters out existing lines
//! carrying that marker, so at most one ever exists.

use chrono::{NaiveTime, Timelike};
use tracing::{debug, info, warn};

use crate::error::{GastroError, GastroResult};
use crate::models::{Frequency, Outcome};

use super::command::{run_with_timeout, ScheduledCommand};
use super::{Scheduler, SchedulerKind, SchedulerStatus, Timeouts, TASK_NAME};

/// Read and replace the current user's crontab
pub trait CrontabBackend {
    /// Current crontab, or `None` when the user has none
    fn read(&self) -> GastroResult<Option<String>>;

    /// Replace the whole crontab
    fn write(&self, contents: &str) -> GastroResult<()>;
}

/// `crontab -l` / `crontab -`
#[derive(Debug, Clone)]
pub struct SystemCrontab {
    timeouts: Timeouts,
}

impl SystemCrontab {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }
}

impl CrontabBackend for SystemCrontab {
    fn read(&self) -> GastroResult<Option<String>> {
        let output = run_with_timeout("crontab", &["-l".to_string()], None, self.timeouts.query)?;
        // crontab -l exits nonzero when the user has no crontab yet
        Ok(output.success.then_some(output.stdout))
    }

    fn write(&self, contents: &str) -> GastroResult<()> {
        let output = run_with_timeout(
            "crontab",
            &["-".to_string()],
            Some(contents),
            self.timeouts.create,
        )?;
        if output.success {
            Ok(())
        } else {
            Err(GastroError::Scheduler(output.stderr.trim().to_string()))
        }
    }
}

/// Cron expression for a frequency at a local time of day
pub fn cron_expression(frequency: Frequency, time: NaiveTime) -> String {
    let (hour, minute) = (time.hour(), time.minute());
    match frequency {
        Frequency::Daily => format!("{} {} * * *", minute, hour),
        Frequency::Weekly => format!("{} {} * * 0", minute, hour),
        Frequency::Every12Hours | Frequency::Every6Hours => {
            let step = frequency.interval_hours().unwrap_or(24);
            let mut hours: Vec<u32> = (0..24 / step).map(|i| (hour + i * step) % 24).collect();
            hours.sort_unstable();
            let hours: Vec<String> = hours.iter().map(u32::to_string).collect();
            format!("{} {} * * *", minute, hours.join(","))
        }
    }
}

/// Lines of `crontab` that do not belong to us, blanks dropped
fn foreign_lines(crontab: &str) -> Vec<&str> {
    crontab
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.contains(TASK_NAME))
        .collect()
}

fn join_crontab(lines: &[&str]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    }
}

/// Scheduler backed by cron
#[derive(Debug, Clone)]
pub struct CronScheduler<B: CrontabBackend> {
    backend: B,
    command: ScheduledCommand,
}

impl<B: CrontabBackend> CronScheduler<B> {
    pub fn new(backend: B, command: ScheduledCommand) -> Self {
        Self { backend, command }
    }

    /// The full crontab line for a frequency and time
    pub fn cron_line(&self, frequency: Frequency, time: NaiveTime) -> String {
        format!(
            "{} {} # {}",
            cron_expression(frequency, time),
            self.command.render(),
            TASK_NAME
        )
    }

    fn install(&self, line: &str) -> GastroResult<()> {
        let existing = self.backend.read()?.unwrap_or_default();
        let mut lines = foreign_lines(&existing);
        lines.push(line);
        self.backend.write(&join_crontab(&lines))
    }
}

impl<B: CrontabBackend> Scheduler for CronScheduler<B> {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Cron
    }

    fn setup_schedule(&self, frequency: Frequency, time: NaiveTime) -> Outcome {
        self.remove_schedule();

        let line = self.cron_line(frequency, time);
        match self.install(&line) {
            Ok(()) => {
                info!(frequency = %frequency, "cron job installed");
                Outcome::ok(format!(
                    "Cron job created ({}).",
                    cron_expression(frequency, time)
                ))
            }
            Err(e) => {
                warn!(error = %e, "could not install cron job");
                Outcome::failed(format!("Could not create cron job: {}", e))
            }
        }
    }

    fn remove_schedule(&self) {
        let existing = match self.backend.read() {
            Ok(Some(existing)) => existing,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "could not read crontab");
                return;
            }
        };
        if !existing.contains(TASK_NAME) {
            return;
        }

        match self.backend.write(&join_crontab(&foreign_lines(&existing))) {
            Ok(()) => debug!("cron job removed"),
            Err(e) => warn!(error = %e, "could not remove cron job"),
        }
    }

    fn status(&self) -> SchedulerStatus {
        match self.backend.read() {
            Ok(Some(crontab)) if crontab.contains(TASK_NAME) => {
                let ours: Vec<&str> = crontab
                    .lines()
                    .filter(|line| line.contains(TASK_NAME))
                    .collect();
                SchedulerStatus::scheduled(ours.join("\n"))
            }
            Ok(_) => SchedulerStatus::not_scheduled(""),
            Err(e) => SchedulerStatus::not_scheduled(format!("Could not read crontab: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// In-memory crontab
    #[derive(Default)]
    struct MemoryCrontab {
        contents: RefCell<Option<String>>,
        writes: Cell<usize>,
        fail_writes: bool,
    }

    impl MemoryCrontab {
        fn with(contents: &str) -> Self {
            Self {
                contents: RefCell::new(Some(contents.to_string())),
                ..Self::default()
            }
        }
    }

    impl CrontabBackend for &MemoryCrontab {
        fn read(&self) -> GastroResult<Option<String>> {
            Ok(self.contents.borrow().clone())
        }

        fn write(&self, contents: &str) -> GastroResult<()> {
            if self.fail_writes {
                return Err(GastroError::Scheduler("crontab: permission denied".into()));
            }
            self.writes.set(self.writes.get() + 1);
            *self.contents.borrow_mut() = Some(contents.to_string());
            Ok(())
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn scheduler(backend: &MemoryCrontab) -> CronScheduler<&MemoryCrontab> {
        CronScheduler::new(backend, ScheduledCommand::new("/usr/bin/gastro", "/srv/gastro"))
    }

    #[test]
    fn test_cron_expressions() {
        assert_eq!(cron_expression(Frequency::Daily, at(3, 0)), "0 3 * * *");
        assert_eq!(cron_expression(Frequency::Weekly, at(23, 45)), "45 23 * * 0");
        assert_eq!(cron_expression(Frequency::Every12Hours, at(3, 15)), "15 3,15 * * *");
        assert_eq!(cron_expression(Frequency::Every12Hours, at(18, 0)), "0 6,18 * * *");
        assert_eq!(
            cron_expression(Frequency::Every6Hours, at(3, 0)),
            "0 3,9,15,21 * * *"
        );
        assert_eq!(
            cron_expression(Frequency::Every6Hours, at(22, 30)),
            "30 4,10,16,22 * * *"
        );
    }

    #[test]
    fn test_setup_keeps_foreign_lines() {
        let backend = MemoryCrontab::with("MAILTO=ops@example.com\n\n15 * * * * /usr/bin/rotate\n");
        let outcome = scheduler(&backend).setup_schedule(Frequency::Daily, at(3, 0));
        assert!(outcome.success, "{}", outcome.message);

        let crontab = backend.contents.borrow().clone().unwrap();
        let lines: Vec<&str> = crontab.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "MAILTO=ops@example.com");
        assert_eq!(lines[1], "15 * * * * /usr/bin/rotate");
        assert_eq!(
            lines[2],
            "0 3 * * * \"/usr/bin/gastro\" --data-dir \"/srv/gastro\" backup create --scheduled --cleanup # GastroSaaS_DatabaseBackup"
        );
    }

    #[test]
    fn test_setup_is_idempotent() {
        let backend = MemoryCrontab::default();
        let cron = scheduler(&backend);

        cron.setup_schedule(Frequency::Daily, at(3, 0));
        cron.setup_schedule(Frequency::Every6Hours, at(1, 0));
        cron.setup_schedule(Frequency::Every6Hours, at(1, 0));

        let crontab = backend.contents.borrow().clone().unwrap();
        assert_eq!(crontab.matches(TASK_NAME).count(), 1);
        assert!(crontab.starts_with("0 1,7,13,19 * * *"));
    }

    #[test]
    fn test_remove_and_status() {
        let backend = MemoryCrontab::with("15 * * * * /usr/bin/rotate\n");
        let cron = scheduler(&backend);
        assert!(!cron.status().is_scheduled);

        cron.setup_schedule(Frequency::Weekly, at(4, 0));
        let status = cron.status();
        assert!(status.is_scheduled);
        assert!(status.details.starts_with("0 4 * * 0"));

        cron.remove_schedule();
        assert!(!cron.status().is_scheduled);
        assert_eq!(
            backend.contents.borrow().as_deref(),
            Some("15 * * * * /usr/bin/rotate\n")
        );
    }

    #[test]
    fn test_remove_without_entry_does_not_write() {
        let backend = MemoryCrontab::with("15 * * * * /usr/bin/rotate\n");
        scheduler(&backend).remove_schedule();
        assert_eq!(backend.writes.get(), 0);

        let empty = MemoryCrontab::default();
        scheduler(&empty).remove_schedule();
        assert_eq!(empty.writes.get(), 0);
    }

    #[test]
    fn test_setup_failure_is_reported() {
        let backend = MemoryCrontab {
            fail_writes: true,
            ..MemoryCrontab::default()
        };
        let outcome = scheduler(&backend).setup_schedule(Frequency::Daily, at(3, 0));
        assert!(!outcome.success);
        assert!(outcome.message.contains("permission denied"));
    }
}
