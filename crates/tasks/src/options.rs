use chrono::NaiveDate;

/// What happens when writing to one transfer destination fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Record the failure and carry on with the next destination.
    #[default]
    FailIndependent,
    /// Stop at the first failing destination and return its error.
    FailFast,
}

/// Options shared by every task run.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Log the requests instead of sending writes.
    pub dryrun: bool,
    /// Write to the configured test sheet instead of the real destinations.
    pub use_testing: bool,
    /// Date of the backups read or written by the task.
    pub date: NaiveDate,
    pub dispatch: DispatchPolicy,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            dryrun: false,
            use_testing: false,
            date: chrono::Local::now().date_naive(),
            dispatch: DispatchPolicy::default(),
        }
    }
}

impl TaskOptions {
    pub fn dry_run() -> Self {
        Self {
            dryrun: true,
            ..Self::default()
        }
    }
}
