//! Scheduler configuration

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Capacity of the submission inbox; submissions beyond it fail
    /// the submitter (default: 100)
    pub inbox_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 100,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the submission inbox capacity
    pub fn inbox_capacity(mut self, n: usize) -> Self {
        self.inbox_capacity = n;
        self
    }

    /// Check the configuration for invalid values
    pub fn validate(&self) -> Result<(), String> {
        if self.inbox_capacity == 0 {
            return Err("inbox capacity must be positive".into());
        }
        Ok(())
    }
}
