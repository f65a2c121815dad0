use crate::error::SearchError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Per-parcel deadline and cancellation flag, polled between windows.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    deadline: Option<Instant>,
    stop: Option<Arc<AtomicBool>>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// `deadline_ms` of `None` means no deadline.
    pub fn from_millis(deadline_ms: Option<u64>) -> Self {
        match deadline_ms {
            Some(ms) => Self::unlimited().with_timeout(Duration::from_millis(ms)),
            None => Self::unlimited(),
        }
    }

    pub fn check(&self) -> Result<(), SearchError> {
        if let Some(flag) = &self.stop
            && flag.load(Ordering::Relaxed)
        {
            return Err(SearchError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(SearchError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_budget_continues() {
        assert!(Budget::unlimited().check().is_ok());
        assert!(Budget::from_millis(None).check().is_ok());
    }

    #[test]
    fn test_stop_flag_cancels() {
        let flag = Arc::new(AtomicBool::new(false));
        let budget = Budget::unlimited().with_stop_flag(flag.clone());
        assert!(budget.check().is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(budget.check(), Err(SearchError::Cancelled));
    }

    #[test]
    fn test_elapsed_deadline() {
        let budget = Budget::from_millis(Some(0));
        assert_eq!(budget.check(), Err(SearchError::DeadlineExceeded));
    }
}
