use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::LimitConfig;
use crate::error::{PlanError, Result};

/// Cooperative cancellation shared between the caller and a running plan.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Step and wall-clock allowance for one plan.
#[derive(Debug)]
pub struct ComputeBudget {
    max_steps: u64,
    steps: u64,
    wall_clock: Option<(Instant, Duration)>,
    cancel: Option<CancelToken>,
}

impl ComputeBudget {
    pub fn new(limits: &LimitConfig, cancel: Option<CancelToken>) -> Self {
        let wall_clock = (limits.max_wall_clock_sec > 0).then(|| {
            (
                Instant::now(),
                Duration::from_secs(limits.max_wall_clock_sec),
            )
        });
        Self {
            max_steps: limits.max_steps,
            steps: 0,
            wall_clock,
            cancel,
        }
    }

    /// Charge one simulation step.
    pub fn tick(&mut self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(PlanError::Cancelled);
        }
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(PlanError::ExcessiveTime {
                reason: format!("step budget of {} exhausted", self.max_steps),
            });
        }
        if let Some((started, limit)) = self.wall_clock {
            if started.elapsed() > limit {
                return Err(PlanError::ExcessiveTime {
                    reason: format!("wall-clock budget of {} s exhausted", limit.as_secs()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_steps: u64) -> LimitConfig {
        LimitConfig {
            max_steps,
            ..LimitConfig::default()
        }
    }

    #[test]
    fn test_step_budget_exhausts() {
        let mut budget = ComputeBudget::new(&limits(3), None);
        for _ in 0..3 {
            budget.tick().unwrap();
        }
        let err = budget.tick().unwrap_err();
        assert_eq!(
            err,
            PlanError::ExcessiveTime {
                reason: "step budget of 3 exhausted".to_string()
            }
        );
        assert!(budget.tick().is_err(), "an exhausted budget stays exhausted");
    }

    #[test]
    fn test_cancellation_is_observed() {
        let token = CancelToken::new();
        let mut budget = ComputeBudget::new(&limits(100), Some(token.clone()));
        budget.tick().unwrap();
        token.cancel();
        assert_eq!(budget.tick(), Err(PlanError::Cancelled));
    }
}
