use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

pub fn thread_sleeper() -> Sleeper {
    Arc::new(thread::sleep)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    /// `None` lets the wait keep doubling without bound.
    pub max_delay_ms: Option<u64>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: Some(600_000),
        }
    }
}

impl ReconnectPolicy {
    pub fn uncapped() -> Self {
        Self {
            max_delay_ms: None,
            ..Self::default()
        }
    }

    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn next_wait(&self, previous: Duration) -> Duration {
        let doubled = previous.saturating_mul(2);
        match self.max_delay_ms {
            Some(max_ms) => doubled.min(Duration::from_millis(max_ms.max(self.initial_delay_ms))),
            None => doubled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    pub wait: Duration,
    pub attempt: u32,
}

impl BackoffState {
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            wait: policy.initial_wait(),
            attempt: 0,
        }
    }

    pub fn reset(&mut self, policy: &ReconnectPolicy) {
        *self = Self::new(policy);
    }

    /// Returns the wait to sleep now and moves on to the next one.
    pub fn advance(&mut self, policy: &ReconnectPolicy) -> Duration {
        let current = self.wait;
        self.attempt = self.attempt.saturating_add(1);
        self.wait = policy.next_wait(current);
        current
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{BackoffState, ReconnectPolicy};

    #[test]
    fn waits_double_from_one_second() {
        let policy = ReconnectPolicy::uncapped();
        let mut state = BackoffState::new(&policy);
        let waits = (0..5)
            .map(|_| state.advance(&policy).as_secs())
            .collect::<Vec<_>>();
        assert_eq!(waits, vec![1, 2, 4, 8, 16]);
        assert_eq!(state.attempt, 5);
    }

    #[test]
    fn reset_returns_to_initial_wait() {
        let policy = ReconnectPolicy::default();
        let mut state = BackoffState::new(&policy);
        state.advance(&policy);
        state.advance(&policy);
        state.reset(&policy);
        assert_eq!(state.wait, Duration::from_secs(1));
        assert_eq!(state.attempt, 0);
    }

    #[test]
    fn cap_bounds_growth() {
        let policy = ReconnectPolicy {
            initial_delay_ms: 1000,
            max_delay_ms: Some(5000),
        };
        let mut state = BackoffState::new(&policy);
        let waits = (0..6)
            .map(|_| state.advance(&policy).as_secs())
            .collect::<Vec<_>>();
        assert_eq!(waits, vec![1, 2, 4, 5, 5, 5]);
    }
}
