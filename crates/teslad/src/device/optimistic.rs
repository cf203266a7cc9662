use chrono::DateTime;
use chrono::Utc;

/// Believed state of an actuator whose commands are confirmed by later polls.
///
/// A local mutation (successful or not) stamps `last_local_mutation`; polled
/// values older than that stamp are ignored so a poll that was in flight
/// while a command ran cannot revert the command's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticState<T> {
    believed: T,
    last_local_mutation: Option<DateTime<Utc>>,
}

impl<T: Copy> OptimisticState<T> {
    pub fn new(initial: T) -> Self {
        Self {
            believed: initial,
            last_local_mutation: None,
        }
    }

    pub fn get(&self) -> T {
        self.believed
    }

    pub fn last_local_mutation(&self) -> Option<DateTime<Utc>> {
        self.last_local_mutation
    }

    /// Whether a poll taken at `poll_time` may overwrite the believed state
    pub fn accepts(&self, poll_time: DateTime<Utc>) -> bool {
        match self.last_local_mutation {
            Some(mutated_at) => poll_time >= mutated_at,
            None => true,
        }
    }

    /// The state that results from a poll taken at `poll_time`
    ///
    /// An absent polled value, or one from before the last local mutation,
    /// leaves the believed state as it is.
    pub fn reconcile(&self, poll_time: DateTime<Utc>, polled: Option<T>) -> T {
        match polled {
            Some(value) if self.accepts(poll_time) => value,
            _ => self.believed,
        }
    }

    pub fn apply_poll(&mut self, poll_time: DateTime<Utc>, polled: Option<T>) {
        self.believed = self.reconcile(poll_time, polled);
    }

    /// Record a local command attempt made at `at`
    ///
    /// `confirmed` carries the new state when the command succeeded. The
    /// timestamp advances either way.
    pub fn record_local_mutation(&mut self, at: DateTime<Utc>, confirmed: Option<T>) {
        if let Some(value) = confirmed {
            self.believed = value;
        }
        self.last_local_mutation = Some(at);
    }
}
