//! Clock port: lets tests pin "now".

use std::sync::Arc;

use autorule_domain::time::Timestamp;
use chrono::NaiveDateTime;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> Timestamp;

    /// Current wall-clock time in the host's local timezone.
    ///
    /// Time-of-day and day-of-week conditions are evaluated against this.
    fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&chrono::Local).naive_local()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        autorule_domain::time::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn local_now(&self) -> NaiveDateTime {
        (**self).local_now()
    }
}
