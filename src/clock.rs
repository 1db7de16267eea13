use chrono::{DateTime, Utc};

/// Abstracts wall-clock time so the engine can be driven by a fake clock in tests and by a
/// flashed RTC on embedded hosts.
///
/// The original C++ engine keeps a notion of "clock has been set" because many MCUs boot with
/// an unset RTC; operations like BootNotification and StartTransaction must not emit a bogus
/// `1970-01-01` timestamp before NTP/CSMS time sync has happened.
pub trait Clock: Send {
    /// Current wall-clock time, or `None` if the clock has never been synchronized.
    fn now(&self) -> Option<DateTime<Utc>>;

    /// Called by the engine (typically from a BootNotification response or a `Heartbeat`
    /// CALLRESULT) once the CSMS has told us the current time.
    fn set_time(&mut self, time: DateTime<Utc>);

    /// True once `set_time` has been called at least once.
    fn is_synchronized(&self) -> bool {
        self.now().is_some()
    }

    /// Rebase a timestamp that may have been recorded before the clock was synchronized.
    ///
    /// `recorded` is `None` whenever it was taken while `is_synchronized()` was still false (the
    /// RTC hadn't been set yet); if the clock has since synchronized, the best available
    /// replacement is the current time, since the actual wall-clock instant the event happened at
    /// was never knowable. Once `recorded` is `Some`, it is left untouched.
    fn adjust_preboot_timestamp(&self, recorded: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        recorded.or_else(|| self.now())
    }
}

/// Default [`Clock`] backed by the OS clock, offset by the delta learned from the CSMS at the
/// last synchronization point. Matches the "drift from a single sync point" behavior of the
/// original `Clock` implementation, which never re-syncs the OS clock itself.
pub struct SystemClock {
    offset: Option<chrono::Duration>,
    synchronized: bool,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            offset: None,
            synchronized: false,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        if !self.synchronized {
            return None;
        }
        let base = Utc::now();
        Some(match self.offset {
            Some(offset) => base + offset,
            None => base,
        })
    }

    fn set_time(&mut self, time: DateTime<Utc>) {
        self.offset = Some(time - Utc::now());
        self.synchronized = true;
    }
}

/// A deterministic clock for tests: time only advances when told to.
#[cfg(test)]
pub struct FakeClock {
    pub current: std::cell::RefCell<Option<DateTime<Utc>>>,
}

#[cfg(test)]
impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: std::cell::RefCell::new(None),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut c = self.current.borrow_mut();
        *c = c.map(|t| t + delta);
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        *self.current.borrow()
    }

    fn set_time(&mut self, time: DateTime<Utc>) {
        *self.current.borrow_mut() = Some(time);
    }
}
