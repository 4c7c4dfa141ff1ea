use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
// The day counter is 9 bits wide
const COUNTER_RANGE: i64 = 512 * DAY;

/// Number of `i64` fields persisted after the cartridge RAM.
pub const CLOCK_DATA_LEN: usize = 11;

/// Wall-clock source for the cartridge RTC.
pub trait Clock {
    fn current_time_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_time_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    millis: Arc<AtomicI64>,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(SystemClock.current_time_millis())),
        }
    }

    pub fn forward(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as i64, Ordering::Relaxed);
    }
}

impl Clock for VirtualClock {
    fn current_time_millis(&self) -> i64 {
        self.millis.load(Ordering::Relaxed)
    }
}

/// MBC3 clock. Time is derived from the wall clock rather than counted in
/// emulated cycles, so it keeps running while the emulator is closed.
pub struct RealTimeClock {
    clock: Box<dyn Clock>,
    offset_sec: i64,
    clock_start: i64,
    halt: bool,
    latch_start: Option<i64>,
    halt_seconds: i64,
    halt_minutes: i64,
    halt_hours: i64,
    halt_days: i64,
}

impl RealTimeClock {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        let clock_start = clock.current_time_millis();
        Self {
            clock,
            offset_sec: 0,
            clock_start,
            halt: false,
            latch_start: None,
            halt_seconds: 0,
            halt_minutes: 0,
            halt_hours: 0,
            halt_days: 0,
        }
    }

    /// Freeze the readable fields at the current time.
    pub fn latch(&mut self) {
        self.latch_start = Some(self.clock.current_time_millis());
    }

    pub fn unlatch(&mut self) {
        self.latch_start = None;
    }

    pub fn is_latched(&self) -> bool {
        self.latch_start.is_some()
    }

    fn clock_time_in_sec(&self) -> i64 {
        let now = self
            .latch_start
            .unwrap_or_else(|| self.clock.current_time_millis());
        (now - self.clock_start) / 1000 + self.offset_sec
    }

    // A halted clock reads back the values written to it.

    pub fn seconds(&self) -> i64 {
        if self.halt {
            return self.halt_seconds;
        }
        self.clock_time_in_sec() % MINUTE
    }

    pub fn minutes(&self) -> i64 {
        if self.halt {
            return self.halt_minutes;
        }
        self.clock_time_in_sec() % HOUR / MINUTE
    }

    pub fn hours(&self) -> i64 {
        if self.halt {
            return self.halt_hours;
        }
        self.clock_time_in_sec() % DAY / HOUR
    }

    pub fn day_counter(&self) -> i64 {
        if self.halt {
            return self.halt_days;
        }
        self.clock_time_in_sec() % COUNTER_RANGE / DAY
    }

    // Field writes only stick while halted; they take effect on un-halt.

    pub fn set_seconds(&mut self, value: i64) {
        if self.halt {
            self.halt_seconds = value;
        }
    }

    pub fn set_minutes(&mut self, value: i64) {
        if self.halt {
            self.halt_minutes = value;
        }
    }

    pub fn set_hours(&mut self, value: i64) {
        if self.halt {
            self.halt_hours = value;
        }
    }

    pub fn set_day_counter(&mut self, value: i64) {
        if self.halt {
            self.halt_days = value;
        }
    }

    pub fn is_halt(&self) -> bool {
        self.halt
    }

    pub fn set_halt(&mut self, halt: bool) {
        if halt && !self.halt {
            self.latch();
            self.halt_seconds = self.seconds();
            self.halt_minutes = self.minutes();
            self.halt_hours = self.hours();
            self.halt_days = self.day_counter();
            self.unlatch();
        } else if !halt && self.halt {
            self.offset_sec = self.halt_seconds
                + self.halt_minutes * MINUTE
                + self.halt_hours * HOUR
                + self.halt_days * DAY;
            self.clock_start = self.clock.current_time_millis();
        }
        self.halt = halt;
    }

    pub fn is_counter_overflow(&self) -> bool {
        self.clock_time_in_sec() >= COUNTER_RANGE
    }

    pub fn clear_counter_overflow(&mut self) {
        while self.is_counter_overflow() {
            self.offset_sec -= COUNTER_RANGE;
        }
    }

    /// Seconds, minutes, hours, day low, day high (twice), then the Unix
    /// timestamp the fields were taken at.
    pub fn serialize(&mut self) -> [i64; CLOCK_DATA_LEN] {
        let was_latched = self.latch_start;
        self.latch();
        let days = self.day_counter();
        let fields = [
            self.seconds(),
            self.minutes(),
            self.hours(),
            days % 256,
            days / 256,
        ];
        let timestamp = self.latch_start.unwrap_or(0) / 1000;
        self.latch_start = was_latched;

        let mut data = [0; CLOCK_DATA_LEN];
        data[..5].copy_from_slice(&fields);
        data[5..10].copy_from_slice(&fields);
        data[10] = timestamp;
        data
    }

    pub fn deserialize(&mut self, data: &[i64; CLOCK_DATA_LEN]) {
        let [seconds, minutes, hours, days, days_high, ..] = *data;
        self.clock_start = data[10] * 1000;
        self.offset_sec =
            seconds + minutes * MINUTE + hours * HOUR + days * DAY + days_high * 256 * DAY;
    }
}
