use crate::hardware::TICKS_PER_SEC;

// 256 Hz length clock
pub(crate) const DIVIDER: u32 = TICKS_PER_SEC / 256;

/// Channel length timer. Writes to NRx4 can clock it early when they land in
/// the first half of a frame-sequencer period.
#[derive(Debug, Clone)]
pub struct LengthCounter {
    full_length: i32,
    length: i32,
    i: u32,
    enabled: bool,
}

impl LengthCounter {
    pub fn new(full_length: i32) -> Self {
        Self {
            full_length,
            length: 0,
            i: 0,
            enabled: false,
        }
    }

    /// Power-on: the sequencer starts half a period in.
    pub fn start(&mut self) {
        self.i = 8192;
    }

    pub fn tick(&mut self) {
        self.i += 1;
        if self.i == DIVIDER {
            self.i = 0;
            if self.enabled && self.length > 0 {
                self.length -= 1;
            }
        }
    }

    /// Load from NRx1. Zero means a full-length run.
    pub fn set_length(&mut self, length: i32) {
        self.length = if length == 0 { self.full_length } else { length };
    }

    pub fn set_nr4(&mut self, value: u8) {
        let enable = value & (1 << 6) != 0;
        let trigger = value & (1 << 7) != 0;
        let first_half = self.i < DIVIDER / 2;

        if self.enabled {
            if self.length == 0 && trigger {
                if enable && first_half {
                    self.set_length(self.full_length - 1);
                } else {
                    self.set_length(self.full_length);
                }
            }
        } else if enable {
            // enabling in the first half clocks the counter once
            if self.length > 0 && first_half {
                self.length -= 1;
            }
            if self.length == 0 && trigger && first_half {
                self.set_length(self.full_length - 1);
            }
        } else if self.length == 0 && trigger {
            self.set_length(self.full_length);
        }
        self.enabled = enable;
    }

    pub fn value(&self) -> i32 {
        self.length
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// CGB power-on clears the counter.
    pub fn reset(&mut self) {
        self.enabled = true;
        self.i = 0;
        self.length = 0;
    }
}
