use crate::hardware::TICKS_PER_SEC;

// 128 Hz sweep clock
const DIVIDER: u32 = TICKS_PER_SEC / 128;

/// Channel 1 frequency sweep. Owns its own copy of NR13/NR14 so it can write
/// the swept frequency back.
#[derive(Debug, Default, Clone)]
pub struct FrequencySweep {
    period: u8,
    negate: bool,
    shift: u8,

    timer: u8,
    shadow_freq: u32,
    nr13: u8,
    nr14: u8,
    i: u32,
    overflow: bool,
    counter_enabled: bool,
    negging: bool,
}

impl FrequencySweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.counter_enabled = false;
        self.i = 8192;
    }

    pub fn trigger(&mut self) {
        self.negging = false;
        self.overflow = false;

        self.shadow_freq = self.nr13 as u32 | ((self.nr14 as u32 & 0b111) << 8);
        self.timer = if self.period == 0 { 8 } else { self.period };
        self.counter_enabled = self.period != 0 || self.shift != 0;

        if self.shift > 0 {
            self.calculate();
        }
    }

    pub fn set_nr10(&mut self, value: u8) {
        self.period = (value >> 4) & 0b111;
        self.negate = value & (1 << 3) != 0;
        self.shift = value & 0b111;
        // leaving negate mode after a negated calculation kills the channel
        if self.negging && !self.negate {
            self.overflow = true;
        }
    }

    pub fn nr13(&self) -> u8 {
        self.nr13
    }

    pub fn set_nr13(&mut self, value: u8) {
        self.nr13 = value;
    }

    pub fn nr14(&self) -> u8 {
        self.nr14
    }

    pub fn set_nr14(&mut self, value: u8) {
        self.nr14 = value;
        if value & (1 << 7) != 0 {
            self.trigger();
        }
    }

    pub fn tick(&mut self) {
        self.i += 1;
        if self.i != DIVIDER {
            return;
        }
        self.i = 0;
        if !self.counter_enabled {
            return;
        }
        self.timer -= 1;
        if self.timer == 0 {
            self.timer = if self.period == 0 { 8 } else { self.period };
            if self.period != 0 {
                let new_freq = self.calculate();
                if !self.overflow && self.shift != 0 {
                    self.shadow_freq = new_freq;
                    self.nr13 = (self.shadow_freq & 0xff) as u8;
                    self.nr14 = ((self.shadow_freq & 0x700) >> 8) as u8;
                    self.calculate();
                }
            }
        }
    }

    fn calculate(&mut self) -> u32 {
        let delta = self.shadow_freq >> self.shift;
        let freq = if self.negate {
            self.negging = true;
            self.shadow_freq - delta
        } else {
            self.shadow_freq + delta
        };
        if freq > 2047 {
            self.overflow = true;
        }
        freq
    }

    pub fn is_enabled(&self) -> bool {
        !self.overflow
    }
}
