use crate::hardware::TICKS_PER_SEC;

/// NRx2 volume envelope shared by the square and noise channels.
#[derive(Debug, Default, Clone)]
pub struct VolumeEnvelope {
    initial_volume: i32,
    direction: i32,
    sweep: u32,
    volume: i32,
    i: u32,
    finished: bool,
}

impl VolumeEnvelope {
    pub fn new() -> Self {
        Self {
            direction: -1,
            ..Self::default()
        }
    }

    pub fn set_nr2(&mut self, value: u8) {
        self.initial_volume = (value >> 4) as i32;
        self.direction = if value & (1 << 3) == 0 { -1 } else { 1 };
        self.sweep = (value & 0b111) as u32;
    }

    pub fn is_enabled(&self) -> bool {
        self.sweep > 0
    }

    pub fn start(&mut self) {
        self.finished = true;
        self.i = 8192;
    }

    pub fn trigger(&mut self) {
        self.volume = self.initial_volume;
        self.i = 0;
        self.finished = false;
    }

    pub fn tick(&mut self) {
        if self.finished {
            return;
        }
        if (self.volume == 0 && self.direction == -1) || (self.volume == 15 && self.direction == 1) {
            self.finished = true;
            return;
        }
        if self.sweep == 0 {
            return;
        }
        self.i += 1;
        if self.i == self.sweep * TICKS_PER_SEC / 64 {
            self.i = 0;
            self.volume += self.direction;
        }
    }

    /// Current volume, 0..=15. Without a sweep the initial volume holds.
    pub fn volume(&self) -> i32 {
        if self.is_enabled() {
            self.volume
        } else {
            self.initial_volume
        }
    }
}
