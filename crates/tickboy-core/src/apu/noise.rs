use crate::address_space::AddressSpace;

use super::channel::{Channel, ChannelBase};
use super::envelope::VolumeEnvelope;

// NR43 divisor codes
const DIVISORS: [u32; 8] = [8, 16, 32, 48, 64, 80, 96, 112];

/// 15-bit linear feedback shift register, optionally narrowed to 7 bits.
#[derive(Debug, Clone)]
pub struct Lfsr {
    lfsr: u16,
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new()
    }
}

impl Lfsr {
    pub fn new() -> Self {
        Self { lfsr: 0x7fff }
    }

    pub fn reset(&mut self) {
        self.lfsr = 0x7fff;
    }

    /// Shift once and return the output bit (inverted bit 0).
    pub fn next_bit(&mut self, width7: bool) -> i32 {
        let x = (self.lfsr & 1) ^ ((self.lfsr & 2) >> 1);
        self.lfsr >>= 1;
        self.lfsr |= x << 14;
        if width7 {
            self.lfsr |= x << 6;
        }
        (1 & !self.lfsr) as i32
    }

    pub fn value(&self) -> u16 {
        self.lfsr
    }
}

/// NR43 clock: fires every `divisor << shift` master ticks.
#[derive(Debug, Default, Clone)]
pub struct PolynomialCounter {
    shifted_divisor: u32,
    i: u32,
}

impl PolynomialCounter {
    pub fn set_nr43(&mut self, value: u8) {
        let clock_shift = (value >> 4) as u32;
        let divisor = DIVISORS[(value & 0b111) as usize];
        self.shifted_divisor = divisor << clock_shift;
        self.i = 1;
    }

    pub fn tick(&mut self) -> bool {
        // never programmed: stay silent
        if self.i == 0 {
            return false;
        }
        self.i -= 1;
        if self.i == 0 {
            self.i = self.shifted_divisor;
            true
        } else {
            false
        }
    }
}

/// Channel 4 (FF1F-FF23).
#[derive(Debug, Clone)]
pub struct NoiseChannel {
    base: ChannelBase,
    envelope: VolumeEnvelope,
    polynomial_counter: PolynomialCounter,
    lfsr: Lfsr,
    last_result: i32,
}

impl NoiseChannel {
    pub fn new(gbc: bool) -> Self {
        Self {
            base: ChannelBase::new(0xff1f, 64, gbc),
            envelope: VolumeEnvelope::new(),
            polynomial_counter: PolynomialCounter::default(),
            lfsr: Lfsr::new(),
            last_result: 0,
        }
    }
}

impl Channel for NoiseChannel {
    fn tick(&mut self) -> i32 {
        self.envelope.tick();

        if !self.base.update_length() || !self.base.dac_enabled {
            return 0;
        }

        if self.polynomial_counter.tick() {
            self.last_result = self.lfsr.next_bit(self.base.nr[3] & (1 << 3) != 0);
        }
        self.last_result * self.envelope.volume()
    }

    fn start(&mut self) {
        self.base.start_length();
        self.lfsr.reset();
        self.envelope.start();
    }

    fn stop(&mut self) {
        self.base.channel_enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }
}

impl AddressSpace for NoiseChannel {
    fn accepts(&self, address: u16) -> bool {
        self.base.accepts(address)
    }

    fn read(&self, address: u16) -> u8 {
        self.base.nr[self.base.register(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        let r = self.base.register(address);
        match r {
            1 => {
                self.base.nr[1] = value;
                self.base.length.set_length(64 - (value & 0b0011_1111) as i32);
            }
            2 => {
                self.base.nr[2] = value;
                self.envelope.set_nr2(value);
                self.base.dac_enabled = value & 0b1111_1000 != 0;
                self.base.channel_enabled &= self.base.dac_enabled;
            }
            3 => {
                self.base.nr[3] = value;
                self.polynomial_counter.set_nr43(value);
            }
            4 => {
                if self.base.write_nr4(value) {
                    self.lfsr.reset();
                    self.envelope.trigger();
                }
            }
            _ => self.base.nr[r] = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_repeats(width7: bool) {
        let mut lfsr = Lfsr::new();
        let mut previous = 0;
        for _ in 0..100 {
            lfsr.next_bit(width7);
            assert_ne!(previous, lfsr.value());
            previous = lfsr.value();
        }
    }

    #[test]
    fn lfsr_changes_every_step() {
        no_repeats(false);
    }

    #[test]
    fn lfsr_width7_changes_every_step() {
        no_repeats(true);
    }

    #[test]
    fn polynomial_counter_period() {
        let mut counter = PolynomialCounter::default();
        // divisor code 1 (16), shift 2 -> 64 ticks
        counter.set_nr43(0x21);
        assert!(counter.tick(), "first tick fires right after the write");
        let fired: Vec<usize> = (1..=128).filter(|_| counter.tick()).collect();
        assert_eq!(fired.len(), 2);
    }

    #[test]
    fn noise_output_follows_envelope_volume() {
        let mut ch = NoiseChannel::new(false);
        ch.start();
        ch.write(0xff21, 0xa0);
        ch.write(0xff22, 0x00);
        ch.write(0xff23, 0x80);
        assert!(ch.is_enabled());
        let samples: Vec<i32> = (0..200).map(|_| ch.tick()).collect();
        assert!(samples.iter().all(|&s| s == 0 || s == 10));
        assert!(samples.contains(&10));
    }
}
