use crate::address_space::AddressSpace;

use super::channel::{frequency, Channel, ChannelBase};
use super::envelope::VolumeEnvelope;
use super::sweep::FrequencySweep;

// Duty waveforms for NRx1 bits 6-7, one output bit per step, step 0 in bit 0:
// 0 -> 00000001 (12.5%)
// 1 -> 10000001 (25%)
// 2 -> 10000111 (50%)
// 3 -> 01111110 (75%)
const DUTY_TABLE: [u8; 4] = [0b0000_0001, 0b1000_0001, 0b1000_0111, 0b0111_1110];

/// Pulse channel. Channel 1 (FF10) carries a frequency sweep, channel 2
/// (FF15) does not.
#[derive(Debug, Clone)]
pub struct SquareChannel {
    base: ChannelBase,
    sweep: Option<FrequencySweep>,
    envelope: VolumeEnvelope,
    freq_divider: i32,
    last_output: i32,
    i: u32,
}

impl SquareChannel {
    pub fn new(with_sweep: bool, gbc: bool) -> Self {
        let offset = if with_sweep { 0xff10 } else { 0xff15 };
        Self {
            base: ChannelBase::new(offset, 64, gbc),
            sweep: with_sweep.then(FrequencySweep::new),
            envelope: VolumeEnvelope::new(),
            freq_divider: 0,
            last_output: 0,
            i: 0,
        }
    }

    fn nr3(&self) -> u8 {
        match &self.sweep {
            Some(sweep) => sweep.nr13(),
            None => self.base.nr[3],
        }
    }

    fn nr4(&self) -> u8 {
        match &self.sweep {
            Some(sweep) => (self.base.nr[4] & 0b1111_1000) | (sweep.nr14() & 0b111),
            None => self.base.nr[4],
        }
    }

    fn duty(&self) -> u8 {
        DUTY_TABLE[(self.base.nr[1] >> 6) as usize]
    }

    fn trigger(&mut self) {
        self.i = 0;
        self.freq_divider = 1;
        self.envelope.trigger();
    }

    fn update_sweep(&mut self) -> bool {
        if let Some(sweep) = self.sweep.as_mut() {
            sweep.tick();
            if self.base.channel_enabled && !sweep.is_enabled() {
                self.base.channel_enabled = false;
            }
        }
        self.base.channel_enabled
    }
}

impl Channel for SquareChannel {
    fn tick(&mut self) -> i32 {
        self.envelope.tick();

        // both must run every tick
        let length_on = self.base.update_length();
        let sweep_on = self.update_sweep();
        if !(length_on && sweep_on && self.base.dac_enabled) {
            return 0;
        }

        self.freq_divider -= 1;
        if self.freq_divider == 0 {
            self.freq_divider = frequency(self.nr3(), self.nr4()) * 4;
            self.last_output = ((self.duty() >> self.i) & 1) as i32;
            self.i = (self.i + 1) % 8;
        }
        self.last_output * self.envelope.volume()
    }

    fn start(&mut self) {
        self.i = 0;
        self.base.start_length();
        if let Some(sweep) = self.sweep.as_mut() {
            sweep.start();
        }
        self.envelope.start();
    }

    fn stop(&mut self) {
        self.base.channel_enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }
}

impl AddressSpace for SquareChannel {
    fn accepts(&self, address: u16) -> bool {
        self.base.accepts(address)
    }

    fn read(&self, address: u16) -> u8 {
        match self.base.register(address) {
            3 => self.nr3(),
            4 => self.nr4(),
            r => self.base.nr[r],
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match self.base.register(address) {
            0 => {
                self.base.nr[0] = value;
                if let Some(sweep) = self.sweep.as_mut() {
                    sweep.set_nr10(value);
                }
            }
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
                if let Some(sweep) = self.sweep.as_mut() {
                    sweep.set_nr13(value);
                }
            }
            _ => {
                if self.base.write_nr4(value) {
                    self.trigger();
                }
                if let Some(sweep) = self.sweep.as_mut() {
                    sweep.set_nr14(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn powered(with_sweep: bool) -> SquareChannel {
        let mut ch = SquareChannel::new(with_sweep, false);
        ch.start();
        ch
    }

    #[test]
    fn duty_cycle_shape() {
        let mut ch = powered(false);
        ch.write(0xff16, 0b1000_0000);
        ch.write(0xff17, 0xf0);
        // frequency 2047: one step every 4 ticks
        ch.write(0xff18, 0xff);
        ch.write(0xff19, 0x87);
        let mut steps = Vec::new();
        for _ in 0..8 {
            steps.push(ch.tick());
            for _ in 0..3 {
                ch.tick();
            }
        }
        assert_eq!(steps, vec![15, 15, 15, 0, 0, 0, 0, 15]);
    }

    #[test]
    fn dac_off_disables_channel() {
        let mut ch = powered(false);
        ch.write(0xff17, 0xf0);
        ch.write(0xff19, 0x80);
        assert!(ch.is_enabled());
        ch.write(0xff17, 0x07);
        assert!(!ch.is_enabled());
        assert_eq!(ch.tick(), 0);
    }

    #[test]
    fn channel_one_reads_swept_frequency() {
        let mut ch = powered(true);
        ch.write(0xff12, 0xf0);
        ch.write(0xff13, 0x34);
        ch.write(0xff14, 0xc2);
        assert_eq!(ch.read(0xff13), 0x34);
        assert_eq!(ch.read(0xff14), 0xc2);
    }

    #[test]
    fn sweep_overflow_disables_channel_one() {
        let mut ch = powered(true);
        ch.write(0xff12, 0xf0);
        ch.write(0xff10, 0x02);
        ch.write(0xff13, 0x67);
        ch.write(0xff14, 0xc6);
        ch.tick();
        assert!(!ch.is_enabled());
    }

    #[test]
    fn length_expiry_disables() {
        let mut ch = powered(false);
        ch.write(0xff17, 0xf0);
        ch.write(0xff16, 63);
        ch.write(0xff19, 0xc0);
        assert!(ch.is_enabled());
        for _ in 0..2 * super::super::length_counter::DIVIDER {
            ch.tick();
        }
        assert!(!ch.is_enabled());
    }
}
