use crate::address_space::{AddressSpace, Ram};

use super::channel::{frequency, Channel, ChannelBase};

const WAVE_RAM: u16 = 0xff30;

// Power-on wave RAM patterns
const DMG_WAVE: [u8; 16] = [
    0x84, 0x40, 0x43, 0xaa, 0x2d, 0x78, 0x92, 0x3c, 0x60, 0x59, 0x59, 0xb0, 0x34, 0xb8, 0x2e, 0xda,
];
const CGB_WAVE: [u8; 16] = [
    0x00, 0xff, 0x00, 0xff, 0x00, 0xff, 0x00, 0xff, 0x00, 0xff, 0x00, 0xff, 0x00, 0xff, 0x00, 0xff,
];

/// Channel 3 (FF1A-FF1E) and its 32-sample wave RAM (FF30-FF3F).
#[derive(Debug, Clone)]
pub struct WaveChannel {
    base: ChannelBase,
    wave_ram: Ram,
    freq_divider: i32,
    last_output: i32,
    i: u16,
    ticks_since_read: u32,
    last_read_addr: u16,
    buffer: u8,
    triggered: bool,
}

impl WaveChannel {
    pub fn new(gbc: bool) -> Self {
        let mut wave_ram = Ram::new(WAVE_RAM, 0x10);
        wave_ram
            .as_mut_slice()
            .copy_from_slice(if gbc { &CGB_WAVE } else { &DMG_WAVE });
        Self {
            base: ChannelBase::new(0xff1a, 256, gbc),
            wave_ram,
            freq_divider: 0,
            last_output: 0,
            i: 0,
            ticks_since_read: 65536,
            last_read_addr: 0,
            buffer: 0,
            triggered: false,
        }
    }

    /// While playing, the CPU only reaches the byte the channel just read,
    /// and on DMG only within two ticks of that read.
    fn wave_ram_window(&self) -> Option<u16> {
        let readable = self.base.gbc || self.ticks_since_read < 2;
        (self.wave_ram.accepts(self.last_read_addr) && readable).then_some(self.last_read_addr)
    }

    fn volume_code(&self) -> u8 {
        (self.base.nr[2] >> 5) & 0b11
    }

    fn trigger(&mut self) {
        self.i = 0;
        self.freq_divider = 6;
        self.triggered = !self.base.gbc;
        if self.base.gbc {
            self.wave_entry();
        }
    }

    /// Retriggering a playing DMG channel right before it fetches a sample
    /// overwrites the first bytes of wave RAM.
    fn corrupt_wave_ram(&mut self) {
        let ram = self.wave_ram.as_mut_slice();
        let pos = (self.i / 2) as usize;
        if pos < 4 {
            ram[0] = ram[pos];
        } else {
            let pos = pos & !3;
            for j in 0..4 {
                ram[j] = ram[(pos + j) % 0x10];
            }
        }
    }

    fn wave_entry(&mut self) -> i32 {
        self.ticks_since_read = 0;
        self.last_read_addr = WAVE_RAM + self.i / 2;
        self.buffer = self.wave_ram.read(self.last_read_addr);
        let sample = if self.i % 2 == 0 {
            (self.buffer >> 4) & 0x0f
        } else {
            self.buffer & 0x0f
        } as i32;
        match self.volume_code() {
            0 => 0,
            1 => sample,
            2 => sample >> 1,
            _ => sample >> 2,
        }
    }
}

impl Channel for WaveChannel {
    fn tick(&mut self) -> i32 {
        self.ticks_since_read = self.ticks_since_read.saturating_add(1);
        if !self.base.update_length() || !self.base.dac_enabled {
            return 0;
        }

        self.freq_divider -= 1;
        if self.freq_divider == 0 {
            self.freq_divider = frequency(self.base.nr[3], self.base.nr[4]) * 2;
            if self.triggered {
                self.last_output = ((self.buffer >> 4) & 0x0f) as i32;
                self.triggered = false;
            } else {
                self.last_output = self.wave_entry();
            }
            self.i = (self.i + 1) % 32;
        }
        self.last_output
    }

    fn start(&mut self) {
        self.i = 0;
        self.buffer = 0;
        self.base.start_length();
    }

    fn stop(&mut self) {
        self.base.channel_enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }
}

impl AddressSpace for WaveChannel {
    fn accepts(&self, address: u16) -> bool {
        self.wave_ram.accepts(address) || self.base.accepts(address)
    }

    fn read(&self, address: u16) -> u8 {
        if !self.wave_ram.accepts(address) {
            return self.base.nr[self.base.register(address)];
        }
        if !self.is_enabled() {
            self.wave_ram.read(address)
        } else if let Some(a) = self.wave_ram_window() {
            self.wave_ram.read(a)
        } else {
            0xff
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if self.wave_ram.accepts(address) {
            if !self.is_enabled() {
                self.wave_ram.write(address, value);
            } else if let Some(a) = self.wave_ram_window() {
                self.wave_ram.write(a, value);
            }
            return;
        }
        match self.base.register(address) {
            0 => {
                self.base.nr[0] = value;
                self.base.dac_enabled = value & (1 << 7) != 0;
                self.base.channel_enabled &= self.base.dac_enabled;
            }
            1 => {
                self.base.nr[1] = value;
                self.base.length.set_length(256 - value as i32);
            }
            4 => {
                if !self.base.gbc
                    && value & (1 << 7) != 0
                    && self.is_enabled()
                    && self.freq_divider == 2
                {
                    apu_trace!("wave RAM corruption at position {}", self.i);
                    self.corrupt_wave_ram();
                }
                if self.base.write_nr4(value) {
                    self.trigger();
                }
            }
            r => self.base.nr[r] = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(gbc: bool) -> WaveChannel {
        let mut ch = WaveChannel::new(gbc);
        ch.start();
        for (i, v) in (0..16u8).enumerate() {
            ch.write(WAVE_RAM + i as u16, v << 4 | v);
        }
        ch.write(0xff1a, 0x80);
        ch.write(0xff1c, 0x20);
        // frequency 2047: a sample every 2 ticks
        ch.write(0xff1d, 0xff);
        ch.write(0xff1e, 0x87);
        ch
    }

    #[test]
    fn power_on_patterns() {
        assert_eq!(WaveChannel::new(false).read(0xff30), 0x84);
        assert_eq!(WaveChannel::new(false).read(0xff3f), 0xda);
        assert_eq!(WaveChannel::new(true).read(0xff31), 0xff);
    }

    #[test]
    fn plays_samples_in_order() {
        let mut ch = playing(false);
        let samples: Vec<i32> = (0..70).map(|_| ch.tick()).collect();
        // delayed start, then two ticks per sample
        let distinct: Vec<i32> = samples.iter().skip(5).step_by(2).copied().take(32).collect();
        assert_eq!(&distinct[..6], &[0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn volume_code_shifts_samples() {
        let mut ch = playing(true);
        ch.write(0xff1c, 0x40);
        let peak = (0..200).map(|_| ch.tick()).max().unwrap_or(0);
        assert_eq!(peak, 7);
    }

    #[test]
    fn dmg_wave_ram_reads_ff_while_playing() {
        let mut ch = playing(false);
        // slowest frequency from the next reload on
        ch.write(0xff1d, 0x00);
        ch.write(0xff1e, 0x00);
        for _ in 0..10 {
            ch.tick();
        }
        assert_eq!(ch.read(0xff30), 0xff);
        ch.write(0xff1a, 0x00);
        assert_eq!(ch.read(0xff30), 0x00);
    }

    #[test]
    fn cgb_wave_ram_reads_current_byte() {
        let mut ch = playing(true);
        for _ in 0..9 {
            ch.tick();
        }
        let expected = ch.wave_ram.read(ch.last_read_addr);
        assert_eq!(ch.read(0xff3c), expected);
    }

    #[test]
    fn retrigger_corrupts_dmg_wave_ram() {
        let mut ch = playing(false);
        // run until the divider is one step away from a fetch at position >= 8
        while !(ch.freq_divider == 2 && ch.i >= 8) {
            ch.tick();
        }
        let pos = ((ch.i / 2) & !3) as usize;
        let before: Vec<u8> = ch.wave_ram.as_slice()[pos..pos + 4].to_vec();
        ch.write(0xff1e, 0x87);
        assert_eq!(&ch.wave_ram.as_slice()[..4], &before[..]);
    }
}
