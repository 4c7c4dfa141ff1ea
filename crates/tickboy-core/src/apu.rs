#[cfg(feature = "apu-trace")]
macro_rules! apu_trace {
    ($($arg:tt)*) => {
        log::trace!(target: "tickboy::apu", $($arg)*);
    };
}
#[cfg(not(feature = "apu-trace"))]
macro_rules! apu_trace {
    ($($arg:tt)*) => {};
}

mod channel;
mod envelope;
mod length_counter;
mod noise;
mod square;
mod sweep;
mod wave;

use crate::address_space::{AddressSpace, Ram};

pub use channel::Channel;
pub use envelope::VolumeEnvelope;
pub use length_counter::LengthCounter;
pub use noise::{Lfsr, NoiseChannel, PolynomialCounter};
pub use square::SquareChannel;
pub use sweep::FrequencySweep;
pub use wave::WaveChannel;

const NR10: u16 = 0xff10;
const NR50: u16 = 0xff24;
const NR51: u16 = 0xff25;
const NR52: u16 = 0xff26;

// Bits that always read back as 1, FF10-FF3F
const MASKS: [u8; 0x30] = [
    0x80, 0x3f, 0x00, 0xff, 0xbf, // NR10-NR14
    0xff, 0x3f, 0x00, 0xff, 0xbf, // NR20-NR24
    0x7f, 0xff, 0x9f, 0xff, 0xbf, // NR30-NR34
    0xff, 0xff, 0x00, 0x00, 0xbf, // NR40-NR44
    0x00, 0x00, 0x70, // NR50-NR52
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // unused
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // wave RAM
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Sink for mixed audio. `play` is called once per master tick while the
/// APU is powered; implementations decimate to their own rate.
pub trait SoundOutput {
    fn start(&mut self);
    fn stop(&mut self);
    fn play(&mut self, left: u8, right: u8);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSoundOutput;

impl SoundOutput for NullSoundOutput {
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn play(&mut self, _left: u8, _right: u8) {}
}

/// The APU: four channels, the NR50-NR52 control registers and the mixer.
pub struct Sound {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    control: Ram,
    output: Box<dyn SoundOutput>,
    enabled: bool,
}

impl Sound {
    pub fn new(output: Box<dyn SoundOutput>, gbc: bool) -> Self {
        Self {
            ch1: SquareChannel::new(true, gbc),
            ch2: SquareChannel::new(false, gbc),
            ch3: WaveChannel::new(gbc),
            ch4: NoiseChannel::new(gbc),
            control: Ram::new(NR50, 3),
            output,
            enabled: false,
        }
    }

    fn channels(&self) -> [&dyn Channel; 4] {
        [&self.ch1, &self.ch2, &self.ch3, &self.ch4]
    }

    fn channels_mut(&mut self) -> [&mut dyn Channel; 4] {
        [&mut self.ch1, &mut self.ch2, &mut self.ch3, &mut self.ch4]
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tick(&mut self) {
        if !self.enabled {
            return;
        }

        let samples = self.channels_mut().map(|ch| ch.tick());

        let selection = self.control.read(NR51);
        let mut left = 0;
        let mut right = 0;
        for (i, sample) in samples.iter().enumerate() {
            if selection & (1 << (i + 4)) != 0 {
                left += sample;
            }
            if selection & (1 << i) != 0 {
                right += sample;
            }
        }
        left /= 4;
        right /= 4;

        let volumes = self.control.read(NR50) as i32;
        left *= (volumes >> 4) & 0b111;
        right *= volumes & 0b111;

        self.output.play(left as u8, right as u8);
    }

    fn space(&self, address: u16) -> Option<&dyn AddressSpace> {
        let spaces: [&dyn AddressSpace; 5] =
            [&self.ch1, &self.ch2, &self.ch3, &self.ch4, &self.control];
        spaces.into_iter().find(|s| s.accepts(address))
    }

    fn space_mut(&mut self, address: u16) -> Option<&mut dyn AddressSpace> {
        let spaces: [&mut dyn AddressSpace; 5] = [
            &mut self.ch1,
            &mut self.ch2,
            &mut self.ch3,
            &mut self.ch4,
            &mut self.control,
        ];
        spaces.into_iter().find(|s| s.accepts(address))
    }

    fn unmasked(&self, address: u16) -> u8 {
        self.space(address).map_or(0xff, |s| s.read(address))
    }

    fn power_on(&mut self) {
        apu_trace!("APU on");
        for address in NR10..=NR51 {
            let value = match address {
                // lengths survive power cycling
                0xff11 | 0xff16 | 0xff20 => self.unmasked(address) & 0b0011_1111,
                0xff1b => self.unmasked(address),
                _ => 0,
            };
            self.write(address, value);
        }
        for ch in self.channels_mut() {
            ch.start();
        }
        self.output.start();
    }

    fn power_off(&mut self) {
        apu_trace!("APU off");
        self.output.stop();
        for ch in self.channels_mut() {
            ch.stop();
        }
    }
}

impl AddressSpace for Sound {
    fn accepts(&self, address: u16) -> bool {
        self.space(address).is_some()
    }

    fn read(&self, address: u16) -> u8 {
        let value = if address == NR52 {
            let status = self
                .channels()
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, ch)| acc | ((ch.is_enabled() as u8) << i));
            status | if self.enabled { 0x80 } else { 0 }
        } else {
            self.unmasked(address)
        };
        value | MASKS[(address - NR10) as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        if address == NR52 {
            let on = value & (1 << 7) != 0;
            if on && !self.enabled {
                self.enabled = true;
                self.power_on();
            } else if !on && self.enabled {
                self.enabled = false;
                self.power_off();
            }
            return;
        }
        match self.space_mut(address) {
            Some(space) => space.write(address, value),
            None => log::warn!("APU write to unmapped {address:04x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recording {
        frames: Vec<(u8, u8)>,
        started: u32,
        stopped: u32,
    }

    struct RecordingOutput(Rc<RefCell<Recording>>);

    impl SoundOutput for RecordingOutput {
        fn start(&mut self) {
            self.0.borrow_mut().started += 1;
        }
        fn stop(&mut self) {
            self.0.borrow_mut().stopped += 1;
        }
        fn play(&mut self, left: u8, right: u8) {
            self.0.borrow_mut().frames.push((left, right));
        }
    }

    fn sound() -> (Sound, Rc<RefCell<Recording>>) {
        let rec = Rc::new(RefCell::new(Recording::default()));
        let sound = Sound::new(Box::new(RecordingOutput(Rc::clone(&rec))), false);
        (sound, rec)
    }

    #[test]
    fn silent_while_powered_off() {
        let (mut sound, rec) = sound();
        for _ in 0..100 {
            sound.tick();
        }
        assert!(rec.borrow().frames.is_empty());
        assert_eq!(sound.read(NR52), 0x70);
    }

    #[test]
    fn power_cycle_calls_output() {
        let (mut sound, rec) = sound();
        sound.write(NR52, 0x80);
        assert_eq!(sound.read(NR52), 0xf0);
        sound.tick();
        sound.write(NR52, 0x00);
        let rec = rec.borrow();
        assert_eq!((rec.started, rec.stopped), (1, 1));
        assert_eq!(rec.frames.len(), 1);
    }

    #[test]
    fn registers_read_back_through_masks() {
        let (mut sound, _) = sound();
        sound.write(NR52, 0x80);
        sound.write(0xff11, 0x80);
        assert_eq!(sound.read(0xff11), 0xbf);
        assert_eq!(sound.read(0xff13), 0xff, "frequency is write-only");
        assert_eq!(sound.read(0xff15), 0xff);
        sound.write(NR50, 0x77);
        assert_eq!(sound.read(NR50), 0x77);
        assert!(!sound.accepts(0xff27));
        assert!(sound.accepts(0xff3f));
    }

    #[test]
    fn power_on_clears_registers_but_keeps_lengths() {
        let (mut sound, _) = sound();
        sound.write(NR52, 0x80);
        sound.write(0xff11, 0xc5);
        sound.write(0xff1b, 0x42);
        sound.write(NR51, 0xff);
        sound.write(NR52, 0x00);
        sound.write(NR52, 0x80);
        assert_eq!(sound.read(0xff11), 0x3f);
        assert_eq!(sound.unmasked(0xff11), 0x05);
        assert_eq!(sound.unmasked(0xff1b), 0x42);
        assert_eq!(sound.read(NR51), 0x00);
    }

    #[test]
    fn status_bits_track_channels() {
        let (mut sound, _) = sound();
        sound.write(NR52, 0x80);
        sound.write(0xff17, 0xf0);
        sound.write(0xff19, 0x80);
        assert_eq!(sound.read(NR52) & 0x0f, 0b0010);
        sound.write(0xff1a, 0x80);
        sound.write(0xff1e, 0x80);
        assert_eq!(sound.read(NR52) & 0x0f, 0b0110);
        sound.write(NR52, 0x00);
        assert_eq!(sound.read(NR52) & 0x0f, 0);
    }

    #[test]
    fn mixer_routes_and_scales() {
        let (mut sound, rec) = sound();
        sound.write(NR52, 0x80);
        // channel 2 at full volume, 50% duty, right speaker only
        sound.write(0xff16, 0x80);
        sound.write(0xff17, 0xf0);
        sound.write(0xff18, 0xff);
        sound.write(0xff19, 0x87);
        sound.write(NR51, 0x02);
        sound.write(NR50, 0x07);
        for _ in 0..64 {
            sound.tick();
        }
        let rec = rec.borrow();
        assert!(rec.frames.iter().all(|&(l, _)| l == 0));
        // 15 / 4 * 7
        assert!(rec.frames.iter().any(|&(_, r)| r == 21));
    }
}
