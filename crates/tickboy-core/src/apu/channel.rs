use crate::address_space::AddressSpace;

use super::length_counter::LengthCounter;

/// One of the four sound generators. Each maps its five NRx0..NRx4
/// registers (plus wave RAM for channel 3) and yields a 4-bit sample per
/// master tick.
pub trait Channel: AddressSpace {
    /// Advance one master tick and return the current sample, 0..=15.
    fn tick(&mut self) -> i32;
    /// APU power-on.
    fn start(&mut self);
    /// APU power-off.
    fn stop(&mut self);
    /// NR52 status bit.
    fn is_enabled(&self) -> bool;
}

/// State every channel carries: the raw NRx registers, the enable/DAC
/// flags and the length counter.
#[derive(Debug, Clone)]
pub(crate) struct ChannelBase {
    pub offset: u16,
    pub gbc: bool,
    pub channel_enabled: bool,
    pub dac_enabled: bool,
    pub nr: [u8; 5],
    pub length: LengthCounter,
}

impl ChannelBase {
    pub fn new(offset: u16, full_length: i32, gbc: bool) -> Self {
        Self {
            offset,
            gbc,
            channel_enabled: false,
            dac_enabled: false,
            nr: [0; 5],
            length: LengthCounter::new(full_length),
        }
    }

    pub fn accepts(&self, address: u16) -> bool {
        (self.offset..self.offset + 5).contains(&address)
    }

    /// Register index 0..=4 of `address`.
    #[inline]
    pub fn register(&self, address: u16) -> usize {
        (address - self.offset) as usize
    }

    /// Stores NRx4 and clocks the length logic. Returns true on a trigger,
    /// after the channel was re-enabled if its DAC is on.
    pub fn write_nr4(&mut self, value: u8) -> bool {
        self.nr[4] = value;
        self.length.set_nr4(value);
        let trigger = value & (1 << 7) != 0;
        if trigger {
            self.channel_enabled = self.dac_enabled;
        }
        trigger
    }

    /// Power-on for the length counter; CGB also clears it.
    pub fn start_length(&mut self) {
        if self.gbc {
            self.length.reset();
        }
        self.length.start();
    }

    pub fn update_length(&mut self) -> bool {
        self.length.tick();
        if self.length.is_enabled() && self.channel_enabled && self.length.value() == 0 {
            self.channel_enabled = false;
        }
        self.channel_enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.channel_enabled && self.dac_enabled
    }
}

/// Timer period in master ticks / divider units for an 11-bit frequency
/// split across NRx3 and the low bits of NRx4.
#[inline]
pub(crate) fn frequency(nr3: u8, nr4: u8) -> i32 {
    2048 - (nr3 as i32 | ((nr4 as i32 & 0b111) << 8))
}
