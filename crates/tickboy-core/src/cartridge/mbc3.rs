use super::battery::Battery;
use super::rtc::{Clock, RealTimeClock};
use super::{RAM_BANK_SIZE, is_ram_enable, is_ram_window, rom_byte};
use crate::address_space::AddressSpace;

const RTC_S: u8 = 0x08;
const RTC_M: u8 = 0x09;
const RTC_H: u8 = 0x0a;
const RTC_DL: u8 = 0x0b;
const RTC_DH: u8 = 0x0c;

pub struct Mbc3 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    battery: Box<dyn Battery>,
    rtc: Option<RealTimeClock>,
    rom_banks: usize,
    rom_bank: usize,
    /// 0-3 select RAM, 08-0C the clock registers.
    ram_bank: u8,
    ram_enabled: bool,
    latch_reg: u8,
}

impl Mbc3 {
    pub fn new(
        rom: Vec<u8>,
        mut battery: Box<dyn Battery>,
        rom_banks: usize,
        ram_banks: usize,
        clock: Option<Box<dyn Clock>>,
    ) -> Self {
        let mut ram = vec![0xff; ram_banks * RAM_BANK_SIZE];
        let rtc = match clock {
            Some(clock) => {
                let mut rtc = RealTimeClock::new(clock);
                if let Some(data) = battery.load_ram_with_clock(&mut ram) {
                    rtc.deserialize(&data);
                }
                Some(rtc)
            }
            None => {
                battery.load_ram(&mut ram);
                None
            }
        };
        Self {
            rom,
            ram,
            battery,
            rtc,
            rom_banks,
            rom_bank: 1,
            ram_bank: 0,
            ram_enabled: false,
            latch_reg: 0xff,
        }
    }

    fn ram_index(&self, address: u16) -> usize {
        self.ram_bank as usize * RAM_BANK_SIZE + (address - 0xa000) as usize
    }

    fn read_timer(&self) -> u8 {
        let Some(rtc) = &self.rtc else {
            return 0xff;
        };
        match self.ram_bank {
            RTC_S => rtc.seconds() as u8,
            RTC_M => rtc.minutes() as u8,
            RTC_H => rtc.hours() as u8,
            RTC_DL => rtc.day_counter() as u8,
            RTC_DH => {
                let mut v = ((rtc.day_counter() >> 8) & 0x01) as u8;
                if rtc.is_halt() {
                    v |= 1 << 6;
                }
                if rtc.is_counter_overflow() {
                    v |= 1 << 7;
                }
                v
            }
            _ => 0xff,
        }
    }

    fn write_timer(&mut self, value: u8) {
        let reg = self.ram_bank;
        let Some(rtc) = &mut self.rtc else {
            return;
        };
        let value = value as i64;
        match reg {
            RTC_S => rtc.set_seconds(value),
            RTC_M => rtc.set_minutes(value),
            RTC_H => rtc.set_hours(value),
            RTC_DL => {
                let day = rtc.day_counter();
                rtc.set_day_counter((day & 0x100) | value);
            }
            RTC_DH => {
                // the day bit has to land while the clock is still halted
                let halt = value & 0x40 != 0;
                if halt {
                    rtc.set_halt(true);
                }
                let day = rtc.day_counter();
                rtc.set_day_counter((day & 0xff) | ((value & 0x01) << 8));
                if !halt {
                    rtc.set_halt(false);
                }
                if value & 0x80 == 0 {
                    rtc.clear_counter_overflow();
                }
            }
            _ => {}
        }
    }

    pub fn flush(&mut self) {
        match &mut self.rtc {
            Some(rtc) => self.battery.save_ram_with_clock(&self.ram, &rtc.serialize()),
            None if !self.ram.is_empty() => self.battery.save_ram(&self.ram),
            None => {}
        }
    }
}

impl AddressSpace for Mbc3 {
    fn accepts(&self, address: u16) -> bool {
        address < 0x8000 || is_ram_window(address)
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x3fff => rom_byte(&self.rom, 0, address),
            0x4000..=0x7fff => rom_byte(&self.rom, self.rom_bank % self.rom_banks, address),
            _ if !self.ram_enabled => 0xff,
            _ => match self.ram_bank {
                0x00..=0x03 => self
                    .ram
                    .get(self.ram_index(address))
                    .copied()
                    .unwrap_or(0xff),
                _ => self.read_timer(),
            },
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1fff => {
                let enabled = is_ram_enable(value);
                if self.ram_enabled && !enabled {
                    self.flush();
                }
                self.ram_enabled = enabled;
            }
            0x2000..=0x3fff => {
                self.rom_bank = match value & 0x7f {
                    0 => 1,
                    bank => bank as usize,
                };
            }
            0x4000..=0x5fff => self.ram_bank = value,
            0x6000..=0x7fff => {
                if self.latch_reg == 0x00
                    && value == 0x01
                    && let Some(rtc) = &mut self.rtc
                {
                    rtc.latch();
                }
                self.latch_reg = value;
            }
            _ if !self.ram_enabled => {}
            _ => match self.ram_bank {
                0x00..=0x03 => {
                    let i = self.ram_index(address);
                    if let Some(b) = self.ram.get_mut(i) {
                        *b = value;
                    }
                }
                _ => self.write_timer(value),
            },
        }
    }
}
