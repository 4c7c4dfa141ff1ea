use std::cell::RefCell;
use std::rc::Rc;

use crate::address_space::{AddressSpace, Ram, SharedSpace};

/// Ordered list of memory-mapped regions. An access goes to the first region
/// that accepts the address; unclaimed addresses read 0xFF and ignore writes.
#[derive(Default)]
pub struct Mmu {
    spaces: Vec<SharedSpace>,
}

impl Mmu {
    pub fn new() -> Self {
        Self { spaces: Vec::new() }
    }

    pub fn add_address_space(&mut self, space: SharedSpace) {
        self.spaces.push(space);
    }

    pub fn region_count(&self) -> usize {
        self.spaces.len()
    }

    fn space(&self, address: u16) -> Option<&SharedSpace> {
        self.spaces.iter().find(|s| s.borrow().accepts(address))
    }

    pub fn read(&self, address: u16) -> u8 {
        match self.space(address) {
            Some(s) => s.borrow().read(address),
            None => 0xff,
        }
    }

    pub fn write(&self, address: u16, value: u8) {
        if let Some(s) = self.space(address) {
            s.borrow_mut().write(address, value);
        }
    }
}

/// CGB work RAM banks 1-7 at D000-DFFF, selected through SVBK (FF70).
pub struct GbcRam {
    ram: Vec<u8>,
    svbk: u8,
}

impl GbcRam {
    pub fn new() -> Self {
        Self {
            ram: vec![0; 7 * 0x1000],
            svbk: 0,
        }
    }

    fn translate(&self, address: u16) -> usize {
        let bank = match self.svbk & 0x07 {
            0 => 1,
            b => b as usize,
        };
        address as usize - 0xd000 + (bank - 1) * 0x1000
    }
}

impl Default for GbcRam {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace for GbcRam {
    fn accepts(&self, address: u16) -> bool {
        address == 0xff70 || (0xd000..0xe000).contains(&address)
    }

    fn read(&self, address: u16) -> u8 {
        if address == 0xff70 {
            self.svbk
        } else {
            self.ram[self.translate(address)]
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if address == 0xff70 {
            self.svbk = value;
        } else {
            let i = self.translate(address);
            self.ram[i] = value;
        }
    }
}

/// CGB registers with no documented function (FF6C, FF72-FF77) that still
/// hold specific bit patterns.
pub struct UndocumentedGbcRegisters {
    ram: Ram,
    xff6c: u8,
}

impl UndocumentedGbcRegisters {
    pub fn new() -> Self {
        let mut ram = Ram::new(0xff72, 6);
        ram.write(0xff74, 0xff);
        ram.write(0xff75, 0x8f);
        Self { ram, xff6c: 0xfe }
    }
}

impl Default for UndocumentedGbcRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace for UndocumentedGbcRegisters {
    fn accepts(&self, address: u16) -> bool {
        address == 0xff6c || self.ram.accepts(address)
    }

    fn read(&self, address: u16) -> u8 {
        if address == 0xff6c {
            self.xff6c
        } else {
            self.ram.read(address)
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0xff6c => self.xff6c = 0xfe | (value & 1),
            0xff72..=0xff74 => self.ram.write(address, value),
            0xff75 => self.ram.write(address, 0x8f | (value & 0b0111_0000)),
            _ => {}
        }
    }
}

/// Wrap a region in the shared handle the MMU stores.
pub fn shared<T: AddressSpace + 'static>(space: T) -> Rc<RefCell<T>> {
    Rc::new(RefCell::new(space))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_reads_ff() {
        let mmu = Mmu::new();
        assert_eq!(mmu.read(0x1234), 0xff);
        mmu.write(0x1234, 0x00);
        assert_eq!(mmu.read(0x1234), 0xff);
    }

    #[test]
    fn first_accepting_region_wins() {
        let mut mmu = Mmu::new();
        let low = shared(Ram::new(0xc000, 0x100));
        let wide = shared(Ram::new(0xc000, 0x1000));
        mmu.add_address_space(low.clone());
        mmu.add_address_space(wide.clone());
        mmu.write(0xc010, 0x11);
        mmu.write(0xc110, 0x22);
        assert_eq!(low.borrow().read(0xc010), 0x11);
        assert_eq!(wide.borrow().read(0xc010), 0x00);
        assert_eq!(wide.borrow().read(0xc110), 0x22);
    }

    #[test]
    fn svbk_zero_selects_bank_one() {
        let mut ram = GbcRam::new();
        ram.write(0xd000, 0x11);
        ram.write(0xff70, 0x01);
        assert_eq!(ram.read(0xd000), 0x11);
        ram.write(0xff70, 0x02);
        assert_eq!(ram.read(0xd000), 0x00);
        ram.write(0xd000, 0x22);
        ram.write(0xff70, 0x00);
        assert_eq!(ram.read(0xd000), 0x11);
    }

    #[test]
    fn undocumented_register_masks() {
        let mut regs = UndocumentedGbcRegisters::new();
        assert_eq!(regs.read(0xff6c), 0xfe);
        regs.write(0xff6c, 0xff);
        assert_eq!(regs.read(0xff6c), 0xff);
        assert_eq!(regs.read(0xff74), 0xff);
        regs.write(0xff75, 0xff);
        assert_eq!(regs.read(0xff75), 0xff);
        regs.write(0xff75, 0x00);
        assert_eq!(regs.read(0xff75), 0x8f);
    }
}
