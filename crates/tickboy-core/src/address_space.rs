use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A memory-mapped region. The MMU asks every region in turn whether it
/// `accepts` an address and routes the access to the first that does.
pub trait AddressSpace {
    fn accepts(&self, address: u16) -> bool;
    fn read(&self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);
}

/// Shared handle to a region registered with the MMU.
pub type SharedSpace = Rc<RefCell<dyn AddressSpace>>;

/// Plain RAM mapped at `offset..offset + len`.
#[derive(Debug, Clone)]
pub struct Ram {
    offset: usize,
    space: Vec<u8>,
}

impl Ram {
    pub fn new(offset: u16, length: usize) -> Self {
        Self {
            offset: offset as usize,
            space: vec![0; length],
        }
    }

    pub fn offset(&self) -> u16 {
        self.offset as u16
    }

    pub fn len(&self) -> usize {
        self.space.len()
    }

    pub fn is_empty(&self) -> bool {
        self.space.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.space
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.space
    }

    #[inline]
    fn index(&self, address: u16) -> usize {
        let i = address as usize - self.offset;
        debug_assert!(i < self.space.len(), "address {address:04x} outside RAM");
        i
    }
}

impl AddressSpace for Ram {
    fn accepts(&self, address: u16) -> bool {
        let a = address as usize;
        a >= self.offset && a < self.offset + self.space.len()
    }

    fn read(&self, address: u16) -> u8 {
        self.space[self.index(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        let i = self.index(address);
        self.space[i] = value;
    }
}

/// Echo region: `echo_start..echo_start + len` mirrors
/// `target_start..target_start + len` of the given regions.
pub struct ShadowAddressSpace {
    targets: Vec<SharedSpace>,
    echo_start: u16,
    target_start: u16,
    len: u16,
}

impl ShadowAddressSpace {
    pub fn new(targets: Vec<SharedSpace>, echo_start: u16, target_start: u16, len: u16) -> Self {
        Self {
            targets,
            echo_start,
            target_start,
            len,
        }
    }

    fn translate(&self, address: u16) -> u16 {
        let relative = address - self.echo_start;
        debug_assert!(relative < self.len);
        relative + self.target_start
    }

    fn target(&self, address: u16) -> Option<&SharedSpace> {
        self.targets.iter().find(|t| t.borrow().accepts(address))
    }
}

impl AddressSpace for ShadowAddressSpace {
    fn accepts(&self, address: u16) -> bool {
        address >= self.echo_start && (address - self.echo_start) < self.len
    }

    fn read(&self, address: u16) -> u8 {
        let a = self.translate(address);
        self.target(a).map_or(0xff, |t| t.borrow().read(a))
    }

    fn write(&mut self, address: u16, value: u8) {
        let a = self.translate(address);
        if let Some(t) = self.target(a) {
            t.borrow_mut().write(a, value);
        }
    }
}

/// Access permission of a memory-mapped register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterType {
    R,
    W,
    RW,
}

impl RegisterType {
    pub fn allows_read(self) -> bool {
        matches!(self, RegisterType::R | RegisterType::RW)
    }

    pub fn allows_write(self) -> bool {
        matches!(self, RegisterType::W | RegisterType::RW)
    }
}

/// Anything that names a register: its address and permission.
pub trait Register: Copy {
    fn address(&self) -> u16;
    fn kind(&self) -> RegisterType;
}

/// A bank of named registers. Reads of write-only registers return 0xFF,
/// writes to read-only registers are dropped; the owner bypasses both
/// checks through `get`/`put`.
#[derive(Debug, Clone)]
pub struct MemoryRegisters {
    kinds: HashMap<u16, RegisterType>,
    values: HashMap<u16, u8>,
}

impl MemoryRegisters {
    pub fn new<R: Register>(registers: &[R]) -> Self {
        let mut kinds = HashMap::new();
        let mut values = HashMap::new();
        for r in registers {
            let previous = kinds.insert(r.address(), r.kind());
            assert!(
                previous.is_none(),
                "two registers at {:04x}",
                r.address()
            );
            values.insert(r.address(), 0);
        }
        Self { kinds, values }
    }

    pub fn get<R: Register>(&self, reg: R) -> u8 {
        self.values.get(&reg.address()).copied().unwrap_or(0)
    }

    pub fn put<R: Register>(&mut self, reg: R, value: u8) {
        self.values.insert(reg.address(), value);
    }

    pub fn pre_increment<R: Register>(&mut self, reg: R) -> u8 {
        let v = self.get(reg).wrapping_add(1);
        self.put(reg, v);
        v
    }
}

impl AddressSpace for MemoryRegisters {
    fn accepts(&self, address: u16) -> bool {
        self.kinds.contains_key(&address)
    }

    fn read(&self, address: u16) -> u8 {
        match self.kinds.get(&address) {
            Some(kind) if kind.allows_read() => self.values.get(&address).copied().unwrap_or(0),
            _ => 0xff,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if let Some(kind) = self.kinds.get(&address)
            && kind.allows_write()
        {
            self.values.insert(address, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    enum TestReg {
        ReadOnly,
        WriteOnly,
        Both,
    }

    impl Register for TestReg {
        fn address(&self) -> u16 {
            match self {
                TestReg::ReadOnly => 0xff10,
                TestReg::WriteOnly => 0xff11,
                TestReg::Both => 0xff12,
            }
        }

        fn kind(&self) -> RegisterType {
            match self {
                TestReg::ReadOnly => RegisterType::R,
                TestReg::WriteOnly => RegisterType::W,
                TestReg::Both => RegisterType::RW,
            }
        }
    }

    #[test]
    fn register_permissions() {
        let mut regs =
            MemoryRegisters::new(&[TestReg::ReadOnly, TestReg::WriteOnly, TestReg::Both]);
        regs.write(0xff10, 0x12);
        regs.write(0xff11, 0x34);
        regs.write(0xff12, 0x56);
        assert_eq!(regs.read(0xff10), 0x00, "read-only register ignores writes");
        assert_eq!(regs.read(0xff11), 0xff, "write-only register reads 0xFF");
        assert_eq!(regs.get(TestReg::WriteOnly), 0x34);
        assert_eq!(regs.read(0xff12), 0x56);
        regs.put(TestReg::ReadOnly, 0x99);
        assert_eq!(regs.read(0xff10), 0x99);
        assert!(!regs.accepts(0xff13));
    }

    #[test]
    fn shadow_mirrors_target() {
        let ram: Rc<RefCell<Ram>> = Rc::new(RefCell::new(Ram::new(0xc000, 0x2000)));
        let target: SharedSpace = ram.clone();
        let mut echo = ShadowAddressSpace::new(vec![target], 0xe000, 0xc000, 0x1e00);
        assert!(echo.accepts(0xfdff));
        assert!(!echo.accepts(0xfe00));
        echo.write(0xe123, 0x42);
        assert_eq!(ram.borrow().read(0xc123), 0x42);
        ram.borrow_mut().write(0xddff, 0x24);
        assert_eq!(echo.read(0xfdff), 0x24);
    }
}
