use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::address_space::AddressSpace;
use crate::hardware::{SpeedMode, TICKS_PER_SEC};
use crate::interrupts::{InterruptManager, InterruptType};

const SB: u16 = 0xff01;
const SC: u16 = 0xff02;
// Master ticks per bit at the 8192 Hz internal clock
const TICKS_PER_BIT: u32 = TICKS_PER_SEC / 8192;

pub trait SerialEndpoint {
    /// Exchange a byte with the partner. Returns the byte received.
    fn transfer(&mut self, outgoing: u8) -> io::Result<u8>;
}

/// No cable attached. The line floats high so every transfer receives 0xFF;
/// with `loopback` the sent byte is echoed back instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSerialEndpoint {
    loopback: bool,
}

impl NullSerialEndpoint {
    pub fn new(loopback: bool) -> Self {
        Self { loopback }
    }
}

impl SerialEndpoint for NullSerialEndpoint {
    fn transfer(&mut self, outgoing: u8) -> io::Result<u8> {
        Ok(if self.loopback { outgoing } else { 0xff })
    }
}

/// SB/SC registers. Internal-clock transfers complete after eight bit times,
/// then the endpoint is asked for the incoming byte and the serial interrupt
/// is raised.
pub struct SerialPort {
    endpoint: Box<dyn SerialEndpoint>,
    interrupts: Rc<RefCell<InterruptManager>>,
    speed_mode: Rc<RefCell<SpeedMode>>,
    gbc: bool,
    sb: u8,
    sc: u8,
    transfer_in_progress: bool,
    divider: u32,
    bits: u8,
}

impl SerialPort {
    pub fn new(
        interrupts: Rc<RefCell<InterruptManager>>,
        endpoint: Box<dyn SerialEndpoint>,
        speed_mode: Rc<RefCell<SpeedMode>>,
        gbc: bool,
    ) -> Self {
        Self {
            endpoint,
            interrupts,
            speed_mode,
            gbc,
            sb: 0,
            sc: 0,
            transfer_in_progress: false,
            divider: 0,
            bits: 0,
        }
    }

    fn bit_ticks(&self) -> u32 {
        // CGB fast clock runs 32 times faster
        let fast = if self.gbc && self.sc & 0x02 != 0 { 32 } else { 1 };
        (TICKS_PER_BIT / fast / self.speed_mode.borrow().mode()).max(1)
    }

    pub fn tick(&mut self) {
        if !self.transfer_in_progress {
            return;
        }
        self.divider += 1;
        if self.divider < self.bit_ticks() {
            return;
        }
        self.divider = 0;
        self.bits += 1;
        if self.bits < 8 {
            return;
        }

        self.transfer_in_progress = false;
        self.sb = match self.endpoint.transfer(self.sb) {
            Ok(incoming) => incoming,
            Err(e) => {
                log::warn!("serial transfer failed: {e}");
                0
            }
        };
        self.sc &= 0x7f;
        self.interrupts
            .borrow_mut()
            .request_interrupt(InterruptType::Serial);
    }

    fn start_transfer(&mut self) {
        self.transfer_in_progress = true;
        self.divider = 0;
        self.bits = 0;
    }
}

impl AddressSpace for SerialPort {
    fn accepts(&self, address: u16) -> bool {
        address == SB || address == SC
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            SB => self.sb,
            _ => self.sc | 0b0111_1110,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            SB => self.sb = value,
            _ => {
                self.sc = value;
                if value & 0x81 == 0x81 {
                    self.start_transfer();
                } else {
                    // external clock: no partner ever clocks the bits in
                    self.transfer_in_progress = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Rc<RefCell<Vec<u8>>>);

    impl SerialEndpoint for Recorder {
        fn transfer(&mut self, outgoing: u8) -> io::Result<u8> {
            self.0.borrow_mut().push(outgoing);
            Ok(0x42)
        }
    }

    struct Broken;

    impl SerialEndpoint for Broken {
        fn transfer(&mut self, _outgoing: u8) -> io::Result<u8> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"))
        }
    }

    fn port(endpoint: Box<dyn SerialEndpoint>) -> (SerialPort, Rc<RefCell<InterruptManager>>) {
        let interrupts = Rc::new(RefCell::new(InterruptManager::new(false)));
        interrupts.borrow_mut().write(0xff0f, 0);
        let speed = Rc::new(RefCell::new(SpeedMode::new()));
        (SerialPort::new(Rc::clone(&interrupts), endpoint, speed, false), interrupts)
    }

    fn ticks_until_done(port: &mut SerialPort) -> u32 {
        let mut n = 0;
        while port.read(SC) & 0x80 != 0 {
            port.tick();
            n += 1;
            assert!(n < 100_000, "transfer never finished");
        }
        n
    }

    #[test]
    fn internal_clock_transfer() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let (mut port, interrupts) = port(Box::new(Recorder(Rc::clone(&sent))));
        port.write(SB, b'P');
        port.write(SC, 0x81);
        assert_eq!(port.read(SC), 0xff);
        assert_eq!(ticks_until_done(&mut port), 8 * TICKS_PER_BIT);
        assert_eq!(*sent.borrow(), vec![b'P']);
        assert_eq!(port.read(SB), 0x42);
        assert_eq!(port.read(SC), 0x7f);
        assert_ne!(interrupts.borrow().read(0xff0f) & InterruptType::Serial.bit(), 0);
    }

    #[test]
    fn endpoint_error_receives_zero() {
        let (mut port, _) = port(Box::new(Broken));
        port.write(SB, 0x12);
        port.write(SC, 0x81);
        ticks_until_done(&mut port);
        assert_eq!(port.read(SB), 0x00);
    }

    #[test]
    fn external_clock_waits_forever() {
        let (mut port, interrupts) = port(Box::new(NullSerialEndpoint::default()));
        port.write(SC, 0x80);
        for _ in 0..20_000 {
            port.tick();
        }
        assert_eq!(port.read(SC), 0xfe);
        assert_eq!(interrupts.borrow().read(0xff0f) & InterruptType::Serial.bit(), 0);
    }

    #[test]
    fn null_endpoint() {
        let mut null = NullSerialEndpoint::default();
        assert_eq!(null.transfer(0x12).ok(), Some(0xff));
        let mut echo = NullSerialEndpoint::new(true);
        assert_eq!(echo.transfer(0x12).ok(), Some(0x12));
    }
}
