use crate::address_space::AddressSpace;

/// Master clock frequency; every component ticks once per master cycle.
pub const TICKS_PER_SEC: u32 = 4_194_304;

/// CGB double-speed switch (KEY1, FF4D). A STOP executed with the switch
/// armed toggles the speed instead of stopping the CPU.
#[derive(Debug, Default, Clone)]
pub struct SpeedMode {
    current_speed: bool,
    prepare_speed_switch: bool,
}

impl SpeedMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the STOP was consumed by a speed switch.
    pub fn on_stop(&mut self) -> bool {
        if self.prepare_speed_switch {
            self.current_speed = !self.current_speed;
            self.prepare_speed_switch = false;
            log::debug!("speed switch, double speed = {}", self.current_speed);
            true
        } else {
            false
        }
    }

    /// 1 in normal speed, 2 in double speed.
    #[inline]
    pub fn mode(&self) -> u32 {
        if self.current_speed { 2 } else { 1 }
    }
}

impl AddressSpace for SpeedMode {
    fn accepts(&self, address: u16) -> bool {
        address == 0xff4d
    }

    fn read(&self, _address: u16) -> u8 {
        if self.current_speed {
            0x80
        } else {
            (self.prepare_speed_switch as u8) | 0b0111_1110
        }
    }

    fn write(&mut self, _address: u16, value: u8) {
        self.prepare_speed_switch = value & 0x01 != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_toggles_only_when_armed() {
        let mut speed = SpeedMode::new();
        assert!(!speed.on_stop());
        assert_eq!(speed.read(0xff4d), 0x7e);
        speed.write(0xff4d, 0x01);
        assert_eq!(speed.read(0xff4d), 0x7f);
        assert!(speed.on_stop());
        assert_eq!(speed.mode(), 2);
        assert_eq!(speed.read(0xff4d), 0x80);
        assert!(!speed.on_stop(), "switch is disarmed after use");
    }
}
