use std::path::PathBuf;

use crate::error::{EmulatorError, Result};

/// Machine configuration, usually assembled by the frontend from its
/// command line and config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameboyOptions {
    pub rom_file: Option<PathBuf>,
    pub force_dmg: bool,
    pub force_cgb: bool,
    pub use_bootstrap: bool,
    /// Boot ROM image mapped while `use_bootstrap` is set. Nothing is bundled.
    pub boot_rom: Option<PathBuf>,
    pub disable_battery_saves: bool,
    pub debug: bool,
    pub headless: bool,
}

impl GameboyOptions {
    pub fn new(rom_file: impl Into<PathBuf>) -> Self {
        Self {
            rom_file: Some(rom_file.into()),
            ..Self::default()
        }
    }

    pub fn supports_battery_saves(&self) -> bool {
        !self.disable_battery_saves
    }

    pub fn validate(&self) -> Result<()> {
        if self.force_dmg && self.force_cgb {
            return Err(EmulatorError::ConflictingModelFlags);
        }
        if self.rom_file.is_none() {
            return Err(EmulatorError::MissingRom);
        }
        if self.use_bootstrap && self.boot_rom.is_none() {
            return Err(EmulatorError::MissingBootRom);
        }
        Ok(())
    }
}
