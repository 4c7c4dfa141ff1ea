use thiserror::Error;

/// Errors that stop the emulator, either at startup or mid-run.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to read ROM archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive contains no .gb, .gbc or .rom entry")]
    NoRomInArchive,

    #[error("no ROM file given")]
    MissingRom,

    #[error("unsupported ROM size code 0x{0:02x}")]
    UnsupportedRomSize(u8),

    #[error("unsupported RAM size code 0x{0:02x}")]
    UnsupportedRamSize(u8),

    #[error("unsupported cartridge type 0x{0:02x}")]
    UnsupportedCartridgeType(u8),

    #[error("force-dmg and force-cgb can't be used together")]
    ConflictingModelFlags,

    #[error("bootstrap requested but no boot ROM image was given")]
    MissingBootRom,

    #[error("boot ROM image is {actual} bytes, expected {expected}")]
    BootRomSize { expected: usize, actual: usize },

    #[error("no instruction for opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("no instruction for opcode 0xcb 0x{0:02x}")]
    UnknownExtendedOpcode(u8),
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
