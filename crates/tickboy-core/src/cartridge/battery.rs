use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::rtc::CLOCK_DATA_LEN;

/// Persistent storage for battery-backed cartridge RAM.
pub trait Battery {
    fn load_ram(&mut self, ram: &mut [u8]);
    fn save_ram(&mut self, ram: &[u8]);

    /// Returns the stored clock fields when the save carried them.
    fn load_ram_with_clock(&mut self, ram: &mut [u8]) -> Option<[i64; CLOCK_DATA_LEN]>;
    fn save_ram_with_clock(&mut self, ram: &[u8], clock: &[i64; CLOCK_DATA_LEN]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullBattery;

impl Battery for NullBattery {
    fn load_ram(&mut self, _ram: &mut [u8]) {}

    fn save_ram(&mut self, _ram: &[u8]) {}

    fn load_ram_with_clock(&mut self, _ram: &mut [u8]) -> Option<[i64; CLOCK_DATA_LEN]> {
        None
    }

    fn save_ram_with_clock(&mut self, _ram: &[u8], _clock: &[i64; CLOCK_DATA_LEN]) {}
}

/// `<rom>.sav` next to the ROM: raw RAM bytes, optionally followed by the
/// clock fields as little-endian 32-bit integers.
#[derive(Debug, Clone)]
pub struct FileBattery {
    path: PathBuf,
}

impl FileBattery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_rom(rom: &Path) -> Self {
        Self::new(rom.with_extension("sav"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("failed to read save file {}: {e}", self.path.display());
                None
            }
        }
    }

    fn write(&self, ram: &[u8], clock: Option<&[i64; CLOCK_DATA_LEN]>) {
        let mut bytes = ram.to_vec();
        if let Some(clock) = clock {
            for &field in clock {
                bytes.extend_from_slice(&(field as u32).to_le_bytes());
            }
        }
        match fs::write(&self.path, &bytes) {
            Ok(()) => log::debug!("saved {} bytes to {}", bytes.len(), self.path.display()),
            Err(e) => log::warn!("failed to write save file {}: {e}", self.path.display()),
        }
    }
}

fn copy_ram(saved: &[u8], ram: &mut [u8]) {
    let n = saved.len().min(ram.len());
    ram[..n].copy_from_slice(&saved[..n]);
}

impl Battery for FileBattery {
    fn load_ram(&mut self, ram: &mut [u8]) {
        if let Some(saved) = self.read() {
            copy_ram(&saved, ram);
            log::info!("loaded battery RAM from {}", self.path.display());
        }
    }

    fn save_ram(&mut self, ram: &[u8]) {
        self.write(ram, None);
    }

    fn load_ram_with_clock(&mut self, ram: &mut [u8]) -> Option<[i64; CLOCK_DATA_LEN]> {
        let saved = self.read()?;
        copy_ram(&saved, ram);
        log::info!("loaded battery RAM from {}", self.path.display());

        let tail = saved.get(ram.len()..)?;
        if tail.len() < CLOCK_DATA_LEN * 4 {
            return None;
        }
        let mut clock = [0; CLOCK_DATA_LEN];
        for (field, chunk) in clock.iter_mut().zip(tail.chunks_exact(4)) {
            *field = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as i64;
        }
        Some(clock)
    }

    fn save_ram_with_clock(&mut self, ram: &[u8], clock: &[i64; CLOCK_DATA_LEN]) {
        self.write(ram, Some(clock));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_file_sits_next_to_rom() {
        let battery = FileBattery::for_rom(Path::new("/games/pokemon.gbc"));
        assert_eq!(battery.path(), Path::new("/games/pokemon.sav"));
    }

    #[test]
    fn missing_file_leaves_ram_alone() {
        let dir = tempdir().unwrap();
        let mut battery = FileBattery::new(dir.path().join("none.sav"));
        let mut ram = [0xff; 16];
        battery.load_ram(&mut ram);
        assert_eq!(ram, [0xff; 16]);
        assert!(battery.load_ram_with_clock(&mut ram).is_none());
    }

    #[test]
    fn ram_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.sav");
        let ram: Vec<u8> = (0..=255).collect();
        FileBattery::new(&path).save_ram(&ram);
        assert_eq!(fs::read(&path).unwrap(), ram);

        let mut loaded = vec![0; 256];
        FileBattery::new(&path).load_ram(&mut loaded);
        assert_eq!(loaded, ram);
    }

    #[test]
    fn clock_fields_follow_ram() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rtc.sav");
        let clock = [1, 2, 3, 4, 0, 1, 2, 3, 4, 0, 1_700_000_000];
        FileBattery::new(&path).save_ram_with_clock(&[0xab; 32], &clock);
        assert_eq!(fs::metadata(&path).unwrap().len(), 32 + 44);

        let mut ram = [0; 32];
        let loaded = FileBattery::new(&path).load_ram_with_clock(&mut ram);
        assert_eq!(ram, [0xab; 32]);
        assert_eq!(loaded, Some(clock));
    }

    #[test]
    fn short_save_fills_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.sav");
        fs::write(&path, [1, 2, 3]).unwrap();
        let mut ram = [0xff; 6];
        assert!(FileBattery::new(&path).load_ram_with_clock(&mut ram).is_none());
        assert_eq!(ram, [1, 2, 3, 0xff, 0xff, 0xff]);
    }
}
