use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tickboy_core::GameboyOptions;

pub const DEFAULT_AUDIO_BUFFER_FRAMES: usize = 4096;

/// Persistent defaults. Command-line flags win over anything set here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub force_dmg: bool,
    pub force_cgb: bool,
    pub use_bootstrap: bool,
    pub boot_rom: Option<PathBuf>,
    pub disable_battery_saves: bool,
    pub audio: bool,
    pub audio_buffer_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            force_dmg: false,
            force_cgb: false,
            use_bootstrap: false,
            boot_rom: None,
            disable_battery_saves: false,
            audio: true,
            audio_buffer_frames: DEFAULT_AUDIO_BUFFER_FRAMES,
        }
    }
}

impl Config {
    /// Fills in whatever the command line left unset.
    pub fn apply_to(&self, options: &mut GameboyOptions) {
        // a model flag on the command line replaces the file's choice
        if !options.force_dmg && !options.force_cgb {
            options.force_dmg = self.force_dmg;
            options.force_cgb = self.force_cgb;
        }
        options.use_bootstrap |= self.use_bootstrap;
        options.disable_battery_saves |= self.disable_battery_saves;
        if options.boot_rom.is_none() {
            options.boot_rom = self.boot_rom.clone();
        }
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("tickboy").join("config.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tickboy").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("tickboy")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

pub fn load_from_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };

    match toml::from_str::<Config>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("nope.toml"));
        assert_eq!(cfg, Config::default());
        assert!(cfg.audio);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "force_dmg = true\nboot_rom = \"/roms/dmg_boot.bin\"\naudio = false\n",
        )
        .unwrap();
        let cfg = load_from_file(&path);
        assert!(cfg.force_dmg);
        assert!(!cfg.audio);
        assert_eq!(cfg.boot_rom, Some(PathBuf::from("/roms/dmg_boot.bin")));
        assert_eq!(cfg.audio_buffer_frames, DEFAULT_AUDIO_BUFFER_FRAMES);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "force_dmg = \"yes please\"").unwrap();
        assert_eq!(load_from_file(&path), Config::default());
    }

    #[test]
    fn command_line_model_wins() {
        let cfg = Config {
            force_dmg: true,
            use_bootstrap: true,
            boot_rom: Some(PathBuf::from("cfg.bin")),
            ..Config::default()
        };

        let mut options = GameboyOptions {
            force_cgb: true,
            boot_rom: Some(PathBuf::from("cli.bin")),
            ..GameboyOptions::default()
        };
        cfg.apply_to(&mut options);
        assert!(options.force_cgb);
        assert!(!options.force_dmg);
        assert!(options.use_bootstrap);
        assert_eq!(options.boot_rom, Some(PathBuf::from("cli.bin")));

        let mut options = GameboyOptions::default();
        cfg.apply_to(&mut options);
        assert!(options.force_dmg);
        assert_eq!(options.boot_rom, Some(PathBuf::from("cfg.bin")));
    }
}
