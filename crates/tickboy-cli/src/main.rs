mod audio;
mod config;
mod input;
mod screenshot;

use clap::Parser;
use crossbeam_channel as cb;
use log::{error, info, warn};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use tickboy_core::audio_queue::{self, DEFAULT_SAMPLE_RATE, QueueSoundOutput, SampleProducer};
use tickboy_core::cartridge::Cartridge;
use tickboy_core::display::{FrameBuffer, FrameReceiver};
use tickboy_core::joypad::{NullController, QueuedController};
use tickboy_core::serial::NullSerialEndpoint;
use tickboy_core::{Gameboy, GameboyOptions, Peripherals, StopHandle};

const GB_FPS: f64 = 59.7275;
const FRAME_TIME: Duration = Duration::from_nanos((1e9_f64 / GB_FPS) as u64);
const FRAME_POLL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "tickboy", version, about = "Cycle-accurate Game Boy emulator")]
struct Args {
    /// Path to ROM file (.gb, .gbc, .rom or .zip)
    rom: Option<PathBuf>,

    /// Force DMG mode
    #[arg(short = 'd', long, conflicts_with = "force_cgb")]
    force_dmg: bool,

    /// Force CGB mode
    #[arg(short = 'c', long, conflicts_with = "force_dmg")]
    force_cgb: bool,

    /// Run the boot ROM before the game
    #[arg(short = 'b', long)]
    use_bootstrap: bool,

    /// Boot ROM image (256 bytes for DMG, 2304 for CGB)
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Don't read or write the .sav file
    #[arg(long, visible_alias = "db")]
    disable_battery_saves: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// No audio, no console input, no frame pacing
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Write the last frame to this PNG on exit
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/tickboy/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn options(&self) -> GameboyOptions {
        GameboyOptions {
            rom_file: self.rom.clone(),
            force_dmg: self.force_dmg,
            force_cgb: self.force_cgb,
            use_bootstrap: self.use_bootstrap,
            boot_rom: self.boot_rom.clone(),
            disable_battery_saves: self.disable_battery_saves,
            debug: self.debug,
            headless: self.headless,
        }
    }
}

/// `-db` is one flag, not `-d -b`; clap only knows it as `--db`.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| if arg == "-db" { OsString::from("--db") } else { arg })
        .collect()
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Everything the emulation thread needs to assemble its peripherals. All
/// of it is `Send`; the peripherals themselves are built on that thread.
struct Frontend {
    display: FrameBuffer,
    controller: Option<QueuedController>,
    sound: Option<(SampleProducer, u32)>,
}

impl Frontend {
    fn peripherals(self) -> Peripherals {
        let mut peripherals = Peripherals {
            display: Box::new(self.display),
            serial_endpoint: Box::new(NullSerialEndpoint::default()),
            ..Peripherals::default()
        };
        peripherals.controller = match self.controller {
            Some(c) => Box::new(c),
            None => Box::new(NullController),
        };
        if let Some((producer, rate)) = self.sound {
            peripherals.sound_output = Box::new(QueueSoundOutput::new(producer, rate));
        }
        peripherals
    }
}

struct EmulationThread {
    handle: thread::JoinHandle<tickboy_core::Result<u64>>,
    stop: StopHandle,
}

/// The Gameboy is single-threaded and not `Send`, so it is built and run
/// entirely on its own thread. Returns once it is ticking.
fn spawn_emulation(
    options: GameboyOptions,
    frontend: Frontend,
) -> Result<EmulationThread, String> {
    let (ready_tx, ready_rx) = cb::bounded(1);
    let handle = thread::Builder::new()
        .name("emulation".into())
        .spawn(move || -> tickboy_core::Result<u64> {
            let cartridge = Cartridge::from_file(&options)?;
            let mut gb = Gameboy::new(&options, cartridge, frontend.peripherals());
            let _ = ready_tx.send(gb.stop_handle());
            gb.run()?;
            Ok(gb.frames())
        })
        .map_err(|e| format!("failed to start emulation thread: {e}"))?;

    match ready_rx.recv() {
        Ok(stop) => Ok(EmulationThread { handle, stop }),
        // the thread bailed out before building the machine
        Err(_) => Err(match handle.join() {
            Ok(Err(e)) => e.to_string(),
            Ok(Ok(_)) => "emulation ended before starting".to_string(),
            Err(_) => "emulation thread panicked".to_string(),
        }),
    }
}

/// Takes frames until the emulation ends, `--frames` is reached or the
/// console asks to quit. Returns the last frame.
fn present(
    receiver: &FrameReceiver,
    emulation: &EmulationThread,
    frame_limit: Option<u64>,
    paced: bool,
) -> Option<Vec<u32>> {
    let mut last = None;
    let mut taken = 0u64;
    let mut next_deadline = Instant::now() + FRAME_TIME;

    while !emulation.stop.is_stopped() && !emulation.handle.is_finished() {
        let Some(frame) = receiver.take_frame(FRAME_POLL) else {
            continue;
        };
        last = Some(frame);
        taken += 1;
        if frame_limit.is_some_and(|limit| taken >= limit) {
            info!("reached {taken} frames");
            break;
        }
        if paced {
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
                next_deadline += FRAME_TIME;
            } else {
                // running behind; don't try to catch up
                next_deadline = now + FRAME_TIME;
            }
        }
    }
    last
}

fn run(args: Args) -> Result<(), String> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let mut options = args.options();
    cfg.apply_to(&mut options);
    options.validate().map_err(|e| e.to_string())?;

    let (display, receiver) = FrameBuffer::new();
    let interactive = !options.headless;

    let controller = interactive.then(QueuedController::new);

    let mut _stream = None;
    let mut sound = None;
    if interactive && cfg.audio {
        let rate = audio::device_sample_rate().unwrap_or(DEFAULT_SAMPLE_RATE);
        let (producer, consumer) = audio_queue::sample_queue(cfg.audio_buffer_frames);
        _stream = audio::start_stream(consumer);
        if _stream.is_some() {
            sound = Some((producer, rate));
        }
    }

    let emulation = spawn_emulation(
        options,
        Frontend {
            display,
            controller: controller.clone(),
            sound,
        },
    )?;
    if let Some(controller) = controller {
        input::spawn_console(controller, emulation.stop.clone());
    }

    let last_frame = present(&receiver, &emulation, args.frames, interactive);

    emulation.stop.stop();
    receiver.stop();
    let result = match emulation.handle.join() {
        Ok(Ok(frames)) => {
            info!("ran {frames} frames");
            Ok(())
        }
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("emulation thread panicked".to_string()),
    };

    if let Some(path) = &args.screenshot {
        match &last_frame {
            Some(frame) => match screenshot::save_png(path, frame) {
                Ok(()) => info!("screenshot written to {}", path.display()),
                Err(e) => warn!("failed to write screenshot {}: {e}", path.display()),
            },
            None => warn!("no frame was drawn, screenshot skipped"),
        }
    }
    result
}

fn main() -> ExitCode {
    let args = Args::parse_from(normalize_args(std::env::args_os()));
    init_logging(args.debug);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_options() {
        let args = Args::parse_from(["tickboy", "-d", "-b", "--db", "game.gb"]);
        let options = args.options();
        assert_eq!(options.rom_file, Some(PathBuf::from("game.gb")));
        assert!(options.force_dmg);
        assert!(!options.force_cgb);
        assert!(options.use_bootstrap);
        assert!(options.disable_battery_saves);
    }

    #[test]
    fn single_dash_db_disables_saves_only() {
        let argv = ["tickboy", "-db", "game.gb"].map(OsString::from);
        let options = Args::parse_from(normalize_args(argv)).options();
        assert!(options.disable_battery_saves);
        assert!(!options.force_dmg);
        assert!(!options.use_bootstrap);
    }

    #[test]
    fn model_flags_conflict() {
        assert!(Args::try_parse_from(["tickboy", "-d", "-c", "game.gb"]).is_err());
    }

    #[test]
    fn scripted_run_flags() {
        let args = Args::parse_from([
            "tickboy",
            "--headless",
            "--frames",
            "60",
            "--screenshot",
            "out.png",
            "game.gb",
        ]);
        assert!(args.headless);
        assert_eq!(args.frames, Some(60));
        assert_eq!(args.screenshot, Some(PathBuf::from("out.png")));
    }
}
