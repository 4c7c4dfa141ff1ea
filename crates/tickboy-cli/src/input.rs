use log::{info, warn};
use std::io::BufRead;
use std::thread;
use std::time::Duration;

use tickboy_core::StopHandle;
use tickboy_core::joypad::{Button, ButtonEvent, QueuedController};

// Long enough for a game polling once per frame to see the press
const TAP_DURATION: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Press(Button),
    Release(Button),
    Tap(Button),
    Quit,
}

/// One console line: `a`, `press start`, `release left`, `quit`.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Err("empty command".to_string());
    };
    let second = words.next();
    if words.next().is_some() {
        return Err(format!("too many words in '{line}'"));
    }
    match (first.to_ascii_lowercase().as_str(), second) {
        ("quit" | "q" | "exit", None) => Ok(Command::Quit),
        ("press", Some(b)) => Ok(Command::Press(b.parse()?)),
        ("release", Some(b)) => Ok(Command::Release(b.parse()?)),
        ("tap", Some(b)) => Ok(Command::Tap(b.parse()?)),
        (b, None) => Ok(Command::Tap(b.parse()?)),
        _ => Err(format!("unknown command '{line}'")),
    }
}

fn execute(command: Command, controller: &QueuedController, stop: &StopHandle) {
    match command {
        Command::Press(b) => controller.push(ButtonEvent::Pressed(b)),
        Command::Release(b) => controller.push(ButtonEvent::Released(b)),
        Command::Tap(b) => {
            controller.push(ButtonEvent::Pressed(b));
            thread::sleep(TAP_DURATION);
            controller.push(ButtonEvent::Released(b));
        }
        Command::Quit => stop.stop(),
    }
}

/// Reads controller commands from stdin until EOF or `quit`. The thread is
/// left detached since the read can't be interrupted.
pub fn spawn_console(controller: QueuedController, stop: StopHandle) {
    let spawned = thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            info!("console controls: a, b, start, select, up, down, left, right, press/release <button>, quit");
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(command) => execute(command, &controller, &stop),
                    Err(e) => warn!("{e}"),
                }
                if stop.is_stopped() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("failed to start console input: {e}");
    }
}
