use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Receiver of the pixels the PPU shifts out, one call per visible pixel in
/// scan order, plus the frame handshake with whatever presents them.
pub trait Display {
    /// DMG shade index, 0 (lightest) to 3.
    fn put_dmg_pixel(&mut self, color: u8);
    /// CGB colour, 5 bits per channel, red in the low bits.
    fn put_color_pixel(&mut self, gbc_rgb: u16);
    /// The frame is complete; hand it over without blocking.
    fn request_refresh(&mut self);
    /// Block until the last handed-over frame was consumed.
    fn wait_for_refresh(&mut self);
    fn enable_lcd(&mut self);
    fn disable_lcd(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn put_dmg_pixel(&mut self, _color: u8) {}
    fn put_color_pixel(&mut self, _gbc_rgb: u16) {}
    fn request_refresh(&mut self) {}
    fn wait_for_refresh(&mut self) {}
    fn enable_lcd(&mut self) {}
    fn disable_lcd(&mut self) {}
}

// 0x00RRGGBB grey shades for DMG colour indices 0..=3
pub const DMG_SHADES: [u32; 4] = [0x00ff_ffff, 0x00aa_aaaa, 0x0055_5555, 0x0000_0000];

const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Expand a 15-bit CGB colour to 0x00RRGGBB.
pub fn translate_gbc_rgb(gbc_rgb: u16) -> u32 {
    let expand = |c: u16| -> u32 {
        let c = (c & 0x1f) as u32;
        (c << 3) | (c >> 2)
    };
    let r = expand(gbc_rgb);
    let g = expand(gbc_rgb >> 5);
    let b = expand(gbc_rgb >> 10);
    (r << 16) | (g << 8) | b
}

#[derive(Debug)]
struct FrameSlot {
    frame: Vec<u32>,
    refresh_pending: bool,
    frames: u64,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<FrameSlot>,
    refreshed: Condvar,
    stopped: AtomicBool,
}

/// Display that renders into a 160x144 0x00RRGGBB buffer and hands finished
/// frames to a [`FrameReceiver`] on another thread.
#[derive(Debug)]
pub struct FrameBuffer {
    pixels: Vec<u32>,
    pos: usize,
    enabled: bool,
    shared: Arc<Shared>,
}

/// Consumer end of a [`FrameBuffer`].
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    shared: Arc<Shared>,
}

impl FrameBuffer {
    pub fn new() -> (Self, FrameReceiver) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(FrameSlot {
                frame: vec![DMG_SHADES[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
                refresh_pending: false,
                frames: 0,
            }),
            refreshed: Condvar::new(),
            stopped: AtomicBool::new(false),
        });
        let receiver = FrameReceiver {
            shared: Arc::clone(&shared),
        };
        let display = Self {
            pixels: vec![DMG_SHADES[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
            pos: 0,
            enabled: true,
            shared,
        };
        (display, receiver)
    }

    fn put(&mut self, rgb: u32) {
        if let Some(p) = self.pixels.get_mut(self.pos) {
            *p = rgb;
        }
        self.pos += 1;
    }
}

impl Display for FrameBuffer {
    fn put_dmg_pixel(&mut self, color: u8) {
        self.put(DMG_SHADES[(color & 0b11) as usize]);
    }

    fn put_color_pixel(&mut self, gbc_rgb: u16) {
        self.put(translate_gbc_rgb(gbc_rgb));
    }

    fn request_refresh(&mut self) {
        if !self.enabled {
            self.pixels.fill(DMG_SHADES[0]);
        }
        if let Ok(mut slot) = self.shared.slot.lock() {
            slot.frame.copy_from_slice(&self.pixels);
            slot.refresh_pending = true;
            slot.frames += 1;
        }
        self.shared.refreshed.notify_all();
        self.pos = 0;
    }

    fn wait_for_refresh(&mut self) {
        let Ok(mut slot) = self.shared.slot.lock() else {
            return;
        };
        while slot.refresh_pending && !self.shared.stopped.load(Ordering::Acquire) {
            match self.shared.refreshed.wait_timeout(slot, WAIT_SLICE) {
                Ok((guard, _)) => slot = guard,
                Err(_) => return,
            }
        }
    }

    fn enable_lcd(&mut self) {
        self.enabled = true;
        self.pos = 0;
    }

    fn disable_lcd(&mut self) {
        self.enabled = false;
    }
}

impl FrameReceiver {
    /// Wait up to `timeout` for a new frame. Taking it releases the
    /// emulation thread blocked in `wait_for_refresh`.
    pub fn take_frame(&self, timeout: Duration) -> Option<Vec<u32>> {
        let mut slot = self.shared.slot.lock().ok()?;
        if !slot.refresh_pending {
            let (guard, _) = self
                .shared
                .refreshed
                .wait_timeout_while(slot, timeout, |s| {
                    !s.refresh_pending && !self.shared.stopped.load(Ordering::Acquire)
                })
                .ok()?;
            slot = guard;
        }
        if !slot.refresh_pending {
            return None;
        }
        let frame = slot.frame.clone();
        slot.refresh_pending = false;
        drop(slot);
        self.shared.refreshed.notify_all();
        Some(frame)
    }

    /// Number of frames handed over so far.
    pub fn frames(&self) -> u64 {
        self.shared.slot.lock().map(|s| s.frames).unwrap_or(0)
    }

    /// Unblock both sides for shutdown.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.refreshed.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn gbc_colors_expand_to_full_range() {
        assert_eq!(translate_gbc_rgb(0x7fff), 0x00ff_ffff);
        assert_eq!(translate_gbc_rgb(0x001f), 0x00ff_0000);
        assert_eq!(translate_gbc_rgb(0x03e0), 0x0000_ff00);
        assert_eq!(translate_gbc_rgb(0x7c00), 0x0000_00ff);
        assert_eq!(translate_gbc_rgb(0), 0);
    }

    #[test]
    fn frame_handshake_across_threads() {
        let (mut display, receiver) = FrameBuffer::new();
        let consumer = thread::spawn(move || {
            let mut got = Vec::new();
            while got.len() < 3 {
                if let Some(frame) = receiver.take_frame(Duration::from_millis(500)) {
                    got.push(frame[0]);
                }
            }
            (got, receiver.frames())
        });
        for shade in [1u8, 2, 3] {
            display.put_dmg_pixel(shade);
            display.request_refresh();
            display.wait_for_refresh();
        }
        let (got, frames) = consumer.join().expect("consumer thread");
        assert_eq!(got, vec![DMG_SHADES[1], DMG_SHADES[2], DMG_SHADES[3]]);
        assert_eq!(frames, 3);
    }

    #[test]
    fn stop_releases_waiting_producer() {
        let (mut display, receiver) = FrameBuffer::new();
        display.request_refresh();
        receiver.stop();
        display.wait_for_refresh();
        assert!(receiver.is_stopped());
    }

    #[test]
    fn disabled_lcd_shows_blank_frame() {
        let (mut display, receiver) = FrameBuffer::new();
        display.put_dmg_pixel(3);
        display.disable_lcd();
        display.request_refresh();
        let frame = receiver.take_frame(Duration::from_millis(10)).expect("frame");
        assert_eq!(frame[0], DMG_SHADES[0]);
    }

    #[test]
    fn dmg_shades_are_grey_from_light_to_dark() {
        for pair in DMG_SHADES.windows(2) {
            assert!(pair[0] > pair[1]);
        }
        for shade in DMG_SHADES {
            let [_, r, g, b] = shade.to_be_bytes();
            assert!(r == g && g == b, "{shade:06x}");
        }
    }
}
