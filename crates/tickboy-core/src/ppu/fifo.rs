//! Pixel FIFOs feeding the LCD. The fetcher pushes eight pixels at a time;
//! sprites are mixed into pixels already queued.

use super::VideoState;
use super::lcdc::PpuRegister;
use super::palette::TileAttributes;
use crate::display::Display;

const QUEUE_CAPACITY: usize = 16;

/// Fixed-capacity ring buffer with indexed access to queued entries.
#[derive(Debug, Clone)]
pub struct IntQueue {
    array: [i32; QUEUE_CAPACITY],
    size: usize,
    offset: usize,
}

impl Default for IntQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IntQueue {
    pub fn new() -> Self {
        Self {
            array: [0; QUEUE_CAPACITY],
            size: 0,
            offset: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn enqueue(&mut self, value: i32) {
        assert!(self.size < QUEUE_CAPACITY, "pixel queue is full");
        self.array[(self.offset + self.size) % QUEUE_CAPACITY] = value;
        self.size += 1;
    }

    pub fn dequeue(&mut self) -> i32 {
        debug_assert!(self.size > 0, "pixel queue is empty");
        if self.size == 0 {
            return 0;
        }
        self.size -= 1;
        let value = self.array[self.offset];
        self.offset = (self.offset + 1) % QUEUE_CAPACITY;
        value
    }

    pub fn get(&self, index: usize) -> i32 {
        assert!(index < self.size, "index {index} past queue length {}", self.size);
        self.array[(self.offset + index) % QUEUE_CAPACITY]
    }

    pub fn set(&mut self, index: usize, value: i32) {
        assert!(index < self.size, "index {index} past queue length {}", self.size);
        self.array[(self.offset + index) % QUEUE_CAPACITY] = value;
    }

    pub fn clear(&mut self) {
        self.size = 0;
        self.offset = 0;
    }

    pub fn to_vec(&self) -> Vec<i32> {
        (0..self.size).map(|i| self.get(i)).collect()
    }
}

pub trait PixelFifo {
    fn len(&self) -> usize;
    fn put_pixel_to_screen(&mut self, video: &VideoState, display: &mut dyn Display);
    fn drop_pixel(&mut self, video: &VideoState);
    fn enqueue8_pixels(&mut self, pixels: &[u8; 8], attributes: TileAttributes, video: &VideoState);
    /// Mix a sprite row into the queued pixels, starting `offset` pixels
    /// into the row.
    fn set_overlay(
        &mut self,
        pixels: &[u8; 8],
        offset: usize,
        attributes: TileAttributes,
        oam_index: usize,
        video: &VideoState,
    );
    fn clear(&mut self);
}

const PIXEL_BG: i32 = 0;
const PIXEL_SPRITE: i32 = 1;

/// DMG FIFO: each pixel carries the palette register value captured when it
/// was queued.
#[derive(Debug, Default, Clone)]
pub struct DmgPixelFifo {
    pixels: IntQueue,
    palettes: IntQueue,
    pixel_type: IntQueue,
}

impl DmgPixelFifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dequeue_pixel(&mut self) -> u8 {
        self.pixel_type.dequeue();
        let palette = self.palettes.dequeue();
        let color = self.pixels.dequeue();
        Self::color(palette, color)
    }

    pub fn pixels(&self) -> &IntQueue {
        &self.pixels
    }

    fn color(palette: i32, color_index: i32) -> u8 {
        (0b11 & (palette >> (color_index * 2))) as u8
    }
}

impl PixelFifo for DmgPixelFifo {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn put_pixel_to_screen(&mut self, _video: &VideoState, display: &mut dyn Display) {
        let color = self.dequeue_pixel();
        display.put_dmg_pixel(color);
    }

    fn drop_pixel(&mut self, _video: &VideoState) {
        self.dequeue_pixel();
    }

    fn enqueue8_pixels(&mut self, pixels: &[u8; 8], _attributes: TileAttributes, video: &VideoState) {
        let bgp = video.registers.get(PpuRegister::Bgp) as i32;
        for &p in pixels {
            self.pixels.enqueue(p as i32);
            self.palettes.enqueue(bgp);
            self.pixel_type.enqueue(PIXEL_BG);
        }
    }

    fn set_overlay(
        &mut self,
        pixels: &[u8; 8],
        offset: usize,
        attributes: TileAttributes,
        _oam_index: usize,
        video: &VideoState,
    ) {
        let priority = attributes.is_priority();
        let overlay_palette = video.registers.get(attributes.dmg_palette()) as i32;
        for (j, &p) in pixels.iter().enumerate().skip(offset) {
            if p == 0 {
                continue;
            }
            let i = j - offset;
            if self.pixel_type.get(i) == PIXEL_SPRITE {
                continue;
            }
            if !priority || self.pixels.get(i) == 0 {
                self.pixels.set(i, p as i32);
                self.palettes.set(i, overlay_palette);
                self.pixel_type.set(i, PIXEL_SPRITE);
            }
        }
    }

    fn clear(&mut self) {
        self.pixels.clear();
        self.palettes.clear();
        self.pixel_type.clear();
    }
}

// Priority markers for background pixels; sprite pixels store their OAM
// index (0..10) instead.
const BG_PRIORITY: i32 = 100;
const BG_NO_PRIORITY: i32 = -1;

/// CGB FIFO: each pixel carries a palette number and an owner/priority tag.
#[derive(Debug, Default, Clone)]
pub struct ColorPixelFifo {
    pixels: IntQueue,
    palettes: IntQueue,
    priorities: IntQueue,
}

impl ColorPixelFifo {
    pub fn new() -> Self {
        Self::default()
    }

    fn dequeue_pixel(&mut self, video: &VideoState) -> u16 {
        let priority = self.priorities.dequeue();
        let palette = self.palettes.dequeue() as usize;
        let color = self.pixels.dequeue() as usize & 0b11;
        if (0..10).contains(&priority) {
            video.oam_palette.palette(palette)[color]
        } else {
            video.bg_palette.palette(palette)[color]
        }
    }
}

impl PixelFifo for ColorPixelFifo {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn put_pixel_to_screen(&mut self, video: &VideoState, display: &mut dyn Display) {
        let color = self.dequeue_pixel(video);
        display.put_color_pixel(color);
    }

    fn drop_pixel(&mut self, video: &VideoState) {
        self.dequeue_pixel(video);
    }

    fn enqueue8_pixels(&mut self, pixels: &[u8; 8], attributes: TileAttributes, _video: &VideoState) {
        let priority = if attributes.is_priority() {
            BG_PRIORITY
        } else {
            BG_NO_PRIORITY
        };
        for &p in pixels {
            self.pixels.enqueue(p as i32);
            self.palettes.enqueue(attributes.color_palette_index() as i32);
            self.priorities.enqueue(priority);
        }
    }

    fn set_overlay(
        &mut self,
        pixels: &[u8; 8],
        offset: usize,
        attributes: TileAttributes,
        oam_index: usize,
        video: &VideoState,
    ) {
        let bg_enabled = video.lcdc.is_bg_and_window_display();
        let oam_index = oam_index as i32;
        for (j, &p) in pixels.iter().enumerate().skip(offset) {
            // color 0 is always transparent
            if p == 0 {
                continue;
            }
            let i = j - offset;
            let old_priority = self.priorities.get(i);
            let old_pixel = self.pixels.get(i);
            let put = if (old_priority == BG_NO_PRIORITY || old_priority == BG_PRIORITY) && !bg_enabled {
                true
            } else if old_priority == BG_PRIORITY {
                old_pixel == 0
            } else if old_priority == BG_NO_PRIORITY {
                !attributes.is_priority() || old_pixel == 0
            } else {
                // another sprite: the lower OAM index wins
                (0..10).contains(&old_priority) && old_priority > oam_index
            };
            if put {
                self.pixels.set(i, p as i32);
                self.palettes.set(i, attributes.color_palette_index() as i32);
                self.priorities.set(i, oam_index);
            }
        }
    }

    fn clear(&mut self) {
        self.pixels.clear();
        self.palettes.clear();
        self.priorities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_space::AddressSpace;
    use crate::ppu::fetcher::zip;

    fn video() -> VideoState {
        let mut video = VideoState::new(false);
        video.registers.put(PpuRegister::Bgp, 0b1110_0100);
        video
    }

    #[test]
    fn enqueue() {
        let video = video();
        let mut fifo = DmgPixelFifo::new();
        fifo.enqueue8_pixels(&zip(0b1100_1001, 0b1111_0000, false), TileAttributes::EMPTY, &video);
        assert_eq!(fifo.pixels().to_vec(), vec![3, 3, 2, 2, 1, 0, 0, 1]);
    }

    #[test]
    fn dequeue() {
        let video = video();
        let mut fifo = DmgPixelFifo::new();
        fifo.enqueue8_pixels(&zip(0b1100_1001, 0b1111_0000, false), TileAttributes::EMPTY, &video);
        fifo.enqueue8_pixels(&zip(0b1010_1011, 0b1110_0111, false), TileAttributes::EMPTY, &video);
        assert_eq!(fifo.dequeue_pixel(), 0b11);
        assert_eq!(fifo.dequeue_pixel(), 0b11);
        assert_eq!(fifo.dequeue_pixel(), 0b10);
        assert_eq!(fifo.dequeue_pixel(), 0b10);
        assert_eq!(fifo.dequeue_pixel(), 0b01);
        assert_eq!(fifo.len(), 11);
    }

    #[test]
    fn dmg_sprite_overlay_respects_priority() {
        let mut video = video();
        video.registers.put(PpuRegister::Obp0, 0b0001_1011);
        let mut fifo = DmgPixelFifo::new();
        fifo.enqueue8_pixels(&[0, 1, 0, 1, 0, 1, 0, 1], TileAttributes::EMPTY, &video);
        // behind background: only lands on color 0
        fifo.set_overlay(&[3; 8], 0, TileAttributes(0x80), 0, &video);
        assert_eq!(fifo.pixels().to_vec(), vec![3, 1, 3, 1, 3, 1, 3, 1]);
        // earlier sprite pixels are kept
        fifo.set_overlay(&[2; 8], 4, TileAttributes::EMPTY, 1, &video);
        assert_eq!(fifo.pixels().to_vec(), vec![3, 2, 3, 2, 3, 1, 3, 1]);
    }

    #[test]
    fn transparent_dmg_sprite_does_not_claim_pixels() {
        let mut video = video();
        video.registers.put(PpuRegister::Obp0, 0b0001_1011);
        let mut fifo = DmgPixelFifo::new();
        fifo.enqueue8_pixels(&[0; 8], TileAttributes::EMPTY, &video);
        fifo.set_overlay(&[0; 8], 0, TileAttributes(0x80), 0, &video);
        assert_eq!(fifo.pixels().to_vec(), vec![0; 8]);
        // the next sprite at the same x still shows through OBP0
        fifo.set_overlay(&[2; 8], 0, TileAttributes::EMPTY, 1, &video);
        assert_eq!(fifo.dequeue_pixel(), 0b01);
    }

    #[test]
    fn color_overlay_lower_oam_index_wins() {
        let mut video = VideoState::new(true);
        video.bg_palette.write(0xff68, 0x80);
        for _ in 0..8 {
            video.bg_palette.write(0xff69, 0x11);
        }
        video.oam_palette.fill_with_ff();
        let mut fifo = ColorPixelFifo::new();
        fifo.enqueue8_pixels(&[0; 8], TileAttributes::EMPTY, &video);
        fifo.set_overlay(&[1; 8], 0, TileAttributes::EMPTY, 5, &video);
        fifo.set_overlay(&[2; 8], 0, TileAttributes::EMPTY, 7, &video);
        assert_eq!(fifo.pixels.to_vec(), vec![1; 8], "index 5 beats index 7");
        fifo.set_overlay(&[3; 8], 0, TileAttributes::EMPTY, 2, &video);
        assert_eq!(fifo.pixels.to_vec(), vec![3; 8]);
        assert_eq!(fifo.dequeue_pixel(&video), 0x7fff);
    }

    #[test]
    fn queue_wraps_around() {
        let mut q = IntQueue::new();
        for i in 0..12 {
            q.enqueue(i);
        }
        for _ in 0..10 {
            q.dequeue();
        }
        for i in 12..24 {
            q.enqueue(i);
        }
        assert_eq!(q.len(), 14);
        assert_eq!(q.get(0), 10);
        assert_eq!(q.get(13), 23);
        q.set(13, -1);
        assert_eq!(q.to_vec().last(), Some(&-1));
    }
}
