use super::VideoState;
use super::fifo::PixelFifo;
use super::lcdc::PpuRegister;
use super::palette::TileAttributes;
use super::phases::SpritePosition;
use crate::address_space::{AddressSpace, Ram};
use crate::bit_utils::to_signed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ReadTileId,
    ReadData1,
    ReadData2,
    Push,
    ReadSpriteTileId,
    ReadSpriteFlags,
    ReadSpriteData1,
    ReadSpriteData2,
    PushSprite,
}

const EMPTY_PIXEL_LINE: [u8; 8] = [0; 8];

/// Background/window tile fetcher. Each state takes two dots; a sprite
/// request preempts the background fetch and resumes it afterwards.
#[derive(Debug)]
pub struct Fetcher {
    state: State,
    fetching_disabled: bool,
    map_address: u16,
    x_offset: u16,
    tile_data_address: u16,
    tile_id_signed: bool,
    tile_line: i32,
    tile_id: u8,
    tile_attributes: TileAttributes,
    tile_data1: u8,
    tile_data2: u8,
    sprite_tile_line: i32,
    sprite: Option<SpritePosition>,
    sprite_attributes: TileAttributes,
    sprite_offset: usize,
    sprite_oam_index: usize,
    divider: u8,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            state: State::ReadTileId,
            fetching_disabled: false,
            map_address: 0,
            x_offset: 0,
            tile_data_address: 0,
            tile_id_signed: false,
            tile_line: 0,
            tile_id: 0,
            tile_attributes: TileAttributes::EMPTY,
            tile_data1: 0,
            tile_data2: 0,
            sprite_tile_line: 0,
            sprite: None,
            sprite_attributes: TileAttributes::EMPTY,
            sprite_offset: 0,
            sprite_oam_index: 0,
            divider: 2,
        }
    }

    pub fn init(&mut self) {
        self.reset_state();
        self.fetching_disabled = false;
    }

    fn reset_state(&mut self) {
        self.state = State::ReadTileId;
        self.tile_id = 0;
        self.tile_data1 = 0;
        self.tile_data2 = 0;
        self.divider = 2;
    }

    pub fn start_fetching(
        &mut self,
        fifo: &mut dyn PixelFifo,
        map_address: u16,
        tile_data_address: u16,
        x_offset: u16,
        tile_id_signed: bool,
        tile_line: i32,
    ) {
        self.map_address = map_address;
        self.tile_data_address = tile_data_address;
        self.x_offset = x_offset;
        self.tile_id_signed = tile_id_signed;
        self.tile_line = tile_line;
        fifo.clear();
        self.reset_state();
    }

    /// Background and window are off (DMG only): feed blank pixels.
    pub fn fetching_disabled(&mut self) {
        self.fetching_disabled = true;
    }

    pub fn add_sprite(&mut self, sprite: SpritePosition, offset: usize, oam_index: usize, video: &VideoState) {
        self.sprite_tile_line = video.registers.get(PpuRegister::Ly) as i32 + 16 - sprite.y;
        self.sprite = Some(sprite);
        self.state = State::ReadSpriteTileId;
        self.sprite_offset = offset;
        self.sprite_oam_index = oam_index;
    }

    pub fn sprite_in_progress(&self) -> bool {
        matches!(
            self.state,
            State::ReadSpriteTileId
                | State::ReadSpriteFlags
                | State::ReadSpriteData1
                | State::ReadSpriteData2
                | State::PushSprite
        )
    }

    pub fn tick(&mut self, fifo: &mut dyn PixelFifo, video: &VideoState, oam: &Ram) {
        if self.fetching_disabled && self.state == State::ReadTileId {
            if fifo.len() <= 8 {
                fifo.enqueue8_pixels(&EMPTY_PIXEL_LINE, self.tile_attributes, video);
            }
            return;
        }

        self.divider -= 1;
        if self.divider != 0 {
            return;
        }
        self.divider = 2;

        match self.state {
            State::ReadTileId => {
                let address = self.map_address + self.x_offset;
                self.tile_id = video.vram0.read(address);
                self.tile_attributes = match &video.vram1 {
                    Some(vram1) if video.gbc => TileAttributes(vram1.read(address)),
                    _ => TileAttributes::EMPTY,
                };
                self.state = State::ReadData1;
            }
            State::ReadData1 => {
                self.tile_data1 = self.background_tile_data(0, video);
                self.state = State::ReadData2;
            }
            State::ReadData2 => {
                self.tile_data2 = self.background_tile_data(1, video);
                self.state = State::Push;
                // the push happens in the same dot when there is room
                self.try_push(fifo, video);
            }
            State::Push => self.try_push(fifo, video),
            State::ReadSpriteTileId => {
                if let Some(sprite) = self.sprite {
                    self.tile_id = oam.read(sprite.address + 2);
                }
                self.state = State::ReadSpriteFlags;
            }
            State::ReadSpriteFlags => {
                if let Some(sprite) = self.sprite {
                    self.sprite_attributes = TileAttributes(oam.read(sprite.address + 3));
                }
                self.state = State::ReadSpriteData1;
            }
            State::ReadSpriteData1 => {
                let height = video.lcdc.sprite_height();
                if height == 16 {
                    self.tile_id &= 0xfe;
                }
                self.tile_data1 = tile_data(
                    video,
                    self.tile_id,
                    self.sprite_tile_line,
                    0,
                    0x8000,
                    false,
                    self.sprite_attributes,
                    height,
                );
                self.state = State::ReadSpriteData2;
            }
            State::ReadSpriteData2 => {
                self.tile_data2 = tile_data(
                    video,
                    self.tile_id,
                    self.sprite_tile_line,
                    1,
                    0x8000,
                    false,
                    self.sprite_attributes,
                    video.lcdc.sprite_height(),
                );
                self.state = State::PushSprite;
            }
            State::PushSprite => {
                let pixels = zip(self.tile_data1, self.tile_data2, self.sprite_attributes.is_x_flip());
                fifo.set_overlay(
                    &pixels,
                    self.sprite_offset,
                    self.sprite_attributes,
                    self.sprite_oam_index,
                    video,
                );
                self.state = State::ReadTileId;
            }
        }
    }

    fn try_push(&mut self, fifo: &mut dyn PixelFifo, video: &VideoState) {
        if fifo.len() <= 8 {
            let pixels = zip(self.tile_data1, self.tile_data2, self.tile_attributes.is_x_flip());
            fifo.enqueue8_pixels(&pixels, self.tile_attributes, video);
            self.x_offset = (self.x_offset + 1) % 0x20;
            self.state = State::ReadTileId;
        }
    }

    fn background_tile_data(&self, byte_number: u16, video: &VideoState) -> u8 {
        tile_data(
            video,
            self.tile_id,
            self.tile_line,
            byte_number,
            self.tile_data_address,
            self.tile_id_signed,
            self.tile_attributes,
            8,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn tile_data(
    video: &VideoState,
    tile_id: u8,
    line: i32,
    byte_number: u16,
    tile_data_address: u16,
    signed: bool,
    attributes: TileAttributes,
    tile_height: i32,
) -> u8 {
    let effective_line = if attributes.is_y_flip() {
        tile_height - 1 - line
    } else {
        line
    };
    let tile_address = if signed {
        (tile_data_address as i32 + to_signed(tile_id) * 0x10) as u16
    } else {
        tile_data_address + tile_id as u16 * 0x10
    };
    let address = tile_address.wrapping_add((effective_line * 2) as u16) + byte_number;
    match &video.vram1 {
        Some(vram1) if video.gbc && attributes.bank() == 1 => vram1.read(address),
        _ => video.vram0.read(address),
    }
}

/// Interleave two bitplane bytes into eight 2-bit colour indices, leftmost
/// pixel first (or rightmost first when `reverse`).
pub fn zip(data1: u8, data2: u8, reverse: bool) -> [u8; 8] {
    let mut line = [0u8; 8];
    for i in 0..8 {
        let mask = 1 << i;
        let p = 2 * u8::from(data2 & mask != 0) + u8::from(data1 & mask != 0);
        if reverse {
            line[i] = p;
        } else {
            line[7 - i] = p;
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::fifo::DmgPixelFifo;

    #[test]
    fn zip_bitplanes() {
        assert_eq!(zip(0b1100_1001, 0b1111_0000, false), [3, 3, 2, 2, 1, 0, 0, 1]);
        assert_eq!(zip(0b1100_1001, 0b1111_0000, true), [1, 0, 0, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn background_fetch_pushes_after_six_dots() {
        let mut video = VideoState::new(false);
        // tile 1 at the first map slot, row 0 = 0xff/0x00
        video.vram0.write(0x9800, 0x01);
        video.vram0.write(0x8010, 0xff);
        video.vram0.write(0x8011, 0x00);
        let oam = Ram::new(0xfe00, 0xa0);
        let mut fifo = DmgPixelFifo::new();
        let mut fetcher = Fetcher::new();
        fetcher.init();
        fetcher.start_fetching(&mut fifo, 0x9800, 0x8000, 0, false, 0);
        for _ in 0..5 {
            fetcher.tick(&mut fifo, &video, &oam);
            assert_eq!(fifo.len(), 0);
        }
        fetcher.tick(&mut fifo, &video, &oam);
        assert_eq!(fifo.pixels().to_vec(), vec![1; 8]);
    }

    #[test]
    fn signed_tile_data() {
        let mut video = VideoState::new(false);
        video.vram0.write(0x8ff0, 0xaa);
        assert_eq!(tile_data(&video, 0xff, 0, 0, 0x9000, true, TileAttributes::EMPTY, 8), 0xaa);
        video.vram0.write(0x8ffe, 0x55);
        let flipped = TileAttributes(0x40);
        assert_eq!(tile_data(&video, 0xff, 0, 0, 0x9000, true, flipped, 8), 0x55);
    }

    #[test]
    fn sprite_fetch_preempts_background() {
        let mut video = VideoState::new(false);
        video.registers.put(PpuRegister::Ly, 0);
        let mut oam = Ram::new(0xfe00, 0xa0);
        oam.write(0xfe00, 16);
        oam.write(0xfe01, 8);
        oam.write(0xfe02, 2);
        oam.write(0xfe03, 0);
        let mut fifo = DmgPixelFifo::new();
        let mut fetcher = Fetcher::new();
        fetcher.init();
        fetcher.start_fetching(&mut fifo, 0x9800, 0x8000, 0, false, 0);
        fifo.enqueue8_pixels(&[0; 8], TileAttributes::EMPTY, &video);
        fetcher.add_sprite(SpritePosition { x: 8, y: 16, address: 0xfe00 }, 0, 0, &video);
        assert!(fetcher.sprite_in_progress());
        for _ in 0..10 {
            fetcher.tick(&mut fifo, &video, &oam);
        }
        assert!(!fetcher.sprite_in_progress());
    }
}
