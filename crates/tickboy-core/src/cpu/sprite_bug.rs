//! OAM corruption triggered by 16-bit increments and decrements of a pointer
//! in FE00-FEFF while the PPU is scanning OAM.
//!
//! See gbdev.io/pandocs/OAM_Corruption_Bug.html. The corruption is modelled
//! as row copies within OAM, keyed on the machine cycle of the OAM search.

use crate::address_space::Ram;

/// The instruction pattern that exposed the address bus to OAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionType {
    IncDec,
    Pop1,
    Pop2,
    Push1,
    Push2,
    LdHl,
}

/// Strategy applied to OAM when the bug fires.
pub trait CorruptionPolicy {
    /// `ticks_in_line` is the PPU tick counter of the current (OAM search) line.
    fn corrupt(&self, oam: &mut Ram, kind: CorruptionType, ticks_in_line: u32);
}

// OAM holds 40 sprites of 4 bytes, handled as 20 rows of 8 bytes.
const OAM_SIZE: usize = 0xa0;

/// Row-copy table observed on DMG hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowCopyCorruption;

impl CorruptionPolicy for RowCopyCorruption {
    fn corrupt(&self, oam: &mut Ram, kind: CorruptionType, ticks_in_line: u32) {
        let cpu_cycle = ((ticks_in_line + 1) / 4 + 1) as usize;
        let oam = oam.as_mut_slice();
        let row = |n: usize| n * 8;
        match kind {
            CorruptionType::IncDec => {
                if cpu_cycle >= 2 {
                    copy_values(oam, row(cpu_cycle - 2) + 2, row(cpu_cycle - 1) + 2, 6);
                }
            }
            CorruptionType::Pop1 | CorruptionType::LdHl => {
                if cpu_cycle >= 4 {
                    copy_values(oam, row(cpu_cycle - 3) + 2, row(cpu_cycle - 4) + 2, 8);
                    copy_values(oam, row(cpu_cycle - 3) + 8, row(cpu_cycle - 4), 2);
                    copy_values(oam, row(cpu_cycle - 4) + 2, row(cpu_cycle - 2) + 2, 6);
                }
            }
            CorruptionType::Pop2 => {
                if cpu_cycle >= 5 {
                    copy_values(oam, row(cpu_cycle - 5), row(cpu_cycle - 2), 8);
                }
            }
            CorruptionType::Push1 => {
                if cpu_cycle >= 4 {
                    copy_values(oam, row(cpu_cycle - 4) + 2, row(cpu_cycle - 3) + 2, 8);
                    copy_values(oam, row(cpu_cycle - 3) + 2, row(cpu_cycle - 1) + 2, 6);
                }
            }
            CorruptionType::Push2 => {
                if cpu_cycle >= 5 {
                    copy_values(oam, row(cpu_cycle - 4) + 2, row(cpu_cycle - 3) + 2, 8);
                }
            }
        }
    }
}

/// Copy `len` bytes from `from` to `to`, highest offset first. Bytes that
/// fall outside the sprite table are skipped.
fn copy_values(oam: &mut [u8], from: usize, to: usize, len: usize) {
    for i in (0..len).rev() {
        let (src, dst) = (from + i, to + i);
        if src < OAM_SIZE && dst < OAM_SIZE && dst < oam.len() {
            oam[dst] = oam[src];
        }
    }
}

/// True for pointers that put OAM on the address bus.
pub fn in_oam_area(address: i32) -> bool {
    (0xfe00..=0xfeff).contains(&address)
}
