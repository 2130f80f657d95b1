//! Memory Access Widths and Byte Lanes.
//!
//! This module defines how RV32 loads and stores map onto 32-bit words. These
//! helpers are used for the following:
//! 1. **Byte Enables:** Converting a (address, width) pair into a 4-bit lane mask.
//! 2. **Store Lanes:** Positioning store data in the lanes selected by its address.
//! 3. **Load Extension:** Narrowing a word to the loaded bytes with sign or zero extension.
//! 4. **Partial Writes:** Merging only the enabled bytes of a write into existing data.

use serde::Deserialize;

use super::addr::byte_offset;
use super::constants::FULL_WORD_MASK;

/// Width of a load or store operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemWidth {
    /// 8-bit byte access (`LB`/`LBU`/`SB`).
    Byte,

    /// 16-bit half-word access (`LH`/`LHU`/`SH`).
    Half,

    /// 32-bit word access (`LW`/`SW`).
    #[default]
    Word,
}

impl MemWidth {
    /// Returns the access size in bytes.
    #[inline]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
        }
    }

    /// Decodes the `funct3` field of a RISC-V load into (width, signed).
    ///
    /// `LB`=000, `LH`=001, `LW`=010, `LBU`=100, `LHU`=101; anything else is `None`.
    pub const fn from_load_funct3(funct3: u32) -> Option<(Self, bool)> {
        match funct3 {
            0b000 => Some((Self::Byte, true)),
            0b001 => Some((Self::Half, true)),
            0b010 => Some((Self::Word, true)),
            0b100 => Some((Self::Byte, false)),
            0b101 => Some((Self::Half, false)),
            _ => None,
        }
    }

    /// Decodes the `funct3` field of a RISC-V store (`SB`=000, `SH`=001, `SW`=010).
    pub const fn from_store_funct3(funct3: u32) -> Option<Self> {
        match funct3 {
            0b000 => Some(Self::Byte),
            0b001 => Some(Self::Half),
            0b010 => Some(Self::Word),
            _ => None,
        }
    }

    /// Returns the byte-enable mask of an access of this width at `addr`.
    ///
    /// Accesses that would cross the word boundary are clipped to the word.
    #[inline]
    pub const fn byte_enable(self, addr: u32) -> u8 {
        let lanes: u8 = match self {
            Self::Byte => 0b0001,
            Self::Half => 0b0011,
            Self::Word => FULL_WORD_MASK,
        };
        (lanes << byte_offset(addr)) & FULL_WORD_MASK
    }
}

/// Positions a store value in the byte lanes selected by its address.
///
/// # Returns
///
/// `(data, byte_enable)` where byte *i* of `data` is written when bit *i* of
/// `byte_enable` is set.
pub const fn store_lanes(addr: u32, value: u32, width: MemWidth) -> (u32, u8) {
    let shift = byte_offset(addr) * 8;
    let narrowed = match width {
        MemWidth::Byte => value & 0xFF,
        MemWidth::Half => value & 0xFFFF,
        MemWidth::Word => value,
    };
    (narrowed << shift, width.byte_enable(addr))
}

/// Extracts a load result from the word containing `addr`.
///
/// Selects the addressed bytes and applies RISC-V sign or zero extension.
pub const fn extract_load(word: u32, addr: u32, width: MemWidth, signed: bool) -> u32 {
    let shifted = word >> (byte_offset(addr) * 8);
    match (width, signed) {
        (MemWidth::Byte, true) => shifted as u8 as i8 as i32 as u32,
        (MemWidth::Byte, false) => shifted & 0xFF,
        (MemWidth::Half, true) => shifted as u16 as i16 as i32 as u32,
        (MemWidth::Half, false) => shifted & 0xFFFF,
        (MemWidth::Word, _) => shifted,
    }
}

/// Expands a 4-bit byte-enable mask into a 32-bit bit mask.
#[inline]
pub const fn lane_mask(byte_enable: u8) -> u32 {
    let mut mask = 0u32;
    let mut lane = 0;
    while lane < 4 {
        if byte_enable & (1 << lane) != 0 {
            mask |= 0xFF << (lane * 8);
        }
        lane += 1;
    }
    mask
}

/// Merges the enabled bytes of `data` into `old`; disabled bytes keep `old`.
#[inline]
pub const fn merge_bytes(old: u32, data: u32, byte_enable: u8) -> u32 {
    let mask = lane_mask(byte_enable);
    (old & !mask) | (data & mask)
}
