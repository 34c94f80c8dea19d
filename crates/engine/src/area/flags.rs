use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

/// Per-tile walkability bits. Stored sparsely on the grid; entities carry
/// a blocking mask plus an exemption mask built from the same constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileFlags(u32);

impl TileFlags {
    pub const NONE: TileFlags = TileFlags(0);
    pub const NOWALK: TileFlags = TileFlags(0x001);
    pub const NOWALK_PLAYER: TileFlags = TileFlags(0x002);
    pub const NOWALK_NPC: TileFlags = TileFlags(0x004);
    pub const NOWALK_EXIT: TileFlags = TileFlags(0x008);
    /// Historical value carried over from shipped map data: 0x016, not
    /// 0x010. Only ever used in entity exemption masks, never written to a
    /// tile, so the shared bits stay unobservable.
    pub const NOWALK_AREA_BOUND: TileFlags = TileFlags(0x016);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: TileFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: TileFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: TileFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for TileFlags {
    type Output = TileFlags;

    fn bitor(self, rhs: TileFlags) -> TileFlags {
        TileFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for TileFlags {
    fn bitor_assign(&mut self, rhs: TileFlags) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagParseError {
    #[error("unknown tile flag '{0}'")]
    UnknownFlag(String),
}

/// Parses the comma-separated `flags` property of a map object.
pub fn parse_flag_list(text: &str) -> Result<TileFlags, FlagParseError> {
    let mut flags = TileFlags::NONE;
    for item in text.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        match item {
            "nowalk" => flags |= TileFlags::NOWALK,
            "nowalk_player" => flags |= TileFlags::NOWALK_PLAYER,
            "nowalk_npc" => flags |= TileFlags::NOWALK_NPC,
            other => return Err(FlagParseError::UnknownFlag(other.to_string())),
        }
    }
    Ok(flags)
}
