use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::coords::{DepthError, DepthTable, IVec2, IVec3, RVec3, ViCoord};
use super::flags::TileFlags;
use super::script::{ScriptFn, TileTrigger};

/// Gid value meaning "no tile here".
pub const EMPTY_TILE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitDirection {
    Normal,
    Up,
    Down,
    Left,
    Right,
}

impl ExitDirection {
    pub(crate) const COUNT: usize = 5;

    pub(crate) const fn index(self) -> usize {
        match self {
            ExitDirection::Normal => 0,
            ExitDirection::Up => 1,
            ExitDirection::Down => 2,
            ExitDirection::Left => 3,
            ExitDirection::Right => 4,
        }
    }

    /// The directional map a facing selects. Vertical component wins for
    /// diagonals; y grows downward, so (0,-1) faces up.
    pub fn of_facing(facing: IVec2) -> ExitDirection {
        if facing.y < 0 {
            ExitDirection::Up
        } else if facing.y > 0 {
            ExitDirection::Down
        } else if facing.x < 0 {
            ExitDirection::Left
        } else {
            ExitDirection::Right
        }
    }
}

/// A tile-triggered teleport: destination area descriptor plus the
/// virtual coordinate to appear at.
#[derive(Debug, Clone, PartialEq)]
pub struct Exit {
    pub area: String,
    pub coords: ViCoord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Contributes visible graphics.
    Tile,
    /// Contributes only flags/exits/scripts; graphics stay empty.
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GridError {
    #[error("tile {0:?} is outside the grid")]
    OutOfBounds(IVec3),
    #[error(transparent)]
    Depth(#[from] DepthError),
    #[error("tile type {gid} is out of range (table holds {max})")]
    GidOutOfRange { gid: u32, max: usize },
    #[error("tile {0:?} is already occupied")]
    Occupied(IVec3),
}

/// The dense-plus-sparse tile store for one area.
///
/// Built once by the loader; after load only `occupied` mutates, driven by
/// entities entering and leaving tiles.
#[derive(Debug, Default)]
pub struct TileGrid {
    dim: IVec3,
    tile_dim: IVec2,
    loop_x: bool,
    loop_y: bool,
    depths: DepthTable,
    layer_types: Vec<LayerKind>,
    graphics: Vec<u32>,
    tile_type_count: usize,
    flags: HashMap<IVec3, TileFlags>,
    exits: [HashMap<IVec3, Exit>; ExitDirection::COUNT],
    layermods: [HashMap<IVec3, f32>; ExitDirection::COUNT],
    scripts: [HashMap<IVec3, ScriptFn>; TileTrigger::COUNT],
    occupied: HashSet<IVec3>,
}

impl TileGrid {
    pub fn new(dim: IVec2, tile_dim: IVec2, loop_x: bool, loop_y: bool) -> Self {
        debug_assert!(dim.x > 0 && dim.y > 0, "grid dimensions must be positive");
        debug_assert!(
            tile_dim.x > 0 && tile_dim.y > 0,
            "tile dimensions must be positive"
        );
        Self {
            dim: IVec3::new(dim.x, dim.y, 0),
            tile_dim,
            loop_x,
            loop_y,
            ..Self::default()
        }
    }

    pub(crate) fn set_tile_type_count(&mut self, count: usize) {
        self.tile_type_count = count;
    }

    /// Appends a layer at the given depth. Layers stack in registration
    /// order; the depth must be unique across the grid.
    pub fn push_layer(&mut self, kind: LayerKind, depth: f32) -> Result<i32, GridError> {
        let layer = self.depths.register(depth)?;
        self.layer_types.push(kind);
        self.dim.z += 1;
        self.graphics
            .resize((self.dim.x * self.dim.y * self.dim.z) as usize, EMPTY_TILE);
        Ok(layer)
    }

    pub fn dim(&self) -> IVec3 {
        self.dim
    }

    pub fn tile_dim(&self) -> IVec2 {
        self.tile_dim
    }

    pub fn loop_x(&self) -> bool {
        self.loop_x
    }

    pub fn loop_y(&self) -> bool {
        self.loop_y
    }

    pub fn layer_kind(&self, layer: i32) -> Option<LayerKind> {
        usize::try_from(layer)
            .ok()
            .and_then(|index| self.layer_types.get(index).copied())
    }

    pub fn in_bounds(&self, phys: IVec3) -> bool {
        (0..self.dim.x).contains(&phys.x)
            && (0..self.dim.y).contains(&phys.y)
            && (0..self.dim.z).contains(&phys.z)
    }

    fn graphics_index(&self, phys: IVec3) -> Option<usize> {
        if !self.in_bounds(phys) {
            return None;
        }
        Some(((phys.z * self.dim.y + phys.y) * self.dim.x + phys.x) as usize)
    }

    // --- coordinate conversions -----------------------------------------

    pub fn phys_to_virt(&self, phys: IVec3) -> Result<ViCoord, GridError> {
        let depth = self.depths.depth_of_layer(phys.z)?;
        Ok(ViCoord::new(phys.x, phys.y, depth))
    }

    /// Fails loudly on an unregistered depth; a silent default here would
    /// paper over a layer-authoring bug.
    pub fn virt_to_phys(&self, virt: ViCoord) -> Result<IVec3, GridError> {
        let layer = self.depths.layer_of_depth(virt.z)?;
        Ok(IVec3::new(virt.x, virt.y, layer))
    }

    pub fn depth_of_layer(&self, layer: i32) -> Result<f32, GridError> {
        Ok(self.depths.depth_of_layer(layer)?)
    }

    pub fn layer_of_depth(&self, depth: f32) -> Result<i32, GridError> {
        Ok(self.depths.layer_of_depth(depth)?)
    }

    /// Tile index under a pixel position, wrapping on looping axes.
    /// Out-of-range results are valid inputs for off-map movement checks.
    pub fn tile_of_pixel(&self, x: f32, y: f32) -> IVec2 {
        let tile = IVec2::new(
            (x / self.tile_dim.x as f32).floor() as i32,
            (y / self.tile_dim.y as f32).floor() as i32,
        );
        self.wrap_tile(tile)
    }

    /// Pixel position of a tile's top-left corner.
    pub fn pixel_of_tile(&self, tile: IVec2) -> (f32, f32) {
        (
            (tile.x * self.tile_dim.x) as f32,
            (tile.y * self.tile_dim.y) as f32,
        )
    }

    pub fn wrap_tile(&self, tile: IVec2) -> IVec2 {
        IVec2::new(
            if self.loop_x {
                tile.x.rem_euclid(self.dim.x)
            } else {
                tile.x
            },
            if self.loop_y {
                tile.y.rem_euclid(self.dim.y)
            } else {
                tile.y
            },
        )
    }

    /// Physical tile under a continuous position.
    pub fn phys_of_real(&self, r: RVec3) -> Result<IVec3, GridError> {
        let tile = self.tile_of_pixel(r.x, r.y);
        let layer = self.depths.layer_of_depth(r.z)?;
        Ok(IVec3::new(tile.x, tile.y, layer))
    }

    /// Continuous position at a physical tile's top-left corner.
    pub fn real_of_phys(&self, phys: IVec3) -> Result<RVec3, GridError> {
        let (x, y) = self.pixel_of_tile(IVec2::new(phys.x, phys.y));
        let depth = self.depths.depth_of_layer(phys.z)?;
        Ok(RVec3::new(x, y, depth))
    }

    // --- tile types ------------------------------------------------------

    pub fn tile_type(&self, phys: IVec3) -> Option<u32> {
        self.graphics_index(phys)
            .and_then(|index| self.graphics.get(index).copied())
    }

    pub fn tile_type_vi(&self, virt: ViCoord) -> Result<Option<u32>, GridError> {
        let phys = self.virt_to_phys(virt)?;
        Ok(self.tile_type(phys))
    }

    pub fn set_tile_type_vi(&mut self, virt: ViCoord, gid: u32) -> Result<(), GridError> {
        let phys = self.virt_to_phys(virt)?;
        self.set_tile_type(phys, gid)
    }

    pub fn set_tile_type(&mut self, phys: IVec3, gid: u32) -> Result<(), GridError> {
        if gid != EMPTY_TILE && gid as usize >= self.tile_type_count {
            return Err(GridError::GidOutOfRange {
                gid,
                max: self.tile_type_count,
            });
        }
        let index = self
            .graphics_index(phys)
            .ok_or(GridError::OutOfBounds(phys))?;
        self.graphics[index] = gid;
        Ok(())
    }

    // --- sparse per-tile attributes --------------------------------------

    pub fn flags_at(&self, phys: IVec3) -> TileFlags {
        self.flags.get(&phys).copied().unwrap_or(TileFlags::NONE)
    }

    pub fn add_flags(&mut self, phys: IVec3, flags: TileFlags) {
        if flags.is_empty() {
            return;
        }
        self.flags.entry(phys).or_default().insert(flags);
    }

    /// The exit registered at a tile for a facing: a NORMAL exit overrides,
    /// then the direction map the facing selects. Absence is not an error.
    pub fn exit_at(&self, phys: IVec3, facing: IVec2) -> Option<&Exit> {
        self.exits[ExitDirection::Normal.index()]
            .get(&phys)
            .or_else(|| self.exits[ExitDirection::of_facing(facing).index()].get(&phys))
    }

    pub fn exit_in_direction(&self, phys: IVec3, direction: ExitDirection) -> Option<&Exit> {
        self.exits[direction.index()].get(&phys)
    }

    /// The exit a move attempt resolves to: a direction-specific exit at
    /// the origin wins over a NORMAL exit at the destination.
    pub(crate) fn exit_for_move(&self, from: IVec3, dest: IVec3, facing: IVec2) -> Option<&Exit> {
        self.exits[ExitDirection::of_facing(facing).index()]
            .get(&from)
            .or_else(|| self.exits[ExitDirection::Normal.index()].get(&dest))
    }

    pub fn set_exit(&mut self, direction: ExitDirection, phys: IVec3, exit: Exit) {
        self.exits[direction.index()].insert(phys, exit);
    }

    /// Same override order as [`TileGrid::exit_at`].
    pub fn layermod_at(&self, phys: IVec3, facing: IVec2) -> Option<f32> {
        self.layermods[ExitDirection::Normal.index()]
            .get(&phys)
            .or_else(|| self.layermods[ExitDirection::of_facing(facing).index()].get(&phys))
            .copied()
    }

    pub fn set_layermod(&mut self, direction: ExitDirection, phys: IVec3, depth: f32) {
        self.layermods[direction.index()].insert(phys, depth);
    }

    /// Where a move from `from` toward `facing` lands. A registered
    /// layermod turns the move into a same-column depth change; otherwise
    /// the destination is the neighboring tile, wrapped on looping axes.
    pub fn move_dest(&self, from: IVec3, facing: IVec2) -> Result<IVec3, GridError> {
        if let Some(depth) = self.layermod_at(from, facing) {
            let layer = self.depths.layer_of_depth(depth)?;
            return Ok(IVec3::new(from.x, from.y, layer));
        }
        let stepped = from.offset_xy(facing);
        let wrapped = self.wrap_tile(IVec2::new(stepped.x, stepped.y));
        Ok(IVec3::new(wrapped.x, wrapped.y, stepped.z))
    }

    // --- scripts ----------------------------------------------------------

    pub fn set_script(&mut self, trigger: TileTrigger, phys: IVec3, script: ScriptFn) {
        self.scripts[trigger.index()].insert(phys, script);
    }

    pub fn script_at(&self, trigger: TileTrigger, phys: IVec3) -> Option<ScriptFn> {
        self.scripts[trigger.index()].get(&phys).copied()
    }

    // --- occupancy --------------------------------------------------------

    pub fn is_occupied(&self, phys: IVec3) -> bool {
        self.occupied.contains(&phys)
    }

    /// Claims a tile for an entity. Returns false when already claimed;
    /// callers on the movement path treat that as a programming error.
    pub fn claim_occupied(&mut self, phys: IVec3) -> bool {
        self.occupied.insert(phys)
    }

    pub fn release_occupied(&mut self, phys: IVec3) {
        let released = self.occupied.remove(&phys);
        debug_assert!(released, "released unclaimed tile {phys:?}");
    }
}
