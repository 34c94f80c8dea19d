pub mod animation;
pub mod coords;
pub mod entity;
pub mod flags;
pub mod grid;
pub mod player;
pub mod script;

use tracing::warn;

pub use animation::{Animation, ImageRef};
pub use coords::{DepthError, IVec2, IVec3, RVec3, ViCoord};
pub use entity::{Entity, EntityId, MovementMode};
pub use flags::TileFlags;
pub use grid::{Exit, ExitDirection, GridError, LayerKind, TileGrid, EMPTY_TILE};
pub use player::Player;
pub use script::{DataArea, ScriptContext, ScriptFn, ScriptRegistry, TileTrigger};

use entity::{EntityIdAllocator, MoveContext};

/// Side effects raised while stepping an entity. The area resolves them
/// right after the entity's step so iteration order stays authoritative.
#[derive(Debug, Clone)]
pub enum AreaEvent {
    Script {
        trigger: TileTrigger,
        entity: EntityId,
        tile: IVec3,
    },
    ExitTaken {
        entity: EntityId,
        exit: Exit,
    },
    Sound {
        name: String,
    },
}

/// An entity arrived on an exit tile; the world driver decides whether the
/// transfer succeeds. On failure it must call [`Area::cancel_exit`].
#[derive(Debug, Clone)]
pub struct ExitRequest {
    pub entity: EntityId,
    pub exit: Exit,
}

#[derive(Debug, Default)]
pub struct TickResult {
    pub exits: Vec<ExitRequest>,
    pub sounds: Vec<String>,
}

/// One loaded map: the tile grid, the tile-type animation table, the live
/// entities, and the per-area behavior state. Entities tick in insertion
/// order, which makes script and occupancy side effects deterministic.
#[derive(Debug)]
pub struct Area {
    name: String,
    music: Option<String>,
    color_overlay: Option<u32>,
    grid: TileGrid,
    tile_types: Vec<Animation>,
    data: DataArea,
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    /// Exit/sound requests raised outside `tick` (direct move requests);
    /// drained into the next tick's result.
    pending: TickResult,
}

impl Area {
    pub(crate) fn new(
        name: String,
        music: Option<String>,
        color_overlay: Option<u32>,
        grid: TileGrid,
        tile_types: Vec<Animation>,
    ) -> Self {
        Self {
            name,
            music,
            color_overlay,
            grid,
            tile_types,
            data: DataArea::default(),
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
            pending: TickResult::default(),
        }
    }

    /// An area with an empty tile-type table, for tests and tools that
    /// build their grid by hand.
    pub fn bare(name: impl Into<String>, grid: TileGrid) -> Self {
        Self::new(name.into(), None, None, grid, vec![Animation::still(0)])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn music(&self) -> Option<&str> {
        self.music.as_deref()
    }

    /// Packed 0xAARRGGBB overlay from the map properties, if any.
    pub fn color_overlay(&self) -> Option<u32> {
        self.color_overlay
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn data(&self) -> &DataArea {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataArea {
        &mut self.data
    }

    /// The animation for a tile type, by gid. Gid 0 is the empty tile.
    pub fn tile_animation(&self, gid: u32) -> Option<&Animation> {
        if gid == EMPTY_TILE {
            return None;
        }
        self.tile_types.get(gid as usize)
    }

    pub fn tile_animation_mut(&mut self, gid: u32) -> Option<&mut Animation> {
        if gid == EMPTY_TILE {
            return None;
        }
        self.tile_types.get_mut(gid as usize)
    }

    pub fn tile_type_count(&self) -> usize {
        self.tile_types.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id() == id)
    }

    /// Places an entity on a tile and claims its occupancy.
    pub fn spawn(&mut self, mut entity: Entity, tile: IVec3) -> Result<EntityId, GridError> {
        let position = self.grid.real_of_phys(tile)?;
        if !self.grid.in_bounds(tile) {
            return Err(GridError::OutOfBounds(tile));
        }
        if !self.grid.claim_occupied(tile) {
            return Err(GridError::Occupied(tile));
        }
        let id = self.allocator.allocate();
        entity.assign_id(id);
        entity.set_position(position);
        self.entities.push(entity);
        Ok(id)
    }

    /// Asks one entity to start a one-tile move, resolving any side
    /// effects it raises before returning.
    pub fn request_move(&mut self, now_ms: u64, id: EntityId, delta: IVec2) -> bool {
        let mut events = Vec::new();
        let Some(entity) = self.entities.iter_mut().find(|entity| entity.id() == id) else {
            warn!(entity = id.0, "move requested for unknown entity");
            return false;
        };
        let moved = {
            let mut ctx = MoveContext {
                grid: &mut self.grid,
                events: &mut events,
                now_ms,
            };
            entity.move_by_tile(&mut ctx, delta)
        };
        let mut result = TickResult::default();
        self.resolve_events(events, &mut result, now_ms);
        self.pending.exits.extend(result.exits);
        self.pending.sounds.extend(result.sounds);
        moved
    }

    /// Fires the "use" trigger on the tile an entity faces.
    pub fn use_at_facing(&mut self, now_ms: u64, id: EntityId) {
        let Some(entity) = self.find_entity(id) else {
            warn!(entity = id.0, "use requested for unknown entity");
            return;
        };
        let Some(tile) = entity.tile(&self.grid) else {
            return;
        };
        let target = tile.offset_xy(entity.facing());
        let events = vec![AreaEvent::Script {
            trigger: TileTrigger::Use,
            entity: id,
            tile: target,
        }];
        let mut result = TickResult::default();
        self.resolve_events(events, &mut result, now_ms);
    }

    /// One engine tick: due deferred actions, the area's own tick hook,
    /// then every entity in insertion order.
    pub fn tick(&mut self, now_ms: u64, dt_ms: u64) -> TickResult {
        let mut result = TickResult::default();
        result.exits.append(&mut self.pending.exits);
        result.sounds.append(&mut self.pending.sounds);
        self.data.tick(now_ms, dt_ms);
        for index in 0..self.entities.len() {
            let mut events = Vec::new();
            {
                let entity = &mut self.entities[index];
                let mut ctx = MoveContext {
                    grid: &mut self.grid,
                    events: &mut events,
                    now_ms,
                };
                entity.tick(&mut ctx, dt_ms);
            }
            self.resolve_events(events, &mut result, now_ms);
        }
        result
    }

    /// Rolls a failed exit transfer back; the entity returns to its last
    /// confirmed tile.
    pub fn cancel_exit(&mut self, now_ms: u64, id: EntityId) {
        let Some(entity) = self.entities.iter_mut().find(|entity| entity.id() == id) else {
            warn!(entity = id.0, "exit rollback for unknown entity");
            return;
        };
        warn!(
            entity = id.0,
            "exit transfer failed; rolling back to the last confirmed tile"
        );
        let mut events = Vec::new();
        let mut ctx = MoveContext {
            grid: &mut self.grid,
            events: &mut events,
            now_ms,
        };
        entity.rollback(&mut ctx);
    }

    fn resolve_events(&mut self, events: Vec<AreaEvent>, result: &mut TickResult, now_ms: u64) {
        for event in events {
            match event {
                AreaEvent::Script {
                    trigger,
                    entity,
                    tile,
                } => {
                    if let Some(script) = self.grid.script_at(trigger, tile) {
                        let mut context = ScriptContext {
                            area_name: &self.name,
                            data: &mut self.data,
                            entity,
                            tile,
                            now_ms,
                        };
                        script(&mut context);
                    }
                }
                AreaEvent::ExitTaken { entity, exit } => {
                    result.exits.push(ExitRequest { entity, exit });
                }
                AreaEvent::Sound { name } => {
                    result.sounds.push(name);
                }
            }
        }
    }
}
