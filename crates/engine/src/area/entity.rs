use std::collections::HashMap;

use tracing::{debug, warn};

use super::animation::Animation;
use super::coords::{IVec2, IVec3, RVec3};
use super::flags::TileFlags;
use super::grid::{Exit, TileGrid};
use super::script::TileTrigger;
use super::AreaEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// How a movement intent is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementMode {
    /// The whole tile transition and its side effects resolve inside the
    /// initiating call; no intermediate animation frames.
    Turn,
    /// The transition is distributed across ticks at the entity's speed.
    Continuous,
}

pub(crate) struct MoveContext<'a> {
    pub grid: &'a mut TileGrid,
    pub events: &'a mut Vec<AreaEvent>,
    pub now_ms: u64,
}

/// A creature or object living on the grid.
///
/// Movement is a two-state machine: standing (phase = directional stance)
/// or moving (interpolating toward `dest_coord`, phase = directional walk).
/// While moving, `dest_coord` is always reachable by straight-line
/// interpolation from `r`; arrival lands on it exactly.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    r: RVec3,
    from_coord: RVec3,
    dest_coord: RVec3,
    moving: bool,
    facing: IVec2,
    move_dir: (f32, f32),
    phases: HashMap<String, Animation>,
    phase_key: String,
    speed_tiles_per_sec: f32,
    frozen: bool,
    mode: MovementMode,
    nowalk_flags: TileFlags,
    nowalk_exempt: TileFlags,
    player_controlled: bool,
    velocity: IVec2,
    dest_exit: Option<Exit>,
    step_sound: Option<String>,
}

impl Entity {
    /// An NPC: blocked by plain and NPC-specific nowalk tiles, cannot take
    /// exits, cannot leave the map.
    pub fn npc(mode: MovementMode) -> Self {
        Self::with_rules(
            mode,
            TileFlags::NOWALK | TileFlags::NOWALK_NPC,
            TileFlags::NONE,
            false,
        )
    }

    /// A player character: blocked by plain and player-specific nowalk
    /// tiles, exempt from the exit nowalk so it can step onto exit tiles.
    pub fn player_character(mode: MovementMode) -> Self {
        Self::with_rules(
            mode,
            TileFlags::NOWALK | TileFlags::NOWALK_PLAYER,
            TileFlags::NOWALK_EXIT,
            true,
        )
    }

    pub fn with_rules(
        mode: MovementMode,
        nowalk_flags: TileFlags,
        nowalk_exempt: TileFlags,
        player_controlled: bool,
    ) -> Self {
        Self {
            id: EntityId::default(),
            r: RVec3::default(),
            from_coord: RVec3::default(),
            dest_coord: RVec3::default(),
            moving: false,
            facing: IVec2::new(0, 1),
            move_dir: (0.0, 0.0),
            phases: HashMap::new(),
            phase_key: String::new(),
            speed_tiles_per_sec: 1.0,
            frozen: false,
            mode,
            nowalk_flags,
            nowalk_exempt,
            player_controlled,
            velocity: IVec2::ZERO,
            dest_exit: None,
            step_sound: None,
        }
    }

    pub fn with_speed(mut self, tiles_per_sec: f32) -> Self {
        debug_assert!(tiles_per_sec > 0.0, "speed must be positive");
        self.speed_tiles_per_sec = tiles_per_sec;
        self
    }

    pub fn with_step_sound(mut self, name: impl Into<String>) -> Self {
        self.step_sound = Some(name.into());
        self
    }

    pub fn with_phase(mut self, key: impl Into<String>, animation: Animation) -> Self {
        self.phases.insert(key.into(), animation);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }

    pub fn position(&self) -> RVec3 {
        self.r
    }

    pub(crate) fn set_position(&mut self, r: RVec3) {
        self.r = r;
        self.from_coord = r;
        self.dest_coord = r;
    }

    pub fn moving(&self) -> bool {
        self.moving
    }

    pub fn facing(&self) -> IVec2 {
        self.facing
    }

    pub fn frozen(&self) -> bool {
        self.frozen
    }

    /// Gates new movement intents only; motion in progress runs to its
    /// tile boundary.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn speed(&self) -> f32 {
        self.speed_tiles_per_sec
    }

    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    pub fn player_controlled(&self) -> bool {
        self.player_controlled
    }

    pub fn velocity(&self) -> IVec2 {
        self.velocity
    }

    /// The held movement direction, re-applied on arrival for controlled
    /// entities. The player controller owns the held-key stack.
    pub fn set_velocity(&mut self, velocity: IVec2) {
        self.velocity = velocity.clamp_unit();
    }

    pub fn phase_key(&self) -> &str {
        &self.phase_key
    }

    pub fn current_animation(&self) -> Option<&Animation> {
        self.phases.get(&self.phase_key)
    }

    pub fn tile(&self, grid: &TileGrid) -> Option<IVec3> {
        grid.phys_of_real(self.r).ok()
    }

    fn pixels_per_ms(&self, grid: &TileGrid) -> f32 {
        self.speed_tiles_per_sec * grid.tile_dim().x as f32 / 1000.0
    }

    fn set_phase(&mut self, key: String, now_ms: u64) {
        if self.phase_key == key {
            return;
        }
        let has_phases = !self.phases.is_empty();
        match self.phases.get_mut(&key) {
            Some(animation) => animation.restart(now_ms),
            None if has_phases => {
                debug!(phase = %key, "entity has no animation for phase");
            }
            None => {}
        }
        self.phase_key = key;
    }

    fn stand(&mut self, now_ms: u64) {
        self.set_phase(directional_phase("stance", self.facing), now_ms);
    }

    /// Attempts to start a one-tile move. Returns false and stays standing
    /// when already moving, frozen, or blocked.
    pub(crate) fn move_by_tile(&mut self, ctx: &mut MoveContext<'_>, delta: IVec2) -> bool {
        if self.moving || self.frozen {
            return false;
        }
        let delta = delta.clamp_unit();
        if delta.is_zero() {
            return false;
        }
        self.facing = delta;

        let origin = match ctx.grid.phys_of_real(self.r) {
            Ok(origin) => origin,
            Err(error) => {
                warn!(entity = self.id.0, %error, "entity stands on no known layer");
                return false;
            }
        };
        let dest = match ctx.grid.move_dest(origin, self.facing) {
            Ok(dest) => dest,
            Err(error) => {
                warn!(entity = self.id.0, %error, "move destination is unresolvable");
                self.stand(ctx.now_ms);
                return false;
            }
        };
        self.dest_exit = ctx.grid.exit_for_move(origin, dest, self.facing).cloned();

        if !self.can_move(ctx.grid, dest) {
            self.dest_exit = None;
            self.stand(ctx.now_ms);
            return false;
        }

        let dest_coord = match ctx.grid.real_of_phys(dest) {
            Ok(coord) => coord,
            Err(error) => {
                warn!(entity = self.id.0, %error, "destination layer has no depth");
                self.dest_exit = None;
                self.stand(ctx.now_ms);
                return false;
            }
        };

        self.set_phase(directional_phase("walk", self.facing), ctx.now_ms);
        self.moving = true;
        ctx.events.push(AreaEvent::Script {
            trigger: TileTrigger::Leave,
            entity: self.id,
            tile: origin,
        });
        ctx.grid.release_occupied(origin);
        if !ctx.grid.claim_occupied(dest) {
            // Reachable only through the exit-exempt path, which skips the
            // occupancy check.
            warn!(entity = self.id.0, ?dest, "stepping onto an occupied exit tile");
        }

        self.from_coord = self.r;
        self.dest_coord = dest_coord;
        let dx = dest_coord.x - self.r.x;
        let dy = dest_coord.y - self.r.y;
        let len = (dx * dx + dy * dy).sqrt();
        self.move_dir = if len > 0.0 {
            (dx / len, dy / len)
        } else {
            (0.0, 0.0)
        };
        if let Some(name) = &self.step_sound {
            ctx.events.push(AreaEvent::Sound { name: name.clone() });
        }

        if self.mode == MovementMode::Turn {
            self.r = self.dest_coord;
            self.arrive(ctx);
        }
        true
    }

    fn can_move(&self, grid: &TileGrid, dest: IVec3) -> bool {
        // Exits win over nowalk flags: an exit-exempt entity may step onto
        // a nowalk tile that is an exit.
        if self.dest_exit.is_some() && self.nowalk_exempt.contains(TileFlags::NOWALK_EXIT) {
            return true;
        }
        if grid.in_bounds(dest) {
            !grid.flags_at(dest).intersects(self.nowalk_flags) && !grid.is_occupied(dest)
        } else {
            self.nowalk_exempt.contains(TileFlags::NOWALK_AREA_BOUND)
        }
    }

    pub(crate) fn tick(&mut self, ctx: &mut MoveContext<'_>, dt_ms: u64) {
        if self.mode == MovementMode::Continuous && self.moving {
            self.advance(ctx, dt_ms as f32);
        }
    }

    fn advance(&mut self, ctx: &mut MoveContext<'_>, dt_ms: f32) {
        let px_per_ms = self.pixels_per_ms(ctx.grid);
        let step = px_per_ms * dt_ms;
        let dx = self.dest_coord.x - self.r.x;
        let dy = self.dest_coord.y - self.r.y;
        let remaining = (dx * dx + dy * dy).sqrt();
        if remaining > step {
            self.r.x += self.move_dir.0 * step;
            self.r.y += self.move_dir.1 * step;
            return;
        }

        let leftover_ms = if px_per_ms > 0.0 {
            (step - remaining) / px_per_ms
        } else {
            0.0
        };
        self.r = self.dest_coord;
        self.arrive(ctx);
        // A re-issued move keeps the unconsumed slice of this tick, so
        // held-key movement does not stutter at tile boundaries.
        if self.moving && leftover_ms > 0.0 {
            self.advance(ctx, leftover_ms);
        }
    }

    fn arrive(&mut self, ctx: &mut MoveContext<'_>) {
        self.moving = false;
        let mut here = match ctx.grid.phys_of_real(self.r) {
            Ok(here) => here,
            Err(error) => {
                warn!(entity = self.id.0, %error, "arrived on no known layer");
                self.stand(ctx.now_ms);
                return;
            }
        };

        if let Some(depth) = ctx.grid.layermod_at(here, self.facing) {
            if depth.to_bits() != self.r.z.to_bits() {
                match ctx.grid.layer_of_depth(depth) {
                    Ok(layer) => {
                        let target = IVec3::new(here.x, here.y, layer);
                        ctx.grid.release_occupied(here);
                        if !ctx.grid.claim_occupied(target) {
                            warn!(entity = self.id.0, ?target, "layermod target is occupied");
                        }
                        self.r.z = depth;
                        here = target;
                    }
                    Err(error) => {
                        warn!(entity = self.id.0, %error, "layermod names no layer");
                    }
                }
            }
        }

        ctx.events.push(AreaEvent::Script {
            trigger: TileTrigger::Enter,
            entity: self.id,
            tile: here,
        });
        self.stand(ctx.now_ms);

        if let Some(exit) = self.dest_exit.take() {
            ctx.events.push(AreaEvent::ExitTaken {
                entity: self.id,
                exit,
            });
            return;
        }

        if self.player_controlled && !self.velocity.is_zero() {
            let held = self.velocity;
            self.move_by_tile(ctx, held);
        }
    }

    /// Rolls a failed exit transfer back to the last confirmed tile. The
    /// entity must never be left half-transitioned.
    pub(crate) fn rollback(&mut self, ctx: &mut MoveContext<'_>) {
        if let Ok(here) = ctx.grid.phys_of_real(self.r) {
            ctx.grid.release_occupied(here);
        }
        self.r = self.from_coord;
        self.dest_coord = self.from_coord;
        self.moving = false;
        self.dest_exit = None;
        match ctx.grid.phys_of_real(self.r) {
            Ok(confirmed) => {
                if !ctx.grid.claim_occupied(confirmed) {
                    warn!(
                        entity = self.id.0,
                        ?confirmed,
                        "rollback tile was reclaimed by another entity"
                    );
                }
            }
            Err(error) => {
                warn!(entity = self.id.0, %error, "rollback tile has no layer");
            }
        }
        self.stand(ctx.now_ms);
    }
}

fn directional_phase(prefix: &str, facing: IVec2) -> String {
    format!("{prefix}_{}", facing_name(facing))
}

fn facing_name(facing: IVec2) -> &'static str {
    match (facing.x, facing.y) {
        (0, -1) => "up",
        (0, 1) => "down",
        (-1, 0) => "left",
        (1, 0) => "right",
        (-1, -1) => "up_left",
        (1, -1) => "up_right",
        (-1, 1) => "down_left",
        (1, 1) => "down_right",
        _ => "down",
    }
}
