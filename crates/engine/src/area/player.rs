use super::coords::IVec2;
use super::entity::EntityId;
use super::Area;

/// Control state for the player-driven entity. Held directions stack so
/// that releasing a key falls back to the most recent one still held,
/// giving smooth direction changes without re-pressing.
///
/// This is an explicit context object handed to whoever translates input;
/// nothing in the runtime reaches for it globally.
#[derive(Debug)]
pub struct Player {
    entity: EntityId,
    movements: Vec<IVec2>,
}

impl Player {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            movements: Vec::new(),
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn velocity(&self) -> IVec2 {
        self.movements.last().copied().unwrap_or(IVec2::ZERO)
    }

    /// A direction key went down: it becomes the active direction and a
    /// move is attempted immediately.
    pub fn press(&mut self, area: &mut Area, now_ms: u64, direction: IVec2) {
        let direction = direction.clamp_unit();
        if direction.is_zero() {
            return;
        }
        self.movements.retain(|held| *held != direction);
        self.movements.push(direction);
        self.apply_velocity(area, now_ms);
    }

    /// A direction key went up: the last direction still held wins.
    pub fn release(&mut self, area: &mut Area, now_ms: u64, direction: IVec2) {
        let direction = direction.clamp_unit();
        self.movements.retain(|held| *held != direction);
        self.apply_velocity(area, now_ms);
    }

    fn apply_velocity(&mut self, area: &mut Area, now_ms: u64) {
        let velocity = self.velocity();
        if let Some(entity) = area.find_entity_mut(self.entity) {
            entity.set_velocity(velocity);
        }
        if !velocity.is_zero() {
            area.request_move(now_ms, self.entity, velocity);
        }
    }

    /// Fires the "use" trigger on the tile the player faces.
    pub fn use_facing_tile(&self, area: &mut Area, now_ms: u64) {
        area.use_at_facing(now_ms, self.entity);
    }
}
