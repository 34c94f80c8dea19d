use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IVec2 {
    pub x: i32,
    pub y: i32,
}

impl IVec2 {
    pub const ZERO: IVec2 = IVec2 { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn clamp_unit(self) -> Self {
        Self {
            x: self.x.clamp(-1, 1),
            y: self.y.clamp(-1, 1),
        }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IVec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl IVec3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset_xy(self, delta: IVec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            z: self.z,
        }
    }
}

/// Virtual-indexed coordinate: integer tile position plus floating depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViCoord {
    pub x: i32,
    pub y: i32,
    pub z: f32,
}

impl ViCoord {
    pub const fn new(x: i32, y: i32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_real(self) -> RVec3 {
        RVec3 {
            x: self.x as f32,
            y: self.y as f32,
            z: self.z,
        }
    }
}

/// Virtual-real coordinate: continuous pixel-space position plus floating
/// depth. Depth is the same value carried by [`ViCoord`]; only x,y change
/// meaning between the two flavors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RVec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_indexed(self) -> ViCoord {
        ViCoord {
            x: self.x as i32,
            y: self.y as i32,
            z: self.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DepthError {
    #[error("layer depth {depth} is already registered to layer {layer}")]
    DuplicateDepth { depth: f32, layer: i32 },
    #[error("depth {depth} is not registered to any layer")]
    UnregisteredDepth { depth: f32 },
    #[error("layer index {layer} is out of range")]
    UnknownLayer { layer: i32 },
}

/// Bijection between floating depth values and physical layer indices.
///
/// Depths are compared by exact bit pattern; the loader registers the value
/// it parsed from the map file and every later lookup goes through the same
/// parse, so no tolerance is needed.
#[derive(Debug, Clone, Default)]
pub struct DepthTable {
    depths: Vec<f32>,
    layers_by_bits: HashMap<u32, i32>,
}

impl DepthTable {
    pub fn register(&mut self, depth: f32) -> Result<i32, DepthError> {
        if let Some(layer) = self.layers_by_bits.get(&depth.to_bits()) {
            return Err(DepthError::DuplicateDepth {
                depth,
                layer: *layer,
            });
        }
        let layer = self.depths.len() as i32;
        self.depths.push(depth);
        self.layers_by_bits.insert(depth.to_bits(), layer);
        Ok(layer)
    }

    pub fn depth_of_layer(&self, layer: i32) -> Result<f32, DepthError> {
        usize::try_from(layer)
            .ok()
            .and_then(|index| self.depths.get(index).copied())
            .ok_or(DepthError::UnknownLayer { layer })
    }

    pub fn layer_of_depth(&self, depth: f32) -> Result<i32, DepthError> {
        self.layers_by_bits
            .get(&depth.to_bits())
            .copied()
            .ok_or(DepthError::UnregisteredDepth { depth })
    }

    pub fn layer_count(&self) -> usize {
        self.depths.len()
    }
}
