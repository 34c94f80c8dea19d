use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info};

use crate::area::flags::{parse_flag_list, FlagParseError};
use crate::area::grid::{Exit, ExitDirection, TileGrid};
use crate::area::script::{ScriptFn, ScriptRegistry, TileTrigger};
use crate::area::{Animation, Area, GridError, IVec2, IVec3, LayerKind, TileFlags, ViCoord};

use super::map_file::{LayerFile, MapFile, MapObject, TilesetFile};

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
    #[error("map {path} is missing required property '{name}'")]
    MissingProperty { path: PathBuf, name: &'static str },
    #[error("map dimensions {width}x{height} are not positive")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("color overlay '{value}' is not an A,R,G,B byte list")]
    InvalidColorOverlay { value: String },
    #[error("map references no tilesets, so no tile size is known")]
    MissingTilesets,
    #[error("tileset {tileset} starts at gid {firstgid}, expected {expected}")]
    NonContiguousFirstGid {
        tileset: String,
        firstgid: u32,
        expected: u32,
    },
    #[error("tileset {tileset} tile size disagrees with the map's {expected:?}")]
    TileDimMismatch { tileset: String, expected: IVec2 },
    #[error("tileset tile id '{key}' is not a tile in this set")]
    InvalidTileId { key: String },
    #[error("tile {tile} lists frame {first} first; a tile's first frame must be itself")]
    FirstFrameMismatch { tile: u32, first: u32 },
    #[error("tile {tile} has unparsable frames list '{value}'")]
    InvalidFrames { tile: u32, value: String },
    #[error("animated tile {tile} declares no positive speed")]
    InvalidSpeed { tile: u32 },
    #[error("layer {layer} has no parsable 'depth' property ('{value}')")]
    InvalidDepth { layer: usize, value: String },
    #[error("layer {layer} reuses depth {depth}; layer depths must be unique")]
    DuplicateDepth { layer: usize, depth: f32 },
    #[error("layer {layer} is {actual_width}x{actual_height}, map is {width}x{height}")]
    LayerSizeMismatch {
        layer: usize,
        width: i32,
        height: i32,
        actual_width: i32,
        actual_height: i32,
    },
    #[error("layer {layer} holds {actual} gids, expected {expected}")]
    TileCountMismatch {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Flags(#[from] FlagParseError),
    #[error("script '{name}' is not registered")]
    UnknownScript { name: String },
    #[error("exit '{value}' does not match 'area,x,y,z'")]
    InvalidExit { value: String },
    #[error("layermod '{value}' is not a depth value")]
    InvalidLayermod { value: String },
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// The boundary adapter: reads a map descriptor plus its tilesets and
/// builds the runtime [`Area`]. Every fallible step short-circuits; a
/// failed load never yields a half-built area.
pub struct AreaLoader<'a> {
    registry: &'a ScriptRegistry,
    base: PathBuf,
}

impl<'a> AreaLoader<'a> {
    pub fn new(registry: &'a ScriptRegistry, base: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            base: base.into(),
        }
    }

    /// Loads `descriptor` (a path relative to the asset root, e.g.
    /// `maps/home.json`).
    pub fn load(&self, descriptor: &str) -> Result<Area, MapLoadError> {
        let path = self.base.join(descriptor);
        let map: MapFile = read_json(&path)?;
        if map.width <= 0 || map.height <= 0 {
            return Err(MapLoadError::InvalidDimensions {
                width: map.width,
                height: map.height,
            });
        }

        let name = map
            .properties
            .get("name")
            .cloned()
            .ok_or(MapLoadError::MissingProperty {
                path: path.clone(),
                name: "name",
            })?;
        let music = map.properties.get("music").cloned();
        let color_overlay = map
            .properties
            .get("coloroverlay")
            .map(|value| parse_color_overlay(value))
            .transpose()?;
        let (loop_x, loop_y) = map
            .properties
            .get("loop")
            .map(|value| (value.contains('x'), value.contains('y')))
            .unwrap_or((false, false));

        let map_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let (tile_types, tile_dim) = self.load_tilesets(&map, map_dir)?;

        let mut grid = TileGrid::new(
            IVec2::new(map.width, map.height),
            tile_dim,
            loop_x,
            loop_y,
        );
        grid.set_tile_type_count(tile_types.len());

        for (index, layer) in map.layers.iter().enumerate() {
            self.load_layer(&map, &mut grid, index, layer, tile_dim)?;
        }

        let area = Area::new(name, music, color_overlay, grid, tile_types);
        info!(
            map = descriptor,
            name = area.name(),
            layers = area.grid().dim().z,
            "loaded area"
        );
        Ok(area)
    }

    fn load_tilesets(
        &self,
        map: &MapFile,
        map_dir: &Path,
    ) -> Result<(Vec<Animation>, IVec2), MapLoadError> {
        // Gid 0 is the empty tile; the placeholder keeps the table
        // addressable by gid directly.
        let mut tile_types = vec![Animation::still(0)];
        let mut tile_dim: Option<IVec2> = None;

        for tileset in &map.tilesets {
            let file: TilesetFile = read_json(&map_dir.join(&tileset.source))?;
            if tileset.firstgid as usize != tile_types.len() {
                return Err(MapLoadError::NonContiguousFirstGid {
                    tileset: tileset.source.clone(),
                    firstgid: tileset.firstgid,
                    expected: tile_types.len() as u32,
                });
            }
            let dims = IVec2::new(file.tilewidth, file.tileheight);
            match tile_dim {
                None => tile_dim = Some(dims),
                Some(expected) if expected != dims => {
                    return Err(MapLoadError::TileDimMismatch {
                        tileset: tileset.source.clone(),
                        expected,
                    });
                }
                Some(_) => {}
            }

            // Derived, never validated against leftover pixels: a 100 px
            // image with 32 px tiles yields 3 columns.
            let num_across = file.imagewidth / file.tilewidth;
            let num_high = file.imageheight / file.tileheight;
            let count = (num_across * num_high).max(0) as u32;
            let firstgid = tileset.firstgid;
            for local in 0..count {
                tile_types.push(Animation::still(firstgid + local));
            }

            let mut animated: Vec<(u32, &super::map_file::TileProperties)> = Vec::new();
            for (key, properties) in &file.tileproperties {
                let local: u32 = key
                    .trim()
                    .parse()
                    .map_err(|_| MapLoadError::InvalidTileId { key: key.clone() })?;
                if local >= count {
                    return Err(MapLoadError::InvalidTileId { key: key.clone() });
                }
                animated.push((local, properties));
            }
            animated.sort_by_key(|(local, _)| *local);

            for (local, properties) in animated {
                let Some(frames_text) = &properties.frames else {
                    continue;
                };
                let frames = parse_frames(local, frames_text)?;
                if frames.first() != Some(&local) {
                    return Err(MapLoadError::FirstFrameMismatch {
                        tile: local,
                        first: frames.first().copied().unwrap_or(local),
                    });
                }
                for frame in &frames {
                    if *frame >= count {
                        return Err(MapLoadError::InvalidFrames {
                            tile: local,
                            value: frames_text.clone(),
                        });
                    }
                }
                if frames.len() > 1 {
                    let speed = properties
                        .speed
                        .filter(|hertz| *hertz > 0.0)
                        .ok_or(MapLoadError::InvalidSpeed { tile: local })?;
                    let global: Vec<u32> = frames.iter().map(|frame| firstgid + frame).collect();
                    tile_types[(firstgid + local) as usize] = Animation::cycling(global, speed);
                }
            }
        }

        let tile_dim = tile_dim.ok_or(MapLoadError::MissingTilesets)?;
        Ok((tile_types, tile_dim))
    }

    fn load_layer(
        &self,
        map: &MapFile,
        grid: &mut TileGrid,
        index: usize,
        layer: &LayerFile,
        tile_dim: IVec2,
    ) -> Result<(), MapLoadError> {
        let depth_text = layer
            .properties()
            .get("depth")
            .ok_or_else(|| MapLoadError::InvalidDepth {
                layer: index,
                value: "<missing>".to_string(),
            })?;
        let depth: f32 = depth_text
            .trim()
            .parse()
            .map_err(|_| MapLoadError::InvalidDepth {
                layer: index,
                value: depth_text.clone(),
            })?;

        // Tile layers own their depth exclusively. An object group at an
        // already-registered depth annotates that layer's tiles; at a
        // fresh depth it becomes a layer of its own with no graphics.
        let z = match layer {
            LayerFile::Tile { .. } => grid
                .push_layer(LayerKind::Tile, depth)
                .map_err(|_| MapLoadError::DuplicateDepth {
                    layer: index,
                    depth,
                })?,
            LayerFile::Object { .. } => match grid.layer_of_depth(depth) {
                Ok(existing) => existing,
                Err(_) => grid
                    .push_layer(LayerKind::Object, depth)
                    .expect("fresh depth cannot collide"),
            },
        };

        match layer {
            LayerFile::Tile {
                width,
                height,
                data,
                ..
            } => {
                if *width != map.width || *height != map.height {
                    return Err(MapLoadError::LayerSizeMismatch {
                        layer: index,
                        width: map.width,
                        height: map.height,
                        actual_width: *width,
                        actual_height: *height,
                    });
                }
                let expected = (map.width * map.height) as usize;
                if data.len() != expected {
                    return Err(MapLoadError::TileCountMismatch {
                        layer: index,
                        expected,
                        actual: data.len(),
                    });
                }
                for (cell, gid) in data.iter().enumerate() {
                    if *gid == 0 {
                        continue;
                    }
                    let x = cell as i32 % map.width;
                    let y = cell as i32 / map.width;
                    grid.set_tile_type(IVec3::new(x, y, z), *gid)?;
                }
            }
            LayerFile::Object { objects, .. } => {
                for object in objects {
                    self.apply_object(grid, z, object, tile_dim)?;
                }
            }
        }
        Ok(())
    }

    fn apply_object(
        &self,
        grid: &mut TileGrid,
        z: i32,
        object: &MapObject,
        tile_dim: IVec2,
    ) -> Result<(), MapLoadError> {
        // Pixel rect to inclusive tile rect.
        let x0 = (object.x / tile_dim.x as f32).floor() as i32;
        let y0 = (object.y / tile_dim.y as f32).floor() as i32;
        let x1 = (((object.x + object.width) / tile_dim.x as f32).ceil() as i32 - 1).max(x0);
        let y1 = (((object.y + object.height) / tile_dim.y as f32).ceil() as i32 - 1).max(y0);

        let properties = &object.properties;
        let flags = match properties.get("flags") {
            Some(text) => parse_flag_list(text)?,
            None => TileFlags::NONE,
        };

        let mut scripts: Vec<(TileTrigger, ScriptFn)> = Vec::new();
        for (key, trigger) in [
            ("on_enter", TileTrigger::Enter),
            ("on_leave", TileTrigger::Leave),
            ("on_use", TileTrigger::Use),
        ] {
            if let Some(script_name) = properties.get(key) {
                let script =
                    self.registry
                        .resolve(script_name)
                        .ok_or_else(|| MapLoadError::UnknownScript {
                            name: script_name.clone(),
                        })?;
                scripts.push((trigger, script));
            }
        }

        let mut exits: Vec<(ExitDirection, ExitSpec)> = Vec::new();
        for (key, direction) in [
            ("exit", ExitDirection::Normal),
            ("exit:up", ExitDirection::Up),
            ("exit:down", ExitDirection::Down),
            ("exit:left", ExitDirection::Left),
            ("exit:right", ExitDirection::Right),
        ] {
            if let Some(value) = properties.get(key) {
                exits.push((direction, parse_exit(value)?));
            }
        }

        let mut layermods: Vec<(ExitDirection, f32)> = Vec::new();
        for (key, direction) in [
            ("layermod", ExitDirection::Normal),
            ("layermod:up", ExitDirection::Up),
            ("layermod:down", ExitDirection::Down),
            ("layermod:left", ExitDirection::Left),
            ("layermod:right", ExitDirection::Right),
        ] {
            if let Some(value) = properties.get(key) {
                let depth: f32 =
                    value
                        .trim()
                        .parse()
                        .map_err(|_| MapLoadError::InvalidLayermod {
                            value: value.clone(),
                        })?;
                layermods.push((direction, depth));
            }
        }

        let has_exit = !exits.is_empty();
        for ty in y0..=y1 {
            for tx in x0..=x1 {
                let tile = IVec3::new(tx, ty, z);
                grid.add_flags(tile, flags);
                if has_exit {
                    // NPCs never wander through exits.
                    grid.add_flags(tile, TileFlags::NOWALK_NPC);
                }
                for (trigger, script) in &scripts {
                    grid.set_script(*trigger, tile, *script);
                }
                for (direction, spec) in &exits {
                    let x = spec.x + if spec.wide_x { tx - x0 } else { 0 };
                    let y = spec.y + if spec.wide_y { ty - y0 } else { 0 };
                    grid.set_exit(
                        *direction,
                        tile,
                        Exit {
                            area: spec.area.clone(),
                            coords: ViCoord::new(x, y, spec.z),
                        },
                    );
                }
                for (direction, depth) in &layermods {
                    grid.set_layermod(*direction, tile, *depth);
                }
            }
        }
        Ok(())
    }
}

struct ExitSpec {
    area: String,
    x: i32,
    y: i32,
    wide_x: bool,
    wide_y: bool,
    z: f32,
}

/// Grammar: `area,x,y,z`. x and y are unsigned integers, optionally with a
/// trailing `+` marking the exit as wide along that axis: each tile of the
/// object rectangle then targets a correspondingly offset coordinate.
fn parse_exit(value: &str) -> Result<ExitSpec, MapLoadError> {
    let invalid = || MapLoadError::InvalidExit {
        value: value.to_string(),
    };
    let parts: Vec<&str> = value.split(',').collect();
    let [area, x, y, z] = parts[..] else {
        return Err(invalid());
    };
    let (x, wide_x) = parse_exit_coord(x).ok_or_else(invalid)?;
    let (y, wide_y) = parse_exit_coord(y).ok_or_else(invalid)?;
    let z: f32 = z.trim().parse().map_err(|_| invalid())?;
    Ok(ExitSpec {
        area: area.trim().to_string(),
        x,
        y,
        wide_x,
        wide_y,
        z,
    })
}

fn parse_exit_coord(text: &str) -> Option<(i32, bool)> {
    let text = text.trim_start();
    let (digits, wide) = match text.strip_suffix('+') {
        Some(digits) => (digits, true),
        None => (text, false),
    };
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|value| (value, wide))
}

fn parse_frames(tile: u32, text: &str) -> Result<Vec<u32>, MapLoadError> {
    let invalid = || MapLoadError::InvalidFrames {
        tile,
        value: text.to_string(),
    };
    let frames: Vec<u32> = text
        .split(',')
        .map(|frame| frame.trim().parse().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    if frames.is_empty() {
        return Err(invalid());
    }
    Ok(frames)
}

/// `"A,R,G,B"` with byte channels, packed as 0xAARRGGBB.
pub fn parse_color_overlay(value: &str) -> Result<u32, MapLoadError> {
    let invalid = || MapLoadError::InvalidColorOverlay {
        value: value.to_string(),
    };
    let channels: Vec<u8> = value
        .split(',')
        .map(|channel| channel.trim().parse().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    let [a, r, g, b] = channels.as_slice() else {
        return Err(invalid());
    };
    Ok(u32::from_be_bytes([*a, *r, *g, *b]))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|parse_error| {
        error!(path = %path.display(), %parse_error, "malformed map json");
        MapLoadError::Parse {
            path: path.to_path_buf(),
            detail: parse_error.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::area::ScriptContext;

    use super::*;

    fn note_enter(context: &mut ScriptContext<'_>) {
        context.data.bump_value("entered");
    }

    fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("fixture parent")).expect("fixture dir");
        fs::write(path, contents).expect("fixture write");
    }

    fn registry() -> ScriptRegistry {
        let mut registry = ScriptRegistry::new();
        registry.register("announce_enter", note_enter);
        registry
    }

    /// 128x64 image of 32 px tiles: 8 tile types, gids 1..=8 at firstgid 1.
    /// Local tile 3 cycles 3,4 at 4 Hz.
    const FIELD_TILESET: &str = r#"{
        "image": "field.png",
        "imagewidth": 128,
        "imageheight": 64,
        "tilewidth": 32,
        "tileheight": 32,
        "tileproperties": {
            "3": {"frames": "3,4", "speed": 4.0}
        }
    }"#;

    fn tile_layer(depth: &str) -> String {
        let data = vec!["1"; 20].join(",");
        format!(
            r#"{{"type": "tilelayer", "width": 5, "height": 4,
                 "properties": {{"depth": "{depth}"}}, "data": [{data}]}}"#
        )
    }

    fn object_layer(depth: &str, objects: &str) -> String {
        format!(
            r#"{{"type": "objectgroup", "properties": {{"depth": "{depth}"}},
                 "objects": [{objects}]}}"#
        )
    }

    fn map_json(properties: &str, layers: &[String]) -> String {
        format!(
            r#"{{"width": 5, "height": 4,
                 "properties": {{{properties}}},
                 "tilesets": [{{"firstgid": 1, "source": "../tilesets/field.json"}}],
                 "layers": [{}]}}"#,
            layers.join(",")
        )
    }

    fn write_standard_fixtures(root: &Path, map: &str) {
        write_file(root, "tilesets/field.json", FIELD_TILESET);
        write_file(root, "maps/home.json", map);
    }

    fn load(root: &Path, registry: &ScriptRegistry) -> Result<Area, MapLoadError> {
        AreaLoader::new(registry, root).load("maps/home.json")
    }

    #[test]
    fn loads_the_full_home_scenario() {
        let dir = TempDir::new().expect("tempdir");
        let object = r#"{"x": 64, "y": 32, "width": 32, "height": 32,
                         "properties": {"exit": "forest.json,0,0,0.0",
                                        "flags": "nowalk_npc",
                                        "on_enter": "announce_enter"}}"#;
        let map = map_json(
            r#""name": "Home", "music": "home.ogg", "coloroverlay": "255,0,128,64""#,
            &[tile_layer("0.0"), object_layer("0.0", object)],
        );
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let area = load(dir.path(), &registry).expect("valid map");
        assert_eq!(area.name(), "Home");
        assert_eq!(area.music(), Some("home.ogg"));
        assert_eq!(area.color_overlay(), Some(0xFF00_8040));

        // The object group shares depth 0.0, so it annotates the tile
        // layer instead of adding a layer of its own.
        let grid = area.grid();
        assert_eq!(grid.dim(), IVec3::new(5, 4, 1));
        assert_eq!(grid.tile_dim(), IVec2::new(32, 32));
        assert_eq!(grid.layer_kind(0), Some(LayerKind::Tile));
        assert_eq!(grid.tile_type(IVec3::new(2, 1, 0)), Some(1));

        let door = IVec3::new(2, 1, 0);
        let exit = grid
            .exit_in_direction(door, ExitDirection::Normal)
            .expect("exit registered");
        assert_eq!(exit.area, "forest.json");
        assert_eq!(exit.coords, ViCoord::new(0, 0, 0.0));
        assert!(grid.flags_at(door).contains(TileFlags::NOWALK_NPC));
        assert!(grid
            .script_at(TileTrigger::Enter, door)
            .is_some());
        // The neighboring tile got nothing.
        assert!(grid.flags_at(IVec3::new(3, 1, 0)).is_empty());
    }

    #[test]
    fn exit_implies_npc_nowalk_even_without_explicit_flags() {
        let dir = TempDir::new().expect("tempdir");
        let object = r#"{"x": 0, "y": 0, "width": 32, "height": 32,
                         "properties": {"exit": "forest.json,1,2,0.0"}}"#;
        let map = map_json(
            r#""name": "Home""#,
            &[tile_layer("0.0"), object_layer("0.0", object)],
        );
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let area = load(dir.path(), &registry).expect("valid map");
        assert!(area
            .grid()
            .flags_at(IVec3::new(0, 0, 0))
            .contains(TileFlags::NOWALK_NPC));
    }

    #[test]
    fn wide_exits_replicate_with_per_tile_offsets() {
        let dir = TempDir::new().expect("tempdir");
        let object = r#"{"x": 64, "y": 32, "width": 64, "height": 32,
                         "properties": {"exit": "cave.json,10+,5,0.5"}}"#;
        let map = map_json(
            r#""name": "Home""#,
            &[tile_layer("0.0"), object_layer("0.0", object)],
        );
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let area = load(dir.path(), &registry).expect("valid map");
        let grid = area.grid();
        let first = grid
            .exit_in_direction(IVec3::new(2, 1, 0), ExitDirection::Normal)
            .expect("left half");
        assert_eq!(first.coords, ViCoord::new(10, 5, 0.5));
        let second = grid
            .exit_in_direction(IVec3::new(3, 1, 0), ExitDirection::Normal)
            .expect("right half");
        assert_eq!(second.coords, ViCoord::new(11, 5, 0.5));
    }

    #[test]
    fn directional_exit_and_layermod_keys_route_to_their_maps() {
        let dir = TempDir::new().expect("tempdir");
        let object = r#"{"x": 0, "y": 0, "width": 32, "height": 32,
                         "properties": {"exit:up": "attic.json,0,0,0.0",
                                        "layermod:up": "2.5"}}"#;
        let map = map_json(
            r#""name": "Home""#,
            &[tile_layer("0.0"), object_layer("1.0", object)],
        );
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let area = load(dir.path(), &registry).expect("valid map");
        let grid = area.grid();
        // Depth 1.0 is fresh, so the group became a layer of its own,
        // contributing no graphics.
        assert_eq!(grid.dim().z, 2);
        assert_eq!(grid.layer_kind(1), Some(LayerKind::Object));
        assert_eq!(grid.tile_type(IVec3::new(0, 0, 1)), Some(0));
        let tile = IVec3::new(0, 0, 1);
        assert!(grid.exit_in_direction(tile, ExitDirection::Normal).is_none());
        assert!(grid.exit_in_direction(tile, ExitDirection::Up).is_some());
        assert_eq!(grid.layermod_at(tile, IVec2::new(0, -1)), Some(2.5));
        assert_eq!(grid.layermod_at(tile, IVec2::new(0, 1)), None);
    }

    #[test]
    fn animated_tile_types_get_cycling_animations() {
        let dir = TempDir::new().expect("tempdir");
        let map = map_json(r#""name": "Home""#, &[tile_layer("0.0")]);
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let mut area = load(dir.path(), &registry).expect("valid map");
        assert_eq!(area.tile_type_count(), 9);
        // Local tile 3 at firstgid 1 is gid 4; 4 Hz -> 250 ms frames.
        let animation = area.tile_animation_mut(4).expect("animated type");
        assert!(animation.is_cycling());
        assert_eq!(animation.frame_len_ms(), 250);
        assert_eq!(animation.frame(0), 4);
        assert_eq!(animation.frame(250), 5);
        // Everything else stays still.
        assert!(!area.tile_animation(1).expect("plain type").is_cycling());
    }

    #[test]
    fn tileset_columns_derive_by_integer_division() {
        let dir = TempDir::new().expect("tempdir");
        // 100 px across 32 px tiles: 3 columns, the 4 leftover pixels are
        // ignored rather than rejected.
        write_file(
            dir.path(),
            "tilesets/field.json",
            r#"{"image": "field.png", "imagewidth": 100, "imageheight": 32,
                "tilewidth": 32, "tileheight": 32}"#,
        );
        let data = vec!["3"; 20].join(",");
        let map = format!(
            r#"{{"width": 5, "height": 4, "properties": {{"name": "Home"}},
                 "tilesets": [{{"firstgid": 1, "source": "../tilesets/field.json"}}],
                 "layers": [{{"type": "tilelayer", "width": 5, "height": 4,
                              "properties": {{"depth": "0.0"}}, "data": [{data}]}}]}}"#
        );
        write_file(dir.path(), "maps/home.json", &map);

        let registry = registry();
        let area = load(dir.path(), &registry).expect("valid map");
        assert_eq!(area.tile_type_count(), 4);
    }

    #[test]
    fn gid_beyond_the_tile_type_table_fails_the_load() {
        let dir = TempDir::new().expect("tempdir");
        let mut cells = vec!["1"; 20];
        cells[7] = "99";
        let data = cells.join(",");
        let layer = format!(
            r#"{{"type": "tilelayer", "width": 5, "height": 4,
                 "properties": {{"depth": "0.0"}}, "data": [{data}]}}"#
        );
        let map = map_json(r#""name": "Home""#, &[layer]);
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let error = load(dir.path(), &registry).expect_err("gid 99 of 9");
        assert!(matches!(
            error,
            MapLoadError::Grid(GridError::GidOutOfRange { gid: 99, .. })
        ));
    }

    #[test]
    fn first_frame_must_be_the_tile_itself() {
        let dir = TempDir::new().expect("tempdir");
        write_file(
            dir.path(),
            "tilesets/field.json",
            r#"{"image": "field.png", "imagewidth": 128, "imageheight": 64,
                "tilewidth": 32, "tileheight": 32,
                "tileproperties": {"5": {"frames": "6,7", "speed": 2.0}}}"#,
        );
        let map = map_json(r#""name": "Home""#, &[tile_layer("0.0")]);
        write_file(dir.path(), "maps/home.json", &map);

        let registry = registry();
        let error = load(dir.path(), &registry).expect_err("frames start at 6");
        assert!(matches!(
            error,
            MapLoadError::FirstFrameMismatch { tile: 5, first: 6 }
        ));
    }

    #[test]
    fn duplicate_layer_depths_fail_the_load() {
        let dir = TempDir::new().expect("tempdir");
        let map = map_json(r#""name": "Home""#, &[tile_layer("0.0"), tile_layer("0.0")]);
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let error = load(dir.path(), &registry).expect_err("depth reuse");
        assert!(matches!(error, MapLoadError::DuplicateDepth { layer: 1, .. }));
    }

    #[test]
    fn unresolvable_script_names_fail_the_load() {
        let dir = TempDir::new().expect("tempdir");
        let object = r#"{"x": 0, "y": 0, "width": 32, "height": 32,
                         "properties": {"on_use": "cast_fireball"}}"#;
        let map = map_json(
            r#""name": "Home""#,
            &[tile_layer("0.0"), object_layer("1.0", object)],
        );
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let error = load(dir.path(), &registry).expect_err("unregistered script");
        assert!(matches!(
            error,
            MapLoadError::UnknownScript { name } if name == "cast_fireball"
        ));
    }

    #[test]
    fn exit_grammar_rejects_malformed_coordinates() {
        for bad in [
            "forest.json,a,0,0.0",
            "forest.json,-1,0,0.0",
            "forest.json,1,2",
            "forest.json,1+,2,deep",
        ] {
            assert!(
                matches!(parse_exit(bad), Err(MapLoadError::InvalidExit { .. })),
                "'{bad}' should be rejected"
            );
        }
        let parsed = parse_exit(" forest.json, 10+,5,0.25").expect("leading spaces are fine");
        assert_eq!(parsed.area, "forest.json");
        assert_eq!((parsed.x, parsed.wide_x), (10, true));
        assert_eq!((parsed.y, parsed.wide_y), (5, false));
        assert_eq!(parsed.z, 0.25);
    }

    #[test]
    fn color_overlay_packs_to_argb() {
        assert_eq!(
            parse_color_overlay("255,0,128,64").expect("valid overlay"),
            0xFF00_8040
        );
        assert!(parse_color_overlay("255,0,128").is_err());
        assert!(parse_color_overlay("255,0,128,300").is_err());
    }

    #[test]
    fn loop_property_enables_axis_wraparound() {
        let dir = TempDir::new().expect("tempdir");
        let map = map_json(r#""name": "Home", "loop": "xy""#, &[tile_layer("0.0")]);
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let area = load(dir.path(), &registry).expect("valid map");
        assert!(area.grid().loop_x());
        assert!(area.grid().loop_y());
    }

    #[test]
    fn missing_name_property_fails_the_load() {
        let dir = TempDir::new().expect("tempdir");
        let map = map_json(r#""music": "home.ogg""#, &[tile_layer("0.0")]);
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let error = load(dir.path(), &registry).expect_err("nameless map");
        assert!(matches!(
            error,
            MapLoadError::MissingProperty { name: "name", .. }
        ));
    }

    #[test]
    fn loaded_scripts_fire_through_the_area() {
        let dir = TempDir::new().expect("tempdir");
        let object = r#"{"x": 32, "y": 0, "width": 32, "height": 32,
                         "properties": {"on_enter": "announce_enter"}}"#;
        let map = map_json(
            r#""name": "Home""#,
            &[tile_layer("0.0"), object_layer("0.0", object)],
        );
        write_standard_fixtures(dir.path(), &map);

        let registry = registry();
        let mut area = load(dir.path(), &registry).expect("valid map");
        let id = area
            .spawn(
                crate::area::Entity::player_character(crate::area::MovementMode::Turn),
                IVec3::new(0, 0, 0),
            )
            .expect("spawn beside the trigger");
        assert!(area.request_move(0, id, IVec2::new(1, 0)));
        assert_eq!(area.data().value("entered"), Some(1.0));
    }
}

