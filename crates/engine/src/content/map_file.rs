use std::collections::HashMap;

use serde::Deserialize;

/// On-disk shape of a map descriptor. Property bags are string-to-string,
/// matching how map editors export custom properties; typed parsing
/// happens in the loader.
#[derive(Debug, Deserialize)]
pub(crate) struct MapFile {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub tilesets: Vec<TilesetRef>,
    #[serde(default)]
    pub layers: Vec<LayerFile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TilesetRef {
    pub firstgid: u32,
    pub source: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum LayerFile {
    #[serde(rename = "tilelayer")]
    Tile {
        width: i32,
        height: i32,
        #[serde(default)]
        properties: HashMap<String, String>,
        data: Vec<u32>,
    },
    #[serde(rename = "objectgroup")]
    Object {
        #[serde(default)]
        properties: HashMap<String, String>,
        #[serde(default)]
        objects: Vec<MapObject>,
    },
}

impl LayerFile {
    pub(crate) fn properties(&self) -> &HashMap<String, String> {
        match self {
            LayerFile::Tile { properties, .. } => properties,
            LayerFile::Object { properties, .. } => properties,
        }
    }
}

/// A rectangle in pixel space; its properties apply to every tile the
/// rectangle covers.
#[derive(Debug, Deserialize)]
pub(crate) struct MapObject {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// On-disk shape of a tileset referenced from a map descriptor.
#[derive(Debug, Deserialize)]
pub(crate) struct TilesetFile {
    #[allow(dead_code)]
    pub image: String,
    pub imagewidth: i32,
    pub imageheight: i32,
    pub tilewidth: i32,
    pub tileheight: i32,
    #[serde(default)]
    pub tileproperties: HashMap<String, TileProperties>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TileProperties {
    #[serde(default)]
    pub frames: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
}
