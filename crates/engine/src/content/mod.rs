mod loader;
mod map_file;

pub use loader::{parse_color_overlay, AreaLoader, MapLoadError};
