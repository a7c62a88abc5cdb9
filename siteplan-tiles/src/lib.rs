//! 关键位置图所需的瓦片抓取与 3×3 拼图。

pub mod fetch;
pub mod mosaic;
pub mod tile;

pub use fetch::{HttpTileSource, PlaceholderTileSource, TileSource, placeholder_tile};
pub use mosaic::{MosaicBuilder, MosaicError};
pub use tile::{TILE_SIZE, TileId, latlon_to_tile, meters_per_pixel};
