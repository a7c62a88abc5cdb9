use std::time::Duration;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::tile::{TILE_SIZE, TileId};

/// 占位瓦片的统一浅灰色。
pub const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([240, 240, 240, 255]);

/// 瓦片来源。实现方必须总是返回 256×256 的图像，失败时以占位图代替。
pub trait TileSource {
    fn fetch_tile(&self, tile: TileId) -> RgbaImage;
}

impl<T: TileSource + ?Sized> TileSource for &T {
    fn fetch_tile(&self, tile: TileId) -> RgbaImage {
        (**self).fetch_tile(tile)
    }
}

pub fn placeholder_tile() -> RgbaImage {
    RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, PLACEHOLDER_COLOR)
}

#[derive(Debug, Error)]
pub enum TileError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request for tile {tile} failed: {source}")]
    Request {
        tile: TileId,
        #[source]
        source: reqwest::Error,
    },
    #[error("tile {tile} could not be decoded: {source}")]
    Decode {
        tile: TileId,
        #[source]
        source: image::ImageError,
    },
}

/// 通过 HTTP GET 抓取单张瓦片，单次尝试，不重试。
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: Client,
    server_url: String,
}

impl HttpTileSource {
    pub fn new(
        server_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, TileError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(TileError::Client)?;
        Ok(Self {
            client,
            server_url: server_url.into(),
        })
    }

    #[inline]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// 返回真实的抓取结果，供需要区分成功与失败的调用方使用。
    pub fn try_fetch(&self, tile: TileId) -> Result<RgbaImage, TileError> {
        let url = tile.url(&self.server_url);
        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|source| TileError::Request { tile, source })?;
        let bytes = response
            .bytes()
            .map_err(|source| TileError::Request { tile, source })?;
        let decoded =
            image::load_from_memory(&bytes).map_err(|source| TileError::Decode { tile, source })?;
        let mut rgba = decoded.into_rgba8();
        if rgba.dimensions() != (TILE_SIZE, TILE_SIZE) {
            debug!(
                %tile,
                width = rgba.width(),
                height = rgba.height(),
                "瓦片尺寸不符，缩放到标准尺寸"
            );
            rgba = imageops::resize(&rgba, TILE_SIZE, TILE_SIZE, FilterType::Lanczos3);
        }
        Ok(rgba)
    }
}

impl TileSource for HttpTileSource {
    fn fetch_tile(&self, tile: TileId) -> RgbaImage {
        match self.try_fetch(tile) {
            Ok(image) => {
                debug!(%tile, "瓦片抓取成功");
                image
            }
            Err(err) => {
                warn!(%tile, error = %err, "瓦片抓取失败，使用占位瓦片");
                placeholder_tile()
            }
        }
    }
}

/// 离线来源：从不访问网络，总是返回占位瓦片。
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTileSource;

impl TileSource for PlaceholderTileSource {
    fn fetch_tile(&self, _tile: TileId) -> RgbaImage {
        placeholder_tile()
    }
}
