use image::imageops;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};
use siteplan_core::keyplan::{KeyPlanSource, MosaicOutcome};
use siteplan_core::site::GeoPoint;
use thiserror::Error;
use tracing::{debug, warn};

use crate::fetch::TileSource;
use crate::tile::{MAX_LATITUDE, TILE_SIZE, TileId, latlon_to_tile, meters_per_pixel};

/// 拼图为 3×3 瓦片。
pub const GRID_SPAN: i64 = 3;
pub const MAX_ZOOM: u8 = 22;
pub const DEFAULT_ZOOM: u8 = 18;
pub const DEFAULT_RADIUS_M: f64 = 50.0;

const CIRCLE_COLOR: Rgba<u8> = Rgba([200, 0, 0, 255]);
const CIRCLE_WIDTH_PX: i32 = 6;
const MARKER_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const MARKER_RADIUS_PX: i32 = 4;

#[derive(Debug, Error, PartialEq)]
pub enum MosaicError {
    #[error("latitude {0} is outside the Web Mercator range")]
    InvalidLatitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),
    #[error("zoom level {0} exceeds the supported maximum of {MAX_ZOOM}")]
    ZoomTooDeep(u8),
    #[error("radius must be a non-negative finite distance, got {0}")]
    InvalidRadius(f64),
}

/// 以选定点为中心拼接 3×3 瓦片，并叠加地面半径圆与定位点。
#[derive(Debug, Clone)]
pub struct MosaicBuilder<S> {
    source: S,
    zoom: u8,
    radius_m: f64,
}

impl<S: TileSource> MosaicBuilder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            zoom: DEFAULT_ZOOM,
            radius_m: DEFAULT_RADIUS_M,
        }
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// 每次调用都会重新抓取全部 9 张瓦片，不做缓存。单张失败不会导致拼图失败。
    pub fn build(
        &self,
        point: GeoPoint,
        zoom: u8,
        radius_m: f64,
    ) -> Result<RgbaImage, MosaicError> {
        validate(point, zoom, radius_m)?;

        let (x_tile, y_tile) = latlon_to_tile(point.lat, point.lon, zoom);
        let x_center = x_tile.floor() as i64;
        let y_center = y_tile.floor() as i64;
        let size = i64::from(TILE_SIZE);
        let span = GRID_SPAN as u32 * TILE_SIZE;

        let mut stitched = RgbaImage::new(span, span);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let tile = TileId::new(zoom, x_center + dx, y_center + dy);
                let image = self.source.fetch_tile(tile);
                imageops::replace(&mut stitched, &image, (dx + 1) * size, (dy + 1) * size);
            }
        }

        let mpp = meters_per_pixel(point.lat, zoom);
        let radius_px = (radius_m / mpp) as i32;
        let cx = (x_tile - x_center as f64 + 1.0) * f64::from(TILE_SIZE);
        let cy = (y_tile - y_center as f64 + 1.0) * f64::from(TILE_SIZE);
        let center = (cx.round() as i32, cy.round() as i32);

        // 轮廓向内加粗，与外接框保持一致。
        for inset in 0..CIRCLE_WIDTH_PX {
            let radius = radius_px - inset;
            if radius > 0 {
                draw_hollow_circle_mut(&mut stitched, center, radius, CIRCLE_COLOR);
            }
        }
        draw_filled_circle_mut(&mut stitched, center, MARKER_RADIUS_PX, MARKER_COLOR);

        debug!(
            lat = point.lat,
            lon = point.lon,
            zoom,
            x_center,
            y_center,
            mpp,
            radius_px,
            "关键位置图拼接完成"
        );
        Ok(stitched)
    }
}

fn validate(point: GeoPoint, zoom: u8, radius_m: f64) -> Result<(), MosaicError> {
    if !point.lat.is_finite() || point.lat.abs() >= MAX_LATITUDE {
        return Err(MosaicError::InvalidLatitude(point.lat));
    }
    if !point.lon.is_finite() || point.lon.abs() > 180.0 {
        return Err(MosaicError::InvalidLongitude(point.lon));
    }
    if zoom > MAX_ZOOM {
        return Err(MosaicError::ZoomTooDeep(zoom));
    }
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(MosaicError::InvalidRadius(radius_m));
    }
    Ok(())
}

impl<S: TileSource> KeyPlanSource for MosaicBuilder<S> {
    fn key_plan(&self, point: GeoPoint) -> MosaicOutcome {
        match self.build(point, self.zoom, self.radius_m) {
            Ok(image) => MosaicOutcome::Ready(image),
            Err(err) => {
                warn!(%point, error = %err, "关键位置图生成失败");
                MosaicOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{PLACEHOLDER_COLOR, PlaceholderTileSource};
    use std::cell::RefCell;

    /// 记录请求并按相对位置返回不同颜色的瓦片。
    struct RecordingSource {
        center: (i64, i64),
        requests: RefCell<Vec<TileId>>,
    }

    impl RecordingSource {
        fn new(center: (i64, i64)) -> Self {
            Self {
                center,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn color_for(&self, tile: TileId) -> Rgba<u8> {
            let dx = (tile.x - self.center.0 + 1) as u8;
            let dy = (tile.y - self.center.1 + 1) as u8;
            Rgba([dx * 40 + 10, dy * 40 + 10, 90, 255])
        }
    }

    impl TileSource for RecordingSource {
        fn fetch_tile(&self, tile: TileId) -> RgbaImage {
            self.requests.borrow_mut().push(tile);
            RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, self.color_for(tile))
        }
    }

    #[test]
    fn stitches_nine_tiles_around_center() {
        let source = RecordingSource::new((1, 1));
        let builder = MosaicBuilder::new(&source);
        let image = builder
            .build(GeoPoint::new(0.0, 0.0), 1, 0.0)
            .expect("mosaic");
        assert_eq!(image.dimensions(), (768, 768));

        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 9);
        for dx in -1..=1 {
            for dy in -1..=1 {
                assert!(requests.contains(&TileId::new(1, 1 + dx, 1 + dy)));
            }
        }

        // 左上角来自 (x-1, y-1)，右下角来自 (x+1, y+1)。
        assert_eq!(
            *image.get_pixel(10, 10),
            source.color_for(TileId::new(1, 0, 0))
        );
        assert_eq!(
            *image.get_pixel(700, 700),
            source.color_for(TileId::new(1, 2, 2))
        );
        assert_eq!(
            *image.get_pixel(300, 10),
            source.color_for(TileId::new(1, 1, 0))
        );
    }

    #[test]
    fn overlay_circle_uses_ground_radius() {
        let source = RecordingSource::new((1, 1));
        let builder = MosaicBuilder::new(&source);
        let mpp = meters_per_pixel(0.0, 1);
        let image = builder
            .build(GeoPoint::new(0.0, 0.0), 1, mpp * 100.5)
            .expect("mosaic");

        // 点位于中心瓦片左上角，即 (256, 256)。
        assert_eq!(*image.get_pixel(256, 256), MARKER_COLOR);
        assert_eq!(*image.get_pixel(356, 256), CIRCLE_COLOR);
        assert_eq!(*image.get_pixel(352, 256), CIRCLE_COLOR);
        assert_ne!(*image.get_pixel(330, 256), CIRCLE_COLOR);
        assert_eq!(*image.get_pixel(256, 156), CIRCLE_COLOR);
    }

    #[test]
    fn marker_follows_fractional_tile_position() {
        let point = GeoPoint::new(12.9716, 77.5946);
        let (x_tile, y_tile) = latlon_to_tile(point.lat, point.lon, 18);
        let builder = MosaicBuilder::new(PlaceholderTileSource);
        let image = builder.build(point, 18, 50.0).expect("mosaic");

        let px = ((x_tile - x_tile.floor() + 1.0) * f64::from(TILE_SIZE)).round() as u32;
        let py = ((y_tile - y_tile.floor() + 1.0) * f64::from(TILE_SIZE)).round() as u32;
        assert_eq!((px, py), (426, 417));
        assert_eq!(*image.get_pixel(px, py), MARKER_COLOR);
        // 标记不在中心瓦片的角点或中点。
        assert_ne!(*image.get_pixel(256, 256), MARKER_COLOR);
        assert_ne!(*image.get_pixel(384, 384), MARKER_COLOR);
    }

    #[test]
    fn all_failed_fetches_still_produce_image() {
        let builder = MosaicBuilder::new(PlaceholderTileSource);
        let outcome = builder.key_plan(GeoPoint::new(12.9716, 77.5946));
        match outcome {
            MosaicOutcome::Ready(image) => {
                assert_eq!(image.dimensions(), (768, 768));
                assert_eq!(*image.get_pixel(0, 0), PLACEHOLDER_COLOR);
                assert_eq!(*image.get_pixel(767, 767), PLACEHOLDER_COLOR);
            }
            MosaicOutcome::Failed { reason } => panic!("unexpected failure: {reason}"),
        }
    }

    #[test]
    fn invalid_inputs_are_reported_as_values() {
        let builder = MosaicBuilder::new(PlaceholderTileSource);
        assert_eq!(
            builder.build(GeoPoint::new(89.0, 0.0), 18, 50.0),
            Err(MosaicError::InvalidLatitude(89.0))
        );
        assert_eq!(
            builder.build(GeoPoint::new(0.0, 181.0), 18, 50.0),
            Err(MosaicError::InvalidLongitude(181.0))
        );
        assert_eq!(
            builder.build(GeoPoint::new(0.0, 0.0), 30, 50.0),
            Err(MosaicError::ZoomTooDeep(30))
        );
        assert_eq!(
            builder.build(GeoPoint::new(0.0, 0.0), 18, -1.0),
            Err(MosaicError::InvalidRadius(-1.0))
        );

        let outcome = builder.key_plan(GeoPoint::new(f64::NAN, 0.0));
        assert!(matches!(outcome, MosaicOutcome::Failed { .. }));
    }
}
