use std::f64::consts::PI;
use std::fmt;

/// 单张瓦片边长（像素）。
pub const TILE_SIZE: u32 = 256;
/// WGS84 赤道半径（米）。
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;
/// Web Mercator 可表示的纬度上限。
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// 瓦片地址。索引可以越界或为负，是否可用由瓦片服务决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub zoom: u8,
    pub x: i64,
    pub y: i64,
}

impl TileId {
    #[inline]
    pub fn new(zoom: u8, x: i64, y: i64) -> Self {
        Self { zoom, x, y }
    }

    /// 按 `{server}/{z}/{x}/{y}.png` 模式拼出请求地址。
    pub fn url(&self, server_url: &str) -> String {
        format!(
            "{}/{}/{}/{}.png",
            server_url.trim_end_matches('/'),
            self.zoom,
            self.x,
            self.y
        )
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// 经纬度转换为小数瓦片坐标（标准 Web Mercator 公式）。
pub fn latlon_to_tile(lat_deg: f64, lon_deg: f64, zoom: u8) -> (f64, f64) {
    let lat_rad = lat_deg.to_radians();
    let n = 2f64.powi(i32::from(zoom));
    let x = (lon_deg + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// 指定纬度与缩放级别下每像素对应的地面米数。
pub fn meters_per_pixel(lat_deg: f64, zoom: u8) -> f64 {
    lat_deg.to_radians().cos() * 2.0 * PI * EARTH_RADIUS_M
        / (f64::from(TILE_SIZE) * 2f64.powi(i32::from(zoom)))
}
