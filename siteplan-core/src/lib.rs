pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 1 pt 对应的毫米数。画布坐标统一为毫米，线宽与字号沿用 pt。
    pub const MM_PER_PT: f64 = 25.4 / 72.0;
    pub const PT_PER_MM: f64 = 72.0 / 25.4;
    pub const MM_PER_INCH: f64 = 25.4;

    /// 二维点，内部以 `glam::DVec2` 表示，单位为毫米，原点位于页面左下角。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        /// 逆时针旋转指定角度（度）。
        pub fn rotated_deg(self, degrees: f64) -> Self {
            let (sin, cos) = degrees.to_radians().sin_cos();
            Self(DVec2::new(
                self.0.x * cos - self.0.y * sin,
                self.0.x * sin + self.0.y * cos,
            ))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐矩形，以左下角和尺寸描述。宽高为 0 时视为退化矩形。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Rect {
        origin: Point2,
        size: DVec2,
    }

    impl Rect {
        #[inline]
        pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
            Self {
                origin: Point2::new(x, y),
                size: DVec2::new(width, height),
            }
        }

        #[inline]
        pub fn origin(&self) -> Point2 {
            self.origin
        }

        #[inline]
        pub fn x(&self) -> f64 {
            self.origin.x()
        }

        #[inline]
        pub fn y(&self) -> f64 {
            self.origin.y()
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.size.x
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.size.y
        }

        #[inline]
        pub fn left(&self) -> f64 {
            self.x()
        }

        #[inline]
        pub fn right(&self) -> f64 {
            self.x() + self.width()
        }

        #[inline]
        pub fn bottom(&self) -> f64 {
            self.y()
        }

        #[inline]
        pub fn top(&self) -> f64 {
            self.y() + self.height()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            Point2::from_vec(self.origin.as_vec2() + self.size * 0.5)
        }

        #[inline]
        pub fn is_degenerate(&self) -> bool {
            self.width() <= 0.0 || self.height() <= 0.0
        }

        /// 四周各收缩 `amount`，结果尺寸不会小于 0。
        pub fn inset(&self, amount: f64) -> Self {
            let width = (self.width() - 2.0 * amount).max(0.0);
            let height = (self.height() - 2.0 * amount).max(0.0);
            Self::new(self.x() + amount, self.y() + amount, width, height)
        }

        /// 判断 `other` 是否完整落在本矩形内，允许 `tolerance` 的浮点误差。
        pub fn contains_rect(&self, other: &Rect, tolerance: f64) -> bool {
            other.left() >= self.left() - tolerance
                && other.bottom() >= self.bottom() - tolerance
                && other.right() <= self.right() + tolerance
                && other.top() <= self.top() + tolerance
        }
    }

    /// 轴对齐边界框，用于估算画布内容范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        pub fn from_rect(rect: &Rect) -> Self {
            Self::new(
                Point2::new(rect.left(), rect.bottom()),
                Point2::new(rect.right(), rect.top()),
            )
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        /// 判断当前范围是否落在矩形之内。
        pub fn within(&self, rect: &Rect, tolerance: f64) -> bool {
            if self.is_empty() {
                return true;
            }
            self.min.x() >= rect.left() - tolerance
                && self.min.y() >= rect.bottom() - tolerance
                && self.max.x() <= rect.right() + tolerance
                && self.max.y() <= rect.top() + tolerance
        }
    }

    /// 生成 45° 正斜线（`/`）填充线段，线段端点已裁剪到矩形边界。
    pub fn hatch_segments(rect: &Rect, spacing: f64) -> Vec<(Point2, Point2)> {
        let mut segments = Vec::new();
        if rect.is_degenerate() || spacing <= 0.0 || !spacing.is_finite() {
            return segments;
        }
        // 直线族 y = x + c，c 覆盖 [bottom - right, top - left]。
        let c_min = rect.bottom() - rect.right();
        let c_max = rect.top() - rect.left();
        let mut c = c_min + spacing;
        while c < c_max {
            let x0 = rect.left().max(rect.bottom() - c);
            let x1 = rect.right().min(rect.top() - c);
            if x1 > x0 {
                segments.push((Point2::new(x0, x0 + c), Point2::new(x1, x1 + c)));
            }
            c += spacing;
        }
        segments
    }
}

pub mod site {
    use std::fmt;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    /// 下载文件名前缀与测量编号缺失时的回退标记。
    pub const DOWNLOAD_PREFIX: &str = "Single_Site_";
    pub const FALLBACK_TOKEN: &str = "site";

    /// 场地四周的方位。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Side {
        North,
        South,
        East,
        West,
    }

    impl Side {
        pub const ALL: [Side; 4] = [Side::North, Side::South, Side::East, Side::West];

        /// 标注用的首字母大写名称。
        pub fn title(self) -> &'static str {
            match self {
                Side::North => "North",
                Side::South => "South",
                Side::East => "East",
                Side::West => "West",
            }
        }

        /// 东西两侧的道路带为竖向，标注需旋转 90°。
        #[inline]
        pub fn is_east_west(self) -> bool {
            matches!(self, Side::East | Side::West)
        }
    }

    impl fmt::Display for Side {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.title())
        }
    }

    #[derive(Debug, Error, PartialEq, Eq)]
    #[error("unknown side `{0}`, expected north/south/east/west")]
    pub struct ParseSideError(pub String);

    impl FromStr for Side {
        type Err = ParseSideError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "north" | "n" => Ok(Side::North),
                "south" | "s" => Ok(Side::South),
                "east" | "e" => Ok(Side::East),
                "west" | "w" => Ok(Side::West),
                _ => Err(ParseSideError(s.to_string())),
            }
        }
    }

    /// 单侧道路：是否存在以及宽度（米）。不存在时仍保留原宽度值。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    pub struct Road {
        #[serde(default)]
        pub present: bool,
        #[serde(default)]
        pub width_m: f64,
    }

    impl Road {
        #[inline]
        pub fn new(present: bool, width_m: f64) -> Self {
            Self { present, width_m }
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    pub struct RoadSpec {
        #[serde(default)]
        pub north: Road,
        #[serde(default)]
        pub south: Road,
        #[serde(default)]
        pub east: Road,
        #[serde(default)]
        pub west: Road,
    }

    impl RoadSpec {
        pub fn get(&self, side: Side) -> Road {
            match side {
                Side::North => self.north,
                Side::South => self.south,
                Side::East => self.east,
                Side::West => self.west,
            }
        }

        pub fn set(&mut self, side: Side, road: Road) {
            match side {
                Side::North => self.north = road,
                Side::South => self.south = road,
                Side::East => self.east = road,
                Side::West => self.west = road,
            }
        }

        /// 按北、南、东、西的固定顺序遍历。
        pub fn iter(&self) -> impl Iterator<Item = (Side, Road)> + '_ {
            Side::ALL.into_iter().map(|side| (side, self.get(side)))
        }
    }

    /// 场地标识与尺寸。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct SiteSpec {
        #[serde(default)]
        pub survey_no: String,
        #[serde(default)]
        pub village: String,
        #[serde(default)]
        pub taluk: String,
        #[serde(default)]
        pub epid: String,
        #[serde(default)]
        pub ward_no: String,
        #[serde(default)]
        pub constituency: String,
        pub length_m: f64,
        pub width_m: f64,
        #[serde(default)]
        pub total_builtup_sqm: f64,
    }

    /// 一次生成所需的全部表单输入。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct SheetForm {
        pub site: SiteSpec,
        #[serde(default)]
        pub roads: RoadSpec,
    }

    #[derive(Debug, Error, PartialEq)]
    pub enum ValidationError {
        #[error("site {field} must be a positive finite number, got {value}")]
        NonPositiveDimension { field: &'static str, value: f64 },
        #[error("total built-up area must be a non-negative finite number, got {0}")]
        InvalidBuiltUpArea(f64),
        #[error("{side} road width must be a non-negative finite number, got {value}")]
        InvalidRoadWidth { side: Side, value: f64 },
    }

    impl SheetForm {
        pub fn new(site: SiteSpec, roads: RoadSpec) -> Self {
            Self { site, roads }
        }

        /// 在布局之前校验必填数值，非法输入直接拒绝生成。
        pub fn validate(&self) -> Result<(), ValidationError> {
            for (field, value) in [
                ("length", self.site.length_m),
                ("width", self.site.width_m),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(ValidationError::NonPositiveDimension { field, value });
                }
            }
            let builtup = self.site.total_builtup_sqm;
            if !(builtup.is_finite() && builtup >= 0.0) {
                return Err(ValidationError::InvalidBuiltUpArea(builtup));
            }
            for (side, road) in self.roads.iter() {
                if !(road.width_m.is_finite() && road.width_m >= 0.0) {
                    return Err(ValidationError::InvalidRoadWidth {
                        side,
                        value: road.width_m,
                    });
                }
            }
            Ok(())
        }

        #[inline]
        pub fn site_area_sqm(&self) -> f64 {
            self.site.width_m * self.site.length_m
        }

        /// 下载文件名：测量编号为空时使用固定回退标记。
        pub fn download_file_name(&self) -> String {
            format!("{DOWNLOAD_PREFIX}{}.pdf", self.file_token())
        }

        /// 文件名主体，不含扩展名，供预览等衍生文件复用。
        pub fn file_token(&self) -> String {
            let trimmed = self.site.survey_no.trim();
            if trimmed.is_empty() {
                return FALLBACK_TOKEN.to_string();
            }
            trimmed
                .chars()
                .map(|ch| {
                    if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                        ch
                    } else {
                        '_'
                    }
                })
                .collect()
        }
    }

    /// 地图点选得到的经纬度（十进制度）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct GeoPoint {
        pub lat: f64,
        pub lon: f64,
    }

    impl GeoPoint {
        #[inline]
        pub fn new(lat: f64, lon: f64) -> Self {
            Self { lat, lon }
        }
    }

    impl fmt::Display for GeoPoint {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:.6}, {:.6}", self.lat, self.lon)
        }
    }
}

pub mod style {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Color {
        pub r: u8,
        pub g: u8,
        pub b: u8,
    }

    impl Color {
        pub const BLACK: Color = Color::rgb(0, 0, 0);
        pub const WHITE: Color = Color::rgb(255, 255, 255);
        pub const GRAY: Color = Color::rgb(128, 128, 128);
        pub const RED: Color = Color::rgb(255, 0, 0);
        /// 道路带填充色 `#e0e0e0`。
        pub const ROAD_FILL: Color = Color::rgb(0xe0, 0xe0, 0xe0);

        #[inline]
        pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
            Self { r, g, b }
        }

        /// 0..=1 区间的分量，供 PDF 颜色算子使用。
        pub fn unit_rgb(self) -> [f64; 3] {
            [
                f64::from(self.r) / 255.0,
                f64::from(self.g) / 255.0,
                f64::from(self.b) / 255.0,
            ]
        }

        pub fn to_hex(self) -> String {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        }
    }

    /// 填充图案，目前只有正斜线一种。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum HatchPattern {
        ForwardDiagonal { spacing_mm: f64, line_width: f64 },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum FontFace {
        Regular,
        Bold,
        Italic,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum HAlign {
        Left,
        Center,
        Right,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum VAlign {
        Baseline,
        Bottom,
        Center,
        Top,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Alignment {
        pub horizontal: HAlign,
        pub vertical: VAlign,
    }

    impl Alignment {
        pub const BASELINE_LEFT: Alignment = Alignment::new(HAlign::Left, VAlign::Baseline);
        pub const CENTER: Alignment = Alignment::new(HAlign::Center, VAlign::Center);

        #[inline]
        pub const fn new(horizontal: HAlign, vertical: VAlign) -> Self {
            Self {
                horizontal,
                vertical,
            }
        }
    }

    /// 单个绘图图元的样式。线宽、虚线段长与字号均以 pt 计。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Style {
        pub line_width: f64,
        pub dash_pattern: Option<Vec<f64>>,
        pub stroke_color: Option<Color>,
        pub fill_color: Option<Color>,
        pub hatch_pattern: Option<HatchPattern>,
        pub font_size: f64,
        pub font: FontFace,
        pub text_color: Color,
        pub alignment: Alignment,
    }

    impl Default for Style {
        fn default() -> Self {
            Self {
                line_width: 0.25,
                dash_pattern: None,
                stroke_color: Some(Color::BLACK),
                fill_color: None,
                hatch_pattern: None,
                font_size: 6.5,
                font: FontFace::Regular,
                text_color: Color::BLACK,
                alignment: Alignment::BASELINE_LEFT,
            }
        }
    }

    impl Style {
        /// 仅描边的线条样式。
        pub fn stroke(line_width: f64) -> Self {
            Self {
                line_width,
                ..Self::default()
            }
        }

        /// 文字样式，默认左对齐、基线对齐。
        pub fn text(font_size: f64) -> Self {
            Self {
                font_size,
                stroke_color: None,
                ..Self::default()
            }
        }

        pub fn dashed(mut self, pattern: Vec<f64>) -> Self {
            self.dash_pattern = Some(pattern);
            self
        }

        pub fn filled(mut self, color: Color) -> Self {
            self.fill_color = Some(color);
            self
        }

        pub fn hatched(mut self, pattern: HatchPattern) -> Self {
            self.hatch_pattern = Some(pattern);
            self
        }

        pub fn no_stroke(mut self) -> Self {
            self.stroke_color = None;
            self
        }

        pub fn no_fill(mut self) -> Self {
            self.fill_color = None;
            self
        }

        pub fn bold(mut self) -> Self {
            self.font = FontFace::Bold;
            self
        }

        pub fn italic(mut self) -> Self {
            self.font = FontFace::Italic;
            self
        }

        pub fn colored(mut self, color: Color) -> Self {
            self.text_color = color;
            self
        }

        pub fn aligned(mut self, horizontal: HAlign, vertical: VAlign) -> Self {
            self.alignment = Alignment::new(horizontal, vertical);
            self
        }
    }
}

/// Helvetica 字体度量。画布上的对齐与换行都依赖它，PDF 导出使用同一套基础 14 字体。
pub mod text {
    use crate::geometry::MM_PER_PT;
    use crate::style::{FontFace, VAlign};

    /// 字面上沿与下沿（1/1000 em）。
    pub const ASCENT: f64 = 718.0;
    pub const DESCENT: f64 = 207.0;
    /// 行带高度与字号之比。
    pub const LINE_SPACING: f64 = 1.2;

    // WinAnsiEncoding 下 0x20..=0x7E 的字宽。
    const HELVETICA: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722,
        722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556,
        556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500,
        500, 334, 260, 334, 584,
    ];

    const HELVETICA_BOLD: [u16; 95] = [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722,
        722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611,
        611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556,
        500, 389, 280, 389, 584,
    ];

    const FALLBACK_WIDTH: u16 = 556;

    /// 单字符字宽（1/1000 em）。斜体与常规体字宽一致。
    pub fn advance_width(ch: char, font: FontFace) -> u16 {
        let table = match font {
            FontFace::Bold => &HELVETICA_BOLD,
            FontFace::Regular | FontFace::Italic => &HELVETICA,
        };
        let code = ch as u32;
        if (0x20..=0x7e).contains(&code) {
            table[(code - 0x20) as usize]
        } else {
            FALLBACK_WIDTH
        }
    }

    #[inline]
    pub fn font_size_mm(size_pt: f64) -> f64 {
        size_pt * MM_PER_PT
    }

    pub fn text_width_mm(content: &str, font: FontFace, size_pt: f64) -> f64 {
        let units: u32 = content
            .chars()
            .map(|ch| u32::from(advance_width(ch, font)))
            .sum();
        f64::from(units) / 1000.0 * font_size_mm(size_pt)
    }

    #[inline]
    pub fn line_height_mm(size_pt: f64) -> f64 {
        font_size_mm(size_pt) * LINE_SPACING
    }

    /// 锚点到基线的竖向偏移（毫米，向上为正）。
    pub fn baseline_offset_mm(vertical: VAlign, size_pt: f64) -> f64 {
        let em = font_size_mm(size_pt) / 1000.0;
        match vertical {
            VAlign::Baseline => 0.0,
            VAlign::Bottom => DESCENT * em,
            VAlign::Top => -ASCENT * em,
            VAlign::Center => -(ASCENT - DESCENT) * 0.5 * em,
        }
    }

    /// 按实测宽度贪心换行。超过宽度的单词独占一行，不做截断。
    pub fn wrap_to_width(content: &str, font: FontFace, size_pt: f64, max_mm: f64) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in content.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if text_width_mm(&candidate, font, size_pt) <= max_mm {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}

pub mod canvas {
    use image::RgbaImage;

    use crate::geometry::{Bounds2D, Point2, Rect, Vector2};
    use crate::style::{HAlign, Style};
    use crate::text;

    /// A3 横向页面尺寸（毫米）。
    pub const A3_LANDSCAPE_MM: (f64, f64) = (420.0, 297.0);

    #[derive(Debug, Clone, PartialEq)]
    pub struct TextItem {
        pub anchor: Point2,
        pub content: String,
        /// 逆时针旋转角（度），绕锚点旋转。
        pub rotation_deg: f64,
        pub style: Style,
    }

    impl TextItem {
        #[inline]
        pub fn width_mm(&self) -> f64 {
            text::text_width_mm(&self.content, self.style.font, self.style.font_size)
        }

        /// 根据对齐方式求出基线起点，导出器据此定位文字。
        pub fn baseline_origin(&self) -> Point2 {
            let width = self.width_mm();
            let dx = match self.style.alignment.horizontal {
                HAlign::Left => 0.0,
                HAlign::Center => -width * 0.5,
                HAlign::Right => -width,
            };
            let dy = text::baseline_offset_mm(self.style.alignment.vertical, self.style.font_size);
            let offset = Vector2::new(dx, dy).rotated_deg(self.rotation_deg);
            self.anchor.translate(offset)
        }

        /// 文字外框的近似范围（含旋转）。
        pub fn bounds(&self) -> Bounds2D {
            let origin = self.baseline_origin();
            let size_mm = text::font_size_mm(self.style.font_size);
            let ascent = text::ASCENT / 1000.0 * size_mm;
            let descent = text::DESCENT / 1000.0 * size_mm;
            let width = self.width_mm();
            let mut bounds = Bounds2D::empty();
            for (dx, dy) in [(0.0, -descent), (width, -descent), (width, ascent), (0.0, ascent)] {
                let offset = Vector2::new(dx, dy).rotated_deg(self.rotation_deg);
                bounds.include_point(origin.translate(offset));
            }
            bounds
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct ImageItem {
        pub rect: Rect,
        pub image: RgbaImage,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Primitive {
        Rect { rect: Rect, style: Style },
        Polyline {
            points: Vec<Point2>,
            closed: bool,
            style: Style,
        },
        Text(TextItem),
        Image(ImageItem),
    }

    impl Primitive {
        pub fn bounds(&self) -> Option<Bounds2D> {
            match self {
                Primitive::Rect { rect, .. } => Some(Bounds2D::from_rect(rect)),
                Primitive::Polyline { points, .. } => {
                    let mut bounds = Bounds2D::empty();
                    for point in points {
                        bounds.include_point(*point);
                    }
                    if bounds.is_empty() { None } else { Some(bounds) }
                }
                Primitive::Text(text) => Some(text.bounds()),
                Primitive::Image(image) => Some(Bounds2D::from_rect(&image.rect)),
            }
        }
    }

    /// 正在绘制的图纸页面：固定尺寸，图元按添加顺序保存，并记录所属图层。
    #[derive(Debug, Clone, PartialEq)]
    pub struct DrawingCanvas {
        width_mm: f64,
        height_mm: f64,
        layers: Vec<String>,
        items: Vec<(String, Primitive)>,
    }

    impl DrawingCanvas {
        pub fn new(width_mm: f64, height_mm: f64) -> Self {
            Self {
                width_mm,
                height_mm,
                layers: Vec::new(),
                items: Vec::new(),
            }
        }

        pub fn a3_landscape() -> Self {
            Self::new(A3_LANDSCAPE_MM.0, A3_LANDSCAPE_MM.1)
        }

        #[inline]
        pub fn width_mm(&self) -> f64 {
            self.width_mm
        }

        #[inline]
        pub fn height_mm(&self) -> f64 {
            self.height_mm
        }

        #[inline]
        pub fn page_rect(&self) -> Rect {
            Rect::new(0.0, 0.0, self.width_mm, self.height_mm)
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            if !self.layers.iter().any(|layer| layer == key) {
                self.layers.push(key.to_string());
            }
        }

        pub fn add(&mut self, layer: impl Into<String>, primitive: Primitive) {
            let layer = layer.into();
            self.ensure_layer(&layer);
            self.items.push((layer, primitive));
        }

        pub fn add_rect(&mut self, layer: impl Into<String>, rect: Rect, style: Style) {
            self.add(layer, Primitive::Rect { rect, style });
        }

        pub fn add_line(&mut self, layer: impl Into<String>, start: Point2, end: Point2, style: Style) {
            self.add(
                layer,
                Primitive::Polyline {
                    points: vec![start, end],
                    closed: false,
                    style,
                },
            );
        }

        pub fn add_polygon<I>(&mut self, layer: impl Into<String>, points: I, style: Style)
        where
            I: IntoIterator<Item = Point2>,
        {
            self.add(
                layer,
                Primitive::Polyline {
                    points: points.into_iter().collect(),
                    closed: true,
                    style,
                },
            );
        }

        pub fn add_text(
            &mut self,
            layer: impl Into<String>,
            anchor: Point2,
            content: impl Into<String>,
            rotation_deg: f64,
            style: Style,
        ) {
            self.add(
                layer,
                Primitive::Text(TextItem {
                    anchor,
                    content: content.into(),
                    rotation_deg,
                    style,
                }),
            );
        }

        pub fn add_image(&mut self, layer: impl Into<String>, rect: Rect, image: RgbaImage) {
            self.add(layer, Primitive::Image(ImageItem { rect, image }));
        }

        pub fn layers(&self) -> impl Iterator<Item = &str> {
            self.layers.iter().map(String::as_str)
        }

        pub fn items(&self) -> impl Iterator<Item = (&str, &Primitive)> {
            self.items
                .iter()
                .map(|(layer, primitive)| (layer.as_str(), primitive))
        }

        pub fn on_layer<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a Primitive> + 'a {
            self.items
                .iter()
                .filter(move |(name, _)| name == layer)
                .map(|(_, primitive)| primitive)
        }

        pub fn texts(&self) -> impl Iterator<Item = &TextItem> {
            self.items.iter().filter_map(|(_, primitive)| match primitive {
                Primitive::Text(text) => Some(text),
                _ => None,
            })
        }

        pub fn images(&self) -> impl Iterator<Item = &ImageItem> {
            self.items.iter().filter_map(|(_, primitive)| match primitive {
                Primitive::Image(image) => Some(image),
                _ => None,
            })
        }

        pub fn contains_text(&self, content: &str) -> bool {
            self.texts().any(|text| text.content == content)
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.items.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }

        /// 全部图元的包围范围，空画布返回 `None`。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for (_, primitive) in &self.items {
                if let Some(item_bounds) = primitive.bounds() {
                    bounds.include_bounds(&item_bounds);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }
}

/// 关键位置图（Key Plan）的来源抽象。拼图失败以值的形式返回，由渲染器分支处理。
pub mod keyplan {
    use image::RgbaImage;

    use crate::site::GeoPoint;

    #[derive(Debug, Clone, PartialEq)]
    pub enum MosaicOutcome {
        Ready(RgbaImage),
        Failed { reason: String },
    }

    pub trait KeyPlanSource {
        fn key_plan(&self, point: GeoPoint) -> MosaicOutcome;
    }
}

#[cfg(test)]
mod tests {
    use super::canvas::DrawingCanvas;
    use super::geometry::{Bounds2D, Point2, Rect, Vector2, hatch_segments};
    use super::site::{Road, RoadSpec, SheetForm, Side, SiteSpec, ValidationError};
    use super::style::{Alignment, FontFace, HAlign, Style, VAlign};
    use super::text;

    fn form(length: f64, width: f64) -> SheetForm {
        SheetForm::new(
            SiteSpec {
                length_m: length,
                width_m: width,
                ..SiteSpec::default()
            },
            RoadSpec::default(),
        )
    }

    #[test]
    fn rect_accessors_and_inset() {
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(rect.right(), 110.0);
        assert_eq!(rect.top(), 70.0);
        assert_eq!(rect.center(), Point2::new(60.0, 45.0));

        let inner = rect.inset(5.0);
        assert_eq!(inner, Rect::new(15.0, 25.0, 90.0, 40.0));
        assert!(rect.contains_rect(&inner, 0.0));
        assert!(!inner.contains_rect(&rect, 0.0));

        let collapsed = rect.inset(40.0);
        assert!(collapsed.is_degenerate());
        assert_eq!(collapsed.height(), 0.0);
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let v = Vector2::new(1.0, 0.0).rotated_deg(90.0);
        assert!(v.x().abs() < 1e-12);
        assert!((v.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hatch_segments_stay_inside_rect() {
        let rect = Rect::new(5.0, 5.0, 40.0, 12.0);
        let segments = hatch_segments(&rect, 1.5);
        assert!(!segments.is_empty());
        for (start, end) in &segments {
            for p in [start, end] {
                assert!(p.x() >= rect.left() - 1e-9 && p.x() <= rect.right() + 1e-9);
                assert!(p.y() >= rect.bottom() - 1e-9 && p.y() <= rect.top() + 1e-9);
            }
            // 45° 斜线
            assert!(((end.y() - start.y()) - (end.x() - start.x())).abs() < 1e-9);
        }
        assert!(hatch_segments(&Rect::new(0.0, 0.0, 10.0, 0.0), 1.0).is_empty());
        assert!(hatch_segments(&rect, 0.0).is_empty());
    }

    #[test]
    fn bounds_within_rect() {
        let mut bounds = Bounds2D::empty();
        assert!(bounds.is_empty());
        bounds.include_point(Point2::new(1.0, 2.0));
        bounds.include_point(Point2::new(3.0, -1.0));
        assert_eq!(bounds.min(), Point2::new(1.0, -1.0));
        assert!(bounds.within(&Rect::new(0.0, -2.0, 5.0, 5.0), 0.0));
        assert!(!bounds.within(&Rect::new(2.0, -2.0, 5.0, 5.0), 0.0));
    }

    #[test]
    fn validation_rejects_non_positive_dimensions() {
        assert!(form(15.0, 12.0).validate().is_ok());
        assert_eq!(
            form(0.0, 12.0).validate(),
            Err(ValidationError::NonPositiveDimension {
                field: "length",
                value: 0.0
            })
        );
        assert!(matches!(
            form(15.0, -1.0).validate(),
            Err(ValidationError::NonPositiveDimension { field: "width", .. })
        ));
        assert!(form(f64::NAN, 12.0).validate().is_err());

        let mut negative_road = form(15.0, 12.0);
        negative_road.roads.set(Side::East, Road::new(false, -3.0));
        assert!(matches!(
            negative_road.validate(),
            Err(ValidationError::InvalidRoadWidth { side: Side::East, .. })
        ));

        let mut builtup = form(15.0, 12.0);
        builtup.site.total_builtup_sqm = -1.0;
        assert_eq!(builtup.validate(), Err(ValidationError::InvalidBuiltUpArea(-1.0)));
    }

    #[test]
    fn download_name_falls_back_when_survey_blank() {
        let mut sheet = form(15.0, 12.0);
        assert_eq!(sheet.download_file_name(), "Single_Site_site.pdf");
        sheet.site.survey_no = "   ".to_string();
        assert_eq!(sheet.download_file_name(), "Single_Site_site.pdf");
        sheet.site.survey_no = "12/3A".to_string();
        assert_eq!(sheet.download_file_name(), "Single_Site_12_3A.pdf");
    }

    #[test]
    fn road_spec_keeps_width_when_absent() {
        let mut roads = RoadSpec::default();
        roads.set(Side::West, Road::new(false, 9.0));
        assert_eq!(roads.get(Side::West).width_m, 9.0);
        let order: Vec<Side> = roads.iter().map(|(side, _)| side).collect();
        assert_eq!(order, Side::ALL.to_vec());
        assert_eq!("East".parse::<Side>(), Ok(Side::East));
        assert!("up".parse::<Side>().is_err());
    }

    #[test]
    fn text_metrics_and_wrapping() {
        let width = text::text_width_mm("ABC", FontFace::Regular, 10.0);
        // A=667 B=667 C=722
        let expected = 2056.0 / 1000.0 * 10.0 * 25.4 / 72.0;
        assert!((width - expected).abs() < 1e-9);
        assert!(
            text::text_width_mm("abc", FontFace::Bold, 10.0)
                > text::text_width_mm("abc", FontFace::Regular, 10.0)
        );

        let sentence = "one two three four five six seven eight nine ten";
        let lines = text::wrap_to_width(sentence, FontFace::Regular, 4.0, 12.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.join(" "), sentence);
        for line in &lines {
            if line.contains(' ') {
                assert!(text::text_width_mm(line, FontFace::Regular, 4.0) <= 12.0);
            }
        }
        assert!(text::wrap_to_width("   ", FontFace::Regular, 4.0, 12.0).is_empty());
    }

    #[test]
    fn canvas_tracks_layers_and_bounds() {
        let mut canvas = DrawingCanvas::a3_landscape();
        assert!(canvas.bounds().is_none());
        canvas.add_rect("BORDER", Rect::new(6.0, 6.0, 408.0, 285.0), Style::stroke(0.25));
        canvas.add_text(
            "LABEL",
            Point2::new(100.0, 100.0),
            "Hello",
            0.0,
            Style::text(8.0).aligned(HAlign::Center, VAlign::Center),
        );
        canvas.add_text("LABEL", Point2::new(10.0, 10.0), "World", 90.0, Style::text(8.0));

        let layers: Vec<&str> = canvas.layers().collect();
        assert_eq!(layers, vec!["BORDER", "LABEL"]);
        assert_eq!(canvas.on_layer("LABEL").count(), 2);
        assert!(canvas.contains_text("Hello"));
        assert!(!canvas.contains_text("hello"));

        let bounds = canvas.bounds().expect("bounds");
        assert!(bounds.within(&canvas.page_rect(), 0.0));
    }

    #[test]
    fn centered_text_origin_is_shifted_left_and_down() {
        let mut canvas = DrawingCanvas::a3_landscape();
        let style = Style {
            alignment: Alignment::CENTER,
            ..Style::text(10.0)
        };
        canvas.add_text("T", Point2::new(50.0, 50.0), "WIDE TEXT", 0.0, style);
        let item = canvas.texts().next().expect("text item");
        let origin = item.baseline_origin();
        assert!((origin.x() - (50.0 - item.width_mm() / 2.0)).abs() < 1e-9);
        assert!(origin.y() < 50.0);
    }
}
