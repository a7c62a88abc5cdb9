use siteplan_core::canvas::A3_LANDSCAPE_MM;
use siteplan_core::geometry::{Point2, Rect};
use siteplan_core::site::{SheetForm, Side};
use tracing::{debug, warn};

use crate::errors::EngineError;

pub const KEY_PLAN_SIZE_MM: (f64, f64) = (110.0, 70.0);
pub const SKETCH_SIZE_MM: (f64, f64) = (110.0, 65.0);
pub const LAND_USE_COLUMNS_MM: [f64; 4] = [12.0, 55.0, 30.0, 20.0];
pub const LAND_USE_ROW_HEIGHT_MM: f64 = 6.5;
/// 表头 + 两行数据。
pub const LAND_USE_ROWS: usize = 3;
pub const CONDITION_COLUMNS: usize = 3;
pub const CONDITION_GUTTER_MM: f64 = 3.0;
pub const TITLE_BLOCK_DIVIDERS: [f64; 2] = [0.48, 0.70];

// 右栏各面板之间的竖向间距。
const CAPTION_ROOM_MM: f64 = 3.0;
const PANEL_GAP_MM: f64 = 10.0;
const TABLE_HEADING_GAP_MM: f64 = 2.0;
const CONDITIONS_GAP_MM: f64 = 4.5;
const CONDITIONS_HEADING_BAND_MM: f64 = 3.0;
/// 道路标注锚点距绘图区边缘的最小距离。
const ROAD_LABEL_INSET_MM: f64 = 4.0;

/// 固定图纸模板。默认值即 A3 横向单地块布局。
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTemplate {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
    /// 比例分母，100 表示 1:100。
    pub scale: f64,
    pub drawing_width_ratio: f64,
    pub title_block_height_mm: f64,
    pub region_gap_mm: f64,
    pub inner_padding_mm: f64,
    pub column_gap_mm: f64,
    pub road_label_offset_m: f64,
    pub site_title_offset_mm: f64,
}

impl Default for SheetTemplate {
    fn default() -> Self {
        Self {
            page_width_mm: A3_LANDSCAPE_MM.0,
            page_height_mm: A3_LANDSCAPE_MM.1,
            margin_mm: 12.0,
            scale: 100.0,
            drawing_width_ratio: 0.62,
            title_block_height_mm: 35.0,
            region_gap_mm: 4.0,
            inner_padding_mm: 4.0,
            column_gap_mm: 15.0,
            road_label_offset_m: 3.0,
            site_title_offset_mm: 30.0,
        }
    }
}

impl SheetTemplate {
    pub fn with_scale(scale: f64) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    /// 名义比例下每米对应的图面毫米数，道路带厚度按此换算。
    #[inline]
    pub fn nominal_mm_per_m(&self) -> f64 {
        1000.0 / self.scale
    }

    fn validate(&self) -> Result<(), EngineError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.scale) {
            return Err(EngineError::InvalidScale(self.scale));
        }
        if !positive(self.page_width_mm) || !positive(self.page_height_mm) {
            return Err(EngineError::InvalidTemplate(format!(
                "page size {}x{} mm",
                self.page_width_mm, self.page_height_mm
            )));
        }
        if !(self.drawing_width_ratio > 0.0 && self.drawing_width_ratio < 1.0) {
            return Err(EngineError::InvalidTemplate(format!(
                "drawing width ratio {}",
                self.drawing_width_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadBand {
    pub side: Side,
    pub width_m: f64,
    pub rect: Rect,
    pub label_anchor: Point2,
    pub label_rotation_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NorthArrow {
    pub tail: Point2,
    pub shaft_length_mm: f64,
    pub head_length_mm: f64,
    pub head_width_mm: f64,
    pub label_anchor: Point2,
}

impl NorthArrow {
    #[inline]
    pub fn head_base(&self) -> Point2 {
        Point2::new(self.tail.x(), self.tail.y() + self.shaft_length_mm)
    }

    #[inline]
    pub fn tip(&self) -> Point2 {
        Point2::new(
            self.tail.x(),
            self.tail.y() + self.shaft_length_mm + self.head_length_mm,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub heading_anchor: Point2,
    /// 表格左上角。
    pub top_left: Point2,
    pub column_widths: Vec<f64>,
    pub row_height: f64,
    pub rows: usize,
}

impl TableLayout {
    pub fn width(&self) -> f64 {
        self.column_widths.iter().sum()
    }

    pub fn height(&self) -> f64 {
        self.row_height * self.rows as f64
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.top_left.x(),
            self.top_left.y() - self.height(),
            self.width(),
            self.height(),
        )
    }

    /// 第 `row` 行第 `column` 列单元格，行号自上而下从 0 开始。
    pub fn cell(&self, row: usize, column: usize) -> Rect {
        let x = self.top_left.x() + self.column_widths[..column].iter().sum::<f64>();
        let top = self.top_left.y() - self.row_height * row as f64;
        Rect::new(
            x,
            top - self.row_height,
            self.column_widths[column],
            self.row_height,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionsLayout {
    pub area: Rect,
    pub heading_anchor: Point2,
    pub columns: Vec<Rect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleBlockLayout {
    pub rect: Rect,
    pub dividers: [f64; 2],
}

impl TitleBlockLayout {
    /// 三个分区的左边界。
    pub fn section_lefts(&self) -> [f64; 3] {
        [self.rect.left(), self.dividers[0], self.dividers[1]]
    }
}

/// 一次布局计算的全部结果，单位为毫米。
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub page: Rect,
    pub border: Rect,
    pub scale: f64,
    pub nominal_mm_per_m: f64,
    /// 场地适配比例（每米毫米数），与名义比例不同。
    pub site_mm_per_m: f64,
    pub drawing_region: Rect,
    pub usable: Rect,
    pub site: Rect,
    pub roads: Vec<RoadBand>,
    pub site_title_anchor: Point2,
    pub key_plan: Rect,
    pub north_arrow: NorthArrow,
    pub sketch: Rect,
    pub land_use: TableLayout,
    pub conditions: ConditionsLayout,
    pub title_block: TitleBlockLayout,
}

impl SheetLayout {
    pub fn road(&self, side: Side) -> Option<&RoadBand> {
        self.roads.iter().find(|band| band.side == side)
    }
}

/// 纯函数：相同输入总是得到相同布局。
pub fn compute_layout(form: &SheetForm, template: &SheetTemplate) -> Result<SheetLayout, EngineError> {
    form.validate()?;
    template.validate()?;

    let page_w = template.page_width_mm;
    let page_h = template.page_height_mm;
    let margin = template.margin_mm;
    let page = Rect::new(0.0, 0.0, page_w, page_h);
    let border = Rect::new(margin / 2.0, margin / 2.0, page_w - margin, page_h - margin);
    let content_top = page_h - margin;

    let title_block = TitleBlockLayout {
        rect: Rect::new(
            margin,
            margin,
            page_w - 2.0 * margin,
            template.title_block_height_mm,
        ),
        dividers: [0.0; 2],
    };
    let tb = title_block.rect;
    let title_block = TitleBlockLayout {
        dividers: TITLE_BLOCK_DIVIDERS.map(|ratio| tb.left() + tb.width() * ratio),
        ..title_block
    };

    let region_bottom = tb.top() + template.region_gap_mm;
    let drawing_region = Rect::new(
        margin,
        region_bottom,
        page_w * template.drawing_width_ratio,
        content_top - region_bottom,
    );
    let pad = template.inner_padding_mm;
    let usable = Rect::new(
        drawing_region.x() + pad,
        drawing_region.y() + pad,
        drawing_region.width() - 4.0 * pad,
        drawing_region.height() - 4.0 * pad,
    );
    if usable.is_degenerate() {
        return Err(EngineError::InvalidTemplate(format!(
            "usable drawing area {:.1}x{:.1} mm",
            usable.width(),
            usable.height()
        )));
    }

    let site_spec = &form.site;
    let site_mm_per_m = (usable.width() / site_spec.width_m).min(usable.height() / site_spec.length_m);
    let site_w = site_spec.width_m * site_mm_per_m;
    let site_h = site_spec.length_m * site_mm_per_m;
    let site = Rect::new(
        usable.x() + (usable.width() - site_w) / 2.0,
        usable.y() + (usable.height() - site_h) / 2.0,
        site_w,
        site_h,
    );

    let nominal = template.nominal_mm_per_m();
    let label_offset = template.road_label_offset_m * nominal;
    let label_area = drawing_region.inset(ROAD_LABEL_INSET_MM);
    let mut roads = Vec::new();
    for (side, road) in form.roads.iter() {
        if !road.present {
            continue;
        }
        if road.width_m <= 0.0 {
            warn!(%side, "道路宽度为 0，忽略该侧道路带");
            continue;
        }
        roads.push(road_band(&site, side, road.width_m, nominal, label_offset, &label_area));
    }

    // 标题固定在场地上方，但不超出图纸内容区。
    let site_title_anchor = Point2::new(
        site.center().x(),
        (site.top() + template.site_title_offset_mm).min(content_top),
    );

    let info_x = drawing_region.right() + template.column_gap_mm;
    let column_right = page_w - margin;

    let key_plan = Rect::new(
        info_x,
        content_top - CAPTION_ROOM_MM - KEY_PLAN_SIZE_MM.1,
        KEY_PLAN_SIZE_MM.0,
        KEY_PLAN_SIZE_MM.1,
    );
    let north_arrow = NorthArrow {
        tail: Point2::new(key_plan.right() - 8.0, key_plan.top() - 18.0),
        shaft_length_mm: 6.0,
        head_length_mm: 4.0,
        head_width_mm: 3.0,
        label_anchor: Point2::new(key_plan.right() - 8.0, key_plan.top() - 6.0),
    };

    let sketch = Rect::new(
        info_x,
        key_plan.bottom() - PANEL_GAP_MM - SKETCH_SIZE_MM.1,
        SKETCH_SIZE_MM.0,
        SKETCH_SIZE_MM.1,
    );

    let column_widths = LAND_USE_COLUMNS_MM.to_vec();
    let table_width: f64 = column_widths.iter().sum();
    let heading_y = sketch.bottom() - PANEL_GAP_MM;
    let land_use = TableLayout {
        heading_anchor: Point2::new(info_x + table_width / 2.0, heading_y),
        top_left: Point2::new(info_x, heading_y - TABLE_HEADING_GAP_MM),
        column_widths,
        row_height: LAND_USE_ROW_HEIGHT_MM,
        rows: LAND_USE_ROWS,
    };

    let conditions_top = land_use.bounds().bottom() - CONDITIONS_GAP_MM;
    let conditions_area = Rect::new(
        info_x,
        drawing_region.bottom(),
        column_right - info_x,
        conditions_top - drawing_region.bottom(),
    );
    let conditions = conditions_layout(conditions_area);

    let layout = SheetLayout {
        page,
        border,
        scale: template.scale,
        nominal_mm_per_m: nominal,
        site_mm_per_m,
        drawing_region,
        usable,
        site,
        roads,
        site_title_anchor,
        key_plan,
        north_arrow,
        sketch,
        land_use,
        conditions,
        title_block,
    };

    debug!(
        site_mm_per_m,
        nominal_mm_per_m = nominal,
        road_bands = layout.roads.len(),
        "布局计算完成"
    );
    Ok(layout)
}

/// 道路带按名义比例绘制，可能伸出绘图区；标注锚点始终收在 `label_area` 内。
fn road_band(
    site: &Rect,
    side: Side,
    width_m: f64,
    nominal: f64,
    label_offset: f64,
    label_area: &Rect,
) -> RoadBand {
    let thickness = width_m * nominal;
    let rect = match side {
        Side::North => Rect::new(site.left(), site.top(), site.width(), thickness),
        Side::South => Rect::new(site.left(), site.bottom() - thickness, site.width(), thickness),
        Side::East => Rect::new(site.right(), site.bottom(), thickness, site.height()),
        Side::West => Rect::new(site.left() - thickness, site.bottom(), thickness, site.height()),
    };
    let center = rect.center();
    let push = thickness / 2.0 + label_offset;
    let label_anchor = match side {
        Side::North => Point2::new(center.x(), center.y() + push),
        Side::South => Point2::new(center.x(), center.y() - push),
        Side::East => Point2::new(center.x() + push, center.y()),
        Side::West => Point2::new(center.x() - push, center.y()),
    };
    let label_anchor = Point2::new(
        label_anchor.x().clamp(label_area.left(), label_area.right()),
        label_anchor.y().clamp(label_area.bottom(), label_area.top()),
    );
    RoadBand {
        side,
        width_m,
        rect,
        label_anchor,
        label_rotation_deg: if side.is_east_west() { 90.0 } else { 0.0 },
    }
}

fn conditions_layout(area: Rect) -> ConditionsLayout {
    let count = CONDITION_COLUMNS as f64;
    let column_width = (area.width() - CONDITION_GUTTER_MM * (count - 1.0)) / count;
    let flow_height = (area.height() - CONDITIONS_HEADING_BAND_MM).max(0.0);
    let columns = (0..CONDITION_COLUMNS)
        .map(|index| {
            Rect::new(
                area.x() + index as f64 * (column_width + CONDITION_GUTTER_MM),
                area.y(),
                column_width,
                flow_height,
            )
        })
        .collect();
    ConditionsLayout {
        area,
        heading_anchor: Point2::new(area.x(), area.top()),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use siteplan_core::site::{Road, RoadSpec, SiteSpec};

    fn form(length: f64, width: f64) -> SheetForm {
        SheetForm::new(
            SiteSpec {
                survey_no: "42".to_string(),
                length_m: length,
                width_m: width,
                ..SiteSpec::default()
            },
            RoadSpec::default(),
        )
    }

    #[test]
    fn default_template_regions() {
        let layout = compute_layout(&form(15.0, 12.0), &SheetTemplate::default()).expect("layout");
        assert_eq!(layout.border, Rect::new(6.0, 6.0, 408.0, 285.0));
        assert_eq!(layout.title_block.rect, Rect::new(12.0, 12.0, 396.0, 35.0));
        assert!((layout.title_block.dividers[0] - 202.08).abs() < 1e-9);
        assert!((layout.title_block.dividers[1] - 289.2).abs() < 1e-9);
        assert!((layout.drawing_region.width() - 260.4).abs() < 1e-9);
        assert_eq!(layout.drawing_region.bottom(), 51.0);
        assert_eq!(layout.drawing_region.top(), 285.0);
        assert!((layout.usable.width() - 244.4).abs() < 1e-9);
        assert_eq!(layout.usable.height(), 218.0);
        assert!((layout.key_plan.x() - 287.4).abs() < 1e-9);
        assert_eq!(layout.nominal_mm_per_m, 10.0);
    }

    #[test]
    fn right_column_panels_do_not_overlap() {
        let layout = compute_layout(&form(15.0, 12.0), &SheetTemplate::default()).expect("layout");
        let table = layout.land_use.bounds();
        assert!(layout.sketch.top() < layout.key_plan.bottom());
        assert!(table.top() < layout.sketch.bottom());
        assert!(layout.conditions.area.top() < table.bottom());
        assert!(layout.conditions.area.bottom() > layout.title_block.rect.top());
        assert!(layout.key_plan.top() <= layout.border.top());
        assert!(table.right() <= layout.border.right());
        assert_eq!(layout.conditions.columns.len(), CONDITION_COLUMNS);
        for pair in layout.conditions.columns.windows(2) {
            assert!(pair[0].right() < pair[1].left());
        }
        assert!(layout.north_arrow.tip().y() < layout.north_arrow.label_anchor.y());
        assert!(layout.key_plan.contains_rect(
            &Rect::new(layout.north_arrow.tail.x(), layout.north_arrow.tail.y(), 0.0, 12.0),
            0.0
        ));
    }

    #[test]
    fn road_bands_use_nominal_scale() {
        let mut sheet = form(15.0, 12.0);
        sheet.roads.set(Side::North, Road::new(true, 6.0));
        sheet.roads.set(Side::East, Road::new(true, 9.0));
        sheet.roads.set(Side::West, Road::new(false, 12.0));
        let layout = compute_layout(&sheet, &SheetTemplate::default()).expect("layout");

        assert_eq!(layout.roads.len(), 2);
        let north = layout.road(Side::North).expect("north band");
        assert_eq!(north.rect.height(), 60.0);
        assert_eq!(north.rect.width(), layout.site.width());
        assert_eq!(north.rect.bottom(), layout.site.top());
        assert_eq!(north.label_rotation_deg, 0.0);
        // 场地已顶满可用区，标注收回到绘图区顶边以内。
        assert!((north.label_anchor.y() - (layout.drawing_region.top() - 4.0)).abs() < 1e-9);

        let east = layout.road(Side::East).expect("east band");
        assert_eq!(east.rect.width(), 90.0);
        assert_eq!(east.rect.left(), layout.site.right());
        assert_eq!(east.rect.height(), layout.site.height());
        assert_eq!(east.label_rotation_deg, 90.0);
        assert!((east.label_anchor.x() - (layout.drawing_region.right() - 4.0)).abs() < 1e-9);
        assert_eq!(east.label_anchor.y(), east.rect.center().y());

        assert!(layout.road(Side::West).is_none());
    }

    #[test]
    fn road_label_keeps_offset_when_there_is_room() {
        let mut sheet = form(5.0, 40.0);
        sheet.roads.set(Side::North, Road::new(true, 6.0));
        let layout = compute_layout(&sheet, &SheetTemplate::default()).expect("layout");
        let north = layout.road(Side::North).expect("north band");
        assert!((north.label_anchor.y() - (layout.site.top() + 60.0 + 30.0)).abs() < 1e-9);
        assert!(north.label_anchor.y() < layout.drawing_region.top());
    }

    #[test]
    fn road_labels_stay_inside_drawing_region() {
        let mut sheet = form(15.0, 12.0);
        for side in Side::ALL {
            sheet.roads.set(side, Road::new(true, 12.0));
        }
        let layout = compute_layout(&sheet, &SheetTemplate::default()).expect("layout");
        assert_eq!(layout.roads.len(), 4);
        for band in &layout.roads {
            let anchor = Rect::new(band.label_anchor.x(), band.label_anchor.y(), 0.0, 0.0);
            assert!(layout.drawing_region.contains_rect(&anchor, 0.0), "{:?}", band.side);
            assert_eq!(band.rect.height().min(band.rect.width()), 120.0);
        }
    }

    #[test]
    fn zero_width_present_road_is_suppressed() {
        let mut sheet = form(15.0, 12.0);
        sheet.roads.set(Side::South, Road::new(true, 0.0));
        let layout = compute_layout(&sheet, &SheetTemplate::default()).expect("layout");
        assert!(layout.roads.is_empty());
    }

    #[test]
    fn scale_changes_band_thickness_only() {
        let mut sheet = form(15.0, 12.0);
        sheet.roads.set(Side::South, Road::new(true, 6.0));
        let at_100 = compute_layout(&sheet, &SheetTemplate::default()).expect("layout");
        let at_200 = compute_layout(&sheet, &SheetTemplate::with_scale(200.0)).expect("layout");
        assert_eq!(at_100.site, at_200.site);
        assert_eq!(at_200.road(Side::South).expect("band").rect.height(), 30.0);
    }

    #[test]
    fn invalid_inputs_stop_before_layout() {
        assert!(matches!(
            compute_layout(&form(0.0, 12.0), &SheetTemplate::default()),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            compute_layout(&form(15.0, 12.0), &SheetTemplate::with_scale(0.0)),
            Err(EngineError::InvalidScale(_))
        ));
    }

    #[test]
    fn site_title_stays_on_page() {
        let layout = compute_layout(&form(15.0, 12.0), &SheetTemplate::default()).expect("layout");
        assert!(layout.site_title_anchor.y() <= 285.0);
        let wide = compute_layout(&form(5.0, 40.0), &SheetTemplate::default()).expect("layout");
        assert!((wide.site_title_anchor.y() - (wide.site.top() + 30.0)).abs() < 1e-9);
    }

    #[test]
    fn table_cells_tile_the_grid() {
        let layout = compute_layout(&form(15.0, 12.0), &SheetTemplate::default()).expect("layout");
        let table = &layout.land_use;
        assert_eq!(table.width(), 117.0);
        let first = table.cell(0, 0);
        assert_eq!(first.top(), table.top_left.y());
        let last = table.cell(2, 3);
        assert!((last.right() - table.bounds().right()).abs() < 1e-9);
        assert!((last.bottom() - table.bounds().bottom()).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn site_fits_usable_and_keeps_aspect(length in 0.5f64..500.0, width in 0.5f64..500.0) {
            let layout = compute_layout(&form(length, width), &SheetTemplate::default()).unwrap();
            prop_assert!(layout.usable.contains_rect(&layout.site, 1e-6));
            let drawn = layout.site.width() / layout.site.height();
            prop_assert!((drawn - width / length).abs() <= 1e-9 * drawn.max(1.0));
            // 至少一个方向贴满可用区域。
            let fills_w = (layout.site.width() - layout.usable.width()).abs() < 1e-6;
            let fills_h = (layout.site.height() - layout.usable.height()).abs() < 1e-6;
            prop_assert!(fills_w || fills_h);
        }

        #[test]
        fn layout_is_idempotent(
            length in 0.5f64..200.0,
            width in 0.5f64..200.0,
            north in 0.0f64..30.0,
            east in 0.0f64..30.0,
        ) {
            let mut sheet = form(length, width);
            sheet.roads.set(Side::North, Road::new(true, north));
            sheet.roads.set(Side::East, Road::new(true, east));
            let template = SheetTemplate::default();
            let first = compute_layout(&sheet, &template).unwrap();
            let second = compute_layout(&sheet, &template).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
