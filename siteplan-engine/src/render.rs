use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbaImage};
use siteplan_core::canvas::DrawingCanvas;
use siteplan_core::geometry::{Point2, Rect};
use siteplan_core::keyplan::MosaicOutcome;
use siteplan_core::site::SheetForm;
use siteplan_core::style::{Color, FontFace, HAlign, HatchPattern, Style, VAlign};
use tracing::{debug, warn};

use crate::conditions::{self, CONDITIONS_HEADING};
use crate::layout::{SheetLayout, TableLayout};

/// 嵌入位图的像素密度（像素/毫米）。
pub const PANEL_PX_PER_MM: f64 = 5.0;

pub const DEFAULT_PREPARED_BY: &str = "Prepared by Anantha (Ankusha Project)";

pub const KEY_PLAN_CAPTION: &str = "KEY PLAN (NOT TO SCALE)";
pub const KEY_PLAN_PLACEHOLDER: &str = "KEY PLAN (To be inserted here)";
pub const KEY_PLAN_ERROR: &str = "Key Plan (Error loading map)";
pub const SKETCH_CAPTION: &str =
    "ADLR SKETCH SHOWING THE LOCATION OF THE PROPOSED SITE WITHIN THE SURVEY NUMBER";
pub const SKETCH_PLACEHOLDER: &str = "ADLR SKETCH (To be inserted here)";
pub const LAND_USE_HEADING: &str = "LAND USE ANALYSIS";
pub const LAND_USE_HEADERS: [&str; 4] = ["SL.No", "PARTICULARS", "AREA (Sq.m)", "%"];
pub const DRAWING_TITLE: &str = "DRAWING TITLE : SINGLE SITE LAYOUT PLAN";
pub const DIMENSION_NOTE: &str = "All Dimensions in metres.";

/// 画布图层名。
pub mod layers {
    pub const BORDER: &str = "BORDER";
    pub const SITE: &str = "SITE";
    pub const ROADS: &str = "ROADS";
    pub const ANNOTATION: &str = "ANNOTATION";
    pub const KEY_PLAN: &str = "KEY_PLAN";
    pub const NORTH_ARROW: &str = "NORTH_ARROW";
    pub const SKETCH: &str = "SKETCH";
    pub const LAND_USE: &str = "LAND_USE";
    pub const CONDITIONS: &str = "CONDITIONS";
    pub const TITLE_BLOCK: &str = "TITLE_BLOCK";
}

const F_TITLE: f64 = 9.5;
const F_LABEL: f64 = 8.5;
const F_BODY: f64 = 6.5;
const F_COND: f64 = 4.5;
const F_CONDITIONS: f64 = 4.0;

/// 图纸上所有具名样式。
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheet {
    pub border: Style,
    pub site_outline: Style,
    pub road_band: Style,
    pub road_label: Style,
    pub site_title: Style,
    pub panel_box: Style,
    pub panel_caption: Style,
    pub sketch_caption: Style,
    pub placeholder: Style,
    pub error_caption: Style,
    pub north_arrow: Style,
    pub north_label: Style,
    pub table_heading: Style,
    pub table_header: Style,
    pub table_cell: Style,
    pub table_rule: Style,
    pub conditions_heading: Style,
    pub conditions_body: Style,
    pub note_heading: Style,
    pub note_body: Style,
    pub title_heading: Style,
    pub title_field: Style,
    pub dimension_note: Style,
    pub footer: Style,
}

impl Default for StyleSheet {
    fn default() -> Self {
        const SITE_LINE_WIDTH: f64 = 0.6;
        let site_dash = [16.0, 5.0, 4.0, 5.0, 4.0, 5.0]
            .iter()
            .map(|segment| segment * SITE_LINE_WIDTH)
            .collect();

        Self {
            border: Style::stroke(0.25),
            site_outline: Style::stroke(SITE_LINE_WIDTH).dashed(site_dash),
            road_band: Style::stroke(0.4)
                .filled(Color::ROAD_FILL)
                .hatched(HatchPattern::ForwardDiagonal {
                    spacing_mm: 1.5,
                    line_width: 0.2,
                }),
            road_label: Style::text(F_BODY).aligned(HAlign::Center, VAlign::Center),
            site_title: Style::text(F_TITLE)
                .bold()
                .aligned(HAlign::Center, VAlign::Bottom),
            panel_box: Style::stroke(0.25),
            panel_caption: Style::text(F_LABEL)
                .bold()
                .aligned(HAlign::Center, VAlign::Bottom),
            sketch_caption: Style::text(F_COND)
                .bold()
                .aligned(HAlign::Center, VAlign::Bottom),
            placeholder: Style::text(F_BODY)
                .italic()
                .colored(Color::GRAY)
                .aligned(HAlign::Center, VAlign::Center),
            error_caption: Style::text(F_BODY)
                .italic()
                .colored(Color::RED)
                .aligned(HAlign::Center, VAlign::Center),
            north_arrow: Style::stroke(0.6).filled(Color::BLACK),
            north_label: Style::text(F_LABEL)
                .bold()
                .aligned(HAlign::Center, VAlign::Bottom),
            table_heading: Style::text(F_LABEL)
                .bold()
                .aligned(HAlign::Center, VAlign::Bottom),
            table_header: Style::text(F_COND)
                .bold()
                .aligned(HAlign::Center, VAlign::Center),
            table_cell: Style::text(F_COND).aligned(HAlign::Center, VAlign::Center),
            table_rule: Style::stroke(0.25),
            conditions_heading: Style::text(F_COND)
                .bold()
                .aligned(HAlign::Left, VAlign::Top),
            conditions_body: Style::text(F_CONDITIONS).aligned(HAlign::Left, VAlign::Top),
            note_heading: Style::text(F_BODY)
                .bold()
                .aligned(HAlign::Left, VAlign::Top),
            note_body: Style::text(F_COND).aligned(HAlign::Left, VAlign::Top),
            title_heading: Style::text(F_LABEL).bold(),
            title_field: Style::text(F_COND),
            dimension_note: Style::text(F_COND).aligned(HAlign::Right, VAlign::Baseline),
            footer: Style::text(F_COND)
                .italic()
                .aligned(HAlign::Right, VAlign::Baseline),
        }
    }
}

/// 将布局结果与表单文字绘制到画布。除修改画布外没有副作用。
#[derive(Debug, Clone)]
pub struct SheetRenderer {
    styles: StyleSheet,
    prepared_by: String,
}

impl Default for SheetRenderer {
    fn default() -> Self {
        Self::new(StyleSheet::default(), DEFAULT_PREPARED_BY)
    }
}

impl SheetRenderer {
    pub fn new(styles: StyleSheet, prepared_by: impl Into<String>) -> Self {
        Self {
            styles,
            prepared_by: prepared_by.into(),
        }
    }

    #[inline]
    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn render(
        &self,
        form: &SheetForm,
        layout: &SheetLayout,
        key_plan: Option<&MosaicOutcome>,
        sketch: Option<&DynamicImage>,
    ) -> DrawingCanvas {
        let mut canvas = DrawingCanvas::new(layout.page.width(), layout.page.height());
        let styles = &self.styles;

        canvas.add_rect(layers::BORDER, layout.border, styles.border.clone());
        canvas.add_rect(layers::SITE, layout.site, styles.site_outline.clone());

        for band in &layout.roads {
            canvas.add_rect(layers::ROADS, band.rect, styles.road_band.clone());
            canvas.add_text(
                layers::ROADS,
                band.label_anchor,
                format!("{} ({:.1} m ROAD)", band.side.title(), band.width_m),
                band.label_rotation_deg,
                styles.road_label.clone(),
            );
        }

        canvas.add_text(
            layers::ANNOTATION,
            layout.site_title_anchor,
            format!("SITE (SY.NO. {})", form.site.survey_no.trim()),
            0.0,
            styles.site_title.clone(),
        );

        self.draw_key_plan(&mut canvas, layout, key_plan);
        self.draw_north_arrow(&mut canvas, layout);
        self.draw_sketch(&mut canvas, layout, sketch);
        self.draw_land_use(&mut canvas, &layout.land_use, form.site_area_sqm());
        self.draw_conditions(&mut canvas, layout);
        self.draw_title_block(&mut canvas, layout, form);

        debug!(
            primitives = canvas.len(),
            road_bands = layout.roads.len(),
            key_plan = key_plan.is_some(),
            sketch = sketch.is_some(),
            "图纸绘制完成"
        );
        canvas
    }

    fn draw_panel(&self, canvas: &mut DrawingCanvas, layer: &str, rect: Rect, caption: &str, style: &Style) {
        canvas.add_rect(layer, rect, self.styles.panel_box.clone());
        canvas.add_text(
            layer,
            Point2::new(rect.center().x(), rect.top() + 4.0),
            caption,
            0.0,
            style.clone(),
        );
    }

    fn draw_key_plan(&self, canvas: &mut DrawingCanvas, layout: &SheetLayout, key_plan: Option<&MosaicOutcome>) {
        let rect = layout.key_plan;
        self.draw_panel(canvas, layers::KEY_PLAN, rect, KEY_PLAN_CAPTION, &self.styles.panel_caption);
        match key_plan {
            None => canvas.add_text(
                layers::KEY_PLAN,
                rect.center(),
                KEY_PLAN_PLACEHOLDER,
                0.0,
                self.styles.placeholder.clone(),
            ),
            Some(MosaicOutcome::Ready(image)) if image.width() > 0 && image.height() > 0 => {
                let width = (rect.width() * PANEL_PX_PER_MM) as u32;
                let height = (rect.height() * PANEL_PX_PER_MM) as u32;
                let resized = imageops::resize(image, width, height, FilterType::Lanczos3);
                canvas.add_image(layers::KEY_PLAN, rect.inset(1.0), resized);
            }
            Some(MosaicOutcome::Ready(_)) => {
                warn!("关键位置图为空图像");
                self.key_plan_error(canvas, rect);
            }
            Some(MosaicOutcome::Failed { reason }) => {
                debug!(%reason, "关键位置图显示错误提示");
                self.key_plan_error(canvas, rect);
            }
        }
    }

    fn key_plan_error(&self, canvas: &mut DrawingCanvas, rect: Rect) {
        canvas.add_text(
            layers::KEY_PLAN,
            rect.center(),
            KEY_PLAN_ERROR,
            0.0,
            self.styles.error_caption.clone(),
        );
    }

    fn draw_north_arrow(&self, canvas: &mut DrawingCanvas, layout: &SheetLayout) {
        let arrow = &layout.north_arrow;
        let base = arrow.head_base();
        let half = arrow.head_width_mm / 2.0;
        canvas.add_line(
            layers::NORTH_ARROW,
            arrow.tail,
            base,
            self.styles.north_arrow.clone().no_fill(),
        );
        canvas.add_polygon(
            layers::NORTH_ARROW,
            [
                Point2::new(base.x() - half, base.y()),
                Point2::new(base.x() + half, base.y()),
                arrow.tip(),
            ],
            self.styles.north_arrow.clone(),
        );
        canvas.add_text(
            layers::NORTH_ARROW,
            arrow.label_anchor,
            "N",
            0.0,
            self.styles.north_label.clone(),
        );
    }

    fn draw_sketch(&self, canvas: &mut DrawingCanvas, layout: &SheetLayout, sketch: Option<&DynamicImage>) {
        let rect = layout.sketch;
        self.draw_panel(canvas, layers::SKETCH, rect, SKETCH_CAPTION, &self.styles.sketch_caption);
        match sketch.and_then(|image| fit_sketch(image, rect)) {
            Some((placement, pixels)) => canvas.add_image(layers::SKETCH, placement, pixels),
            None => {
                if sketch.is_some() {
                    warn!("草图尺寸为 0，使用占位文字");
                }
                canvas.add_text(
                    layers::SKETCH,
                    rect.center(),
                    SKETCH_PLACEHOLDER,
                    0.0,
                    self.styles.placeholder.clone(),
                );
            }
        }
    }

    fn draw_land_use(&self, canvas: &mut DrawingCanvas, table: &TableLayout, area_sqm: f64) {
        let styles = &self.styles;
        canvas.add_text(
            layers::LAND_USE,
            table.heading_anchor,
            LAND_USE_HEADING,
            0.0,
            styles.table_heading.clone(),
        );

        let area = format!("{area_sqm:.1}");
        let rows: [[&str; 4]; 3] = [
            LAND_USE_HEADERS,
            ["1", "SITE AREA", &area, "100.00"],
            ["2", "TOTAL SITE AREA", &area, "100.00"],
        ];
        for (row_index, row) in rows.iter().enumerate().take(table.rows) {
            let style = if row_index == 0 {
                &styles.table_header
            } else {
                &styles.table_cell
            };
            for (column, value) in row.iter().enumerate() {
                let cell = table.cell(row_index, column);
                canvas.add_text(layers::LAND_USE, cell.center(), *value, 0.0, style.clone());
            }
        }

        let bounds = table.bounds();
        canvas.add_rect(layers::LAND_USE, bounds, styles.table_rule.clone());
        for row in 1..table.rows {
            let y = table.top_left.y() - table.row_height * row as f64;
            canvas.add_line(
                layers::LAND_USE,
                Point2::new(bounds.left(), y),
                Point2::new(bounds.right(), y),
                styles.table_rule.clone(),
            );
        }
        let mut x = bounds.left();
        for width in &table.column_widths[..table.column_widths.len().saturating_sub(1)] {
            x += width;
            canvas.add_line(
                layers::LAND_USE,
                Point2::new(x, bounds.bottom()),
                Point2::new(x, bounds.top()),
                styles.table_rule.clone(),
            );
        }
    }

    fn draw_conditions(&self, canvas: &mut DrawingCanvas, layout: &SheetLayout) {
        let styles = &self.styles;
        canvas.add_text(
            layers::CONDITIONS,
            layout.conditions.heading_anchor,
            CONDITIONS_HEADING,
            0.0,
            styles.conditions_heading.clone(),
        );

        let (lines, overflow) = conditions::flow_conditions(
            &layout.conditions.columns,
            styles.conditions_body.font_size,
            styles.note_heading.font_size,
            styles.note_body.font_size,
        );
        let mut in_notes = false;
        for line in lines {
            let style = match line.font {
                FontFace::Bold => {
                    in_notes = true;
                    &styles.note_heading
                }
                _ if in_notes => &styles.note_body,
                _ => &styles.conditions_body,
            };
            canvas.add_text(layers::CONDITIONS, line.anchor, line.content, 0.0, style.clone());
        }
        if !overflow.is_empty() {
            warn!(lines = overflow.len(), "审批条件超出栏位，末尾文字未绘制");
        }
    }

    fn draw_title_block(&self, canvas: &mut DrawingCanvas, layout: &SheetLayout, form: &SheetForm) {
        let styles = &self.styles;
        let block = &layout.title_block;
        let rect = block.rect;
        canvas.add_rect(layers::TITLE_BLOCK, rect, styles.border.clone());
        for x in block.dividers {
            canvas.add_line(
                layers::TITLE_BLOCK,
                Point2::new(x, rect.bottom()),
                Point2::new(x, rect.top()),
                styles.border.clone(),
            );
        }

        let site = &form.site;
        let [left, middle, right] = block.section_lefts().map(|x| x + 6.0);
        let row = |n: f64| rect.top() - 7.0 - 6.0 * n;
        let fields: [(f64, f64, String, &Style); 9] = [
            (left, row(0.0), DRAWING_TITLE.to_string(), &styles.title_heading),
            (left, row(1.0), format!("SCALE : 1:{}", format_scale(layout.scale)), &styles.title_field),
            (
                left,
                row(2.0),
                format!("TOTAL BUILT-UP AREA : {:.2} Sq.m", site.total_builtup_sqm),
                &styles.title_field,
            ),
            (left, row(3.0), format!("SY. NO. : {}", site.survey_no.trim()), &styles.title_field),
            (middle, row(0.0), format!("VILLAGE : {}", site.village.trim()), &styles.title_field),
            (middle, row(1.0), format!("TALUK : {}", site.taluk.trim()), &styles.title_field),
            (middle, row(2.0), format!("EPID : {}", site.epid.trim()), &styles.title_field),
            (right, row(0.0), format!("WARD NO. : {}", site.ward_no.trim()), &styles.title_field),
            (
                right,
                row(1.0),
                format!("CONSTITUENCY : {}", site.constituency.trim()),
                &styles.title_field,
            ),
        ];
        for (x, y, content, style) in fields {
            canvas.add_text(layers::TITLE_BLOCK, Point2::new(x, y), content, 0.0, style.clone());
        }

        canvas.add_text(
            layers::TITLE_BLOCK,
            Point2::new(rect.right() - 4.0, rect.bottom() + 3.0),
            DIMENSION_NOTE,
            0.0,
            styles.dimension_note.clone(),
        );
        canvas.add_text(
            layers::TITLE_BLOCK,
            Point2::new(rect.right() - 4.0, rect.bottom() - 5.0),
            self.prepared_by.as_str(),
            0.0,
            styles.footer.clone(),
        );
    }
}

/// 比例分母为整数时不带小数。
pub fn format_scale(scale: f64) -> String {
    if scale.fract() == 0.0 {
        format!("{scale:.0}")
    } else {
        format!("{scale}")
    }
}

/// 等比缩放草图并居中放入面板（四周留 1 mm）。像素不超过面板的 5 px/mm。
fn fit_sketch(image: &DynamicImage, panel: Rect) -> Option<(Rect, RgbaImage)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let max_w = (panel.width() * PANEL_PX_PER_MM) as u32;
    let max_h = (panel.height() * PANEL_PX_PER_MM) as u32;
    let pixels = if width > max_w || height > max_h {
        image.thumbnail(max_w, max_h).to_rgba8()
    } else {
        image.to_rgba8()
    };

    let inner = panel.inset(1.0);
    let (px_w, px_h) = (f64::from(pixels.width()), f64::from(pixels.height()));
    let mm_per_px = (inner.width() / px_w).min(inner.height() / px_h);
    let (w, h) = (px_w * mm_per_px, px_h * mm_per_px);
    let placement = Rect::new(
        inner.x() + (inner.width() - w) / 2.0,
        inner.y() + (inner.height() - h) / 2.0,
        w,
        h,
    );
    Some((placement, pixels))
}
