use std::fmt::Write as _;
use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use siteplan_core::canvas::{DrawingCanvas, Primitive, TextItem};
use siteplan_core::geometry::{MM_PER_PT, Point2, Rect, hatch_segments};
use siteplan_core::style::{Color, FontFace, HatchPattern, Style};

use crate::{ExportError, SheetExporter, check_page};

/// 预览用 SVG 导出。viewBox 以毫米为单位，y 轴翻转为向下。
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgExporter;

impl SvgExporter {
    pub fn new() -> Self {
        Self
    }
}

impl SheetExporter for SvgExporter {
    fn export(&self, canvas: &DrawingCanvas) -> Result<Vec<u8>, ExportError> {
        check_page(canvas)?;
        let mut writer = SvgWriter::new(canvas.width_mm(), canvas.height_mm());
        let mut current_layer: Option<&str> = None;
        for (layer, primitive) in canvas.items() {
            if current_layer != Some(layer) {
                if current_layer.is_some() {
                    writer.close_group();
                }
                writer.open_group(layer);
                current_layer = Some(layer);
            }
            match primitive {
                Primitive::Rect { rect, style } => writer.rect(rect, style),
                Primitive::Polyline {
                    points,
                    closed,
                    style,
                } => writer.polyline(points, *closed, style),
                Primitive::Text(text) => writer.text(text),
                Primitive::Image(item) => {
                    if item.image.width() == 0 || item.image.height() == 0 {
                        return Err(ExportError::EmptyImage {
                            layer: layer.to_string(),
                        });
                    }
                    writer.image(&item.rect, &item.image)?;
                }
            }
        }
        if current_layer.is_some() {
            writer.close_group();
        }
        Ok(writer.finish().into_bytes())
    }

    fn extension(&self) -> &'static str {
        "svg"
    }
}

struct SvgWriter {
    out: String,
    height: f64,
}

impl SvgWriter {
    fn new(width: f64, height: f64) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}mm" height="{height}mm" viewBox="0 0 {width} {height}">"#
        );
        let _ = writeln!(
            out,
            r#"<rect x="0" y="0" width="{width}" height="{height}" fill="white"/>"#
        );
        Self { out, height }
    }

    #[inline]
    fn flip(&self, point: Point2) -> (f64, f64) {
        (point.x(), self.height - point.y())
    }

    fn open_group(&mut self, layer: &str) {
        let _ = writeln!(self.out, r#"<g id="{}">"#, escape(layer));
    }

    fn close_group(&mut self) {
        let _ = writeln!(self.out, "</g>");
    }

    fn rect(&mut self, rect: &Rect, style: &Style) {
        let (x, y) = (rect.x(), self.height - rect.top());
        if let Some(fill) = style.fill_color {
            let _ = writeln!(
                self.out,
                r#"<rect x="{x:.3}" y="{y:.3}" width="{:.3}" height="{:.3}" fill="{}" stroke="none"/>"#,
                rect.width(),
                rect.height(),
                fill.to_hex()
            );
        }
        if let Some(HatchPattern::ForwardDiagonal {
            spacing_mm,
            line_width,
        }) = style.hatch_pattern
        {
            let color = style.stroke_color.unwrap_or(Color::BLACK).to_hex();
            for (start, end) in hatch_segments(rect, spacing_mm) {
                let (x1, y1) = self.flip(start);
                let (x2, y2) = self.flip(end);
                let _ = writeln!(
                    self.out,
                    r#"<line x1="{x1:.3}" y1="{y1:.3}" x2="{x2:.3}" y2="{y2:.3}" stroke="{color}" stroke-width="{:.3}"/>"#,
                    line_width * MM_PER_PT
                );
            }
        }
        if style.stroke_color.is_some() {
            let _ = writeln!(
                self.out,
                r#"<rect x="{x:.3}" y="{y:.3}" width="{:.3}" height="{:.3}" fill="none"{}/>"#,
                rect.width(),
                rect.height(),
                stroke_attributes(style)
            );
        }
    }

    fn polyline(&mut self, points: &[Point2], closed: bool, style: &Style) {
        if points.is_empty() {
            return;
        }
        let coords = points
            .iter()
            .map(|point| {
                let (x, y) = self.flip(*point);
                format!("{x:.3},{y:.3}")
            })
            .collect::<Vec<_>>()
            .join(" ");
        let tag = if closed { "polygon" } else { "polyline" };
        let fill = match style.fill_color {
            Some(color) if closed => color.to_hex(),
            _ => "none".to_string(),
        };
        let _ = writeln!(
            self.out,
            r#"<{tag} points="{coords}" fill="{fill}"{}/>"#,
            stroke_attributes(style)
        );
    }

    fn text(&mut self, text: &TextItem) {
        if text.content.is_empty() {
            return;
        }
        let (x, y) = self.flip(text.baseline_origin());
        let size_mm = text.style.font_size * MM_PER_PT;
        let face = match text.style.font {
            FontFace::Regular => "",
            FontFace::Bold => r#" font-weight="bold""#,
            FontFace::Italic => r#" font-style="italic""#,
        };
        let transform = if text.rotation_deg.abs() > f64::EPSILON {
            format!(
                r#" transform="rotate({:.3} {x:.3} {y:.3})""#,
                -text.rotation_deg
            )
        } else {
            String::new()
        };
        let _ = writeln!(
            self.out,
            r#"<text x="{x:.3}" y="{y:.3}" font-family="Helvetica, Arial, sans-serif" font-size="{size_mm:.3}" fill="{}"{face}{transform}>{}</text>"#,
            text.style.text_color.to_hex(),
            escape(&text.content)
        );
    }

    fn image(&mut self, rect: &Rect, image: &RgbaImage) -> Result<(), ExportError> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|source| ExportError::Image { source })?;
        let encoded = STANDARD.encode(png.into_inner());
        let _ = writeln!(
            self.out,
            r#"<image x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" preserveAspectRatio="none" href="data:image/png;base64,{encoded}"/>"#,
            rect.x(),
            self.height - rect.top(),
            rect.width(),
            rect.height()
        );
        Ok(())
    }

    fn finish(mut self) -> String {
        let _ = writeln!(self.out, "</svg>");
        self.out
    }
}

fn stroke_attributes(style: &Style) -> String {
    let Some(color) = style.stroke_color else {
        return r#" stroke="none""#.to_string();
    };
    let mut attrs = format!(
        r#" stroke="{}" stroke-width="{:.3}""#,
        color.to_hex(),
        style.line_width * MM_PER_PT
    );
    if let Some(pattern) = &style.dash_pattern {
        let dashes = pattern
            .iter()
            .map(|pt| format!("{:.3}", pt * MM_PER_PT))
            .collect::<Vec<_>>()
            .join(",");
        let _ = write!(attrs, r#" stroke-dasharray="{dashes}""#);
    }
    attrs
}

fn escape(content: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    for ch in content.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
