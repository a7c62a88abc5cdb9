use image::imageops::{self, FilterType};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat, dictionary};
use siteplan_core::canvas::{DrawingCanvas, ImageItem, Primitive, TextItem};
use siteplan_core::geometry::{MM_PER_INCH, MM_PER_PT, PT_PER_MM, Point2, Rect, hatch_segments};
use siteplan_core::style::{Color, FontFace, HatchPattern, Style};
use tracing::debug;

use crate::{ExportError, SheetExporter, check_page, flatten_on_white};

pub const DEFAULT_RASTER_DPI: f64 = 1200.0;

const FONTS: [(FontFace, &str, &str); 3] = [
    (FontFace::Regular, "F1", "Helvetica"),
    (FontFace::Bold, "F2", "Helvetica-Bold"),
    (FontFace::Italic, "F3", "Helvetica-Oblique"),
];

/// 单页 PDF 导出。页面尺寸取自画布（毫米换算为 pt），
/// 内容流通过一次 `cm` 变换直接使用毫米坐标。
#[derive(Debug, Clone)]
pub struct PdfExporter {
    raster_dpi: f64,
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self::new(DEFAULT_RASTER_DPI)
    }
}

impl PdfExporter {
    pub fn new(raster_dpi: f64) -> Self {
        let raster_dpi = if raster_dpi.is_finite() && raster_dpi > 0.0 {
            raster_dpi
        } else {
            DEFAULT_RASTER_DPI
        };
        Self { raster_dpi }
    }

    #[inline]
    pub fn raster_dpi(&self) -> f64 {
        self.raster_dpi
    }

    /// 超过目标分辨率的位图按比例降采样，其余原样嵌入。
    fn prepare_pixels(&self, item: &ImageItem) -> image::RgbaImage {
        let (width, height) = item.image.dimensions();
        let max_w = (item.rect.width() / MM_PER_INCH * self.raster_dpi).ceil().max(1.0) as u32;
        let max_h = (item.rect.height() / MM_PER_INCH * self.raster_dpi).ceil().max(1.0) as u32;
        if width <= max_w && height <= max_h {
            return item.image.clone();
        }
        let ratio = (f64::from(max_w) / f64::from(width)).min(f64::from(max_h) / f64::from(height));
        let target_w = ((f64::from(width) * ratio).round() as u32).max(1);
        let target_h = ((f64::from(height) * ratio).round() as u32).max(1);
        debug!(width, height, target_w, target_h, "位图超过目标分辨率，降采样");
        imageops::resize(&item.image, target_w, target_h, FilterType::Lanczos3)
    }
}

impl SheetExporter for PdfExporter {
    fn export(&self, canvas: &DrawingCanvas) -> Result<Vec<u8>, ExportError> {
        check_page(canvas)?;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = Dictionary::new();
        for (_, resource, base_font) in FONTS {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base_font,
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(resource, Object::Reference(font_id));
        }

        let mut operations = vec![Operation::new(
            "cm",
            vec![
                real(PT_PER_MM),
                real(0.0),
                real(0.0),
                real(PT_PER_MM),
                real(0.0),
                real(0.0),
            ],
        )];
        let mut xobjects = Dictionary::new();

        for (layer, primitive) in canvas.items() {
            match primitive {
                Primitive::Rect { rect, style } => {
                    rect_operations(&mut operations, rect, style);
                }
                Primitive::Polyline {
                    points,
                    closed,
                    style,
                } => polyline_operations(&mut operations, points, *closed, style),
                Primitive::Text(text) => text_operations(&mut operations, text),
                Primitive::Image(item) => {
                    if item.image.width() == 0 || item.image.height() == 0 {
                        return Err(ExportError::EmptyImage {
                            layer: layer.to_string(),
                        });
                    }
                    let pixels = self.prepare_pixels(item);
                    let stream = Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => i64::from(pixels.width()),
                            "Height" => i64::from(pixels.height()),
                            "ColorSpace" => "DeviceRGB",
                            "BitsPerComponent" => 8,
                        },
                        flatten_on_white(&pixels),
                    );
                    let image_id = doc.add_object(stream);
                    let name = format!("Im{}", xobjects.len() + 1);
                    xobjects.set(name.as_str(), Object::Reference(image_id));
                    image_operations(&mut operations, &item.rect, &name);
                }
            }
        }

        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|err| ExportError::Encode(err.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                real(0.0),
                real(0.0),
                real(canvas.width_mm() * PT_PER_MM),
                real(canvas.height_mm() * PT_PER_MM),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => fonts,
                "XObject" => xobjects,
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(b"Single Site Layout Plan".to_vec(), StringFormat::Literal),
            "Producer" => Object::String(b"siteplan".to_vec(), StringFormat::Literal),
        });
        doc.trailer.set("Info", Object::Reference(info_id));

        doc.compress();
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|err| ExportError::Serialize(err.to_string()))?;
        debug!(
            bytes = buffer.len(),
            primitives = canvas.len(),
            "PDF 序列化完成"
        );
        Ok(buffer)
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }
}

#[inline]
fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn color_operands(color: Color) -> Vec<Object> {
    color.unit_rgb().into_iter().map(real).collect()
}

/// 线宽与虚线段长以 pt 给出，内容流坐标为毫米。
fn stroke_state(operations: &mut Vec<Operation>, style: &Style, color: Color) {
    operations.push(Operation::new("w", vec![real(style.line_width * MM_PER_PT)]));
    operations.push(Operation::new("RG", color_operands(color)));
    if let Some(pattern) = &style.dash_pattern {
        let dashes = pattern.iter().map(|pt| real(pt * MM_PER_PT)).collect();
        operations.push(Operation::new("d", vec![Object::Array(dashes), real(0.0)]));
    }
}

fn rect_operand(rect: &Rect) -> Vec<Object> {
    vec![
        real(rect.x()),
        real(rect.y()),
        real(rect.width()),
        real(rect.height()),
    ]
}

fn rect_operations(operations: &mut Vec<Operation>, rect: &Rect, style: &Style) {
    operations.push(Operation::new("q", vec![]));
    if let Some(fill) = style.fill_color {
        operations.push(Operation::new("rg", color_operands(fill)));
        operations.push(Operation::new("re", rect_operand(rect)));
        operations.push(Operation::new("f", vec![]));
    }
    if let Some(HatchPattern::ForwardDiagonal {
        spacing_mm,
        line_width,
    }) = style.hatch_pattern
    {
        let hatch_color = style.stroke_color.unwrap_or(Color::BLACK);
        operations.push(Operation::new("w", vec![real(line_width * MM_PER_PT)]));
        operations.push(Operation::new("RG", color_operands(hatch_color)));
        for (start, end) in hatch_segments(rect, spacing_mm) {
            operations.push(Operation::new("m", vec![real(start.x()), real(start.y())]));
            operations.push(Operation::new("l", vec![real(end.x()), real(end.y())]));
        }
        operations.push(Operation::new("S", vec![]));
    }
    if let Some(stroke) = style.stroke_color {
        stroke_state(operations, style, stroke);
        operations.push(Operation::new("re", rect_operand(rect)));
        operations.push(Operation::new("S", vec![]));
    }
    operations.push(Operation::new("Q", vec![]));
}

fn polyline_operations(operations: &mut Vec<Operation>, points: &[Point2], closed: bool, style: &Style) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    operations.push(Operation::new("q", vec![]));
    if let Some(fill) = style.fill_color.filter(|_| closed) {
        operations.push(Operation::new("rg", color_operands(fill)));
    }
    if let Some(stroke) = style.stroke_color {
        stroke_state(operations, style, stroke);
    }
    operations.push(Operation::new("m", vec![real(first.x()), real(first.y())]));
    for point in rest {
        operations.push(Operation::new("l", vec![real(point.x()), real(point.y())]));
    }
    let fill = closed && style.fill_color.is_some();
    let paint = match (fill, style.stroke_color.is_some(), closed) {
        (true, true, _) => "b",
        (true, false, _) => "f",
        (false, true, true) => "s",
        (false, true, false) => "S",
        (false, false, _) => "n",
    };
    operations.push(Operation::new(paint, vec![]));
    operations.push(Operation::new("Q", vec![]));
}

fn font_resource(face: FontFace) -> &'static str {
    FONTS
        .iter()
        .find(|(candidate, _, _)| *candidate == face)
        .map(|(_, resource, _)| *resource)
        .unwrap_or("F1")
}

/// WinAnsi 可打印 ASCII 之外的字符以 `?` 代替。
fn encode_text(content: &str) -> Vec<u8> {
    content
        .chars()
        .map(|ch| if (' '..='~').contains(&ch) { ch as u8 } else { b'?' })
        .collect()
}

fn text_operations(operations: &mut Vec<Operation>, text: &TextItem) {
    if text.content.is_empty() {
        return;
    }
    let origin = text.baseline_origin();
    let (sin, cos) = text.rotation_deg.to_radians().sin_cos();
    let size_mm = text.style.font_size * MM_PER_PT;
    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(font_resource(text.style.font).as_bytes().to_vec()),
                real(size_mm),
            ],
        ),
        Operation::new("rg", color_operands(text.style.text_color)),
        Operation::new(
            "Tm",
            vec![
                real(cos),
                real(sin),
                real(-sin),
                real(cos),
                real(origin.x()),
                real(origin.y()),
            ],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(encode_text(&text.content), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]);
}

fn image_operations(operations: &mut Vec<Operation>, rect: &Rect, name: &str) {
    operations.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(rect.width()),
                real(0.0),
                real(0.0),
                real(rect.height()),
                real(rect.x()),
                real(rect.y()),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]);
}
