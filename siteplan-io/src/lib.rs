use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use siteplan_core::canvas::DrawingCanvas;
use thiserror::Error;
use tracing::info;

pub mod pdf;
pub mod svg;

pub use pdf::PdfExporter;
pub use svg::SvgExporter;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("canvas page size {width}x{height} mm is not printable")]
    InvalidPage { width: f64, height: f64 },
    #[error("image on layer {layer} has zero size")]
    EmptyImage { layer: String },
    #[error("failed to encode content stream: {0}")]
    Encode(String),
    #[error("failed to serialize document: {0}")]
    Serialize(String),
    #[error("failed to encode embedded image: {source}")]
    Image {
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 将画布序列化为某种文档格式。
pub trait SheetExporter {
    fn export(&self, canvas: &DrawingCanvas) -> Result<Vec<u8>, ExportError>;

    /// 产物的文件扩展名，不含点号。
    fn extension(&self) -> &'static str;
}

/// 导出并写入磁盘，返回写入的字节数。
pub fn save(
    exporter: &dyn SheetExporter,
    canvas: &DrawingCanvas,
    path: &Path,
) -> Result<usize, ExportError> {
    let bytes = exporter.export(canvas)?;
    fs::write(path, &bytes).map_err(|source| ExportError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "文档已写入");
    Ok(bytes.len())
}

pub(crate) fn check_page(canvas: &DrawingCanvas) -> Result<(), ExportError> {
    let (width, height) = (canvas.width_mm(), canvas.height_mm());
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(ExportError::InvalidPage { width, height })
    }
}

/// 透明像素与白底合成，得到紧凑的 RGB 字节。
pub(crate) fn flatten_on_white(image: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for Rgba([r, g, b, a]) in image.pixels().copied() {
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_pixels_become_white() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 0, Rgba([10, 20, 30, 0]));
        assert_eq!(flatten_on_white(&image), vec![10, 20, 30, 255, 255, 255]);
    }

    #[test]
    fn degenerate_page_is_rejected() {
        assert!(check_page(&DrawingCanvas::a3_landscape()).is_ok());
        assert!(matches!(
            check_page(&DrawingCanvas::new(0.0, 297.0)),
            Err(ExportError::InvalidPage { .. })
        ));
    }
}
