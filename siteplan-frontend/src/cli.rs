use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use siteplan_config::AppConfig;
use siteplan_core::keyplan::KeyPlanSource;
use siteplan_core::site::{GeoPoint, Side};
use siteplan_engine::command::{CommandBus, CommandContext, CommandRequest};
use siteplan_engine::layout::SheetTemplate;
use siteplan_engine::render::{SheetRenderer, StyleSheet};
use siteplan_engine::session::Session;
use siteplan_io::{PdfExporter, SvgExporter, save};
use siteplan_tiles::{HttpTileSource, MosaicBuilder, PlaceholderTileSource};
use tracing::{debug, info, warn};

use crate::errors::FrontendError;
use crate::loader::{FormSource, LoadedForm, load_form, load_form_from_env_or_demo};
use crate::resource_locator::SketchLocator;

/// 对表单道路的调整，按给出的顺序作为会话命令执行。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoadOverride {
    Set { side: Side, width_m: f64 },
    Remove(Side),
}

impl RoadOverride {
    fn to_request(self) -> CommandRequest {
        match self {
            RoadOverride::Set { side, width_m } => {
                CommandRequest::new("set_road", [side.to_string(), width_m.to_string()])
            }
            RoadOverride::Remove(side) => CommandRequest::new("remove_road", [side.to_string()]),
        }
    }
}

/// 一次生成请求。未设置的字段取配置中的值。
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub form_path: Option<PathBuf>,
    /// 依次执行的地图点选，最后一次生效。
    pub picks: Vec<GeoPoint>,
    pub road_overrides: Vec<RoadOverride>,
    pub sketch: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub offline: bool,
    pub write_preview: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub form_source: FormSource,
    pub location: Option<GeoPoint>,
    pub sketch_loaded: bool,
    pub pdf_path: PathBuf,
    pub pdf_bytes: usize,
    pub preview_path: Option<PathBuf>,
}

/// 加载表单、执行会话命令、生成图纸并写出 PDF（及可选 SVG 预览）。
pub fn run_generate(
    request: &GenerateRequest,
    config: &AppConfig,
) -> Result<GenerateReport, FrontendError> {
    let loaded = match &request.form_path {
        Some(path) => load_form(path)?,
        None => load_form_from_env_or_demo(),
    };

    let mut session = Session::new(loaded.form.clone());
    apply_commands(&mut session, request)?;

    let sketch_path = request.sketch.as_ref().or(loaded.sketch.as_ref());
    if let Some(path) = sketch_path {
        let locator = sketch_locator(&loaded, request, config);
        match locator.load(path) {
            Ok(image) => session.set_sketch(Some(image)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "草图不可用，使用占位文字");
                session.set_sketch(None);
            }
        }
    }

    let template = SheetTemplate::with_scale(config.drawing.scale);
    let renderer = SheetRenderer::new(StyleSheet::default(), config.drawing.prepared_by.clone());
    let key_plans = key_plan_source(config, request.offline)?;
    let sheet = session.generate(&template, &renderer, key_plans.as_ref())?;

    let output_dir = request
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    ensure_dir(&output_dir)?;

    let pdf_path = output_dir.join(&sheet.file_name);
    let pdf_bytes = save(
        &PdfExporter::new(config.output.raster_dpi),
        &sheet.canvas,
        &pdf_path,
    )?;

    let preview_path = if request.write_preview.unwrap_or(config.output.write_preview) {
        let path = pdf_path.with_extension("svg");
        save(&SvgExporter::new(), &sheet.canvas, &path)?;
        Some(path)
    } else {
        None
    };

    info!(
        pdf = %pdf_path.display(),
        bytes = pdf_bytes,
        preview = preview_path.is_some(),
        "图纸导出完成"
    );
    Ok(GenerateReport {
        form_source: loaded.source,
        location: session.location(),
        sketch_loaded: session.sketch().is_some(),
        pdf_path,
        pdf_bytes,
        preview_path,
    })
}

/// 道路调整在前，地图点选在后，均通过命令总线执行。
fn apply_commands(session: &mut Session, request: &GenerateRequest) -> Result<(), FrontendError> {
    let bus = CommandBus::new();
    let mut context = CommandContext { session };
    for road in &request.road_overrides {
        dispatch_command(&bus, &road.to_request(), &mut context)?;
    }
    for point in &request.picks {
        let pick = CommandRequest::new("pick_location", [point.lat.to_string(), point.lon.to_string()]);
        dispatch_command(&bus, &pick, &mut context)?;
    }
    Ok(())
}

fn dispatch_command(
    bus: &CommandBus,
    request: &CommandRequest,
    context: &mut CommandContext<'_>,
) -> Result<(), FrontendError> {
    let response = bus.dispatch(request, context);
    if response.success {
        if let Some(message) = response.message {
            debug!(command = %request.name, "{message}");
        }
        Ok(())
    } else {
        Err(FrontendError::Command {
            command: request.name.clone(),
            message: response.message.unwrap_or_else(|| "未知错误".to_string()),
        })
    }
}

fn sketch_locator(loaded: &LoadedForm, request: &GenerateRequest, config: &AppConfig) -> SketchLocator {
    // 命令行给出的草图相对当前目录解析，表单中的草图相对表单目录解析。
    let base_dir = if request.sketch.is_some() {
        None
    } else {
        loaded.base_dir()
    };
    SketchLocator::from_config(base_dir, config)
}

fn key_plan_source(
    config: &AppConfig,
    offline: bool,
) -> Result<Box<dyn KeyPlanSource>, FrontendError> {
    let tiles = &config.tiles;
    if offline || tiles.offline {
        info!("离线模式，关键位置图使用占位瓦片");
        return Ok(Box::new(
            MosaicBuilder::new(PlaceholderTileSource)
                .with_zoom(tiles.zoom)
                .with_radius(tiles.radius_m),
        ));
    }
    let source = HttpTileSource::new(
        tiles.server_url.clone(),
        &tiles.user_agent,
        Duration::from_secs(tiles.timeout_secs),
    )?;
    Ok(Box::new(
        MosaicBuilder::new(source)
            .with_zoom(tiles.zoom)
            .with_radius(tiles.radius_m),
    ))
}

fn ensure_dir(path: &Path) -> Result<(), FrontendError> {
    fs::create_dir_all(path).map_err(|source| FrontendError::OutputDir {
        path: path.to_path_buf(),
        source,
    })
}

/// 打印生成结果概览。
pub fn print_report(report: &GenerateReport) {
    println!("单场地布置图生成完成");
    match &report.form_source {
        FormSource::File(path) => println!("表单来源：{}", path.display()),
        FormSource::Demo => println!("表单来源：内置示例"),
    }
    match report.location {
        Some(point) => println!("场地位置：{point}"),
        None => println!("场地位置：未设置（关键位置图使用占位文字）"),
    }
    if !report.sketch_loaded {
        println!("草图：未提供（使用占位文字）");
    }
    println!(
        "PDF：{} ({} 字节)",
        report.pdf_path.display(),
        report.pdf_bytes
    );
    if let Some(path) = &report.preview_path {
        println!("预览：{}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteplan_core::site::Road;

    #[test]
    fn overrides_and_picks_go_through_commands() {
        let mut session = Session::default();
        let request = GenerateRequest {
            picks: vec![GeoPoint::new(12.9716, 77.5946), GeoPoint::new(13.0, 77.6)],
            road_overrides: vec![
                RoadOverride::Set {
                    side: Side::West,
                    width_m: 9.0,
                },
                RoadOverride::Remove(Side::West),
            ],
            ..GenerateRequest::default()
        };
        apply_commands(&mut session, &request).expect("commands");
        assert_eq!(session.location(), Some(GeoPoint::new(13.0, 77.6)));
        assert_eq!(session.form().roads.west, Road::new(false, 9.0));
    }

    #[test]
    fn rejected_command_is_an_error() {
        let mut session = Session::default();
        let request = GenerateRequest {
            road_overrides: vec![RoadOverride::Set {
                side: Side::North,
                width_m: -1.0,
            }],
            ..GenerateRequest::default()
        };
        let err = apply_commands(&mut session, &request).unwrap_err();
        assert!(matches!(err, FrontendError::Command { ref command, .. } if command == "set_road"));
    }
}
