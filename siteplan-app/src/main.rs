use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use siteplan_config::{AppConfig, ConfigError};
use siteplan_core::site::{GeoPoint, Side};
use siteplan_frontend::{GenerateRequest, RoadOverride};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 生成 A3 横向单场地布置图（PDF）。
#[derive(Parser, Debug)]
#[command(name = "siteplan", version)]
struct Args {
    /// 表单文件（TOML），缺省时读取 `SITEPLAN_FORM` 或使用内置示例
    #[arg(short = 'f', long = "form")]
    form: Option<PathBuf>,

    /// 地图点选位置 `LAT,LON`，可重复，最后一次生效
    #[arg(short = 'p', long = "pick", value_parser = parse_pick, allow_hyphen_values = true)]
    picks: Vec<GeoPoint>,

    /// 设置道路 `SIDE=WIDTH`（米），可重复
    #[arg(short = 'r', long = "road", value_parser = parse_road)]
    roads: Vec<RoadOverride>,

    /// 移除某侧道路，可重复
    #[arg(long = "no-road", value_parser = parse_side)]
    no_roads: Vec<Side>,

    /// 草图图片（JPEG/PNG）
    #[arg(short = 's', long = "sketch")]
    sketch: Option<PathBuf>,

    /// 输出目录
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// 不访问瓦片服务，关键位置图使用占位瓦片
    #[arg(long)]
    offline: bool,

    /// 不写 SVG 预览
    #[arg(long = "no-preview")]
    no_preview: bool,
}

impl Args {
    fn into_request(self) -> GenerateRequest {
        let mut road_overrides = self.roads;
        road_overrides.extend(self.no_roads.into_iter().map(RoadOverride::Remove));
        GenerateRequest {
            form_path: self.form,
            picks: self.picks,
            road_overrides,
            sketch: self.sketch,
            output_dir: self.output,
            offline: self.offline,
            write_preview: self.no_preview.then_some(false),
        }
    }
}

fn parse_pick(raw: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("应为 LAT,LON: {raw}"))?;
    let number = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|err| format!("{value}: {err}"))
    };
    Ok(GeoPoint::new(number(lat)?, number(lon)?))
}

fn parse_side(raw: &str) -> Result<Side, String> {
    raw.parse::<Side>().map_err(|err| err.to_string())
}

fn parse_road(raw: &str) -> Result<RoadOverride, String> {
    let (side, width) = raw
        .split_once('=')
        .ok_or_else(|| format!("应为 SIDE=WIDTH: {raw}"))?;
    let width_m = width
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("{width}: {err}"))?;
    Ok(RoadOverride::Set {
        side: parse_side(side)?,
        width_m,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = load_configuration(args.config.clone());
    init_logging(&config);
    info!("启动单场地布置图生成");

    match siteplan_frontend::run_generate(&args.into_request(), &config) {
        Ok(report) => {
            info!(pdf = %report.pdf_path.display(), "生成成功");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "生成失败");
            eprintln!("错误：{err}");
            ExitCode::FAILURE
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
