use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub drawing: DrawingConfig,
    #[serde(default)]
    pub tiles: TileConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `SITEPLAN_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("SITEPLAN_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 图纸比例与图签落款。
#[derive(Debug, Clone, Deserialize)]
pub struct DrawingConfig {
    /// 比例分母，100 表示 1:100。
    #[serde(default = "DrawingConfig::default_scale")]
    pub scale: f64,
    #[serde(default = "DrawingConfig::default_prepared_by")]
    pub prepared_by: String,
}

impl DrawingConfig {
    fn default_scale() -> f64 {
        100.0
    }

    fn default_prepared_by() -> String {
        "Prepared by Anantha (Ankusha Project)".to_string()
    }
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            scale: Self::default_scale(),
            prepared_by: Self::default_prepared_by(),
        }
    }
}

/// 瓦片服务与关键位置图参数。
#[derive(Debug, Clone, Deserialize)]
pub struct TileConfig {
    #[serde(default = "TileConfig::default_server_url")]
    pub server_url: String,
    #[serde(default = "TileConfig::default_user_agent")]
    pub user_agent: String,
    #[serde(default = "TileConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "TileConfig::default_zoom")]
    pub zoom: u8,
    #[serde(default = "TileConfig::default_radius_m")]
    pub radius_m: f64,
    /// 离线模式下不发起网络请求，全部使用占位瓦片。
    #[serde(default)]
    pub offline: bool,
}

impl TileConfig {
    fn default_server_url() -> String {
        "https://tile.openstreetmap.org".to_string()
    }

    fn default_user_agent() -> String {
        "SingleSitePlanApp/1.0".to_string()
    }

    fn default_timeout_secs() -> u64 {
        8
    }

    fn default_zoom() -> u8 {
        18
    }

    fn default_radius_m() -> f64 {
        50.0
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            server_url: Self::default_server_url(),
            user_agent: Self::default_user_agent(),
            timeout_secs: Self::default_timeout_secs(),
            zoom: Self::default_zoom(),
            radius_m: Self::default_radius_m(),
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_directory")]
    pub directory: PathBuf,
    #[serde(default = "OutputConfig::default_write_preview")]
    pub write_preview: bool,
    /// 嵌入位图的最高分辨率。
    #[serde(default = "OutputConfig::default_raster_dpi")]
    pub raster_dpi: f64,
}

impl OutputConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_write_preview() -> bool {
        true
    }

    fn default_raster_dpi() -> f64 {
        1200.0
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            write_preview: Self::default_write_preview(),
            raster_dpi: Self::default_raster_dpi(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    /// 查找草图图片的附加目录。
    #[serde(default)]
    pub image_roots: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
