use std::path::PathBuf;

use siteplan_engine::errors::EngineError;
use siteplan_io::ExportError;
use siteplan_tiles::fetch::TileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("读取表单文件 {path:?} 失败: {source}")]
    FormRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析表单文件 {path:?} 失败: {source}")]
    FormParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("找不到草图文件 {0:?}")]
    SketchNotFound(PathBuf),
    #[error("读取草图 {path:?} 失败: {source}")]
    SketchLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("命令 `{command}` 执行失败: {message}")]
    Command { command: String, message: String },
    #[error("无法创建瓦片客户端: {0}")]
    TileClient(#[from] TileError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("无法创建输出目录 {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
