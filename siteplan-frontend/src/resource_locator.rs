use std::env;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use siteplan_config::AppConfig;
use tracing::{debug, info, trace};

use crate::errors::FrontendError;

const IMAGE_ROOTS_ENV: &str = "SITEPLAN_IMAGE_ROOTS";

/// 草图查找：表单目录、配置的 `image_roots` 与环境变量中的目录，按顺序优先。
pub struct SketchLocator {
    search_roots: Vec<PathBuf>,
}

impl SketchLocator {
    pub fn from_config(base_dir: Option<&Path>, config: &AppConfig) -> Self {
        let mut roots: Vec<PathBuf> = Vec::new();

        if let Some(dir) = base_dir {
            roots.push(dir.to_path_buf());
        }

        roots.extend(
            config
                .resources
                .image_roots
                .iter()
                .cloned()
                .filter(|path| path.is_dir()),
        );

        if let Some(env_paths) = env::var_os(IMAGE_ROOTS_ENV) {
            for path in env::split_paths(&env_paths) {
                if path.is_dir() {
                    roots.push(path);
                }
            }
        }

        // 去重，保持靠前优先级。
        let mut deduped: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !deduped.iter().any(|existing| existing == &root) {
                deduped.push(root);
            }
        }

        SketchLocator {
            search_roots: deduped,
        }
    }

    #[inline]
    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn resolve(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            if path.exists() {
                return Some(Self::canonicalize_or_clone(path));
            }
            debug!(path = %path.display(), "草图路径为绝对路径但未找到对应文件");
            return None;
        }

        for root in &self.search_roots {
            let candidate = root.join(path);
            trace!(candidate = %candidate.display(), "草图候选路径");
            if candidate.exists() {
                return Some(Self::canonicalize_or_clone(&candidate));
            }
        }
        // 最后相对当前工作目录。
        path.exists().then(|| Self::canonicalize_or_clone(path))
    }

    /// 解析并解码草图。找不到文件或无法解码时返回错误，由调用方决定如何降级。
    pub fn load(&self, path: &Path) -> Result<DynamicImage, FrontendError> {
        let resolved = self
            .resolve(path)
            .ok_or_else(|| FrontendError::SketchNotFound(path.to_path_buf()))?;
        let image = image::open(&resolved).map_err(|source| FrontendError::SketchLoad {
            path: resolved.clone(),
            source,
        })?;
        info!(
            path = %resolved.display(),
            width = image.width(),
            height = image.height(),
            "草图加载成功"
        );
        Ok(image)
    }

    fn canonicalize_or_clone(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }
}
