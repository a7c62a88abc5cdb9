use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use siteplan_core::site::{Road, RoadSpec, SheetForm, SiteSpec};
use tracing::{info, warn};

use crate::errors::FrontendError;

const FORM_ENV: &str = "SITEPLAN_FORM";

/// 表单文件的 TOML 结构：`[site]`、`[roads.*]` 与可选的草图路径。
#[derive(Debug, Clone, Deserialize)]
pub struct FormFile {
    pub site: SiteSpec,
    #[serde(default)]
    pub roads: RoadSpec,
    #[serde(default)]
    pub sketch: Option<PathBuf>,
}

/// 表单来源，便于输出加载信息。
#[derive(Debug, Clone, PartialEq)]
pub enum FormSource {
    File(PathBuf),
    Demo,
}

#[derive(Debug, Clone)]
pub struct LoadedForm {
    pub form: SheetForm,
    pub sketch: Option<PathBuf>,
    pub source: FormSource,
}

impl LoadedForm {
    /// 表单文件所在目录，用作相对草图路径的首个查找位置。
    pub fn base_dir(&self) -> Option<&Path> {
        match &self.source {
            FormSource::File(path) => path.parent(),
            FormSource::Demo => None,
        }
    }
}

/// 内置示例：15 m × 12 m 场地，北侧 6 m 道路，其余字段留空。
pub fn demo_form() -> SheetForm {
    SheetForm::new(
        SiteSpec {
            length_m: 15.0,
            width_m: 12.0,
            ..SiteSpec::default()
        },
        RoadSpec {
            north: Road::new(true, 6.0),
            ..RoadSpec::default()
        },
    )
}

pub fn parse_form(content: &str, path: &Path) -> Result<FormFile, FrontendError> {
    toml::from_str(content).map_err(|source| FrontendError::FormParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_form(path: impl AsRef<Path>) -> Result<LoadedForm, FrontendError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| FrontendError::FormRead {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_form(&content, path)?;
    info!(path = %path.display(), "表单加载成功");
    Ok(LoadedForm {
        form: SheetForm::new(file.site, file.roads),
        sketch: file.sketch,
        source: FormSource::File(path.to_path_buf()),
    })
}

/// 从环境变量 `SITEPLAN_FORM` 指定的路径加载表单，失败时回退到内置示例。
pub fn load_form_from_env_or_demo() -> LoadedForm {
    if let Some(path) = env::var_os(FORM_ENV) {
        let path = PathBuf::from(path);
        match load_form(&path) {
            Ok(loaded) => return loaded,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载表单失败，回退到内置示例");
            }
        }
    }

    LoadedForm {
        form: demo_form(),
        sketch: None,
        source: FormSource::Demo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn demo_form_matches_defaults() {
        let form = demo_form();
        assert!(form.validate().is_ok());
        assert_eq!(form.site_area_sqm(), 180.0);
        assert_eq!(form.roads.north, Road::new(true, 6.0));
        assert!(!form.roads.south.present);
        assert_eq!(form.download_file_name(), "Single_Site_site.pdf");
    }

    #[test]
    fn form_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            sketch = "scans/adlr.png"

            [site]
            survey_no = "42/1"
            village = "Hebbal"
            length_m = 20.0
            width_m = 9.0
            total_builtup_sqm = 120.0

            [roads.east]
            present = true
            width_m = 7.5
            "#
        )
        .unwrap();

        let loaded = load_form(file.path()).expect("load form");
        assert_eq!(loaded.form.site.survey_no, "42/1");
        assert_eq!(loaded.form.site.length_m, 20.0);
        assert_eq!(loaded.form.roads.east, Road::new(true, 7.5));
        assert_eq!(loaded.form.roads.north, Road::default());
        assert_eq!(loaded.sketch, Some(PathBuf::from("scans/adlr.png")));
        assert_eq!(loaded.base_dir(), file.path().parent());
    }

    #[test]
    fn missing_dimension_is_a_parse_error() {
        let err = parse_form("[site]\nlength_m = 10.0\n", Path::new("form.toml")).unwrap_err();
        assert!(matches!(err, FrontendError::FormParse { .. }));

        let missing = load_form("/definitely/not/form.toml").unwrap_err();
        assert!(matches!(missing, FrontendError::FormRead { .. }));
    }
}
