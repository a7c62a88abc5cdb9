pub mod cli;
pub mod errors;
pub mod loader;
pub mod resource_locator;

pub use cli::{GenerateReport, GenerateRequest, RoadOverride};

use errors::FrontendError;
use siteplan_config::AppConfig;
use tracing::info;

/// 执行一次生成并打印结果。
pub fn run_generate(request: &GenerateRequest, config: &AppConfig) -> Result<GenerateReport, FrontendError> {
    info!(
        form = ?request.form_path,
        picks = request.picks.len(),
        offline = request.offline || config.tiles.offline,
        "开始生成单场地布置图"
    );
    let report = cli::run_generate(request, config)?;
    cli::print_report(&report);
    Ok(report)
}
