use std::path::PathBuf;

use anyhow::Result;
use certificate_wizard::{logger, App, Config, ExportFormat};

/// 用法: certificate_wizard [任务文件] [svg|png|zip|all]
#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env()?;

    // 初始化日志
    logger::init(config.verbose_logging);

    let mut args = std::env::args().skip(1);
    let job_path = PathBuf::from(args.next().unwrap_or_else(|| config.job_file.clone()));
    let format = args.next().map(|s| s.parse::<ExportFormat>()).transpose()?;

    // 初始化并运行应用
    App::initialize(config).await?.run(&job_path, format).await?;

    Ok(())
}
