use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::models::record::Record;

/// 名单预览最多显示的条数
pub const PREVIEW_LIMIT: usize = 5;

/// 一次运行的统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// 生成的证书数量
    pub generated: usize,
    /// 写出的文件数量
    pub exported: usize,
    /// 栅格化失败、已退回 SVG 的数量
    pub raster_failed: usize,
    /// 压缩包是否构建失败
    pub archive_failed: bool,
    /// 写出的压缩包路径
    pub archive_path: Option<PathBuf>,
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n证书生成日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 证书模板向导");
    info!("🤖 模型: {}", config.llm_model_name);
    info!("📁 输出目录: {}", config.output_dir);
    info!("{}", "=".repeat(60));
}

/// 记录名单加载信息，并预览前几条
///
/// # 参数
/// - `records`: 规范化后的名单
pub fn log_records_loaded(records: &[Record]) {
    info!("✓ 共 {} 条有效记录", records.len());
    for (idx, record) in records.iter().take(PREVIEW_LIMIT).enumerate() {
        info!("  {}. {}", idx + 1, truncate_text(&record.values().join(" | "), 60));
    }
    if records.len() > PREVIEW_LIMIT {
        info!("  ... 另有 {} 条", records.len() - PREVIEW_LIMIT);
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `stats`: 本次运行的统计
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(stats: &RunStats, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 生成证书: {}", stats.generated);
    info!("📄 导出文件: {}", stats.exported);
    if stats.raster_failed > 0 {
        info!("⚠️ 栅格化失败（已导出 SVG）: {}", stats.raster_failed);
    }
    if let Some(path) = &stats.archive_path {
        info!("📦 压缩包: {}", path.display());
    }
    if stats.archive_failed {
        info!("❌ 压缩包构建失败，请使用逐个导出的文件");
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("证书模板向导", 4), "证书模板...");
    }
}
