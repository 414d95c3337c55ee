//! 批量证书处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，按任务文件驱动一次完整的向导流程。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、LLM 服务、栅格化器（加载系统字体）
//! 2. **任务加载**：读取任务文件、证书图片和名单
//! 3. **向导推进**：转换 → 定制字段 → 确认 → 批量生成
//! 4. **导出落盘**：按任务要求导出 SVG / PNG / 压缩包，写入输出目录
//! 5. **全局统计**：汇总生成数量和失败情况
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单份证书的细节
//! - **资源所有者**：唯一创建 Wizard 和栅格化器的模块
//! - **向下委托**：阶段转换全部交给 Wizard

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::Rasterizer;
use crate::models::output::{ExportFormat, ExportedFile, FileFormat};
use crate::models::template::STANDARD_FIELDS;
use crate::models::{load_job, load_records, load_source_image, CertificateJob};
use crate::services::{ExportService, ExportStatus, LlmService, TemplateConverter};
use crate::utils::{
    init_log_file, log_records_loaded, log_startup, print_final_stats, truncate_text, RunStats,
};
use crate::workflow::Wizard;

/// 运行统计文件名（写在输出目录中）
pub const SUMMARY_FILE: &str = "run_summary.json";

/// 应用主结构
pub struct App {
    config: Config,
    wizard: Wizard,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，图片转换很可能失败");
        }

        let converter: Arc<dyn TemplateConverter> = Arc::new(LlmService::new(&config));
        let rasterizer = Rasterizer::new(config.raster_fallback_width, config.raster_fallback_height);
        Ok(Self::with_parts(config, converter, rasterizer))
    }

    /// 使用指定的转换器和栅格化器组装应用
    pub fn with_parts(
        config: Config,
        converter: Arc<dyn TemplateConverter>,
        rasterizer: Rasterizer,
    ) -> Self {
        let exporter = ExportService::new(Arc::new(rasterizer));
        Self {
            config,
            wizard: Wizard::new(converter, exporter),
        }
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    /// 运行一次任务
    ///
    /// `format` 不为空时覆盖任务文件中的导出方式
    pub async fn run(&self, job_path: &Path, format: Option<ExportFormat>) -> Result<RunStats> {
        info!("\n📁 正在加载任务: {}", job_path.display());
        let job = load_job(job_path).await?;
        let format = format.unwrap_or(job.format);

        let image = load_source_image(&job).await?;
        let records = load_records(&job, self.config.record_delimiter).await?;
        log_records_loaded(&records);

        // 上传 → 定制
        self.wizard.select_image(image).await?;
        self.wizard
            .convert()
            .await
            .context("证书图片转换失败，请检查图片或稍后重试")?;

        // 定制 → 批量
        self.customize(&job).await?;
        self.wizard.accept().await?;

        // 批量 → 下载
        let generated = self.wizard.generate(records).await?;
        if generated == 0 {
            warn!("⚠️ 名单中没有有效记录，没有生成任何证书");
        }

        let stats = self.export_all(format, generated).await?;
        print_final_stats(&stats, &self.config.output_log_file);
        Ok(stats)
    }

    /// 按任务文件修改模板字段
    async fn customize(&self, job: &CertificateJob) -> Result<()> {
        let snapshot = self.wizard.snapshot().await;
        for id in STANDARD_FIELDS {
            match snapshot.field(id) {
                Some(value) => debug!("字段 {}: {}", id, truncate_text(&value, 40)),
                None => debug!("模板中没有字段 {}", id),
            }
        }

        for (id, value) in &job.fields {
            if snapshot.field(id).is_none() {
                warn!("⚠️ 模板中没有字段 {}，已忽略", id);
                continue;
            }
            self.wizard.update_field(id, value).await?;
            info!("✏️ 字段 {} → {}", id, truncate_text(value, 40));
        }
        Ok(())
    }

    /// 导出全部结果并写入输出目录
    async fn export_all(&self, format: ExportFormat, generated: usize) -> Result<RunStats> {
        let out_dir = PathBuf::from(&self.config.output_dir);
        fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| AppError::file(out_dir.display().to_string(), e))?;

        let outputs = self.wizard.outputs().await;
        let mut stats = RunStats {
            generated,
            ..RunStats::default()
        };
        let mut files: Vec<ExportedFile> = Vec::new();

        if format.includes(FileFormat::Svg) {
            for output in &outputs {
                files.push(self.wizard.export_vector(output.id()).await?);
            }
        }

        if format.includes(FileFormat::Png) {
            info!("🖨️ 正在栅格化 {} 份证书...", outputs.len());
            let exports = join_all(outputs.iter().map(|output| self.wizard.export_raster(output.id()))).await;
            for export in exports {
                let export = export?;
                if export.status == ExportStatus::Failed {
                    stats.raster_failed += 1;
                }
                files.push(export.file);
            }
        }

        if format.includes(FileFormat::Zip) {
            match self.wizard.export_archive().await {
                Ok(file) => files.push(file),
                Err(e) => {
                    error!("❌ 压缩包构建失败: {}", e);
                    stats.archive_failed = true;
                    if !format.includes(FileFormat::Svg) {
                        info!("↩️ 改为逐个导出 SVG 文件");
                        for output in &outputs {
                            files.push(self.wizard.export_vector(output.id()).await?);
                        }
                    }
                }
            }
        }

        for file in &files {
            let path = out_dir.join(&file.name);
            fs::write(&path, &file.bytes)
                .await
                .map_err(|e| AppError::file(path.display().to_string(), e))?;
            debug!("💾 已写入 {} ({} 字节)", path.display(), file.bytes.len());
            if file.format == FileFormat::Zip {
                stats.archive_path = Some(path);
            }
            stats.exported += 1;
        }
        info!("✓ 已导出 {} 个文件到 {}", stats.exported, out_dir.display());

        let summary_path = out_dir.join(SUMMARY_FILE);
        let summary = serde_json::to_vec_pretty(&stats).context("无法序列化运行统计")?;
        fs::write(&summary_path, summary)
            .await
            .map_err(|e| AppError::file(summary_path.display().to_string(), e))?;

        Ok(stats)
    }
}
