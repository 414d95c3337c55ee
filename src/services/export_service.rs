//! 导出服务 - 业务能力层
//!
//! 三种导出方式：
//! - 矢量：原样输出 SVG 文本
//! - 栅格：渲染成 PNG，失败时退回矢量导出并标记失败
//! - 打包：全部结果写入一个 zip，任何一步失败都整体放弃

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExportError;
use crate::infrastructure::Rasterizer;
use crate::models::output::{duplicate_names, ExportedFile, FileFormat, GeneratedOutput, OutputId};

/// 压缩包文件名
pub const ARCHIVE_NAME: &str = "certificates.zip";

/// 单个结果的栅格导出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportStatus {
    /// 尚未导出
    #[default]
    Idle,
    /// 正在栅格化
    Converting,
    /// 导出成功
    Done,
    /// 栅格化失败，已退回矢量导出
    Failed,
}

/// 栅格导出的结果
#[derive(Debug, Clone)]
pub struct RasterExport {
    pub file: ExportedFile,
    pub status: ExportStatus,
}

/// 导出服务
///
/// 职责：
/// - 持有栅格化器
/// - 按 OutputId 记录每个结果的栅格导出状态，互不影响
/// - 不关心流程阶段
pub struct ExportService {
    rasterizer: Arc<Rasterizer>,
    statuses: Mutex<HashMap<OutputId, ExportStatus>>,
}

impl ExportService {
    pub fn new(rasterizer: Arc<Rasterizer>) -> Self {
        Self {
            rasterizer,
            statuses: Mutex::new(HashMap::new()),
        }
    }

    /// 矢量导出：原样输出文本
    pub fn export_vector(&self, output: &GeneratedOutput) -> ExportedFile {
        ExportedFile {
            name: output.name_with_extension(FileFormat::Svg),
            format: FileFormat::Svg,
            bytes: output.content().as_bytes().to_vec(),
        }
    }

    /// 栅格导出
    ///
    /// 渲染在阻塞线程池中进行。失败时不返回错误，而是退回矢量导出并把状态标记为失败。
    /// `session` 被取消后（会话已重置）不再记录任何状态，导出结果照常返回。
    pub async fn export_raster(
        &self,
        output: &GeneratedOutput,
        session: &CancellationToken,
    ) -> RasterExport {
        let id = output.id();
        self.set_status(id, ExportStatus::Converting, session).await;

        let rasterizer = self.rasterizer.clone();
        let content = output.content().to_string();
        let rendered = tokio::task::spawn_blocking(move || rasterizer.render_png(&content))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|e| e.to_string()));

        match rendered {
            Ok(png) => {
                debug!("✓ {} 栅格化成功", output.name());
                self.set_status(id, ExportStatus::Done, session).await;
                RasterExport {
                    file: ExportedFile {
                        name: output.name_with_extension(FileFormat::Png),
                        format: FileFormat::Png,
                        bytes: png,
                    },
                    status: ExportStatus::Done,
                }
            }
            Err(e) => {
                warn!("⚠️ {} 栅格化失败，改为导出 SVG: {}", output.name(), e);
                self.set_status(id, ExportStatus::Failed, session).await;
                RasterExport {
                    file: self.export_vector(output),
                    status: ExportStatus::Failed,
                }
            }
        }
    }

    /// 打包导出：所有结果写入一个 zip
    pub async fn export_archive(
        &self,
        outputs: &[GeneratedOutput],
    ) -> Result<ExportedFile, ExportError> {
        let entries: Vec<(String, String)> = outputs
            .iter()
            .map(|o| (o.name().to_string(), o.content().to_string()))
            .collect();

        let duplicates = duplicate_names(outputs);
        if !duplicates.is_empty() {
            return Err(ExportError::Archive(format!(
                "文件名重复: {}",
                duplicates.join(", ")
            )));
        }

        let bytes = tokio::task::spawn_blocking(move || build_archive(&entries))
            .await
            .map_err(|e| ExportError::Task(e.to_string()))??;

        info!("📦 压缩包已生成: {} 个文件, {} 字节", outputs.len(), bytes.len());
        Ok(ExportedFile {
            name: ARCHIVE_NAME.to_string(),
            format: FileFormat::Zip,
            bytes,
        })
    }

    /// 查询单个结果的导出状态
    pub async fn status(&self, id: OutputId) -> ExportStatus {
        self.statuses.lock().await.get(&id).copied().unwrap_or_default()
    }

    /// 栅格化失败的结果
    pub async fn failed(&self) -> Vec<OutputId> {
        self.statuses
            .lock()
            .await
            .iter()
            .filter(|(_, status)| **status == ExportStatus::Failed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// 清空所有状态（会话重置时调用）
    pub async fn clear(&self) {
        self.statuses.lock().await.clear();
    }

    async fn set_status(&self, id: OutputId, status: ExportStatus, session: &CancellationToken) {
        let mut statuses = self.statuses.lock().await;
        // 重置先取消再清空，持锁检查保证清空之后不会再写入
        if session.is_cancelled() {
            debug!("会话已重置，忽略 {} 的导出状态", id);
            return;
        }
        statuses.insert(id, status);
    }
}

/// 构建 zip（deflate 压缩），返回完整的压缩包字节
pub fn build_archive(entries: &[(String, String)]) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|e| ExportError::Archive(format!("{}: {}", name, e)))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| ExportError::Archive(format!("{}: {}", name, e)))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| ExportError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}
