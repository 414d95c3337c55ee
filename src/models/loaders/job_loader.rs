use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;

use crate::error::RecordError;
use crate::models::image::SourceImage;
use crate::models::output::ExportFormat;
use crate::models::record::{self, Record};

/// 一次证书生成任务（TOML 描述文件）
///
/// ```toml
/// image = "template.png"
/// records = "recipients.csv"
/// format = "all"
///
/// [fields]
/// message = "For outstanding performance"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateJob {
    /// 证书图片：本地路径或 http(s) 地址
    pub image: String,
    /// 定制阶段要修改的字段（id → 文本）
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// 分隔文本名单文件
    #[serde(default)]
    pub records: Option<String>,
    /// 手动录入的名单
    #[serde(default)]
    pub manual: Vec<Vec<String>>,
    /// 字段分隔符，未设置时使用配置中的值
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
}

impl CertificateJob {
    /// 相对路径以任务文件所在目录为基准
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        match self.file_path.as_deref().and_then(Path::parent) {
            Some(base) if candidate.is_relative() => base.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }
}

/// 从 TOML 文件加载任务
pub async fn load_job(job_file_path: &Path) -> Result<CertificateJob> {
    let content = fs::read_to_string(job_file_path)
        .await
        .with_context(|| format!("无法读取任务文件: {}", job_file_path.display()))?;

    let mut job: CertificateJob = toml::from_str(&content)
        .with_context(|| format!("无法解析任务文件: {}", job_file_path.display()))?;

    job.file_path = Some(job_file_path.to_path_buf());

    Ok(job)
}

/// 加载证书图片：支持本地文件和 http(s) 地址
pub async fn load_source_image(job: &CertificateJob) -> Result<SourceImage> {
    let source = job.image.trim();
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        tracing::info!("正在下载图片: {}", source);
        let response = reqwest::get(source)
            .await
            .with_context(|| format!("无法下载图片: {}", source))?
            .error_for_status()
            .with_context(|| format!("图片地址返回错误: {}", source))?;
        response.bytes().await?.to_vec()
    } else {
        let path = job.resolve(source);
        fs::read(&path)
            .await
            .with_context(|| format!("无法读取图片: {}", path.display()))?
    };

    Ok(SourceImage::new(source, bytes)?)
}

/// 加载名单：先读分隔文本文件，再追加手动录入的记录
pub async fn load_records(job: &CertificateJob, default_delimiter: char) -> Result<Vec<Record>> {
    let delimiter = job.delimiter.unwrap_or(default_delimiter);
    let mut records = Vec::new();

    if let Some(records_file) = &job.records {
        let path = job.resolve(records_file);
        let text = fs::read_to_string(&path)
            .await
            .map_err(|source| RecordError::ReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        let parsed = record::parse_delimited(&text, delimiter);
        tracing::info!(
            "从 {} 读取到 {} 条记录",
            path.file_name().unwrap_or_default().to_string_lossy(),
            parsed.len()
        );
        records.extend(parsed);
    }

    if !job.manual.is_empty() {
        records.extend(record::from_manual(job.manual.clone()));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_toml() {
        let job: CertificateJob = toml::from_str(
            r#"
            image = "template.png"
            records = "people.csv"
            format = "png"
            manual = [["Grace Hopper", "", ""], ["", ""]]

            [fields]
            message = "Well done"
            "#,
        )
        .unwrap();

        assert_eq!(job.image, "template.png");
        assert_eq!(job.format, ExportFormat::Png);
        assert_eq!(job.fields.get("message").map(String::as_str), Some("Well done"));
        assert_eq!(job.manual.len(), 2);
        assert_eq!(job.delimiter, None);
    }

    #[test]
    fn test_format_defaults_to_zip() {
        let job: CertificateJob = toml::from_str(r#"image = "a.png""#).unwrap();
        assert_eq!(job.format, ExportFormat::Zip);
        assert!(job.fields.is_empty());
    }

    #[test]
    fn test_resolve_relative_to_job_file() {
        let job = CertificateJob {
            file_path: Some(PathBuf::from("jobs/spring/job.toml")),
            ..CertificateJob::default()
        };
        assert_eq!(job.resolve("people.csv"), PathBuf::from("jobs/spring/people.csv"));
        assert_eq!(job.resolve("/abs/people.csv"), PathBuf::from("/abs/people.csv"));
    }

    #[tokio::test]
    async fn test_load_records_from_manual_only() {
        let job = CertificateJob {
            manual: vec![
                vec!["Grace Hopper".to_string(), String::new(), String::new()],
                vec![String::new(), String::new()],
            ],
            ..CertificateJob::default()
        };
        let records = load_records(&job, ',').await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary(), "Grace Hopper");
    }

    #[tokio::test]
    async fn test_missing_records_file() {
        let job = CertificateJob {
            records: Some("does-not-exist.csv".to_string()),
            ..CertificateJob::default()
        };
        let err = load_records(&job, ',').await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecordError>(),
            Some(RecordError::ReadFailed { .. })
        ));
    }
}
