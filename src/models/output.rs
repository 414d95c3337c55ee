//! 生成结果与导出格式

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// 生成结果的稳定标识（导出状态以此为键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputId(Uuid);

impl OutputId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OutputId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一份生成好的证书
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedOutput {
    id: OutputId,
    name: String,
    content: String,
}

impl GeneratedOutput {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: OutputId::new(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    /// 文件名（矢量格式）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// 换成指定格式扩展名后的文件名
    pub fn name_with_extension(&self, format: FileFormat) -> String {
        let stem = self
            .name
            .strip_suffix(&format!(".{}", FileFormat::Svg.extension()))
            .unwrap_or(&self.name);
        format!("{}.{}", stem, format.extension())
    }
}

/// 单个文件的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// 矢量
    Svg,
    /// 栅格
    Png,
    /// 压缩包
    Zip,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Svg => "svg",
            FileFormat::Png => "png",
            FileFormat::Zip => "zip",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            FileFormat::Svg => "image/svg+xml",
            FileFormat::Png => "image/png",
            FileFormat::Zip => "application/zip",
        }
    }
}

/// 导出方式（任务文件中的 `format` 字段）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// 逐个导出矢量文件
    Svg,
    /// 逐个导出栅格图片
    Png,
    /// 打包成一个压缩包
    #[default]
    Zip,
    /// 以上全部
    All,
}

impl ExportFormat {
    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
            ExportFormat::Zip => "zip",
            ExportFormat::All => "all",
        }
    }

    pub fn includes(self, format: FileFormat) -> bool {
        match self {
            ExportFormat::All => true,
            ExportFormat::Svg => format == FileFormat::Svg,
            ExportFormat::Png => format == FileFormat::Png,
            ExportFormat::Zip => format == FileFormat::Zip,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(ExportFormat::Svg),
            "png" => Ok(ExportFormat::Png),
            "zip" => Ok(ExportFormat::Zip),
            "all" => Ok(ExportFormat::All),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

/// 一个可供下载的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub name: String,
    pub format: FileFormat,
    pub bytes: Vec<u8>,
}

/// 出现多次的文件名（按首次出现顺序）
pub fn duplicate_names(outputs: &[GeneratedOutput]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for output in outputs {
        let count = counts.entry(output.name()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(output.name().to_string());
        }
    }
    order
}
