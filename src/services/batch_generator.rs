//! 批量生成器 - 业务能力层
//!
//! 遍历名单，对每条记录做位置替换，产出带文件名的生成结果。
//! 输出顺序与输入顺序一致。

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::models::output::{duplicate_names, FileFormat, GeneratedOutput};
use crate::models::record::Record;
use crate::models::template::TemplateDocument;
use crate::services::substitution;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("空白正则表达式无效"));

/// 不能出现在文件名中的字符（路径分隔符、保留字符、控制字符）
static UNSAFE_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f\x7f]"#).expect("文件名正则表达式无效"));

/// 文件名前缀
pub const FILE_PREFIX: &str = "certificate_";

/// 由主字段推导输出文件名
///
/// 空白串替换为一个下划线，不能出现在文件名中的字符逐个替换为下划线，
/// 保证结果始终落在输出目录内。
pub fn output_name(primary: &str, format: FileFormat) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(primary, "_");
    format!(
        "{}{}.{}",
        FILE_PREFIX,
        UNSAFE_CHAR.replace_all(&collapsed, "_"),
        format.extension()
    )
}

/// 对每条记录生成一份证书
pub fn generate(template: &TemplateDocument, records: &[Record]) -> Vec<GeneratedOutput> {
    let outputs: Vec<GeneratedOutput> = records
        .iter()
        .map(|record| {
            let name = output_name(record.primary(), FileFormat::Svg);
            let content = substitution::substitute(template.as_str(), record.values());
            debug!("生成 {} ({} 字节)", name, content.len());
            GeneratedOutput::new(name, content)
        })
        .collect();

    let duplicates = duplicate_names(&outputs);
    if !duplicates.is_empty() {
        warn!(
            "⚠️ 有 {} 个文件名重复，打包下载将不可用，请改为逐个导出: {}",
            duplicates.len(),
            duplicates.join(", ")
        );
    }

    outputs
}
