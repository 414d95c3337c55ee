//! 字段替换 - 业务能力层
//!
//! 两种互相独立的替换方式：
//! - 位置替换：批量生成时在原始文本上把 `{{i}}` 替换为记录的第 i 个值
//! - 具名替换：交互定制时在文档树上按 id 替换元素的文本

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::escape;
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::DocumentError;
use crate::models::svg::SvgDocument;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\d+)\}\}").expect("占位符正则表达式无效"));

/// 位置占位符，例如 `{{0}}`
pub fn placeholder(index: usize) -> String {
    format!("{{{{{}}}}}", index)
}

/// 位置替换
///
/// 一次扫描完成替换，替换进去的值不会被再次展开。
/// 下标超出记录长度的占位符原样保留。值会做 XML 转义，保证文档仍然合法。
pub fn substitute(document: &str, values: &[String]) -> String {
    PLACEHOLDER
        .replace_all(document, |caps: &Captures<'_>| {
            let value = caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| values.get(index));
            match value {
                Some(value) => escape(value.as_str()).into_owned(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// 具名替换
///
/// 找到第一个 id 匹配的元素并替换其文本。没有该元素时返回原文本（逐字节相同）。
pub fn update_field(document: &str, id: &str, value: &str) -> Result<String, DocumentError> {
    let mut tree = SvgDocument::parse(document)?;
    match tree.find_by_id_mut(id) {
        Some(element) => {
            element.set_text_content(value);
            Ok(tree.to_string())
        }
        None => {
            debug!("模板中没有字段 {}，保持不变", id);
            Ok(document.to_string())
        }
    }
}

/// 同时应用多个具名替换
pub fn update_fields<'a, I>(document: &str, fields: I) -> Result<String, DocumentError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut text: Cow<'_, str> = Cow::Borrowed(document);
    for (id, value) in fields {
        text = Cow::Owned(update_field(&text, id, value)?);
    }
    Ok(text.into_owned())
}
