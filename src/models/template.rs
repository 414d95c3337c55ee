//! 模板文档
//!
//! 持有当前的 SVG 模板文本，并按字段 id 提供读写能力

use std::fmt;

use crate::error::DocumentError;
use crate::models::svg::SvgDocument;
use crate::services::substitution;

/// 交互式定制时默认展示的三个字段
pub const STANDARD_FIELDS: [&str; 3] = ["name", "message", "date"];

/// 模板文档（SVG 文本）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    text: String,
}

impl TemplateDocument {
    /// 从文本创建模板，要求是可以解析的 SVG 文档
    pub fn parse(text: impl Into<String>) -> Result<Self, DocumentError> {
        let text = text.into();
        SvgDocument::parse(&text)?;
        Ok(Self { text })
    }

    /// 不做校验，直接包装文本（用于用户直接编辑代码的情况）
    pub fn from_raw(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// 解析成文档树
    pub fn tree(&self) -> Result<SvgDocument, DocumentError> {
        SvgDocument::parse(&self.text)
    }

    /// 模板中所有可编辑的字段 id
    pub fn field_ids(&self) -> Vec<String> {
        self.tree().map(|doc| doc.text_field_ids()).unwrap_or_default()
    }

    /// 读取字段当前的文本
    pub fn field(&self, id: &str) -> Option<String> {
        let doc = self.tree().ok()?;
        doc.find_by_id(id).map(|element| element.text_content())
    }

    /// 修改字段文本；字段不存在时文档保持不变
    pub fn set_field(&mut self, id: &str, value: &str) -> Result<(), DocumentError> {
        self.text = substitution::update_field(&self.text, id, value)?;
        Ok(())
    }
}

impl fmt::Display for TemplateDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"<svg width="800" height="600" xmlns="http://www.w3.org/2000/svg"><text id="name">John Doe</text><text id="date">June 1, 2023</text></svg>"#;

    #[test]
    fn test_field_read_write() {
        let mut template = TemplateDocument::parse(TEMPLATE).unwrap();
        assert_eq!(template.field_ids(), vec!["name", "date"]);
        assert_eq!(template.field("name").as_deref(), Some("John Doe"));

        template.set_field("name", "Ada Lovelace").unwrap();
        assert_eq!(template.field("name").as_deref(), Some("Ada Lovelace"));
        assert_eq!(template.field("date").as_deref(), Some("June 1, 2023"));
    }

    #[test]
    fn test_missing_field_is_noop() {
        let mut template = TemplateDocument::parse(TEMPLATE).unwrap();
        template.set_field("message", "ignored").unwrap();
        assert_eq!(template.as_str(), TEMPLATE);
        assert_eq!(template.field("message"), None);
    }

    #[test]
    fn test_parse_rejects_non_svg() {
        assert!(TemplateDocument::parse("not a document").is_err());
    }
}
