//! SVG 文档树
//!
//! 把模板文本解析成显式的节点树，字段替换只在树上进行，
//! 然后再序列化回文本。未修改的节点保持原始（已转义）文本。

use std::fmt;

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DocumentError;

/// 可以作为可编辑字段的文本元素
const TEXT_ELEMENTS: [&str; 3] = ["text", "tspan", "textPath"];

/// 文档节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvgNode {
    Element(SvgElement),
    /// 原始（已转义）文本
    Text(String),
    CData(String),
    Comment(String),
    Declaration(String),
    ProcessingInstruction(String),
    DocType(String),
}

/// 元素节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgElement {
    pub name: String,
    /// 属性（值保持原始转义形式）
    pub attributes: Vec<(String, String)>,
    pub children: Vec<SvgNode>,
    pub self_closing: bool,
}

/// 解析后的 SVG 文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgDocument {
    nodes: Vec<SvgNode>,
}

impl SvgDocument {
    /// 解析文档文本
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut nodes: Vec<SvgNode> = Vec::new();
        let mut stack: Vec<SvgElement> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| DocumentError::Parse {
                position: reader.error_position(),
                message: e.to_string(),
            })?;

            let node = match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&start, false, reader.buffer_position())?);
                    continue;
                }
                Event::Empty(start) => SvgNode::Element(element_from_start(
                    &start,
                    true,
                    reader.buffer_position(),
                )?),
                Event::End(_) => match stack.pop() {
                    Some(element) => SvgNode::Element(element),
                    None => {
                        return Err(DocumentError::Parse {
                            position: reader.buffer_position(),
                            message: "多余的结束标签".to_string(),
                        })
                    }
                },
                Event::Text(t) => SvgNode::Text(lossy(&t)),
                Event::CData(t) => SvgNode::CData(lossy(&t)),
                Event::Comment(t) => SvgNode::Comment(lossy(&t)),
                Event::Decl(t) => SvgNode::Declaration(lossy(&t)),
                Event::PI(t) => SvgNode::ProcessingInstruction(lossy(&t)),
                Event::DocType(t) => SvgNode::DocType(lossy(&t)),
                Event::Eof => break,
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::Unclosed(open.name));
        }

        let document = Self { nodes };
        if document.root().is_none() {
            return Err(DocumentError::MissingRoot);
        }
        Ok(document)
    }

    /// 根元素
    pub fn root(&self) -> Option<&SvgElement> {
        self.nodes.iter().find_map(|node| match node {
            SvgNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// 按文档顺序查找第一个带有指定 id 的元素
    pub fn find_by_id(&self, id: &str) -> Option<&SvgElement> {
        self.nodes.iter().find_map(|node| match node {
            SvgNode::Element(element) => element.find_by_id(id),
            _ => None,
        })
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut SvgElement> {
        self.nodes.iter_mut().find_map(|node| match node {
            SvgNode::Element(element) => element.find_by_id_mut(id),
            _ => None,
        })
    }

    /// 所有带 id 的文本元素（可编辑字段）
    pub fn text_field_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for node in &self.nodes {
            if let SvgNode::Element(element) = node {
                element.collect_text_ids(&mut ids);
            }
        }
        ids
    }
}

impl SvgElement {
    /// 读取属性的原始值
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 元素内所有文本（已反转义）
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    /// 用单个文本节点替换全部子节点
    pub fn set_text_content(&mut self, value: &str) {
        self.children = vec![SvgNode::Text(escape(value).into_owned())];
        self.self_closing = false;
    }

    fn push_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                SvgNode::Text(raw) => match unescape(raw) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(raw),
                },
                SvgNode::CData(raw) => out.push_str(raw),
                SvgNode::Element(element) => element.push_text(out),
                _ => {}
            }
        }
    }

    fn find_by_id(&self, id: &str) -> Option<&SvgElement> {
        if self.attr("id") == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            SvgNode::Element(element) => element.find_by_id(id),
            _ => None,
        })
    }

    fn find_by_id_mut(&mut self, id: &str) -> Option<&mut SvgElement> {
        if self.attr("id") == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| match child {
            SvgNode::Element(element) => element.find_by_id_mut(id),
            _ => None,
        })
    }

    fn collect_text_ids(&self, ids: &mut Vec<String>) {
        if TEXT_ELEMENTS.contains(&self.name.as_str()) {
            if let Some(id) = self.attr("id") {
                ids.push(id.to_string());
            }
        }
        for child in &self.children {
            if let SvgNode::Element(element) = child {
                element.collect_text_ids(ids);
            }
        }
    }
}

impl fmt::Display for SvgDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for SvgNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvgNode::Element(element) => write!(f, "{}", element),
            SvgNode::Text(raw) => f.write_str(raw),
            SvgNode::CData(raw) => write!(f, "<![CDATA[{}]]>", raw),
            SvgNode::Comment(raw) => write!(f, "<!--{}-->", raw),
            SvgNode::Declaration(raw) | SvgNode::ProcessingInstruction(raw) => {
                write!(f, "<?{}?>", raw)
            }
            SvgNode::DocType(raw) => write!(f, "<!DOCTYPE {}>", raw),
        }
    }
}

impl fmt::Display for SvgElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            if value.contains('"') {
                write!(f, " {}='{}'", key, value)?;
            } else {
                write!(f, " {}=\"{}\"", key, value)?;
            }
        }
        if self.self_closing && self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.name)
    }
}

fn element_from_start(
    start: &BytesStart<'_>,
    self_closing: bool,
    position: u64,
) -> Result<SvgElement, DocumentError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocumentError::Parse {
            position,
            message: e.to_string(),
        })?;
        attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }

    Ok(SvgElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        self_closing,
    })
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
