//! 收件人名单
//!
//! 两种来源（分隔文本 / 手动录入）都归一化为 `Vec<Record>`，
//! 主字段（第 0 个值）为空的记录会被丢弃

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 单个收件人的数据（有序的字符串值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Vec<String>);

impl Record {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// 主字段（姓名），没有值时为空串
    pub fn primary(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn has_primary(&self) -> bool {
        !self.primary().trim().is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Record {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// 解析分隔文本：按行拆分，再按分隔符拆分字段
///
/// 全空白的行被丢弃；不处理引号转义
pub fn parse_delimited(text: &str, delimiter: char) -> Vec<Record> {
    let rows: Vec<Record> = text
        .lines()
        .map(|line| line.split(delimiter).collect::<Record>())
        .filter(|row| row.values().iter().any(|cell| !cell.trim().is_empty()))
        .collect();
    debug!("分隔文本解析出 {} 行", rows.len());
    normalize(rows)
}

/// 手动录入的名单
pub fn from_manual(entries: Vec<Vec<String>>) -> Vec<Record> {
    normalize(entries.into_iter().map(Record::new).collect())
}

/// 丢弃主字段为空的记录，保持原有顺序
pub fn normalize(records: Vec<Record>) -> Vec<Record> {
    let total = records.len();
    let kept: Vec<Record> = records.into_iter().filter(Record::has_primary).collect();
    if kept.len() < total {
        debug!("丢弃 {} 条主字段为空的记录", total - kept.len());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_manual_entry_drops_empty_primary() {
        let records = from_manual(vec![strings(&["Grace Hopper", "", ""]), strings(&["", ""])]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary(), "Grace Hopper");
    }

    #[test]
    fn test_parse_delimited() {
        let text = "Ada Lovelace,Outstanding Work,June 1\r\n\r\n  ,  \nAlan Turing,Codebreaking\n,orphan message\n";
        let records = parse_delimited(text, ',');
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].values(),
            &strings(&["Ada Lovelace", "Outstanding Work", "June 1"])[..]
        );
        assert_eq!(records[1].values(), &strings(&["Alan Turing", "Codebreaking"])[..]);
    }

    #[test]
    fn test_parse_delimited_custom_delimiter() {
        let records = parse_delimited("Ada;Math\nAlan;CS", ';');
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].values()[1], "CS");
    }

    #[test]
    fn test_parse_delimited_empty_input() {
        assert!(parse_delimited("", ',').is_empty());
        assert!(parse_delimited("\n\n", ',').is_empty());
    }

    #[test]
    fn test_primary_of_empty_record() {
        let record = Record::new(Vec::new());
        assert_eq!(record.primary(), "");
        assert!(record.is_empty());
    }
}
