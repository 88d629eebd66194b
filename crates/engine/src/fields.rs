//! 字段类型定义
//!
//! 参数 schema 的 `fieldType` 与操作符的 `input_type` 共用同一组取值。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 输入字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// 无需输入
    None,
    Text,
    Numeric,
    Select,
    SelectMultiple,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Text => "text",
            Self::Numeric => "numeric",
            Self::Select => "select",
            Self::SelectMultiple => "select_multiple",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 由蛇形命名生成展示标签，如 `this_is_rule_1` -> `This Is Rule 1`
pub fn pretty_label(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
