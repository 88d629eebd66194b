//! 规则操作符定义
//!
//! 每种值类型只暴露属于自己的操作符集合，同名操作符（如 `contains`）
//! 在不同类型上语义不同，由 [`ValueKind`] 决定合法性。

use crate::fields::{FieldType, pretty_label};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Numeric,
    String,
    Boolean,
    Select,
    SelectMultiple,
}

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        Self::Numeric,
        Self::String,
        Self::Boolean,
        Self::Select,
        Self::SelectMultiple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Select => "select",
            Self::SelectMultiple => "select_multiple",
        }
    }

    /// 该类型注册的全部操作符
    pub fn operators(&self) -> &'static [Operator] {
        use Operator::*;
        match self {
            Self::Numeric => &[
                EqualTo,
                NotEqualTo,
                GreaterThan,
                GreaterThanOrEqualTo,
                LessThan,
                LessThanOrEqualTo,
                DoesNotExist,
            ],
            Self::String => &[
                EqualTo,
                NotEqualTo,
                EqualToCaseInsensitive,
                NotEqualToCaseInsensitive,
                Contains,
                DoesNotContain,
                ContainsCaseInsensitive,
                DoesNotContainCaseInsensitive,
                StartsWith,
                DoesNotStartWith,
                EndsWith,
                DoesNotEndWith,
                MatchesRegex,
                DoesNotMatchRegex,
                IsEmpty,
                NonEmpty,
            ],
            Self::Boolean => &[IsTrue, IsFalse],
            Self::Select => &[Contains, ContainsAny, ContainsAll, DoesNotContain],
            Self::SelectMultiple => &[
                ContainsAll,
                IsContainedBy,
                SharesAtLeastOneElementWith,
                SharesExactlyOneElementWith,
                SharesNoElementsWith,
                CompareStateWithItem,
            ],
        }
    }

    pub fn supports(&self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    /// 按名称查找该类型上的操作符
    pub fn operator(&self, name: &str) -> Option<Operator> {
        Operator::from_name(name).filter(|op| self.supports(*op))
    }

    /// 操作符在界面上需要的输入类型
    pub fn input_type(&self, operator: Operator) -> FieldType {
        match (self, operator) {
            (_, Operator::DoesNotExist | Operator::IsEmpty | Operator::NonEmpty) => FieldType::None,
            (Self::Numeric, _) => FieldType::Numeric,
            (Self::String, _) => FieldType::Text,
            (Self::Boolean, _) => FieldType::None,
            (Self::Select, _) => FieldType::Select,
            (Self::SelectMultiple, _) => FieldType::SelectMultiple,
        }
    }

    /// 操作符目录（按名称排序），供元数据导出使用
    pub fn operator_catalog(&self) -> Vec<OperatorInfo> {
        let mut catalog: Vec<OperatorInfo> = self
            .operators()
            .iter()
            .map(|op| OperatorInfo {
                name: op.name(),
                label: op.label(),
                input_type: self.input_type(*op),
            })
            .collect();
        catalog.sort_by(|a, b| a.name.cmp(b.name));
        catalog
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // 通用比较
    EqualTo,
    NotEqualTo,

    // 数值比较
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    DoesNotExist,

    // 字符串操作
    EqualToCaseInsensitive,
    NotEqualToCaseInsensitive,
    Contains,
    DoesNotContain,
    ContainsCaseInsensitive,
    DoesNotContainCaseInsensitive,
    StartsWith,
    DoesNotStartWith,
    EndsWith,
    DoesNotEndWith,
    MatchesRegex,
    DoesNotMatchRegex,
    IsEmpty,
    NonEmpty,

    // 布尔
    IsTrue,
    IsFalse,

    // 集合操作
    ContainsAny,
    ContainsAll,
    IsContainedBy,
    SharesAtLeastOneElementWith,
    SharesExactlyOneElementWith,
    SharesNoElementsWith,

    // 宿主扩展点
    CompareStateWithItem,
}

impl Operator {
    pub const ALL: [Operator; 30] = [
        Self::EqualTo,
        Self::NotEqualTo,
        Self::GreaterThan,
        Self::GreaterThanOrEqualTo,
        Self::LessThan,
        Self::LessThanOrEqualTo,
        Self::DoesNotExist,
        Self::EqualToCaseInsensitive,
        Self::NotEqualToCaseInsensitive,
        Self::Contains,
        Self::DoesNotContain,
        Self::ContainsCaseInsensitive,
        Self::DoesNotContainCaseInsensitive,
        Self::StartsWith,
        Self::DoesNotStartWith,
        Self::EndsWith,
        Self::DoesNotEndWith,
        Self::MatchesRegex,
        Self::DoesNotMatchRegex,
        Self::IsEmpty,
        Self::NonEmpty,
        Self::IsTrue,
        Self::IsFalse,
        Self::ContainsAny,
        Self::ContainsAll,
        Self::IsContainedBy,
        Self::SharesAtLeastOneElementWith,
        Self::SharesExactlyOneElementWith,
        Self::SharesNoElementsWith,
        Self::CompareStateWithItem,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EqualTo => "equal_to",
            Self::NotEqualTo => "not_equal_to",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEqualTo => "greater_than_or_equal_to",
            Self::LessThan => "less_than",
            Self::LessThanOrEqualTo => "less_than_or_equal_to",
            Self::DoesNotExist => "does_not_exist",
            Self::EqualToCaseInsensitive => "equal_to_case_insensitive",
            Self::NotEqualToCaseInsensitive => "not_equal_to_case_insensitive",
            Self::Contains => "contains",
            Self::DoesNotContain => "does_not_contain",
            Self::ContainsCaseInsensitive => "contains_case_insensitive",
            Self::DoesNotContainCaseInsensitive => "does_not_contain_case_insensitive",
            Self::StartsWith => "starts_with",
            Self::DoesNotStartWith => "does_not_start_with",
            Self::EndsWith => "ends_with",
            Self::DoesNotEndWith => "does_not_end_with",
            Self::MatchesRegex => "matches_regex",
            Self::DoesNotMatchRegex => "does_not_match_regex",
            Self::IsEmpty => "is_empty",
            Self::NonEmpty => "non_empty",
            Self::IsTrue => "is_true",
            Self::IsFalse => "is_false",
            Self::ContainsAny => "contains_any",
            Self::ContainsAll => "contains_all",
            Self::IsContainedBy => "is_contained_by",
            Self::SharesAtLeastOneElementWith => "shares_at_least_one_element_with",
            Self::SharesExactlyOneElementWith => "shares_exactly_one_element_with",
            Self::SharesNoElementsWith => "shares_no_elements_with",
            Self::CompareStateWithItem => "compare_state_with_item",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// 展示标签
    pub fn label(&self) -> String {
        match self {
            Self::EqualToCaseInsensitive => "Equal To (case insensitive)".to_string(),
            Self::NotEqualToCaseInsensitive => "Not equal To (case insensitive)".to_string(),
            Self::ContainsCaseInsensitive => "Contains (case insensitive)".to_string(),
            Self::DoesNotContainCaseInsensitive => {
                "Does not contain (case insensitive)".to_string()
            }
            Self::CompareStateWithItem => {
                "Compare State With Item (Only for Posting Rule Engine)".to_string()
            }
            _ => pretty_label(self.name()),
        }
    }

    /// 是否需要比较值
    pub fn takes_operand(&self) -> bool {
        !matches!(
            self,
            Self::DoesNotExist | Self::IsEmpty | Self::NonEmpty | Self::IsTrue | Self::IsFalse
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 操作符元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorInfo {
    pub name: &'static str,
    pub label: String,
    pub input_type: FieldType,
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    pub fn key(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
        }
    }
}
