//! 规则引擎错误类型
//!
//! 规则或 provider 定义错误属于编写期缺陷，引擎内部从不吞掉错误，
//! 全部原样传播给调用方。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    /// 引用了不存在的变量、动作或非法的条件树结构
    #[error("{0}")]
    Definition(String),

    #[error(
        "{callable}() missing {} required positional argument{}: {}",
        .missing.len(),
        plural(.missing.len()),
        enumerate(.missing)
    )]
    MissingArguments {
        callable: String,
        missing: Vec<String>,
    },

    #[error(
        "{callable}() got unexpected keyword argument{}: {}",
        plural(.unexpected.len()),
        enumerate(.unexpected)
    )]
    UnexpectedArguments {
        callable: String,
        unexpected: Vec<String>,
    },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("operator {operator} is not defined for type {kind}")]
    UnknownOperator { operator: String, kind: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Definition,
    Argument,
    TypeMismatch,
    UnknownOperator,
    Serialization,
}

impl RuleError {
    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition(message.into())
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// 获取错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Definition(_) => ErrorCategory::Definition,
            Self::MissingArguments { .. } | Self::UnexpectedArguments { .. } => {
                ErrorCategory::Argument
            }
            Self::TypeMismatch { .. } => ErrorCategory::TypeMismatch,
            Self::UnknownOperator { .. } => ErrorCategory::UnknownOperator,
            Self::Json(_) => ErrorCategory::Serialization,
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Definition(_) => "DEFINITION_ERROR",
            Self::MissingArguments { .. } => "MISSING_ARGUMENTS",
            Self::UnexpectedArguments { .. } => "UNEXPECTED_ARGUMENTS",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::UnknownOperator { .. } => "UNKNOWN_OPERATOR",
            Self::Json(_) => "SERIALIZATION_ERROR",
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// 'x' / 'x' and 'y' / 'x', 'y' and 'z'
fn enumerate(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
