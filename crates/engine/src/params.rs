//! 参数 schema 与参数绑定
//!
//! 变量和动作方法都通过 [`ParamSpec`] 声明自己接受的命名参数，
//! 调用前由 [`bind`] 校验缺失与多余的参数。

use crate::error::{Result, RuleError};
use crate::fields::{FieldType, pretty_label};
use crate::types::type_name;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// 下拉选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub name: String,
}

impl SelectOption {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
        }
    }
}

impl From<&str> for SelectOption {
    fn from(name: &str) -> Self {
        Self::new(name, pretty_label(name))
    }
}

/// 参数 schema 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub label: String,
    #[serde(rename = "fieldType")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// 未提供时绑定失败
    #[serde(default = "default_required", skip_serializing_if = "is_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

fn is_required(required: &bool) -> bool {
    *required
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            label: pretty_label(&name),
            name,
            field_type,
            options: Vec::new(),
            required: true,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn options<I, O>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<SelectOption>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// 由 `{name: fieldType}` 形式生成 schema，标签自动推导
    pub fn from_pairs<'a, I>(pairs: I) -> Vec<ParamSpec>
    where
        I: IntoIterator<Item = (&'a str, FieldType)>,
    {
        pairs
            .into_iter()
            .map(|(name, field_type)| Self::new(name, field_type))
            .collect()
    }
}

/// 定义期校验：参数名非空且不重复
pub fn validate_schema(callable: &str, schema: &[ParamSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for param in schema {
        if param.name.is_empty() {
            return Err(RuleError::definition(format!(
                "Empty parameter name specified for {}",
                callable
            )));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(RuleError::definition(format!(
                "Duplicate parameter name {} specified for {}",
                param.name, callable
            )));
        }
    }
    Ok(())
}

/// 按 schema 绑定调用参数
///
/// 多余参数先于缺失参数报告；两类错误都列出全部相关参数名。
pub fn bind(callable: &str, schema: &[ParamSpec], params: &Map<String, Value>) -> Result<BoundParams> {
    let unexpected: Vec<String> = params
        .keys()
        .filter(|key| !schema.iter().any(|p| &p.name == *key))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        return Err(RuleError::UnexpectedArguments {
            callable: callable.to_string(),
            unexpected,
        });
    }

    let missing: Vec<String> = schema
        .iter()
        .filter(|p| p.required && !params.contains_key(&p.name))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(RuleError::MissingArguments {
            callable: callable.to_string(),
            missing,
        });
    }

    Ok(BoundParams {
        values: params.clone(),
    })
}

/// 已校验的参数集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams {
    values: Map<String, Value>,
}

impl BoundParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// 获取原始参数值
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| RuleError::definition(format!("Parameter {} is not bound", name)))
    }

    /// 反序列化参数值
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.value(name)?;
        serde_json::from_value(value.clone()).map_err(|_| {
            RuleError::type_mismatch(std::any::type_name::<T>(), type_name(value))
        })
    }

    /// 可选参数，未提供或为 null 时返回 `None`
    pub fn opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get(name).map(Some),
        }
    }

    pub fn f64(&self, name: &str) -> Result<f64> {
        let value = self.value(name)?;
        value
            .as_f64()
            .ok_or_else(|| RuleError::type_mismatch("numeric", type_name(value)))
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        let value = self.value(name)?;
        value
            .as_str()
            .ok_or_else(|| RuleError::type_mismatch("string", type_name(value)))
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        let value = self.value(name)?;
        value
            .as_bool()
            .ok_or_else(|| RuleError::type_mismatch("boolean", type_name(value)))
    }
}
