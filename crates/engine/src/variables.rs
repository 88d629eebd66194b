//! 变量注册表与变量解析
//!
//! 宿主类型通过 [`VariableRegistry::builder`] 在定义期一次性登记自己暴露的变量，
//! 引擎只按名称查询注册表，从不在运行期做反射。

use crate::error::{Result, RuleError};
use crate::operators::ValueKind;
use crate::params::{BoundParams, ParamSpec, SelectOption, bind, validate_schema};
use crate::types::{StateComparator, TypedValue};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

type VariableHandler<T> = Box<dyn Fn(&T, &BoundParams) -> Result<Value> + Send + Sync>;

/// 变量提供方
///
/// 注册表按类型构建一次，通常放在 `LazyLock` 静态变量中。
pub trait Variables: Sized + 'static {
    fn registry() -> &'static VariableRegistry<Self>;
}

/// 变量元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDefinition {
    pub name: String,
    pub label: String,
    pub field_type: ValueKind,
    pub options: Vec<SelectOption>,
    pub docs: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        let name = name.into();
        Self {
            label: crate::fields::pretty_label(&name),
            name,
            field_type: kind,
            options: Vec::new(),
            docs: None,
            params: Vec::new(),
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Numeric)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Boolean)
    }

    pub fn select(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Select)
    }

    pub fn select_multiple(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::SelectMultiple)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = Some(docs.into());
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

    pub fn params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }
}

struct Variable<T> {
    definition: VariableDefinition,
    handler: VariableHandler<T>,
}

/// 变量注册表
pub struct VariableRegistry<T> {
    provider: String,
    variables: BTreeMap<String, Variable<T>>,
    state_comparator: Option<Box<StateComparator>>,
}

impl<T> VariableRegistry<T> {
    pub fn builder(provider: impl Into<String>) -> VariableRegistryBuilder<T> {
        VariableRegistryBuilder {
            provider: provider.into(),
            variables: Vec::new(),
            state_comparator: None,
        }
    }

    /// 提供方名称，用于错误信息
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.get(name).map(|v| &v.definition)
    }

    /// 全部变量定义（按名称排序）
    pub fn definitions(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.variables.values().map(|v| &v.definition)
    }

    /// 调用变量方法并包装为类型化的值
    pub fn value(&self, instance: &T, name: &str, params: &Map<String, Value>) -> Result<TypedValue> {
        let variable = self.variables.get(name).ok_or_else(|| {
            RuleError::definition(format!(
                "Variable {} or params {} is not defined in class {}",
                name,
                Value::Object(params.clone()),
                self.provider
            ))
        })?;

        let bound = bind(name, &variable.definition.params, params)?;
        let raw = (variable.handler)(instance, &bound)?;

        TypedValue::new(variable.definition.field_type, raw)
    }

    /// 解析变量并执行操作符
    pub fn resolve(
        &self,
        instance: &T,
        name: &str,
        operator: &str,
        comparison: &Value,
        params: &Map<String, Value>,
    ) -> Result<bool> {
        let value = self.value(instance, name, params)?;
        let op = value.operator(operator)?;
        let result = value.evaluate(op, comparison, self.state_comparator.as_deref())?;

        trace!(variable = name, operator, %comparison, result, "condition resolved");
        Ok(result)
    }
}

impl<T> fmt::Debug for VariableRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableRegistry")
            .field("provider", &self.provider)
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("state_comparator", &self.state_comparator.is_some())
            .finish()
    }
}

/// 变量注册表构建器
pub struct VariableRegistryBuilder<T> {
    provider: String,
    variables: Vec<Variable<T>>,
    state_comparator: Option<Box<StateComparator>>,
}

impl<T> VariableRegistryBuilder<T> {
    /// 登记一个变量
    pub fn variable<F, R>(mut self, definition: VariableDefinition, handler: F) -> Self
    where
        F: Fn(&T, &BoundParams) -> Result<R> + Send + Sync + 'static,
        R: Into<Value>,
    {
        self.variables.push(Variable {
            definition,
            handler: Box::new(move |instance, params| handler(instance, params).map(Into::into)),
        });
        self
    }

    /// 登记 `compare_state_with_item` 的宿主实现
    pub fn state_comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&[Value], &Value) -> Result<bool> + Send + Sync + 'static,
    {
        self.state_comparator = Some(Box::new(comparator));
        self
    }

    /// 校验定义并生成注册表
    pub fn build(self) -> Result<VariableRegistry<T>> {
        let mut variables = BTreeMap::new();
        for variable in self.variables {
            let name = variable.definition.name.clone();
            if name.is_empty() {
                return Err(RuleError::definition(format!(
                    "Empty variable name in class {}",
                    self.provider
                )));
            }
            validate_schema(&name, &variable.definition.params)?;
            if variables.insert(name.clone(), variable).is_some() {
                return Err(RuleError::definition(format!(
                    "Variable {} is defined more than once in class {}",
                    name, self.provider
                )));
            }
        }

        Ok(VariableRegistry {
            provider: self.provider,
            variables,
            state_comparator: self.state_comparator,
        })
    }
}

/// 在提供方实例上解析变量条件
pub fn resolve<V: Variables>(
    provider: &V,
    name: &str,
    operator: &str,
    comparison: &Value,
    params: &Map<String, Value>,
) -> Result<bool> {
    V::registry().resolve(provider, name, operator, comparison, params)
}
