//! 动作注册表与动作分发

use crate::error::{Result, RuleError};
use crate::fields::pretty_label;
use crate::params::{BoundParams, ParamSpec, bind, validate_schema};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

type ActionHandler<T> = Box<dyn Fn(&mut T, &BoundParams) -> Result<()> + Send + Sync>;

/// 动作提供方
///
/// 注册表按类型构建一次（通常放在 `LazyLock` 静态变量中），
/// 与实例状态无关，动作处理函数才能以可变方式借用实例。
pub trait Actions: Sized + 'static {
    fn registry() -> &'static ActionRegistry<Self>;
}

/// 动作元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub name: String,
    pub label: String,
    pub docs: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: pretty_label(&name),
            name,
            docs: None,
            params: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = Some(docs.into());
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

struct Action<T> {
    definition: ActionDefinition,
    handler: ActionHandler<T>,
}

/// 动作注册表
pub struct ActionRegistry<T> {
    provider: String,
    actions: BTreeMap<String, Action<T>>,
}

impl<T> ActionRegistry<T> {
    pub fn builder(provider: impl Into<String>) -> ActionRegistryBuilder<T> {
        ActionRegistryBuilder {
            provider: provider.into(),
            actions: Vec::new(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ActionDefinition> {
        self.actions.get(name).map(|a| &a.definition)
    }

    /// 全部动作定义（按名称排序）
    pub fn definitions(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.values().map(|a| &a.definition)
    }

    /// 校验参数并执行动作，返回值被丢弃
    pub fn dispatch(&self, instance: &mut T, name: &str, params: &Map<String, Value>) -> Result<()> {
        let action = self.actions.get(name).ok_or_else(|| {
            RuleError::definition(format!(
                "Action {} or params {} is not defined in class {}",
                name,
                Value::Object(params.clone()),
                self.provider
            ))
        })?;

        let bound = bind(name, &action.definition.params, params)?;
        (action.handler)(instance, &bound)?;

        debug!(action = name, provider = %self.provider, "action dispatched");
        Ok(())
    }
}

impl<T> fmt::Debug for ActionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("provider", &self.provider)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 动作注册表构建器
pub struct ActionRegistryBuilder<T> {
    provider: String,
    actions: Vec<Action<T>>,
}

impl<T> ActionRegistryBuilder<T> {
    /// 登记一个动作
    pub fn action<F, R>(mut self, definition: ActionDefinition, handler: F) -> Self
    where
        F: Fn(&mut T, &BoundParams) -> Result<R> + Send + Sync + 'static,
    {
        self.actions.push(Action {
            definition,
            handler: Box::new(move |instance, params| handler(instance, params).map(|_| ())),
        });
        self
    }

    /// 校验定义并生成注册表
    pub fn build(self) -> Result<ActionRegistry<T>> {
        let mut actions = BTreeMap::new();
        for action in self.actions {
            let name = action.definition.name.clone();
            if name.is_empty() {
                return Err(RuleError::definition(format!(
                    "Empty action name in class {}",
                    self.provider
                )));
            }
            validate_schema(&name, &action.definition.params)?;
            if actions.insert(name.clone(), action).is_some() {
                return Err(RuleError::definition(format!(
                    "Action {} is defined more than once in class {}",
                    name, self.provider
                )));
            }
        }

        Ok(ActionRegistry {
            provider: self.provider,
            actions,
        })
    }
}

/// 在提供方实例上执行动作
#[instrument(skip(provider, params), fields(provider = A::registry().provider()))]
pub fn dispatch<A: Actions>(provider: &mut A, name: &str, params: &Map<String, Value>) -> Result<()> {
    A::registry().dispatch(provider, name, params)
}
