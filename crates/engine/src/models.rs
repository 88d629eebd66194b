//! 规则引擎领域模型
//!
//! 条件树、动作描述和规则都是调用方持有的只读输入，
//! 线上格式是普通 JSON，序列化后与输入结构一致。

use crate::error::{Result, RuleError};
use crate::operators::LogicalOperator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Rule {
    pub conditions: ConditionNode,
    pub actions: Vec<ActionSpec>,
}

impl Rule {
    pub fn new(conditions: ConditionNode, actions: Vec<ActionSpec>) -> Self {
        Self {
            conditions,
            actions,
        }
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::try_from(value)
    }

    /// 解析规则集合
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        let value: Value = serde_json::from_str(json)?;
        match value {
            Value::Array(items) => items.into_iter().map(Self::try_from).collect(),
            _ => Err(RuleError::definition("Rule set must be a JSON array")),
        }
    }
}

impl TryFrom<Value> for Rule {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(RuleError::definition("Rule must be a JSON object"));
        };

        let conditions = map
            .remove("conditions")
            .ok_or_else(|| RuleError::definition("Rule is missing 'conditions'"))?;
        let conditions = ConditionNode::parse(conditions, "conditions")?;

        let actions = match map.remove("actions") {
            None | Some(Value::Null) => Vec::new(),
            Some(actions) => serde_json::from_value(actions).map_err(|e| {
                RuleError::definition(format!("Invalid actions: {}", e))
            })?,
        };

        Ok(Self {
            conditions,
            actions,
        })
    }
}

/// 条件节点（叶子条件或逻辑组）
///
/// `and` / `or` 接受条件数组，`not` 只接受单个条件对象。
/// 序列化时叶子条件总是带 `value`（缺省为 null），空的 `params` 不输出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ConditionNode {
    Condition(Condition),
    Group(LogicalGroup),
}

impl ConditionNode {
    /// 解析条件树，`path` 用于定位出错的节点
    fn parse(value: Value, path: &str) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(RuleError::definition(format!(
                "Condition node '{}' must be a JSON object",
                path
            )));
        };

        let logical: Vec<LogicalOperator> = map
            .keys()
            .filter_map(|key| LogicalOperator::from_key(key))
            .collect();

        match logical.as_slice() {
            [] if map.contains_key("name") => {
                let condition: Condition =
                    serde_json::from_value(Value::Object(map)).map_err(|e| {
                        RuleError::definition(format!("Invalid condition '{}': {}", path, e))
                    })?;
                Ok(Self::Condition(condition))
            }
            [operator] if map.len() == 1 => {
                let operator = *operator;
                let child_path = format!("{}.{}", path, operator.key());
                let children = match (operator, map.into_iter().next().map(|(_, v)| v)) {
                    (LogicalOperator::Not, Some(child @ Value::Object(_))) => {
                        vec![Self::parse(child, &child_path)?]
                    }
                    (LogicalOperator::And | LogicalOperator::Or, Some(Value::Array(items))) => items
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| Self::parse(item, &format!("{}[{}]", child_path, i)))
                        .collect::<Result<Vec<_>>>()?,
                    _ => {
                        return Err(RuleError::definition(format!(
                            "Logical group '{}' has an invalid child list",
                            child_path
                        )));
                    }
                };

                let group = LogicalGroup { operator, children };
                group.validate(&child_path)?;
                Ok(Self::Group(group))
            }
            _ => Err(RuleError::definition(format!(
                "Unrecognized condition node '{}': {}",
                path,
                Value::Object(map)
            ))),
        }
    }
}

impl TryFrom<Value> for ConditionNode {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        Self::parse(value, "root")
    }
}

impl From<ConditionNode> for Value {
    fn from(node: ConditionNode) -> Self {
        match node {
            ConditionNode::Condition(condition) => Value::from(condition),
            ConditionNode::Group(group) => {
                let children = match group.operator {
                    LogicalOperator::Not if group.children.len() == 1 => {
                        group.children.into_iter().map(Value::from).next().unwrap_or_default()
                    }
                    _ => Value::Array(group.children.into_iter().map(Value::from).collect()),
                };
                let mut map = Map::new();
                map.insert(group.operator.key().to_string(), children);
                Value::Object(map)
            }
        }
    }
}

impl From<Condition> for ConditionNode {
    fn from(condition: Condition) -> Self {
        Self::Condition(condition)
    }
}

impl From<LogicalGroup> for ConditionNode {
    fn from(group: LogicalGroup) -> Self {
        Self::Group(group)
    }
}

/// 叶子条件：变量 / 操作符 / 比较值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl Condition {
    pub fn new(
        name: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            operator: operator.into(),
            value: value.into(),
            params: Map::new(),
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(condition.name));
        map.insert("operator".to_string(), Value::String(condition.operator));
        map.insert("value".to_string(), condition.value);
        if !condition.params.is_empty() {
            map.insert("params".to_string(), Value::Object(condition.params));
        }
        Value::Object(map)
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalGroup {
    pub operator: LogicalOperator,
    pub children: Vec<ConditionNode>,
}

impl LogicalGroup {
    pub fn new(operator: LogicalOperator, children: Vec<ConditionNode>) -> Self {
        Self { operator, children }
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::Or, children)
    }

    pub fn not(child: ConditionNode) -> Self {
        Self::new(LogicalOperator::Not, vec![child])
    }

    /// 空的 and/or 组语义未定义，一律拒绝；not 组必须恰好一个子节点
    pub fn validate(&self, path: &str) -> Result<()> {
        match (self.operator, self.children.len()) {
            (_, 0) => Err(RuleError::definition(format!(
                "Logical group '{}' must contain at least one condition",
                path
            ))),
            (LogicalOperator::Not, n) if n != 1 => Err(RuleError::definition(format!(
                "Logical group '{}' must contain exactly one condition, found {}",
                path, n
            ))),
            _ => Ok(()),
        }
    }
}

/// 动作描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }
}
