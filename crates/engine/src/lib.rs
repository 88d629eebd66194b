//! 业务规则引擎
//!
//! 前向求值的业务规则引擎：
//! - 宿主类型通过注册表声明变量与动作
//! - JSON 条件树（and / or / not）短路求值
//! - 条件成立时按顺序分发动作
//! - 导出变量、动作与操作符元数据

pub mod actions;
pub mod error;
pub mod executor;
pub mod export;
pub mod fields;
pub mod models;
pub mod operators;
pub mod params;
pub mod types;
pub mod variables;

pub use actions::{ActionDefinition, ActionRegistry, Actions, dispatch};
pub use error::{ErrorCategory, Result, RuleError};
pub use executor::{
    EngineOutcome, RuleEngine, RunOptions, check_condition, check_conditions_recursively, run_all,
};
pub use export::{RuleData, export_rule_data};
pub use fields::{FieldType, pretty_label};
pub use models::{ActionSpec, Condition, ConditionNode, LogicalGroup, Rule};
pub use operators::{LogicalOperator, Operator, OperatorInfo, ValueKind};
pub use params::{BoundParams, ParamSpec, SelectOption};
pub use types::{EPSILON, StateComparator, TypedValue};
pub use variables::{VariableDefinition, VariableRegistry, Variables};
