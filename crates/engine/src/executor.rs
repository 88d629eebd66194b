//! 规则执行器
//!
//! 对条件树做短路求值，条件成立时按顺序分发动作。任何错误都会立即中止
//! 整个规则集的执行，不会跳过出错的规则继续运行。

use crate::actions::{self, Actions};
use crate::error::Result;
use crate::models::{ActionSpec, Condition, ConditionNode, LogicalGroup, Rule};
use crate::operators::LogicalOperator;
use crate::variables::Variables;
use rules_shared::config::EngineConfig;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// 单次运行选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// 第一条规则触发（且其动作执行完毕）后停止
    pub stop_on_first_trigger: bool,
    /// 记录详细评估追踪
    pub trace: bool,
}

impl From<&EngineConfig> for RunOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            stop_on_first_trigger: config.stop_on_first_trigger,
            trace: config.trace,
        }
    }
}

/// 规则集运行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineOutcome {
    /// 触发的规则下标，按执行顺序
    pub triggered_rules: Vec<usize>,
    pub dispatched_actions: usize,
    pub trace: Vec<String>,
}

impl EngineOutcome {
    pub fn any_triggered(&self) -> bool {
        !self.triggered_rules.is_empty()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggered_rules.len()
    }
}

/// 规则执行器，不持有规则也不缓存任何结果
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    options: RunOptions,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_options(RunOptions::from(config))
    }

    /// 第一条规则触发后停止
    pub fn stop_on_first_trigger(mut self) -> Self {
        self.options.stop_on_first_trigger = true;
        self
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.options.trace = true;
        self
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    /// 按顺序运行规则集
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub fn run_all<V: Variables, A: Actions>(
        &self,
        rules: &[Rule],
        variables: &V,
        actions: &mut A,
    ) -> Result<EngineOutcome> {
        let mut outcome = EngineOutcome::default();

        for (index, rule) in rules.iter().enumerate() {
            let path = format!("rules[{}]", index);
            let triggered = match self.run_rule(rule, variables, actions, &mut outcome, &path) {
                Ok(triggered) => triggered,
                Err(e) => {
                    warn!(rule = index, error = %e, "rule set aborted");
                    return Err(e);
                }
            };

            if triggered {
                outcome.triggered_rules.push(index);
                if self.options.stop_on_first_trigger {
                    debug!(rule = index, "stopping after first triggered rule");
                    break;
                }
            }
        }

        debug!(
            triggered = outcome.trigger_count(),
            dispatched_actions = outcome.dispatched_actions,
            "rule set finished"
        );
        Ok(outcome)
    }

    /// 运行单条规则，返回是否触发
    pub fn run<V: Variables, A: Actions>(
        &self,
        rule: &Rule,
        variables: &V,
        actions: &mut A,
    ) -> Result<bool> {
        let mut outcome = EngineOutcome::default();
        self.run_rule(rule, variables, actions, &mut outcome, "rule")
    }

    /// 评估条件树
    pub fn check_conditions<V: Variables>(&self, node: &ConditionNode, variables: &V) -> Result<bool> {
        let mut trace = Vec::new();
        self.evaluate_node(node, variables, &mut trace, "root")
    }

    fn run_rule<V: Variables, A: Actions>(
        &self,
        rule: &Rule,
        variables: &V,
        actions: &mut A,
        outcome: &mut EngineOutcome,
        path: &str,
    ) -> Result<bool> {
        let conditions_path = format!("{}.conditions", path);
        let matched =
            self.evaluate_node(&rule.conditions, variables, &mut outcome.trace, &conditions_path)?;

        if matched {
            debug!(rule = path, actions = rule.actions.len(), "rule triggered");
            outcome.dispatched_actions += self.do_actions(&rule.actions, actions)?;
        }

        if self.options.trace {
            outcome.trace.push(format!(
                "{}: {}",
                path,
                if matched { "TRIGGERED" } else { "NOT_TRIGGERED" }
            ));
        }

        Ok(matched)
    }

    /// 按列表顺序分发动作
    fn do_actions<A: Actions>(&self, specs: &[ActionSpec], provider: &mut A) -> Result<usize> {
        for spec in specs {
            actions::dispatch(provider, &spec.name, &spec.params)?;
        }
        Ok(specs.len())
    }

    /// 递归评估条件节点
    fn evaluate_node<V: Variables>(
        &self,
        node: &ConditionNode,
        variables: &V,
        trace: &mut Vec<String>,
        path: &str,
    ) -> Result<bool> {
        match node {
            ConditionNode::Condition(cond) => self.evaluate_condition(cond, variables, trace, path),
            ConditionNode::Group(group) => self.evaluate_group(group, variables, trace, path),
        }
    }

    /// 评估叶子条件
    fn evaluate_condition<V: Variables>(
        &self,
        cond: &Condition,
        variables: &V,
        trace: &mut Vec<String>,
        path: &str,
    ) -> Result<bool> {
        let matched = V::registry().resolve(
            variables,
            &cond.name,
            &cond.operator,
            &cond.value,
            &cond.params,
        )?;

        if self.options.trace {
            trace.push(format!(
                "{}: {} {} {} => {}",
                path,
                cond.name,
                cond.operator,
                cond.value,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        Ok(matched)
    }

    /// 评估逻辑组节点（短路求值）
    fn evaluate_group<V: Variables>(
        &self,
        group: &LogicalGroup,
        variables: &V,
        trace: &mut Vec<String>,
        path: &str,
    ) -> Result<bool> {
        let group_path = format!("{}.{}", path, group.operator.key());
        group.validate(&group_path)?;

        match group.operator {
            LogicalOperator::And => {
                // AND: 遇到 false 立即返回
                for (i, child) in group.children.iter().enumerate() {
                    let child_path = format!("{}[{}]", group_path, i);
                    if !self.evaluate_node(child, variables, trace, &child_path)? {
                        if self.options.trace {
                            trace.push(format!("{}: AND short-circuit at child {}", path, i));
                        }
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            LogicalOperator::Or => {
                // OR: 遇到 true 立即返回
                for (i, child) in group.children.iter().enumerate() {
                    let child_path = format!("{}[{}]", group_path, i);
                    if self.evaluate_node(child, variables, trace, &child_path)? {
                        if self.options.trace {
                            trace.push(format!("{}: OR short-circuit at child {}", path, i));
                        }
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            LogicalOperator::Not => {
                let matched = self.evaluate_node(&group.children[0], variables, trace, &group_path)?;
                Ok(!matched)
            }
        }
    }
}

/// 按顺序运行规则集
pub fn run_all<V: Variables, A: Actions>(
    rules: &[Rule],
    variables: &V,
    actions: &mut A,
    options: RunOptions,
) -> Result<EngineOutcome> {
    RuleEngine::with_options(options).run_all(rules, variables, actions)
}

/// 评估条件树
pub fn check_conditions_recursively<V: Variables>(node: &ConditionNode, variables: &V) -> Result<bool> {
    RuleEngine::new().check_conditions(node, variables)
}

/// 评估单个叶子条件
pub fn check_condition<V: Variables>(condition: &Condition, variables: &V) -> Result<bool> {
    V::registry().resolve(
        variables,
        &condition.name,
        &condition.operator,
        &condition.value,
        &condition.params,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionDefinition, ActionRegistry};
    use crate::error::ErrorCategory;
    use crate::variables::{VariableDefinition, VariableRegistry};
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::{Arc, LazyLock, Mutex};
    use tracing::span;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// 记录每次变量调用，用于验证短路
    #[derive(Default)]
    struct Probe {
        calls: RefCell<Vec<String>>,
    }

    static PROBE_VARIABLES: LazyLock<VariableRegistry<Probe>> = LazyLock::new(|| {
        VariableRegistry::builder("Probe")
            .variable(VariableDefinition::boolean("yes"), |p: &Probe, _| {
                p.calls.borrow_mut().push("yes".to_string());
                Ok(true)
            })
            .variable(VariableDefinition::boolean("no"), |p: &Probe, _| {
                p.calls.borrow_mut().push("no".to_string());
                Ok(false)
            })
            .build()
            .unwrap()
    });

    impl Variables for Probe {
        fn registry() -> &'static VariableRegistry<Self> {
            &PROBE_VARIABLES
        }
    }

    #[derive(Default)]
    struct Journal {
        entries: Vec<String>,
    }

    static JOURNAL_ACTIONS: LazyLock<ActionRegistry<Journal>> = LazyLock::new(|| {
        ActionRegistry::builder("Journal")
            .action(ActionDefinition::new("log"), |j: &mut Journal, _| {
                j.entries.push("log".to_string());
                Ok(())
            })
            .build()
            .unwrap()
    });

    impl Actions for Journal {
        fn registry() -> &'static ActionRegistry<Self> {
            &JOURNAL_ACTIONS
        }
    }

    fn node(value: serde_json::Value) -> ConditionNode {
        ConditionNode::try_from(value).unwrap()
    }

    fn yes() -> serde_json::Value {
        json!({"name": "yes", "operator": "is_true", "value": ""})
    }

    fn no() -> serde_json::Value {
        json!({"name": "no", "operator": "is_true", "value": ""})
    }

    #[test]
    fn test_and_short_circuit() {
        let probe = Probe::default();
        let engine = RuleEngine::new();
        let matched = engine
            .check_conditions(&node(json!({"and": [no(), yes()]})), &probe)
            .unwrap();

        assert!(!matched);
        assert_eq!(*probe.calls.borrow(), vec!["no"]);
    }

    #[test]
    fn test_or_short_circuit() {
        let probe = Probe::default();
        let engine = RuleEngine::new();
        let matched = engine
            .check_conditions(&node(json!({"or": [yes(), no()]})), &probe)
            .unwrap();

        assert!(matched);
        assert_eq!(*probe.calls.borrow(), vec!["yes"]);
    }

    #[test]
    fn test_nested_groups_and_not() {
        let probe = Probe::default();
        let tree = node(json!({
            "and": [
                yes(),
                {"or": [no(), {"not": no()}]}
            ]
        }));
        assert!(check_conditions_recursively(&tree, &probe).unwrap());
    }

    #[test]
    fn test_shared_subtree_is_recomputed() {
        let probe = Probe::default();
        let tree = node(json!({"and": [yes(), yes()]}));
        let engine = RuleEngine::new();
        engine.check_conditions(&tree, &probe).unwrap();
        engine.check_conditions(&tree, &probe).unwrap();
        assert_eq!(probe.calls.borrow().len(), 4);
    }

    #[test]
    fn test_programmatic_empty_group_rejected() {
        let probe = Probe::default();
        for group in [LogicalGroup::and(vec![]), LogicalGroup::or(vec![])] {
            let err = check_conditions_recursively(&ConditionNode::Group(group), &probe).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Definition);
        }
        assert!(probe.calls.borrow().is_empty());
    }

    #[test]
    fn test_run_all_dispatches_in_order() {
        let rules = vec![
            Rule::new(node(yes()), vec![ActionSpec::new("log"), ActionSpec::new("log")]),
            Rule::new(node(no()), vec![ActionSpec::new("log")]),
            Rule::new(node(yes()), vec![ActionSpec::new("log")]),
        ];
        let mut journal = Journal::default();
        let outcome = run_all(&rules, &Probe::default(), &mut journal, RunOptions::default()).unwrap();

        assert_eq!(outcome.triggered_rules, vec![0, 2]);
        assert_eq!(outcome.dispatched_actions, 3);
        assert_eq!(journal.entries.len(), 3);
        assert!(outcome.trace.is_empty());
    }

    #[test]
    fn test_stop_on_first_trigger() {
        let rules = vec![
            Rule::new(node(yes()), vec![ActionSpec::new("log")]),
            Rule::new(node(yes()), vec![ActionSpec::new("log")]),
        ];
        let mut journal = Journal::default();
        let engine = RuleEngine::new().stop_on_first_trigger();
        let outcome = engine.run_all(&rules, &Probe::default(), &mut journal).unwrap();

        assert_eq!(outcome.triggered_rules, vec![0]);
        assert_eq!(journal.entries.len(), 1);
    }

    #[test]
    fn test_error_aborts_remaining_rules() {
        let rules = vec![
            Rule::new(node(yes()), vec![ActionSpec::new("log")]),
            Rule::new(node(yes()), vec![ActionSpec::new("unknown_action")]),
            Rule::new(node(yes()), vec![ActionSpec::new("log")]),
        ];
        let mut journal = Journal::default();
        let err = RuleEngine::new()
            .run_all(&rules, &Probe::default(), &mut journal)
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Definition);
        assert_eq!(journal.entries.len(), 1);
    }

    #[test]
    fn test_trace_output() {
        let rules = vec![Rule::new(node(json!({"and": [no(), yes()]})), vec![])];
        let outcome = RuleEngine::new()
            .with_trace()
            .run_all(&rules, &Probe::default(), &mut Journal::default())
            .unwrap();

        assert!(!outcome.any_triggered());
        assert!(outcome.trace[0].contains("rules[0].conditions.and[0]: no is_true"));
        assert!(outcome.trace.iter().any(|t| t.contains("short-circuit")));
        assert_eq!(outcome.trace.last().unwrap(), "rules[0]: NOT_TRIGGERED");
    }

    /// 记录创建过的 span 名称
    struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

    impl<S: tracing::Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(attrs.metadata().name());
        }
    }

    #[test]
    fn test_rule_run_opens_dispatch_spans() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(SpanNames(names.clone()));

        let rules = vec![Rule::new(
            node(yes()),
            vec![ActionSpec::new("log"), ActionSpec::new("log")],
        )];
        let mut journal = Journal::default();
        tracing::subscriber::with_default(subscriber, || {
            RuleEngine::new()
                .run_all(&rules, &Probe::default(), &mut journal)
                .unwrap();
        });

        let names = names.lock().unwrap();
        assert!(names.contains(&"run_all"));
        assert_eq!(names.iter().filter(|n| **n == "dispatch").count(), 2);
    }

    #[test]
    fn test_options_from_config() {
        let config = EngineConfig {
            stop_on_first_trigger: true,
            trace: true,
        };
        let engine = RuleEngine::from_config(&config);
        assert_eq!(
            engine.options(),
            RunOptions {
                stop_on_first_trigger: true,
                trace: true
            }
        );
    }
}
