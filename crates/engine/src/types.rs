//! 类型化的值
//!
//! 变量方法返回的原始 JSON 值按声明的 [`ValueKind`] 包装成 [`TypedValue`]，
//! 只允许执行该类型注册过的操作符。

use crate::error::{Result, RuleError};
use crate::operators::{Operator, ValueKind};
use regex::Regex;
use serde_json::Value;

/// 数值比较容差
pub const EPSILON: f64 = 0.000_001;

/// `compare_state_with_item` 的宿主实现：(原始集合, 比较值) -> 结果
pub type StateComparator = dyn Fn(&[Value], &Value) -> Result<bool> + Send + Sync;

/// 类型化的值，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// `None` 表示值不存在
    Numeric(Option<f64>),
    String(String),
    Boolean(bool),
    Select(Vec<Value>),
    SelectMultiple(Vec<Value>),
}

impl TypedValue {
    /// 按值类型包装原始值
    pub fn new(kind: ValueKind, raw: Value) -> Result<Self> {
        match (kind, raw) {
            (ValueKind::Numeric, Value::Null) => Ok(Self::Numeric(None)),
            (ValueKind::Numeric, Value::Number(n)) => n
                .as_f64()
                .map(|f| Self::Numeric(Some(f)))
                .ok_or_else(|| RuleError::type_mismatch("numeric", n.to_string())),
            (ValueKind::String, Value::Null) => Ok(Self::String(String::new())),
            (ValueKind::String, Value::String(s)) => Ok(Self::String(s)),
            (ValueKind::Boolean, Value::Bool(b)) => Ok(Self::Boolean(b)),
            (ValueKind::Select, Value::Array(items)) => Ok(Self::Select(items)),
            (ValueKind::SelectMultiple, Value::Array(items)) => Ok(Self::SelectMultiple(items)),
            (kind, other) => Err(RuleError::type_mismatch(kind.as_str(), type_name(&other))),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Numeric(_) => ValueKind::Numeric,
            Self::String(_) => ValueKind::String,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Select(_) => ValueKind::Select,
            Self::SelectMultiple(_) => ValueKind::SelectMultiple,
        }
    }

    /// 按名称查找当前类型上的操作符
    pub fn operator(&self, name: &str) -> Result<Operator> {
        self.kind()
            .operator(name)
            .ok_or_else(|| RuleError::UnknownOperator {
                operator: name.to_string(),
                kind: self.kind().to_string(),
            })
    }

    /// 按名称执行操作符
    pub fn apply(&self, operator_name: &str, operand: &Value) -> Result<bool> {
        let operator = self.operator(operator_name)?;
        self.evaluate(operator, operand, None)
    }

    /// 执行操作符
    ///
    /// # Arguments
    /// * `operator` - 操作符，必须属于当前值类型
    /// * `operand` - 规则中定义的比较值，无需比较值的操作符忽略它
    /// * `state_comparator` - `compare_state_with_item` 的宿主实现
    pub fn evaluate(
        &self,
        operator: Operator,
        operand: &Value,
        state_comparator: Option<&StateComparator>,
    ) -> Result<bool> {
        if !self.kind().supports(operator) {
            return Err(RuleError::UnknownOperator {
                operator: operator.name().to_string(),
                kind: self.kind().to_string(),
            });
        }

        match self {
            Self::Numeric(value) => Self::numeric(*value, operator, operand),
            Self::String(value) => Self::string(value, operator, operand),
            Self::Boolean(value) => Ok(match operator {
                Operator::IsTrue => *value,
                _ => !*value,
            }),
            Self::Select(items) => Self::select(items, operator, operand),
            Self::SelectMultiple(items) => {
                Self::select_multiple(items, operator, operand, state_comparator)
            }
        }
    }

    /// 数值比较，值不存在时除 `does_not_exist` 外全部为 false
    fn numeric(value: Option<f64>, operator: Operator, operand: &Value) -> Result<bool> {
        let value = match (operator, value) {
            (Operator::DoesNotExist, v) => return Ok(v.is_none()),
            (_, None) => return Ok(false),
            (_, Some(v)) => v,
        };

        let other = operand
            .as_f64()
            .ok_or_else(|| RuleError::type_mismatch("numeric", type_name(operand)))?;

        let equal = (value - other).abs() <= EPSILON;
        let greater = value - other > EPSILON;
        let less = other - value > EPSILON;

        Ok(match operator {
            Operator::EqualTo => equal,
            Operator::NotEqualTo => !equal,
            Operator::GreaterThan => greater,
            Operator::GreaterThanOrEqualTo => greater || equal,
            Operator::LessThan => less,
            _ => less || equal,
        })
    }

    fn string(value: &str, operator: Operator, operand: &Value) -> Result<bool> {
        match operator {
            Operator::IsEmpty => return Ok(value.is_empty()),
            Operator::NonEmpty => return Ok(!value.is_empty()),
            _ => {}
        }

        let other = match operand {
            Value::String(s) => s.as_str(),
            Value::Null => "",
            other => return Err(RuleError::type_mismatch("string", type_name(other))),
        };

        Ok(match operator {
            Operator::EqualTo => value == other,
            Operator::NotEqualTo => value != other,
            Operator::EqualToCaseInsensitive => value.to_lowercase() == other.to_lowercase(),
            Operator::NotEqualToCaseInsensitive => value.to_lowercase() != other.to_lowercase(),
            Operator::Contains => value.contains(other),
            Operator::DoesNotContain => !value.contains(other),
            Operator::ContainsCaseInsensitive => {
                value.to_lowercase().contains(&other.to_lowercase())
            }
            Operator::DoesNotContainCaseInsensitive => {
                !value.to_lowercase().contains(&other.to_lowercase())
            }
            Operator::StartsWith => value.starts_with(other),
            Operator::DoesNotStartWith => !value.starts_with(other),
            Operator::EndsWith => value.ends_with(other),
            Operator::DoesNotEndWith => !value.ends_with(other),
            Operator::MatchesRegex => Self::regex_search(value, other)?,
            _ => !Self::regex_search(value, other)?,
        })
    }

    /// 正则搜索（部分匹配，等价于 search 而非 full match）
    fn regex_search(value: &str, pattern: &str) -> Result<bool> {
        let regex = Regex::new(pattern).map_err(|e| {
            RuleError::definition(format!("invalid regex pattern '{}': {}", pattern, e))
        })?;
        Ok(regex.is_match(value))
    }

    /// 单选集合：比较值为候选序列，标量视为单元素序列
    fn select(items: &[Value], operator: Operator, operand: &Value) -> Result<bool> {
        let candidates = match operand {
            Value::Array(values) => values.as_slice(),
            other => std::slice::from_ref(other),
        };
        let present = |candidate: &Value| items.iter().any(|item| elements_equal(item, candidate));

        Ok(match operator {
            Operator::ContainsAny => candidates.iter().any(present),
            Operator::DoesNotContain => !candidates.iter().any(present),
            // contains / contains_all
            _ => candidates.iter().all(present),
        })
    }

    fn select_multiple(
        items: &[Value],
        operator: Operator,
        operand: &Value,
        state_comparator: Option<&StateComparator>,
    ) -> Result<bool> {
        if operator == Operator::CompareStateWithItem {
            let comparator = state_comparator.ok_or_else(|| {
                RuleError::definition(
                    "operator compare_state_with_item has no host implementation registered",
                )
            })?;
            return comparator(items, operand);
        }

        let others = operand
            .as_array()
            .ok_or_else(|| RuleError::type_mismatch("select_multiple", type_name(operand)))?;
        let in_items = |other: &Value| items.iter().any(|item| elements_equal(item, other));
        let in_others = |item: &Value| others.iter().any(|other| elements_equal(item, other));
        // 按比较值中的候选元素计数
        let shared = others.iter().filter(|other| in_items(*other)).count();

        Ok(match operator {
            Operator::ContainsAll => others.iter().all(in_items),
            Operator::IsContainedBy => items.iter().all(in_others),
            Operator::SharesAtLeastOneElementWith => shared > 0,
            Operator::SharesExactlyOneElementWith => shared == 1,
            _ => shared == 0,
        })
    }
}

/// 集合元素比较：字符串忽略大小写，数值按容差比较
fn elements_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.to_lowercase() == y.to_lowercase(),
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= EPSILON,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// 获取值的类型名称
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use serde_json::json;

    fn numeric(raw: Value, op: &str, operand: Value) -> bool {
        TypedValue::new(ValueKind::Numeric, raw)
            .unwrap()
            .apply(op, &operand)
            .unwrap()
    }

    fn string(raw: &str, op: &str, operand: Value) -> bool {
        TypedValue::new(ValueKind::String, json!(raw))
            .unwrap()
            .apply(op, &operand)
            .unwrap()
    }

    #[test]
    fn test_numeric_equal_int_and_float() {
        assert!(numeric(json!(100), "equal_to", json!(100)));
        assert!(numeric(json!(100.0), "equal_to", json!(100)));
        assert!(numeric(json!(0.1 + 0.2), "equal_to", json!(0.3)));
        assert!(!numeric(json!(100), "equal_to", json!(101)));
        assert!(numeric(json!(100), "not_equal_to", json!(101)));
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(numeric(json!(100), "greater_than", json!(50)));
        assert!(numeric(json!(100), "greater_than_or_equal_to", json!(100)));
        assert!(numeric(json!(50), "less_than", json!(100)));
        assert!(numeric(json!(100), "less_than_or_equal_to", json!(100)));
        assert!(!numeric(json!(100), "less_than", json!(100)));
    }

    #[test]
    fn test_greater_than_complements_less_than_or_equal_to() {
        let samples = [-3.5, -1.0, 0.0, 0.000_000_1, 1.0, 2.5, 10.0];
        for a in samples {
            for b in samples {
                let gt = numeric(json!(a), "greater_than", json!(b));
                let lte = numeric(json!(a), "less_than_or_equal_to", json!(b));
                assert_ne!(gt, lte, "a={} b={}", a, b);
            }
        }
    }

    #[test]
    fn test_does_not_exist() {
        assert!(numeric(Value::Null, "does_not_exist", json!("")));
        assert!(!numeric(json!(0), "does_not_exist", json!("")));
        assert!(!numeric(Value::Null, "equal_to", json!(0)));
        assert!(!numeric(Value::Null, "not_equal_to", json!(0)));
    }

    #[test]
    fn test_numeric_type_mismatch() {
        let err = TypedValue::new(ValueKind::Numeric, json!("ten")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::TypeMismatch);

        let err = TypedValue::new(ValueKind::Numeric, json!(10))
            .unwrap()
            .apply("equal_to", &json!("ten"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::TypeMismatch);
    }

    #[test]
    fn test_string_contains() {
        assert!(string("foo", "contains", json!("o")));
        assert!(!string("foo", "contains", json!("m")));
        assert!(string("foo", "does_not_contain", json!("m")));
        assert!(!string("Foo", "contains", json!("fo")));
        assert!(string("Foo", "contains_case_insensitive", json!("fO")));
        assert!(string("Foo", "does_not_contain_case_insensitive", json!("x")));
    }

    #[test]
    fn test_string_equality() {
        assert!(string("hello", "equal_to", json!("hello")));
        assert!(!string("hello", "equal_to", json!("Hello")));
        assert!(string("hello", "equal_to_case_insensitive", json!("HeLLo")));
        assert!(string("hello", "not_equal_to", json!("Hello")));
        assert!(!string("hello", "not_equal_to_case_insensitive", json!("HELLO")));
    }

    #[test]
    fn test_string_prefix_suffix() {
        assert!(string("hello world", "starts_with", json!("hello")));
        assert!(string("hello world", "does_not_start_with", json!("world")));
        assert!(string("hello world", "ends_with", json!("world")));
        assert!(string("hello world", "does_not_end_with", json!("hello")));
    }

    #[test]
    fn test_regex_is_search() {
        assert!(string("order-12345", "matches_regex", json!(r"\d{3}")));
        assert!(string("user@example.com", "matches_regex", json!(r"^[\w.-]+@[\w.-]+\.\w+$")));
        assert!(string("order", "does_not_match_regex", json!(r"\d")));
    }

    #[test]
    fn test_invalid_regex_is_definition_error() {
        let err = TypedValue::new(ValueKind::String, json!("abc"))
            .unwrap()
            .apply("matches_regex", &json!("(unclosed"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Definition);
    }

    #[test]
    fn test_is_empty_and_non_empty() {
        assert!(string("", "is_empty", json!("")));
        assert!(!string("", "non_empty", json!("")));
        assert!(string("x", "non_empty", Value::Null));
        let absent = TypedValue::new(ValueKind::String, Value::Null).unwrap();
        assert!(absent.apply("is_empty", &Value::Null).unwrap());
    }

    #[test]
    fn test_boolean() {
        let value = TypedValue::new(ValueKind::Boolean, json!(true)).unwrap();
        assert!(value.apply("is_true", &json!("")).unwrap());
        assert!(!value.apply("is_false", &json!("")).unwrap());
        assert!(TypedValue::new(ValueKind::Boolean, json!(1)).is_err());
    }

    #[test]
    fn test_select() {
        let value = TypedValue::new(ValueKind::Select, json!(["Red", "green", 3])).unwrap();
        assert!(value.apply("contains", &json!("red")).unwrap());
        assert!(value.apply("contains", &json!(3.0)).unwrap());
        assert!(!value.apply("contains", &json!("blue")).unwrap());
        assert!(value.apply("contains_any", &json!(["blue", "green"])).unwrap());
        assert!(!value.apply("contains_all", &json!(["blue", "green"])).unwrap());
        assert!(value.apply("contains_all", &json!(["red", "green"])).unwrap());
        assert!(value.apply("does_not_contain", &json!(["blue", "pink"])).unwrap());
        assert!(!value.apply("does_not_contain", &json!("GREEN")).unwrap());
    }

    #[test]
    fn test_select_multiple() {
        let value = TypedValue::new(ValueKind::SelectMultiple, json!(["a", "b"])).unwrap();
        assert!(value.apply("contains_all", &json!(["A"])).unwrap());
        assert!(!value.apply("contains_all", &json!(["a", "c"])).unwrap());
        assert!(value.apply("is_contained_by", &json!(["a", "b", "c"])).unwrap());
        assert!(!value.apply("is_contained_by", &json!(["a"])).unwrap());
        assert!(value.apply("shares_at_least_one_element_with", &json!(["b", "z"])).unwrap());
        assert!(value.apply("shares_exactly_one_element_with", &json!(["b", "z"])).unwrap());
        assert!(!value.apply("shares_exactly_one_element_with", &json!(["a", "b"])).unwrap());
        assert!(value.apply("shares_no_elements_with", &json!(["x", "y"])).unwrap());
    }

    #[test]
    fn test_shares_exactly_one_counts_operand_elements() {
        let repeated = TypedValue::new(ValueKind::SelectMultiple, json!(["a", "a"])).unwrap();
        assert!(repeated.apply("shares_exactly_one_element_with", &json!(["a"])).unwrap());

        let value = TypedValue::new(ValueKind::SelectMultiple, json!(["a", "b"])).unwrap();
        assert!(!value.apply("shares_exactly_one_element_with", &json!(["a", "A"])).unwrap());
        assert!(value.apply("shares_at_least_one_element_with", &json!(["A", "z"])).unwrap());
    }

    #[test]
    fn test_select_multiple_requires_array_operand() {
        let value = TypedValue::new(ValueKind::SelectMultiple, json!(["a"])).unwrap();
        let err = value.apply("contains_all", &json!("a")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::TypeMismatch);
    }

    #[test]
    fn test_compare_state_with_item_hook() {
        let value = TypedValue::new(ValueKind::SelectMultiple, json!(["open"])).unwrap();
        let err = value.apply("compare_state_with_item", &json!("open")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Definition);

        let hook = |items: &[Value], operand: &Value| {
            Ok::<_, RuleError>(items.first() == Some(operand))
        };
        let comparator: &StateComparator = &hook;
        assert!(value
            .evaluate(Operator::CompareStateWithItem, &json!("open"), Some(comparator))
            .unwrap());
    }

    #[test]
    fn test_unknown_operator() {
        let value = TypedValue::new(ValueKind::String, json!("foo")).unwrap();
        let err = value.apply("equal_tooooze", &json!("foo")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnknownOperator);

        let err = value.apply("greater_than", &json!("foo")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnknownOperator);
    }
}
