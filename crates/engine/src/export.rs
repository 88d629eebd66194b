//! 规则元数据导出，供规则编辑界面使用

use crate::actions::{ActionDefinition, Actions};
use crate::error::Result;
use crate::operators::{OperatorInfo, ValueKind};
use crate::variables::{VariableDefinition, Variables};
use serde::Serialize;
use std::collections::BTreeMap;

/// 导出的规则元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleData {
    pub variables: Vec<VariableDefinition>,
    pub actions: Vec<ActionDefinition>,
    /// 值类型 -> 操作符列表
    pub variable_type_operators: BTreeMap<String, Vec<OperatorInfo>>,
}

impl RuleData {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 遍历变量与动作注册表生成元数据
pub fn export_rule_data<V: Variables, A: Actions>() -> RuleData {
    let variable_type_operators = ValueKind::ALL
        .iter()
        .map(|kind| (kind.as_str().to_string(), kind.operator_catalog()))
        .collect();

    RuleData {
        variables: V::registry().definitions().cloned().collect(),
        actions: A::registry().definitions().cloned().collect(),
        variable_type_operators,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionRegistry;
    use crate::fields::FieldType;
    use crate::params::ParamSpec;
    use crate::variables::VariableRegistry;
    use serde_json::json;
    use std::sync::LazyLock;

    struct Store;

    static STORE_VARIABLES: LazyLock<VariableRegistry<Store>> = LazyLock::new(|| {
        VariableRegistry::builder("Store")
            .variable(
                VariableDefinition::select("region").options(["north", "south"]),
                |_: &Store, _| Ok(json!(["north"])),
            )
            .variable(
                VariableDefinition::numeric("stock").docs("Units on hand"),
                |_: &Store, _| Ok(3),
            )
            .build()
            .unwrap()
    });

    static STORE_ACTIONS: LazyLock<ActionRegistry<Store>> = LazyLock::new(|| {
        ActionRegistry::builder("Store")
            .action(
                ActionDefinition::new("restock")
                    .param(ParamSpec::new("units", FieldType::Numeric)),
                |_: &mut Store, _| Ok(()),
            )
            .build()
            .unwrap()
    });

    impl Variables for Store {
        fn registry() -> &'static VariableRegistry<Self> {
            &STORE_VARIABLES
        }
    }

    impl Actions for Store {
        fn registry() -> &'static ActionRegistry<Self> {
            &STORE_ACTIONS
        }
    }

    #[test]
    fn test_export_lists_registries() {
        let data = export_rule_data::<Store, Store>();
        let names: Vec<&str> = data.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["region", "stock"]);
        assert_eq!(data.actions[0].params[0].name, "units");
        assert_eq!(data.variable_type_operators.len(), 5);
    }

    #[test]
    fn test_export_wire_format() {
        let data = export_rule_data::<Store, Store>();
        let value = serde_json::to_value(&data).unwrap();

        assert_eq!(
            value["variables"][0],
            json!({
                "name": "region",
                "label": "Region",
                "field_type": "select",
                "options": [
                    {"label": "North", "name": "north"},
                    {"label": "South", "name": "south"}
                ],
                "docs": null,
                "params": []
            })
        );
        assert_eq!(value["variables"][1]["docs"], "Units on hand");
        assert_eq!(
            value["variable_type_operators"]["boolean"],
            json!([
                {"name": "is_false", "label": "Is False", "input_type": "none"},
                {"name": "is_true", "label": "Is True", "input_type": "none"}
            ])
        );
    }

    #[test]
    fn test_operator_lists_sorted() {
        let data = export_rule_data::<Store, Store>();
        for (kind, operators) in &data.variable_type_operators {
            let names: Vec<&str> = operators.iter().map(|o| o.name).collect();
            let mut sorted = names.clone();
            sorted.sort_unstable();
            assert_eq!(names, sorted, "{}", kind);
        }
        assert!(data.to_json().unwrap().contains("\"variable_type_operators\""));
    }
}
