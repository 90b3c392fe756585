//! Manipulator match conditions (§4.5.1): device, frontmost application, and
//! variable predicates evaluated against the current manipulator
//! environment before a manipulator is allowed to act on an entry.

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::environment::ManipulatorEnvironment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableComparison {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    DeviceIdIs(Vec<DeviceId>),
    DeviceIdIsNot(Vec<DeviceId>),
    FrontmostApplicationBundleIs(Vec<String>),
    FrontmostApplicationBundleIsNot(Vec<String>),
    Variable {
        name: String,
        comparison: VariableComparison,
        value: i64,
    },
    KeyboardTypeIf(Vec<String>),
    KeyboardTypeUnless(Vec<String>),
}

impl Condition {
    pub fn matches(&self, device_id: DeviceId, environment: &ManipulatorEnvironment) -> bool {
        match self {
            Condition::DeviceIdIs(ids) => ids.contains(&device_id),
            Condition::DeviceIdIsNot(ids) => !ids.contains(&device_id),
            Condition::FrontmostApplicationBundleIs(bundles) => environment
                .frontmost_application()
                .map(|app| bundles.iter().any(|b| b == &app.bundle_identifier))
                .unwrap_or(false),
            Condition::FrontmostApplicationBundleIsNot(bundles) => environment
                .frontmost_application()
                .map(|app| !bundles.iter().any(|b| b == &app.bundle_identifier))
                .unwrap_or(true),
            Condition::Variable { name, comparison, value } => {
                let current = environment.variable(name);
                match comparison {
                    VariableComparison::Equal => current == *value,
                    VariableComparison::NotEqual => current != *value,
                    VariableComparison::GreaterThan => current > *value,
                    VariableComparison::LessThan => current < *value,
                }
            }
            Condition::KeyboardTypeIf(types) => environment
                .keyboard_type()
                .map(|t| types.iter().any(|ty| ty == t))
                .unwrap_or(false),
            Condition::KeyboardTypeUnless(types) => environment
                .keyboard_type()
                .map(|t| !types.iter().any(|ty| ty == t))
                .unwrap_or(true),
        }
    }
}

/// A conjunction of conditions: a manipulator only fires when all of them
/// match (an empty set always matches).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    conditions: Vec<Condition>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn matches(&self, device_id: DeviceId, environment: &ManipulatorEnvironment) -> bool {
        self.conditions.iter().all(|c| c.matches(device_id, environment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_conditions_always_match() {
        let env = ManipulatorEnvironment::new();
        let conditions = Conditions::new();
        assert!(conditions.matches(DeviceId(1), &env));
    }

    #[test]
    fn device_id_condition_filters() {
        let env = ManipulatorEnvironment::new();
        let conditions = Conditions::new().push(Condition::DeviceIdIs(vec![DeviceId(2)]));
        assert!(!conditions.matches(DeviceId(1), &env));
        assert!(conditions.matches(DeviceId(2), &env));
    }

    #[test]
    fn variable_condition_compares_current_value() {
        let mut env = ManipulatorEnvironment::new();
        env.set_variable("mode", 1);
        let conditions = Conditions::new().push(Condition::Variable {
            name: "mode".to_string(),
            comparison: VariableComparison::Equal,
            value: 1,
        });
        assert!(conditions.matches(DeviceId(1), &env));
    }

    #[test]
    fn frontmost_application_not_set_fails_positive_match() {
        let env = ManipulatorEnvironment::new();
        let conditions = Conditions::new()
            .push(Condition::FrontmostApplicationBundleIs(vec!["com.example".to_string()]));
        assert!(!conditions.matches(DeviceId(1), &env));
    }

    #[test]
    fn keyboard_type_if_gates_on_reported_type() {
        let mut env = ManipulatorEnvironment::new();
        let conditions = Conditions::new().push(Condition::KeyboardTypeIf(vec!["iso".to_string()]));
        assert!(!conditions.matches(DeviceId(1), &env));

        env.set_keyboard_type("iso");
        assert!(conditions.matches(DeviceId(1), &env));

        env.set_keyboard_type("ansi");
        assert!(!conditions.matches(DeviceId(1), &env));
    }
}
