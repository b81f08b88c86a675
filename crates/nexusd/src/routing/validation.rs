//! Field validation for routed requests.
//!
//! Each accepted field runs its rules in declaration order; the first failing
//! rule records its message and the remaining rules for that field are
//! skipped. Failures across fields are collected and reported together.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

/// A named validation rule.
///
/// Rules other than `required` treat an absent or `null` value as valid so
/// optional fields can carry format constraints.
pub trait Validator: Send + Sync {
    /// Returns true when `value` satisfies the rule.
    fn validate(&self, value: Option<&Value>, params: &Map<String, Value>) -> bool;
}

impl<F> Validator for F
where
    F: Fn(Option<&Value>, &Map<String, Value>) -> bool + Send + Sync,
{
    fn validate(&self, value: Option<&Value>, params: &Map<String, Value>) -> bool {
        self(value, params)
    }
}

/// Validators addressable by rule name.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    rules: HashMap<String, Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in rules: `required`, `min_length`,
    /// `max_length`, `numeric` and `in`.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register("required", required)
            .register("min_length", min_length)
            .register("max_length", max_length)
            .register("numeric", numeric)
            .register("in", one_of);
        registry
    }

    /// Registers `validator` under `name`, replacing any previous rule.
    pub fn register<V>(&mut self, name: impl Into<String>, validator: V) -> &mut Self
    where
        V: Validator + 'static,
    {
        self.rules.insert(name.into(), Arc::new(validator));
        self
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.rules.get(name).cloned()
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ValidatorRegistry")
            .field("rules", &names)
            .finish()
    }
}

/// A rule resolved against a [`ValidatorRegistry`].
#[derive(Clone)]
pub(crate) struct CompiledRule {
    pub(crate) name: String,
    pub(crate) validator: Arc<dyn Validator>,
    pub(crate) params: Map<String, Value>,
    pub(crate) message: String,
}

impl std::fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRule")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Field errors keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Message recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when every field passed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }
}

impl<F: Into<String>, M: Into<String>> FromIterator<(F, M)> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = (F, M)>>(pairs: I) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(field, message)| (field.into(), message.into()))
                .collect(),
        )
    }
}

/// Runs the rules for each accepted field against `data`.
pub(crate) fn validate_fields(
    accept: &[String],
    rules: &BTreeMap<String, Vec<CompiledRule>>,
    data: &Map<String, Value>,
) -> ValidationErrors {
    let mut errors = BTreeMap::new();
    for field in accept {
        let Some(field_rules) = rules.get(field) else {
            continue;
        };
        let value = data.get(field);
        if let Some(failed) = field_rules
            .iter()
            .find(|rule| !rule.validator.validate(value, &rule.params))
        {
            errors.insert(
                field.clone(),
                substitute_params(&failed.message, &failed.params),
            );
        }
    }
    ValidationErrors(errors)
}

/// Replaces `{{key}}` with each parameter's value.
pub(crate) fn substitute_params(template: &str, params: &Map<String, Value>) -> String {
    params.iter().fold(template.to_owned(), |message, (key, value)| {
        let rendered = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        message.replace(&format!("{{{{{key}}}}}"), &rendered)
    })
}

fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn required(value: Option<&Value>, _params: &Map<String, Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(_) => true,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn bound(params: &Map<String, Value>, key: &str) -> Option<usize> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|raw| usize::try_from(raw).ok())
}

fn min_length(value: Option<&Value>, params: &Map<String, Value>) -> bool {
    if is_missing(value) {
        return true;
    }
    match (value.and_then(length_of), bound(params, "min")) {
        (Some(length), Some(min)) => length >= min,
        _ => false,
    }
}

fn max_length(value: Option<&Value>, params: &Map<String, Value>) -> bool {
    if is_missing(value) {
        return true;
    }
    match (value.and_then(length_of), bound(params, "max")) {
        (Some(length), Some(max)) => length <= max,
        _ => false,
    }
}

fn numeric(value: Option<&Value>, _params: &Map<String, Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Number(_)) => true,
        Some(Value::String(text)) => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
        Some(_) => false,
    }
}

fn one_of(value: Option<&Value>, params: &Map<String, Value>) -> bool {
    let Some(candidate) = value.filter(|candidate| !candidate.is_null()) else {
        return true;
    };
    params
        .get("values")
        .and_then(Value::as_array)
        .is_some_and(|allowed| allowed.contains(candidate))
}
