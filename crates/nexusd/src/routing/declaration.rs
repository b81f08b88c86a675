//! Serde model of the route declaration format.
//!
//! A manifest is a JSON object mapping a path prefix to a list of
//! declarations:
//!
//! ```json
//! {
//!   "/": [
//!     { "controller": "Home", "action": "index", "method": "get", "uri": "/",
//!       "is_public": true }
//!   ],
//!   "/user": [
//!     { "controller": "User", "action": "show", "method": "GET", "uri": "/{id}",
//!       "accept": ["name"],
//!       "validations": {
//!         "name": [{ "rule": "min_length", "params": { "min": 3 },
//!                    "message": "Name needs {{min}} characters" }]
//!       } }
//!   ]
//! }
//! ```
//!
//! Keys the runtime does not use, such as `title` or `description`, are
//! ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use camino::Utf8Path;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::errors::RouteTableError;

/// Message used when a rule declaration omits one.
pub(crate) const DEFAULT_RULE_MESSAGE: &str = "Validation error";

/// One route as declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    /// Registry key of the controller.
    pub controller: String,
    /// Action invoked on the controller.
    pub action: String,
    /// HTTP-style method; matched case-insensitively.
    pub method: String,
    /// Path suffix appended to the group prefix.
    pub uri: String,
    /// Template applied to controllers that support one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Public routes bypass the access gate.
    #[serde(default)]
    pub is_public: bool,
    /// Fields eligible for validation, in evaluation order.
    #[serde(default)]
    pub accept: Vec<String>,
    /// Ordered validation rules per field.
    #[serde(default)]
    pub validations: BTreeMap<String, Vec<RuleDeclaration>>,
}

impl RouteDeclaration {
    /// Builds a declaration with no template, validations or accepted fields.
    #[must_use]
    pub fn new(
        controller: impl Into<String>,
        action: impl Into<String>,
        method: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
            method: method.into(),
            uri: uri.into(),
            template: None,
            is_public: false,
            accept: Vec::new(),
            validations: BTreeMap::new(),
        }
    }

    /// Marks the route as reachable by anonymous callers.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    /// Sets the template applied before the action runs.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Accepts `field` and attaches `rules` to it.
    #[must_use]
    pub fn accepting(mut self, field: impl Into<String>, rules: Vec<RuleDeclaration>) -> Self {
        let field = field.into();
        if !rules.is_empty() {
            self.validations.insert(field.clone(), rules);
        }
        self.accept.push(field);
        self
    }
}

/// A validation rule reference with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeclaration {
    /// Registry key of the validator.
    pub rule: String,
    /// Parameters passed to the validator and substituted into the message.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Error message template; `{{param}}` placeholders are substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RuleDeclaration {
    /// Builds a rule reference without parameters.
    #[must_use]
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            params: Map::new(),
            message: None,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the error message template.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Route declarations grouped by path prefix.
///
/// Groups keep the order in which they appear in the manifest, and
/// declarations keep their order within a group. Registration follows that
/// order, so it decides which of two overlapping variable routes wins and the
/// order of the allowed methods reported for a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteManifest {
    groups: Vec<(String, Vec<RouteDeclaration>)>,
}

impl Serialize for RouteManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (prefix, declarations) in &self.groups {
            map.serialize_entry(prefix, declarations)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RouteManifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ManifestVisitor)
    }
}

struct ManifestVisitor;

impl<'de> Visitor<'de> for ManifestVisitor {
    type Value = RouteManifest;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object mapping path prefixes to route lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut manifest = RouteManifest::new();
        while let Some((prefix, declarations)) =
            access.next_entry::<String, Vec<RouteDeclaration>>()?
        {
            manifest.extend_group(prefix, declarations);
        }
        Ok(manifest)
    }
}

impl RouteManifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration to the group for `prefix`.
    #[must_use]
    pub fn route(mut self, prefix: impl Into<String>, declaration: RouteDeclaration) -> Self {
        self.extend_group(prefix.into(), [declaration]);
        self
    }

    fn extend_group(
        &mut self,
        prefix: String,
        declarations: impl IntoIterator<Item = RouteDeclaration>,
    ) {
        if let Some((_, group)) = self
            .groups
            .iter_mut()
            .find(|(existing, _)| *existing == prefix)
        {
            group.extend(declarations);
        } else {
            self.groups.push((prefix, declarations.into_iter().collect()));
        }
    }

    /// Parses a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RouteTableError::Manifest`] when the text is not a valid
    /// manifest.
    pub fn from_json(text: &str) -> Result<Self, RouteTableError> {
        serde_json::from_str(text).map_err(|source| RouteTableError::Manifest {
            origin: "inline manifest".to_owned(),
            source,
        })
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`RouteTableError::ReadManifest`] when the file cannot be read
    /// and [`RouteTableError::Manifest`] when it does not parse.
    pub fn load(path: &Utf8Path) -> Result<Self, RouteTableError> {
        let text = fs::read_to_string(path).map_err(|source| RouteTableError::ReadManifest {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RouteTableError::Manifest {
            origin: path.to_string(),
            source,
        })
    }

    /// Iterates `(full path, declaration)` pairs.
    ///
    /// The full path is the declaration's `uri` for the root prefix `/`, and
    /// the prefix followed by the `uri` otherwise.
    pub fn routes(&self) -> impl Iterator<Item = (String, &RouteDeclaration)> {
        self.groups.iter().flat_map(|(prefix, declarations)| {
            declarations
                .iter()
                .map(move |declaration| (full_path(prefix, &declaration.uri), declaration))
        })
    }

    /// Number of declarations across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, declarations)| declarations.len()).sum()
    }

    /// Returns true when no routes are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn full_path(prefix: &str, uri: &str) -> String {
    if prefix == "/" {
        uri.to_owned()
    } else {
        format!("{prefix}{uri}")
    }
}
