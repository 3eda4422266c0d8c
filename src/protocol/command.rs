//! Server-advertised command catalog types.
//!
//! The server pushes its command catalog as part of the `apps_list`
//! event. Each entry describes one invocable command: an optional
//! hierarchical path, a permission set, and an ordered parameter
//! schema. Argument values collected from the user are coerced into a
//! closed variant type before dispatch.
//!
//! # Canonical Names
//!
//! | Definition | Canonical name |
//! |------------|----------------|
//! | `path = ["land", "claim"]` | `"land claim"` |
//! | no path, `name = "spawn"` | `"spawn"` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Role
// ============================================================================

/// Permission role attached to a session or required by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unauthenticated visitor.
    Guest,
    /// Authenticated regular player.
    Player,
    /// Server operator.
    Operator,
    /// Internal system actor.
    System,
}

impl Role {
    /// Returns `true` for roles with operator-level privileges.
    #[inline]
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Operator | Self::System)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Guest => "guest",
            Self::Player => "player",
            Self::Operator => "operator",
            Self::System => "system",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ParameterType
// ============================================================================

/// Declared type of one command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Free text, accepted verbatim.
    String,
    /// Numeric literal.
    Number,
    /// Case-insensitive `true`/`false`.
    Boolean,
    /// Self-describing structured value (JSON).
    Object,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ParameterDefinition
// ============================================================================

/// Schema for one typed command parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Parameter name, used as the key in the dispatched argument map.
    pub name: String,

    /// Declared type driving argument coercion.
    #[serde(rename = "type")]
    pub kind: ParameterType,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether a value must be supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Default value used when the parameter is optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterDefinition {
    /// Creates a definition with just a name and type.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: None,
            default: None,
        }
    }

    /// Coerces raw user input into a typed [`ArgumentValue`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] when the input does not
    /// parse as the declared type.
    pub fn coerce(&self, input: &str) -> Result<ArgumentValue> {
        match self.kind {
            ParameterType::String => Ok(ArgumentValue::Text(input.to_string())),

            ParameterType::Number => input
                .trim()
                .parse::<f64>()
                .map(ArgumentValue::Number)
                .map_err(|_| {
                    Error::invalid_parameter(&self.name, format!("'{input}' is not a number"))
                }),

            ParameterType::Boolean => match input.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(ArgumentValue::Boolean(true)),
                "false" => Ok(ArgumentValue::Boolean(false)),
                _ => Err(Error::invalid_parameter(
                    &self.name,
                    format!("'{input}' is not true or false"),
                )),
            },

            ParameterType::Object => serde_json::from_str::<Value>(input)
                .map(ArgumentValue::Structured)
                .map_err(|e| {
                    Error::invalid_parameter(&self.name, format!("invalid structured value: {e}"))
                }),
        }
    }
}

// ============================================================================
// CommandDefinition
// ============================================================================

/// One server-advertised command.
///
/// # Wire Format
///
/// ```json
/// {
///   "name": "claim",
///   "path": ["land", "claim"],
///   "permissions": ["player"],
///   "usage": "land claim <radius>",
///   "description": "Claim land around you",
///   "parameters": [
///     { "name": "radius", "type": "number", "required": true }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Command name, canonical when no path is present.
    pub name: String,

    /// Hierarchical path segments, outermost first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,

    /// Roles allowed to invoke the command.
    #[serde(default)]
    pub permissions: Vec<Role>,

    /// Usage string for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered parameter schema.
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
}

impl CommandDefinition {
    /// Creates a bare command with a name and permissions.
    #[must_use]
    pub fn new(name: impl Into<String>, permissions: Vec<Role>) -> Self {
        Self {
            name: name.into(),
            path: None,
            permissions,
            usage: None,
            description: None,
            parameters: Vec::new(),
        }
    }

    /// Returns the canonical registry name.
    ///
    /// Path segments joined by single spaces when a non-empty path is
    /// present, the bare name otherwise.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        match &self.path {
            Some(segments) if !segments.is_empty() => segments.join(" "),
            _ => self.name.clone(),
        }
    }

    /// Returns the event type used when dispatching this command.
    ///
    /// Whitespace in the canonical name is replaced by a single `_`.
    #[must_use]
    pub fn event_type(&self) -> String {
        canonical_to_event_type(&self.canonical_name())
    }

    /// Returns `true` if the command takes at least one parameter.
    #[inline]
    #[must_use]
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }
}

/// Converts a canonical command name to a request event type.
#[inline]
#[must_use]
pub fn canonical_to_event_type(canonical: &str) -> String {
    canonical
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

// ============================================================================
// ArgumentValue
// ============================================================================

/// A collected, typed argument value.
///
/// Closed variant type covering every declared [`ParameterType`]; the
/// dispatch payload serializes each variant to its natural JSON form.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// Verbatim text.
    Text(String),
    /// Parsed numeric literal.
    Number(f64),
    /// Parsed boolean.
    Boolean(bool),
    /// Parsed structured value.
    Structured(Value),
}

impl ArgumentValue {
    /// Wraps a JSON value, picking the narrowest matching variant.
    ///
    /// Used for parameter defaults, which arrive as plain JSON in the
    /// catalog.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .unwrap_or(Self::Structured(Value::Null)),
            Value::Bool(b) => Self::Boolean(b),
            other => Self::Structured(other),
        }
    }

    /// Converts the value to its JSON representation for dispatch.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Structured(v) => v.clone(),
        }
    }

    /// Renders the value back into an editable input string.
    ///
    /// Used when backward navigation repopulates the input buffer.
    #[must_use]
    pub fn to_input(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Self::Boolean(b) => b.to_string(),
            Self::Structured(v) => v.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
