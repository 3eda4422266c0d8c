//! Command registry and permission evaluation.
//!
//! The registry maps canonical command names to their definitions. It
//! is replaced wholesale every time the server pushes a new catalog;
//! there is no merging with prior contents. Iteration follows
//! ingestion order for stable display.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::protocol::{CommandDefinition, Role};

// ============================================================================
// SessionIdentity
// ============================================================================

/// The authenticated user/role pair for the current session.
///
/// Absent while unauthenticated; cleared on disconnect, logout, or
/// authentication failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Authenticated username.
    pub username: String,
    /// Granted role.
    pub role: Role,
}

// ============================================================================
// Permission Evaluation
// ============================================================================

/// Decides whether `identity` may invoke `definition`.
///
/// Pure function of the definition's permission set and the caller's
/// identity: the set must contain `guest` or the caller must be
/// authenticated, and a set that admits neither guests nor players
/// additionally requires an operator or system role.
#[must_use]
pub fn is_invocable(definition: &CommandDefinition, identity: Option<&SessionIdentity>) -> bool {
    let allows_guest = definition.permissions.contains(&Role::Guest);
    if !allows_guest && identity.is_none() {
        return false;
    }

    let requires_operator = !definition
        .permissions
        .iter()
        .any(|role| matches!(role, Role::Guest | Role::Player));

    if requires_operator {
        identity.is_some_and(|id| id.role.is_privileged())
    } else {
        true
    }
}

// ============================================================================
// CommandRegistry
// ============================================================================

/// Mapping from canonical command name to definition.
#[derive(Default)]
pub struct CommandRegistry {
    /// Definitions in ingestion order.
    entries: Vec<CommandDefinition>,
    /// Canonical name to index into `entries`.
    index: FxHashMap<String, usize>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the registry contents with a new catalog.
    ///
    /// A later entry with the same canonical name shadows an earlier
    /// one.
    pub fn ingest(&mut self, definitions: Vec<CommandDefinition>) {
        self.entries = definitions;
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, def)| (def.canonical_name(), i))
            .collect();

        debug!(count = self.entries.len(), "Command registry replaced");
    }

    /// Resolves a canonical name to its definition.
    #[inline]
    #[must_use]
    pub fn resolve(&self, canonical: &str) -> Option<&CommandDefinition> {
        self.index.get(canonical).map(|&i| &self.entries[i])
    }

    /// Returns all definitions in ingestion order.
    #[inline]
    #[must_use]
    pub fn list(&self) -> &[CommandDefinition] {
        &self.entries
    }

    /// Returns the number of registered commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no commands are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns canonical names starting with `prefix`, restricted to
    /// commands `identity` may invoke, in ingestion order.
    #[must_use]
    pub fn suggestions(&self, prefix: &str, identity: Option<&SessionIdentity>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|def| is_invocable(def, identity))
            .map(CommandDefinition::canonical_name)
            .filter(|name| name.starts_with(prefix))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
