//! Command resolution state machine.
//!
//! Drives the interactive command-entry flow: free-text input resolves
//! against the registry, commands with parameters are collected one
//! argument at a time with typed coercion, and backward navigation
//! re-opens previously entered arguments for editing.
//!
//! The machine is pure state over a borrowed registry; it never talks
//! to the network. A completed flow yields a [`Dispatch`] which the
//! embedding console hands to `Client::dispatch`. Cancelling the flow
//! resets only composer state, never an already-sent request.
//!
//! # Transitions
//!
//! ```text
//!                      pick, ≥1 parameter
//! SelectingCommand ───────────────────────► CollectingArgument(0)
//!        ▲   │ pick, no parameters                  │
//!        │   └────────► dispatch ◄───────── value at last index
//!        │                                          │
//!        └── escape / backspace past index 0 ◄──────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};
use tracing::debug;

use crate::client::registry::{CommandRegistry, SessionIdentity, is_invocable};
use crate::error::{Error, Result};
use crate::protocol::{ArgumentValue, CommandDefinition, ParameterDefinition};

use super::suggest::SuggestionList;

// ============================================================================
// ComposerMode
// ============================================================================

/// The machine's two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerMode {
    /// Resolving free-text input against the registry.
    SelectingCommand,
    /// Collecting one typed argument at a time.
    CollectingArgument,
}

// ============================================================================
// ComposerKey
// ============================================================================

/// Non-text inputs the machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerKey {
    /// Cycle the suggestion list forward.
    Tab,
    /// Cycle the suggestion list backward.
    BackTab,
    /// Cancel collection, or dismiss suggestions while selecting.
    Escape,
    /// Backspace pressed with an empty input buffer.
    BackspaceAtEmpty,
}

// ============================================================================
// Dispatch
// ============================================================================

/// A fully resolved command ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Request event type: the canonical name with whitespace replaced
    /// by `_`.
    pub event_type: String,

    /// The original command string, arguments included.
    pub command: String,

    /// Collected values keyed by parameter name.
    pub args: serde_json::Map<String, Value>,
}

impl Dispatch {
    /// Builds the request payload.
    #[must_use]
    pub fn payload(&self) -> Value {
        json!({
            "command": self.command,
            "args": Value::Object(self.args.clone()),
        })
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of feeding one input to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Input consumed; nothing to do.
    Continue,

    /// Now collecting the given parameter.
    Prompt {
        /// Parameter to prompt the user for.
        parameter: ParameterDefinition,
    },

    /// The command is complete and ready to send.
    Dispatch(Dispatch),
}

// ============================================================================
// CommandComposer
// ============================================================================

/// Interactive command-entry state machine.
pub struct CommandComposer {
    /// Current state.
    mode: ComposerMode,
    /// Resolved path segments so far.
    path: Vec<String>,
    /// The command being built, absent until one is chosen.
    command: Option<CommandDefinition>,
    /// Parameter schema paired with collected values, in order.
    collected: Vec<(ParameterDefinition, Option<ArgumentValue>)>,
    /// Index of the argument currently being collected.
    current: Option<usize>,
    /// Input buffer.
    buffer: String,
    /// Visible suggestions.
    suggestions: SuggestionList,
}

impl Default for CommandComposer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CommandComposer - Accessors
// ============================================================================

impl CommandComposer {
    /// Creates an idle composer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: ComposerMode::SelectingCommand,
            path: Vec::new(),
            command: None,
            collected: Vec::new(),
            current: None,
            buffer: String::new(),
            suggestions: SuggestionList::new(),
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> ComposerMode {
        self.mode
    }

    /// Returns the resolved path segments.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns the index of the argument being collected.
    #[inline]
    #[must_use]
    pub fn argument_index(&self) -> Option<usize> {
        self.current
    }

    /// Returns the parameter being collected.
    #[must_use]
    pub fn current_parameter(&self) -> Option<&ParameterDefinition> {
        self.current.map(|i| &self.collected[i].0)
    }

    /// Returns the input buffer.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Replaces the input buffer.
    pub fn set_buffer(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    /// Returns the visible suggestions.
    #[inline]
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        self.suggestions.items()
    }
}

// ============================================================================
// CommandComposer - Input
// ============================================================================

impl CommandComposer {
    /// Recomputes suggestions for the current path and buffer.
    ///
    /// Only meaningful while selecting; collection never suggests.
    pub fn refresh_suggestions(
        &mut self,
        registry: &CommandRegistry,
        identity: Option<&SessionIdentity>,
    ) {
        if self.mode != ComposerMode::SelectingCommand {
            return;
        }
        let prefix = self.qualified(&self.buffer);
        self.suggestions.set_items(registry.suggestions(&prefix, identity));
    }

    /// Submits a line of input.
    ///
    /// While selecting, the line resolves a command or extends the
    /// path. While collecting, the line is coerced into the current
    /// argument slot.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandNotFound`] for input matching no command or
    ///   path prefix
    /// - [`Error::PermissionDenied`] for a command the identity may
    ///   not invoke
    /// - [`Error::InvalidParameter`] when coercion fails; the current
    ///   argument index is unchanged and the slot stays re-enterable
    pub fn submit_line(
        &mut self,
        line: &str,
        registry: &CommandRegistry,
        identity: Option<&SessionIdentity>,
    ) -> Result<Outcome> {
        self.buffer = line.to_string();
        match self.mode {
            ComposerMode::SelectingCommand => self.submit_selection(registry, identity),
            ComposerMode::CollectingArgument => self.submit_argument(),
        }
    }

    /// Picks a command by canonical name, as from a suggestion click.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandNotFound`] when the name resolves to nothing
    /// - [`Error::PermissionDenied`] when the identity may not invoke it
    pub fn pick(
        &mut self,
        canonical: &str,
        registry: &CommandRegistry,
        identity: Option<&SessionIdentity>,
    ) -> Result<Outcome> {
        let Some(definition) = registry.resolve(canonical) else {
            return Err(Error::command_not_found(canonical));
        };
        if !is_invocable(definition, identity) {
            return Err(Error::permission_denied(canonical));
        }
        let definition = definition.clone();
        Ok(self.select(definition))
    }

    /// Feeds one non-text key.
    pub fn handle_key(
        &mut self,
        key: ComposerKey,
        registry: &CommandRegistry,
        identity: Option<&SessionIdentity>,
    ) -> Outcome {
        match key {
            ComposerKey::Tab => self.cycle(registry, identity, true),
            ComposerKey::BackTab => self.cycle(registry, identity, false),
            ComposerKey::Escape => self.escape(),
            ComposerKey::BackspaceAtEmpty => self.backspace_at_empty(),
        }
    }
}

// ============================================================================
// CommandComposer - Selection
// ============================================================================

impl CommandComposer {
    /// Prefixes `input` with the resolved path.
    fn qualified(&self, input: &str) -> String {
        if self.path.is_empty() {
            input.to_string()
        } else if input.is_empty() {
            format!("{} ", self.path.join(" "))
        } else {
            format!("{} {}", self.path.join(" "), input)
        }
    }

    /// Resolves the buffer against the registry.
    fn submit_selection(
        &mut self,
        registry: &CommandRegistry,
        identity: Option<&SessionIdentity>,
    ) -> Result<Outcome> {
        let input = self.buffer.trim().to_string();
        if input.is_empty() {
            return Ok(Outcome::Continue);
        }

        let candidate = self.qualified(&input);

        if let Some(definition) = registry.resolve(&candidate) {
            if !is_invocable(definition, identity) {
                return Err(Error::permission_denied(candidate));
            }
            let definition = definition.clone();
            return Ok(self.select(definition));
        }

        // Not a complete command: treat as a path prefix when deeper
        // invocable commands exist under it.
        let deeper = format!("{candidate} ");
        if !registry.suggestions(&deeper, identity).is_empty() {
            self.path = candidate.split_whitespace().map(String::from).collect();
            self.buffer.clear();
            self.suggestions.clear();
            debug!(path = ?self.path, "Path extended");
            return Ok(Outcome::Continue);
        }

        Err(Error::command_not_found(candidate))
    }

    /// Transitions into collection, or dispatches a parameterless
    /// command immediately.
    fn select(&mut self, definition: CommandDefinition) -> Outcome {
        self.suggestions.clear();
        self.buffer.clear();
        self.path = definition
            .canonical_name()
            .split_whitespace()
            .map(String::from)
            .collect();

        if !definition.has_parameters() {
            let dispatch = build_dispatch(&definition, &[]);
            self.reset();
            return Outcome::Dispatch(dispatch);
        }

        self.collected = definition
            .parameters
            .iter()
            .map(|p| (p.clone(), None))
            .collect();
        self.current = Some(0);
        self.mode = ComposerMode::CollectingArgument;
        let parameter = self.collected[0].0.clone();
        self.command = Some(definition);

        Outcome::Prompt { parameter }
    }
}

// ============================================================================
// CommandComposer - Collection
// ============================================================================

impl CommandComposer {
    /// Coerces the buffer into the current argument slot.
    fn submit_argument(&mut self) -> Result<Outcome> {
        let Some(index) = self.current else {
            return Ok(Outcome::Continue);
        };

        let input = self.buffer.clone();
        let (parameter, slot) = &mut self.collected[index];

        // An empty entry falls back to the declared default when the
        // parameter has one.
        let value = match (input.is_empty(), &parameter.default) {
            (true, Some(default)) => ArgumentValue::from_json(default.clone()),
            _ => parameter.coerce(&input)?,
        };
        *slot = Some(value);

        if index + 1 == self.collected.len() {
            let Some(command) = self.command.take() else {
                self.reset();
                return Ok(Outcome::Continue);
            };
            let dispatch = build_dispatch(&command, &self.collected);
            self.reset();
            return Ok(Outcome::Dispatch(dispatch));
        }

        self.current = Some(index + 1);
        self.buffer.clear();
        Ok(Outcome::Prompt {
            parameter: self.collected[index + 1].0.clone(),
        })
    }

    /// Handles backspace pressed on an empty buffer.
    fn backspace_at_empty(&mut self) -> Outcome {
        match (self.mode, self.current) {
            // Editing: step back to the previous argument and reopen it.
            (ComposerMode::CollectingArgument, Some(index)) if index > 0 => {
                let previous = index - 1;
                self.current = Some(previous);
                self.buffer = self.collected[previous]
                    .1
                    .as_ref()
                    .map(ArgumentValue::to_input)
                    .unwrap_or_default();
                Outcome::Prompt {
                    parameter: self.collected[previous].0.clone(),
                }
            }

            // Backing out past the first argument discards the
            // command selection and the deepest path segment.
            (ComposerMode::CollectingArgument, _) => {
                self.path.pop();
                self.command = None;
                self.collected.clear();
                self.current = None;
                self.mode = ComposerMode::SelectingCommand;
                self.buffer.clear();
                Outcome::Continue
            }

            (ComposerMode::SelectingCommand, _) => {
                if !self.path.is_empty() {
                    self.path.pop();
                    self.buffer.clear();
                    self.suggestions.clear();
                }
                Outcome::Continue
            }
        }
    }

    /// Handles escape.
    fn escape(&mut self) -> Outcome {
        match self.mode {
            ComposerMode::CollectingArgument => {
                self.reset();
                Outcome::Continue
            }
            ComposerMode::SelectingCommand => {
                self.suggestions.clear();
                Outcome::Continue
            }
        }
    }

    /// Cycles the suggestion list and mirrors the pick into the buffer.
    fn cycle(
        &mut self,
        registry: &CommandRegistry,
        identity: Option<&SessionIdentity>,
        forward: bool,
    ) -> Outcome {
        if self.mode != ComposerMode::SelectingCommand {
            return Outcome::Continue;
        }
        if self.suggestions.is_empty() {
            self.refresh_suggestions(registry, identity);
        }

        let selected = if forward {
            self.suggestions.cycle_forward()
        } else {
            self.suggestions.cycle_backward()
        };

        if let Some(selected) = selected {
            let prefix = if self.path.is_empty() {
                String::new()
            } else {
                format!("{} ", self.path.join(" "))
            };
            self.buffer = selected
                .strip_prefix(&prefix)
                .unwrap_or(selected)
                .to_string();
        }
        Outcome::Continue
    }

    /// Resets to idle: fresh state, empty buffer.
    fn reset(&mut self) {
        self.mode = ComposerMode::SelectingCommand;
        self.path.clear();
        self.command = None;
        self.collected.clear();
        self.current = None;
        self.buffer.clear();
        self.suggestions.clear();
    }
}

// ============================================================================
// Dispatch Construction
// ============================================================================

/// Packages the collected values for the correlation engine.
fn build_dispatch(
    definition: &CommandDefinition,
    collected: &[(ParameterDefinition, Option<ArgumentValue>)],
) -> Dispatch {
    let canonical = definition.canonical_name();

    let mut args = serde_json::Map::new();
    let mut parts = vec![canonical.clone()];
    for (parameter, value) in collected {
        if let Some(value) = value {
            args.insert(parameter.name.clone(), value.to_json());
            parts.push(value.to_input());
        }
    }

    Dispatch {
        event_type: definition.event_type(),
        command: parts.join(" "),
        args,
    }
}

// ============================================================================
// Tests
// ============================================================================
