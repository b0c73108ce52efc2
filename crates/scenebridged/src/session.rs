//! Cross-command session state.
//!
//! The session is owned by the engine and only touched from the host thread
//! while an action runs, so it carries no locking. Entity references are
//! lookup keys into the host's object model, never owning handles.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Focus, selection and variables shared by every command in a host run.
#[derive(Debug, Clone)]
pub struct SessionContext {
    id: Uuid,
    started_at: OffsetDateTime,
    focused: Option<String>,
    selected: Vec<String>,
    variables: BTreeMap<String, Value>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Starts an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: OffsetDateTime::now_utc(),
            focused: None,
            selected: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Opaque session identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Focuses an entity, replacing any previous focus.
    pub fn set_focused(&mut self, entity: impl Into<String>) {
        self.focused = Some(entity.into());
    }

    /// Currently focused entity.
    #[must_use]
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Drops the focus, returning the entity that held it.
    pub fn clear_focused(&mut self) -> Option<String> {
        self.focused.take()
    }

    /// Adds an entity to the selection; returns `false` if already selected.
    pub fn add_selected(&mut self, entity: impl Into<String>) -> bool {
        let entity = entity.into();
        if self.selected.contains(&entity) {
            return false;
        }
        self.selected.push(entity);
        true
    }

    /// Removes an entity from the selection; returns whether it was present.
    pub fn remove_selected(&mut self, entity: &str) -> bool {
        let before = self.selected.len();
        self.selected.retain(|selected| selected != entity);
        self.selected.len() != before
    }

    /// Empties the selection.
    pub fn clear_selected(&mut self) {
        self.selected.clear();
    }

    /// Selected entities in selection order.
    #[must_use]
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Whether the entity is selected.
    #[must_use]
    pub fn is_selected(&self, entity: &str) -> bool {
        self.selected.iter().any(|selected| selected == entity)
    }

    /// Stores a variable, returning the value it replaced.
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.variables.insert(key.into(), value)
    }

    /// Reads a variable.
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Removes a variable, returning its value.
    pub fn remove_variable(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    /// Forgets every reference to an entity that no longer exists.
    pub fn forget_entity(&mut self, entity: &str) {
        if self.focused.as_deref() == Some(entity) {
            self.focused = None;
        }
        self.remove_selected(entity);
    }

    /// Describes the session as JSON.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        json!({
            "sessionId": self.id.to_string(),
            "startedAt": self.started_at.format(&Rfc3339).unwrap_or_default(),
            "focused": self.focused,
            "selected": self.selected,
            "selectedCount": self.selected.len(),
            "variables": self.variables,
        })
    }
}
