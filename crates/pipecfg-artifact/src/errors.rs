//! Field-keyed validation errors
//!
//! [`ConfigErrors`] belongs to one entity: field name to messages.
//! [`ErrorReport`] files the errors of a whole graph under [`EntityPath`]s,
//! so the graph itself stays an immutable value and errors never reach the
//! persisted document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::EntityPath;

/// Errors attached to a single entity, in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigErrors(IndexMap<String, Vec<String>>);

impl ConfigErrors {
    /// No errors
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field; an identical message is kept once
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let messages = self.0.entry(field.into()).or_default();
        let message = message.into();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    /// First message on a field
    #[inline]
    #[must_use]
    pub fn on(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|m| m.first()).map(String::as_str)
    }

    /// Every message on a field
    #[inline]
    #[must_use]
    pub fn all_on(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// True if nothing has been recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of messages across fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Fields with at least one message
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(field, message)` pairs in recording order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(f, msgs)| msgs.iter().map(move |m| (f.as_str(), m.as_str())))
    }

    /// First message of any field
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.iter().next().map(|(_, m)| m)
    }

    /// Fold another entity's errors into this one
    pub fn absorb(&mut self, other: &Self) {
        for (field, message) in other.iter() {
            self.add(field, message);
        }
    }
}

/// All errors produced by one validation pass, keyed by entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorReport(IndexMap<EntityPath, ConfigErrors>);

impl ErrorReport {
    /// Empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `addError(entity, field, message)`
    pub fn add(&mut self, entity: &EntityPath, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(entity.clone()).or_default().add(field, message);
    }

    /// Merge another entity's error set under `entity`
    pub fn add_all(&mut self, entity: &EntityPath, errors: &ConfigErrors) {
        if !errors.is_empty() {
            self.0.entry(entity.clone()).or_default().absorb(errors);
        }
    }

    /// Errors filed for exactly this entity
    #[inline]
    #[must_use]
    pub fn errors_for(&self, entity: &EntityPath) -> Option<&ConfigErrors> {
        self.0.get(entity)
    }

    /// First message on a field of an entity
    #[must_use]
    pub fn on(&self, entity: &EntityPath, field: &str) -> Option<&str> {
        self.errors_for(entity).and_then(|e| e.on(field))
    }

    /// True if no entity has errors
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(ConfigErrors::is_empty)
    }

    /// Number of messages in the whole report
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.0.values().map(ConfigErrors::len).sum()
    }

    /// Entities with errors, in the order they were first reported
    pub fn iter(&self) -> impl Iterator<Item = (&EntityPath, &ConfigErrors)> {
        self.0.iter().filter(|(_, e)| !e.is_empty())
    }

    /// Concatenate another report after this one
    pub fn extend(&mut self, other: Self) {
        for (path, errors) in other.0 {
            self.add_all(&path, &errors);
        }
    }

    /// Only the errors at or below one of `scopes`
    #[must_use]
    pub fn within(&self, scopes: &[EntityPath]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(path, _)| scopes.iter().any(|s| s.is_prefix_of(path)))
                .map(|(p, e)| (p.clone(), e.clone()))
                .collect(),
        )
    }

    /// Every message, prefixed by the entity path, for logs and CLI output
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.iter()
            .flat_map(|(path, errors)| {
                errors
                    .iter()
                    .map(move |(field, message)| format!("{path} [{field}]: {message}"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_errors_keep_field_order_and_dedupe() {
        let mut errors = ConfigErrors::new();
        errors.add("name", "Name is a required field");
        errors.add("stages", "at least one stage");
        errors.add("name", "Name is a required field");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "stages"]);
        assert_eq!(errors.on("name"), Some("Name is a required field"));
        assert!(errors.all_on("missing").is_empty());
    }

    #[test]
    fn report_groups_by_entity() {
        let foo = EntityPath::of("pipelines", "foo");
        let bar = EntityPath::of("pipelines", "bar");
        let mut report = ErrorReport::new();
        report.add(&foo, "name", "duplicate");
        report.add(&bar, "materials", "missing");
        report.add(&foo, "labelTemplate", "bad token");
        assert_eq!(report.error_count(), 3);
        assert_eq!(report.on(&foo, "labelTemplate"), Some("bad token"));
        assert_eq!(report.iter().count(), 2);
    }

    #[test]
    fn within_filters_by_scope() {
        let stage = EntityPath::of("pipelines", "up").member("stages", "s1");
        let other = EntityPath::of("environments", "uat");
        let mut report = ErrorReport::new();
        report.add(&stage, "name", "bad");
        report.add(&other, "agents", "unknown");
        let scoped = report.within(&[EntityPath::of("pipelines", "up")]);
        assert_eq!(scoped.error_count(), 1);
        assert!(scoped.errors_for(&stage).is_some());
    }

    #[test]
    fn report_serializes_with_path_keys() {
        let mut report = ErrorReport::new();
        report.add(&EntityPath::of("environments", "uat"), "name", "taken");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"environments/uat": {"name": ["taken"]}}));
    }
}
