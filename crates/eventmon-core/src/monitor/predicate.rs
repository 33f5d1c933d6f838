//! Event predicates
//!
//! Predicates are plain data: a closed set of variants built from monitor
//! definitions and evaluated without side effects, so any number of threads
//! may test events against the same predicate.

use crate::models::{Event, MonitorDefinition};

/// A boolean test over an event's type and attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPredicate {
    /// Event type equals the given type
    TypeEquals(String),
    /// Attribute is present and its string form starts with `prefix`
    AttributeStartsWith {
        /// Attribute key
        key: String,
        /// Required prefix
        prefix: String,
    },
    /// All inner predicates hold; empty is always true
    And(Vec<EventPredicate>),
}

impl EventPredicate {
    /// Type match
    pub fn type_equals(event_type: impl Into<String>) -> Self {
        Self::TypeEquals(event_type.into())
    }

    /// Attribute prefix match
    pub fn attribute_starts_with(key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::AttributeStartsWith {
            key: key.into(),
            prefix: prefix.into(),
        }
    }

    /// Predicate for a monitor definition: type match and every prefix check
    pub fn for_definition(definition: &MonitorDefinition) -> Self {
        let mut all = Vec::with_capacity(1 + definition.filter.starts_with.len());
        all.push(Self::type_equals(&definition.event_type));
        all.extend(
            definition
                .filter
                .starts_with
                .iter()
                .map(|(key, prefix)| Self::attribute_starts_with(key, prefix)),
        );
        Self::And(all)
    }

    /// Test an event
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::TypeEquals(event_type) => event.event_type == *event_type,
            Self::AttributeStartsWith { key, prefix } => event
                .attribute_str(key)
                .is_some_and(|value| value.starts_with(prefix.as_str())),
            Self::And(all) => all.iter().all(|p| p.matches(event)),
        }
    }
}
