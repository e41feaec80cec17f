//! Field schema snapshot used to resolve target field names
//!
//! The snapshot is loaded once per run through a [`SchemaLookup`] and then
//! shared immutably; nothing here is cached globally.

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Company fields that live on the record itself rather than in `custom_fields`
pub const NATIVE_FIELDS: &[&str] = &[
    "name",
    "assignee_id",
    "contact_type_id",
    "details",
    "email_domain",
];

/// A resolved target field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRef {
    /// Top-level company attribute, written under its own key
    Native(String),
    /// Custom field definition id
    Custom(i64),
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Native(name) => write!(f, "{}", name),
            FieldRef::Custom(id) => write!(f, "custom_field:{}", id),
        }
    }
}

/// Custom field definition as returned by the remote schema endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl CustomFieldDefinition {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            data_type: None,
        }
    }
}

/// Source of custom field definitions
#[async_trait]
pub trait SchemaLookup: Send + Sync {
    async fn custom_field_definitions(&self) -> anyhow::Result<Vec<CustomFieldDefinition>>;
}

/// Immutable name/id lookup tables for one run
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    by_name: HashMap<String, i64>,
    by_id: HashMap<i64, CustomFieldDefinition>,
}

impl SchemaSnapshot {
    /// Fetch definitions from `lookup` and build the tables
    pub async fn load(lookup: &dyn SchemaLookup) -> anyhow::Result<Self> {
        let definitions = lookup.custom_field_definitions().await?;
        debug!("Loaded {} custom field definitions", definitions.len());
        Ok(Self::from_definitions(definitions))
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = CustomFieldDefinition>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();

        for definition in definitions {
            if let Some(existing) = by_name.get(&definition.name) {
                warn!(
                    "Custom field name '{}' is defined more than once (ids {} and {}), keeping {}",
                    definition.name, existing, definition.id, existing
                );
            } else {
                by_name.insert(definition.name.clone(), definition.id);
            }
            by_id.insert(definition.id, definition);
        }

        Self { by_name, by_id }
    }

    /// Resolve a target field given as a native name, a custom field name,
    /// or a numeric custom field id
    pub fn resolve(&self, target: &str) -> Option<FieldRef> {
        if NATIVE_FIELDS.contains(&target) {
            return Some(FieldRef::Native(target.to_string()));
        }

        if let Some(id) = self.by_name.get(target) {
            return Some(FieldRef::Custom(*id));
        }

        target
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| self.by_id.contains_key(id))
            .map(FieldRef::Custom)
    }

    pub fn definition(&self, id: i64) -> Option<&CustomFieldDefinition> {
        self.by_id.get(&id)
    }

    /// Definitions ordered by id
    pub fn definitions(&self) -> Vec<&CustomFieldDefinition> {
        let mut definitions: Vec<_> = self.by_id.values().collect();
        definitions.sort_by_key(|d| d.id);
        definitions
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
