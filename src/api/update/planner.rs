//! Batch planning: change-set rows → size-bounded batches of update records

use super::changeset::{ChangeSet, ID_COLUMN};
use crate::api::schema::{FieldRef, SchemaSnapshot};
use crate::error::UpdateError;
use log::{debug, warn};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// One company's wire-ready update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub id: i64,
    pub mutations: Vec<(FieldRef, Value)>,
}

#[derive(Serialize)]
struct CustomFieldValue<'a> {
    custom_field_definition_id: i64,
    value: &'a Value,
}

impl Serialize for UpdateRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut custom_fields = Vec::new();
        let mut native_fields = Vec::new();
        for (field, value) in &self.mutations {
            match field {
                FieldRef::Custom(id) => custom_fields.push(CustomFieldValue {
                    custom_field_definition_id: *id,
                    value,
                }),
                FieldRef::Native(name) => native_fields.push((name.as_str(), value)),
            }
        }

        let mut map = serializer.serialize_map(Some(2 + native_fields.len()))?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in native_fields {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("custom_fields", &custom_fields)?;
        map.end()
    }
}

/// Request body of the bulk update endpoint
#[derive(Debug, Serialize)]
pub struct BulkUpdateRequest<'a> {
    pub companies: &'a [UpdateRecord],
}

/// Records sent together in one request
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position in plan order, starting at 0
    pub index: usize,
    pub records: Vec<UpdateRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.records.iter().map(|record| record.id).collect()
    }

    pub fn to_request(&self) -> BulkUpdateRequest<'_> {
        BulkUpdateRequest {
            companies: &self.records,
        }
    }
}

/// Separates the source column from the target field in `column=field`
pub const COLUMN_MAPPING_SEPARATOR: char = '=';

/// A target field that resolved and has a column in the change-set
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Target as given, e.g. `Region` or `Region 2025=101`
    pub name: String,
    pub field: FieldRef,
    column: usize,
}

/// Split a target into (source column, field to resolve).
///
/// `Region 2025=101` reads the `Region 2025` column into field 101; a plain
/// `Region` reads the `Region` column into the field of the same name.
pub fn split_target(target: &str) -> (&str, &str) {
    match target.split_once(COLUMN_MAPPING_SEPARATOR) {
        Some((column, field)) => (column.trim(), field.trim()),
        None => (target, target),
    }
}

/// Output of [`BatchPlanner::plan`]
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub batches: Vec<Batch>,
    pub fields: Vec<ResolvedField>,
    /// Target fields dropped because they did not resolve
    pub skipped_fields: Vec<String>,
    /// Target fields that resolved but whose source column is absent
    pub missing_columns: Vec<String>,
}

impl BatchPlan {
    pub fn total_records(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }
}

/// Splits a change-set into batches using an injected schema snapshot
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    schema: Arc<SchemaSnapshot>,
    batch_size: usize,
}

impl BatchPlanner {
    pub fn new(schema: Arc<SchemaSnapshot>, batch_size: usize) -> Self {
        Self { schema, batch_size }
    }

    pub fn plan<S: AsRef<str>>(
        &self,
        change_set: &ChangeSet,
        target_fields: &[S],
    ) -> Result<BatchPlan, UpdateError> {
        if self.batch_size == 0 {
            return Err(UpdateError::configuration("batch size must be at least 1"));
        }

        let id_column = change_set.column_index(ID_COLUMN).ok_or_else(|| {
            UpdateError::configuration(format!(
                "change-set must contain an '{}' column to identify companies",
                ID_COLUMN
            ))
        })?;

        let (fields, skipped_fields, missing_columns) = self.resolve_fields(change_set, target_fields);
        if fields.is_empty() {
            return Err(UpdateError::configuration(
                "none of the target fields could be resolved",
            ));
        }

        let mut seen = HashSet::with_capacity(change_set.len());
        let mut records = Vec::with_capacity(change_set.len());
        for (position, row) in change_set.rows().iter().enumerate() {
            let id = parse_id(&row[id_column]).ok_or_else(|| {
                UpdateError::configuration(format!(
                    "row {} has an invalid id: {}",
                    position + 1,
                    row[id_column]
                ))
            })?;
            if !seen.insert(id) {
                return Err(UpdateError::configuration(format!(
                    "id {} appears more than once",
                    id
                )));
            }

            let mutations = fields
                .iter()
                .map(|f| (f.field.clone(), row[f.column].clone()))
                .collect();
            records.push(UpdateRecord { id, mutations });
        }

        let batches: Vec<Batch> = records
            .chunks(self.batch_size)
            .enumerate()
            .map(|(index, chunk)| Batch {
                index,
                records: chunk.to_vec(),
            })
            .collect();

        debug!(
            "Planned {} record(s) into {} batch(es) of up to {}",
            records.len(),
            batches.len(),
            self.batch_size
        );

        Ok(BatchPlan {
            batches,
            fields,
            skipped_fields,
            missing_columns,
        })
    }

    fn resolve_fields<S: AsRef<str>>(
        &self,
        change_set: &ChangeSet,
        target_fields: &[S],
    ) -> (Vec<ResolvedField>, Vec<String>, Vec<String>) {
        let mut resolved: Vec<ResolvedField> = Vec::new();
        let mut unresolved = Vec::new();
        let mut missing_columns = Vec::new();

        for name in target_fields.iter().map(AsRef::<str>::as_ref) {
            let (column_name, field_name) = split_target(name);
            let Some(field) = self.schema.resolve(field_name) else {
                unresolved.push(name.to_string());
                continue;
            };
            let Some(column) = change_set.column_index(column_name) else {
                warn!(
                    "Field '{}' resolved but the change-set has no '{}' column",
                    name, column_name
                );
                missing_columns.push(name.to_string());
                continue;
            };
            if resolved.iter().any(|r| r.field == field) {
                warn!("Field '{}' targets {} more than once, ignoring repeat", name, field);
                continue;
            }
            resolved.push(ResolvedField {
                name: name.to_string(),
                field,
                column,
            });
        }

        if !unresolved.is_empty() {
            warn!(
                "The following fields have no matching field id and will be skipped: {:?}",
                unresolved
            );
        }

        (resolved, unresolved, missing_columns)
    }
}

/// Accepts integer numbers, whole floats and numeric strings
fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
