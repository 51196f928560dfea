//! Declarative type/field filter for consumers.
//!
//! A consumer that only needs part of a dataset declares which types (and,
//! for object types, which fields) to materialize. Excluded payload bytes
//! are drained from the stream without allocation. A filter applied at
//! snapshot time stays in effect for every subsequent delta on the same
//! engine: filtered-out types never gain a type-state, so delta payloads for
//! them are discarded, and filtered-out fields stay out of the columnar
//! storage.
//!
//! Serde derives let deployments ship filters as configuration.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use shoal_types::ObjectSchema;

/// Per-type field selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFilter {
    /// Materialize every field of the type.
    #[serde(default)]
    pub all_fields: bool,
    /// Field names to materialize when `all_fields` is false.
    #[serde(default)]
    pub fields: BTreeSet<String>,
}

impl TypeFilter {
    fn includes_field(&self, field_name: &str) -> bool {
        self.all_fields || self.fields.contains(field_name)
    }
}

/// Selection of the types and fields a consumer materializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Materialize every type with every field.
    #[serde(default)]
    include_all: bool,
    /// Explicitly included types when `include_all` is false.
    #[serde(default)]
    types: BTreeMap<String, TypeFilter>,
}

impl FilterConfig {
    /// A filter materializing everything.
    pub fn include_all() -> Self {
        Self { include_all: true, types: BTreeMap::new() }
    }

    /// A filter materializing nothing until types are added.
    pub fn new() -> Self {
        Self { include_all: false, types: BTreeMap::new() }
    }

    /// Includes a type with all of its fields.
    pub fn add_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.types
            .insert(type_name.into(), TypeFilter { all_fields: true, fields: BTreeSet::new() });
        self
    }

    /// Includes specific fields of an object type.
    ///
    /// Calling this repeatedly for the same type unions the field sets.
    pub fn add_fields<I, S>(&mut self, type_name: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.types.entry(type_name.into()).or_default();
        entry.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Returns true if the type should be materialized.
    pub fn includes_type(&self, type_name: &str) -> bool {
        self.include_all || self.types.contains_key(type_name)
    }

    /// Returns the schema a materialized object type-state should use.
    pub fn filter_object_schema(&self, schema: &ObjectSchema) -> ObjectSchema {
        if self.include_all {
            return schema.clone();
        }
        match self.types.get(&schema.name) {
            Some(filter) if !filter.all_fields => {
                schema.retain_fields(|name| filter.includes_field(name))
            }
            _ => schema.clone(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::include_all()
    }
}
