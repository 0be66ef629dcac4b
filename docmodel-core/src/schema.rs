//! Model schemas: a collection name plus an ordered list of fields, each
//! flagged unique or not.
//!
//! A schema is validated exactly once, when it is built, and is immutable
//! afterwards. Typed declarations go through [`Schema::builder`]; declarations
//! that arrive as data (`[["foo", false], ["bar", true]]`) go through
//! [`Schema::from_declaration`] or [`Schema::from_json`], which additionally
//! check the shape and types of every entry.
//!
//! ```ignore
//! let schema = Schema::builder("example")
//!     .field("foo")
//!     .unique_field("bar")
//!     .build()?;
//! ```

use bson::{Bson, Document};
use serde_json::Value;
use std::collections::HashSet;

use crate::{document::ID_FIELD, error::SchemaError};

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    unique: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, unique: bool) -> Self {
        Self { name: name.into(), unique }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    collection: String,
    fields: Vec<FieldSpec>,
}

/// A declaration entry seen before its types are checked.
enum Entry<'a> {
    Malformed,
    Pair(Option<&'a str>, Option<bool>),
}

impl Schema {
    pub fn builder(collection: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(collection)
    }

    /// Validates a typed field list.
    ///
    /// # Errors
    ///
    /// Checked in order: an empty collection name, an empty field list, a duplicate
    /// field name, a name that cannot be used as a document key.
    pub fn validate(
        collection: impl Into<String>,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, SchemaError> {
        let collection = collection.into();

        if collection.trim().is_empty() {
            return Err(SchemaError::MissingCollection);
        }
        if fields.is_empty() {
            return Err(SchemaError::MissingFields);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }

        if let Some(field) = fields.iter().find(|f| !is_valid_field_name(&f.name)) {
            return Err(SchemaError::InvalidFieldName(field.name.clone()));
        }

        Ok(Self { collection, fields })
    }

    /// Validates a declaration given as BSON `[name, unique]` pairs.
    ///
    /// # Errors
    ///
    /// In addition to the checks of [`Schema::validate`], every entry must be a
    /// two-element array ([`SchemaError::MalformedField`]) holding a string and a
    /// boolean ([`SchemaError::InvalidFieldTypes`]).
    pub fn from_declaration(
        collection: impl Into<String>,
        entries: &[Bson],
    ) -> Result<Self, SchemaError> {
        let entries = entries
            .iter()
            .map(|entry| match entry {
                Bson::Array(pair) if pair.len() == 2 => {
                    Entry::Pair(pair[0].as_str(), pair[1].as_bool())
                }
                _ => Entry::Malformed,
            })
            .collect();

        Self::from_entries(collection.into(), entries)
    }

    /// Validates a declaration given as a JSON array of `[name, unique]` pairs.
    pub fn from_json(
        collection: impl Into<String>,
        declaration: &Value,
    ) -> Result<Self, SchemaError> {
        let entries = match declaration {
            Value::Null => Vec::new(),
            Value::Array(entries) => entries
                .iter()
                .map(|entry| match entry {
                    Value::Array(pair) if pair.len() == 2 => {
                        Entry::Pair(pair[0].as_str(), pair[1].as_bool())
                    }
                    _ => Entry::Malformed,
                })
                .collect(),
            _ => vec![Entry::Malformed],
        };

        Self::from_entries(collection.into(), entries)
    }

    fn from_entries(collection: String, entries: Vec<Entry<'_>>) -> Result<Self, SchemaError> {
        if collection.trim().is_empty() {
            return Err(SchemaError::MissingCollection);
        }
        if entries.is_empty() {
            return Err(SchemaError::MissingFields);
        }

        if let Some(position) = entries
            .iter()
            .position(|entry| matches!(entry, Entry::Malformed))
        {
            return Err(SchemaError::MalformedField(position));
        }

        let fields = entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| match entry {
                Entry::Pair(Some(name), Some(unique)) => Ok(FieldSpec::new(name, unique)),
                _ => Err(SchemaError::InvalidFieldTypes(position)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::validate(collection, fields)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Unique fields, in declaration order.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Checks that every key of `values` is a declared field or `_id`.
    pub fn check_keys(&self, values: &Document) -> Result<(), SchemaError> {
        match values
            .keys()
            .find(|key| key.as_str() != ID_FIELD && self.field(key).is_none())
        {
            Some(key) => Err(SchemaError::UnknownField(key.clone(), self.collection.clone())),
            None => Ok(()),
        }
    }

    /// Checks that every key of `values` is a declared field. `_id` is rejected.
    pub fn check_fields(&self, values: &Document) -> Result<(), SchemaError> {
        match values.keys().find(|key| self.field(key).is_none()) {
            Some(key) => Err(SchemaError::UnknownField(key.clone(), self.collection.clone())),
            None => Ok(()),
        }
    }

    /// Returns every declared field, in order, with its value from `values` or null.
    ///
    /// `_id` and undeclared keys are dropped.
    pub fn normalize(&self, values: &Document) -> Document {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), values.get(&f.name).cloned().unwrap_or(Bson::Null)))
            .collect()
    }
}

fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name != ID_FIELD
        && !name.starts_with('$')
        && !name.contains('.')
        && !name.contains('\0')
}

pub struct SchemaBuilder {
    collection: String,
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), fields: Vec::new() }
    }

    /// Declares a field without uniqueness.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec::new(name, false));
        self
    }

    /// Declares a field whose values must not repeat across documents.
    pub fn unique_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec::new(name, true));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::validate(self.collection, self.fields)
    }
}
