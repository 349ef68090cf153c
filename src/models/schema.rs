// src/models/schema.rs
//! Credential schema data model.
//!
//! A schema names an ordered set of attributes a credential type asserts.
//! Its identity is `(issuer, name, version)` and its id is derived from
//! exactly those three values, so re-creating the same schema yields the
//! same id.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{AnoncredsError, Result};
use crate::models::did::Did;

/// Upper bound on attributes per schema, matching common ledger limits.
pub const MAX_ATTRIBUTES: usize = 125;

const SCHEMA_MARKER: &str = "2";

/// `<issuer_did>:2:<name>:<version>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaId(String);

impl SchemaId {
    pub fn new(issuer: &Did, name: &str, version: &str) -> Self {
        SchemaId(format!("{}:{}:{}:{}", issuer, SCHEMA_MARKER, name, version))
    }

    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(':').collect();
        match parts.as_slice() {
            [did, SCHEMA_MARKER, name, version] if !name.is_empty() && !version.is_empty() => {
                Did::parse(did)?;
                Ok(SchemaId(value.to_string()))
            }
            _ => Err(AnoncredsError::Validation(format!("malformed schema id {:?}", value))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchemaId {
    type Error = AnoncredsError;

    fn try_from(value: String) -> Result<Self> {
        SchemaId::parse(&value)
    }
}

impl From<SchemaId> for String {
    fn from(value: SchemaId) -> String {
        value.0
    }
}

/// A published or publishable credential schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Schema {
    pub id: SchemaId,
    pub issuer_id: Did,
    pub name: String,
    pub version: String,
    /// Attribute names in the order credentials sign them
    pub attr_names: Vec<String>,
}

impl Schema {
    /// Builds a schema after validating its shape.
    ///
    /// # Errors
    /// `Validation` if the name or version is empty or contains `:`, the
    /// version is not dotted digits, `attr_names` is empty, too long,
    /// contains a blank name, or contains duplicates (compared trimmed and
    /// case-insensitively).
    pub fn new(issuer_id: Did, name: &str, version: &str, attr_names: Vec<String>) -> Result<Self> {
        validate_component("name", name)?;
        validate_component("version", version)?;
        if !version.split('.').all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
            return Err(AnoncredsError::Validation(format!(
                "schema version {:?} must be dotted digits",
                version
            )));
        }
        validate_attr_names(&attr_names)?;

        Ok(Schema {
            id: SchemaId::new(&issuer_id, name, version),
            issuer_id,
            name: name.to_string(),
            version: version.to_string(),
            attr_names,
        })
    }

    /// Re-runs shape validation on a schema that arrived from outside.
    pub fn validate(&self) -> Result<()> {
        let rebuilt = Schema::new(
            self.issuer_id.clone(),
            &self.name,
            &self.version,
            self.attr_names.clone(),
        )?;
        if rebuilt.id != self.id {
            return Err(AnoncredsError::Validation(format!(
                "schema id {} does not match its issuer, name and version",
                self.id
            )));
        }
        Ok(())
    }
}

fn validate_component(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AnoncredsError::Validation(format!("schema {} must not be empty", field)));
    }
    if value.contains(':') {
        return Err(AnoncredsError::Validation(format!("schema {} must not contain ':'", field)));
    }
    Ok(())
}

fn validate_attr_names(attr_names: &[String]) -> Result<()> {
    if attr_names.is_empty() {
        return Err(AnoncredsError::Validation("schema needs at least one attribute".into()));
    }
    if attr_names.len() > MAX_ATTRIBUTES {
        return Err(AnoncredsError::Validation(format!(
            "schema has {} attributes, limit is {}",
            attr_names.len(),
            MAX_ATTRIBUTES
        )));
    }
    let mut seen = HashSet::with_capacity(attr_names.len());
    for name in attr_names {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return Err(AnoncredsError::Validation("attribute names must not be blank".into()));
        }
        if !seen.insert(key) {
            return Err(AnoncredsError::Validation(format!("duplicate attribute {:?}", name)));
        }
    }
    Ok(())
}
