//! Structural Validator
//!
//! Checks a current-version document against the grammar and the
//! document-wide id uniqueness constraints, producing a [`ParseTree`] the
//! graph builder can trust. Exactly one error is reported: the first.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};

use jsonschema::error::ValidationErrorKind;
use pipecfg_artifact::{ConfigDocument, ContentHash, SCHEMA_VERSION_KEY};
use serde_json::Value as JsonValue;

use crate::error::StructuralError;
use crate::grammar::{document_schema, fragment_schema};
use crate::migration::CURRENT_SCHEMA_VERSION;

/// Elements that can be read and written on their own
pub const FRAGMENT_ELEMENTS: [&str; 3] = ["pipeline", "stage", "job"];

/// A document that passed structural validation
///
/// Only [`StructuralValidator::validate`] creates one.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
    value: JsonValue,
    hash: ContentHash,
}

impl ParseTree {
    /// Validated document value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    /// Hash of the validated document
    #[inline]
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub(crate) fn into_value(self) -> JsonValue {
        self.value
    }
}

/// Compiled grammar for documents and fragments
pub struct StructuralValidator {
    document: jsonschema::Validator,
    fragments: HashMap<&'static str, jsonschema::Validator>,
}

impl StructuralValidator {
    /// Compile the grammar
    ///
    /// # Errors
    /// Returns [`StructuralError::InvalidGrammar`] if the schema does not compile
    pub fn new() -> Result<Self, StructuralError> {
        let document = compile(&document_schema())?;
        let fragments = FRAGMENT_ELEMENTS
            .iter()
            .map(|&element| -> Result<_, StructuralError> {
                Ok((element, compile(&fragment_schema(element))?))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { document, fragments })
    }

    /// Validate a whole document
    ///
    /// # Errors
    /// Returns the first violation: version, grammar, then duplicate ids
    pub fn validate(&self, document: &ConfigDocument) -> Result<ParseTree, StructuralError> {
        let value = document.value();
        let actual = document
            .schema_version()
            .map_err(|e| StructuralError::at(format!("/{SCHEMA_VERSION_KEY}"), e.to_string()))?;
        if actual != CURRENT_SCHEMA_VERSION {
            return Err(StructuralError::VersionMismatch {
                expected: CURRENT_SCHEMA_VERSION,
                actual,
            });
        }

        check(&self.document, value)?;
        check_unique_ids(value)?;

        Ok(ParseTree {
            value: value.clone(),
            hash: document.hash(),
        })
    }

    /// Validate the body of a detached element
    ///
    /// # Errors
    /// Returns the first grammar violation, or a schema violation for an
    /// element kind that has no fragment grammar
    pub fn validate_fragment(&self, element: &str, body: &JsonValue) -> Result<(), StructuralError> {
        let validator = self
            .fragments
            .get(element)
            .ok_or_else(|| StructuralError::at("", format!("<{element}> cannot be read on its own")))?;
        check(validator, body)
    }
}

impl Debug for StructuralValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralValidator")
            .field("version", &CURRENT_SCHEMA_VERSION)
            .field("fragments", &self.fragments.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn compile(schema: &JsonValue) -> Result<jsonschema::Validator, StructuralError> {
    jsonschema::options()
        .should_validate_formats(true)
        .build(schema)
        .map_err(|e| StructuralError::InvalidGrammar(e.to_string()))
}

fn check(validator: &jsonschema::Validator, value: &JsonValue) -> Result<(), StructuralError> {
    validator.validate(value).map_err(|error| {
        let path = error.instance_path.to_string();
        match &error.kind {
            ValidationErrorKind::AdditionalProperties { unexpected } => StructuralError::UnknownField {
                field: unexpected
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_owned()),
                path,
            },
            _ => StructuralError::SchemaViolation {
                path,
                message: error.to_string(),
            },
        }
    })
}

fn list<'a>(value: &'a JsonValue, key: &str) -> Vec<&'a JsonValue> {
    value
        .get(key)
        .and_then(JsonValue::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

/// Ids that must be unique across the whole document
fn check_unique_ids(value: &JsonValue) -> Result<(), StructuralError> {
    let packages: Vec<&JsonValue> = list(value, "repositories")
        .into_iter()
        .filter_map(|repo| repo.get("packages").and_then(JsonValue::as_array))
        .flatten()
        .collect();

    let collections = [
        ("elasticProfiles", list(value, "elasticProfiles"), "id"),
        ("repositories", list(value, "repositories"), "id"),
        ("packages", packages, "id"),
        ("scms", list(value, "scms"), "id"),
        ("agents", list(value, "agents"), "uuid"),
        ("configRepos", list(value, "configRepos"), "id"),
    ];
    for (collection, items, field) in collections {
        let mut seen = HashSet::new();
        for id in items.iter().filter_map(|item| item.get(field).and_then(JsonValue::as_str)) {
            if !seen.insert(id) {
                return Err(StructuralError::DuplicateId {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                });
            }
        }
    }
    Ok(())
}
