//! Unit domain model.
//!
//! # Invariants
//! - `id_unit` is unique and never reused while the row exists.
//! - The root unit has id `ID_ROOT` and parent `ID_NULL`.
//! - `label` and `description` are non-blank and at most
//!   `MAX_TEXT_CHARS` characters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Integer identifier of a unit.
pub type UnitId = i32;

/// Identifier of the root sentinel unit.
pub const ID_ROOT: UnitId = 0;

/// "No unit selected" marker. Also the parent id of the root unit.
pub const ID_NULL: UnitId = -1;

/// Resource type of units; also the action type of the unit action bar.
pub const RESOURCE_TYPE: &str = "UNIT_TYPE";

/// Upper bound for `label` and `description`.
pub const MAX_TEXT_CHARS: usize = 255;

/// Value stored by an attribute handler on a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Ids(Vec<i32>),
}

/// One node of the organizational tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id_unit: UnitId,
    pub id_parent: UnitId,
    pub label: String,
    pub description: String,
    /// Filled by attribute handlers on demand, keyed by attribute type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Unit {
    /// Creates an unsaved unit under `id_parent`.
    ///
    /// The id stays `ID_NULL` until the unit is persisted.
    pub fn new(id_parent: UnitId, label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id_unit: ID_NULL,
            id_parent,
            label: label.into(),
            description: description.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id_unit == ID_ROOT
    }

    /// Checks the field constraints enforced before any write.
    pub fn validate(&self) -> Result<(), UnitValidationError> {
        check_text("label", &self.label)?;
        check_text("description", &self.description)?;
        Ok(())
    }
}

fn check_text(field: &'static str, value: &str) -> Result<(), UnitValidationError> {
    if value.trim().is_empty() {
        return Err(UnitValidationError::BlankField(field));
    }
    let length = value.chars().count();
    if length > MAX_TEXT_CHARS {
        return Err(UnitValidationError::FieldTooLong {
            field,
            max: MAX_TEXT_CHARS,
            actual: length,
        });
    }
    Ok(())
}

/// Field constraint violations on a unit payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitValidationError {
    BlankField(&'static str),
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

impl Display for UnitValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "unit {field} must not be blank"),
            Self::FieldTooLong { field, max, actual } => write!(
                f,
                "unit {field} is {actual} characters long, at most {max} allowed"
            ),
        }
    }
}

impl Error for UnitValidationError {}

/// Query options for unit lookups. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFilter {
    pub id_parent: Option<UnitId>,
    pub id_sector: Option<i32>,
}

impl UnitFilter {
    pub fn children_of(id_parent: UnitId) -> Self {
        Self {
            id_parent: Some(id_parent),
            ..Self::default()
        }
    }

    pub fn with_sector(id_sector: i32) -> Self {
        Self {
            id_sector: Some(id_sector),
            ..Self::default()
        }
    }
}

/// Code/label pair used by selection lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub code: UnitId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::{Unit, UnitValidationError, ID_NULL, ID_ROOT, MAX_TEXT_CHARS};

    #[test]
    fn new_unit_is_unsaved() {
        let unit = Unit::new(ID_ROOT, "Finance", "Finance department");
        assert_eq!(unit.id_unit, ID_NULL);
        assert_eq!(unit.id_parent, ID_ROOT);
        assert!(unit.attributes.is_empty());
        assert!(unit.validate().is_ok());
    }

    #[test]
    fn blank_label_is_rejected() {
        let unit = Unit::new(ID_ROOT, "   ", "desc");
        assert_eq!(
            unit.validate(),
            Err(UnitValidationError::BlankField("label"))
        );
    }

    #[test]
    fn blank_description_is_rejected() {
        let unit = Unit::new(ID_ROOT, "label", "");
        assert_eq!(
            unit.validate(),
            Err(UnitValidationError::BlankField("description"))
        );
    }

    #[test]
    fn overlong_label_is_rejected_by_char_count() {
        let unit = Unit::new(ID_ROOT, "é".repeat(MAX_TEXT_CHARS + 1), "desc");
        assert!(matches!(
            unit.validate(),
            Err(UnitValidationError::FieldTooLong { field: "label", actual, .. })
                if actual == MAX_TEXT_CHARS + 1
        ));

        let boundary = Unit::new(ID_ROOT, "é".repeat(MAX_TEXT_CHARS), "desc");
        assert!(boundary.validate().is_ok());
    }
}
