//! Attribute handler contract and in-process registry.

use super::{AttributeError, AttributeResult, SectorAttributeHandler};
use crate::model::unit::{Unit, UnitId};
use crate::web::params::RequestParams;
use log::debug;
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Strategy owning one kind of additional unit data.
///
/// Every hook receives the connection of the current operation; during
/// mutations it is the open transaction, so hook writes commit or roll back
/// together with the unit row.
pub trait UnitAttributeHandler {
    /// Key under which `populate` stores values in `Unit::attributes`.
    fn attribute_type(&self) -> &'static str;

    fn populate(&self, conn: &Connection, unit: &mut Unit) -> AttributeResult<()>;

    /// Whether this attribute lets `id_unit` host sub-units.
    fn can_create_sub_unit(&self, _conn: &Connection, _id_unit: UnitId) -> AttributeResult<bool> {
        Ok(true)
    }

    fn on_create(
        &self,
        _conn: &Connection,
        _unit: &Unit,
        _params: &RequestParams,
    ) -> AttributeResult<()> {
        Ok(())
    }

    fn on_modify(
        &self,
        _conn: &Connection,
        _unit: &Unit,
        _params: &RequestParams,
    ) -> AttributeResult<()> {
        Ok(())
    }

    /// Called before the parent link of `unit` changes to `new_parent`.
    fn on_move(&self, _conn: &Connection, _unit: &Unit, _new_parent: &Unit) -> AttributeResult<()> {
        Ok(())
    }

    /// Must delete every row the handler owns for `id_unit`.
    fn on_remove(&self, conn: &Connection, id_unit: UnitId) -> AttributeResult<()>;
}

/// Handlers keyed by attribute type, invoked in key order.
#[derive(Default)]
pub struct UnitAttributeRegistry {
    handlers: BTreeMap<&'static str, Box<dyn UnitAttributeHandler>>,
}

impl UnitAttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `sector` handler.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.handlers.insert(
            SectorAttributeHandler::ATTRIBUTE_TYPE,
            Box::new(SectorAttributeHandler),
        );
        registry
    }

    pub fn register(&mut self, handler: impl UnitAttributeHandler + 'static) -> AttributeResult<()> {
        let attribute_type = handler.attribute_type();
        if self.handlers.contains_key(attribute_type) {
            return Err(AttributeError::DuplicateType(attribute_type));
        }
        self.handlers.insert(attribute_type, Box::new(handler));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn attribute_types(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn populate(&self, conn: &Connection, unit: &mut Unit) -> AttributeResult<()> {
        for handler in self.handlers.values() {
            handler.populate(conn, unit)?;
        }
        Ok(())
    }

    /// False as soon as one handler objects; an empty registry allows.
    pub fn can_create_sub_unit(&self, conn: &Connection, id_unit: UnitId) -> AttributeResult<bool> {
        for (attribute_type, handler) in &self.handlers {
            if !handler.can_create_sub_unit(conn, id_unit)? {
                debug!(
                    "event=attribute_check module=attribute status=denied attribute_type={} id_unit={}",
                    attribute_type, id_unit
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn on_create(
        &self,
        conn: &Connection,
        unit: &Unit,
        params: &RequestParams,
    ) -> AttributeResult<()> {
        for handler in self.handlers.values() {
            handler.on_create(conn, unit, params)?;
        }
        Ok(())
    }

    pub fn on_modify(
        &self,
        conn: &Connection,
        unit: &Unit,
        params: &RequestParams,
    ) -> AttributeResult<()> {
        for handler in self.handlers.values() {
            handler.on_modify(conn, unit, params)?;
        }
        Ok(())
    }

    pub fn on_move(&self, conn: &Connection, unit: &Unit, new_parent: &Unit) -> AttributeResult<()> {
        for handler in self.handlers.values() {
            handler.on_move(conn, unit, new_parent)?;
        }
        Ok(())
    }

    pub fn on_remove(&self, conn: &Connection, id_unit: UnitId) -> AttributeResult<()> {
        for handler in self.handlers.values() {
            handler.on_remove(conn, id_unit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{UnitAttributeHandler, UnitAttributeRegistry};
    use crate::attribute::{AttributeError, AttributeResult};
    use crate::db::open_db_in_memory;
    use crate::model::unit::{AttributeValue, Unit, UnitId, ID_ROOT};
    use rusqlite::Connection;

    struct ColorHandler;

    impl UnitAttributeHandler for ColorHandler {
        fn attribute_type(&self) -> &'static str {
            "color"
        }

        fn populate(&self, _conn: &Connection, unit: &mut Unit) -> AttributeResult<()> {
            unit.attributes
                .insert("color".to_string(), AttributeValue::Text("blue".to_string()));
            Ok(())
        }

        fn can_create_sub_unit(&self, _conn: &Connection, id_unit: UnitId) -> AttributeResult<bool> {
            Ok(id_unit != 7)
        }

        fn on_remove(&self, _conn: &Connection, _id_unit: UnitId) -> AttributeResult<()> {
            Ok(())
        }
    }

    #[test]
    fn builtin_registry_contains_sector_handler() {
        let registry = UnitAttributeRegistry::with_builtin_handlers();
        assert_eq!(registry.attribute_types(), vec!["sector"]);
    }

    #[test]
    fn duplicate_attribute_type_is_rejected() {
        let mut registry = UnitAttributeRegistry::new();
        registry.register(ColorHandler).unwrap();
        let err = registry.register(ColorHandler).unwrap_err();
        assert!(matches!(err, AttributeError::DuplicateType("color")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn populate_and_sub_unit_checks_go_through_every_handler() {
        let conn = open_db_in_memory().unwrap();
        let mut registry = UnitAttributeRegistry::with_builtin_handlers();
        registry.register(ColorHandler).unwrap();

        let mut unit = Unit::new(ID_ROOT, "Finance", "Finance department");
        unit.id_unit = 3;
        registry.populate(&conn, &mut unit).unwrap();
        assert_eq!(
            unit.attributes.get("color"),
            Some(&AttributeValue::Text("blue".to_string()))
        );
        assert_eq!(unit.attributes.get("sector"), Some(&AttributeValue::Ids(vec![])));

        assert!(registry.can_create_sub_unit(&conn, 3).unwrap());
        assert!(!registry.can_create_sub_unit(&conn, 7).unwrap());
    }

    #[test]
    fn empty_registry_allows_sub_units() {
        let conn = open_db_in_memory().unwrap();
        let registry = UnitAttributeRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.can_create_sub_unit(&conn, ID_ROOT).unwrap());
    }
}
