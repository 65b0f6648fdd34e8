//! Built-in `sector` attribute.
//!
//! A unit either hosts sub-units or owns sectors, never both:
//! - a unit that owns sectors cannot receive sub-units;
//! - a unit that has sub-units cannot be given sectors.

use super::{AttributeError, AttributeResult, UnitAttributeHandler};
use crate::model::unit::{AttributeValue, Unit, UnitId};
use crate::web::params::{parse_numeric_id, RequestParams};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Stores `(id_unit, id_sector)` pairs in `unit_sectors`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectorAttributeHandler;

impl SectorAttributeHandler {
    pub const ATTRIBUTE_TYPE: &'static str = "sector";
    /// Request parameter carrying sector ids, one value per sector.
    pub const PARAMETER_ID_SECTORS: &'static str = "idSectors";

    /// Sector ids owned by `id_unit`, ascending.
    pub fn sector_ids(conn: &Connection, id_unit: UnitId) -> AttributeResult<Vec<i32>> {
        let mut stmt = conn.prepare(
            "SELECT id_sector FROM unit_sectors WHERE id_unit = ?1 ORDER BY id_sector ASC;",
        )?;
        let mut rows = stmt.query([id_unit])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn has_sectors(conn: &Connection, id_unit: UnitId) -> AttributeResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM unit_sectors WHERE id_unit = ?1 LIMIT 1;",
                [id_unit],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn has_children(conn: &Connection, id_unit: UnitId) -> AttributeResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM units WHERE id_parent = ?1 LIMIT 1;",
                [id_unit],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Parses `idSectors`; blank values are skipped, duplicates collapse.
    fn requested_sectors(params: &RequestParams) -> AttributeResult<BTreeSet<i32>> {
        let mut ids = BTreeSet::new();
        for value in params.get_all(Self::PARAMETER_ID_SECTORS) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let id = parse_numeric_id(value).ok_or_else(|| AttributeError::InvalidInput {
                attribute_type: Self::ATTRIBUTE_TYPE,
                message: format!("sector id `{value}` is not numeric"),
            })?;
            ids.insert(id);
        }
        Ok(ids)
    }

    fn replace_sectors(
        conn: &Connection,
        unit: &Unit,
        sectors: &BTreeSet<i32>,
    ) -> AttributeResult<()> {
        if !sectors.is_empty() && Self::has_children(conn, unit.id_unit)? {
            return Err(AttributeError::Rejected {
                attribute_type: Self::ATTRIBUTE_TYPE,
                message: format!("unit {} has sub-units and cannot own sectors", unit.id_unit),
            });
        }

        conn.execute("DELETE FROM unit_sectors WHERE id_unit = ?1;", [unit.id_unit])?;
        for id_sector in sectors {
            conn.execute(
                "INSERT INTO unit_sectors (id_unit, id_sector) VALUES (?1, ?2);",
                params![unit.id_unit, id_sector],
            )?;
        }
        Ok(())
    }
}

impl UnitAttributeHandler for SectorAttributeHandler {
    fn attribute_type(&self) -> &'static str {
        Self::ATTRIBUTE_TYPE
    }

    fn populate(&self, conn: &Connection, unit: &mut Unit) -> AttributeResult<()> {
        let ids = Self::sector_ids(conn, unit.id_unit)?;
        unit.attributes
            .insert(Self::ATTRIBUTE_TYPE.to_string(), AttributeValue::Ids(ids));
        Ok(())
    }

    fn can_create_sub_unit(&self, conn: &Connection, id_unit: UnitId) -> AttributeResult<bool> {
        Ok(!Self::has_sectors(conn, id_unit)?)
    }

    fn on_create(&self, conn: &Connection, unit: &Unit, params: &RequestParams) -> AttributeResult<()> {
        let sectors = Self::requested_sectors(params)?;
        if sectors.is_empty() {
            return Ok(());
        }
        Self::replace_sectors(conn, unit, &sectors)
    }

    /// Replaces sectors only when the request carries `idSectors`.
    fn on_modify(&self, conn: &Connection, unit: &Unit, params: &RequestParams) -> AttributeResult<()> {
        if params.get_all(Self::PARAMETER_ID_SECTORS).is_empty() {
            return Ok(());
        }
        let sectors = Self::requested_sectors(params)?;
        Self::replace_sectors(conn, unit, &sectors)
    }

    fn on_move(&self, conn: &Connection, unit: &Unit, new_parent: &Unit) -> AttributeResult<()> {
        if Self::has_sectors(conn, new_parent.id_unit)? {
            return Err(AttributeError::Rejected {
                attribute_type: Self::ATTRIBUTE_TYPE,
                message: format!(
                    "unit {} owns sectors and cannot receive unit {}",
                    new_parent.id_unit, unit.id_unit
                ),
            });
        }
        Ok(())
    }

    fn on_remove(&self, conn: &Connection, id_unit: UnitId) -> AttributeResult<()> {
        let removed = conn.execute("DELETE FROM unit_sectors WHERE id_unit = ?1;", [id_unit])?;
        if removed > 0 {
            info!(
                "event=sector_cleanup module=attribute status=ok id_unit={} removed={}",
                id_unit, removed
            );
        }
        Ok(())
    }
}
