use rusqlite::Connection;
use unittree_core::attribute::{AttributeError, AttributeResult};
use unittree_core::db::open_db_in_memory;
use unittree_core::model::unit::AttributeValue;
use unittree_core::{
    GrantTable, RequestParams, SectorAttributeHandler, Unit, UnitAttributeHandler,
    UnitAttributeRegistry, UnitId, UnitService, UnitServiceError, UnitUserService, ID_ROOT,
};

const SECTORS: &str = SectorAttributeHandler::PARAMETER_ID_SECTORS;

fn service(conn: &Connection) -> UnitService<'_> {
    UnitService::new(
        conn,
        UnitAttributeRegistry::with_builtin_handlers(),
        GrantTable::new(),
    )
    .unwrap()
}

fn create_with(service: &UnitService<'_>, id_parent: i32, label: &str, params: &RequestParams) -> Unit {
    let mut unit = Unit::new(id_parent, label, format!("{label} unit"));
    service.create_unit(&mut unit, params).unwrap();
    unit
}

fn sector_params(ids: &[&str]) -> RequestParams {
    ids.iter()
        .fold(RequestParams::new(), |params, id| params.with(SECTORS, *id))
}

fn count(conn: &Connection, sql: &str, id_unit: UnitId) -> i64 {
    conn.query_row(sql, [id_unit], |row| row.get(0)).unwrap()
}

/// Runs after the sector handler (types are visited in order) and always fails.
struct FailingCleanup;

impl UnitAttributeHandler for FailingCleanup {
    fn attribute_type(&self) -> &'static str {
        "zz_failing"
    }

    fn populate(&self, _conn: &Connection, _unit: &mut Unit) -> AttributeResult<()> {
        Ok(())
    }

    fn on_remove(&self, _conn: &Connection, id_unit: UnitId) -> AttributeResult<()> {
        Err(AttributeError::Rejected {
            attribute_type: "zz_failing",
            message: format!("cleanup of unit {id_unit} failed"),
        })
    }
}

#[test]
fn sectors_are_stored_populated_and_searchable() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let desk = create_with(&service, ID_ROOT, "Desk", &sector_params(&["30", "10", "10", " "]));

    let loaded = service.get_unit(desk.id_unit, true).unwrap().unwrap();
    assert_eq!(
        loaded.attributes.get(SectorAttributeHandler::ATTRIBUTE_TYPE),
        Some(&AttributeValue::Ids(vec![10, 30]))
    );
    assert!(service
        .get_unit(desk.id_unit, false)
        .unwrap()
        .unwrap()
        .attributes
        .is_empty());

    let found = service.find_by_sector_id(30).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id_unit, desk.id_unit);
    assert!(service.find_by_sector_id(99).unwrap().is_empty());
}

#[test]
fn non_numeric_sector_rolls_back_the_created_unit() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut unit = Unit::new(ID_ROOT, "Desk", "Desk unit");
    let err = service
        .create_unit(&mut unit, &sector_params(&["ten"]))
        .unwrap_err();
    assert!(err.is_validation());
    assert!(service.get_units_first_level(false).unwrap().is_empty());
}

#[test]
fn sector_owner_cannot_receive_sub_units() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let desk = create_with(&service, ID_ROOT, "Desk", &sector_params(&["7"]));
    let mut other = create_with(&service, ID_ROOT, "Other", &RequestParams::new());

    assert!(!service.can_create_sub_unit(desk.id_unit).unwrap());
    assert!(service.can_create_sub_unit(other.id_unit).unwrap());

    let mut child = Unit::new(desk.id_unit, "Child", "Child unit");
    let err = service
        .create_unit(&mut child, &RequestParams::new())
        .unwrap_err();
    assert!(matches!(err, UnitServiceError::SubUnitsNotAllowed(id) if id == desk.id_unit));

    let err = service.move_sub_tree(&mut other, &desk).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(other.id_parent, ID_ROOT);
    assert_eq!(
        service.get_unit(other.id_unit, false).unwrap().unwrap().id_parent,
        ID_ROOT
    );
}

#[test]
fn unit_with_children_cannot_be_given_sectors() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let parent = create_with(&service, ID_ROOT, "Parent", &RequestParams::new());
    create_with(&service, parent.id_unit, "Child", &RequestParams::new());

    let mut renamed = parent.clone();
    renamed.label = "Renamed".to_string();
    let err = service
        .update_unit(&renamed, &sector_params(&["4"]))
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        service.get_unit(parent.id_unit, false).unwrap().unwrap().label,
        "Parent"
    );

    service.update_unit(&renamed, &RequestParams::new()).unwrap();
    assert_eq!(
        service.get_unit(parent.id_unit, false).unwrap().unwrap().label,
        "Renamed"
    );
}

#[test]
fn removal_cascades_sectors_and_assignments() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let unit_users = UnitUserService::new(&conn).unwrap();
    let desk = create_with(&service, ID_ROOT, "Desk", &sector_params(&["1", "2"]));
    unit_users.add_user_to_unit(desk.id_unit, 40).unwrap();

    assert!(service.remove_unit(desk.id_unit).unwrap());
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM unit_sectors WHERE id_unit = ?1;", desk.id_unit),
        0
    );
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM unit_users WHERE id_unit = ?1;", desk.id_unit),
        0
    );
}

#[test]
fn failing_cleanup_hook_leaves_unit_users_and_sectors_intact() {
    let conn = open_db_in_memory().unwrap();
    let mut registry = UnitAttributeRegistry::with_builtin_handlers();
    registry.register(FailingCleanup).unwrap();
    let service = UnitService::new(&conn, registry, GrantTable::new()).unwrap();
    let unit_users = UnitUserService::new(&conn).unwrap();
    let desk = create_with(&service, ID_ROOT, "Desk", &sector_params(&["1", "2"]));
    unit_users.add_user_to_unit(desk.id_unit, 40).unwrap();

    let err = service.remove_unit(desk.id_unit).unwrap_err();
    assert!(matches!(err, UnitServiceError::Attribute(_)));

    assert!(service.get_unit(desk.id_unit, false).unwrap().is_some());
    assert_eq!(unit_users.get_unit_of_user(40).unwrap(), Some(desk.id_unit));
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM unit_sectors WHERE id_unit = ?1;", desk.id_unit),
        2
    );
}
