use rusqlite::Connection;
use std::cell::RefCell;
use std::rc::Rc;
use unittree_core::db::open_db_in_memory;
use unittree_core::{
    AdminUser, GrantTable, PermissionEngine, RequestParams, Unit, UnitAttributeRegistry,
    UnitId, UnitPermission, UnitService, UnitUserService, ID_ROOT,
};

type Calls = Rc<RefCell<Vec<(UnitId, String)>>>;

/// Engine answering `grant` to everything and recording each question.
fn recording_engine(calls: Calls, grant: bool) -> impl PermissionEngine {
    move |resource: &Unit, permission: &str, _user: &AdminUser| {
        calls
            .borrow_mut()
            .push((resource.id_unit, permission.to_string()));
        grant
    }
}

fn create(service: &UnitService<'_>, id_parent: i32, label: &str) -> Unit {
    let mut unit = Unit::new(id_parent, label, format!("{label} unit"));
    service.create_unit(&mut unit, &RequestParams::new()).unwrap();
    unit
}

/// Root -> Finance -> Payroll, plus Root -> Sales.
fn finance_tree(
    conn: &Connection,
    engine: impl PermissionEngine + 'static,
) -> (UnitService<'_>, Unit, Unit, Unit) {
    let service = UnitService::new(conn, UnitAttributeRegistry::new(), engine).unwrap();
    let finance = create(&service, ID_ROOT, "Finance");
    let payroll = create(&service, finance.id_unit, "Payroll");
    let sales = create(&service, ID_ROOT, "Sales");
    (service, finance, payroll, sales)
}

#[test]
fn administrators_pass_regardless_of_arguments() {
    let conn = open_db_in_memory().unwrap();
    let calls = Calls::default();
    let (service, _, payroll, _) = finance_tree(&conn, recording_engine(calls.clone(), false));
    let admin = AdminUser::admin(1, "admin");

    assert!(service.is_authorized(Some(&payroll), "EDIT", &admin).unwrap());
    assert!(service.is_authorized(None, "ANYTHING", &admin).unwrap());
    assert!(calls.borrow().is_empty());
}

#[test]
fn ancestor_unit_of_user_is_the_resource_the_engine_sees() {
    let conn = open_db_in_memory().unwrap();
    let calls = Calls::default();
    let (service, finance, payroll, _) = finance_tree(&conn, recording_engine(calls.clone(), true));
    UnitUserService::new(&conn)
        .unwrap()
        .add_user_to_unit(finance.id_unit, 5)
        .unwrap();
    let user = AdminUser::new(5, "jdoe");

    assert!(service.is_authorized(Some(&payroll), "EDIT", &user).unwrap());
    assert_eq!(
        calls.borrow().as_slice(),
        &[(finance.id_unit, "EDIT".to_string())]
    );
}

#[test]
fn own_unit_is_asked_about_directly() {
    let conn = open_db_in_memory().unwrap();
    let calls = Calls::default();
    let (service, _, payroll, _) = finance_tree(&conn, recording_engine(calls.clone(), false));
    UnitUserService::new(&conn)
        .unwrap()
        .add_user_to_unit(payroll.id_unit, 5)
        .unwrap();
    let user = AdminUser::new(5, "jdoe");

    assert!(!service.is_authorized(Some(&payroll), "MODIFY", &user).unwrap());
    assert_eq!(
        calls.borrow().as_slice(),
        &[(payroll.id_unit, "MODIFY".to_string())]
    );
}

#[test]
fn unrelated_and_descendant_units_are_never_consulted() {
    let conn = open_db_in_memory().unwrap();
    let calls = Calls::default();
    let (service, finance, payroll, sales) =
        finance_tree(&conn, recording_engine(calls.clone(), true));
    UnitUserService::new(&conn)
        .unwrap()
        .add_user_to_unit(payroll.id_unit, 5)
        .unwrap();
    let user = AdminUser::new(5, "jdoe");

    assert!(!service.is_authorized(Some(&sales), "VIEW", &user).unwrap());
    assert!(!service.is_authorized(Some(&finance), "VIEW", &user).unwrap());
    assert!(!service.is_authorized(None, "VIEW", &user).unwrap());
    assert!(calls.borrow().is_empty());
}

#[test]
fn grant_table_drives_delegation_through_ancestors() {
    let conn = open_db_in_memory().unwrap();
    let mut grants = GrantTable::new();
    // Ids are deterministic on a fresh database: Finance=1, Payroll=2.
    grants.grant(5, 1, UnitPermission::Modify.as_str());
    let (service, finance, payroll, _) = finance_tree(&conn, grants);
    assert_eq!((finance.id_unit, payroll.id_unit), (1, 2));
    UnitUserService::new(&conn)
        .unwrap()
        .add_user_to_unit(finance.id_unit, 5)
        .unwrap();
    let user = AdminUser::new(5, "jdoe");

    assert!(service
        .is_authorized(Some(&payroll), UnitPermission::Modify.as_str(), &user)
        .unwrap());
    assert!(!service
        .is_authorized(Some(&payroll), UnitPermission::Delete.as_str(), &user)
        .unwrap());
}

#[test]
fn string_ids_must_be_numeric() {
    let conn = open_db_in_memory().unwrap();
    let (service, finance, _, _) = finance_tree(&conn, GrantTable::new());
    let admin = AdminUser::admin(1, "admin");

    assert!(service
        .is_authorized_by_id(&finance.id_unit.to_string(), "VIEW", &admin)
        .unwrap());
    for raw in ["", " ", "-1", "abc", "1.5"] {
        assert!(!service.is_authorized_by_id(raw, "VIEW", &admin).unwrap());
    }
}
