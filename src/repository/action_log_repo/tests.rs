use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::initialize_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new(ActionType::DispatchFinalize, "user1")
        .with_entity("Dispatch", 7)
        .with_payload(json!({"lines": 2}))
        .with_detail("DES-20260101-0001");
    let id = repo.insert(&log).unwrap();

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.action_type, ActionType::DispatchFinalize);
    assert_eq!(found.entity_id.as_deref(), Some("7"));
    assert_eq!(found.payload_json, Some(json!({"lines": 2})));
}

#[test]
fn test_find_by_entity_and_type() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&ActionLog::new(ActionType::TriageProcess, "u1").with_entity("Lot", 3))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::LotDiscard, "u1").with_entity("Lot", 3))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::LotDiscard, "u2").with_entity("Lot", 4))
        .unwrap();

    assert_eq!(repo.find_by_entity("Lot", "3").unwrap().len(), 2);
    assert_eq!(repo.find_by_type(ActionType::LotDiscard).unwrap().len(), 2);
    assert_eq!(repo.find_recent(1).unwrap().len(), 1);
}

#[test]
fn test_find_missing_returns_none() {
    let repo = ActionLogRepository::new(setup_test_db());
    assert!(repo.find_by_id("nope").unwrap().is_none());
}
