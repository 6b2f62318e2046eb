mod common;

use std::sync::Arc;

use common::{database, registry, text};
use logical_deletion::{AuditAction, DeletionError, Session, TableAudit};

#[test]
fn table_audit_records_events() {
    let conn = database();
    let registry = registry(&conn);
    let audit = TableAudit::new("delete_audits").unwrap();
    audit.install(&conn).unwrap();
    let session = Session::new(&conn, &registry)
        .with_audit(Arc::new(audit.clone()))
        .with_actor("auditor");

    let mut contact = session.create("Contact", [("name", text("Pia"))]).unwrap();
    let id = contact.id();
    session.delete(&mut contact).unwrap();
    session.undelete(&mut contact).unwrap();
    session.destroy_permanently(&mut contact).unwrap();

    let events = audit.events(&conn).unwrap();
    let actions: Vec<AuditAction> = events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::LogicalDelete, AuditAction::Undelete, AuditAction::PhysicalDelete]
    );
    assert!(events.iter().all(|e| e.record_id == id && e.actor == "auditor" && e.model == "Contact"));

    let snapshot: String = conn
        .query_row("select Snapshot from delete_audits order by Audit_Identity limit 1", [], |r| r.get(0))
        .unwrap();
    let snapshot: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(snapshot["name"], "Pia");
    assert_eq!(snapshot["_deleted"], 1);
}

#[test]
fn missing_audit_table_does_not_fail_deletes() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry).with_audit(Arc::new(TableAudit::new("nowhere").unwrap()));
    let mut contact = session.create("Contact", [("name", text("Quinn"))]).unwrap();
    session.delete(&mut contact).unwrap();
    assert!(contact.is_deleted());
}

#[test]
fn audit_table_name_is_checked() {
    let err = TableAudit::new("drop table; --").unwrap_err();
    assert!(matches!(err, DeletionError::InvalidIdentifier(_)));
}

#[test]
fn audit_actions_parse() {
    for action in [AuditAction::LogicalDelete, AuditAction::PhysicalDelete, AuditAction::Undelete] {
        assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        assert_eq!(action.to_string(), action.as_str());
    }
    assert!("purge".parse::<AuditAction>().is_err());
    assert_eq!(AuditAction::deletion(true), AuditAction::PhysicalDelete);
    assert_eq!(AuditAction::deletion(false), AuditAction::LogicalDelete);
}
