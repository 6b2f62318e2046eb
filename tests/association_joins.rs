mod common;

use common::{database, registry, six_contacts, text};
use logical_deletion::join::{JoinAssociation, JoinKind};
use logical_deletion::{DeletionError, FindOptions, Session};
use rusqlite::types::Value;

#[test]
fn join_sql_depends_on_far_end() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let note = registry.model("Note").unwrap();
    let contact = registry.model("Contact").unwrap();

    let mut counter = 0;
    let to_contact =
        JoinAssociation::new(&registry, &note, "contact", JoinKind::Inner, &mut counter).unwrap();
    assert_eq!(to_contact.alias(), "contacts_1");
    assert_eq!(
        to_contact.association_join(),
        "inner join \"contacts\" as \"contacts_1\" on \"contacts_1\".\"id\" = \"notes\".\"contact_id\" \
         and (\"contacts_1\".\"_deleted\" IS NULL OR \"contacts_1\".\"_deleted\" = 0)"
    );

    let to_notes =
        JoinAssociation::new(&registry, &contact, "notes", JoinKind::Inner, &mut counter).unwrap();
    assert_eq!(to_notes.alias(), "notes_2");
    assert!(!to_notes.association_join().contains("_deleted"));

    // showing deleted contacts does not reach joins made from other models
    let suppressed = session.with_deleted("Contact", || {
        JoinAssociation::new(&registry, &note, "contact", JoinKind::Inner, &mut counter)
            .unwrap()
            .association_join()
    });
    assert!(suppressed.contains("(\"contacts_3\".\"_deleted\" IS NULL OR \"contacts_3\".\"_deleted\" = 0)"));
}

#[test]
fn plain_model_joined_to_capable_model() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let scenario = six_contacts(&session);
    for counter in [1, 2, 3] {
        session
            .create("Note", [("body", text("note")), ("contact_id", Value::Integer(scenario.contact(counter)))])
            .unwrap();
    }

    // the note on deleted contact 2 drops out
    let notes = session.find_all("Note", FindOptions::new().joins("contact")).unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(session.count("Note", FindOptions::new().joins("contact")).unwrap(), 2);
    assert_eq!(session.count("Note", FindOptions::new()).unwrap(), 3);
    let joined = session
        .with_deleted("Contact", || session.count("Note", FindOptions::new().joins("contact")))
        .unwrap();
    assert_eq!(joined, 2);
}

#[test]
fn capable_model_joined_to_plain_model() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let scenario = six_contacts(&session);
    for counter in [1, 1, 2, 3] {
        session
            .create("Note", [("body", text("note")), ("contact_id", Value::Integer(scenario.contact(counter)))])
            .unwrap();
    }

    // contacts 1 and 3 have notes; contact 2 is still excluded as the base model
    let contacts = session.find_all("Contact", FindOptions::new().joins("notes")).unwrap();
    assert_eq!(contacts.len(), 2);
    assert_eq!(session.count("Contact", FindOptions::new().joins("notes")).unwrap(), 2);
    let contacts = session
        .find_all("Contact", FindOptions::new().joins("notes").include_deleted())
        .unwrap();
    assert_eq!(contacts.len(), 3);
}

#[test]
fn belongs_to_deleted_staff() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let scenario = six_contacts(&session);
    let mut ann = session.find("Staff", scenario.staff[0]).unwrap();
    session.delete(&mut ann).unwrap();

    // only contacts of the second staff member keep a live partner
    let contacts = session
        .find_all("Contact", FindOptions::new().joins("staff").order("\"contacts\".\"id\""))
        .unwrap();
    let ids: Vec<i64> = contacts.iter().filter_map(|c| c.id()).collect();
    assert_eq!(ids, vec![scenario.contact(1), scenario.contact(3), scenario.contact(5)]);

    let contact = session.find("Contact", scenario.contact(6)).unwrap();
    assert!(session.associated(&contact, "staff", FindOptions::new()).unwrap().is_empty());
    let staff = session
        .with_deleted("Staff", || session.associated(&contact, "staff", FindOptions::new()))
        .unwrap();
    assert_eq!(staff.len(), 1);
}

#[test]
fn eager_loading_deleted_staff() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let scenario = six_contacts(&session);
    let mut ann = session.find("Staff", scenario.staff[0]).unwrap();
    session.delete(&mut ann).unwrap();

    let contacts = session
        .find_all("Contact", FindOptions::new().includes("staff").order("\"contacts\".\"id\""))
        .unwrap();
    assert_eq!(contacts.len(), 4);
    for contact in &contacts {
        let staff = contact.included("staff");
        if contact.get_i64("staff_id") == Some(scenario.staff[0]) {
            assert!(staff.is_empty());
        } else {
            assert_eq!(staff.len(), 1);
            assert_eq!(staff[0].get_text("name"), Some("Bob"));
        }
    }

    let contacts = session
        .with_deleted("Staff", || session.find_all("Contact", FindOptions::new().includes("staff")))
        .unwrap();
    assert_eq!(contacts.len(), 4);
    assert_eq!(contacts.iter().filter(|c| c.included("staff").is_empty()).count(), 1);
}

#[test]
fn eager_loading_has_many() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let scenario = six_contacts(&session);

    let staff = session
        .find_all("Staff", FindOptions::new().includes("contacts").order("\"staff\".\"id\""))
        .unwrap();
    assert_eq!(staff.len(), 2);
    // Ann keeps contact 6 only, Bob has 1, 3 and 5
    assert_eq!(staff[0].included("contacts").len(), 1);
    assert_eq!(staff[1].included("contacts").len(), 3);

    let ann = session.find("Staff", scenario.staff[0]).unwrap();
    let contacts = session.associated(&ann, "contacts", FindOptions::new()).unwrap();
    assert_eq!(contacts.len(), 1);
    let contacts = session
        .associated(&ann, "contacts", FindOptions::new().include_deleted())
        .unwrap();
    assert_eq!(contacts.len(), 2);

    let limited = session
        .find_all("Staff", FindOptions::new().includes("contacts").limit(1))
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn through_association() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let scenario = six_contacts(&session);
    let mut tags = Vec::new();
    for label in ["vip", "lead", "cold"] {
        tags.push(session.create("Tag", [("label", text(label))]).unwrap());
    }
    let owner = scenario.contact(1);
    let mut taggings = Vec::new();
    for tag in &tags {
        taggings.push(
            session
                .create(
                    "Tagging",
                    [("contact_id", Value::Integer(owner)), ("tag_id", Value::Integer(tag.id().unwrap()))],
                )
                .unwrap(),
        );
    }
    let contact = session.find("Contact", owner).unwrap();
    assert_eq!(session.associated(&contact, "tags", FindOptions::new()).unwrap().len(), 3);

    // a deleted join row hides its tag, a deleted tag hides itself
    session.delete(&mut taggings[0]).unwrap();
    session.delete(&mut tags[1]).unwrap();
    let live = session.associated(&contact, "tags", FindOptions::new()).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].get_text("label"), Some("cold"));
    assert_eq!(session.count("Contact", FindOptions::new().joins("tags")).unwrap(), 1);

    // the join row filter holds whatever the scope; the tag read itself follows it
    let through_scoped = session
        .with_deleted("Tagging", || session.associated(&contact, "tags", FindOptions::new()))
        .unwrap();
    assert_eq!(through_scoped.len(), 1);
    let tags_visible = session
        .with_deleted("Tag", || session.associated(&contact, "tags", FindOptions::new()))
        .unwrap();
    let mut labels: Vec<&str> = tags_visible.iter().filter_map(|t| t.get_text("label")).collect();
    labels.sort();
    assert_eq!(labels, vec!["cold", "lead"]);
    let joined = session
        .with_deleted("Tagging", || session.count("Contact", FindOptions::new().joins("tags")))
        .unwrap();
    assert_eq!(joined, 1);
}

#[test]
fn unknown_association() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let err = session
        .find_all("Contact", FindOptions::new().joins("invoices"))
        .unwrap_err();
    assert!(matches!(err, DeletionError::UnknownAssociation { .. }));
}

#[test]
fn with_deleted_on_far_end_keeps_join_filter() {
    let conn = database();
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    let scenario = six_contacts(&session);
    let mut ann = session.find("Staff", scenario.staff[0]).unwrap();
    session.delete(&mut ann).unwrap();

    // contacts 1, 3 and 5 are the only live contacts with a live staff member
    let joined = session
        .with_deleted("Staff", || session.count("Contact", FindOptions::new().joins("staff")))
        .unwrap();
    assert_eq!(joined, 3);
    // the staff model's own reads do follow the scope
    let staff = session
        .with_deleted("Staff", || session.count("Staff", FindOptions::new()))
        .unwrap();
    assert_eq!(staff, 2);
}
