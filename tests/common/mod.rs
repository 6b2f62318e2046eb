#![allow(dead_code)]

use logical_deletion::{ModelDef, Registry, Session};
use rusqlite::types::Value;
use rusqlite::Connection;

pub fn database() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "
        create table staff (
            id integer primary key,
            name text not null,
            _deleted boolean
        );
        create table contacts (
            id integer primary key,
            name text not null,
            age integer,
            staff_id integer,
            _deleted boolean
        );
        create table notes (
            id integer primary key,
            body text,
            contact_id integer
        );
        create table tags (
            id integer primary key,
            label text not null,
            _deleted boolean
        );
        create table taggings (
            id integer primary key,
            contact_id integer not null,
            tag_id integer not null,
            _deleted boolean
        );
        ",
    )
    .unwrap();
    conn
}

pub fn definitions() -> Vec<ModelDef> {
    vec![
        ModelDef::new("Staff", "staff").has_many("contacts", "Contact", "staff_id"),
        ModelDef::new("Contact", "contacts")
            .belongs_to("staff", "Staff", "staff_id")
            .has_many("notes", "Note", "contact_id")
            .has_many_through("tags", "Tag", "Tagging", "contact_id", "tag_id"),
        ModelDef::new("Note", "notes").belongs_to("contact", "Contact", "contact_id"),
        ModelDef::new("Tag", "tags"),
        ModelDef::new("Tagging", "taggings"),
    ]
}

pub fn registry(conn: &Connection) -> Registry {
    let mut registry = Registry::new();
    for def in definitions() {
        registry.register(conn, def).unwrap();
    }
    registry
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Two staff members and six contacts. Contact n belongs to staff
/// `n % 2 + 1`; contact 2 is logically deleted and contact 4 destroyed.
pub struct Scenario {
    pub staff: [i64; 2],
    pub contacts: Vec<i64>,
}

impl Scenario {
    pub fn staff_for(&self, counter: usize) -> i64 {
        self.staff[counter % 2]
    }
    pub fn contact(&self, counter: usize) -> i64 {
        self.contacts[counter - 1]
    }
}

pub fn six_contacts(session: &Session) -> Scenario {
    let staff = [
        session.create("Staff", [("name", text("Ann"))]).unwrap().id().unwrap(),
        session.create("Staff", [("name", text("Bob"))]).unwrap().id().unwrap(),
    ];
    let mut contacts = Vec::new();
    for counter in 1..=6usize {
        let contact = session
            .create(
                "Contact",
                [
                    ("name", text(&format!("contact {counter}"))),
                    ("age", Value::Integer(20 + counter as i64)),
                    ("staff_id", Value::Integer(staff[counter % 2])),
                ],
            )
            .unwrap();
        contacts.push(contact.id().unwrap());
    }
    let mut second = session.find("Contact", contacts[1]).unwrap();
    session.delete(&mut second).unwrap();
    let mut fourth = session.find("Contact", contacts[3]).unwrap();
    session.destroy_permanently(&mut fourth).unwrap();
    Scenario { staff, contacts }
}
