use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use logical_deletion::{Conditions, ExclusionPredicate, FindOptions, ModelDef, Registry, Session};
use rusqlite::types::Value;
use rusqlite::Connection;

fn populated(rows: i64) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "
        create table staff (id integer primary key, name text, _deleted boolean);
        create table contacts (id integer primary key, name text, staff_id integer, _deleted boolean);
        ",
    )
    .unwrap();
    conn.execute("insert into staff (name, _deleted) values ('Ann', 0)", []).unwrap();
    conn.execute("insert into staff (name, _deleted) values ('Bob', 1)", []).unwrap();
    let tx = conn.unchecked_transaction().unwrap();
    for i in 0..rows {
        tx.execute(
            "insert into contacts (name, staff_id, _deleted) values (?, ?, ?)",
            (format!("contact {i}"), i % 2 + 1, i % 3 == 0),
        )
        .unwrap();
    }
    tx.commit().unwrap();
    conn
}

fn registry(conn: &Connection) -> Registry {
    let mut registry = Registry::new();
    registry.register(conn, ModelDef::new("Staff", "staff")).unwrap();
    registry
        .register(conn, ModelDef::new("Contact", "contacts").belongs_to("staff", "Staff", "staff_id"))
        .unwrap();
    registry
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("exclusion predicate", |b| {
        b.iter(|| ExclusionPredicate::new(black_box("contacts_1")).to_sql())
    });
    let conditions = Conditions::eq("staff_id", 1)
        .and(Conditions::eq("name", Value::Text("x".into())))
        .and(Conditions::not_deleted());
    c.bench_function("render conditions", |b| b.iter(|| black_box(&conditions).to_sql("contacts")));

    let conn = populated(10_000);
    let registry = registry(&conn);
    let session = Session::new(&conn, &registry);
    c.bench_function("count 10k", |b| {
        b.iter(|| session.count("Contact", FindOptions::new()).unwrap())
    });
    c.bench_function("count 10k with deleted", |b| {
        b.iter(|| session.count("Contact", FindOptions::new().include_deleted()).unwrap())
    });
    c.bench_function("count 10k joined", |b| {
        b.iter(|| session.count("Contact", FindOptions::new().joins("staff")).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
