//! Logical deletion – transparent soft delete for records kept in SQLite.
//!
//! A table takes part when it has a `_deleted` column. For such a model:
//! * Reads and aggregates made through a [`session::Session`] leave out rows
//!   whose flag is set, unless the caller asks for them.
//! * [`session::Session::delete`] and [`session::Session::delete_all`] set the
//!   flag instead of removing rows. The `*_permanently` variants still remove them.
//! * Joins on associations leave out deleted rows of the model at the far end.
//!
//! Tables without the column behave exactly as if none of this existed.
//!
//! ## Modules
//! * [`predicate`] – The exclusion predicate and the [`predicate::Conditions`] it is merged into.
//! * [`schema`] / [`model`] – Table introspection, model definitions and the [`model::Registry`].
//! * [`record`] – Loaded and new rows, including the tombstoned state.
//! * [`scope`] – `with_deleted`, `without_deleted` and `with_scope`.
//! * [`query`] – Finders and aggregates.
//! * [`join`] – Association joins, augmented with the exclusion predicate.
//! * [`mutation`] – Saving, deleting and undeleting.
//! * [`audit`] – Where deletion events go.
//! * [`settings`] – Layered configuration and log setup.
//!
//! ## Quick Start
//! ```
//! use rusqlite::Connection;
//! use logical_deletion::{FindOptions, ModelDef, Registry, Session};
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch(
//!     "create table contacts (id integer primary key, name text, _deleted boolean);",
//! )
//! .unwrap();
//! let mut registry = Registry::new();
//! registry.register(&conn, ModelDef::new("Contact", "contacts")).unwrap();
//! let session = Session::new(&conn, &registry);
//! let mut alice = session
//!     .create("Contact", [("name", "Alice".to_string())])
//!     .unwrap();
//! session.delete(&mut alice).unwrap();
//! assert_eq!(session.count("Contact", FindOptions::new()).unwrap(), 0);
//! let all = session.with_deleted("Contact", || session.count("Contact", FindOptions::new()));
//! assert_eq!(all.unwrap(), 1);
//! ```
//!
//! ## Sessions
//! Scope state belongs to the session that entered it. Two sessions over the
//! same registry never see each other's `with_deleted`, even on one thread.

pub mod audit;
pub mod error;
pub mod join;
pub mod model;
pub mod mutation;
pub mod predicate;
pub mod query;
pub mod record;
pub mod schema;
pub mod scope;
pub mod session;
pub mod settings;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAudit, TableAudit, TracingAudit};
pub use error::{DeletionError, Result};
pub use model::{Association, AssociationKind, Lifecycle, Model, ModelDef, Registry};
pub use predicate::{Conditions, ExclusionPredicate, DELETED_COLUMN};
pub use query::{Aggregate, FindOptions};
pub use record::{Record, RecordState};
pub use session::Session;
pub use settings::Settings;
