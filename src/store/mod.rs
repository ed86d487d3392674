//! Persistence: data model, repository traits, migrations, and the
//! libSQL backend.

pub mod libsql;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql::LibSqlBackend;
pub use traits::{ConfigStore, MemberStore, MessageLog, OrderStore};
