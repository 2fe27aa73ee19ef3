//! # armada-id
//!
//! Stable ID types, parsing, and validation for the armada orchestrator.
//!
//! ## Design Principles
//!
//! - IDs are stable and system-generated; names are user-controlled labels
//! - All IDs have a canonical string representation with strict parsing
//! - IDs support roundtrip serialization (parse → format → parse)
//! - IDs are typed to prevent mixing different resource types
//!
//! ## ID Formats
//!
//! Run specs are identified by an absolute hierarchical path:
//!
//! - `/prod/db/postgres`
//!
//! Instance and task IDs embed the owning run spec (path separators become
//! underscores) plus a ULID, so an ID alone identifies its run spec:
//!
//! - `prod_db_postgres.instance-01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `prod_db_postgres.instance-01HV4Z2WQXKJNM8GPQY6VBKC3D.worker` (pod task)
//!
//! Persistent volume IDs embed the run spec and the container path:
//!
//! - `prod_db_postgres#data#01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! The ULID portion provides sortability (time-ordered) and uniqueness.
//! Identities owned by the resource manager (offers, agents, frameworks) are
//! opaque strings and carried verbatim.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
