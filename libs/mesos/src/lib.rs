//! # armada-mesos
//!
//! The resource-manager wire model and resource ledger.
//!
//! This crate holds the types armada exchanges with the two-level cluster
//! resource manager: offers and their resource fragments on the way in, and
//! launch / reservation operations on the way out. Everything here is a plain
//! value type that round-trips unchanged through serde.
//!
//! - [`Resource`] fragments carry a role, an optional dynamic reservation,
//!   a scalar or range value, and optional disk provenance.
//! - [`Offer`] bundles an agent's resources together with its attributes.
//! - [`TaskInfo`], [`ExecutorInfo`], and [`TaskGroupInfo`] are the launch
//!   payloads; [`Operation`] is the accept-time envelope around them.

mod launch;
mod offer;
mod resources;

pub use launch::*;
pub use offer::*;
pub use resources::*;
