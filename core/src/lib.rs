//! Decision logic for incident dispatch: who may change what, which fields of
//! a patch survive, how an assignment moves through its lifecycle, and how a
//! map bounding box is normalized. No I/O lives here.

pub mod wire;

pub mod actor;
pub mod agents;
pub mod assignments;
pub mod error;
pub mod geo;
pub mod incidents;
pub mod lifecycle;
pub mod mask;
pub mod pagination;
pub mod policy;
pub mod users;
