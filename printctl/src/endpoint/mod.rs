//! Endpoint descriptor compiler.
//!
//! The device's API is described as a tree of nodes, each contributing a path
//! segment and optionally declaring leaf endpoints grouped by category:
//!
//! ```text
//! {"path": "/api/v1", "items": [
//!     {"path": "/printer/bed", "endpoints": [
//!         {"category": "bed", "label": "tgt_temp", "path": "/temperature/target", "inputlim": [0, 115]}
//!     ]}
//! ]}
//! ```
//!
//! [`compile`] flattens such a tree into a [`RoutingTable`] and a
//! [`LimitsTable`], both addressed by `(category, label)`.

mod compiler;
mod descriptor;
mod limits;

pub use compiler::{
    compile, compile_model, join_path, CategoryLimits, CategoryRoutes, EndpointTables,
    LimitsTable, RoutingTable,
};
pub use descriptor::{Descriptor, EndpointLeaf, EndpointNode, BUNDLED_DESCRIPTOR};
pub use limits::LimitSpec;
