//! Marker traits separating write and read requests
//!
//! Commands change state, queries only read it. Both are dispatched through the
//! same mediator; the markers let layers treat the two kinds differently.

/// A request that modifies state
pub trait Command {}

/// A request that only reads state
pub trait Query {}
