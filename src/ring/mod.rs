#![warn(missing_docs)]
//! Identifier-ring geometry: ids, arcs, and the per-node membership
//! view that replica placement is derived from. Placement follows the
//! numerically-closest rule of Pastry-style overlays, ref: <https://www.cs.rice.edu/~druschel/publications/Pastry.pdf>

pub mod id;
pub mod neighbors;
pub mod range;

pub use id::Id;
pub use id::RingOrder;
pub use neighbors::NeighborView;
pub use range::IdRange;
pub use range::IdSet;
