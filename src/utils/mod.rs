pub mod serde_arc;
pub mod serde_arc_vec;
