//! Path tree construction and traversal.

mod builder;
mod walk;

pub use self::builder::{TreeBuilder, build, from_listing};
pub use self::walk::{TreeStats, Walk, WalkEntry};
