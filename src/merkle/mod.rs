//! SSZ merkleization: pair-wise SHA-256 tree reduction and the
//! hash-tree-root helpers built on top of it.

pub mod hasher;
pub mod merkleizer;

pub use hasher::{
    build_parent_tree_roots, build_parent_tree_roots_with_workers, mix_in_length,
    root_with_depth, root_with_max_leaves,
};
pub use merkleizer::{BasicValue, Merkleizer};
