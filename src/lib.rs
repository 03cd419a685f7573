//! A compact in-memory triple store.
//!
//! Nodes are interned into dense integer indices by an [`EntityDictionary`],
//! and triples of indices are stored as cells of a sparse [`BitCube`] that
//! supports exact lookup and wildcard matching on any combination of axes.
//! [`TripleStore`] ties the two together.

pub mod cache;
pub mod config;
pub mod dictionary;
pub mod encoding;
pub mod error;
pub mod graph;
pub mod hasher;
pub mod index;
pub mod sparse;

pub use config::StoreConfig;
pub use dictionary::EntityDictionary;
pub use encoding::{Literal, Node, NodeRecord};
pub use error::{Error, Result};
pub use graph::{Triple, TripleStore};
pub use hasher::Hasher;
pub use index::{BitCube, BitMatrix, Idx2, Idx3, WILD};
pub use sparse::{SparseBitSet, SparsePagedMap};
