//! A set of node triples backed by a dictionary and a bit cube.

use std::fmt;
use std::iter::FusedIterator;

use crate::config::StoreConfig;
use crate::dictionary::EntityDictionary;
use crate::encoding::Node;
use crate::error::{Error, Result};
use crate::index::{BitCube, CubeFind, Idx3, WILD};

/// A subject, predicate, object statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Node,
    pub predicate: Node,
    pub object: Node,
}

impl Triple {
    pub fn new(subject: Node, predicate: Node, object: Node) -> Self {
        Triple {
            subject,
            predicate,
            object,
        }
    }

    fn is_concrete(&self) -> bool {
        !(self.subject.is_any() || self.predicate.is_any() || self.object.is_any())
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Stores triples as cube cells: subject on `x`, predicate on `y`, object
/// on `z`.
pub struct TripleStore {
    dictionary: EntityDictionary,
    cube: BitCube,
}

impl TripleStore {
    pub fn new(config: StoreConfig) -> Self {
        let cube = BitCube::with_page_size(config.page_size.max(1));
        TripleStore {
            dictionary: EntityDictionary::new(config),
            cube,
        }
    }

    /// Adds a triple. Returns `false` if it was already present.
    pub fn add(&self, triple: &Triple) -> Result<bool> {
        if !triple.is_concrete() {
            return Err(Error::InvalidArgument(format!(
                "cannot add wildcard triple {}",
                triple
            )));
        }
        let s = self.dictionary.resolve(&triple.subject)?;
        let p = self.dictionary.resolve(&triple.predicate)?;
        let o = self.dictionary.resolve(&triple.object)?;
        self.cube.insert(s, p, o)
    }

    /// Removes a triple. Returns `false` if it was not present. Unknown nodes
    /// are not interned.
    pub fn remove(&self, triple: &Triple) -> Result<bool> {
        match self.cell(triple)? {
            Some(Idx3 { x, y, z }) => self.cube.remove(x, y, z),
            None => Ok(false),
        }
    }

    pub fn contains(&self, triple: &Triple) -> Result<bool> {
        match self.cell(triple)? {
            Some(Idx3 { x, y, z }) => self.cube.has(x, y, z),
            None => Ok(false),
        }
    }

    /// Lazily matches a pattern. `None` or [`Node::Any`] matches every value
    /// on that position; a node that was never added matches nothing.
    pub fn find(
        &self,
        subject: Option<&Node>,
        predicate: Option<&Node>,
        object: Option<&Node>,
    ) -> Result<TripleFind<'_>> {
        let (Some(x), Some(y), Some(z)) = (
            self.pattern(subject)?,
            self.pattern(predicate)?,
            self.pattern(object)?,
        ) else {
            return Ok(TripleFind {
                dictionary: &self.dictionary,
                cells: None,
            });
        };

        Ok(TripleFind {
            dictionary: &self.dictionary,
            cells: Some(self.cube.find(x, y, z)?),
        })
    }

    /// Number of stored triples.
    pub fn len(&self) -> usize {
        usize::try_from(self.cube.size()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.cube.is_empty()
    }

    pub fn dictionary(&self) -> &EntityDictionary {
        &self.dictionary
    }

    pub fn cube(&self) -> &BitCube {
        &self.cube
    }

    /// Closes the dictionary. Later calls that touch it fail with
    /// [`Error::InvalidState`].
    pub fn close(&self) {
        self.dictionary.close();
    }

    fn pattern(&self, node: Option<&Node>) -> Result<Option<i32>> {
        match node {
            None | Some(Node::Any) => Ok(Some(WILD)),
            Some(node) => self.dictionary.index_of(node),
        }
    }

    fn cell(&self, triple: &Triple) -> Result<Option<Idx3>> {
        if !triple.is_concrete() {
            return Err(Error::InvalidArgument(format!(
                "triple {} is not concrete",
                triple
            )));
        }
        let index_of = |node: &Node| self.dictionary.index_of(node);
        Ok(
            match (
                index_of(&triple.subject)?,
                index_of(&triple.predicate)?,
                index_of(&triple.object)?,
            ) {
                (Some(x), Some(y), Some(z)) => Some(Idx3::new(x, y, z)),
                _ => None,
            },
        )
    }
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl fmt::Debug for TripleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripleStore")
            .field("dictionary", &self.dictionary)
            .field("cube", &self.cube)
            .finish()
    }
}

/// Lazy result of [`TripleStore::find`], decoding each matching cell.
pub struct TripleFind<'a> {
    dictionary: &'a EntityDictionary,
    cells: Option<CubeFind<'a>>,
}

impl Iterator for TripleFind<'_> {
    type Item = Result<Triple>;

    fn next(&mut self) -> Option<Result<Triple>> {
        let Idx3 { x, y, z } = self.cells.as_mut()?.next()?;
        let decode = || -> Result<Triple> {
            Ok(Triple::new(
                self.dictionary.lookup(x)?,
                self.dictionary.lookup(y)?,
                self.dictionary.lookup(z)?,
            ))
        };
        Some(decode())
    }
}

impl FusedIterator for TripleFind<'_> {}
