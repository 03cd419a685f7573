//! Interning of nodes into dense integer indices.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::{Mutex, RwLock};

use crate::cache::Cache;
use crate::config::StoreConfig;
use crate::encoding::{Node, NodeRecord};
use crate::error::{Error, Result};
use crate::index::WILD;

struct DictionaryState {
    /// Records addressed by their index.
    records: Vec<NodeRecord>,
    /// Canonical key (uncompressed type tag + payload) to index.
    by_content: HashMap<Vec<u8>, i32>,
}

impl DictionaryState {
    fn find(&self, key: &[u8]) -> Option<i32> {
        self.by_content.get(key).copied()
    }

    fn check_cardinality(&self) -> Result<()> {
        if self.records.len() != self.by_content.len() {
            return Err(Error::InvalidState(format!(
                "dictionary holds {} records but {} content keys",
                self.records.len(),
                self.by_content.len()
            )));
        }
        Ok(())
    }
}

/// Maps nodes to dense, first-seen-order indices and back.
///
/// Indices start at 0 and are never reused or reassigned. The dictionary only
/// grows. [`Node::Any`] is never stored and always maps to [`WILD`].
pub struct EntityDictionary {
    config: StoreConfig,
    state: RwLock<DictionaryState>,
    /// Decoded nodes by index. Never authoritative.
    cache: Mutex<Cache<i32, Node>>,
    closed: AtomicBool,
}

impl EntityDictionary {
    pub fn new(config: StoreConfig) -> Self {
        let cache = Cache::new(config.decode_cache_size);
        EntityDictionary {
            config,
            state: RwLock::new(DictionaryState {
                records: Vec::new(),
                by_content: HashMap::new(),
            }),
            cache: Mutex::new(cache),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the index of `node`, assigning the next index on first sight.
    pub fn resolve(&self, node: &Node) -> Result<i32> {
        self.ensure_open()?;
        if node.is_any() {
            return Ok(WILD);
        }

        let key = NodeRecord::node_key(node)?;
        if let Some(index) = self.state.read().find(&key) {
            return Ok(index);
        }

        let mut record = NodeRecord::encode(node, WILD, self.config.compression_threshold)?;
        let mut state = self.state.write();
        // Another writer may have interned it between the two locks.
        if let Some(index) = state.find(&key) {
            return Ok(index);
        }

        let index = i32::try_from(state.records.len())
            .map_err(|_| Error::InvalidState("dictionary is full".to_string()))?;
        record.set_index(index)?;
        state.by_content.insert(key, index);
        state.records.push(record);
        state.check_cardinality()?;

        tracing::debug!(index, node = %node, "interned node");
        Ok(index)
    }

    /// Returns the index of `node` without interning it.
    pub fn index_of(&self, node: &Node) -> Result<Option<i32>> {
        self.ensure_open()?;
        if node.is_any() {
            return Ok(Some(WILD));
        }
        let key = NodeRecord::node_key(node)?;
        Ok(self.state.read().find(&key))
    }

    /// Returns the node stored at `index`. [`WILD`] yields [`Node::Any`].
    pub fn lookup(&self, index: i32) -> Result<Node> {
        self.ensure_open()?;
        if index == WILD {
            return Ok(Node::Any);
        }
        if let Some(node) = self.cache.lock().get(&index) {
            return Ok(node.clone());
        }

        let node = self.record(index)?.decode()?;
        self.cache.lock().insert(index, node.clone());
        Ok(node)
    }

    /// Returns a copy of the record stored at `index`.
    pub fn record(&self, index: i32) -> Result<NodeRecord> {
        self.ensure_open()?;
        let state = self.state.read();
        usize::try_from(index)
            .ok()
            .and_then(|i| state.records.get(i))
            .cloned()
            .ok_or(Error::IndexNotFound(index))
    }

    /// Number of interned nodes.
    pub fn count(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Returns `(hits, misses)` of the decoded node cache.
    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.lock().stats()
    }

    /// Releases the decoded node cache. Every later call except [`count`]
    /// fails with [`Error::InvalidState`].
    ///
    /// [`count`]: EntityDictionary::count
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.cache.lock().clear();
            tracing::info!(count = self.count(), "dictionary closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes `[count:u32]` followed by `[len:u32][record]` per record, in
    /// index order.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        self.ensure_open()?;
        let state = self.state.read();

        let count = u32::try_from(state.records.len())
            .map_err(|_| Error::InvalidState("too many records to write".to_string()))?;
        writer
            .write_u32::<BigEndian>(count)
            .map_err(|e| Error::Encode("count", e))?;

        for record in &state.records {
            let bytes = record.as_bytes();
            let len = u32::try_from(bytes.len()).map_err(|_| {
                Error::InvalidState(format!(
                    "record {} of {} bytes is too long to write",
                    record.index(),
                    bytes.len()
                ))
            })?;
            writer
                .write_u32::<BigEndian>(len)
                .map_err(|e| Error::Encode("record_len", e))?;
            writer
                .write_all(bytes)
                .map_err(|e| Error::Encode("record", e))?;
        }
        writer.flush()?;

        tracing::debug!(count, "dictionary written");
        Ok(())
    }

    /// Reads a dictionary written by [`write_to`](EntityDictionary::write_to).
    ///
    /// Records may appear in any order but their indices must cover
    /// `0..count` exactly once, and no two records may hold the same node.
    /// Records keep the compression they were written with, whatever the
    /// threshold in `config`.
    pub fn read_from<R: Read>(mut reader: R, config: StoreConfig) -> Result<Self> {
        let count = reader
            .read_u32::<BigEndian>()
            .map_err(|e| Error::Decode("count", e))?;

        let mut records = Vec::new();
        for _ in 0..count {
            let len = reader
                .read_u32::<BigEndian>()
                .map_err(|e| Error::Decode("record_len", e))?;
            let mut bytes = Vec::new();
            let read = (&mut reader)
                .take(u64::from(len))
                .read_to_end(&mut bytes)
                .map_err(|e| Error::Decode("record", e))?;
            if read != len as usize {
                return Err(Error::InvalidRecord(format!(
                    "record of {} bytes truncated to {}",
                    len, read
                )));
            }
            records.push(NodeRecord::from_bytes(bytes)?);
        }

        records.sort_by_key(NodeRecord::index);
        let mut by_content = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if record.index() as i64 != position as i64 {
                return Err(Error::InvalidRecord(format!(
                    "expected index {} but found {}",
                    position,
                    record.index()
                )));
            }
            if by_content
                .insert(record.canonical_key()?, record.index())
                .is_some()
            {
                return Err(Error::InvalidRecord(format!(
                    "duplicate content at index {}",
                    record.index()
                )));
            }
        }

        let dictionary = EntityDictionary::new(config);
        {
            let mut state = dictionary.state.write();
            state.records = records;
            state.by_content = by_content;
            state.check_cardinality()?;
        }
        tracing::debug!(count, "dictionary loaded");
        Ok(dictionary)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState("dictionary is closed".to_string()));
        }
        Ok(())
    }
}

impl Default for EntityDictionary {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for EntityDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDictionary")
            .field("count", &self.count())
            .field("cached", &self.cache.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
