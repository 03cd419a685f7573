use std::fmt;
use std::hash::{Hash, Hasher as _};
use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use super::format::{Formatter as _, Record};
use super::node::{Literal, Node, NodeType};
use super::EncodingError;
use crate::error::{Error, Result};
use crate::hasher::content_hash;
use crate::index::WILD;

/// index (4) + content hash (4) + type tag (1)
pub const HEADER_SIZE: usize = 9;

const INDEX_RANGE: std::ops::Range<usize> = 0..4;
const HASH_RANGE: std::ops::Range<usize> = 4..8;
const TYPE_OFFSET: usize = 8;

/// Length prefix of an absent literal field.
const ABSENT: i32 = -1;

/// The binary dictionary entry for one node.
///
/// ```text
/// offset 0: i32 index        (WILD until assigned)
/// offset 4: i32 content hash (CRC-32/ISCSI of type tag and payload)
/// offset 8: u8  type tag
/// offset 9: payload
/// ```
///
/// All integers are big-endian. Two records are equal when their type tag and
/// stored payload are equal; the index takes no part in equality. The same
/// literal stored compressed and uncompressed compares unequal, so
/// dictionaries match on [`canonical_key`](NodeRecord::canonical_key).
#[derive(Clone)]
pub struct NodeRecord {
    bytes: Vec<u8>,
    node_type: NodeType,
}

impl NodeRecord {
    /// Encodes a node. Literal payloads longer than `compression_threshold`
    /// bytes are gzip compressed.
    pub fn encode(node: &Node, index: i32, compression_threshold: usize) -> Result<Self> {
        let (node_type, payload) = match uncompressed(node)? {
            (NodeType::Literal, packed) if packed.len() > compression_threshold => {
                (NodeType::CompressedLiteral, compress(&packed)?)
            }
            plain => plain,
        };

        let tag = node_type.tag();
        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes
            .write_i32::<BigEndian>(index)
            .map_err(|e| Error::Encode("index", e))?;
        bytes
            .write_i32::<BigEndian>(content_hash(tag, &payload))
            .map_err(|e| Error::Encode("content_hash", e))?;
        bytes.push(tag);
        bytes.extend_from_slice(&payload);

        Ok(NodeRecord { bytes, node_type })
    }

    /// Validates raw record bytes: header length, type tag and content hash.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(EncodingError::TruncatedData.into());
        }
        let node_type = NodeType::try_from(bytes[TYPE_OFFSET])?;
        let record = NodeRecord { bytes, node_type };

        let computed = content_hash(record.bytes[TYPE_OFFSET], record.payload());
        if record.content_hash() != computed {
            return Err(EncodingError::InvalidFormat(format!(
                "content hash mismatch: stored {:08x}, computed {:08x}",
                record.content_hash(),
                computed
            ))
            .into());
        }
        Ok(record)
    }

    /// Identity of `node` in a dictionary: its uncompressed type tag followed
    /// by its uncompressed payload. Independent of the compression threshold.
    pub fn node_key(node: &Node) -> Result<Vec<u8>> {
        let (node_type, payload) = uncompressed(node)?;
        let mut key = Vec::with_capacity(1 + payload.len());
        key.push(node_type.tag());
        key.extend_from_slice(&payload);
        Ok(key)
    }

    /// The [`node_key`](NodeRecord::node_key) of the stored node, inflating a
    /// compressed literal.
    pub fn canonical_key(&self) -> Result<Vec<u8>> {
        match self.node_type {
            NodeType::CompressedLiteral => {
                let packed = decompress(self.payload())?;
                let mut key = Vec::with_capacity(1 + packed.len());
                key.push(NodeType::Literal.tag());
                key.extend_from_slice(&packed);
                Ok(key)
            }
            _ => Ok(self.content_key().to_vec()),
        }
    }

    pub fn index(&self) -> i32 {
        BigEndian::read_i32(&self.bytes[INDEX_RANGE])
    }

    pub fn is_assigned(&self) -> bool {
        self.index() != WILD
    }

    /// Assigns the dictionary index. An index can be assigned only once.
    pub fn set_index(&mut self, index: i32) -> Result<()> {
        if self.is_assigned() {
            return Err(Error::InvalidState(format!(
                "record already has index {}",
                self.index()
            )));
        }
        if index < 0 {
            return Err(Error::InvalidArgument(format!(
                "record index ({}) must be greater than or equal to 0",
                index
            )));
        }
        BigEndian::write_i32(&mut self.bytes[INDEX_RANGE], index);
        Ok(())
    }

    pub fn content_hash(&self) -> i32 {
        BigEndian::read_i32(&self.bytes[HASH_RANGE])
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }

    /// Type tag followed by the stored payload.
    pub fn content_key(&self) -> &[u8] {
        &self.bytes[TYPE_OFFSET..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Rebuilds the node, decompressing literal payloads.
    pub fn decode(&self) -> Result<Node> {
        let payload = self.payload();
        let node = match self.node_type {
            NodeType::Any => Node::Any,
            NodeType::Uri => Node::Uri(utf8(payload.to_vec())?),
            NodeType::Blank => Node::Blank(utf8(payload.to_vec())?),
            NodeType::Variable => Node::Variable(utf8(payload.to_vec())?),
            NodeType::Literal => Node::Literal(unpack_literal(payload)?),
            NodeType::CompressedLiteral => Node::Literal(unpack_literal(&decompress(payload)?)?),
        };
        Ok(node)
    }
}

impl PartialEq for NodeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.content_key() == other.content_key()
    }
}

impl Eq for NodeRecord {}

impl Hash for NodeRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(self.content_key());
    }
}

impl fmt::Debug for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Record::key_value(&self.bytes[..TYPE_OFFSET], self.content_key()))
    }
}

/// Type and payload of `node` before compression.
fn uncompressed(node: &Node) -> Result<(NodeType, Vec<u8>)> {
    Ok(match node {
        Node::Any => (NodeType::Any, Vec::new()),
        Node::Uri(uri) => (NodeType::Uri, uri.as_bytes().to_vec()),
        Node::Blank(label) => (NodeType::Blank, label.as_bytes().to_vec()),
        Node::Variable(name) => (NodeType::Variable, name.as_bytes().to_vec()),
        Node::Literal(literal) => (NodeType::Literal, pack_literal(literal)?),
    })
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| EncodingError::InvalidUtf8.into())
}

/// `[len:i32][lexical][len:i32][language][len:i32][datatype]`, -1 for absent.
fn pack_literal(literal: &Literal) -> Result<Vec<u8>> {
    let mut encoder = LiteralEncoder::new(Vec::new());
    encoder.write_field("lexical", Some(&literal.lexical))?;
    encoder.write_field("language", literal.language.as_deref())?;
    encoder.write_field("datatype", literal.datatype.as_deref())?;
    Ok(encoder.writer)
}

fn unpack_literal(mut bytes: &[u8]) -> Result<Literal> {
    let mut decoder = LiteralDecoder::new(&mut bytes);
    let lexical = decoder
        .read_field("lexical")?
        .ok_or_else(|| EncodingError::InvalidFormat("literal without lexical form".to_string()))?;
    let language = decoder.read_field("language")?;
    let datatype = decoder.read_field("datatype")?;

    if !bytes.is_empty() {
        return Err(EncodingError::InvalidFormat(format!(
            "{} trailing bytes after literal",
            bytes.len()
        ))
        .into());
    }

    Ok(Literal {
        lexical,
        language,
        datatype,
    })
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| Error::Encode("compressed literal", e))?;
    encoder
        .finish()
        .map_err(|e| Error::Encode("compressed literal", e))
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decode("compressed literal", e))?;
    Ok(out)
}

struct LiteralEncoder<W: Write> {
    writer: W,
}

impl<W: Write> LiteralEncoder<W> {
    fn new(writer: W) -> Self {
        LiteralEncoder { writer }
    }

    fn write_field(&mut self, field: &'static str, value: Option<&str>) -> Result<()> {
        match value {
            None => self
                .writer
                .write_i32::<BigEndian>(ABSENT)
                .map_err(|e| Error::Encode(field, e)),
            Some(value) => {
                let len = i32::try_from(value.len()).map_err(|_| {
                    Error::InvalidArgument(format!("{} of {} bytes is too long", field, value.len()))
                })?;
                self.writer
                    .write_i32::<BigEndian>(len)
                    .map_err(|e| Error::Encode(field, e))?;
                self.writer
                    .write_all(value.as_bytes())
                    .map_err(|e| Error::Encode(field, e))
            }
        }
    }
}

struct LiteralDecoder<R: Read> {
    reader: R,
}

impl<R: Read> LiteralDecoder<R> {
    fn new(reader: R) -> Self {
        LiteralDecoder { reader }
    }

    fn read_field(&mut self, field: &'static str) -> Result<Option<String>> {
        let len = self
            .reader
            .read_i32::<BigEndian>()
            .map_err(|e| Error::Decode(field, e))?;
        if len == ABSENT {
            return Ok(None);
        }
        if len < 0 {
            return Err(EncodingError::InvalidFormat(format!("{} length {}", field, len)).into());
        }

        let mut buf = Vec::new();
        let read = (&mut self.reader)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(|e| Error::Decode(field, e))?;
        if read != len as usize {
            return Err(EncodingError::TruncatedData.into());
        }
        utf8(buf).map(Some)
    }
}
