use std::fmt;

use super::EncodingError;

/// Record type tags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Any = 0x00,
    Blank = 0x01,
    Literal = 0x02,
    Uri = 0x03,
    Variable = 0x04,
    /// Gzip compressed literal payload.
    CompressedLiteral = COMPRESSED_FLAG | 0x02,
}

/// Flag or-ed into a tag when its payload is compressed.
pub const COMPRESSED_FLAG: u8 = 0x10;

impl NodeType {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for NodeType {
    type Error = EncodingError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x00 => Ok(NodeType::Any),
            0x01 => Ok(NodeType::Blank),
            0x02 => Ok(NodeType::Literal),
            0x03 => Ok(NodeType::Uri),
            0x04 => Ok(NodeType::Variable),
            t if t == NodeType::CompressedLiteral.tag() => Ok(NodeType::CompressedLiteral),
            _ => Err(EncodingError::UnknownType(tag)),
        }
    }
}

/// A literal value with an optional language tag and datatype.
///
/// Empty language and datatype strings are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub lexical: String,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl Literal {
    pub fn new(lexical: impl Into<String>) -> Self {
        Literal {
            lexical: lexical.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = non_empty(language.into());
        self
    }

    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = non_empty(datatype.into());
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.lexical)?;
        if let Some(language) = &self.language {
            write!(f, "@{}", language)?;
        }
        if let Some(datatype) = &self.datatype {
            write!(f, "^^<{}>", datatype)?;
        }
        Ok(())
    }
}

/// A value that can be interned by the dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// Wildcard marker; always maps to [`WILD`](crate::WILD).
    Any,
    Uri(String),
    Blank(String),
    Literal(Literal),
    Variable(String),
}

impl Node {
    pub fn uri(uri: impl Into<String>) -> Self {
        Node::Uri(uri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Node::Blank(label.into())
    }

    pub fn literal(lexical: impl Into<String>) -> Self {
        Node::Literal(Literal::new(lexical))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Node::Variable(name.into())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Node::Any)
    }

    /// Uncompressed type of this node.
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Any => NodeType::Any,
            Node::Uri(_) => NodeType::Uri,
            Node::Blank(_) => NodeType::Blank,
            Node::Literal(_) => NodeType::Literal,
            Node::Variable(_) => NodeType::Variable,
        }
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Node::Literal(literal)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Any => write!(f, "ANY"),
            Node::Uri(uri) => write!(f, "<{}>", uri),
            Node::Blank(label) => write!(f, "_:{}", label),
            Node::Literal(literal) => write!(f, "{}", literal),
            Node::Variable(name) => write!(f, "?{}", name),
        }
    }
}
