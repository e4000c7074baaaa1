//! The binary resource index (`resources.index`).
//!
//! ```text
//! Header      := version[128] total-length:u32 key-count:u32
//! KeyNode     := "KEYS" offset:u32 param-count:u32 { type:u32 value:u32 }*
//! RecordNode  := "IDSS" entry-count:u32 { id:u32 offset:u32 }*
//! ResRecord   := size:u32 type:u32 id:u32 Value Name
//! ```
//!
//! This is the layout of `resources.index` files as shipped in packages: the
//! header puts total-length before key-count, and a key node's record offset
//! precedes its params.
//!
//! All integers are little-endian and all offsets are absolute. Strings are a
//! `u16` length, the UTF-8 bytes and a NUL that the length does not count.
//! Array values are prefixed with the `u16` byte length of the packed strings.

pub mod builder;
pub mod decoder;

pub use builder::IndexBuilder;
pub use decoder::decode;

use crate::{
    qualifier::QualifierDescriptor,
    types::{KeyParam, ResourceRecord},
};

pub(crate) const VERSION_LEN: usize = 128;
pub(crate) const HEADER_LEN: usize = VERSION_LEN + 8;
pub(crate) const KEYS_TAG: &[u8; 4] = b"KEYS";
pub(crate) const IDSS_TAG: &[u8; 4] = b"IDSS";

/// A fully decoded index: one node per qualifier directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedIndex {
    pub version: String,
    pub nodes: Vec<QualifierNode>,
}

impl DecodedIndex {
    /// Total number of records retained across all nodes.
    pub fn record_count(&self) -> usize {
        self.nodes.iter().map(|n| n.records.len()).sum()
    }
}

/// One qualifier directory and the records it defines.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifierNode {
    pub params: Vec<KeyParam>,
    pub descriptor: QualifierDescriptor,
    pub folder: String,
    pub records: Vec<ResourceRecord>,
    /// Set when the locale pre-filter dropped this node's records.
    pub filtered: bool,
}
