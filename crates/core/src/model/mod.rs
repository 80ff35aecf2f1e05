//! Layout model for object files, aggregates and their members.
//!
//! Records are produced by the output parser and are read-only afterwards; the
//! classifier and report writer only ever borrow them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A resolved, lexically normalized path to a compiled object file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectFile {
    pub path: PathBuf,
}

impl ObjectFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used for blacklist matching.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

impl fmt::Display for ObjectFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Keyword that introduced an aggregate declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Struct,
    Union,
    Class,
}

impl AggregateKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "struct" => Some(Self::Struct),
            "union" => Some(Self::Union),
            "class" => Some(Self::Class),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Class => "class",
        }
    }
}

/// Bit placement of a bit-field member inside its storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitField {
    pub bit_offset: u32,
    pub bit_size: u32,
}

/// A single data member, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub type_name: String,
    /// Declarator as printed by the tool, without the trailing `;`.
    pub declaration: String,
    pub offset: u64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_field: Option<BitField>,
}

impl Member {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// One line of the tool's packable listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingHint {
    pub name: String,
    pub size_now: u64,
    pub size_packed: u64,
    pub saved: u64,
    /// The listing line exactly as emitted.
    pub raw: String,
}

impl PackingHint {
    /// The tool reports a strictly smaller size under optimal ordering.
    pub fn shrinks(&self) -> bool {
        self.size_packed < self.size_now
    }
}

/// A non-fatal inconsistency found while parsing one structure block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub structure: String,
    pub object: ObjectFile,
    pub message: String,
}

/// A parsed aggregate definition from one object file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub kind: AggregateKind,
    /// Typedef name, else qualified tag (`struct Foo`), else `unknown_<n>`.
    pub name: String,
    /// Unqualified tag, if the aggregate has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Typedef name, if the block was a `typedef ... } name;`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typedef_name: Option<String>,
    pub total_size: u64,
    pub members: Vec<Member>,
    pub padding_bytes: u64,
    pub source_object: ObjectFile,
    /// The block text exactly as emitted by the tool.
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packing_hint: Option<PackingHint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StructureRecord {
    /// Identity for dedup and reporting.
    pub fn identity(&self) -> (&str, &ObjectFile) {
        (&self.name, &self.source_object)
    }

    /// Bytes occupied by members.
    ///
    /// Bit-fields sharing a storage unit are counted once; a union contributes
    /// its largest member only.
    pub fn member_bytes(&self) -> u64 {
        if self.kind == AggregateKind::Union {
            return self.members.iter().map(|m| m.size).max().unwrap_or(0);
        }
        let mut total = 0;
        let mut last_unit: Option<(u64, u64)> = None;
        for member in &self.members {
            if member.bit_field.is_some() {
                let unit = (member.offset, member.size);
                if last_unit == Some(unit) {
                    continue;
                }
                last_unit = Some(unit);
            } else {
                last_unit = None;
            }
            total += member.size;
        }
        total
    }

    /// True when the parsed numbers satisfy `member_bytes + padding == size`.
    pub fn is_consistent(&self) -> bool {
        self.member_bytes() + self.padding_bytes == self.total_size
    }

    /// Names the tool may use for this record in its packable listing.
    pub fn lookup_names(&self) -> impl Iterator<Item = &str> {
        self.tag.as_deref().into_iter().chain(self.typedef_name.as_deref())
    }
}
