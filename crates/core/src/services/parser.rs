//! Parser for the textual layout dump printed by `pahole`.
//!
//! The dump is treated as a line grammar rather than scraped by position:
//!
//! ```text
//! struct Foo {                                    <- declaration, column 0
//!         int                a;      /*     0     4 */   <- member
//!
//!         /* XXX 4 bytes hole, try to pack */          <- annotation
//!
//!         long               b;      /*     8     8 */
//!         union {                                       <- nested aggregate
//!                 int        c;      /*    16     4 */
//!         };                         /*    16     4 */   <- collapsed into one member
//!
//!         /* size: 24, cachelines: 1, members: 3 */     <- statistics
//!         /* sum members: 16, holes: 1, sum holes: 4 */
//!         /* padding: 4 */
//! };                                              <- closing, column 0
//! ```
//!
//! Anything outside a block is skipped. Inside a block, blank lines and
//! annotations are tolerated; any other line starting at column 0 ends the
//! block early and it is reported as truncated. Members are kept in the exact
//! order the tool printed them.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{trace, warn};

use crate::model::{
    AggregateKind, BitField, Member, ObjectFile, PackingHint, ParseWarning, StructureRecord,
};

/// Per-structure inconsistency. Reported as a warning, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(
        "members ({member_bytes} bytes) plus stated padding ({stated_padding} bytes) \
         do not add up to the stated size ({total_size} bytes)"
    )]
    SizeMismatch { member_bytes: u64, stated_padding: u64, total_size: u64 },
    #[error("no size statistic found for block")]
    MissingSize,
    #[error("block ended before its closing brace")]
    Truncated,
}

/// Records parsed from one object's layout dump, plus the warnings raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLayout {
    pub records: Vec<StructureRecord>,
    pub warnings: Vec<ParseWarning>,
}

struct Patterns {
    declaration: Regex,
    member: Regex,
    nested_close: Regex,
    size: Regex,
    sum_holes: Regex,
    padding: Regex,
    attribute: Regex,
    fn_pointer: Regex,
    array_suffix: Regex,
    bit_suffix: Regex,
    packable: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |src: &str| Regex::new(src).expect("layout grammar regex is valid");
        Patterns {
            declaration: re(r"^(typedef\s+)?(struct|union|class)\b(.*)\{\s*$"),
            member: re(r"^(.+?)\s*;\s*/\*\s*(\d+)(?::\s*(\d+))?\s+(\d+)\s*\*/\s*$"),
            nested_close: re(r"^\}\s*(.*?)\s*;\s*/\*\s*(\d+)(?::\s*(\d+))?\s+(\d+)\s*\*/\s*$"),
            size: re(r"\bsize:\s*(\d+)"),
            sum_holes: re(r"\bsum holes:\s*(\d+)"),
            padding: re(r"\bpadding:\s*(\d+)"),
            attribute: re(r"__attribute__\s*\(\(.*\)\)"),
            fn_pointer: re(r"\(\s*\*\s*(\w+)\s*((?:\[[^\]]*\])*)\s*\)"),
            array_suffix: re(r"^(.*?)((?:\s*\[[^\]]*\])+)$"),
            bit_suffix: re(r"^(.*?)\s*:\s*(\d+)$"),
            packable: re(r"^([\w/.:_-]+)(?:\(\d+\))?\t(\d+)\t(\d+)\t(\d+)\s*$"),
        }
    })
}

/// Parse the layout dump (`pahole -a -A`) of one object file.
pub fn parse_layout(object: &ObjectFile, text: &str) -> ParsedLayout {
    let mut parser = LayoutParser::new(object);
    for line in text.lines() {
        parser.feed(line);
    }
    parser.finish()
}

/// Parse the packable listing (`pahole --packable`): `name\tnow\tpacked\tsaved`.
pub fn parse_packable(text: &str) -> Vec<PackingHint> {
    let p = patterns();
    text.lines()
        .filter_map(|line| {
            let caps = p.packable.captures(line.trim_end())?;
            Some(PackingHint {
                name: caps[1].to_string(),
                size_now: caps[2].parse().ok()?,
                size_packed: caps[3].parse().ok()?,
                saved: caps[4].parse().ok()?,
                raw: line.trim_end().to_string(),
            })
        })
        .collect()
}

/// Attach to each record the first hint listed under its tag or typedef name.
pub fn attach_hints(records: &mut [StructureRecord], hints: &[PackingHint]) {
    for record in records.iter_mut() {
        let hint = hints.iter().find(|h| record.lookup_names().any(|n| n == h.name));
        record.packing_hint = hint.cloned();
    }
}

enum Step {
    Continue,
    Closed(Option<String>),
    Interrupted,
}

struct Block {
    kind: AggregateKind,
    tag: Option<String>,
    raw: String,
    members: Vec<Member>,
    /// Nesting level of inline aggregates; 0 is the block body.
    depth: usize,
    nested_kind: String,
    stated_size: Option<u64>,
    sum_holes: Option<u64>,
    tail_padding: Option<u64>,
}

impl Block {
    fn new(kind: AggregateKind, tag: Option<String>, line: &str) -> Self {
        let mut raw = String::new();
        raw.push_str(line);
        raw.push('\n');
        Self {
            kind,
            tag,
            raw,
            members: Vec::new(),
            depth: 0,
            nested_kind: String::new(),
            stated_size: None,
            sum_holes: None,
            tail_padding: None,
        }
    }

    fn accept(&mut self, line: &str) -> Step {
        let trimmed = line.trim();
        let indented = line.starts_with([' ', '\t']);

        if !indented && !trimmed.is_empty() {
            if self.depth == 0 && trimmed.starts_with('}') {
                self.raw.push_str(line);
                return Step::Closed(closing_name(trimmed));
            }
            return Step::Interrupted;
        }

        self.raw.push_str(line);
        self.raw.push('\n');
        if trimmed.is_empty() {
            return Step::Continue;
        }

        if self.depth > 0 {
            if trimmed.starts_with('}') {
                self.depth -= 1;
                if self.depth == 0 {
                    self.close_nested(trimmed);
                }
            } else if trimmed.ends_with('{') {
                self.depth += 1;
            }
            return Step::Continue;
        }

        if trimmed.starts_with("/*") {
            self.read_statistics(trimmed);
        } else if trimmed.ends_with('{') {
            self.depth = 1;
            self.nested_kind =
                trimmed.split_whitespace().next().unwrap_or_default().to_string();
        } else if let Some(member) = parse_member(trimmed) {
            self.members.push(member);
        } else {
            trace!("skipping line without layout comment: {trimmed}");
        }
        Step::Continue
    }

    fn close_nested(&mut self, trimmed: &str) {
        let Some(caps) = patterns().nested_close.captures(trimmed) else {
            trace!("nested aggregate closed without layout comment: {trimmed}");
            return;
        };
        let name = caps[1].to_string();
        let (Ok(offset), Ok(size)) = (caps[2].parse::<u64>(), caps[4].parse::<u64>()) else {
            return;
        };
        let declaration = format!("{} {{...}} {}", self.nested_kind, name).trim_end().to_string();
        self.members.push(Member {
            name,
            type_name: self.nested_kind.clone(),
            declaration,
            offset,
            size,
            bit_field: None,
        });
    }

    fn read_statistics(&mut self, comment: &str) {
        let p = patterns();
        let grab = |re: &Regex| re.captures(comment).and_then(|c| c[1].parse::<u64>().ok());
        if let Some(size) = grab(&p.size) {
            self.stated_size = Some(size);
        }
        if let Some(holes) = grab(&p.sum_holes) {
            self.sum_holes = Some(holes);
        }
        if let Some(padding) = grab(&p.padding) {
            self.tail_padding = Some(padding);
        }
    }
}

struct LayoutParser<'a> {
    object: &'a ObjectFile,
    block: Option<Block>,
    parsed: ParsedLayout,
    unnamed: usize,
}

impl<'a> LayoutParser<'a> {
    fn new(object: &'a ObjectFile) -> Self {
        Self { object, block: None, parsed: ParsedLayout::default(), unnamed: 0 }
    }

    fn feed(&mut self, line: &str) {
        let line = line.trim_end();
        let Some(mut block) = self.block.take() else {
            self.start(line);
            return;
        };
        match block.accept(line) {
            Step::Continue => self.block = Some(block),
            Step::Closed(post) => self.complete(block, post, None),
            Step::Interrupted => {
                self.complete(block, None, Some(ParseError::Truncated));
                self.start(line);
            }
        }
    }

    fn start(&mut self, line: &str) {
        if line.is_empty() || line.starts_with([' ', '\t']) {
            return;
        }
        let Some(caps) = patterns().declaration.captures(line) else {
            trace!("skipping non-layout line: {line}");
            return;
        };
        let Some(kind) = AggregateKind::from_keyword(&caps[2]) else {
            return;
        };
        let tag_area = patterns().attribute.replace_all(&caps[3], " ");
        let tag_area = tag_area.split_whitespace().collect::<Vec<_>>().join(" ");
        let tag = tag_area.split_once(" : ").map(|(t, _)| t).unwrap_or(tag_area.as_str()).trim();
        let tag = (!tag.is_empty()).then(|| tag.to_string());
        self.block = Some(Block::new(kind, tag, line));
    }

    fn complete(&mut self, block: Block, post: Option<String>, interrupted: Option<ParseError>) {
        let typedef_name = post.filter(|p| !p.is_empty());
        let name = match (&typedef_name, &block.tag) {
            (Some(typedef), _) => typedef.clone(),
            (None, Some(tag)) => format!("{} {}", block.kind.keyword(), tag),
            (None, None) => {
                self.unnamed += 1;
                format!("unknown_{}", self.unnamed)
            }
        };

        let mut record = StructureRecord {
            kind: block.kind,
            name,
            tag: block.tag,
            typedef_name,
            total_size: 0,
            members: block.members,
            padding_bytes: 0,
            source_object: self.object.clone(),
            raw: block.raw,
            packing_hint: None,
            warnings: Vec::new(),
        };

        let mut errors: Vec<ParseError> = interrupted.into_iter().collect();
        let member_bytes = record.member_bytes();
        match block.stated_size {
            Some(total_size) => {
                let stated_padding =
                    block.sum_holes.unwrap_or(0) + block.tail_padding.unwrap_or(0);
                record.total_size = total_size;
                record.padding_bytes = stated_padding;
                if member_bytes + stated_padding != total_size {
                    errors.push(ParseError::SizeMismatch {
                        member_bytes,
                        stated_padding,
                        total_size,
                    });
                }
            }
            None => {
                record.total_size = record.members.iter().map(Member::end).max().unwrap_or(0);
                record.padding_bytes = record.total_size.saturating_sub(member_bytes);
                errors.push(ParseError::MissingSize);
            }
        }

        for error in errors {
            warn!(structure = %record.name, object = %self.object, "{error}");
            record.warnings.push(error.to_string());
            self.parsed.warnings.push(ParseWarning {
                structure: record.name.clone(),
                object: self.object.clone(),
                message: error.to_string(),
            });
        }
        self.parsed.records.push(record);
    }

    fn finish(mut self) -> ParsedLayout {
        if let Some(block) = self.block.take() {
            self.complete(block, None, Some(ParseError::Truncated));
        }
        self.parsed
    }
}

/// Typedef name from a closing line such as `} __attribute__((__packed__)) foo_t;`.
fn closing_name(trimmed: &str) -> Option<String> {
    let body = trimmed.trim_start_matches('}');
    let body = body.split_once(';').map(|(b, _)| b).unwrap_or(body);
    let body = patterns().attribute.replace_all(body, " ");
    body.split_whitespace()
        .last()
        .filter(|word| word.chars().all(|c| c.is_alphanumeric() || c == '_'))
        .map(str::to_string)
}

fn parse_member(trimmed: &str) -> Option<Member> {
    let p = patterns();
    let caps = p.member.captures(trimmed)?;
    let declaration = p.attribute.replace_all(&caps[1], " ");
    let declaration = declaration.split_whitespace().collect::<Vec<_>>().join(" ");
    let offset = caps[2].parse().ok()?;
    let bit_offset = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
    let size = caps[4].parse().ok()?;

    let (declarator, bit_size) = match p.bit_suffix.captures(&declaration) {
        Some(bits) => (bits[1].to_string(), bits[2].parse::<u32>().ok()),
        None => (declaration.clone(), None),
    };
    let bit_field = match (bit_offset, bit_size) {
        (None, None) => None,
        (bit_offset, bit_size) => Some(BitField {
            bit_offset: bit_offset.unwrap_or(0),
            bit_size: bit_size.unwrap_or(0),
        }),
    };
    let (type_name, name) = split_declarator(&declarator);

    Some(Member { name, type_name, declaration, offset, size, bit_field })
}

/// Split a C declarator into `(type, name)`: `char *name[4]` → `("char *[4]", "name")`.
fn split_declarator(declarator: &str) -> (String, String) {
    let p = patterns();
    if let Some(caps) = p.fn_pointer.captures(declarator) {
        let name = caps[1].to_string();
        let type_name = p.fn_pointer.replace(declarator, "(*${2})").to_string();
        return (type_name, name);
    }

    let (base, array) = match p.array_suffix.captures(declarator) {
        Some(caps) => (caps[1].to_string(), caps[2].split_whitespace().collect::<String>()),
        None => (declarator.to_string(), String::new()),
    };
    let (type_part, name_part) = base.rsplit_once(' ').unwrap_or(("", base.as_str()));
    let name = name_part.trim_start_matches('*');
    let stars = &name_part[..name_part.len() - name.len()];

    let mut type_name = type_part.trim().to_string();
    if !stars.is_empty() {
        if !type_name.ends_with('*') {
            type_name.push(' ');
        }
        type_name.push_str(stars);
    }
    type_name.push_str(&array);
    (type_name, name.to_string())
}
