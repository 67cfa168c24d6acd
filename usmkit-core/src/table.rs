//! UTF table codec
//!
//! Structured metadata (stream headers, seek indexes) is stored as a small
//! self-describing table:
//!
//! ```text
//! "@UTF" | size u32 | fixed header (24) | shared | unique | strings | bytes
//! ```
//!
//! All offsets in the fixed header are measured from the start of the fixed
//! header. The shared region holds, for every column, a tag byte and a key
//! offset followed by the value itself when the column is recurring. The
//! unique region holds the per-row values of unique columns.

use crate::constants::{
    MAX_TABLE_CELLS, NULL_STRING, TABLE_ENVELOPE_SIZE, TABLE_HEADER_SIZE, UTF_MARKER,
};
use crate::error::UsmError;
use crate::value::{Storage, TypeTag, Value, ValueType};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

#[cfg(feature = "logging")]
use tracing::debug;

/// Fixed 24-byte table header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableHeader {
    /// Start of the unique region
    pub unique_offset: u32,
    /// Start of the string region
    pub string_offset: u32,
    /// Start of the byte region
    pub byte_offset: u32,
    /// Offset of the table name inside the string region
    pub name_offset: u32,
    /// Number of columns
    pub items_per_row: u16,
    /// Bytes of unique-region data per row
    pub unique_size_per_row: u16,
    /// Number of rows
    pub row_count: u32,
}

impl TableHeader {
    fn from_bytes(raw: &[u8; TABLE_HEADER_SIZE]) -> Self {
        let u32_at = |i: usize| u32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        let u16_at = |i: usize| u16::from_be_bytes([raw[i], raw[i + 1]]);
        Self {
            unique_offset: u32_at(0),
            string_offset: u32_at(4),
            byte_offset: u32_at(8),
            name_offset: u32_at(12),
            items_per_row: u16_at(16),
            unique_size_per_row: u16_at(18),
            row_count: u32_at(20),
        }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u32(self.unique_offset);
        buf.put_u32(self.string_offset);
        buf.put_u32(self.byte_offset);
        buf.put_u32(self.name_offset);
        buf.put_u16(self.items_per_row);
        buf.put_u16(self.unique_size_per_row);
        buf.put_u32(self.row_count);
    }
}

/// A UTF table split into its four regions
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Fixed header
    pub header: TableHeader,
    /// Column descriptors and recurring values
    pub shared: Bytes,
    /// Per-row values
    pub unique: Bytes,
    /// NUL-terminated strings
    pub strings: Bytes,
    /// Raw blobs
    pub bytes: Bytes,
}

impl Table {
    /// Decode an enveloped table without copying its regions
    pub fn decode(data: &Bytes) -> Result<Self, UsmError> {
        let fixed = TABLE_ENVELOPE_SIZE + TABLE_HEADER_SIZE;
        if data.len() < fixed {
            return Err(UsmError::TruncatedInput {
                offset: 0,
                expected: fixed,
                actual: data.len(),
            });
        }
        if &data[..4] != UTF_MARKER {
            return Err(UsmError::CorruptTable(format!(
                "bad table marker {:02x?}",
                &data[..4]
            )));
        }

        let size = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let mut raw = [0u8; TABLE_HEADER_SIZE];
        raw.copy_from_slice(&data[TABLE_ENVELOPE_SIZE..fixed]);
        let header = TableHeader::from_bytes(&raw);

        let available = data.len() - TABLE_ENVELOPE_SIZE;
        let limit = u32::try_from(available).map_or(size, |available| size.min(available));
        let monotonic = TABLE_HEADER_SIZE as u32 <= header.unique_offset
            && header.unique_offset <= header.string_offset
            && header.string_offset <= header.byte_offset
            && header.byte_offset <= limit;
        if !monotonic {
            return Err(UsmError::InvalidOffsets {
                unique: header.unique_offset,
                string: header.string_offset,
                bytes: header.byte_offset,
                size,
            });
        }

        // Offsets fit, but the byte region is cut short
        if available < size as usize {
            return Err(UsmError::TruncatedInput {
                offset: TABLE_ENVELOPE_SIZE as u64,
                expected: size as usize,
                actual: available,
            });
        }

        let at = |offset: u32| TABLE_ENVELOPE_SIZE + offset as usize;
        Ok(Self {
            header,
            shared: data.slice(fixed..at(header.unique_offset)),
            unique: data.slice(at(header.unique_offset)..at(header.string_offset)),
            strings: data.slice(at(header.string_offset)..at(header.byte_offset)),
            bytes: data.slice(at(header.byte_offset)..at(size)),
        })
    }

    /// Table size as written in the envelope (fixed header plus regions)
    pub fn size(&self) -> usize {
        TABLE_HEADER_SIZE + self.shared.len() + self.unique.len() + self.strings.len() + self.bytes.len()
    }

    /// Length of the enveloped encoding
    pub fn encoded_len(&self) -> usize {
        TABLE_ENVELOPE_SIZE + self.size()
    }

    /// Encode with the `@UTF` envelope
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(UTF_MARKER);
        buf.put_u32(self.size() as u32);
        self.header.put(&mut buf);
        buf.put_slice(&self.shared);
        buf.put_slice(&self.unique);
        buf.put_slice(&self.strings);
        buf.put_slice(&self.bytes);
        buf.freeze()
    }

    /// Resolve the table into named rows
    pub fn dictionary(&self) -> Result<Dictionary, UsmError> {
        decode_dictionaries(self)
    }
}

/// Decode an enveloped table from a byte slice
pub fn decode_table(data: &[u8]) -> Result<Table, UsmError> {
    Table::decode(&Bytes::copy_from_slice(data))
}

/// One key/value cell of a row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    /// Column name
    pub key: String,
    /// Where the value is stored
    pub storage: Storage,
    /// Typed value
    pub value: Value,
}

impl Entry {
    /// Entry stored once and shared by every row
    pub fn recurring(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            storage: Storage::Recurring,
            value,
        }
    }

    /// Entry stored separately for each row
    pub fn unique(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            storage: Storage::Unique,
            value,
        }
    }

    /// Raw tag byte written for this entry
    fn tag_byte(&self) -> u8 {
        if let Value::Unknown(raw) = self.value {
            return raw;
        }
        self.value
            .value_type()
            .map_or(0, |value_type| TypeTag::new(value_type, self.storage).encode())
    }
}

/// An ordered list of entries
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Row {
    /// Entries in column order
    pub entries: Vec<Entry>,
}

impl Row {
    /// Create a row from entries
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Value of the first entry named `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }
}

/// A decoded table: its name and rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dictionary {
    /// Table name
    pub name: String,
    /// Rows in order
    pub rows: Vec<Row>,
}

impl Dictionary {
    /// Create a dictionary
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Lay the rows out as a table
    pub fn to_table(&self) -> Result<Table, UsmError> {
        encode_dictionaries(&self.name, &self.rows)
    }

    /// One `UnknownTag` error for every entry whose tag was not in the catalog
    pub fn unknown_tags(&self) -> Vec<UsmError> {
        let mut found = Vec::new();
        for (row, entries) in self.rows.iter().enumerate() {
            for (item, entry) in entries.entries.iter().enumerate() {
                if let Value::Unknown(tag) = entry.value {
                    found.push(UsmError::UnknownTag {
                        tag,
                        row: row as u32,
                        item: item as u16,
                    });
                }
            }
        }
        found
    }
}

/// Read cursor over one region
struct Cursor<'a> {
    region: &'static str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(region: &'static str, data: &'a [u8]) -> Self {
        Self {
            region,
            data,
            pos: 0,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], UsmError> {
        let out = self
            .pos
            .checked_add(n)
            .and_then(|end| self.data.get(self.pos..end))
            .ok_or_else(|| {
                UsmError::CorruptTable(format!(
                    "{} region exhausted: need {} bytes at {}, have {}",
                    self.region,
                    n,
                    self.pos,
                    self.data.len()
                ))
            })?;
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, UsmError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, UsmError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Reference fields are `width` bytes wide; widths other than 4 are read
    /// as big-endian integers of that width.
    fn offset(&mut self, width: usize) -> Result<u64, UsmError> {
        Ok(self.take(width)?.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }
}

/// String starting at `offset` in the string region, up to the next NUL or
/// the end of the region
fn string_at(strings: &[u8], offset: u64) -> Result<String, UsmError> {
    let tail = usize::try_from(offset)
        .ok()
        .and_then(|start| strings.get(start..))
        .ok_or_else(|| {
            UsmError::CorruptTable(format!(
                "string offset {} outside a {}-byte string region",
                offset,
                strings.len()
            ))
        })?;
    let end = memchr::memchr(0, tail).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

/// Number of cells a table with these dimensions expands to
fn cell_count(row_count: usize, items_per_row: usize) -> usize {
    row_count.saturating_mul(items_per_row.max(1))
}

/// Resolve every row of a table into typed entries
///
/// The shared cursor is rewound at the start of each row so recurring values
/// read back identically for every row; the unique cursor only moves forward.
/// An entry whose tag is not in the catalog decodes as [`Value::Unknown`]
/// with no data and its siblings are still resolved.
pub fn decode_dictionaries(table: &Table) -> Result<Dictionary, UsmError> {
    let header = &table.header;
    let per_row = u64::from(header.unique_size_per_row);
    if per_row * u64::from(header.row_count) > table.unique.len() as u64 {
        return Err(UsmError::CorruptTable(format!(
            "{} rows of {} unique bytes exceed the {}-byte unique region",
            header.row_count,
            per_row,
            table.unique.len()
        )));
    }

    let cells = cell_count(header.row_count as usize, header.items_per_row as usize);
    if cells > MAX_TABLE_CELLS {
        return Err(UsmError::CorruptTable(format!(
            "{} rows of {} items exceed {} cells",
            header.row_count, header.items_per_row, MAX_TABLE_CELLS
        )));
    }

    let mut unique = Cursor::new("unique", &table.unique);
    let mut rows = Vec::new();

    for row in 0..header.row_count {
        let mut shared = Cursor::new("shared", &table.shared);
        let mut entries = Vec::with_capacity(header.items_per_row as usize);

        for item in 0..header.items_per_row {
            let raw_tag = shared.u8()?;
            let key = string_at(&table.strings, u64::from(shared.u32()?))?;

            let Some(tag) = TypeTag::decode(raw_tag) else {
                #[cfg(feature = "logging")]
                debug!(
                    "Unknown tag 0x{:02x} for {} (row {}, item {})",
                    raw_tag, key, row, item
                );
                entries.push(Entry {
                    key,
                    storage: Storage::of_tag(raw_tag),
                    value: Value::Unknown(raw_tag),
                });
                continue;
            };

            let source = match tag.storage {
                Storage::Unique => &mut unique,
                Storage::Recurring => &mut shared,
            };
            let width = tag.value_type.width();

            let value = match tag.value_type {
                ValueType::String => Value::String(string_at(&table.strings, source.offset(width)?)?),
                ValueType::Bytes => {
                    let start = source.offset(width)?;
                    let end = source.offset(width)?;
                    let range = usize::try_from(start)
                        .ok()
                        .zip(usize::try_from(end).ok())
                        .filter(|(s, e)| s <= e && *e <= table.bytes.len())
                        .ok_or_else(|| {
                            UsmError::CorruptTable(format!(
                                "byte range {}..{} of {} outside a {}-byte region",
                                start,
                                end,
                                key,
                                table.bytes.len()
                            ))
                        })?;
                    Value::Bytes(table.bytes.slice(range.0..range.1))
                }
                numeric => Value::from_be_bytes(numeric, source.take(width)?)?,
            };

            entries.push(Entry {
                key,
                storage: tag.storage,
                value,
            });
        }

        rows.push(Row { entries });
    }

    let name = string_at(&table.strings, u64::from(header.name_offset))?;

    #[cfg(feature = "logging")]
    debug!("Decoded table {} ({} rows)", name, rows.len());

    Ok(Dictionary { name, rows })
}

fn put_c_string(region: &mut Vec<u8>, s: &str) {
    region.extend_from_slice(s.as_bytes());
    region.push(0);
}

fn region_offset(region: &[u8], what: &str) -> Result<u32, UsmError> {
    u32::try_from(region.len())
        .map_err(|_| UsmError::InvalidStructure(format!("{} region exceeds 4 GiB", what)))
}

/// Lay out rows as a table
///
/// Every row must have the same keys, types and storage classes as row 0.
/// [`Value::Unknown`] entries write their raw tag and no data.
/// String and Bytes values are appended to their regions for every row, even
/// for recurring columns whose offsets are only stored once.
pub fn encode_dictionaries(name: &str, rows: &[Row]) -> Result<Table, UsmError> {
    let first = rows
        .first()
        .ok_or_else(|| UsmError::InvalidStructure("table has no rows".to_string()))?;
    if first.entries.is_empty() {
        return Err(UsmError::InvalidStructure("table rows have no entries".to_string()));
    }
    let items_per_row = u16::try_from(first.entries.len()).map_err(|_| {
        UsmError::InvalidStructure(format!("{} columns exceed u16", first.entries.len()))
    })?;
    let row_count = u32::try_from(rows.len())
        .map_err(|_| UsmError::InvalidStructure(format!("{} rows exceed u32", rows.len())))?;
    if cell_count(rows.len(), first.entries.len()) > MAX_TABLE_CELLS {
        return Err(UsmError::InvalidStructure(format!(
            "{} rows of {} items exceed {} cells",
            rows.len(),
            first.entries.len(),
            MAX_TABLE_CELLS
        )));
    }

    for (index, row) in rows.iter().enumerate().skip(1) {
        let same_layout = row.entries.len() == first.entries.len()
            && row
                .entries
                .iter()
                .zip(&first.entries)
                .all(|(a, b)| {
                    a.key == b.key && a.storage == b.storage && a.tag_byte() == b.tag_byte()
                });
        if !same_layout {
            return Err(UsmError::InvalidStructure(format!(
                "row {} does not match the column layout of row 0",
                index
            )));
        }
    }

    let mut shared = Vec::new();
    let mut unique = Vec::new();
    let mut strings = Vec::from(&NULL_STRING[..]);
    let mut blobs = Vec::new();

    let name_offset = region_offset(&strings, "string")?;
    put_c_string(&mut strings, name);

    for (index, row) in rows.iter().enumerate() {
        for entry in &row.entries {
            if index == 0 {
                shared.push(entry.tag_byte());
                shared.put_u32(region_offset(&strings, "string")?);
                put_c_string(&mut strings, &entry.key);
            }

            let target = match entry.storage {
                Storage::Recurring if index == 0 => Some(&mut shared),
                Storage::Recurring => None,
                Storage::Unique => Some(&mut unique),
            };

            match &entry.value {
                Value::String(s) => {
                    let offset = region_offset(&strings, "string")?;
                    put_c_string(&mut strings, s);
                    if let Some(target) = target {
                        target.put_u32(offset);
                    }
                }
                Value::Bytes(blob) => {
                    let start = region_offset(&blobs, "byte")?;
                    blobs.extend_from_slice(blob);
                    let end = region_offset(&blobs, "byte")?;
                    if let Some(target) = target {
                        target.put_u32(start);
                        target.put_u32(end);
                    }
                }
                numeric => {
                    if let Some(target) = target {
                        numeric.put_be_bytes(target);
                    }
                }
            }
        }
    }

    let unique_size_per_row = u16::try_from(unique.len() / rows.len()).map_err(|_| {
        UsmError::InvalidStructure(format!(
            "{} unique bytes per row exceed u16",
            unique.len() / rows.len()
        ))
    })?;

    let size = TABLE_HEADER_SIZE + shared.len() + unique.len() + strings.len() + blobs.len();
    if size > u32::MAX as usize {
        return Err(UsmError::InvalidStructure(format!(
            "table size {} exceeds u32",
            size
        )));
    }

    let unique_offset = (TABLE_HEADER_SIZE + shared.len()) as u32;
    let string_offset = unique_offset + unique.len() as u32;
    let byte_offset = string_offset + strings.len() as u32;

    Ok(Table {
        header: TableHeader {
            unique_offset,
            string_offset,
            byte_offset,
            name_offset,
            items_per_row,
            unique_size_per_row,
            row_count,
        },
        shared: Bytes::from(shared),
        unique: Bytes::from(unique),
        strings: Bytes::from(strings),
        bytes: Bytes::from(blobs),
    })
}
