//! Minimal sfnt (TrueType container) writing and reading.

use crate::error::TranscodeError;

pub(crate) type Tag = [u8; 4];

pub(crate) const HEAD: Tag = *b"head";

/// Magic value the whole-font checksum must add up to.
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

// ============================================================================
// Byte Writer
// ============================================================================

/// Growable byte buffer with big- and little-endian primitives.
#[derive(Debug, Default)]
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub(crate) fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn i16(&mut self, value: i16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn u16_le(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn u32_le(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Pads with zeros up to a multiple of four bytes.
    pub(crate) fn align4(&mut self) -> &mut Self {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
        self
    }

    pub(crate) fn set_u32(&mut self, offset: usize, value: u32) {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Sums big-endian u32 words, zero-padding the final word.
pub(crate) fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Binary search header fields for `count` records of `unit` bytes:
/// `(searchRange, entrySelector, rangeShift)`.
pub(crate) fn search_params(count: u16, unit: u16) -> (u16, u16, u16) {
    if count == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - count.leading_zeros() as u16;
    let search_range = (1u16 << entry_selector) * unit;
    (search_range, entry_selector, count * unit - search_range)
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Result<u16, TranscodeError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| truncated(offset))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Result<u32, TranscodeError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| truncated(offset))
}

pub(crate) fn read_bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8], TranscodeError> {
    data.get(offset..offset + len).ok_or_else(|| truncated(offset))
}

fn truncated(offset: usize) -> TranscodeError {
    TranscodeError::Sfnt(format!("data truncated at offset {offset}"))
}

// ============================================================================
// Font Assembly
// ============================================================================

/// One table to be written into a font.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub(crate) tag: Tag,
    pub(crate) data: Vec<u8>,
}

impl Table {
    pub(crate) fn new(tag: Tag, data: Vec<u8>) -> Self {
        Self { tag, data }
    }
}

/// Writes a TrueType font: sorted table directory, 4-byte aligned tables and
/// the `head.checkSumAdjustment` fix-up.
///
/// The `head` table must carry a zero checksum adjustment at offset 8.
pub(crate) fn assemble(mut tables: Vec<Table>) -> Vec<u8> {
    tables.sort_by(|a, b| a.tag.cmp(&b.tag));
    let count = tables.len() as u16;
    let (search_range, entry_selector, range_shift) = search_params(count, 16);

    let directory_len = 12 + 16 * tables.len();
    let total = directory_len + tables.iter().map(|t| padded_len(t.data.len())).sum::<usize>();
    let mut out = ByteWriter::with_capacity(total);

    out.u32(0x0001_0000)
        .u16(count)
        .u16(search_range)
        .u16(entry_selector)
        .u16(range_shift);

    let mut offset = directory_len;
    let mut head_offset = None;
    for table in &tables {
        if table.tag == HEAD {
            head_offset = Some(offset);
        }
        out.bytes(&table.tag)
            .u32(checksum(&table.data))
            .u32(offset as u32)
            .u32(table.data.len() as u32);
        offset += padded_len(table.data.len());
    }

    for table in &tables {
        out.bytes(&table.data).align4();
    }

    if let Some(head_offset) = head_offset {
        let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(&out.buf));
        out.set_u32(head_offset + 8, adjustment);
    }
    out.into_inner()
}

// ============================================================================
// Font Reading
// ============================================================================

/// A table directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableRecord {
    pub(crate) tag: Tag,
    pub(crate) checksum: u32,
    pub(crate) offset: usize,
    pub(crate) length: usize,
}

/// Read-only view of an sfnt font's table directory.
#[derive(Debug)]
pub(crate) struct SfntReader<'a> {
    data: &'a [u8],
    flavor: u32,
    records: Vec<TableRecord>,
}

impl<'a> SfntReader<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self, TranscodeError> {
        let flavor = read_u32(data, 0)?;
        if !matches!(flavor, 0x0001_0000 | 0x7472_7565 | 0x4F54_544F) {
            return Err(TranscodeError::Sfnt(format!("unknown sfnt version 0x{flavor:08X}")));
        }

        let count = read_u16(data, 4)? as usize;
        let mut records = Vec::with_capacity(count);
        for i in 0..count {
            let base = 12 + 16 * i;
            let tag_bytes = read_bytes(data, base, 4)?;
            let record = TableRecord {
                tag: [tag_bytes[0], tag_bytes[1], tag_bytes[2], tag_bytes[3]],
                checksum: read_u32(data, base + 4)?,
                offset: read_u32(data, base + 8)? as usize,
                length: read_u32(data, base + 12)? as usize,
            };
            read_bytes(data, record.offset, record.length)?;
            records.push(record);
        }
        records.sort_by(|a, b| a.tag.cmp(&b.tag));

        Ok(Self { data, flavor, records })
    }

    pub(crate) fn flavor(&self) -> u32 {
        self.flavor
    }

    /// Table records sorted by tag.
    pub(crate) fn records(&self) -> &[TableRecord] {
        &self.records
    }

    pub(crate) fn table_data(&self, record: &TableRecord) -> &'a [u8] {
        &self.data[record.offset..record.offset + record.length]
    }

    pub(crate) fn table(&self, tag: Tag) -> Option<&'a [u8]> {
        self.records
            .iter()
            .find(|r| r.tag == tag)
            .map(|r| self.table_data(r))
    }

    /// Size of the font rebuilt with 4-byte aligned tables.
    pub(crate) fn total_sfnt_size(&self) -> usize {
        12 + 16 * self.records.len()
            + self.records.iter().map(|r| padded_len(r.length)).sum::<usize>()
    }
}
