//! TrueType to WOFF2.
//!
//! Every table is stored with the null transform (glyf and loca use
//! transform version 3, everything else version 0), and all table data is
//! compressed as one brotli stream.

use std::io::Write;

use brotli::CompressorWriter;

use super::FontBytes;
use super::sfnt::{ByteWriter, SfntReader, Tag, padded_len};
use crate::error::TranscodeError;

const SIGNATURE: &[u8; 4] = b"wOF2";
const HEADER_LEN: usize = 48;

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;

/// Tags with a one-byte encoding in the table directory.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

const ARBITRARY_TAG: u8 = 63;
const NULL_TRANSFORM_GLYF: u8 = 3 << 6;

/// Repackages TrueType bytes as WOFF2.
pub fn ttf_to_woff2(ttf: &[u8]) -> Result<FontBytes, TranscodeError> {
    let font = SfntReader::parse(ttf)?;
    let records = font.records();

    let mut directory = ByteWriter::new();
    let mut stream = Vec::with_capacity(ttf.len());
    for record in records {
        directory.u8(table_flags(&record.tag));
        if known_index(&record.tag).is_none() {
            directory.bytes(&record.tag);
        }
        write_base128(&mut directory, record.length as u32);
        stream.extend_from_slice(font.table_data(record));
    }
    let directory = directory.into_inner();
    let compressed = compress(&stream)?;

    let total = padded_len(HEADER_LEN + directory.len() + compressed.len());
    let mut out = ByteWriter::with_capacity(total);
    out.bytes(SIGNATURE)
        .u32(font.flavor())
        .u32(total as u32)
        .u16(records.len() as u16)
        .u16(0)
        .u32(font.total_sfnt_size() as u32)
        .u32(compressed.len() as u32)
        .u16(1) // majorVersion
        .u16(0)
        .u32(0) // no metadata
        .u32(0)
        .u32(0)
        .u32(0) // no private data
        .u32(0)
        .bytes(&directory)
        .bytes(&compressed)
        .align4();

    Ok(FontBytes::from(out.into_inner()))
}

fn known_index(tag: &Tag) -> Option<u8> {
    KNOWN_TAGS.iter().position(|known| *known == tag).map(|i| i as u8)
}

fn table_flags(tag: &Tag) -> u8 {
    let index = known_index(tag).unwrap_or(ARBITRARY_TAG);
    if tag == b"glyf" || tag == b"loca" {
        index | NULL_TRANSFORM_GLYF
    } else {
        index
    }
}

/// Writes a UIntBase128: big-endian groups of seven bits, high bit set on
/// all but the last byte, no leading zero groups.
fn write_base128(out: &mut ByteWriter, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.u8(groups[i] | continuation);
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let mut writer = CompressorWriter::new(
        Vec::with_capacity(data.len() / 2),
        BROTLI_BUFFER,
        BROTLI_QUALITY,
        BROTLI_WINDOW,
    );
    writer.write_all(data).map_err(TranscodeError::Compression)?;
    Ok(writer.into_inner())
}
