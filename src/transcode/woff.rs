//! TrueType to WOFF 1.0.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::FontBytes;
use super::sfnt::{ByteWriter, SfntReader, padded_len};
use crate::error::TranscodeError;

const SIGNATURE: &[u8; 4] = b"wOFF";
const HEADER_LEN: usize = 44;
const ENTRY_LEN: usize = 20;

/// Repackages TrueType bytes as WOFF, zlib-compressing each table when
/// that makes it smaller.
pub fn ttf_to_woff(ttf: &[u8]) -> Result<FontBytes, TranscodeError> {
    let font = SfntReader::parse(ttf)?;
    let records = font.records();

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let data = font.table_data(record);
        let compressed = deflate(data)?;
        let stored = if compressed.len() < data.len() {
            compressed
        } else {
            data.to_vec()
        };
        entries.push((record, stored));
    }

    let mut offset = HEADER_LEN + ENTRY_LEN * entries.len();
    let mut directory = ByteWriter::with_capacity(ENTRY_LEN * entries.len());
    for (record, stored) in &entries {
        directory
            .bytes(&record.tag)
            .u32(offset as u32)
            .u32(stored.len() as u32)
            .u32(record.length as u32)
            .u32(record.checksum);
        offset += padded_len(stored.len());
    }
    let total = offset;

    let mut out = ByteWriter::with_capacity(total);
    out.bytes(SIGNATURE)
        .u32(font.flavor())
        .u32(total as u32)
        .u16(entries.len() as u16)
        .u16(0)
        .u32(font.total_sfnt_size() as u32)
        .u16(1) // majorVersion
        .u16(0)
        .u32(0) // no metadata
        .u32(0)
        .u32(0)
        .u32(0) // no private data
        .u32(0)
        .bytes(&directory.into_inner());
    for (_, stored) in &entries {
        out.bytes(stored).align4();
    }

    Ok(FontBytes::from(out.into_inner()))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::default());
    encoder.write_all(data).map_err(TranscodeError::Compression)?;
    encoder.finish().map_err(TranscodeError::Compression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::sfnt::{self, Table};
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn be32(data: &[u8], offset: usize) -> usize {
        u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]) as usize
    }

    fn sample_font() -> Vec<u8> {
        let mut head = vec![0u8; 54];
        head[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        sfnt::assemble(vec![
            Table::new(sfnt::HEAD, head),
            Table::new(*b"glyf", vec![7u8; 400]),
            Table::new(*b"name", vec![1, 2, 3]),
        ])
    }

    #[test]
    fn tables_inflate_back_to_the_source() {
        let ttf = sample_font();
        let woff = ttf_to_woff(&ttf).unwrap();
        let source = SfntReader::parse(&ttf).unwrap();

        assert_eq!(&woff[..4], SIGNATURE);
        assert_eq!(be32(&woff, 8), woff.len());
        assert_eq!(be32(&woff, 16), ttf.len());
        assert_eq!(woff.len() % 4, 0);

        let count = u16::from_be_bytes([woff[12], woff[13]]) as usize;
        assert_eq!(count, 3);

        for i in 0..count {
            let entry = HEADER_LEN + ENTRY_LEN * i;
            let tag = &woff[entry..entry + 4];
            let offset = be32(&woff, entry + 4);
            let comp_len = be32(&woff, entry + 8);
            let orig_len = be32(&woff, entry + 12);
            let stored = &woff[offset..offset + comp_len];

            let table = if comp_len < orig_len {
                let mut inflated = Vec::new();
                ZlibDecoder::new(stored).read_to_end(&mut inflated).unwrap();
                inflated
            } else {
                stored.to_vec()
            };

            let tag: [u8; 4] = tag.try_into().unwrap();
            assert_eq!(Some(&table[..]), source.table(tag));
        }
    }

    #[test]
    fn incompressible_tables_are_stored_as_is() {
        let ttf = sample_font();
        let woff = ttf_to_woff(&ttf).unwrap();

        // Directory is sorted by tag: glyf, head, name.
        let name_entry = HEADER_LEN + ENTRY_LEN * 2;
        assert_eq!(&woff[name_entry..name_entry + 4], b"name");
        assert_eq!(be32(&woff, name_entry + 8), 3);

        let glyf_entry = HEADER_LEN;
        assert!(be32(&woff, glyf_entry + 8) < 400);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ttf_to_woff(b"not a font").is_err());
    }
}
