//! TrueType to Embedded OpenType (version 2.1, uncompressed).

use super::FontBytes;
use super::sfnt::{self, ByteWriter, SfntReader};
use crate::error::TranscodeError;

const VERSION: u32 = 0x0002_0001;
const MAGIC: u16 = 0x504C;
const DEFAULT_CHARSET: u8 = 1;

/// Name IDs copied into the header, in header order: family, subfamily,
/// version, full name.
const HEADER_NAMES: [u16; 4] = [1, 2, 5, 4];

/// Wraps TrueType bytes in an EOT header.
pub fn ttf_to_eot(ttf: &[u8]) -> Result<FontBytes, TranscodeError> {
    let font = SfntReader::parse(ttf)?;
    let os2 = font
        .table(*b"OS/2")
        .ok_or_else(|| TranscodeError::Sfnt("missing OS/2 table".into()))?;
    let head = font
        .table(sfnt::HEAD)
        .ok_or_else(|| TranscodeError::Sfnt("missing head table".into()))?;
    let names = match font.table(*b"name") {
        Some(table) => header_names(table)?,
        None => Default::default(),
    };

    let mut out = ByteWriter::with_capacity(ttf.len() + 256);
    out.u32_le(0) // EOTSize, patched below
        .u32_le(ttf.len() as u32)
        .u32_le(VERSION)
        .u32_le(0) // flags: no compression, no obfuscation
        .bytes(sfnt::read_bytes(os2, 32, 10)?) // PANOSE
        .u8(DEFAULT_CHARSET)
        .u8((sfnt::read_u16(os2, 62)? & 0x01) as u8) // fsSelection ITALIC
        .u32_le(sfnt::read_u16(os2, 4)? as u32) // usWeightClass
        .u16_le(sfnt::read_u16(os2, 8)?) // fsType
        .u16_le(MAGIC);
    for i in 0..4 {
        out.u32_le(sfnt::read_u32(os2, 42 + 4 * i)?);
    }
    out.u32_le(sfnt::read_u32(os2, 78)?)
        .u32_le(sfnt::read_u32(os2, 82)?)
        .u32_le(sfnt::read_u32(head, 8)?) // checkSumAdjustment
        .u32_le(0)
        .u32_le(0)
        .u32_le(0)
        .u32_le(0)
        .u16_le(0); // Padding1

    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.u16_le(0);
        }
        out.u16_le(name.len() as u16).bytes(name);
    }
    out.u16_le(0) // Padding5
        .u16_le(0) // RootStringSize
        .bytes(ttf);

    let mut bytes = out.into_inner();
    let size = (bytes.len() as u32).to_le_bytes();
    bytes[..4].copy_from_slice(&size);
    Ok(FontBytes::from(bytes))
}

/// Reads the Windows English names, converted to UTF-16LE.
fn header_names(table: &[u8]) -> Result<[Vec<u8>; 4], TranscodeError> {
    let count = sfnt::read_u16(table, 2)? as usize;
    let storage = sfnt::read_u16(table, 4)? as usize;
    let mut names: [Vec<u8>; 4] = Default::default();

    for i in 0..count {
        let record = 6 + 12 * i;
        let platform = sfnt::read_u16(table, record)?;
        let encoding = sfnt::read_u16(table, record + 2)?;
        let language = sfnt::read_u16(table, record + 4)?;
        let name_id = sfnt::read_u16(table, record + 6)?;
        if (platform, encoding, language) != (3, 1, 0x0409) {
            continue;
        }
        let Some(slot) = HEADER_NAMES.iter().position(|id| *id == name_id) else {
            continue;
        };

        let length = sfnt::read_u16(table, record + 8)? as usize;
        let offset = sfnt::read_u16(table, record + 10)? as usize;
        let text = sfnt::read_bytes(table, storage + offset, length)?;
        names[slot] = text
            .chunks_exact(2)
            .flat_map(|pair| [pair[1], pair[0]])
            .collect();
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::document::{CompositeFontDocument, DocumentGlyph};
    use crate::transcode::{TtfOptions, ttf};
    use kurbo::BezPath;

    fn sample_ttf() -> FontBytes {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1000.0, 0.0));
        path.line_to((500.0, 1000.0));
        path.close_path();
        let document = CompositeFontDocument {
            font_id: "Eot".into(),
            family_name: "Eot Test".into(),
            units_per_em: 1000,
            ascent: 1000.0,
            descent: 0.0,
            advance: 1000.0,
            missing_advance: 0.0,
            glyphs: vec![DocumentGlyph {
                name: "Triangle".into(),
                code_point: '\u{E614}',
                advance: 1000.0,
                path,
            }],
        };
        ttf::document_to_ttf(&document, &TtfOptions::default()).unwrap()
    }

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn header_describes_the_embedded_font() {
        let ttf = sample_ttf();
        let eot = ttf_to_eot(&ttf).unwrap();

        let u32_at = |o: usize| u32::from_le_bytes([eot[o], eot[o + 1], eot[o + 2], eot[o + 3]]);
        let u16_at = |o: usize| u16::from_le_bytes([eot[o], eot[o + 1]]);

        assert_eq!(u32_at(0) as usize, eot.len());
        assert_eq!(u32_at(4) as usize, ttf.len());
        assert_eq!(u32_at(8), VERSION);
        assert_eq!(u16_at(34), MAGIC);
        assert_eq!(u32_at(28), 400);
        assert!(eot.ends_with(&ttf));

        let family = utf16le("Eot Test");
        assert_eq!(u16_at(82) as usize, family.len());
        assert_eq!(&eot[84..84 + family.len()], &family[..]);

        let style = utf16le("Regular");
        let style_at = 84 + family.len() + 2;
        assert_eq!(u16_at(style_at) as usize, style.len());
        assert_eq!(&eot[style_at + 2..style_at + 2 + style.len()], &style[..]);
    }

    #[test]
    fn rejects_fonts_without_os2() {
        let font = sfnt::assemble(vec![sfnt::Table::new(sfnt::HEAD, vec![0; 54])]);
        let err = ttf_to_eot(&font).unwrap_err();
        assert!(err.to_string().contains("OS/2"));
    }
}
