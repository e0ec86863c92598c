//! The composite SVG font document.
//!
//! [`CompositeFontDocument`] is the hand-off point between composition and
//! transcoding: the composer serializes it as an SVG 1.1 font, and the TTF
//! stage parses it back from those bytes.

use std::fmt::Write as _;

use kurbo::{BezPath, PathEl};
use roxmltree::{Document, Node, ParsingOptions};

use crate::error::TranscodeError;

/// One glyph of the composite document, already in font units (y up).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentGlyph {
    pub name: String,
    pub code_point: char,
    pub advance: f64,
    pub path: BezPath,
}

/// A vector font holding every glyph of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFontDocument {
    /// Identifier of the `<font>` element, also used as PostScript name.
    pub font_id: String,
    pub family_name: String,
    pub units_per_em: u16,
    pub ascent: f64,
    /// Depth below the baseline, as a positive number.
    pub descent: f64,
    /// Default advance width.
    pub advance: f64,
    pub missing_advance: f64,
    pub glyphs: Vec<DocumentGlyph>,
}

impl CompositeFontDocument {
    /// Finds a glyph by name.
    pub fn glyph(&self, name: &str) -> Option<&DocumentGlyph> {
        self.glyphs.iter().find(|glyph| glyph.name == name)
    }

    /// Serializes the document as an SVG font.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" standalone=\"no\"?>\n");
        out.push_str(
            "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\" >\n",
        );
        out.push_str("<svg xmlns=\"http://www.w3.org/2000/svg\">\n<defs>\n");
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "  <font id=\"{}\" horiz-adv-x=\"{}\">",
            escape(&self.font_id),
            number(self.advance)
        );
        let _ = writeln!(
            out,
            "    <font-face font-family=\"{}\" units-per-em=\"{}\" ascent=\"{}\" descent=\"{}\" />",
            escape(&self.family_name),
            self.units_per_em,
            number(self.ascent),
            number(-self.descent)
        );
        let _ = writeln!(
            out,
            "    <missing-glyph horiz-adv-x=\"{}\" />",
            number(self.missing_advance)
        );
        for glyph in &self.glyphs {
            let _ = writeln!(
                out,
                "    <glyph glyph-name=\"{}\" unicode=\"&#x{:X};\" horiz-adv-x=\"{}\" d=\"{}\" />",
                escape(&glyph.name),
                glyph.code_point as u32,
                number(glyph.advance),
                path_data(&glyph.path)
            );
        }
        out.push_str("  </font>\n</defs>\n</svg>\n");
        out
    }

    /// Parses an SVG font from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TranscodeError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| TranscodeError::Document(format!("not UTF-8: {e}")))?;
        Self::parse(text)
    }

    /// Parses an SVG font document.
    pub fn parse(text: &str) -> Result<Self, TranscodeError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let xml = Document::parse_with_options(text, options)?;

        let font = xml
            .descendants()
            .find(|n| n.has_tag_name("font"))
            .ok_or_else(|| TranscodeError::Document("no <font> element".into()))?;
        let face = font
            .children()
            .find(|n| n.has_tag_name("font-face"))
            .ok_or_else(|| TranscodeError::Document("no <font-face> element".into()))?;

        let units_per_em = attr_number(face, "units-per-em")?.unwrap_or(1000.0);
        if !(16.0..=16384.0).contains(&units_per_em) {
            return Err(TranscodeError::Document(format!(
                "units-per-em {units_per_em} is out of range"
            )));
        }
        let ascent = attr_number(face, "ascent")?.unwrap_or(units_per_em);
        let descent = attr_number(face, "descent")?.unwrap_or(0.0).abs();
        let advance = attr_number(font, "horiz-adv-x")?.unwrap_or(units_per_em);
        let missing_advance = match font.children().find(|n| n.has_tag_name("missing-glyph")) {
            Some(missing) => attr_number(missing, "horiz-adv-x")?.unwrap_or(advance),
            None => advance,
        };

        let glyphs = font
            .children()
            .filter(|n| n.has_tag_name("glyph"))
            .map(|node| parse_glyph(node, advance))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            font_id: font.attribute("id").unwrap_or_default().to_string(),
            family_name: face.attribute("font-family").unwrap_or_default().to_string(),
            units_per_em: units_per_em.round() as u16,
            ascent,
            descent,
            advance,
            missing_advance,
            glyphs,
        })
    }
}

fn parse_glyph(node: Node<'_, '_>, default_advance: f64) -> Result<DocumentGlyph, TranscodeError> {
    let name = node
        .attribute("glyph-name")
        .ok_or_else(|| TranscodeError::Document("glyph without glyph-name".into()))?
        .to_string();

    let mut chars = node.attribute("unicode").unwrap_or_default().chars();
    let code_point = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return Err(TranscodeError::Document(format!(
                "glyph `{name}` must map exactly one code point"
            )));
        }
    };

    let advance = attr_number(node, "horiz-adv-x")?.unwrap_or(default_advance);
    let path = match node.attribute("d") {
        Some(d) if !d.trim().is_empty() => {
            BezPath::from_svg(d).map_err(|e| TranscodeError::GlyphOutline {
                name: name.clone(),
                reason: e.to_string(),
            })?
        }
        _ => BezPath::new(),
    };

    Ok(DocumentGlyph {
        name,
        code_point,
        advance,
        path,
    })
}

fn attr_number(node: Node<'_, '_>, attr: &str) -> Result<Option<f64>, TranscodeError> {
    match node.attribute(attr) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| TranscodeError::Document(format!("invalid {attr}=\"{raw}\""))),
    }
}

// ============================================================================
// Serialization Helpers
// ============================================================================

/// Formats a coordinate with at most three decimals and no trailing zeros.
fn number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".into();
    }
    let text = format!("{rounded:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Serializes a path with absolute commands only.
fn path_data(path: &BezPath) -> String {
    let mut out = String::new();
    for el in path.elements() {
        if !out.is_empty() {
            out.push(' ');
        }
        match *el {
            PathEl::MoveTo(p) => {
                let _ = write!(out, "M{} {}", number(p.x), number(p.y));
            }
            PathEl::LineTo(p) => {
                let _ = write!(out, "L{} {}", number(p.x), number(p.y));
            }
            PathEl::QuadTo(c, p) => {
                let _ = write!(out, "Q{} {} {} {}", number(c.x), number(c.y), number(p.x), number(p.y));
            }
            PathEl::CurveTo(c1, c2, p) => {
                let _ = write!(
                    out,
                    "C{} {} {} {} {} {}",
                    number(c1.x),
                    number(c1.y),
                    number(c2.x),
                    number(c2.y),
                    number(p.x),
                    number(p.y)
                );
            }
            PathEl::ClosePath => out.push('Z'),
        }
    }
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
