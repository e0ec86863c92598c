//! SVG font to TrueType conversion.
//!
//! Glyph 0 is `.notdef`; document glyphs follow in document order. Cubic
//! segments are approximated with quadratic ones, and every coordinate is
//! rounded to an integer font unit.

use kurbo::{BezPath, CubicBez, PathEl, Point};

use super::sfnt::{self, ByteWriter, Table};
use super::{FontBytes, TtfOptions};
use crate::compose::document::{CompositeFontDocument, DocumentGlyph};
use crate::error::TranscodeError;

/// Maximum distance between a cubic and its quadratic approximation, in font units.
const QUAD_ACCURACY: f64 = 0.3;

/// Seconds between 1904-01-01 (TrueType epoch) and 1970-01-01.
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

/// Converts a serialized composite font document into TrueType bytes.
pub fn svg_to_ttf(svg: &[u8], options: &TtfOptions) -> Result<FontBytes, TranscodeError> {
    let document = CompositeFontDocument::from_bytes(svg)?;
    document_to_ttf(&document, options)
}

/// Converts a parsed composite font document into TrueType bytes.
pub fn document_to_ttf(
    document: &CompositeFontDocument,
    options: &TtfOptions,
) -> Result<FontBytes, TranscodeError> {
    let glyph_count = document.glyphs.len() + 1;
    if glyph_count > u16::MAX as usize {
        return Err(TranscodeError::TooManyGlyphs(glyph_count));
    }

    let mut glyphs = Vec::with_capacity(glyph_count);
    glyphs.push(TtGlyph::empty(".notdef".into(), None, round_unit(document.missing_advance)));
    for glyph in &document.glyphs {
        glyphs.push(TtGlyph::from_document(glyph)?);
    }

    let font = FontMetrics::measure(document, &glyphs);
    let (glyf, loca) = build_glyf_loca(&glyphs);

    let tables = vec![
        Table::new(*b"OS/2", build_os2(&font, &glyphs)),
        Table::new(*b"cmap", build_cmap(&glyphs)?),
        Table::new(*b"glyf", glyf),
        Table::new(sfnt::HEAD, build_head(&font, options)),
        Table::new(*b"hhea", build_hhea(&font, &glyphs)),
        Table::new(*b"hmtx", build_hmtx(&glyphs)),
        Table::new(*b"loca", loca),
        Table::new(*b"maxp", build_maxp(&glyphs)),
        Table::new(*b"name", build_name(document, options)),
        Table::new(*b"post", build_post(&font, &glyphs)),
    ];

    Ok(FontBytes::from(sfnt::assemble(tables)))
}

// ============================================================================
// Glyphs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TtPoint {
    x: i16,
    y: i16,
    on_curve: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BBox {
    x_min: i16,
    y_min: i16,
    x_max: i16,
    y_max: i16,
}

#[derive(Debug)]
struct TtGlyph {
    name: String,
    code_point: Option<char>,
    advance: u16,
    contours: Vec<Vec<TtPoint>>,
    bbox: Option<BBox>,
}

impl TtGlyph {
    fn empty(name: String, code_point: Option<char>, advance: u16) -> Self {
        Self {
            name,
            code_point,
            advance,
            contours: Vec::new(),
            bbox: None,
        }
    }

    fn from_document(glyph: &DocumentGlyph) -> Result<Self, TranscodeError> {
        let contours = to_contours(&glyph.path)
            .and_then(|contours| check_deltas(&contours).map(|()| contours))
            .map_err(|reason| TranscodeError::GlyphOutline {
                name: glyph.name.clone(),
                reason,
            })?;
        let bbox = bounding_box(&contours);
        Ok(Self {
            name: glyph.name.clone(),
            code_point: Some(glyph.code_point),
            advance: round_unit(glyph.advance),
            contours,
            bbox,
        })
    }

    fn point_count(&self) -> usize {
        self.contours.iter().map(Vec::len).sum()
    }

    fn lsb(&self) -> i16 {
        self.bbox.map_or(0, |b| b.x_min)
    }
}

fn round_unit(value: f64) -> u16 {
    value.round().clamp(0.0, u16::MAX as f64) as u16
}

fn round_point(p: Point, on_curve: bool) -> Result<TtPoint, String> {
    let coord = |v: f64| {
        let r = v.round();
        if r.is_finite() && r >= i16::MIN as f64 && r <= i16::MAX as f64 {
            Ok(r as i16)
        } else {
            Err(format!("coordinate {v} does not fit in a TrueType glyph"))
        }
    };
    Ok(TtPoint {
        x: coord(p.x)?,
        y: coord(p.y)?,
        on_curve,
    })
}

/// Converts a path into closed quadratic contours.
fn to_contours(path: &BezPath) -> Result<Vec<Vec<TtPoint>>, String> {
    let mut contours = Vec::new();
    let mut current: Vec<TtPoint> = Vec::new();
    let mut last = Point::ZERO;

    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                finish_contour(&mut current, &mut contours);
                current.push(round_point(p, true)?);
                last = p;
            }
            PathEl::LineTo(p) => {
                start_if_needed(&mut current, last)?;
                push_point(&mut current, round_point(p, true)?);
                last = p;
            }
            PathEl::QuadTo(c, p) => {
                start_if_needed(&mut current, last)?;
                current.push(round_point(c, false)?);
                current.push(round_point(p, true)?);
                last = p;
            }
            PathEl::CurveTo(c1, c2, p) => {
                start_if_needed(&mut current, last)?;
                for (_, _, quad) in CubicBez::new(last, c1, c2, p).to_quads(QUAD_ACCURACY) {
                    current.push(round_point(quad.p1, false)?);
                    current.push(round_point(quad.p2, true)?);
                }
                last = p;
            }
            PathEl::ClosePath => finish_contour(&mut current, &mut contours),
        }
    }
    finish_contour(&mut current, &mut contours);
    Ok(contours)
}

fn start_if_needed(current: &mut Vec<TtPoint>, last: Point) -> Result<(), String> {
    if current.is_empty() {
        current.push(round_point(last, true)?);
    }
    Ok(())
}

/// Appends an on-curve point, skipping exact repeats.
fn push_point(current: &mut Vec<TtPoint>, point: TtPoint) {
    if current.last() != Some(&point) {
        current.push(point);
    }
}

fn finish_contour(current: &mut Vec<TtPoint>, contours: &mut Vec<Vec<TtPoint>>) {
    let mut contour = std::mem::take(current);
    // Closing back onto the start point is implicit in TrueType.
    if contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }
    if contour.len() >= 2 {
        contours.push(contour);
    }
}

/// Rejects consecutive points too far apart for a 16-bit glyf delta.
fn check_deltas(contours: &[Vec<TtPoint>]) -> Result<(), String> {
    let (mut prev_x, mut prev_y) = (0i32, 0i32);
    for point in contours.iter().flatten() {
        let (x, y) = (point.x as i32, point.y as i32);
        if (x - prev_x).abs() > i16::MAX as i32 || (y - prev_y).abs() > i16::MAX as i32 {
            return Err(format!(
                "points ({prev_x}, {prev_y}) and ({x}, {y}) are too far apart for a TrueType glyph"
            ));
        }
        (prev_x, prev_y) = (x, y);
    }
    Ok(())
}

fn bounding_box(contours: &[Vec<TtPoint>]) -> Option<BBox> {
    let mut points = contours.iter().flatten();
    let first = points.next()?;
    let init = BBox {
        x_min: first.x,
        y_min: first.y,
        x_max: first.x,
        y_max: first.y,
    };
    Some(points.fold(init, |b, p| BBox {
        x_min: b.x_min.min(p.x),
        y_min: b.y_min.min(p.y),
        x_max: b.x_max.max(p.x),
        y_max: b.y_max.max(p.y),
    }))
}

/// Encodes a simple glyph description; empty glyphs encode to no bytes.
fn encode_glyph(glyph: &TtGlyph) -> Vec<u8> {
    let Some(bbox) = glyph.bbox else {
        return Vec::new();
    };

    let mut out = ByteWriter::new();
    out.i16(glyph.contours.len() as i16)
        .i16(bbox.x_min)
        .i16(bbox.y_min)
        .i16(bbox.x_max)
        .i16(bbox.y_max);

    let mut end = 0usize;
    for contour in &glyph.contours {
        end += contour.len();
        out.u16((end - 1) as u16);
    }
    out.u16(0); // no instructions

    let mut flags = Vec::new();
    let mut xs = ByteWriter::new();
    let mut ys = ByteWriter::new();
    let (mut prev_x, mut prev_y) = (0i32, 0i32);

    for point in glyph.contours.iter().flatten() {
        let mut flag = if point.on_curve { ON_CURVE } else { 0 };
        let dx = point.x as i32 - prev_x;
        let dy = point.y as i32 - prev_y;
        flag |= encode_delta(dx, X_SHORT, X_SAME_OR_POSITIVE, &mut xs);
        flag |= encode_delta(dy, Y_SHORT, Y_SAME_OR_POSITIVE, &mut ys);
        flags.push(flag);
        prev_x = point.x as i32;
        prev_y = point.y as i32;
    }

    out.bytes(&flags).bytes(&xs.into_inner()).bytes(&ys.into_inner());
    out.into_inner()
}

fn encode_delta(delta: i32, short: u8, same_or_positive: u8, out: &mut ByteWriter) -> u8 {
    if delta == 0 {
        same_or_positive
    } else if delta.abs() <= 255 {
        out.u8(delta.unsigned_abs() as u8);
        if delta > 0 { short | same_or_positive } else { short }
    } else {
        out.i16(delta as i16);
        0
    }
}

// ============================================================================
// Font-wide Metrics
// ============================================================================

#[derive(Debug)]
struct FontMetrics {
    units_per_em: u16,
    ascent: i16,
    descent: i16,
    bbox: BBox,
    max_advance: u16,
}

impl FontMetrics {
    fn measure(document: &CompositeFontDocument, glyphs: &[TtGlyph]) -> Self {
        let boxes: Vec<BBox> = glyphs.iter().filter_map(|g| g.bbox).collect();
        let bbox = boxes
            .iter()
            .copied()
            .reduce(|a, b| BBox {
                x_min: a.x_min.min(b.x_min),
                y_min: a.y_min.min(b.y_min),
                x_max: a.x_max.max(b.x_max),
                y_max: a.y_max.max(b.y_max),
            })
            .unwrap_or(BBox {
                x_min: 0,
                y_min: 0,
                x_max: 0,
                y_max: 0,
            });

        Self {
            units_per_em: document.units_per_em,
            ascent: clamp_i16(document.ascent),
            descent: -clamp_i16(document.descent),
            bbox,
            max_advance: glyphs.iter().map(|g| g.advance).max().unwrap_or(0),
        }
    }

    fn scaled(&self, per_mille: i32) -> i16 {
        (self.units_per_em as i32 * per_mille / 1000) as i16
    }
}

fn clamp_i16(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

// ============================================================================
// Tables
// ============================================================================

fn build_glyf_loca(glyphs: &[TtGlyph]) -> (Vec<u8>, Vec<u8>) {
    let mut glyf = ByteWriter::new();
    let mut loca = ByteWriter::new();
    for glyph in glyphs {
        loca.u32(glyf.len() as u32);
        glyf.bytes(&encode_glyph(glyph)).align4();
    }
    loca.u32(glyf.len() as u32);
    (glyf.into_inner(), loca.into_inner())
}

fn build_head(font: &FontMetrics, options: &TtfOptions) -> Vec<u8> {
    let timestamp = options.timestamp + MAC_EPOCH_OFFSET;
    let mut out = ByteWriter::with_capacity(54);
    out.u32(0x0001_0000)
        .u32(options.font_revision())
        .u32(0) // checkSumAdjustment, filled in on assembly
        .u32(0x5F0F_3CF5)
        .u16(0x000B) // baseline at y=0, lsb at x=0, integer ppem
        .u16(font.units_per_em)
        .i64(timestamp)
        .i64(timestamp)
        .i16(font.bbox.x_min)
        .i16(font.bbox.y_min)
        .i16(font.bbox.x_max)
        .i16(font.bbox.y_max)
        .u16(0) // macStyle
        .u16(8) // lowestRecPPEM
        .i16(2) // fontDirectionHint
        .i16(1) // long loca offsets
        .i16(0);
    out.into_inner()
}

fn build_hhea(font: &FontMetrics, glyphs: &[TtGlyph]) -> Vec<u8> {
    let outlined: Vec<&TtGlyph> = glyphs.iter().filter(|g| g.bbox.is_some()).collect();
    let min_lsb = outlined.iter().map(|g| g.lsb()).min().unwrap_or(0);
    let min_rsb = outlined
        .iter()
        .filter_map(|g| g.bbox.map(|b| g.advance as i32 - b.x_max as i32))
        .min()
        .unwrap_or(0);
    let max_extent = outlined
        .iter()
        .filter_map(|g| g.bbox.map(|b| b.x_max))
        .max()
        .unwrap_or(0);

    let mut out = ByteWriter::with_capacity(36);
    out.u32(0x0001_0000)
        .i16(font.ascent)
        .i16(font.descent)
        .i16(0) // lineGap
        .u16(font.max_advance)
        .i16(min_lsb)
        .i16(min_rsb.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
        .i16(max_extent)
        .i16(1) // caretSlopeRise
        .i16(0) // caretSlopeRun
        .i16(0) // caretOffset
        .i16(0)
        .i16(0)
        .i16(0)
        .i16(0)
        .i16(0) // metricDataFormat
        .u16(glyphs.len() as u16);
    out.into_inner()
}

fn build_hmtx(glyphs: &[TtGlyph]) -> Vec<u8> {
    let mut out = ByteWriter::with_capacity(glyphs.len() * 4);
    for glyph in glyphs {
        out.u16(glyph.advance).i16(glyph.lsb());
    }
    out.into_inner()
}

fn build_maxp(glyphs: &[TtGlyph]) -> Vec<u8> {
    let max_points = glyphs.iter().map(TtGlyph::point_count).max().unwrap_or(0);
    let max_contours = glyphs.iter().map(|g| g.contours.len()).max().unwrap_or(0);

    let mut out = ByteWriter::with_capacity(32);
    out.u32(0x0001_0000)
        .u16(glyphs.len() as u16)
        .u16(max_points.min(u16::MAX as usize) as u16)
        .u16(max_contours.min(u16::MAX as usize) as u16)
        .u16(0) // maxCompositePoints
        .u16(0) // maxCompositeContours
        .u16(2) // maxZones
        .u16(0)
        .u16(0)
        .u16(0)
        .u16(0)
        .u16(0)
        .u16(0)
        .u16(0)
        .u16(0);
    out.into_inner()
}

fn build_os2(font: &FontMetrics, glyphs: &[TtGlyph]) -> Vec<u8> {
    let advances: Vec<u32> = glyphs.iter().map(|g| g.advance as u32).filter(|a| *a > 0).collect();
    let avg_width = if advances.is_empty() {
        0
    } else {
        (advances.iter().sum::<u32>() / advances.len() as u32) as i16
    };

    let code_points: Vec<u32> = glyphs.iter().filter_map(|g| g.code_point).map(|c| c as u32).collect();
    let first_char = code_points.iter().min().copied().unwrap_or(0).min(0xFFFF) as u16;
    let last_char = code_points.iter().max().copied().unwrap_or(0).min(0xFFFF) as u16;

    let mut unicode_range = [0u32; 4];
    if code_points.iter().any(|&c| (0xE000..=0xF8FF).contains(&c)) {
        unicode_range[1] |= 1 << (60 - 32); // Private Use Area
    }
    if code_points.iter().any(|&c| c > 0xFFFF) {
        unicode_range[1] |= 1 << (57 - 32); // Non-Plane 0
        unicode_range[2] |= 1 << (90 - 64); // Private Use (planes 15 and 16)
    }

    let win_ascent = font.ascent.max(font.bbox.y_max).max(0) as u16;
    let win_descent = (-(font.descent.min(font.bbox.y_min) as i32)).max(0) as u16;

    let mut out = ByteWriter::with_capacity(96);
    out.u16(4) // version
        .i16(avg_width)
        .u16(400) // usWeightClass
        .u16(5) // usWidthClass
        .u16(0) // fsType: installable
        .i16(font.scaled(650))
        .i16(font.scaled(600))
        .i16(0)
        .i16(font.scaled(75))
        .i16(font.scaled(650))
        .i16(font.scaled(600))
        .i16(0)
        .i16(font.scaled(350))
        .i16(font.scaled(50))
        .i16(font.scaled(250))
        .i16(0) // sFamilyClass
        .bytes(&[2, 0, 5, 3, 0, 0, 0, 0, 0, 0]); // PANOSE: Latin text, book weight
    for range in unicode_range {
        out.u32(range);
    }
    out.bytes(b"UKWN")
        .u16(0x0040) // fsSelection: REGULAR
        .u16(first_char)
        .u16(last_char)
        .i16(font.ascent)
        .i16(font.descent)
        .i16(0) // sTypoLineGap
        .u16(win_ascent)
        .u16(win_descent)
        .u32(1) // ulCodePageRange1: Latin 1
        .u32(0)
        .i16(0) // sxHeight
        .i16(0) // sCapHeight
        .u16(0) // usDefaultChar
        .u16(0x20) // usBreakChar
        .u16(0); // usMaxContext
    out.into_inner()
}

fn build_cmap(glyphs: &[TtGlyph]) -> Result<Vec<u8>, TranscodeError> {
    let mut mappings: Vec<(u32, u16)> = glyphs
        .iter()
        .enumerate()
        .filter_map(|(gid, g)| g.code_point.map(|c| (c as u32, gid as u16)))
        .collect();
    mappings.sort_unstable();
    if let Some(pair) = mappings.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(TranscodeError::Document(format!(
            "code point U+{:04X} is mapped twice",
            pair[0].0
        )));
    }

    let bmp: Vec<(u32, u16)> = mappings.iter().copied().filter(|(c, _)| *c <= 0xFFFF).collect();
    let format4 = build_cmap_format4(&bmp);
    let format12 = mappings
        .iter()
        .any(|(c, _)| *c > 0xFFFF)
        .then(|| build_cmap_format12(&mappings));

    // (platform, encoding, subtable index)
    let mut records: Vec<(u16, u16, usize)> = vec![(0, 3, 0), (3, 1, 0)];
    let mut subtables = vec![format4];
    if let Some(format12) = format12 {
        records.extend([(0, 4, 1), (3, 10, 1)]);
        subtables.push(format12);
    }
    records.sort_unstable();

    let header_len = 4 + 8 * records.len();
    let mut offsets = Vec::with_capacity(subtables.len());
    let mut offset = header_len;
    for subtable in &subtables {
        offsets.push(offset as u32);
        offset += subtable.len();
    }

    let mut out = ByteWriter::with_capacity(offset);
    out.u16(0).u16(records.len() as u16);
    for (platform, encoding, index) in &records {
        out.u16(*platform).u16(*encoding).u32(offsets[*index]);
    }
    for subtable in &subtables {
        out.bytes(subtable);
    }
    Ok(out.into_inner())
}

/// Runs of consecutive code points mapped to consecutive glyph ids.
fn runs(mappings: &[(u32, u16)]) -> Vec<(u32, u32, u16)> {
    let mut runs: Vec<(u32, u32, u16)> = Vec::new();
    for &(code, gid) in mappings {
        match runs.last_mut() {
            Some((start, end, first_gid))
                if code == *end + 1 && gid as u32 == *first_gid as u32 + (code - *start) =>
            {
                *end = code;
            }
            _ => runs.push((code, code, gid)),
        }
    }
    runs
}

fn build_cmap_format4(mappings: &[(u32, u16)]) -> Vec<u8> {
    let mut segments: Vec<(u16, u16, u16)> = runs(mappings)
        .into_iter()
        .map(|(start, end, gid)| (start as u16, end as u16, (gid as u32).wrapping_sub(start) as u16))
        .collect();
    if segments.last().is_none_or(|(_, end, _)| *end != 0xFFFF) {
        segments.push((0xFFFF, 0xFFFF, 1));
    }

    let seg_count = segments.len() as u16;
    let (search_range, entry_selector, range_shift) = sfnt::search_params(seg_count, 2);
    let length = 16 + 8 * segments.len();

    let mut out = ByteWriter::with_capacity(length);
    out.u16(4)
        .u16(length as u16)
        .u16(0) // language
        .u16(seg_count * 2)
        .u16(search_range)
        .u16(entry_selector)
        .u16(range_shift);
    for (_, end, _) in &segments {
        out.u16(*end);
    }
    out.u16(0); // reservedPad
    for (start, _, _) in &segments {
        out.u16(*start);
    }
    for (_, _, delta) in &segments {
        out.u16(*delta);
    }
    for _ in &segments {
        out.u16(0); // idRangeOffset
    }
    out.into_inner()
}

fn build_cmap_format12(mappings: &[(u32, u16)]) -> Vec<u8> {
    let groups = runs(mappings);
    let length = 16 + 12 * groups.len();

    let mut out = ByteWriter::with_capacity(length);
    out.u16(12)
        .u16(0)
        .u32(length as u32)
        .u32(0) // language
        .u32(groups.len() as u32);
    for (start, end, gid) in groups {
        out.u32(start).u32(end).u32(gid as u32);
    }
    out.into_inner()
}

fn build_name(document: &CompositeFontDocument, options: &TtfOptions) -> Vec<u8> {
    let family = if document.family_name.is_empty() {
        document.font_id.as_str()
    } else {
        document.family_name.as_str()
    };
    let ps_source = if document.font_id.is_empty() { family } else { document.font_id.as_str() };

    let mut entries: Vec<(u16, String)> = Vec::new();
    if let Some(copyright) = &options.copyright {
        entries.push((0, copyright.clone()));
    }
    entries.push((1, family.to_string()));
    entries.push((2, "Regular".into()));
    entries.push((3, format!("{family}:{}", options.version)));
    entries.push((4, family.to_string()));
    entries.push((5, options.version.clone()));
    entries.push((6, postscript_name(ps_source)));
    if let Some(description) = &options.description {
        entries.push((10, description.clone()));
    }
    if let Some(url) = &options.url {
        entries.push((11, url.clone()));
    }

    let encoded: Vec<(u16, Vec<u8>)> = entries
        .into_iter()
        .map(|(id, text)| (id, text.encode_utf16().flat_map(u16::to_be_bytes).collect()))
        .collect();

    let count = encoded.len();
    let string_offset = 6 + 12 * count;
    let mut out = ByteWriter::new();
    out.u16(0).u16(count as u16).u16(string_offset as u16);

    let mut offset = 0usize;
    for (id, bytes) in &encoded {
        out.u16(3) // Windows
            .u16(1) // Unicode BMP
            .u16(0x0409) // en-US
            .u16(*id)
            .u16(bytes.len() as u16)
            .u16(offset as u16);
        offset += bytes.len();
    }
    for (_, bytes) in &encoded {
        out.bytes(bytes);
    }
    out.into_inner()
}

/// Restricts a name to printable ASCII without the characters PostScript
/// reserves, at most 63 bytes.
fn postscript_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_graphic() && !"[](){}<>/%".contains(*c))
        .take(63)
        .collect();
    if cleaned.is_empty() { "Icons".into() } else { cleaned }
}

fn build_post(font: &FontMetrics, glyphs: &[TtGlyph]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    out.u32(0x0002_0000)
        .u32(0) // italicAngle
        .i16(-font.scaled(100))
        .i16(font.scaled(50))
        .u32(0) // isFixedPitch
        .u32(0)
        .u32(0)
        .u32(0)
        .u32(0)
        .u16(glyphs.len() as u16);

    let mut custom_names = Vec::new();
    for (gid, glyph) in glyphs.iter().enumerate() {
        if gid == 0 {
            out.u16(0); // standard Macintosh name ".notdef"
        } else {
            out.u16((258 + custom_names.len()) as u16);
            custom_names.push(post_glyph_name(glyph));
        }
    }
    for name in custom_names {
        out.u8(name.len() as u8).bytes(name.as_bytes());
    }
    out.into_inner()
}

fn post_glyph_name(glyph: &TtGlyph) -> String {
    let cleaned: String = glyph
        .name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
        .take(63)
        .collect();
    match (cleaned.is_empty(), glyph.code_point) {
        (false, _) => cleaned,
        (true, Some(c)) => format!("uni{:04X}", c as u32),
        (true, None) => ".notdef".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::document::DocumentGlyph;
    use ttf_parser::{Face, GlyphId, OutlineBuilder};

    #[derive(Default)]
    struct PointCounter {
        segments: usize,
        closes: usize,
    }

    impl OutlineBuilder for PointCounter {
        fn move_to(&mut self, _: f32, _: f32) {}
        fn line_to(&mut self, _: f32, _: f32) {
            self.segments += 1;
        }
        fn quad_to(&mut self, _: f32, _: f32, _: f32, _: f32) {
            self.segments += 1;
        }
        fn curve_to(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: f32) {
            self.segments += 1;
        }
        fn close(&mut self) {
            self.closes += 1;
        }
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> BezPath {
        let mut path = BezPath::new();
        path.move_to((x0, y0));
        path.line_to((x1, y0));
        path.line_to((x1, y1));
        path.line_to((x0, y1));
        path.close_path();
        path
    }

    fn circle() -> BezPath {
        let mut path = BezPath::new();
        path.move_to((960.0, 0.0));
        path.curve_to((1490.0, 0.0), (1920.0, 430.0), (1920.0, 960.0));
        path.curve_to((1920.0, 1490.0), (1490.0, 1920.0), (960.0, 1920.0));
        path.curve_to((430.0, 1920.0), (0.0, 1490.0), (0.0, 960.0));
        path.curve_to((0.0, 430.0), (430.0, 0.0), (960.0, 0.0));
        path.close_path();
        path
    }

    fn document(glyphs: Vec<DocumentGlyph>) -> CompositeFontDocument {
        CompositeFontDocument {
            font_id: "AvialaIconsOutline".into(),
            family_name: "Aviala Icons Outline".into(),
            units_per_em: 1920,
            ascent: 1920.0,
            descent: 0.0,
            advance: 1920.0,
            missing_advance: 0.0,
            glyphs,
        }
    }

    fn glyph(name: &str, code_point: char, path: BezPath) -> DocumentGlyph {
        DocumentGlyph {
            name: name.into(),
            code_point,
            advance: 1920.0,
            path,
        }
    }

    fn sample() -> CompositeFontDocument {
        document(vec![
            glyph("ArrowLeft", '\u{E614}', square(160.0, 160.0, 1760.0, 1760.0)),
            glyph("ArrowRight", '\u{E615}', circle()),
        ])
    }

    #[test]
    fn produces_a_parsable_font() {
        let ttf = document_to_ttf(&sample(), &TtfOptions::default()).unwrap();
        let face = Face::parse(&ttf, 0).unwrap();

        assert_eq!(face.number_of_glyphs(), 3);
        assert_eq!(face.units_per_em(), 1920);
        assert_eq!(face.glyph_index('\u{E614}'), Some(GlyphId(1)));
        assert_eq!(face.glyph_index('\u{E615}'), Some(GlyphId(2)));
        assert_eq!(face.glyph_index('A'), None);
        assert_eq!(face.glyph_name(GlyphId(0)), Some(".notdef"));
        assert_eq!(face.glyph_name(GlyphId(1)), Some("ArrowLeft"));
        assert_eq!(face.glyph_name(GlyphId(2)), Some("ArrowRight"));
        assert_eq!(face.glyph_hor_advance(GlyphId(1)), Some(1920));
        assert_eq!(face.ascender(), 1920);
    }

    #[test]
    fn outlines_survive_conversion() {
        let ttf = document_to_ttf(&sample(), &TtfOptions::default()).unwrap();
        let face = Face::parse(&ttf, 0).unwrap();

        let mut counter = PointCounter::default();
        let bbox = face.outline_glyph(GlyphId(1), &mut counter).unwrap();
        assert_eq!((bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max), (160, 160, 1760, 1760));
        assert_eq!(counter.closes, 1);
        assert!(counter.segments >= 3);

        let mut counter = PointCounter::default();
        let bbox = face.outline_glyph(GlyphId(2), &mut counter).unwrap();
        assert_eq!(counter.closes, 1);
        assert!(counter.segments >= 4);
        assert!(bbox.x_min.abs() <= 1 && (bbox.x_max - 1920).abs() <= 1);
    }

    #[test]
    fn output_is_deterministic() {
        let options = TtfOptions::default();
        let first = document_to_ttf(&sample(), &options).unwrap();
        let second = svg_to_ttf(sample().to_svg().as_bytes(), &options).unwrap();
        let third = svg_to_ttf(sample().to_svg().as_bytes(), &options).unwrap();

        assert_eq!(second, third);
        assert_eq!(first, second);
    }

    #[test]
    fn names_carry_family_and_metadata() {
        let options = TtfOptions {
            copyright: Some("(c) Aviala".into()),
            url: Some("https://example.com".into()),
            ..TtfOptions::default()
        };
        let ttf = document_to_ttf(&sample(), &options).unwrap();
        let face = Face::parse(&ttf, 0).unwrap();

        let family = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::FAMILY)
            .and_then(|n| n.to_string());
        assert_eq!(family.as_deref(), Some("Aviala Icons Outline"));

        let post_script = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|n| n.to_string());
        assert_eq!(post_script.as_deref(), Some("AvialaIconsOutline"));
    }

    #[test]
    fn supplementary_code_points_get_a_format12_subtable() {
        let doc = document(vec![
            glyph("Bmp", '\u{E614}', square(0.0, 0.0, 100.0, 100.0)),
            glyph("Plane15", '\u{F0000}', square(0.0, 0.0, 100.0, 100.0)),
        ]);
        let ttf = document_to_ttf(&doc, &TtfOptions::default()).unwrap();
        let face = Face::parse(&ttf, 0).unwrap();

        assert_eq!(face.glyph_index('\u{E614}'), Some(GlyphId(1)));
        assert_eq!(face.glyph_index('\u{F0000}'), Some(GlyphId(2)));
    }

    #[test]
    fn empty_glyphs_have_no_outline() {
        let doc = document(vec![glyph("Blank", '\u{E614}', BezPath::new())]);
        let ttf = document_to_ttf(&doc, &TtfOptions::default()).unwrap();
        let face = Face::parse(&ttf, 0).unwrap();

        let mut counter = PointCounter::default();
        assert!(face.outline_glyph(GlyphId(1), &mut counter).is_none());
        assert_eq!(face.glyph_index('\u{E614}'), Some(GlyphId(1)));
    }

    #[test]
    fn duplicate_code_points_are_rejected() {
        let doc = document(vec![
            glyph("One", '\u{E614}', BezPath::new()),
            glyph("Two", '\u{E614}', BezPath::new()),
        ]);
        assert!(matches!(
            document_to_ttf(&doc, &TtfOptions::default()),
            Err(TranscodeError::Document(_))
        ));
    }

    #[test]
    fn oversized_coordinates_name_the_glyph() {
        let doc = document(vec![glyph("Huge", '\u{E614}', square(0.0, 0.0, 40000.0, 10.0))]);
        let err = document_to_ttf(&doc, &TtfOptions::default()).unwrap_err();
        assert!(matches!(err, TranscodeError::GlyphOutline { name, .. } if name == "Huge"));
    }

    #[test]
    fn distant_points_name_the_glyph() {
        let doc = document(vec![glyph("Span", '\u{E614}', square(-20000.0, 0.0, 20000.0, 10.0))]);
        let err = document_to_ttf(&doc, &TtfOptions::default()).unwrap_err();
        assert!(matches!(err, TranscodeError::GlyphOutline { name, .. } if name == "Span"));
    }

    #[test]
    fn delta_encoding_uses_short_forms() {
        let mut out = ByteWriter::new();
        assert_eq!(encode_delta(0, X_SHORT, X_SAME_OR_POSITIVE, &mut out), X_SAME_OR_POSITIVE);
        assert_eq!(encode_delta(12, X_SHORT, X_SAME_OR_POSITIVE, &mut out), X_SHORT | X_SAME_OR_POSITIVE);
        assert_eq!(encode_delta(-12, X_SHORT, X_SAME_OR_POSITIVE, &mut out), X_SHORT);
        assert_eq!(encode_delta(300, X_SHORT, X_SAME_OR_POSITIVE, &mut out), 0);
        assert_eq!(out.into_inner(), vec![12, 12, 0x01, 0x2C]);
    }
}
