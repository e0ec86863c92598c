//! Glyph outline extraction using usvg.
//!
//! Every filled path of a single-glyph SVG is flattened into absolute
//! viewport coordinates (y pointing down) and merged into one [`BezPath`].
//! A bare `<svg>` root without the SVG namespace is accepted; a document
//! without drawable content yields an empty outline.

use kurbo::{BezPath, Rect, Shape};
use resvg::tiny_skia::PathSegment;
use resvg::usvg::{Group, Node, Options, Tree};
use tracing::warn;

use crate::error::GlyphError;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// The outline of one glyph in its own viewport coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphOutline {
    /// Viewport width.
    pub width: f64,
    /// Viewport height.
    pub height: f64,
    /// All filled contours, y pointing down.
    pub path: BezPath,
}

impl GlyphOutline {
    /// Returns the bounding box of the contours, or `None` when empty.
    pub fn bounds(&self) -> Option<Rect> {
        if self.path.elements().is_empty() {
            None
        } else {
            Some(self.path.bounding_box())
        }
    }
}

/// Parses an SVG document into a glyph outline.
///
/// `name` only labels the error when the markup cannot be parsed.
pub fn parse_svg(name: &str, data: &[u8]) -> Result<GlyphOutline, GlyphError> {
    let opts = Options::default();
    let namespaced = with_svg_namespace(data);
    let data = namespaced.as_deref().unwrap_or(data);
    let tree = Tree::from_data(data, &opts).map_err(|e| GlyphError::Malformed {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    let mut path = BezPath::new();
    let mut skipped = 0;
    collect_group(tree.root(), &mut path, &mut skipped);
    if skipped > 0 {
        warn!(glyph = %name, paths = skipped, "ignoring paths without a fill");
    }

    for coord in path.elements().iter().flat_map(|el| el.end_point()) {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(GlyphError::Malformed {
                name: name.to_string(),
                reason: "outline contains non-finite coordinates".into(),
            });
        }
    }

    let size = tree.size();
    Ok(GlyphOutline {
        width: size.width() as f64,
        height: size.height() as f64,
        path,
    })
}

/// Returns a copy of `data` with the SVG namespace declared on the root, or
/// `None` when the root already has a namespace or the markup is not
/// well-formed XML.
fn with_svg_namespace(data: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(data).ok()?;
    let document = roxmltree::Document::parse(text).ok()?;
    let root = document.root_element();
    if root.tag_name().name() != "svg" || root.tag_name().namespace().is_some() {
        return None;
    }

    let insert_at = root.range().start + "<svg".len();
    let mut patched = String::with_capacity(text.len() + SVG_NAMESPACE.len() + 10);
    patched.push_str(&text[..insert_at]);
    patched.push_str(&format!(" xmlns=\"{SVG_NAMESPACE}\""));
    patched.push_str(&text[insert_at..]);
    Some(patched.into_bytes())
}

fn collect_group(group: &Group, out: &mut BezPath, skipped: &mut usize) {
    for node in group.children() {
        match node {
            Node::Group(child) => collect_group(child, out, skipped),
            Node::Path(path) => {
                if !path.is_visible() {
                    continue;
                }
                if path.fill().is_none() {
                    *skipped += 1;
                    continue;
                }
                if let Some(data) = path.data().clone().transform(path.abs_transform()) {
                    append_segments(data.segments(), out);
                }
            }
            _ => {}
        }
    }
}

fn append_segments(segments: impl Iterator<Item = PathSegment>, out: &mut BezPath) {
    let point = |p: resvg::tiny_skia::Point| (p.x as f64, p.y as f64);
    for segment in segments {
        match segment {
            PathSegment::MoveTo(p) => out.move_to(point(p)),
            PathSegment::LineTo(p) => out.line_to(point(p)),
            PathSegment::QuadTo(c, p) => out.quad_to(point(c), point(p)),
            PathSegment::CubicTo(c1, c2, p) => out.curve_to(point(c1), point(c2), point(p)),
            PathSegment::Close => out.close_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M4 4H20V20H4Z"/></svg>"#;

    #[test]
    fn parses_viewport_and_bounds() {
        let outline = parse_svg("square", SQUARE.as_bytes()).unwrap();
        assert_eq!(outline.width, 24.0);
        assert_eq!(outline.height, 24.0);

        let bounds = outline.bounds().unwrap();
        assert_eq!((bounds.x0, bounds.y0, bounds.x1, bounds.y1), (4.0, 4.0, 20.0, 20.0));
    }

    #[test]
    fn applies_group_transforms() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">
            <g transform="translate(2 3)"><rect x="0" y="0" width="10" height="10"/></g>
        </svg>"#;
        let outline = parse_svg("moved", svg.as_bytes()).unwrap();

        let bounds = outline.bounds().unwrap();
        assert!((bounds.x0 - 2.0).abs() < 1e-4);
        assert!((bounds.y0 - 3.0).abs() < 1e-4);
        assert!((bounds.x1 - 12.0).abs() < 1e-4);
        assert!((bounds.y1 - 13.0).abs() < 1e-4);
    }

    #[test]
    fn unfilled_paths_are_ignored() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">
            <path d="M0 0L24 24" fill="none" stroke="black"/>
        </svg>"#;
        let outline = parse_svg("stroke-only", svg.as_bytes()).unwrap();
        assert!(outline.bounds().is_none());
    }

    #[test]
    fn bare_svg_root_is_an_empty_glyph() {
        let outline = parse_svg("arrow-left", b"<svg>A</svg>").unwrap();
        assert!(outline.bounds().is_none());
        assert!(outline.width > 0.0 && outline.height > 0.0);
    }

    #[test]
    fn bare_svg_root_keeps_its_paths() {
        let svg = r#"<svg viewBox="0 0 24 24"><path d="M4 4H20V20H4Z"/></svg>"#;
        let outline = parse_svg("square", svg.as_bytes()).unwrap();
        assert_eq!(outline.width, 24.0);
        let bounds = outline.bounds().unwrap();
        assert_eq!((bounds.x0, bounds.y0, bounds.x1, bounds.y1), (4.0, 4.0, 20.0, 20.0));
    }

    #[test]
    fn namespaced_root_is_left_alone() {
        assert!(with_svg_namespace(SQUARE.as_bytes()).is_none());
        assert!(with_svg_namespace(b"<svg").is_none());
        assert_eq!(
            with_svg_namespace(b"<svg>A</svg>").unwrap(),
            br#"<svg xmlns="http://www.w3.org/2000/svg">A</svg>"#.to_vec()
        );
    }

    #[test]
    fn malformed_markup_names_the_glyph() {
        let err = parse_svg("broken", b"<svg xmlns=\"http://www.w3.org/2000/svg\"><path d=").unwrap_err();
        assert_eq!(err.name(), Some("broken"));
        assert!(matches!(err, GlyphError::Malformed { .. }));
    }
}
