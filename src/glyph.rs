//! Glyph sources: one icon plus the metadata the composer attaches to it.
//!
//! A [`GlyphSource`] owns an open reader over the icon's SVG markup. Pushing
//! it into a [`GlyphSink`](crate::GlyphSink) hands the reader to the composer,
//! which drains and closes it.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncRead;

use crate::codepoint::CodePointAllocator;
use crate::collection::{GlyphAsset, IconCollection};
use crate::error::{AllocationError, GlyphError};

// ============================================================================
// Name Transforms
// ============================================================================

/// Converts an icon name into the capitalized identifier used as glyph name.
///
/// Words after the first that start with a digit are prefixed with `_`, so
/// `icon-2x` and `icon2x` stay distinct.
///
/// ```
/// use iconfont_builder::display_name;
///
/// assert_eq!(display_name("arrow-left"), "ArrowLeft");
/// assert_eq!(display_name("icon-2x"), "Icon_2x");
/// assert_eq!(display_name("icon2x"), "Icon2x");
/// ```
pub fn display_name(name: &str) -> String {
    split_words(name)
        .iter()
        .enumerate()
        .map(|(index, word)| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) if index > 0 && first.is_ascii_digit() => {
                    format!("_{first}{}", chars.as_str().to_lowercase())
                }
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// Converts a file stem into a kebab-style icon name.
///
/// ```
/// use iconfont_builder::kebab_case;
///
/// assert_eq!(kebab_case("ArrowLeft"), "arrow-left");
/// assert_eq!(kebab_case("arrow_left Fill"), "arrow-left-fill");
/// ```
pub fn kebab_case(name: &str) -> String {
    split_words(name)
        .iter()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Splits on separators and on case boundaries.
///
/// Anything other than a letter or an ASCII digit separates words. Digits
/// stay attached to the word they follow.
fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !(c.is_alphabetic() || c.is_ascii_digit()) {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p)) {
            let next = chars.get(i + 1).copied();
            let lower_to_upper = (prev.is_lowercase() || prev.is_ascii_digit()) && c.is_uppercase();
            let acronym_end = prev.is_uppercase()
                && c.is_uppercase()
                && next.is_some_and(char::is_lowercase);
            if (lower_to_upper || acronym_end) && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

// ============================================================================
// GlyphMetadata
// ============================================================================

/// Out-of-band metadata carried alongside a glyph's vector content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphMetadata {
    /// The icon name the glyph came from.
    pub name: String,
    /// Glyph name written into the font.
    pub display_name: String,
    /// Assigned private-use code point.
    pub code_point: char,
}

impl GlyphMetadata {
    /// The code point as a one-character string.
    pub fn unicode(&self) -> String {
        self.code_point.to_string()
    }
}

// ============================================================================
// GlyphSource
// ============================================================================

/// Reader type glyph sources stream their markup from.
pub type GlyphReader = Box<dyn AsyncRead + Send + Unpin>;

/// One glyph ready to be pushed into the composer.
pub struct GlyphSource {
    metadata: GlyphMetadata,
    reader: GlyphReader,
}

impl GlyphSource {
    /// Wraps an arbitrary reader.
    pub fn new(name: impl Into<String>, code_point: char, reader: GlyphReader) -> Self {
        let name = name.into();
        Self {
            metadata: GlyphMetadata {
                display_name: display_name(&name),
                name,
                code_point,
            },
            reader,
        }
    }

    /// Creates a source reading an in-memory asset.
    pub fn from_asset(asset: &GlyphAsset, code_point: char) -> Self {
        let reader: GlyphReader = Box::new(Cursor::new(asset.content().to_vec()));
        Self::new(asset.name(), code_point, reader)
    }

    /// Opens an SVG file; the glyph is named after the file stem.
    pub async fn open(path: impl AsRef<Path>, code_point: char) -> Result<Self, GlyphError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| GlyphError::Unnamed(path.to_path_buf()))?
            .to_string();

        let file = File::open(path).await.map_err(|source| GlyphError::Read {
            name: name.clone(),
            source,
        })?;
        Ok(Self::new(name, code_point, Box::new(file)))
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn display_name(&self) -> &str {
        &self.metadata.display_name
    }

    pub fn code_point(&self) -> char {
        self.metadata.code_point
    }

    pub fn metadata(&self) -> &GlyphMetadata {
        &self.metadata
    }

    /// Splits the source into its metadata and the reader over its content.
    pub fn into_parts(self) -> (GlyphMetadata, GlyphReader) {
        (self.metadata, self.reader)
    }
}

impl fmt::Debug for GlyphSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphSource")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Allocates code points for a collection and wraps every asset as a source.
pub fn sources_for(
    collection: &IconCollection,
    allocator: &CodePointAllocator,
) -> Result<Vec<GlyphSource>, AllocationError> {
    Ok(allocator
        .assign(collection.assets())?
        .into_iter()
        .map(|(asset, code_point)| GlyphSource::from_asset(asset, code_point))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn display_name_capitalizes_words() {
        assert_eq!(display_name("arrow-left"), "ArrowLeft");
        assert_eq!(display_name("arrow_right"), "ArrowRight");
        assert_eq!(display_name("chevron-double-up"), "ChevronDoubleUp");
        assert_eq!(display_name("HTMLParser"), "HtmlParser");
        assert_eq!(display_name("alreadyCamel"), "AlreadyCamel");
    }

    #[test]
    fn digit_words_get_an_underscore() {
        assert_eq!(display_name("icon-2x"), "Icon_2x");
        assert_eq!(display_name("arrow-left-2"), "ArrowLeft_2");
        assert_eq!(display_name("battery-50"), "Battery_50");
        assert_eq!(display_name("icon2x"), "Icon2x");
        assert_eq!(display_name("24-hours"), "24Hours");
    }

    #[test]
    fn kebab_case_round_trips_through_display_name() {
        for name in ["arrow-left", "home", "chevron-double-up", "icon-2x", "battery-50"] {
            assert_eq!(kebab_case(&display_name(name)), name);
        }
    }

    #[test]
    fn empty_and_separator_only_names() {
        assert_eq!(display_name(""), "");
        assert_eq!(kebab_case("--"), "");
    }

    #[test]
    fn scenario_sources_match_allocation() {
        let collection = IconCollection::new(
            "outline",
            vec![
                GlyphAsset::new("arrow-left", "<svg>A</svg>").unwrap(),
                GlyphAsset::new("arrow-right", "<svg>B</svg>").unwrap(),
            ],
        )
        .unwrap();

        let sources = sources_for(&collection, &CodePointAllocator::default()).unwrap();
        let metadata: Vec<_> = sources.iter().map(|s| s.metadata().clone()).collect();

        assert_eq!(
            metadata,
            vec![
                GlyphMetadata {
                    name: "arrow-left".into(),
                    display_name: "ArrowLeft".into(),
                    code_point: '\u{E614}',
                },
                GlyphMetadata {
                    name: "arrow-right".into(),
                    display_name: "ArrowRight".into(),
                    code_point: '\u{E615}',
                },
            ]
        );
        assert_eq!(metadata[0].unicode(), "\u{E614}");
    }

    #[tokio::test]
    async fn asset_source_streams_content() {
        let asset = GlyphAsset::new("home", "<svg>home</svg>").unwrap();
        let (metadata, mut reader) = GlyphSource::from_asset(&asset, '\u{E614}').into_parts();

        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(metadata.display_name, "Home");
        assert_eq!(content, "<svg>home</svg>");
    }

    #[tokio::test]
    async fn open_names_glyph_after_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arrow-left.svg");
        std::fs::write(&path, "<svg/>").unwrap();

        let source = GlyphSource::open(&path, '\u{E700}').await.unwrap();
        assert_eq!(source.name(), "arrow-left");
        assert_eq!(source.display_name(), "ArrowLeft");
        assert_eq!(source.code_point(), '\u{E700}');
    }

    #[tokio::test]
    async fn open_missing_file_reports_glyph() {
        let dir = tempfile::tempdir().unwrap();
        let err = GlyphSource::open(dir.path().join("ghost.svg"), '\u{E614}')
            .await
            .unwrap_err();
        assert_eq!(err.name(), Some("ghost"));
    }
}
