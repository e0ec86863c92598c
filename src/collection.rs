//! Icon collection types.
//!
//! An [`IconCollection`] is the ordered set of normalized single-glyph SVGs
//! that share one visual style and become one font. Order matters: it is the
//! only input to code-point allocation.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::CollectionError;
use crate::glyph::{display_name, kebab_case};

// ============================================================================
// GlyphAsset
// ============================================================================

/// A single named icon with its SVG markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphAsset {
    name: String,
    content: Vec<u8>,
}

impl GlyphAsset {
    /// Creates an asset, validating that `name` is a kebab-style identifier
    /// (lowercase ASCII letters and digits separated by single hyphens).
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Result<Self, CollectionError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            content: content.into(),
        })
    }

    /// Returns the icon name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw SVG markup.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the glyph name this asset gets inside the font.
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), CollectionError> {
    if name.is_empty() {
        return Err(CollectionError::EmptyName);
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_hyphens = !name.starts_with('-') && !name.ends_with('-') && !name.contains("--");

    if valid_chars && valid_hyphens {
        Ok(())
    } else {
        Err(CollectionError::InvalidName(name.to_string()))
    }
}

// ============================================================================
// IconCollection
// ============================================================================

/// An ordered, immutable set of glyph assets sharing one style.
///
/// # Example
///
/// ```
/// use iconfont_builder::{GlyphAsset, IconCollection};
///
/// let collection = IconCollection::new(
///     "outline",
///     vec![
///         GlyphAsset::new("arrow-left", "<svg/>").unwrap(),
///         GlyphAsset::new("arrow-right", "<svg/>").unwrap(),
///     ],
/// )
/// .unwrap();
///
/// assert_eq!(collection.len(), 2);
/// assert!(IconCollection::new("outline", vec![
///     GlyphAsset::new("home", "<svg/>").unwrap(),
///     GlyphAsset::new("home", "<svg/>").unwrap(),
/// ]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IconCollection {
    style: String,
    assets: Vec<GlyphAsset>,
}

impl IconCollection {
    /// Creates a collection.
    ///
    /// Fails on duplicate names. Distinct kebab-style names always produce
    /// distinct glyph names, so no further check is needed.
    pub fn new(style: impl Into<String>, assets: Vec<GlyphAsset>) -> Result<Self, CollectionError> {
        let mut names = HashSet::new();
        for asset in &assets {
            if !names.insert(asset.name()) {
                return Err(CollectionError::DuplicateName(asset.name().to_string()));
            }
        }

        Ok(Self {
            style: style.into(),
            assets,
        })
    }

    /// Creates an empty collection.
    pub fn empty(style: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            assets: Vec::new(),
        }
    }

    /// Loads every `*.svg` file directly inside `dir`, ordered by file name.
    ///
    /// Icon names are the kebab-cased file stems, with `strip_suffix` removed
    /// when present (e.g. `-fill` for a filled style).
    pub async fn load_dir(
        style: impl Into<String>,
        dir: impl AsRef<Path>,
        strip_suffix: Option<&str>,
    ) -> Result<Self, CollectionError> {
        let dir = dir.as_ref();
        let io_error = |source| CollectionError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let is_svg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
            if is_svg && entry.file_type().await.map_err(io_error)?.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut assets = Vec::with_capacity(files.len());
        for path in files {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let mut name = kebab_case(stem);
            if let Some(suffix) = strip_suffix {
                if let Some(stripped) = name.strip_suffix(suffix) {
                    name = stripped.to_string();
                }
            }

            let content = tokio::fs::read(&path).await.map_err(|source| CollectionError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(file = %path.display(), glyph = %name, "loaded icon");
            assets.push(GlyphAsset::new(name, content)?);
        }

        Self::new(style, assets)
    }

    /// Returns the style name (e.g. "outline").
    pub fn style(&self) -> &str {
        &self.style
    }

    /// Returns the assets in allocation order.
    pub fn assets(&self) -> &[GlyphAsset] {
        &self.assets
    }

    /// Returns the number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if the collection contains no assets.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Finds an asset by icon name.
    pub fn get(&self, name: &str) -> Option<&GlyphAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    /// Maps a glyph name from the font back to its icon name.
    pub fn resolve_display_name(&self, display_name: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|asset| asset.display_name() == display_name)
            .map(GlyphAsset::name)
    }

    /// Returns a collection containing only the assets accepted by `keep`.
    ///
    /// Order is preserved, so code points stay dense after filtering.
    pub fn retain(&self, mut keep: impl FnMut(&GlyphAsset) -> bool) -> Self {
        Self {
            style: self.style.clone(),
            assets: self.assets.iter().filter(|a| keep(a)).cloned().collect(),
        }
    }

    /// Returns an iterator over the assets.
    pub fn iter(&self) -> impl Iterator<Item = &GlyphAsset> {
        self.assets.iter()
    }
}

impl<'a> IntoIterator for &'a IconCollection {
    type Item = &'a GlyphAsset;
    type IntoIter = std::slice::Iter<'a, GlyphAsset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.iter()
    }
}
