//! JSON build configuration.
//!
//! A [`BuildConfig`] lists the collections to build and the settings shared
//! by all of them. It is the only input of the `iconfont-build` binary.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "fontsDir": "dist/fonts",
//!   "baseCodePoint": "E614",
//!   "writeManifest": true,
//!   "metadata": { "version": "Version 2.0", "copyright": "(c) Aviala" },
//!   "collections": [
//!     {
//!       "name": "outline",
//!       "familyName": "Aviala Icons Outline",
//!       "fileName": "aviala-icons-outline",
//!       "sourceDir": "icons/outline"
//!     },
//!     {
//!       "name": "filled",
//!       "familyName": "Aviala Icons Filled",
//!       "fileName": "aviala-icons-filled",
//!       "sourceDir": "icons/filled",
//!       "stripSuffix": "-fill"
//!     }
//!   ]
//! }
//! ```
//!
//! Every key except `collections` is optional. Relative paths are resolved
//! against the directory holding the config file when it is [`load`]ed.
//!
//! [`load`]: BuildConfig::load

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::codepoint::{CodePointAllocator, DEFAULT_BASE};
use crate::collection::IconCollection;
use crate::error::{BuildError, ConfigError, Stage};
use crate::pipeline::{CollectionJob, CollectionTarget, MalformedGlyphPolicy, PipelineConfig};
use crate::transcode::TtfOptions;

// ============================================================================
// Font Metadata
// ============================================================================

/// Metadata copied into every generated font.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct FontMetadata {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Creation time in seconds since the Unix epoch. Fixed so rebuilds are
    /// byte-identical.
    pub timestamp: i64,
}

impl Default for FontMetadata {
    fn default() -> Self {
        let ttf = TtfOptions::default();
        Self {
            version: ttf.version,
            copyright: ttf.copyright,
            description: ttf.description,
            url: ttf.url,
            timestamp: ttf.timestamp,
        }
    }
}

impl From<&FontMetadata> for TtfOptions {
    fn from(metadata: &FontMetadata) -> Self {
        Self {
            version: metadata.version.clone(),
            copyright: metadata.copyright.clone(),
            description: metadata.description.clone(),
            url: metadata.url.clone(),
            timestamp: metadata.timestamp,
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

/// One collection: where its icons come from and how its fonts are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    /// Collection name; also the output subfolder.
    pub name: String,
    pub family_name: String,
    /// Base name of the output files, without extension.
    pub file_name: String,
    /// Directory holding one SVG per icon.
    pub source_dir: PathBuf,
    /// Suffix removed from icon names, e.g. `-fill`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_suffix: Option<String>,
}

impl CollectionConfig {
    pub fn target(&self) -> CollectionTarget {
        CollectionTarget::new(&self.family_name, &self.file_name, &self.name)
    }

    /// Loads the collection's icons from its source directory.
    pub async fn load_job(&self) -> Result<CollectionJob, BuildError> {
        let collection =
            IconCollection::load_dir(&self.name, &self.source_dir, self.strip_suffix.as_deref())
                .await
                .map_err(|source| BuildError::Collection {
                    collection: self.name.clone(),
                    stage: Stage::Load,
                    source,
                })?;
        Ok(CollectionJob::new(self.target(), collection))
    }
}

// ============================================================================
// BuildConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    pub fonts_dir: PathBuf,
    /// First code point, as a number or a hex string (`"E614"`, `"0xE614"`,
    /// `"U+E614"`).
    #[serde(deserialize_with = "deserialize_code_point")]
    #[cfg_attr(feature = "jsonschema", schemars(with = "u32"))]
    pub base_code_point: u32,
    pub font_height: f64,
    pub descent: f64,
    pub fixed_width: bool,
    pub normalize: bool,
    pub center_horizontally: bool,
    pub center_vertically: bool,
    pub malformed_glyphs: MalformedGlyphPolicy,
    pub write_manifest: bool,
    pub clean_output: bool,
    pub metadata: FontMetadata,
    pub collections: Vec<CollectionConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::new("dist/fonts");
        Self {
            fonts_dir: pipeline.fonts_dir,
            base_code_point: DEFAULT_BASE,
            font_height: pipeline.font_height,
            descent: pipeline.descent,
            fixed_width: pipeline.fixed_width,
            normalize: pipeline.normalize,
            center_horizontally: pipeline.center_horizontally,
            center_vertically: pipeline.center_vertically,
            malformed_glyphs: pipeline.malformed_glyphs,
            write_manifest: pipeline.write_manifest,
            clean_output: pipeline.clean_output,
            metadata: FontMetadata::default(),
            collections: Vec::new(),
        }
    }
}

impl BuildConfig {
    /// Parses and validates a config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reads a config file, resolving relative paths against its directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::from_json(&json)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.fonts_dir);
        for collection in &mut self.collections {
            resolve(&mut collection.source_dir);
        }
    }

    /// Checks the settings that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        CodePointAllocator::new(self.base_code_point)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if !(self.font_height.is_finite() && self.font_height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fontHeight must be positive, got {}",
                self.font_height
            )));
        }
        if !(self.descent.is_finite() && (0.0..self.font_height).contains(&self.descent)) {
            return Err(ConfigError::Invalid(format!(
                "descent must lie within [0, fontHeight), got {}",
                self.descent
            )));
        }

        let mut names = HashSet::new();
        for collection in &self.collections {
            let name = collection.name.as_str();
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(ConfigError::Invalid(format!(
                    "collection name `{name}` is not a valid folder name"
                )));
            }
            if collection.file_name.is_empty() || collection.file_name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "collection `{name}` has an invalid fileName `{}`",
                    collection.file_name
                )));
            }
            if !names.insert(name) {
                return Err(ConfigError::Invalid(format!("duplicate collection `{name}`")));
            }
        }
        Ok(())
    }

    /// Settings shared by every collection.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fonts_dir: self.fonts_dir.clone(),
            base_code_point: self.base_code_point,
            font_height: self.font_height,
            descent: self.descent,
            fixed_width: self.fixed_width,
            normalize: self.normalize,
            center_horizontally: self.center_horizontally,
            center_vertically: self.center_vertically,
            malformed_glyphs: self.malformed_glyphs,
            write_manifest: self.write_manifest,
            clean_output: self.clean_output,
            ttf: TtfOptions::from(&self.metadata),
        }
    }

    /// Collections selected by name; all of them when `filter` is empty.
    pub fn select(&self, filter: &[String]) -> Result<Vec<&CollectionConfig>, ConfigError> {
        if let Some(unknown) = filter
            .iter()
            .find(|name| !self.collections.iter().any(|c| &c.name == *name))
        {
            return Err(ConfigError::Invalid(format!("unknown collection `{unknown}`")));
        }
        Ok(self
            .collections
            .iter()
            .filter(|c| filter.is_empty() || filter.contains(&c.name))
            .collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodePointRepr {
    Number(u32),
    Text(String),
}

fn deserialize_code_point<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match CodePointRepr::deserialize(deserializer)? {
        CodePointRepr::Number(value) => Ok(value),
        CodePointRepr::Text(text) => {
            let trimmed = text.trim();
            let digits = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
                .or_else(|| trimmed.strip_prefix("U+"))
                .unwrap_or(trimmed);
            u32::from_str_radix(digits, 16)
                .map_err(|_| D::Error::custom(format!("invalid code point `{text}`")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "fontsDir": "out",
        "baseCodePoint": "0xE700",
        "malformedGlyphs": "skip",
        "metadata": { "version": "Version 2.0", "url": "https://example.com" },
        "collections": [
            { "name": "outline", "familyName": "Aviala Icons Outline",
              "fileName": "aviala-icons-outline", "sourceDir": "icons/outline" },
            { "name": "filled", "familyName": "Aviala Icons Filled",
              "fileName": "aviala-icons-filled", "sourceDir": "icons/filled",
              "stripSuffix": "-fill" }
        ]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let config = BuildConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.fonts_dir, PathBuf::from("out"));
        assert_eq!(config.base_code_point, 0xE700);
        assert_eq!(config.font_height, 1920.0);
        assert!(config.fixed_width && config.normalize);
        assert_eq!(config.malformed_glyphs, MalformedGlyphPolicy::Skip);
        assert_eq!(config.metadata.timestamp, 0);
        assert_eq!(config.collections[1].strip_suffix.as_deref(), Some("-fill"));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.ttf.version, "Version 2.0");
        assert_eq!(pipeline.ttf.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn code_point_accepts_numbers_and_hex() {
        for (raw, expected) in [("58900", 0xE614), ("\"E614\"", 0xE614), ("\"U+F0000\"", 0xF0000)] {
            let json = format!(r#"{{ "baseCodePoint": {raw} }}"#);
            assert_eq!(BuildConfig::from_json(&json).unwrap().base_code_point, expected);
        }
        assert!(BuildConfig::from_json(r#"{ "baseCodePoint": "zz" }"#).is_err());
    }

    #[test]
    fn rejects_base_outside_private_use() {
        let err = BuildConfig::from_json(r#"{ "baseCodePoint": 65 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_duplicate_collections() {
        let json = r#"{ "collections": [
            { "name": "outline", "familyName": "A", "fileName": "a", "sourceDir": "a" },
            { "name": "outline", "familyName": "B", "fileName": "b", "sourceDir": "b" }
        ] }"#;
        let err = BuildConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate collection `outline`"));
    }

    #[test]
    fn select_filters_by_name() {
        let config = BuildConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.select(&[]).unwrap().len(), 2);
        let filled = config.select(&["filled".into()]).unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].file_name, "aviala-icons-filled");
        assert!(config.select(&["missing".into()]).is_err());
    }

    #[test]
    fn json_roundtrip() {
        let config = BuildConfig::from_json(SAMPLE).unwrap();
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"fontsDir\""));
        assert!(json.contains("\"stripSuffix\": \"-fill\""));
        assert_eq!(BuildConfig::from_json(&json).unwrap(), config);
    }

    #[tokio::test]
    async fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iconfont.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = BuildConfig::load(&path).await.unwrap();
        assert_eq!(config.fonts_dir, dir.path().join("out"));
        assert_eq!(config.collections[0].source_dir, dir.path().join("icons/outline"));
    }

    #[tokio::test]
    async fn load_job_reads_the_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let icons = dir.path().join("filled");
        std::fs::create_dir_all(&icons).unwrap();
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M4 4H20V20H4Z"/></svg>"#;
        std::fs::write(icons.join("arrow-left-fill.svg"), svg).unwrap();

        let collection = CollectionConfig {
            name: "filled".into(),
            family_name: "Aviala Icons Filled".into(),
            file_name: "aviala-icons-filled".into(),
            source_dir: icons,
            strip_suffix: Some("-fill".into()),
        };
        let job = collection.load_job().await.unwrap();
        assert_eq!(job.name(), "filled");
        assert!(job.collection.get("arrow-left").is_some());

        let missing = CollectionConfig {
            source_dir: dir.path().join("nope"),
            ..collection
        };
        let err = missing.load_job().await.unwrap_err();
        assert_eq!(err.stage(), Stage::Load);
    }
}
