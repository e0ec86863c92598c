//! JSON glyph manifest written next to each collection's fonts.
//!
//! The manifest records which code point every icon received in this build.
//! It is an output only: builds never read it back, so code points are still
//! assigned purely by position.
//!
//! ```json
//! {
//!   "fontFamily": "Aviala Icons Outline",
//!   "fileName": "aviala-icons-outline",
//!   "glyphs": [
//!     { "name": "arrow-left", "glyphName": "ArrowLeft", "codePoint": "E614" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::glyph::GlyphMetadata;

/// One icon's entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Icon name as loaded.
    pub name: String,
    /// Glyph name inside the font.
    pub glyph_name: String,
    /// Code point as upper-case hex without prefix.
    pub code_point: String,
}

impl From<&GlyphMetadata> for ManifestEntry {
    fn from(glyph: &GlyphMetadata) -> Self {
        Self {
            name: glyph.name.clone(),
            glyph_name: glyph.display_name.clone(),
            code_point: format!("{:04X}", glyph.code_point as u32),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphManifest {
    pub font_family: String,
    pub file_name: String,
    pub glyphs: Vec<ManifestEntry>,
}

impl GlyphManifest {
    pub fn new(
        font_family: impl Into<String>,
        file_name: impl Into<String>,
        glyphs: &[GlyphMetadata],
    ) -> Self {
        Self {
            font_family: font_family.into(),
            file_name: file_name.into(),
            glyphs: glyphs.iter().map(ManifestEntry::from).collect(),
        }
    }

    /// Looks up the code point of an icon by name.
    pub fn code_point(&self, name: &str) -> Option<char> {
        self.glyphs
            .iter()
            .find(|entry| entry.name == name)
            .and_then(|entry| u32::from_str_radix(&entry.code_point, 16).ok())
            .and_then(char::from_u32)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: &str, display_name: &str, code_point: char) -> GlyphMetadata {
        GlyphMetadata {
            name: name.into(),
            display_name: display_name.into(),
            code_point,
        }
    }

    #[test]
    fn manifest_json_format() {
        let manifest = GlyphManifest::new(
            "Aviala Icons Outline",
            "aviala-icons-outline",
            &[
                metadata("arrow-left", "ArrowLeft", '\u{E614}'),
                metadata("arrow-right", "ArrowRight", '\u{E615}'),
            ],
        );

        let json = manifest.to_json_pretty().unwrap();
        assert!(json.contains("\"fontFamily\": \"Aviala Icons Outline\""));
        assert!(json.contains("\"glyphName\": \"ArrowLeft\""));
        assert!(json.contains("\"codePoint\": \"E615\""));

        let restored = GlyphManifest::from_json(&json).unwrap();
        assert_eq!(restored, manifest);
        assert_eq!(restored.code_point("arrow-right"), Some('\u{E615}'));
        assert_eq!(restored.code_point("missing"), None);
    }
}
