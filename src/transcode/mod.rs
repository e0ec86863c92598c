//! Binary transcoder chain.
//!
//! The composite SVG font is converted to TrueType first; EOT, WOFF and
//! WOFF2 are then derived from those exact TTF bytes. Every derivation is
//! a pure function of its input, so the chain is byte-for-byte reproducible.
//!
//! ```text
//!            ┌─> EOT
//! SVG ─> TTF ├─> WOFF
//!            └─> WOFF2
//! ```
//!
//! The three TTF derivations run concurrently on the blocking pool. All of
//! them run to completion; when any fails, every failure is reported together
//! with the [`FontFormat`] it belongs to.

pub(crate) mod sfnt;

pub mod eot;
pub mod ttf;
pub mod woff;
pub mod woff2;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FormatFailure, TranscodeError};

// ============================================================================
// Font Bytes
// ============================================================================

/// An immutable, cheaply clonable font buffer.
///
/// Every stage of the chain consumes and produces this one type, so the
/// TTF handed to each derivation is the same byte content regardless of
/// which stage reads it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FontBytes(Arc<[u8]>);

impl FontBytes {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for FontBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<String> for FontBytes {
    fn from(text: String) -> Self {
        Self::from(text.into_bytes())
    }
}

impl AsRef<[u8]> for FontBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for FontBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FontBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontBytes({} bytes)", self.0.len())
    }
}

// ============================================================================
// Formats
// ============================================================================

/// The artifacts produced for every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    Svg,
    Ttf,
    Eot,
    Woff,
    Woff2,
}

impl FontFormat {
    /// All formats in the order they are produced.
    pub const ALL: [FontFormat; 5] = [
        FontFormat::Svg,
        FontFormat::Ttf,
        FontFormat::Eot,
        FontFormat::Woff,
        FontFormat::Woff2,
    ];

    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            FontFormat::Svg => "svg",
            FontFormat::Ttf => "ttf",
            FontFormat::Eot => "eot",
            FontFormat::Woff => "woff",
            FontFormat::Woff2 => "woff2",
        }
    }
}

impl fmt::Display for FontFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ============================================================================
// TrueType Options
// ============================================================================

/// Font metadata that ends up in the TrueType `name` and `head` tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtfOptions {
    /// Version string, e.g. `Version 1.0`.
    pub version: String,
    pub copyright: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    /// Creation and modification time, in seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Default for TtfOptions {
    fn default() -> Self {
        Self {
            version: "Version 1.0".into(),
            copyright: None,
            description: None,
            url: None,
            timestamp: 0,
        }
    }
}

impl TtfOptions {
    /// The first number of the version string as a 16.16 fixed-point value.
    pub(crate) fn font_revision(&self) -> u32 {
        self.version
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .find_map(|token| token.parse::<f64>().ok())
            .filter(|v| (0.0..32768.0).contains(v))
            .map_or(0x0001_0000, |v| (v * 65536.0).round() as u32)
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Every artifact of one collection.
#[derive(Debug, Clone)]
pub struct FontArtifacts {
    pub svg: FontBytes,
    pub ttf: FontBytes,
    pub eot: FontBytes,
    pub woff: FontBytes,
    pub woff2: FontBytes,
}

impl FontArtifacts {
    pub fn get(&self, format: FontFormat) -> &FontBytes {
        match format {
            FontFormat::Svg => &self.svg,
            FontFormat::Ttf => &self.ttf,
            FontFormat::Eot => &self.eot,
            FontFormat::Woff => &self.woff,
            FontFormat::Woff2 => &self.woff2,
        }
    }

    /// Artifacts paired with their format, in [`FontFormat::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (FontFormat, &FontBytes)> {
        FontFormat::ALL.into_iter().map(move |format| (format, self.get(format)))
    }
}

/// Runs the SVG → TTF → {EOT, WOFF, WOFF2} derivations.
#[derive(Debug, Clone, Default)]
pub struct TranscoderChain {
    ttf: TtfOptions,
}

impl TranscoderChain {
    pub fn new(ttf: TtfOptions) -> Self {
        Self { ttf }
    }

    pub fn ttf(&self) -> &TtfOptions {
        &self.ttf
    }

    /// Derives every binary artifact from a serialized composite font.
    ///
    /// A TTF failure stops the chain. Otherwise EOT, WOFF and WOFF2 are all
    /// attempted, and every one that failed is returned.
    pub async fn run(&self, svg: FontBytes) -> Result<FontArtifacts, Vec<FormatFailure>> {
        let ttf = {
            let svg = svg.clone();
            let options = self.ttf.clone();
            derive(FontFormat::Ttf, move || ttf::svg_to_ttf(&svg, &options))
                .await
                .map_err(|failure| vec![failure])?
        };

        let (eot, woff, woff2) = tokio::join!(
            derive(FontFormat::Eot, {
                let ttf = ttf.clone();
                move || eot::ttf_to_eot(&ttf)
            }),
            derive(FontFormat::Woff, {
                let ttf = ttf.clone();
                move || woff::ttf_to_woff(&ttf)
            }),
            derive(FontFormat::Woff2, {
                let ttf = ttf.clone();
                move || woff2::ttf_to_woff2(&ttf)
            }),
        );

        match (eot, woff, woff2) {
            (Ok(eot), Ok(woff), Ok(woff2)) => Ok(FontArtifacts {
                svg,
                ttf,
                eot,
                woff,
                woff2,
            }),
            (eot, woff, woff2) => Err([eot.err(), woff.err(), woff2.err()]
                .into_iter()
                .flatten()
                .collect()),
        }
    }
}

/// Runs one derivation on the blocking pool.
async fn derive<F>(format: FontFormat, job: F) -> Result<FontBytes, FormatFailure>
where
    F: FnOnce() -> Result<FontBytes, TranscodeError> + Send + 'static,
{
    let result = match tokio::task::spawn_blocking(job).await {
        Ok(result) => result,
        Err(join_error) => Err(TranscodeError::Worker(join_error.to_string())),
    };

    match result {
        Ok(bytes) => {
            debug!(%format, bytes = bytes.len(), "derived font");
            Ok(bytes)
        }
        Err(error) => Err(FormatFailure { format, error }),
    }
}
