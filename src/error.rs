//! Error types for every stage of an icon font build.
//!
//! Failures are layered: per-stage errors ([`GlyphError`], [`ComposeError`],
//! [`TranscodeError`], ...) describe what went wrong, and [`BuildError`] wraps
//! them with the collection and [`Stage`] responsible so a build step can
//! report exactly where it stopped.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::transcode::FontFormat;

// ============================================================================
// Input Errors
// ============================================================================

/// Errors raised while assembling an [`IconCollection`](crate::IconCollection).
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("glyph name must not be empty")]
    EmptyName,

    #[error("glyph name `{0}` is not a kebab-style identifier")]
    InvalidName(String),

    #[error("duplicate glyph name `{0}`")]
    DuplicateName(String),

    #[error("failed to read icons from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by the [`CodePointAllocator`](crate::CodePointAllocator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("base code point U+{0:04X} is not in a private-use range")]
    NotPrivateUse(u32),

    #[error(
        "{requested} glyphs starting at U+{base:04X} overflow the private-use range ending at U+{end:04X}"
    )]
    RangeExhausted { base: u32, requested: usize, end: u32 },
}

/// Errors tied to a single glyph.
#[derive(Debug, Error)]
pub enum GlyphError {
    #[error("failed to read glyph `{name}`: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("glyph `{name}` is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("cannot derive a glyph name from {}", .0.display())]
    Unnamed(PathBuf),
}

impl GlyphError {
    /// The glyph this error refers to, if it has a name.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Read { name, .. } | Self::Malformed { name, .. } => Some(name),
            Self::Unnamed(_) => None,
        }
    }
}

// ============================================================================
// Composition Errors
// ============================================================================

/// Errors reported by the streaming [`FontComposer`](crate::FontComposer).
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Glyph(#[from] GlyphError),

    #[error("failed to write the composite font: {0}")]
    Sink(#[source] io::Error),

    #[error("the composer stopped accepting glyphs")]
    Closed,

    #[error("the composer terminated without reporting completion")]
    Terminated,
}

impl ComposeError {
    /// Name of the malformed glyph that aborted composition, if any.
    ///
    /// Callers use this to tell a bad input glyph apart from a failure of the
    /// composer or its destination.
    pub fn malformed_glyph(&self) -> Option<&str> {
        match self {
            Self::Glyph(err) => err.name(),
            _ => None,
        }
    }
}

// ============================================================================
// Transcoding Errors
// ============================================================================

/// Errors raised while deriving a binary font encoding.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("composite font document is not valid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("composite font document is invalid: {0}")]
    Document(String),

    #[error("glyph `{name}` has an invalid outline: {reason}")]
    GlyphOutline { name: String, reason: String },

    #[error("font has {0} glyphs, more than TrueType allows")]
    TooManyGlyphs(usize),

    #[error("malformed sfnt data: {0}")]
    Sfnt(String),

    #[error("compression failed: {0}")]
    Compression(#[source] io::Error),

    #[error("transcoding worker failed: {0}")]
    Worker(String),
}

/// A failed derivation together with the format it was producing.
#[derive(Debug, Error)]
#[error("{format}: {error}")]
pub struct FormatFailure {
    pub format: FontFormat,
    #[source]
    pub error: TranscodeError,
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors raised while loading a [`BuildConfig`](crate::BuildConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Build Errors
// ============================================================================

/// The pipeline stage a collection build was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Prepare,
    Compose,
    Transcode,
    Write,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Prepare => "prepare",
            Self::Compose => "compose",
            Self::Transcode => "transcode",
            Self::Write => "write",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// A failed collection build.
///
/// Every variant names the collection; [`stage`](Self::stage) and
/// [`glyph`](Self::glyph) narrow it down further.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("collection `{collection}`, stage {stage}: {source}")]
    Collection {
        collection: String,
        stage: Stage,
        #[source]
        source: CollectionError,
    },

    #[error("collection `{collection}`, stage prepare: {source}")]
    Allocation {
        collection: String,
        #[source]
        source: AllocationError,
    },

    #[error("collection `{collection}`, stage compose: {source}")]
    Compose {
        collection: String,
        #[source]
        source: ComposeError,
    },

    #[error("collection `{collection}`, stage transcode: {}", describe_failures(.failures))]
    Transcode {
        collection: String,
        failures: Vec<FormatFailure>,
    },

    #[error("collection `{collection}`, stage {stage}: {}: {source}", .path.display())]
    Io {
        collection: String,
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("collection `{collection}` was cancelled during {stage}")]
    Cancelled { collection: String, stage: Stage },

    #[error("collection `{collection}`: build task failed: {reason}")]
    Task { collection: String, reason: String },
}

impl BuildError {
    /// The collection whose build failed.
    pub fn collection(&self) -> &str {
        match self {
            Self::Collection { collection, .. }
            | Self::Allocation { collection, .. }
            | Self::Compose { collection, .. }
            | Self::Transcode { collection, .. }
            | Self::Io { collection, .. }
            | Self::Cancelled { collection, .. }
            | Self::Task { collection, .. } => collection,
        }
    }

    /// The stage the build was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Collection { stage, .. } | Self::Io { stage, .. } | Self::Cancelled { stage, .. } => {
                *stage
            }
            Self::Allocation { .. } | Self::Task { .. } => Stage::Prepare,
            Self::Compose { .. } => Stage::Compose,
            Self::Transcode { .. } => Stage::Transcode,
        }
    }

    /// The malformed glyph responsible for the failure, if there is one.
    pub fn glyph(&self) -> Option<&str> {
        match self {
            Self::Compose { source, .. } => source.malformed_glyph(),
            _ => None,
        }
    }

    /// Formats that failed to transcode. Empty for other failures.
    pub fn failed_formats(&self) -> Vec<FontFormat> {
        match self {
            Self::Transcode { failures, .. } => failures.iter().map(|f| f.format).collect(),
            _ => Vec::new(),
        }
    }
}

fn describe_failures(failures: &[FormatFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
