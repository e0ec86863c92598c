//! iconfont-builder: turns collections of single-glyph SVG icons into icon
//! fonts.
//!
//! Each collection (one visual style, e.g. "outline" or "filled") becomes a
//! composite SVG font plus TTF, EOT, WOFF and WOFF2 files:
//!
//! 1. the [`CodePointAllocator`] gives the k-th icon the code point
//!    `base + k` in a private-use range;
//! 2. every icon is wrapped as a [`GlyphSource`] carrying its glyph name
//!    (`arrow-left` → `ArrowLeft`) and code point;
//! 3. the [`FontComposer`] streams the sources into one SVG font;
//! 4. the [`TranscoderChain`] derives TTF from the SVG font, then EOT, WOFF
//!    and WOFF2 from the TTF;
//! 5. the [`IconFontPipeline`] runs those stages per collection, writes the
//!    artifacts atomically and reports failures per collection.
//!
//! # Example
//!
//! ```no_run
//! use iconfont_builder::{
//!     CancellationToken, CollectionJob, CollectionTarget, GlyphAsset, IconCollection,
//!     IconFontPipeline, PipelineConfig,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = IconCollection::new(
//!     "outline",
//!     vec![GlyphAsset::new("arrow-left", std::fs::read("icons/arrow-left.svg")?)?],
//! )?;
//! let job = CollectionJob::new(
//!     CollectionTarget::new("Aviala Icons Outline", "aviala-icons-outline", "outline"),
//!     collection,
//! );
//!
//! let pipeline = IconFontPipeline::new(PipelineConfig::new("dist/fonts"));
//! let summary = pipeline.build_all(vec![job], &CancellationToken::new()).await;
//! assert!(summary.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! Code points are assigned by position on every build and are not
//! persisted. Reordering, adding or removing icons can move existing icons to
//! other code points; enable [`PipelineConfig::write_manifest`] to publish
//! the mapping of each build.

mod cancel;
mod codepoint;
mod collection;
mod compose;
mod config;
mod error;
mod glyph;
mod manifest;
mod outline;
mod pipeline;
pub mod transcode;

pub use cancel::CancellationToken;
pub use codepoint::{CodePointAllocator, DEFAULT_BASE};
pub use collection::{GlyphAsset, IconCollection};
pub use compose::document::{CompositeFontDocument, DocumentGlyph};
pub use compose::{ComposedFont, ComposerOptions, Composition, FontComposer, GlyphSink};
pub use config::{BuildConfig, CollectionConfig, FontMetadata};
pub use error::{
    AllocationError, BuildError, CollectionError, ComposeError, ConfigError, FormatFailure,
    GlyphError, Stage, TranscodeError,
};
pub use glyph::{GlyphMetadata, GlyphReader, GlyphSource, display_name, kebab_case, sources_for};
pub use manifest::{GlyphManifest, ManifestEntry};
pub use outline::{GlyphOutline, parse_svg};
pub use pipeline::{
    BuildOutcome, BuildSummary, BuiltCollection, CollectionJob, CollectionReport,
    CollectionTarget, IconFontPipeline, MalformedGlyphPolicy, PipelineConfig,
};
pub use transcode::{FontArtifacts, FontBytes, FontFormat, TranscoderChain, TtfOptions};
