//! Streaming composition of single-glyph SVGs into one SVG font.
//!
//! Composition is push-based. [`FontComposer::spawn`] starts a background
//! task and returns two halves:
//!
//! - a [`GlyphSink`] that accepts [`GlyphSource`]s one at a time, in
//!   allocation order, and signals end-of-input when finished;
//! - a [`Composition`] future that resolves only once the serialized font has
//!   been fully written, flushed and shut down on the destination, and
//!   resolves to an error if a glyph or the destination fails.
//!
//! # Example
//!
//! ```
//! use iconfont_builder::{ComposerOptions, FontComposer, GlyphAsset, GlyphSource};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let asset = GlyphAsset::new(
//!     "square",
//!     r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M4 4H20V20H4Z"/></svg>"#,
//! )
//! .unwrap();
//!
//! let (sink, composition) = FontComposer::new(ComposerOptions::new("Demo Icons")).spawn(Vec::new());
//! sink.push(GlyphSource::from_asset(&asset, '\u{E614}')).await.unwrap();
//! sink.finish();
//!
//! let composed = composition.await.unwrap();
//! assert_eq!(composed.document.glyphs.len(), 1);
//! # });
//! ```

pub mod document;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use kurbo::{Affine, BezPath, Shape};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::error::{ComposeError, GlyphError};
use crate::glyph::{GlyphMetadata, GlyphSource};
use crate::outline::{self, GlyphOutline};
use document::{CompositeFontDocument, DocumentGlyph};

/// Glyphs buffered between the sink and the composer task.
const SINK_CAPACITY: usize = 16;

// ============================================================================
// ComposerOptions
// ============================================================================

/// Fixed per-build composition settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerOptions {
    /// Font family name written into the document.
    pub family_name: String,
    /// Font identifier; defaults to the family name without whitespace.
    pub font_id: Option<String>,
    /// Height of the design square in font units.
    pub font_height: f64,
    /// Depth below the baseline in font units.
    pub descent: f64,
    /// Give every glyph the advance of the widest one.
    pub fixed_width: bool,
    /// Scale each glyph so its viewport height fills the design square.
    pub normalize: bool,
    /// Center each outline within its advance.
    pub center_horizontally: bool,
    /// Center each outline within the design square height.
    pub center_vertically: bool,
}

impl ComposerOptions {
    /// Creates options with the defaults used for icon fonts.
    pub fn new(family_name: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            font_id: None,
            font_height: 1920.0,
            descent: 0.0,
            fixed_width: true,
            normalize: true,
            center_horizontally: true,
            center_vertically: true,
        }
    }

    /// Returns the font identifier.
    pub fn font_id(&self) -> String {
        self.font_id
            .clone()
            .unwrap_or_else(|| self.family_name.split_whitespace().collect())
    }
}

// ============================================================================
// FontComposer
// ============================================================================

/// Summary of a finished composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedFont {
    /// Glyph metadata in push order.
    pub glyphs: Vec<GlyphMetadata>,
    /// The document that was written.
    pub document: CompositeFontDocument,
    /// Bytes written to the destination.
    pub bytes_written: u64,
}

/// Merges glyph sources into one [`CompositeFontDocument`].
#[derive(Debug, Clone)]
pub struct FontComposer {
    options: ComposerOptions,
}

impl FontComposer {
    pub fn new(options: ComposerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ComposerOptions {
        &self.options
    }

    /// Starts composing into `destination`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn<W>(self, destination: W) -> (GlyphSink, Composition)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let result = self.run(rx, destination).await;
            // The receiver is gone only if the caller dropped the composition.
            let _ = done_tx.send(result);
        });

        (
            GlyphSink { tx },
            Composition {
                done: done_rx,
                task: task.abort_handle(),
            },
        )
    }

    async fn run<W>(
        self,
        mut rx: mpsc::Receiver<GlyphSource>,
        mut destination: W,
    ) -> Result<ComposedFont, ComposeError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut glyphs = Vec::new();
        while let Some(source) = rx.recv().await {
            let (metadata, mut reader) = source.into_parts();
            let mut data = Vec::new();
            reader
                .read_to_end(&mut data)
                .await
                .map_err(|source| GlyphError::Read {
                    name: metadata.name.clone(),
                    source,
                })?;
            drop(reader);

            let outline = outline::parse_svg(&metadata.name, &data)?;
            debug!(
                glyph = %metadata.name,
                code_point = %format!("U+{:04X}", metadata.code_point as u32),
                "glyph accepted"
            );
            glyphs.push((metadata, outline));
        }
        // Every sender is gone: end of input.
        drop(rx);

        let metadata: Vec<GlyphMetadata> = glyphs.iter().map(|(m, _)| m.clone()).collect();
        let document = self.layout(glyphs);
        let svg = document.to_svg();

        destination
            .write_all(svg.as_bytes())
            .await
            .map_err(ComposeError::Sink)?;
        destination.flush().await.map_err(ComposeError::Sink)?;
        destination.shutdown().await.map_err(ComposeError::Sink)?;

        info!(
            family = %self.options.family_name,
            glyphs = metadata.len(),
            bytes = svg.len(),
            "composite font written"
        );
        Ok(ComposedFont {
            glyphs: metadata,
            document,
            bytes_written: svg.len() as u64,
        })
    }

    /// Places glyph outlines on the common design grid.
    ///
    /// Outlines come in viewport coordinates (y down) and leave in font units
    /// (y up, baseline at zero).
    pub fn layout(&self, glyphs: Vec<(GlyphMetadata, GlyphOutline)>) -> CompositeFontDocument {
        let options = &self.options;
        let font_height = options.font_height;
        let ascent = font_height - options.descent;

        let scaled: Vec<(GlyphMetadata, f64, BezPath)> = glyphs
            .into_iter()
            .map(|(metadata, outline)| {
                let scale = if options.normalize && outline.height > 0.0 {
                    font_height / outline.height
                } else {
                    1.0
                };
                let mut path = outline.path;
                path.apply_affine(Affine::scale(scale));
                (metadata, outline.width * scale, path)
            })
            .collect();

        let max_width = scaled.iter().map(|(_, width, _)| *width).fold(0.0, f64::max);

        let glyphs = scaled
            .into_iter()
            .map(|(metadata, width, mut path)| {
                let advance = if options.fixed_width { max_width } else { width };

                if !path.elements().is_empty() {
                    let bounds = path.bounding_box();
                    let dx = if options.center_horizontally {
                        (advance - bounds.width()) / 2.0 - bounds.x0
                    } else {
                        0.0
                    };
                    let dy = if options.center_vertically {
                        (font_height - bounds.height()) / 2.0 - bounds.y0
                    } else {
                        0.0
                    };
                    path.apply_affine(Affine::translate((dx, dy)));
                }
                // Flip into font space: y' = ascent - y.
                path.apply_affine(Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, ascent]));

                DocumentGlyph {
                    name: metadata.display_name,
                    code_point: metadata.code_point,
                    advance,
                    path,
                }
            })
            .collect();

        CompositeFontDocument {
            font_id: options.font_id(),
            family_name: options.family_name.clone(),
            units_per_em: font_height.round().clamp(16.0, 16384.0) as u16,
            ascent,
            descent: options.descent,
            advance: max_width,
            missing_advance: 0.0,
            glyphs,
        }
    }
}

// ============================================================================
// GlyphSink
// ============================================================================

/// Input half of a running composition.
#[derive(Debug)]
pub struct GlyphSink {
    tx: mpsc::Sender<GlyphSource>,
}

impl GlyphSink {
    /// Pushes the next glyph.
    ///
    /// Returns [`ComposeError::Closed`] when the composer has already
    /// stopped; the reason is reported by the [`Composition`].
    pub async fn push(&self, source: GlyphSource) -> Result<(), ComposeError> {
        self.tx.send(source).await.map_err(|_| ComposeError::Closed)
    }

    /// Signals end-of-input.
    pub fn finish(self) {}
}

// ============================================================================
// Composition
// ============================================================================

/// Completion half of a running composition.
///
/// Dropping it before it resolves aborts the composer task.
#[derive(Debug)]
pub struct Composition {
    done: oneshot::Receiver<Result<ComposedFont, ComposeError>>,
    task: AbortHandle,
}

impl Future for Composition {
    type Output = Result<ComposedFont, ComposeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.done)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ComposeError::Terminated)))
    }
}

impl Drop for Composition {
    fn drop(&mut self) {
        self.task.abort();
    }
}
