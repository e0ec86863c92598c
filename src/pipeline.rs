//! Per-collection build orchestration.
//!
//! [`IconFontPipeline::build`] drives one collection through every stage:
//!
//! 1. **prepare**: optional malformed-glyph screening, code-point allocation,
//!    output directory creation;
//! 2. **compose**: glyph sources are pushed into the [`FontComposer`], whose
//!    output streams into a staged `.svg`;
//! 3. **transcode**: the staged document is read back and handed to the
//!    [`TranscoderChain`];
//! 4. **write**: TTF, EOT, WOFF, WOFF2 (and the manifest) are written to
//!    staged paths concurrently;
//! 5. **commit**: staged files are renamed onto their final names.
//!
//! Every artifact is written as `.<name>.partial` inside the collection's
//! output directory, so a failed or cancelled build never leaves a
//! half-written file at a final path. Staged files are removed on failure.
//!
//! [`IconFontPipeline::build_all`] runs several collections concurrently and
//! reports each one independently.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cancel::CancellationToken;
use crate::codepoint::{CodePointAllocator, DEFAULT_BASE};
use crate::collection::IconCollection;
use crate::compose::{ComposerOptions, FontComposer};
use crate::error::{BuildError, Stage};
use crate::glyph::{self, GlyphMetadata, GlyphSource};
use crate::manifest::GlyphManifest;
use crate::outline;
use crate::transcode::{FontArtifacts, FontBytes, FontFormat, TranscoderChain, TtfOptions};

// ============================================================================
// Configuration
// ============================================================================

/// What to do with a glyph whose SVG cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub enum MalformedGlyphPolicy {
    /// Fail the whole collection, naming the glyph.
    #[default]
    Abort,
    /// Leave the glyph out and build the rest.
    ///
    /// Glyphs are screened before code points are allocated, so the
    /// remaining glyphs still receive consecutive code points.
    Skip,
}

/// Settings shared by every collection of a build.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Root directory; each collection writes into its own subfolder.
    pub fonts_dir: PathBuf,
    pub base_code_point: u32,
    pub font_height: f64,
    pub descent: f64,
    pub fixed_width: bool,
    pub normalize: bool,
    pub center_horizontally: bool,
    pub center_vertically: bool,
    pub malformed_glyphs: MalformedGlyphPolicy,
    /// Write `<fileName>.json` next to the fonts.
    pub write_manifest: bool,
    /// Remove the collection's output directory before building.
    pub clean_output: bool,
    pub ttf: TtfOptions,
}

impl PipelineConfig {
    pub fn new(fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            base_code_point: DEFAULT_BASE,
            font_height: 1920.0,
            descent: 0.0,
            fixed_width: true,
            normalize: true,
            center_horizontally: true,
            center_vertically: true,
            malformed_glyphs: MalformedGlyphPolicy::Abort,
            write_manifest: false,
            clean_output: false,
            ttf: TtfOptions::default(),
        }
    }

    fn composer_options(&self, family_name: &str) -> ComposerOptions {
        ComposerOptions {
            font_height: self.font_height,
            descent: self.descent,
            fixed_width: self.fixed_width,
            normalize: self.normalize,
            center_horizontally: self.center_horizontally,
            center_vertically: self.center_vertically,
            ..ComposerOptions::new(family_name)
        }
    }
}

/// Where and under which names one collection is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    /// Font family name, e.g. "Aviala Icons Outline".
    pub family_name: String,
    /// Base name of every output file, without extension.
    pub file_name: String,
    /// Output subfolder below [`PipelineConfig::fonts_dir`].
    pub subfolder: String,
}

impl CollectionTarget {
    pub fn new(
        family_name: impl Into<String>,
        file_name: impl Into<String>,
        subfolder: impl Into<String>,
    ) -> Self {
        Self {
            family_name: family_name.into(),
            file_name: file_name.into(),
            subfolder: subfolder.into(),
        }
    }
}

/// One collection to build.
#[derive(Debug, Clone)]
pub struct CollectionJob {
    pub target: CollectionTarget,
    pub collection: IconCollection,
}

impl CollectionJob {
    pub fn new(target: CollectionTarget, collection: IconCollection) -> Self {
        Self { target, collection }
    }

    /// Name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.target.subfolder
    }
}

// ============================================================================
// Results
// ============================================================================

/// A successfully built collection.
#[derive(Debug, Clone)]
pub struct BuiltCollection {
    pub output_dir: PathBuf,
    /// Glyphs in code-point order.
    pub glyphs: Vec<GlyphMetadata>,
    /// Final path of every font artifact, in [`FontFormat::ALL`] order.
    pub files: Vec<(FontFormat, PathBuf)>,
    pub manifest: Option<PathBuf>,
    /// Glyphs left out under [`MalformedGlyphPolicy::Skip`].
    pub skipped: Vec<String>,
}

impl BuiltCollection {
    pub fn path(&self, format: FontFormat) -> Option<&Path> {
        self.files
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, path)| path.as_path())
    }
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// Nothing to build; no files were written.
    Empty { skipped: Vec<String> },
    Built(BuiltCollection),
}

/// Result of one collection within [`IconFontPipeline::build_all`].
#[derive(Debug)]
pub struct CollectionReport {
    pub collection: String,
    pub result: Result<BuildOutcome, BuildError>,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    /// One report per job, in job order.
    pub reports: Vec<CollectionReport>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(|report| report.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BuildError> {
        self.reports.iter().filter_map(|report| report.result.as_ref().err())
    }

    pub fn report(&self, collection: &str) -> Option<&CollectionReport> {
        self.reports.iter().find(|report| report.collection == collection)
    }
}

// ============================================================================
// IconFontPipeline
// ============================================================================

/// Builds icon collections into font files.
#[derive(Debug, Clone)]
pub struct IconFontPipeline {
    config: Arc<PipelineConfig>,
    chain: TranscoderChain,
}

impl IconFontPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let chain = TranscoderChain::new(config.ttf.clone());
        Self {
            config: Arc::new(config),
            chain,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Output directory of a collection.
    pub fn output_dir(&self, target: &CollectionTarget) -> PathBuf {
        self.config.fonts_dir.join(&target.subfolder)
    }

    /// Builds every job concurrently.
    ///
    /// A failing collection does not affect the others; each outcome is
    /// reported separately.
    pub async fn build_all(
        &self,
        jobs: Vec<CollectionJob>,
        cancel: &CancellationToken,
    ) -> BuildSummary {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let pipeline = self.clone();
                let cancel = cancel.clone();
                let name = job.name().to_string();
                let handle = tokio::spawn(async move { pipeline.build(&job, &cancel).await });
                (name, handle)
            })
            .collect();

        let mut summary = BuildSummary::default();
        for (collection, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(BuildError::Task {
                    collection: collection.clone(),
                    reason: join_error.to_string(),
                }),
            };
            if let Err(err) = &result {
                warn!(%collection, error = %err, "collection build failed");
            }
            summary.reports.push(CollectionReport { collection, result });
        }
        summary
    }

    /// Builds one collection.
    ///
    /// An empty collection is a no-op and writes nothing.
    pub async fn build(
        &self,
        job: &CollectionJob,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        let span = info_span!("collection", collection = %job.name());
        self.build_collection(job, cancel).instrument(span).await
    }

    /// Builds glyph sources that already carry their code points.
    ///
    /// Sources are composed in the given order and may stream from any
    /// reader, e.g. files opened with [`GlyphSource::open`]. No screening
    /// happens here: a source that fails to parse fails the build.
    pub async fn build_sources(
        &self,
        target: &CollectionTarget,
        sources: Vec<GlyphSource>,
        cancel: &CancellationToken,
    ) -> Result<BuiltCollection, BuildError> {
        let span = info_span!("collection", collection = %target.subfolder);
        self.write_collection(target, sources, Vec::new(), cancel)
            .instrument(span)
            .await
    }

    async fn build_collection(
        &self,
        job: &CollectionJob,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        let name = job.name();
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled {
                collection: name.to_string(),
                stage: Stage::Prepare,
            });
        }

        let (collection, skipped) = self.screen(&job.collection);
        if collection.is_empty() {
            info!("collection is empty, nothing to build");
            return Ok(BuildOutcome::Empty { skipped });
        }

        let allocation_error = |source| BuildError::Allocation {
            collection: name.to_string(),
            source,
        };
        let allocator = CodePointAllocator::new(self.config.base_code_point).map_err(allocation_error)?;
        let sources = glyph::sources_for(&collection, &allocator).map_err(allocation_error)?;

        self.write_collection(&job.target, sources, skipped, cancel)
            .await
            .map(BuildOutcome::Built)
    }

    /// Prepares the output directory, produces every artifact into staging
    /// and commits them.
    async fn write_collection(
        &self,
        target: &CollectionTarget,
        sources: Vec<GlyphSource>,
        skipped: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<BuiltCollection, BuildError> {
        let name = target.subfolder.as_str();
        let cancelled = |stage| BuildError::Cancelled {
            collection: name.to_string(),
            stage,
        };
        if cancel.is_cancelled() {
            return Err(cancelled(Stage::Prepare));
        }

        let output_dir = self.output_dir(target);
        self.prepare_dir(name, &output_dir).await?;

        let mut staging = Staging::new(&output_dir);
        let produced = match self.produce(target, sources, &mut staging, cancel).await {
            Ok(produced) => produced,
            Err(err) => {
                staging.discard().await;
                return Err(err);
            }
        };

        if cancel.is_cancelled() {
            staging.discard().await;
            return Err(cancelled(Stage::Commit));
        }
        staging.commit().await.map_err(|(path, source)| BuildError::Io {
            collection: name.to_string(),
            stage: Stage::Commit,
            path,
            source,
        })?;

        let file_name = &target.file_name;
        let files = FontFormat::ALL
            .into_iter()
            .map(|format| (format, output_dir.join(artifact_name(file_name, format))))
            .collect();
        let manifest = self
            .config
            .write_manifest
            .then(|| output_dir.join(manifest_name(file_name)));

        info!(
            glyphs = produced.glyphs.len(),
            skipped = skipped.len(),
            dir = %output_dir.display(),
            "collection built"
        );
        Ok(BuiltCollection {
            output_dir,
            glyphs: produced.glyphs,
            files,
            manifest,
            skipped,
        })
    }

    /// Applies the malformed-glyph policy.
    fn screen(&self, collection: &IconCollection) -> (IconCollection, Vec<String>) {
        match self.config.malformed_glyphs {
            MalformedGlyphPolicy::Abort => (collection.clone(), Vec::new()),
            MalformedGlyphPolicy::Skip => {
                let mut skipped = Vec::new();
                let kept = collection.retain(|asset| match outline::parse_svg(asset.name(), asset.content()) {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(glyph = %asset.name(), error = %err, "skipping malformed glyph");
                        skipped.push(asset.name().to_string());
                        false
                    }
                });
                (kept, skipped)
            }
        }
    }

    async fn prepare_dir(&self, collection: &str, dir: &Path) -> Result<(), BuildError> {
        let io_error = |source| BuildError::Io {
            collection: collection.to_string(),
            stage: Stage::Prepare,
            path: dir.to_path_buf(),
            source,
        };

        if self.config.clean_output {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => debug!(dir = %dir.display(), "removed previous output"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(io_error(err)),
            }
        }
        tokio::fs::create_dir_all(dir).await.map_err(io_error)
    }

    /// Runs compose, transcode and write against staged paths.
    async fn produce(
        &self,
        target: &CollectionTarget,
        sources: Vec<GlyphSource>,
        staging: &mut Staging,
        cancel: &CancellationToken,
    ) -> Result<Produced, BuildError> {
        let name = target.subfolder.as_str();
        let file_name = &target.file_name;
        let io_error = |stage, path: &Path, source| BuildError::Io {
            collection: name.to_string(),
            stage,
            path: path.to_path_buf(),
            source,
        };

        // Compose
        let svg_path = staging.stage(&artifact_name(file_name, FontFormat::Svg));
        let destination = tokio::fs::File::create(&svg_path)
            .await
            .map_err(|source| io_error(Stage::Compose, &svg_path, source))?;

        let composer = FontComposer::new(self.config.composer_options(&target.family_name));
        let (sink, composition) = composer.spawn(destination);
        let compose = async move {
            for source in sources {
                // A closed sink means the composer failed; its error follows.
                if sink.push(source).await.is_err() {
                    break;
                }
            }
            sink.finish();
            composition.await
        };
        let composed = tokio::select! {
            result = compose => result.map_err(|source| BuildError::Compose {
                collection: name.to_string(),
                source,
            })?,
            () = cancel.cancelled() => {
                return Err(BuildError::Cancelled { collection: name.to_string(), stage: Stage::Compose });
            }
        };

        let svg = tokio::fs::read(&svg_path)
            .await
            .map(FontBytes::from)
            .map_err(|source| io_error(Stage::Compose, &svg_path, source))?;
        info!(glyphs = composed.glyphs.len(), bytes = svg.len(), "composed");

        // Transcode
        let artifacts = tokio::select! {
            result = self.chain.run(svg) => result.map_err(|failures| BuildError::Transcode {
                collection: name.to_string(),
                failures,
            })?,
            () = cancel.cancelled() => {
                return Err(BuildError::Cancelled { collection: name.to_string(), stage: Stage::Transcode });
            }
        };
        info!("transcoded");

        // Write
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled {
                collection: name.to_string(),
                stage: Stage::Write,
            });
        }
        let manifest = if self.config.write_manifest {
            let path = staging.stage(&manifest_name(file_name));
            let json = GlyphManifest::new(&target.family_name, file_name, &composed.glyphs)
                .to_json_pretty()
                .map_err(|err| io_error(Stage::Write, &path, io::Error::other(err)))?;
            Some((path, json.into_bytes()))
        } else {
            None
        };
        let binaries = [FontFormat::Ttf, FontFormat::Eot, FontFormat::Woff, FontFormat::Woff2]
            .map(|format| (staging.stage(&artifact_name(file_name, format)), format));
        write_artifacts(&artifacts, &binaries, manifest.as_ref())
            .await
            .map_err(|(path, source)| io_error(Stage::Write, &path, source))?;

        Ok(Produced {
            glyphs: composed.glyphs,
        })
    }
}

struct Produced {
    glyphs: Vec<GlyphMetadata>,
}

/// Writes every binary artifact, and the manifest, concurrently.
async fn write_artifacts(
    artifacts: &FontArtifacts,
    binaries: &[(PathBuf, FontFormat); 4],
    manifest: Option<&(PathBuf, Vec<u8>)>,
) -> Result<(), (PathBuf, io::Error)> {
    let write = |path: &PathBuf, bytes: &[u8]| {
        let path = path.clone();
        let bytes = bytes.to_vec();
        async move {
            let len = bytes.len();
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|err| (path.clone(), err))?;
            debug!(file = %path.display(), bytes = len, "staged");
            Ok::<_, (PathBuf, io::Error)>(())
        }
    };

    let [ttf, eot, woff, woff2] = binaries;
    let manifest = async {
        match manifest {
            Some((path, json)) => write(path, json.as_slice()).await,
            None => Ok(()),
        }
    };
    tokio::try_join!(
        write(&ttf.0, artifacts.get(ttf.1).as_slice()),
        write(&eot.0, artifacts.get(eot.1).as_slice()),
        write(&woff.0, artifacts.get(woff.1).as_slice()),
        write(&woff2.0, artifacts.get(woff2.1).as_slice()),
        manifest,
    )?;
    Ok(())
}

fn artifact_name(file_name: &str, format: FontFormat) -> String {
    format!("{file_name}.{}", format.extension())
}

fn manifest_name(file_name: &str) -> String {
    format!("{file_name}.json")
}

// ============================================================================
// Staging
// ============================================================================

/// Staged files of one collection build, waiting to be renamed into place.
#[derive(Debug)]
struct Staging {
    dir: PathBuf,
    /// `(staged, final)` pairs in staging order.
    entries: Vec<(PathBuf, PathBuf)>,
}

impl Staging {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            entries: Vec::new(),
        }
    }

    /// Returns the staged path for `file_name` and remembers its final path.
    fn stage(&mut self, file_name: &str) -> PathBuf {
        let staged = self.dir.join(format!(".{file_name}.partial"));
        self.entries.push((staged.clone(), self.dir.join(file_name)));
        staged
    }

    /// Renames every staged file onto its final path.
    ///
    /// On failure the files not yet renamed are removed. Files renamed before
    /// the failure stay in place; each of them is complete.
    async fn commit(self) -> Result<(), (PathBuf, io::Error)> {
        let mut entries = self.entries.into_iter();
        while let Some((staged, target)) = entries.next() {
            if let Err(err) = tokio::fs::rename(&staged, &target).await {
                let _ = tokio::fs::remove_file(&staged).await;
                for (rest, _) in entries {
                    let _ = tokio::fs::remove_file(&rest).await;
                }
                return Err((target, err));
            }
        }
        Ok(())
    }

    /// Removes every staged file that exists.
    async fn discard(self) {
        for (staged, _) in self.entries {
            match tokio::fs::remove_file(&staged).await {
                Ok(()) => debug!(file = %staged.display(), "discarded staged file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(file = %staged.display(), error = %err, "failed to remove staged file"),
            }
        }
    }
}
