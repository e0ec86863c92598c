use std::path::Path;

use iconfont_builder::{
    BuildOutcome, CancellationToken, CollectionJob, CollectionTarget, FontFormat, GlyphAsset,
    IconCollection, IconFontPipeline, MalformedGlyphPolicy, PipelineConfig, Stage, display_name,
};
use ttf_parser::{Face, GlyphId};

const ARROW_LEFT: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M10 4L2 12L10 20V14H22V10H10Z"/></svg>"#;
const ARROW_RIGHT: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M14 4L22 12L14 20V14H2V10H14Z"/></svg>"#;
const CIRCLE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><circle cx="12" cy="12" r="9"/></svg>"#;
const BROKEN: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\"><path d=";

fn asset(name: &str, svg: &str) -> GlyphAsset {
    GlyphAsset::new(name, svg).unwrap()
}

fn job(name: &str, assets: Vec<GlyphAsset>) -> CollectionJob {
    CollectionJob::new(
        CollectionTarget::new(
            format!("Aviala Icons {}", display_name(name)),
            format!("aviala-icons-{name}"),
            name,
        ),
        IconCollection::new(name, assets).unwrap(),
    )
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[tokio::test]
async fn scenario_two_arrows() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = IconFontPipeline::new(PipelineConfig::new(root.path()));
    let job = job(
        "outline",
        vec![asset("arrow-left", ARROW_LEFT), asset("arrow-right", ARROW_RIGHT)],
    );

    let outcome = pipeline.build(&job, &CancellationToken::new()).await.unwrap();
    let BuildOutcome::Built(built) = outcome else {
        panic!("expected a build");
    };

    let glyphs: Vec<(&str, char)> = built
        .glyphs
        .iter()
        .map(|g| (g.display_name.as_str(), g.code_point))
        .collect();
    assert_eq!(glyphs, [("ArrowLeft", '\u{E614}'), ("ArrowRight", '\u{E615}')]);

    // The SVG font holds exactly those two glyphs.
    let svg = std::fs::read(built.path(FontFormat::Svg).unwrap()).unwrap();
    let document = iconfont_builder::CompositeFontDocument::from_bytes(&svg).unwrap();
    let in_document: Vec<(&str, char)> = document
        .glyphs
        .iter()
        .map(|g| (g.name.as_str(), g.code_point))
        .collect();
    assert_eq!(in_document, glyphs);
    for glyph in &document.glyphs {
        assert!(job.collection.resolve_display_name(&glyph.name).is_some());
    }

    // The TTF maps both code points to named glyphs.
    let ttf = std::fs::read(built.path(FontFormat::Ttf).unwrap()).unwrap();
    let face = Face::parse(&ttf, 0).unwrap();
    assert_eq!(face.glyph_index('\u{E614}'), Some(GlyphId(1)));
    assert_eq!(face.glyph_index('\u{E615}'), Some(GlyphId(2)));
    assert_eq!(face.glyph_name(GlyphId(1)), Some("ArrowLeft"));
    assert_eq!(face.glyph_name(GlyphId(2)), Some("ArrowRight"));

    for format in [FontFormat::Eot, FontFormat::Woff, FontFormat::Woff2] {
        let bytes = std::fs::read(built.path(format).unwrap()).unwrap();
        assert!(!bytes.is_empty(), "{format} is empty");
    }
    let eot = std::fs::read(built.path(FontFormat::Eot).unwrap()).unwrap();
    assert!(eot.ends_with(&ttf));
}

#[tokio::test]
async fn bare_svg_markup_builds_empty_glyphs() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = IconFontPipeline::new(PipelineConfig::new(root.path()));
    let job = job(
        "outline",
        vec![asset("arrow-left", "<svg>A</svg>"), asset("arrow-right", "<svg>B</svg>")],
    );

    let outcome = pipeline.build(&job, &CancellationToken::new()).await.unwrap();
    let BuildOutcome::Built(built) = outcome else {
        panic!("expected a build");
    };
    assert_eq!(files_in(&built.output_dir).len(), 5);

    let svg = std::fs::read(built.path(FontFormat::Svg).unwrap()).unwrap();
    let document = iconfont_builder::CompositeFontDocument::from_bytes(&svg).unwrap();
    let in_document: Vec<(&str, char)> = document
        .glyphs
        .iter()
        .map(|g| (g.name.as_str(), g.code_point))
        .collect();
    assert_eq!(in_document, [("ArrowLeft", '\u{E614}'), ("ArrowRight", '\u{E615}')]);

    let ttf = std::fs::read(built.path(FontFormat::Ttf).unwrap()).unwrap();
    let face = Face::parse(&ttf, 0).unwrap();
    assert_eq!(face.number_of_glyphs(), 3);
    assert_eq!(face.glyph_index('\u{E614}'), Some(GlyphId(1)));
    assert_eq!(face.glyph_name(GlyphId(2)), Some("ArrowRight"));
}

#[tokio::test]
async fn ttf_is_reproducible() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let assets = vec![asset("arrow-left", ARROW_LEFT), asset("circle", CIRCLE)];

    let mut outputs = Vec::new();
    for root in [first.path(), second.path()] {
        let pipeline = IconFontPipeline::new(PipelineConfig::new(root));
        let outcome = pipeline
            .build(&job("outline", assets.clone()), &CancellationToken::new())
            .await
            .unwrap();
        let BuildOutcome::Built(built) = outcome else {
            panic!("expected a build");
        };
        let bytes: Vec<Vec<u8>> = FontFormat::ALL
            .iter()
            .map(|f| std::fs::read(built.path(*f).unwrap()).unwrap())
            .collect();
        outputs.push(bytes);
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn malformed_collection_fails_alone() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = IconFontPipeline::new(PipelineConfig::new(root.path()));
    let jobs = vec![
        job("outline", vec![asset("arrow-left", ARROW_LEFT), asset("circle", CIRCLE)]),
        job("filled", vec![asset("arrow-left", ARROW_LEFT), asset("broken", BROKEN)]),
    ];

    let summary = pipeline.build_all(jobs, &CancellationToken::new()).await;
    assert!(!summary.is_success());

    let outline = summary.report("outline").unwrap();
    assert!(matches!(outline.result, Ok(BuildOutcome::Built(_))));
    assert_eq!(files_in(&root.path().join("outline")).len(), 5);

    let failures: Vec<_> = summary.failures().collect();
    assert_eq!(failures.len(), 1);
    let err = failures[0];
    assert_eq!(err.collection(), "filled");
    assert_eq!(err.stage(), Stage::Compose);
    assert_eq!(err.glyph(), Some("broken"));
    let message = err.to_string();
    assert!(message.contains("filled") && message.contains("broken"));

    assert!(files_in(&root.path().join("filled")).is_empty());
}

#[tokio::test]
async fn skip_policy_keeps_code_points_dense() {
    let root = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::new(root.path());
    config.malformed_glyphs = MalformedGlyphPolicy::Skip;
    let pipeline = IconFontPipeline::new(config);

    let job = job(
        "filled",
        vec![
            asset("arrow-left", ARROW_LEFT),
            asset("broken", BROKEN),
            asset("circle", CIRCLE),
        ],
    );
    let outcome = pipeline.build(&job, &CancellationToken::new()).await.unwrap();
    let BuildOutcome::Built(built) = outcome else {
        panic!("expected a build");
    };

    assert_eq!(built.skipped, ["broken"]);
    let glyphs: Vec<(&str, char)> = built
        .glyphs
        .iter()
        .map(|g| (g.name.as_str(), g.code_point))
        .collect();
    assert_eq!(glyphs, [("arrow-left", '\u{E614}'), ("circle", '\u{E615}')]);
}

#[tokio::test]
async fn empty_collection_is_a_no_op() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = IconFontPipeline::new(PipelineConfig::new(root.path()));

    let job = CollectionJob::new(
        CollectionTarget::new("Aviala Icons Empty", "aviala-icons-empty", "empty"),
        IconCollection::empty("empty"),
    );
    let outcome = pipeline.build(&job, &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, BuildOutcome::Empty { ref skipped } if skipped.is_empty()));
    assert!(!root.path().join("empty").exists());
}

#[tokio::test]
async fn cancelled_build_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = IconFontPipeline::new(PipelineConfig::new(root.path()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let job = job("outline", vec![asset("arrow-left", ARROW_LEFT)]);
    let err = pipeline.build(&job, &cancel).await.unwrap_err();

    assert_eq!(err.collection(), "outline");
    assert_eq!(err.stage(), Stage::Prepare);
    assert!(files_in(&root.path().join("outline")).is_empty());
}

#[tokio::test]
async fn failed_rebuild_keeps_previous_fonts() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = IconFontPipeline::new(PipelineConfig::new(root.path()));

    let good = job("outline", vec![asset("arrow-left", ARROW_LEFT)]);
    pipeline.build(&good, &CancellationToken::new()).await.unwrap();
    let ttf_path = root.path().join("outline/aviala-icons-outline.ttf");
    let before = std::fs::read(&ttf_path).unwrap();

    let bad = job("outline", vec![asset("arrow-left", ARROW_LEFT), asset("broken", BROKEN)]);
    pipeline.build(&bad, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(std::fs::read(&ttf_path).unwrap(), before);
    assert_eq!(files_in(&root.path().join("outline")).len(), 5);
}
