//! Turns banner design documents into PNG files.
//!
//! A [`DesignDocument`] (gradient or photo background, a main headline, free text
//! boxes and vector design elements placed on a fixed canvas) is resolved into
//! pixels, laid out, assembled into a z-ordered [`SceneGraph`] and rasterized by
//! one of a bounded pool of backends. [`BannerEngine`] runs that pipeline with
//! per-stage timeouts and cancellation.

mod document;
pub mod edit;
mod error;
mod export;
mod fetch;
mod font;
pub mod geometry;
mod metrics;
mod path;
mod perf;
pub mod platform;
mod pool;
mod primitive;
mod raster;
mod scene;
mod service;
#[cfg(test)]
mod testing;
mod text;
mod types;

pub use document::{
    Background, BackgroundImage, DesignDocument, DesignElement, GradientColors, MainText,
    TextBox, WireBackgroundImage, WireDesignElement, WireDocument, WireFontWeight,
    WireTextElement, WireTextStyle,
};
pub use error::{
    BannerError, LayoutError, RenderFailure, ResourceFetchError, Result, ValidationError,
};
pub use export::{BannerStore, StoredBanner, banner_file_name};
pub use fetch::{ImageFetcher, RasterImage};
pub use font::{FontRef, FontRegistry, TextMeasurer, VerticalMetrics};
pub use geometry::RectSpec;
pub use metrics::RenderMetrics;
pub use path::PathSeg;
pub use platform::Platform;
pub use pool::{BackendPool, CancelToken, PooledBackend};
pub use primitive::{
    DecorationKind, DrawInstruction, FillStrokeStyle, IconKind, PaintedPath, Primitive,
    PrimitiveDescriptor, ShapeKind, StrokePaint,
};
pub use raster::{RasterBackend, RasterOutput};
pub use scene::{
    AssembleOptions, BackgroundImageState, BackgroundOp, CoverCrop, Degradation, DrawOp,
    SceneGraph, assemble,
};
pub use service::{RenderOptions, RenderOutcome, RenderRequest};
pub use text::{
    AnimationFrame, AnimationKind, FontWeight, PlacedWord, TextAlign, TextBlock, TextFill,
    TextLine, TextOutline, TextPaint, TextShadow, TextSpec, TextStyle,
};
pub use types::{
    CanvasSize, Color, PercentPoint, PixelPoint, PixelRect, RectF, Shading, ShadingStop,
};

use perf::PerfLogger;
use service::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OUTPUT_DIR: &str = "public/banners";
pub const DEFAULT_URL_PREFIX: &str = "/banners";
const OUTPUT_DIR_ENV: &str = "BANNERS_OUTPUT_DIR";
const MAX_DEFAULT_POOL: usize = 8;

/// Shared, cloneable handle to a configured render pipeline.
#[derive(Clone)]
pub struct BannerEngine {
    pipeline: Arc<Pipeline>,
}

impl std::fmt::Debug for BannerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BannerEngine")
            .field("pool", self.pipeline.pool())
            .field("store", self.pipeline.store())
            .field("fonts", &self.pipeline.fonts().len())
            .finish()
    }
}

impl BannerEngine {
    pub fn builder() -> BannerEngineBuilder {
        BannerEngineBuilder::new()
    }

    pub fn fonts(&self) -> &Arc<FontRegistry> {
        self.pipeline.fonts()
    }

    pub fn pool(&self) -> &BackendPool {
        self.pipeline.pool()
    }

    pub fn output_dir(&self) -> &std::path::Path {
        self.pipeline.store().dir()
    }

    /// Renders and stores one banner.
    pub async fn render(
        &self,
        request: RenderRequest,
        options: &RenderOptions,
    ) -> Result<RenderOutcome> {
        self.pipeline
            .run(request, options, &CancelToken::new())
            .await
    }

    /// Like [`render`](Self::render), aborting with `Cancelled` once `cancel` fires.
    pub async fn render_with_cancel(
        &self,
        request: RenderRequest,
        options: &RenderOptions,
        cancel: &CancelToken,
    ) -> Result<RenderOutcome> {
        self.pipeline.run(request, options, cancel).await
    }

    /// Parses a `{designDocument, canvasSize}` request and renders it.
    pub async fn render_json(&self, json: &str) -> Result<RenderOutcome> {
        let request = RenderRequest::from_json(json)?;
        self.render(request, &RenderOptions::default()).await
    }

    /// Builds the scene for `document` without rasterizing it. Image backgrounds
    /// are treated as not loaded.
    pub fn preview_scene(
        &self,
        document: &DesignDocument,
        options: &RenderOptions,
    ) -> Result<SceneGraph> {
        Ok(assemble(
            document,
            BackgroundImageState::NotRequested,
            self.fonts().as_ref(),
            &AssembleOptions {
                animation_time_ms: options.animation_time_ms,
            },
        )?)
    }
}

pub struct BannerEngineBuilder {
    font_dirs: Vec<PathBuf>,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(Vec<u8>, Option<String>)>,
    system_fonts: bool,
    output_dir: Option<PathBuf>,
    url_prefix: String,
    pool_size: usize,
    acquire_timeout: Duration,
    render_timeout: Duration,
    fetch_timeout: Duration,
    perf_enabled: bool,
    perf_path: Option<PathBuf>,
}

impl BannerEngineBuilder {
    pub fn new() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            system_fonts: true,
            output_dir: None,
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            pool_size: parallelism.clamp(1, MAX_DEFAULT_POOL),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            perf_enabled: false,
            perf_path: None,
        }
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    /// Registers an in-memory font. `name` is added as an extra lookup alias.
    pub fn register_font_bytes(mut self, data: Vec<u8>, name: Option<&str>) -> Self {
        self.font_bytes.push((data, name.map(str::to_string)));
        self
    }

    /// Whether unresolved families may fall back to fonts installed on the host.
    pub fn system_fonts(mut self, enabled: bool) -> Self {
        self.system_fonts = enabled;
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn perf_enabled(mut self, enabled: bool) -> Self {
        self.perf_enabled = enabled;
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<BannerEngine> {
        if self.pool_size == 0 {
            return Err(BannerError::InvalidConfiguration(
                "pool_size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("acquire_timeout", self.acquire_timeout),
            ("render_timeout", self.render_timeout),
            ("fetch_timeout", self.fetch_timeout),
        ] {
            if value.is_zero() {
                return Err(BannerError::InvalidConfiguration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let mut registry = FontRegistry::new();
        registry.set_system_fonts(self.system_fonts);
        for dir in &self.font_dirs {
            registry.register_dir(dir);
        }
        for file in &self.font_files {
            registry.register_file(file);
        }
        for (data, name) in self.font_bytes {
            if registry.register_bytes(data, name.as_deref()).is_none() {
                return Err(BannerError::InvalidConfiguration(format!(
                    "font bytes{} could not be parsed",
                    name.map(|n| format!(" for '{n}'")).unwrap_or_default()
                )));
            }
        }
        let fonts = Arc::new(registry);

        let fetcher = ImageFetcher::new(self.fetch_timeout).map_err(|err| {
            BannerError::InvalidConfiguration(format!("http client setup failed: {err}"))
        })?;
        let output_dir = self
            .output_dir
            .or_else(|| std::env::var_os(OUTPUT_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let perf = if self.perf_enabled || self.perf_path.is_some() {
            let path = self
                .perf_path
                .unwrap_or_else(|| PathBuf::from("bannerkit_perf.log"));
            Some(PerfLogger::new(&path).map_err(|err| {
                BannerError::InvalidConfiguration(format!(
                    "perf log {} could not be opened: {err}",
                    path.display()
                ))
            })?)
        } else {
            None
        };

        log::debug!(
            "banner engine: pool {}, {} registered fonts, output {}",
            self.pool_size,
            fonts.len(),
            output_dir.display()
        );
        let pool = BackendPool::new(self.pool_size, Arc::clone(&fonts), self.acquire_timeout);
        Ok(BannerEngine {
            pipeline: Arc::new(Pipeline::new(
                fonts,
                fetcher,
                pool,
                BannerStore::new(output_dir, self.url_prefix),
                self.render_timeout,
                perf,
            )),
        })
    }
}

impl Default for BannerEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(dir: &std::path::Path) -> BannerEngine {
        BannerEngine::builder()
            .output_dir(dir.join("banners"))
            .pool_size(2)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_rejects_zero_values() {
        let err = BannerEngine::builder().pool_size(0).build().unwrap_err();
        assert!(matches!(err, BannerError::InvalidConfiguration(_)));
        let err = BannerEngine::builder()
            .render_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("render_timeout"));
    }

    #[test]
    fn builder_rejects_unparseable_font_bytes() {
        let err = BannerEngine::builder()
            .register_font_bytes(b"not a font".to_vec(), Some("Broken"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[test]
    fn default_pool_is_bounded() {
        let builder = BannerEngineBuilder::default();
        assert!((1..=MAX_DEFAULT_POOL).contains(&builder.pool_size));
    }

    #[tokio::test]
    async fn renders_json_request_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let json = r##"{"canvasSize":{"width":1080,"height":1080},"designDocument":{
            "colors":["#ff5f6d","#ffc371"],
            "designElements":[
                {"id":"badge","type":"shape","shape":"star","x":40,"y":40,"width":200,"height":200},
                {"id":"spark","type":"decorative","element":"sparkle","x":800,"y":800,"width":120,"height":120,"opacity":0.6}
            ]}}"##;
        let outcome = engine.render_json(json).await.unwrap();
        assert_eq!((outcome.width, outcome.height), (1080, 1080));
        assert!(outcome.image_path.starts_with("/banners/banner_"));
        assert!(outcome.file_path.starts_with(std::fs::canonicalize(engine.output_dir()).unwrap()));
        let img = image::open(&outcome.file_path).unwrap();
        assert_eq!((img.width(), img.height()), (1080, 1080));
    }

    #[tokio::test]
    async fn perf_log_records_each_render() {
        let dir = tempfile::tempdir().unwrap();
        let perf_path = dir.path().join("perf.log");
        let engine = BannerEngine::builder()
            .output_dir(dir.path().join("banners"))
            .perf_log(&perf_path)
            .build()
            .unwrap();
        engine
            .render_json(r#"{"canvasSize":{"width":60,"height":30}}"#)
            .await
            .unwrap();
        let log = std::fs::read_to_string(&perf_path).unwrap();
        assert!(log.lines().any(|l| l.contains("\"render.raster\"")));
        assert!(log.lines().any(|l| l.contains("\"perf.counts\"")));
    }

    #[tokio::test]
    async fn validation_errors_are_not_generation_failures() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine(dir.path())
            .render_json(r#"{"canvasSize":{"width":0,"height":30}}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BannerError::Validation(ValidationError::InvalidCanvas { .. })
        ));
    }

    #[test]
    fn preview_scene_orders_layers() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let doc = DesignDocument::from_json(
            r#"{"designElements":[{"id":"a"},{"id":"b"}]}"#,
            Platform::Facebook.canvas(),
        )
        .unwrap();
        let scene = engine.preview_scene(&doc, &RenderOptions::default()).unwrap();
        assert_eq!(scene.draw_order(), vec!["a", "b"]);
    }
}
