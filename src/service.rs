//! The async render pipeline: fetch, assemble, acquire, rasterize, persist.
//!
//! Each stage has its own bound. A background fetch failure degrades the render
//! to its gradient; everything after assembly fails the whole request with
//! [`BannerError::GenerationFailed`] and leaves no file behind.

use crate::document::{Background, DesignDocument, WireDocument};
use crate::error::{BannerError, RenderFailure, Result, ValidationError};
use crate::export::BannerStore;
use crate::fetch::ImageFetcher;
use crate::font::FontRegistry;
use crate::metrics::{RenderMetrics, elapsed_ms};
use crate::perf::PerfLogger;
use crate::pool::{BackendPool, CancelToken};
use crate::scene::{AssembleOptions, BackgroundImageState, Degradation, assemble};
use crate::types::CanvasSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One banner to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub document: DesignDocument,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(default)]
    design_document: WireDocument,
    canvas_size: WireCanvasSize,
}

#[derive(Debug, Deserialize)]
struct WireCanvasSize {
    width: i64,
    height: i64,
}

impl RenderRequest {
    pub fn new(document: DesignDocument) -> Self {
        Self { document }
    }

    /// Parses `{designDocument, canvasSize:{width,height}}`.
    pub fn from_json(json: &str) -> std::result::Result<Self, ValidationError> {
        let wire: WireRequest = serde_json::from_str(json)?;
        let invalid = || ValidationError::InvalidCanvas {
            width: wire.canvas_size.width,
            height: wire.canvas_size.height,
        };
        let width = u32::try_from(wire.canvas_size.width).map_err(|_| invalid())?;
        let height = u32::try_from(wire.canvas_size.height).map_err(|_| invalid())?;
        let document = DesignDocument::from_wire(&wire.design_document, CanvasSize::new(width, height))?;
        Ok(Self { document })
    }

    pub fn canvas(&self) -> CanvasSize {
        self.document.canvas
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderOptions {
    /// Freezes text animations at this many milliseconds in.
    pub animation_time_ms: Option<u64>,
}

/// A stored banner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutcome {
    /// Public reference, `<url_prefix>/<file name>`.
    pub image_path: String,
    pub file_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub degradations: Vec<Degradation>,
    pub metrics: RenderMetrics,
}

impl RenderOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

pub(crate) struct Pipeline {
    fonts: Arc<FontRegistry>,
    fetcher: ImageFetcher,
    pool: BackendPool,
    store: BannerStore,
    render_timeout: Duration,
    perf: Option<PerfLogger>,
    next_request: AtomicU64,
}

impl Pipeline {
    pub(crate) fn new(
        fonts: Arc<FontRegistry>,
        fetcher: ImageFetcher,
        pool: BackendPool,
        store: BannerStore,
        render_timeout: Duration,
        perf: Option<PerfLogger>,
    ) -> Self {
        Self {
            fonts,
            fetcher,
            pool,
            store,
            render_timeout,
            perf,
            next_request: AtomicU64::new(1),
        }
    }

    pub(crate) fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    pub(crate) fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub(crate) fn store(&self) -> &BannerStore {
        &self.store
    }

    pub(crate) async fn run(
        &self,
        request: RenderRequest,
        options: &RenderOptions,
        cancel: &CancelToken,
    ) -> Result<RenderOutcome> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let mut metrics = RenderMetrics::default();
        let document = request.document;
        crate::document::validate_canvas(document.canvas)?;

        let start = Instant::now();
        let background = match &document.background {
            Background::Image { image, .. } => match self.fetcher.fetch(&image.url).await {
                Ok(loaded) => BackgroundImageState::Loaded(loaded),
                Err(err) => BackgroundImageState::Failed(err),
            },
            Background::Gradient(_) => BackgroundImageState::NotRequested,
        };
        metrics.fetch_ms = elapsed_ms(start);
        if cancel.is_cancelled() {
            return Err(RenderFailure::Cancelled.into());
        }

        let start = Instant::now();
        let scene = assemble(
            &document,
            background,
            self.fonts.as_ref(),
            &AssembleOptions {
                animation_time_ms: options.animation_time_ms,
            },
        )?;
        metrics.assemble_ms = elapsed_ms(start);
        metrics.draw_ops = scene.ops.len();
        let degradations = scene.degradations.clone();

        let mut backend = tokio::select! {
            acquired = self.pool.acquire() => acquired?,
            _ = cancel.cancelled() => return Err(RenderFailure::Cancelled.into()),
        };
        metrics.wait_ms = backend.waited().as_secs_f64() * 1000.0;

        // The task owns the backend guard, so a timed-out render still returns
        // its backend once it notices the cancellation.
        let start = Instant::now();
        let render_token = CancelToken::new();
        let task_token = render_token.clone();
        let mut task = tokio::task::spawn_blocking(move || backend.render(&scene, &task_token));
        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = tokio::time::sleep(self.render_timeout) => {
                render_token.cancel();
                let ms = self.render_timeout.as_millis() as u64;
                log::warn!("render {request_id} exceeded {ms}ms, cancelling");
                return Err(RenderFailure::Timeout { ms }.into());
            }
            _ = cancel.cancelled() => {
                render_token.cancel();
                log::debug!("render {request_id} cancelled by caller");
                return Err(RenderFailure::Cancelled.into());
            }
        };
        let output = joined
            .map_err(|err| RenderFailure::Backend(format!("render task failed: {err}")))??;
        metrics.raster_ms = elapsed_ms(start);
        metrics.png_bytes = output.png.len();
        if cancel.is_cancelled() {
            return Err(RenderFailure::Cancelled.into());
        }

        let start = Instant::now();
        let store = self.store.clone();
        let (width, height) = (output.width, output.height);
        let stored = tokio::task::spawn_blocking(move || store.persist(&output))
            .await
            .map_err(|err| RenderFailure::Backend(format!("export task failed: {err}")))?
            .map_err(RenderFailure::Persist)?;
        metrics.export_ms = elapsed_ms(start);

        log::debug!(
            "render {request_id} -> {} in {:.1}ms (fetch {:.1}, assemble {:.1}, wait {:.1}, raster {:.1}, export {:.1})",
            stored.url,
            metrics.total_ms(),
            metrics.fetch_ms,
            metrics.assemble_ms,
            metrics.wait_ms,
            metrics.raster_ms,
            metrics.export_ms
        );
        self.record(request_id, &metrics);

        Ok(RenderOutcome {
            image_path: stored.url,
            file_path: stored.path,
            width,
            height,
            degradations,
            metrics,
        })
    }

    fn record(&self, request_id: u64, metrics: &RenderMetrics) {
        let Some(perf) = self.perf.as_ref() else {
            return;
        };
        for (name, ms) in metrics.spans() {
            perf.log_span_ms(name, Some(request_id), ms);
        }
        perf.log_counts(
            "render",
            Some(request_id),
            &[
                ("draw_ops", metrics.draw_ops as u64),
                ("png_bytes", metrics.png_bytes as u64),
            ],
        );
        perf.flush();
    }
}

impl std::str::FromStr for RenderRequest {
    type Err = BannerError;

    fn from_str(json: &str) -> Result<Self> {
        Ok(Self::from_json(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
        pipeline: Pipeline,
    }

    fn fixture(pool_size: usize, acquire_ms: u64, render_timeout: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let fonts = Arc::new(FontRegistry::new());
        let pipeline = Pipeline::new(
            Arc::clone(&fonts),
            ImageFetcher::new(Duration::from_secs(2)).unwrap(),
            BackendPool::new(pool_size, fonts, Duration::from_millis(acquire_ms)),
            BannerStore::new(dir.path().join("out"), "/banners"),
            render_timeout,
            None,
        );
        Fixture { dir, pipeline }
    }

    fn request(json: &str) -> RenderRequest {
        RenderRequest::from_json(json).unwrap()
    }

    fn stored_files(fx: &Fixture) -> usize {
        std::fs::read_dir(fx.dir.path().join("out"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    const SHAPES: &str = r##"{"canvasSize":{"width":320,"height":160},"designDocument":{
        "designElements":[{"id":"a","type":"shape","shape":"circle","x":10,"y":10,"width":60,"height":60}]}}"##;

    #[test]
    fn parses_wire_request() {
        let req = request(SHAPES);
        assert_eq!(req.canvas(), CanvasSize::new(320, 160));
        assert_eq!(req.document.design_elements.len(), 1);
        let parsed: RenderRequest = SHAPES.parse().unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn rejects_non_positive_canvas() {
        let err = RenderRequest::from_json(r#"{"canvasSize":{"width":-5,"height":10}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidCanvas {
                width: -5,
                height: 10
            }
        ));
        let err =
            RenderRequest::from_json(r#"{"canvasSize":{"width":0,"height":10}}"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCanvas { .. }));
    }

    #[tokio::test]
    async fn renders_and_stores_png() {
        let fx = fixture(1, 1_000, Duration::from_secs(30));
        let outcome = fx
            .pipeline
            .run(request(SHAPES), &RenderOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!((outcome.width, outcome.height), (320, 160));
        assert!(outcome.image_path.starts_with("/banners/banner_"));
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.metrics.draw_ops, 2);
        let png = std::fs::read(&outcome.file_path).unwrap();
        assert_eq!(png.len(), outcome.metrics.png_bytes);
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (320, 160));
        assert_eq!(fx.pipeline.pool().available(), 1);
    }

    #[tokio::test]
    async fn missing_background_image_degrades_to_gradient() {
        let fx = fixture(1, 1_000, Duration::from_secs(30));
        let json = r#"{"canvasSize":{"width":100,"height":50},
            "designDocument":{"backgroundImage":{"url":"/no/such/background.png"}}}"#;
        let outcome = fx
            .pipeline
            .run(request(json), &RenderOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(outcome.is_degraded());
        assert!(matches!(
            &outcome.degradations[0],
            Degradation::BackgroundImageDropped { url, .. } if url == "/no/such/background.png"
        ));
        assert!(outcome.file_path.exists());
    }

    #[tokio::test]
    async fn cancelled_request_leaves_nothing_behind() {
        let fx = fixture(1, 1_000, Duration::from_secs(30));
        let token = CancelToken::new();
        token.cancel();
        let err = fx
            .pipeline
            .run(request(SHAPES), &RenderOptions::default(), &token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BannerError::GenerationFailed(RenderFailure::Cancelled)
        ));
        assert_eq!(stored_files(&fx), 0);
        assert_eq!(fx.pipeline.pool().available(), 1);
    }

    #[tokio::test]
    async fn busy_pool_reports_exhaustion() {
        let fx = fixture(1, 20, Duration::from_secs(30));
        let _held = fx.pipeline.pool().acquire().await.unwrap();
        let err = fx
            .pipeline
            .run(request(SHAPES), &RenderOptions::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BannerError::GenerationFailed(RenderFailure::PoolExhausted { .. })
        ));
        assert_eq!(stored_files(&fx), 0);
    }

    #[tokio::test]
    async fn slow_render_times_out_and_backend_returns() {
        let fx = fixture(1, 10_000, Duration::from_nanos(1));
        let json = r#"{"canvasSize":{"width":2500,"height":2500},"designDocument":{}}"#;
        let err = fx
            .pipeline
            .run(request(json), &RenderOptions::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BannerError::GenerationFailed(RenderFailure::Timeout { .. })
        ));
        // The detached render notices the cancellation and releases its backend.
        let backend = fx.pipeline.pool().acquire().await.unwrap();
        assert!(backend.id().is_some());
        assert_eq!(stored_files(&fx), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_share_a_small_pool() {
        let fx = fixture(2, 10_000, Duration::from_secs(30));
        let pipeline = Arc::new(fx.pipeline);
        let mut tasks = Vec::new();
        for i in 0..6 {
            let pipeline = Arc::clone(&pipeline);
            let json = format!(
                r##"{{"canvasSize":{{"width":120,"height":60}},"designDocument":{{"colors":["#{i}{i}0000","#000000"]}}}}"##
            );
            tasks.push(tokio::spawn(async move {
                pipeline
                    .run(request(&json), &RenderOptions::default(), &CancelToken::new())
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(pipeline.pool().available(), 2);
        assert_eq!(std::fs::read_dir(fx.dir.path().join("out")).unwrap().count(), 6);
    }
}
