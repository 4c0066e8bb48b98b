//! Bounded pool of raster backends and the cancellation token renders poll.
//!
//! A backend is only ever held by one render. Acquisition waits on a semaphore
//! (bounded by `acquire_timeout`) instead of creating extra backends, and the
//! guard returned by [`BackendPool::acquire`] hands the backend back on drop, so
//! release happens on success, error, timeout and panic alike.

use crate::error::RenderFailure;
use crate::font::FontRegistry;
use crate::raster::{RasterBackend, RasterOutput};
use crate::scene::SceneGraph;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Cooperative cancellation flag shared between a caller and a running render.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

struct PoolInner {
    idle: Mutex<Vec<RasterBackend>>,
    permits: Arc<Semaphore>,
    fonts: Arc<FontRegistry>,
    next_id: AtomicUsize,
    size: usize,
}

impl PoolInner {
    fn take_idle(&self) -> RasterBackend {
        let popped = match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };
        // A permit guarantees an idle backend; a fresh one covers a lost guard.
        popped.unwrap_or_else(|| {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            log::debug!("backend pool created replacement backend {id}");
            RasterBackend::new(id, Arc::clone(&self.fonts))
        })
    }

    fn put_back(&self, backend: RasterBackend) {
        match self.idle.lock() {
            Ok(mut idle) => idle.push(backend),
            Err(poisoned) => poisoned.into_inner().push(backend),
        }
    }
}

#[derive(Clone)]
pub struct BackendPool {
    inner: Arc<PoolInner>,
    acquire_timeout: Duration,
}

impl std::fmt::Debug for BackendPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendPool")
            .field("size", &self.inner.size)
            .field("available", &self.available())
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl BackendPool {
    pub fn new(size: usize, fonts: Arc<FontRegistry>, acquire_timeout: Duration) -> Self {
        let size = size.max(1);
        let idle = (0..size)
            .map(|id| RasterBackend::new(id, Arc::clone(&fonts)))
            .collect();
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(idle),
                permits: Arc::new(Semaphore::new(size)),
                fonts,
                next_id: AtomicUsize::new(size),
                size,
            }),
            acquire_timeout,
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Backends not currently checked out.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Waits for a free backend, failing with `PoolExhausted` after the acquire timeout.
    pub async fn acquire(&self) -> Result<PooledBackend, RenderFailure> {
        let start = Instant::now();
        let permits = Arc::clone(&self.inner.permits);
        let permit = match tokio::time::timeout(self.acquire_timeout, permits.acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(RenderFailure::Backend("backend pool closed".to_string())),
            Err(_) => {
                let waited_ms = start.elapsed().as_millis() as u64;
                log::warn!("no raster backend free after {waited_ms}ms");
                return Err(RenderFailure::PoolExhausted { waited_ms });
            }
        };
        let backend = self.inner.take_idle();
        log::debug!("acquired backend {}", backend.id());
        Ok(PooledBackend {
            backend: Some(backend),
            pool: Arc::clone(&self.inner),
            waited: start.elapsed(),
            in_render: false,
            _permit: permit,
        })
    }
}

/// Exclusive loan of a backend. Returned to the pool when dropped.
pub struct PooledBackend {
    backend: Option<RasterBackend>,
    pool: Arc<PoolInner>,
    waited: Duration,
    in_render: bool,
    // Declared last: released only after the backend is back in the idle list.
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBackend")
            .field("backend", &self.backend)
            .field("waited", &self.waited)
            .finish()
    }
}

impl PooledBackend {
    pub fn id(&self) -> Option<usize> {
        self.backend.as_ref().map(RasterBackend::id)
    }

    /// Time spent waiting in [`BackendPool::acquire`].
    pub fn waited(&self) -> Duration {
        self.waited
    }

    pub fn render(
        &mut self,
        scene: &SceneGraph,
        cancel: &CancelToken,
    ) -> Result<RasterOutput, RenderFailure> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| RenderFailure::Backend("backend already released".to_string()))?;
        self.in_render = true;
        let result = backend.render(scene, cancel);
        self.in_render = false;
        result
    }
}

impl Drop for PooledBackend {
    fn drop(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };
        if self.in_render {
            // Unwound out of a render: the surfaces are in an unknown state.
            log::debug!("backend {} reset after interrupted render", backend.id());
            backend.reset();
        }
        log::debug!("released backend {}", backend.id());
        self.pool.put_back(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DesignDocument;
    use crate::scene::{AssembleOptions, BackgroundImageState, assemble};
    use crate::testing::FixedMeasurer;
    use crate::types::CanvasSize;

    fn pool(size: usize, timeout_ms: u64) -> BackendPool {
        BackendPool::new(
            size,
            Arc::new(FontRegistry::new()),
            Duration::from_millis(timeout_ms),
        )
    }

    fn scene() -> SceneGraph {
        let doc = DesignDocument::from_json("{}", CanvasSize::new(64, 32)).unwrap();
        assemble(
            &doc,
            BackgroundImageState::NotRequested,
            &FixedMeasurer::default(),
            &AssembleOptions::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn guard_returns_backend_on_drop() {
        let pool = pool(2, 100);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.available(), 0);
        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn exhausted_pool_times_out() {
        let pool = pool(1, 30);
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, RenderFailure::PoolExhausted { waited_ms } if waited_ms >= 25));
    }

    #[tokio::test]
    async fn waiting_acquire_gets_released_backend() {
        let pool = pool(1, 2_000);
        let held = pool.acquire().await.unwrap();
        let id = held.id();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|b| b.id()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), id);
    }

    #[tokio::test]
    async fn cancelled_render_comes_back_clean() {
        let pool = pool(1, 100);
        let scene = scene();
        let mut backend = pool.acquire().await.unwrap();
        backend.render(&scene, &CancelToken::new()).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            backend.render(&scene, &token),
            Err(RenderFailure::Cancelled)
        ));
        drop(backend);

        let mut again = pool.acquire().await.unwrap();
        assert!(again.render(&scene, &CancelToken::new()).is_ok());
    }

    #[tokio::test]
    async fn cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
        // Already cancelled: resolves immediately.
        token.cancelled().await;
    }
}
