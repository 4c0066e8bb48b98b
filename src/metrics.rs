use serde::Serialize;

/// Per-request timings, in milliseconds, plus output counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetrics {
    pub fetch_ms: f64,
    pub assemble_ms: f64,
    /// Time spent waiting for a pooled backend.
    pub wait_ms: f64,
    pub raster_ms: f64,
    pub export_ms: f64,
    pub draw_ops: usize,
    pub png_bytes: usize,
}

impl RenderMetrics {
    pub fn total_ms(&self) -> f64 {
        self.fetch_ms + self.assemble_ms + self.wait_ms + self.raster_ms + self.export_ms
    }

    pub(crate) fn spans(&self) -> [(&'static str, f64); 5] {
        [
            ("render.fetch", self.fetch_ms),
            ("render.assemble", self.assemble_ms),
            ("render.wait", self.wait_ms),
            ("render.raster", self.raster_ms),
            ("render.export", self.export_ms),
        ]
    }
}

pub(crate) fn elapsed_ms(start: std::time::Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
