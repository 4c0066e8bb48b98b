use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::json;

/// JSONL timing log. Each request writes `perf.span` / `perf.counts` lines; a
/// `<stem>_hot.log` ranking of the totals is written when the last handle drops.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

impl std::fmt::Debug for PerfLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.inner.lock().map(|s| s.path.clone()).ok();
        f.debug_struct("PerfLogger").field("path", &path).finish()
    }
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
                count_totals: HashMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, request_id: Option<u64>, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "request_id": request_id,
            "unit": "ms",
            "ms": round3(ms),
        });
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn log_counts(&self, name: &str, request_id: Option<u64>, counts: &[(&str, u64)]) {
        let map: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "request_id": request_id,
            "counts": map,
        });
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state.count_totals.entry(format!("{name}.{key}")).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (rank, (name, ms)) in spans.into_iter().take(100).enumerate() {
            let count = *self.span_counts.get(name).unwrap_or(&1);
            let avg = if count == 0 { 0.0 } else { ms / count as f64 };
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "unit": "ms",
                "agg": "sum",
                "ms": round3(*ms),
                "count": count,
                "avg_ms": round3(avg),
            });
            let _ = writeln!(writer, "{line}");
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, value)) in counts.into_iter().take(100).enumerate() {
            let line = json!({
                "type": "perf.hot.count",
                "rank": rank + 1,
                "name": name,
                "value": value,
            });
            let _ = writeln!(writer, "{line}");
        }
    }
}

fn round3(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("bannerkit_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_hot.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_log_sits_next_to_main_log() {
        assert_eq!(
            hot_path_for(Path::new("/tmp/out/perf.jsonl")),
            PathBuf::from("/tmp/out/perf_hot.log")
        );
        assert_eq!(hot_path_for(Path::new("perf")), PathBuf::from("perf_hot.log"));
    }

    #[test]
    fn writes_spans_and_ranked_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf.log");
        {
            let perf = PerfLogger::new(&path).unwrap();
            perf.log_span_ms("render.raster", Some(1), 12.5);
            perf.log_span_ms("render.fetch", Some(1), 2.0);
            perf.log_span_ms("render.raster", Some(2), 7.5);
            perf.log_counts("render", Some(1), &[("draw_ops", 4), ("png_bytes", 900)]);
            perf.flush();
        }
        let main = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = main
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["type"], "perf.span");
        assert_eq!(lines[0]["request_id"], 1);
        assert_eq!(lines[3]["counts"]["draw_ops"], 4);

        let hot = std::fs::read_to_string(dir.path().join("perf_hot.log")).unwrap();
        let first: serde_json::Value = serde_json::from_str(hot.lines().next().unwrap()).unwrap();
        assert_eq!(first["name"], "render.raster");
        assert_eq!(first["ms"], 20.0);
        assert_eq!(first["count"], 2);
    }
}
