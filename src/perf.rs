use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Stage timing log. Each span is a `perf.span` line; totals are written to `<stem>_hot.log`
/// when the last handle is dropped.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: BTreeMap<String, (f64, u64)>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: BTreeMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "unit": "ms",
            "ms": (ms * 1000.0).round() / 1000.0,
        });
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.span_totals.entry(name.to_string()).or_insert((0.0, 0));
            entry.0 += ms;
            entry.1 = entry.1.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    /// Runs `f` and records its wall time under `name`.
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.log_span_ms(name, started.elapsed().as_secs_f64() * 1000.0);
        out
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

/// Times `f` when a perf logger is configured, otherwise just runs it.
pub(crate) fn timed<T>(perf: Option<&PerfLogger>, name: &str, f: impl FnOnce() -> T) -> T {
    match perf {
        Some(perf) => perf.time(name, f),
        None => f(),
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);
        let mut spans: Vec<(&String, &(f64, u64))> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| {
            b.1.0
                .partial_cmp(&a.1.0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (rank, (name, (ms, count))) in spans.into_iter().enumerate() {
            let avg = if *count == 0 { 0.0 } else { ms / *count as f64 };
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "ms": (ms * 1000.0).round() / 1000.0,
                "count": count,
                "avg_ms": (avg * 1000.0).round() / 1000.0,
            });
            let _ = writeln!(writer, "{line}");
        }
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("certpress_perf.log");
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
    fn hot_path_keeps_directory_and_stem() {
        let hot = hot_path_for(Path::new("/tmp/run/perf.jsonl"));
        assert_eq!(hot, PathBuf::from("/tmp/run/perf_hot.log"));
        let bare = hot_path_for(Path::new("/tmp/run/perf"));
        assert_eq!(bare, PathBuf::from("/tmp/run/perf_hot.log"));
    }

    #[test]
    fn spans_and_hot_summary_are_written() {
        let dir = std::env::temp_dir().join(format!(
            "certpress_perf_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("perf.log");
        {
            let perf = PerfLogger::new(&path).expect("perf");
            let value = timed(Some(&perf), "compose", || 41 + 1);
            assert_eq!(value, 42);
            perf.log_span_ms("compose", 2.0);
            perf.flush();
        }
        let spans = std::fs::read_to_string(&path).expect("spans");
        assert_eq!(spans.lines().count(), 2);
        let hot = std::fs::read_to_string(dir.join("perf_hot.log")).expect("hot");
        let first: serde_json::Value =
            serde_json::from_str(hot.lines().next().expect("line")).expect("json");
        assert_eq!(first["name"], "compose");
        assert_eq!(first["count"], 2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
