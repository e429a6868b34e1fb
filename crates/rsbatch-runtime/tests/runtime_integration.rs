//! Batchers built from loaded configuration, and their log output.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use rsbatch_core::{key_resolver, Batcher};
use rsbatch_runtime::observability::create_json_layer;
use rsbatch_runtime::RuntimeConfig;
use serial_test::serial;
use tempfile::NamedTempFile;

// ============================================================
// Helpers
// ============================================================

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: u32,
    name: String,
}

#[derive(Debug, thiserror::Error)]
#[error("user service unavailable")]
struct Unavailable;

type UserBatcher = Batcher<u32, Vec<User>, Option<User>, Unavailable>;

fn config_from_yaml(yaml: &str) -> RuntimeConfig {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{yaml}").unwrap();
    RuntimeConfig::load(file.path()).unwrap()
}

fn user_batcher(config: &RuntimeConfig, calls: &Arc<AtomicUsize>, fail: bool) -> UserBatcher {
    let calls = Arc::clone(calls);
    config
        .batcher
        .apply(Batcher::builder())
        .fetcher(move |ids: Vec<u32>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if fail {
                    return Err(Unavailable);
                }
                let users: Vec<User> = ids
                    .into_iter()
                    .map(|id| User {
                        id,
                        name: format!("user-{id}"),
                    })
                    .collect();
                Ok(users)
            }
        })
        .resolver(key_resolver(|user: &User| user.id))
        .build()
        .unwrap()
}

/// A writer that captures output to a shared buffer.
#[derive(Clone, Default)]
struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    /// Parsed JSON lines logged by `TracingObserver`.
    fn batcher_events(&self) -> Vec<serde_json::Value> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
            .filter(|json| json["fields"]["message"] == "batcher event")
            .collect()
    }
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` on a current-thread runtime with logs captured as JSON.
fn with_captured_logs<F, Fut>(f: F) -> CaptureWriter
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let writer = CaptureWriter::default();
    let subscriber = create_json_layer(writer.clone());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    tracing::subscriber::with_default(subscriber, || runtime.block_on(f()));
    writer
}

// ============================================================
// Configured batchers
// ============================================================

#[tokio::test]
#[serial]
async fn test_configured_size_bounded_scheduler() {
    // Arrange
    let config = config_from_yaml(
        r#"
batcher:
  name: users
  scheduler:
    kind: windowed_batch
    window_ms: 60000
    max_batch_size: 2
"#,
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let batcher = user_batcher(&config, &calls, false);

    // Act - batches fill long before the window would expire
    let results = join_all((1..=4).map(|id| batcher.fetch(id))).await;

    // Assert
    assert_eq!(batcher.name(), "users");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(results.into_iter().all(|r| r.unwrap().is_some()));
}

#[tokio::test]
#[serial]
async fn test_configured_immediate_scheduler() {
    let config = config_from_yaml(
        r#"
batcher:
  scheduler:
    kind: immediate
"#,
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let batcher = user_batcher(&config, &calls, false);

    let _ = join_all((1..=3).map(|id| batcher.fetch(id))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(batcher.name().starts_with("batcher:"));
}

#[tokio::test]
#[serial]
async fn test_default_config_coalesces_within_window() {
    let config = RuntimeConfig::from_env().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let batcher = user_batcher(&config, &calls, false);

    let (one, two) = tokio::join!(batcher.fetch(1), batcher.fetch(2));

    assert_eq!(one.unwrap().unwrap().name, "user-1");
    assert_eq!(two.unwrap().unwrap().name, "user-2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================
// Event tracing
// ============================================================

#[test]
#[serial]
fn test_trace_events_are_logged_as_json() {
    // Arrange
    let config = config_from_yaml(
        r#"
batcher:
  name: traced
  trace_events: true
"#,
    );
    let calls = Arc::new(AtomicUsize::new(0));

    // Act
    let writer = with_captured_logs(|| async {
        let batcher = user_batcher(&config, &calls, false);
        let (one, two) = tokio::join!(batcher.fetch(1), batcher.fetch(2));
        assert!(one.is_ok() && two.is_ok());
    });

    // Assert
    let events = writer.batcher_events();
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| e["fields"]["event"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["create", "queue", "queue", "fetch", "create", "data"]);
    assert!(events.iter().all(|e| e["fields"]["batcher"] == "traced"));

    let fetch = &events[3];
    assert_eq!(fetch["level"], "DEBUG");
    assert_eq!(fetch["fields"]["batch_size"], 2);
}

#[test]
#[serial]
fn test_fetch_failures_are_logged_at_warn() {
    let config = config_from_yaml(
        r#"
batcher:
  name: failing
  trace_events: true
  scheduler:
    kind: immediate
"#,
    );
    let calls = Arc::new(AtomicUsize::new(0));

    let writer = with_captured_logs(|| async {
        let batcher = user_batcher(&config, &calls, true);
        assert!(batcher.fetch(1).await.is_err());
    });

    let events = writer.batcher_events();
    let error = events.last().unwrap();
    assert_eq!(error["level"], "WARN");
    assert_eq!(error["fields"]["event"], "error");
    assert_eq!(error["fields"]["error"], "user service unavailable");
}

#[test]
#[serial]
fn test_events_are_silent_without_trace_events() {
    let config = RuntimeConfig::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let writer = with_captured_logs(|| async {
        let batcher = user_batcher(&config, &calls, false);
        assert!(batcher.fetch(1).await.is_ok());
    });

    assert!(writer.batcher_events().is_empty());
}
