//! File watcher: debounced write-finish events feeding the Ingestor
//!
//! Grounded in the coalescing debounce-buffer pattern used for general
//! filesystem ingestion pipelines: collapse bursts of Created/Modified
//! events per path into a single "stable" event, emitted once the path
//! has been quiet for the debounce window.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionEventKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct IngestionEvent {
    pub path: PathBuf,
    pub kind: IngestionEventKind,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub debounce: Duration,
    pub queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            queue_capacity: 1024,
        }
    }
}

struct DebounceBuffer {
    debounce: Duration,
    pending: HashMap<PathBuf, (IngestionEventKind, Instant)>,
}

impl DebounceBuffer {
    fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: HashMap::new(),
        }
    }

    /// Coalesce a new raw event for `path`. A `Deleted` following a
    /// `Created` within the debounce window cancels both out - the file
    /// never stabilized.
    fn add(&mut self, path: PathBuf, kind: IngestionEventKind) {
        if kind == IngestionEventKind::Deleted {
            if let Some((IngestionEventKind::Created, _)) = self.pending.get(&path) {
                self.pending.remove(&path);
                return;
            }
        }
        self.pending.insert(path, (kind, Instant::now()));
    }

    fn drain_ready(&mut self) -> Vec<IngestionEvent> {
        let now = Instant::now();
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, ts))| now.duration_since(*ts) >= self.debounce)
            .map(|(path, _)| path.clone())
            .collect();

        ready
            .into_iter()
            .filter_map(|path| {
                self.pending.remove(&path).map(|(kind, _)| IngestionEvent { path, kind })
            })
            .collect()
    }

    fn drain_all(&mut self) -> Vec<IngestionEvent> {
        self.pending
            .drain()
            .map(|(path, (kind, _))| IngestionEvent { path, kind })
            .collect()
    }
}

/// `true` for paths the watcher must never route to ingestion: dotfiles
/// and the snapshot file name pattern.
pub fn is_excluded(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    name.starts_with('.') || (name.starts_with("cozo_memory_snapshot_") && name.ends_with(".yaml"))
}

fn classify(kind: &EventKind) -> Option<IngestionEventKind> {
    match kind {
        EventKind::Create(_) => Some(IngestionEventKind::Created),
        EventKind::Modify(_) => Some(IngestionEventKind::Modified),
        EventKind::Remove(_) => Some(IngestionEventKind::Deleted),
        _ => None,
    }
}

/// Watches `root` and forwards debounced, deduplicated events on a bounded
/// channel. Overflow drops the oldest queued event and logs a warning -
/// the next scan or restart re-ingests because the stored hash will still
/// disagree with the file's current content.
pub struct Watcher {
    _inner: RecommendedWatcher,
    pub receiver: mpsc::Receiver<IngestionEvent>,
}

impl Watcher {
    pub fn start(root: &Path, config: WatcherConfig) -> notify::Result<Self> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<(PathBuf, IngestionEventKind)>();

        let mut inner = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let Ok(event) = result else { return };
            let Some(kind) = classify(&event.kind) else { return };
            for path in event.paths {
                if is_excluded(&path) {
                    continue;
                }
                let _ = raw_tx.send((path, kind));
            }
        })?;
        inner.watch(root, RecursiveMode::Recursive)?;

        let (out_tx, out_rx) = mpsc::channel(config.queue_capacity);
        let debounce_window = config.debounce;

        tokio::spawn(async move {
            let mut buffer = DebounceBuffer::new(debounce_window);
            let mut tick = tokio::time::interval(Duration::from_millis(100));

            loop {
                tokio::select! {
                    maybe_event = raw_rx.recv() => {
                        match maybe_event {
                            Some((path, kind)) => buffer.add(path, kind),
                            None => break,
                        }
                    }
                    _ = tick.tick() => {
                        for event in buffer.drain_ready() {
                            if out_tx.try_send(event).is_err() {
                                tracing::warn!("ingestion queue full, dropping oldest pending event");
                            }
                        }
                    }
                }
            }

            for event in buffer.drain_all() {
                let _ = out_tx.try_send(event);
            }
        });

        Ok(Self {
            _inner: inner,
            receiver: out_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_dotfiles_and_snapshot_pattern() {
        assert!(is_excluded(Path::new(".hidden")));
        assert!(is_excluded(Path::new("backups/cozo_memory_snapshot_20260101.yaml")));
        assert!(!is_excluded(Path::new("notes/a.md")));
    }

    #[test]
    fn create_then_delete_within_window_cancels_out() {
        let mut buffer = DebounceBuffer::new(Duration::from_millis(100));
        let path = PathBuf::from("a.md");
        buffer.add(path.clone(), IngestionEventKind::Created);
        buffer.add(path.clone(), IngestionEventKind::Deleted);
        assert!(buffer.pending.is_empty());
    }

    #[test]
    fn repeated_modify_coalesces_to_one_pending_entry() {
        let mut buffer = DebounceBuffer::new(Duration::from_millis(100));
        let path = PathBuf::from("a.md");
        buffer.add(path.clone(), IngestionEventKind::Created);
        buffer.add(path.clone(), IngestionEventKind::Modified);
        assert_eq!(buffer.pending.len(), 1);
        assert_eq!(buffer.pending.get(&path).unwrap().0, IngestionEventKind::Modified);
    }
}
