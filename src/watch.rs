//! Debounced filesystem watcher.
//!
//! Raw notify events land on a channel; paths coalesce in a pending set
//! until the debounce window closes, then one slice goes through the
//! incremental builder and is persisted. A failed slice is re-queued for
//! the next window. Shutdown drains the pending set before exiting.

use crate::index::IndexBuilder;
use crate::persist;
use crate::types::ProjectIndex;
use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Debounce window; events inside it coalesce into one slice.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

pub struct WatchOptions {
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Only content-affecting events feed the buffer.
fn is_relevant_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Repo-relative, forward-slash path for a watched event, or `None` for
/// paths outside the root and for our own output under `.context/`.
fn watched_rel_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.to_string_lossy().replace('\\', "/");
    if rel.is_empty() || rel == ".context" || rel.starts_with(".context/") {
        return None;
    }
    Some(rel)
}

/// Pending-path set with a single deadline. Paths coalesce until the
/// window closes; a failed slice goes back in and re-arms the window.
struct DebounceBuffer {
    pending: BTreeSet<String>,
    deadline: Option<Instant>,
    debounce: Duration,
}

impl DebounceBuffer {
    fn new(debounce: Duration) -> Self {
        Self {
            pending: BTreeSet::new(),
            deadline: None,
            debounce,
        }
    }

    /// Insert a path, arming the deadline on the first pending entry.
    fn insert(&mut self, rel: String) {
        self.pending.insert(rel);
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.debounce);
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the coalesced slice and disarm the deadline.
    fn take_slice(&mut self) -> Vec<String> {
        self.deadline = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Put a failed slice back and re-arm for the next window.
    fn requeue(&mut self, slice: Vec<String>) {
        self.pending.extend(slice);
        self.deadline = Some(Instant::now() + self.debounce);
    }
}

/// Run the watch loop until ctrl-c. The index is loaded from disk (or
/// built) first, then kept current slice by slice.
pub async fn watch(builder: &IndexBuilder, options: WatchOptions) -> Result<()> {
    let config = builder.config().clone();
    let root = config.project_root.clone();

    let mut index = match persist::load_index(&config.index_path())? {
        Some(index) => index,
        None => {
            let index = builder.full_build().await?;
            persist::save_index(&config.index_path(), &index)?;
            index
        }
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                tx.send(event).ok();
            }
            Err(e) => tracing::error!("watch error: {e}"),
        },
        notify::Config::default(),
    )
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;

    tracing::info!("watching {} (debounce {:?})", root.display(), options.debounce);

    let mut buffer = DebounceBuffer::new(options.debounce);

    loop {
        let sleep_for = buffer
            .deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down, draining pending paths");
                if !buffer.is_empty() {
                    let slice = buffer.take_slice();
                    process_slice(builder, &mut index, &slice).await.ok();
                }
                persist::save_index(&config.index_path(), &index)?;
                return Ok(());
            }

            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else {
                    return Ok(());
                };
                if !is_relevant_event(&event.kind) {
                    continue;
                }
                for path in &event.paths {
                    if let Some(rel) = watched_rel_path(&root, path) {
                        buffer.insert(rel);
                    }
                }
            }

            _ = tokio::time::sleep(sleep_for), if buffer.deadline().is_some() => {
                let slice = buffer.take_slice();
                if slice.is_empty() {
                    continue;
                }
                tracing::debug!("processing slice of {} paths", slice.len());

                match process_slice(builder, &mut index, &slice).await {
                    Ok(()) => {}
                    Err(e) => {
                        // Re-queue the slice for the next window; the
                        // previous on-disk state is untouched.
                        tracing::warn!("slice failed, re-queuing: {e}");
                        buffer.requeue(slice);
                    }
                }
            }
        }
    }
}

async fn process_slice(
    builder: &IndexBuilder,
    index: &mut ProjectIndex,
    slice: &[String],
) -> Result<()> {
    let report = builder.update_paths(index, slice).await?;
    persist::save_index(&builder.config().index_path(), index)?;
    tracing::info!(
        "updated index: {} reindexed, {} removed, {} unchanged",
        report.reindexed,
        report.removed,
        report.unchanged
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn event_kinds_filter() {
        assert!(is_relevant_event(&EventKind::Create(
            notify::event::CreateKind::File
        )));
        assert!(is_relevant_event(&EventKind::Remove(
            notify::event::RemoveKind::File
        )));
        assert!(!is_relevant_event(&EventKind::Access(
            notify::event::AccessKind::Read
        )));
    }

    #[test]
    fn rel_path_filters_outside_and_own_output() {
        let root = PathBuf::from("/repo");

        assert_eq!(
            watched_rel_path(&root, &root.join("src/lib.rs")),
            Some("src/lib.rs".to_string())
        );
        // Outside the root.
        assert_eq!(watched_rel_path(&root, Path::new("/elsewhere/x.rs")), None);
        // The root itself.
        assert_eq!(watched_rel_path(&root, &root), None);
        // Our own output must never feed the loop.
        assert_eq!(watched_rel_path(&root, &root.join(".context")), None);
        assert_eq!(
            watched_rel_path(
                &root,
                &root.join(".context/.project/PROJECT_INDEX.json")
            ),
            None
        );
    }

    #[test]
    fn buffer_coalesces_and_arms_once() {
        let mut buffer = DebounceBuffer::new(Duration::from_millis(750));
        assert!(buffer.is_empty());
        assert!(buffer.deadline().is_none());

        buffer.insert("a.rs".to_string());
        let armed = buffer.deadline().expect("armed on first insert");

        buffer.insert("b.rs".to_string());
        buffer.insert("a.rs".to_string());
        // Later inserts neither duplicate nor push the deadline out.
        assert_eq!(buffer.deadline(), Some(armed));

        let slice = buffer.take_slice();
        assert_eq!(slice, vec!["a.rs".to_string(), "b.rs".to_string()]);
        assert!(buffer.is_empty());
        assert!(buffer.deadline().is_none());
    }

    #[test]
    fn requeue_restores_slice_and_rearms() {
        let mut buffer = DebounceBuffer::new(Duration::from_millis(750));
        buffer.insert("a.rs".to_string());
        let slice = buffer.take_slice();
        assert!(buffer.deadline().is_none());

        buffer.requeue(slice);
        assert!(!buffer.is_empty());
        assert!(buffer.deadline().is_some());
        assert_eq!(buffer.take_slice(), vec!["a.rs".to_string()]);
    }
}
