//! File watching for hot reload.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use folio_pages::{is_page_source, SourceChange};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Repeats of the same change to the same file within this window are dropped.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches page sources and reports them as [`SourceChange`]s.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel to receive changes. Dropping the
    /// watcher stops the events.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<SourceChange>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            let mut recent: HashMap<(PathBuf, u8), Instant> = HashMap::new();

            while let Ok(event) = sync_rx.recv() {
                let now = Instant::now();
                recent.retain(|_, seen| now.duration_since(*seen) < DEBOUNCE);

                for change in classify_event(&event.kind, &event.paths) {
                    let key = (change.path().to_path_buf(), change_kind(&change));
                    if recent.insert(key, now).is_some() {
                        continue;
                    }
                    if async_tx.blocking_send(change).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Turn a notify event into page source changes.
fn classify_event(kind: &EventKind, paths: &[PathBuf]) -> Vec<SourceChange> {
    let changes = match kind {
        EventKind::Create(_) => paths.iter().cloned().map(SourceChange::Added).collect(),
        EventKind::Remove(_) => paths.iter().cloned().map(SourceChange::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.iter().cloned().map(SourceChange::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().cloned().map(SourceChange::Added).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths {
            [from, to] => vec![
                SourceChange::Removed(from.clone()),
                SourceChange::Added(to.clone()),
            ],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .map(|p| {
                if p.exists() {
                    SourceChange::Added(p.clone())
                } else {
                    SourceChange::Removed(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => paths.iter().cloned().map(SourceChange::Modified).collect(),
        _ => Vec::new(),
    };

    changes
        .into_iter()
        .filter(|change| is_page_source(change.path()))
        .collect()
}

fn change_kind(change: &SourceChange) -> u8 {
    match change {
        SourceChange::Added(_) => 0,
        SourceChange::Removed(_) => 1,
        SourceChange::Modified(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classifies_page_changes() {
        let page = PathBuf::from("/site/pages/a.md");
        let image = PathBuf::from("/site/pages/a.png");

        assert_eq!(
            classify_event(
                &EventKind::Create(CreateKind::File),
                &[page.clone(), image.clone()]
            ),
            vec![SourceChange::Added(page.clone())]
        );
        assert_eq!(
            classify_event(
                &EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &[page.clone()]
            ),
            vec![SourceChange::Modified(page.clone())]
        );

        let renamed = PathBuf::from("/site/pages/b.md");
        assert_eq!(
            classify_event(
                &EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[page.clone(), renamed.clone()]
            ),
            vec![SourceChange::Removed(page), SourceChange::Added(renamed)]
        );
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("test.md");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "# Created").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        let change = event.unwrap().expect("channel should not be closed");
        assert!(change.path().ends_with("test.md"));
    }
}
