// Library ingestion: fingerprint book files so sync requests can find them by hash

mod pages;

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::{domain::hasher, domain::models::ScannedDocument, storage::DbStore};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub seen: usize,
    pub hashed: usize,
    pub unchanged: usize,
    /// Unreadable files, left out of the store
    pub unhashable: usize,
    /// Rows relinked to a book's new path
    pub moved: usize,
    /// Rows deleted because their file is gone
    pub removed: u64,
}

/// A book file as found on disk
struct BookFile {
    path: PathBuf,
    key: String,
    size: i64,
    modified: Option<DateTime<Utc>>,
}

pub struct LibraryScanner<'a> {
    store: &'a DbStore,
    root: PathBuf,
    extensions: Vec<String>,
}

impl<'a> LibraryScanner<'a> {
    pub fn new(store: &'a DbStore, root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            store,
            root: root.into(),
            extensions,
        }
    }

    /// Walk the library and bring the stored documents in line with it.
    ///
    /// Files with the same size and modification time as last scan are not re-read.
    /// A new path carrying the hash of a vanished one takes over that row, and rows
    /// for files no longer present are deleted.
    #[tracing::instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub async fn scan(&self) -> anyhow::Result<ScanStats> {
        // An unmounted library must not prune every row
        anyhow::ensure!(
            self.root.is_dir(),
            "library root is not a directory: {}",
            self.root.display()
        );
        tracing::info!("starting library scan");
        let start = std::time::Instant::now();

        let root = self.root.clone();
        let extensions = self.extensions.clone();
        let files = tokio::task::spawn_blocking(move || collect_books(&root, &extensions)).await?;
        let live_paths: HashSet<String> = files.iter().map(|f| f.key.clone()).collect();

        let mut stats = ScanStats::default();
        for file in files {
            stats.seen += 1;
            match self.ingest(file, &live_paths).await? {
                Ingested::Unchanged => stats.unchanged += 1,
                Ingested::Unhashable => stats.unhashable += 1,
                Ingested::Hashed { moved } => {
                    stats.hashed += 1;
                    if moved {
                        stats.moved += 1;
                    }
                }
            }
        }

        stats.removed = self.store.prune_documents(&live_paths).await?;

        tracing::info!(
            seen = stats.seen,
            hashed = stats.hashed,
            unchanged = stats.unchanged,
            unhashable = stats.unhashable,
            moved = stats.moved,
            removed = stats.removed,
            elapsed = ?start.elapsed(),
            "library scan complete"
        );
        Ok(stats)
    }

    async fn ingest(&self, file: BookFile, live_paths: &HashSet<String>) -> anyhow::Result<Ingested> {
        let existing = self.store.document_by_path(&file.key).await?;
        if let Some(existing) = &existing {
            if existing.koreader_hash.is_some()
                && existing.file_size == file.size
                && existing.file_modified == file.modified
            {
                return Ok(Ingested::Unchanged);
            }
        }

        let to_read = file.path.clone();
        let fingerprint = tokio::task::spawn_blocking(move || {
            hasher::hash_contents(&to_read).map(|hash| (hash, pages::count_pages(&to_read)))
        })
        .await?;
        let Some((hash, pages)) = fingerprint else {
            tracing::warn!(path = %file.key, "file has no identity, skipping");
            return Ok(Ingested::Unhashable);
        };

        let moved = existing.is_none()
            && self
                .store
                .relink_moved(&hash, &file.key, live_paths)
                .await?
                .is_some();
        if moved {
            tracing::info!(path = %file.key, "book moved, keeping its progress");
        }

        self.store
            .upsert_document(&ScannedDocument {
                title_hash: hasher::hash_title(&file.path).unwrap_or_default(),
                path: file.key,
                hash,
                file_size: file.size,
                file_modified: file.modified,
                pages,
            })
            .await?;
        Ok(Ingested::Hashed { moved })
    }
}

enum Ingested {
    Unchanged,
    Unhashable,
    Hashed { moved: bool },
}

fn collect_books(root: &Path, extensions: &[String]) -> Vec<BookFile> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|ext| extensions.iter().any(|allowed| *allowed == ext))
        })
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            let size = i64::try_from(meta.len()).ok()?;
            // Whole seconds survive the database round trip unchanged
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| DateTime::from_timestamp(DateTime::<Utc>::from(t).timestamp(), 0));
            let path = e.into_path();
            Some(BookFile {
                key: path.to_string_lossy().into_owned(),
                path,
                size,
                modified,
            })
        })
        .collect()
}

/// Rescan on a fixed interval; the startup scan covers the first tick.
pub fn spawn_periodic_scan(
    store: Arc<DbStore>,
    root: PathBuf,
    extensions: Vec<String>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let scanner = LibraryScanner::new(store.as_ref(), root.clone(), extensions.clone());
            if let Err(e) = scanner.scan().await {
                tracing::error!(error = ?e, "library rescan failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{self, File},
        time::{Duration, SystemTime},
    };

    use tempfile::tempdir;

    use super::*;
    use crate::{
        koreader_api::{
            models::ProgressUpdateRequestDto,
            services::progress::{DeviceInfo, ProgressSyncService},
        },
        storage::{DocumentRepo, ProgressRepo, db::memory_store},
    };

    fn exts() -> Vec<String> {
        vec!["epub".into(), "pdf".into()]
    }

    fn set_mtime(path: &Path, secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[tokio::test]
    async fn scan_records_matching_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("series")).unwrap();
        fs::write(dir.path().join("a.epub"), b"first book").unwrap();
        fs::write(dir.path().join("series").join("b.PDF"), b"second book").unwrap();
        fs::write(dir.path().join("notes.md"), b"not a book").unwrap();

        let store = memory_store().await;
        let stats = LibraryScanner::new(&store, dir.path(), exts())
            .scan()
            .await
            .unwrap();
        assert_eq!(stats.seen, 2);
        assert_eq!(stats.hashed, 2);

        let hash = hasher::hash_contents(&dir.path().join("a.epub")).unwrap();
        let doc = store.find_by_hash(&hash).await.unwrap().unwrap();
        assert!(doc.path.ends_with("a.epub"));
        assert!(
            store
                .document_by_path(&dir.path().join("notes.md").to_string_lossy())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn rescan_skips_unchanged_and_rehashes_changed() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("a.epub");
        fs::write(&book, b"first edition").unwrap();

        let store = memory_store().await;
        let scanner = LibraryScanner::new(&store, dir.path(), exts());
        scanner.scan().await.unwrap();

        let again = scanner.scan().await.unwrap();
        assert_eq!(again.unchanged, 1);
        assert_eq!(again.hashed, 0);

        fs::write(&book, b"second, longer edition").unwrap();
        let changed = scanner.scan().await.unwrap();
        assert_eq!(changed.hashed, 1);

        let hash = hasher::hash_contents(&book).unwrap();
        assert!(store.find_by_hash(&hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn same_size_edit_is_rehashed() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("a.epub");
        fs::write(&book, vec![b'a'; 5000]).unwrap();
        set_mtime(&book, 1_700_000_000);

        let store = memory_store().await;
        let scanner = LibraryScanner::new(&store, dir.path(), exts());
        scanner.scan().await.unwrap();
        let old_hash = hasher::hash_contents(&book).unwrap();

        fs::write(&book, vec![b'b'; 5000]).unwrap();
        set_mtime(&book, 1_700_000_060);
        let stats = scanner.scan().await.unwrap();
        assert_eq!(stats.unchanged, 0);
        assert_eq!(stats.hashed, 1);

        let new_hash = hasher::hash_contents(&book).unwrap();
        assert_ne!(new_hash, old_hash);
        assert!(store.find_by_hash(&new_hash).await.unwrap().is_some());
        assert!(store.find_by_hash(&old_hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn renamed_book_keeps_row_and_progress() {
        let dir = tempdir().unwrap();
        let old_path = dir.path().join("a.epub");
        fs::write(&old_path, b"a book that moves").unwrap();

        let store = memory_store().await;
        let user = store.ensure_user("reader", "key").await.unwrap();
        let scanner = LibraryScanner::new(&store, dir.path(), exts());
        scanner.scan().await.unwrap();

        let hash = hasher::hash_contents(&old_path).unwrap();
        let before = store.find_by_hash(&hash).await.unwrap().unwrap();
        let mut progress = crate::domain::models::Progress::fresh(before.id, user.id);
        progress.page_number = 6;
        store.set(&progress).await.unwrap();

        let new_path = dir.path().join("b.epub");
        fs::rename(&old_path, &new_path).unwrap();
        let stats = scanner.scan().await.unwrap();
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.removed, 0);

        let after = store.find_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.path, new_path.to_string_lossy());
        assert!(
            store
                .document_by_path(&old_path.to_string_lossy())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(store.get(after.id, user.id).await.unwrap(), Some(progress));
    }

    #[tokio::test]
    async fn deleted_book_is_pruned() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("a.epub");
        fs::write(&book, b"soon gone").unwrap();

        let store = memory_store().await;
        let scanner = LibraryScanner::new(&store, dir.path(), exts());
        scanner.scan().await.unwrap();
        let hash = hasher::hash_contents(&book).unwrap();

        fs::remove_file(&book).unwrap();
        let stats = scanner.scan().await.unwrap();
        assert_eq!(stats.removed, 1);
        assert!(store.find_by_hash(&hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_file_is_not_stored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vanished.epub");
        let key = path.to_string_lossy().into_owned();

        let store = memory_store().await;
        let scanner = LibraryScanner::new(&store, dir.path(), exts());
        let file = BookFile {
            path,
            key: key.clone(),
            size: 10,
            modified: None,
        };
        let live = HashSet::from([key.clone()]);

        let outcome = scanner.ingest(file, &live).await.unwrap();
        assert!(matches!(outcome, Ingested::Unhashable));
        assert!(store.document_by_path(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_root_fails_without_pruning() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.epub"), b"kept").unwrap();

        let store = memory_store().await;
        LibraryScanner::new(&store, dir.path(), exts())
            .scan()
            .await
            .unwrap();

        let gone = dir.path().join("unmounted");
        assert!(
            LibraryScanner::new(&store, &gone, exts())
                .scan()
                .await
                .is_err()
        );
        let hash = hasher::hash_contents(&dir.path().join("a.epub")).unwrap();
        assert!(store.find_by_hash(&hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scanned_epub_reports_percentage() {
        let dir = tempdir().unwrap();
        let book = dir.path().join("a.epub");
        pages::write_epub(&book, 20);

        let store = memory_store().await;
        let user = store.ensure_user("reader", "key").await.unwrap();
        LibraryScanner::new(&store, dir.path(), exts())
            .scan()
            .await
            .unwrap();

        let hash = hasher::hash_contents(&book).unwrap();
        assert_eq!(store.find_by_hash(&hash).await.unwrap().unwrap().pages, 20);

        let device = DeviceInfo {
            name: "kosync-bridge".into(),
            id: "install-1".into(),
        };
        let service = ProgressSyncService::new(&store, &store, &device);
        let update = ProgressUpdateRequestDto {
            document: hash.to_string(),
            progress: "/body/DocFragment[10]/body/div/a".into(),
            percentage: None,
            device: None,
            device_id: None,
        };
        service.save_progress(&update, user.id).await.unwrap();

        let dto = service.get_progress(hash.as_str(), user.id).await.unwrap();
        assert_eq!(dto.percentage, Some(0.5));
    }
}
