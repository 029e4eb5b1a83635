//! File operations inside the sandbox.
//!
//! [`FileService`] implements list, open (for download and preview), delete,
//! rename, create-folder and upload. Every operation takes [`ResolvedPath`]s,
//! so the containment check has already happened before any filesystem call.
//! Paths derived inside an operation (rename destination, new folder, upload
//! target) go through the resolver again.
//!
//! Operations are not transactional: a failure part way through a multi-step
//! operation leaves completed steps in place (e.g. directories created by an
//! upload whose write failed).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use filedeck_protocol::FileEntry;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{FileError, FileResult};
use super::resolver::{PathResolver, ResolvedPath};
use super::size::DirectorySizeAggregator;

/// File name prefix of in-progress uploads staged in the sandbox root.
pub const UPLOAD_TEMP_PREFIX: &str = ".filedeck-upload-";

/// A directory entry with its computed size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Whether this is a directory. Symbolic links are never directories.
    pub is_directory: bool,
    /// File length, or aggregated tree size for directories.
    pub size: u64,
}

impl DirectoryEntry {
    /// Convert to the wire representation.
    pub fn to_protocol(&self) -> FileEntry {
        FileEntry {
            name: self.name.clone(),
            is_directory: self.is_directory,
            size: self.size,
        }
    }
}

/// An opened file ready to be streamed to a client.
#[derive(Debug)]
pub struct OpenedFile {
    /// Open handle positioned at the start.
    pub file: File,
    /// File length in bytes.
    pub size: u64,
    /// File name used for `Content-Disposition` and type guessing.
    pub name: String,
}

/// An upload being received into a staging file in the sandbox root.
///
/// Finish with [`FileService::complete_upload`] or discard with
/// [`PendingUpload::cancel`]. Staging files orphaned by a dropped request are
/// removed by [`FileService::cleanup_stale_uploads`].
#[derive(Debug)]
pub struct PendingUpload {
    file: File,
    temp_path: PathBuf,
    written: u64,
}

impl PendingUpload {
    /// Append a chunk of content.
    pub async fn write_chunk(&mut self, data: &[u8]) -> FileResult<()> {
        self.file.write_all(data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Discard the upload and its staging file.
    pub async fn cancel(self) {
        drop(self.file);
        remove_temp(&self.temp_path).await;
        debug!(path = %self.temp_path.display(), "Cancelled upload");
    }
}

/// Sandboxed file operations.
#[derive(Debug, Clone)]
pub struct FileService {
    resolver: PathResolver,
    sizes: DirectorySizeAggregator,
}

impl FileService {
    /// Create a service over the resolver's sandbox root.
    pub fn new(resolver: PathResolver, sizes: DirectorySizeAggregator) -> Self {
        Self { resolver, sizes }
    }

    /// The resolver bound to this service's sandbox root.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Shorthand for [`PathResolver::resolve`].
    pub fn resolve(&self, relative: &str) -> FileResult<ResolvedPath> {
        self.resolver.resolve(relative)
    }

    /// List the immediate children of a directory.
    ///
    /// Directories come first, then files, both sorted case-insensitively.
    /// Entries that vanish or cannot be stat'ed while listing are skipped, as
    /// are staging files of in-progress uploads.
    ///
    /// A symbolic link is never a directory. Its size is the length of the
    /// regular file it points to, which is what a download of it returns,
    /// and zero for anything else.
    pub async fn list(&self, dir: &ResolvedPath) -> FileResult<Vec<DirectoryEntry>> {
        let metadata = fs::metadata(dir)
            .await
            .map_err(|e| FileError::from_io(e, dir.as_path()))?;
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(dir.as_path().to_path_buf()));
        }

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| FileError::from_io(e, dir.as_path()))?;

        let staging_dir = self.resolver.is_root(dir);
        let mut results = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FileError::from_io(e, dir.as_path()))?
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if staging_dir && name.starts_with(UPLOAD_TEMP_PREFIX) {
                continue;
            }

            // lstat: the entry itself, not a link target.
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping entry that cannot be stat'ed");
                    continue;
                }
            };

            let (is_directory, size) = if metadata.file_type().is_symlink() {
                (false, linked_file_len(&path).await)
            } else if metadata.is_dir() {
                (true, self.sizes.size_of(&path).await)
            } else {
                (false, metadata.len())
            };

            results.push(DirectoryEntry {
                name,
                is_directory,
                size,
            });
        }

        results.sort_by(|a, b| match (a.is_directory, b.is_directory) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });

        debug!(
            path = %self.resolver.relative(dir),
            count = results.len(),
            "Listed directory"
        );
        Ok(results)
    }

    /// Open a regular file for streaming.
    pub async fn open(&self, path: &ResolvedPath) -> FileResult<OpenedFile> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| FileError::from_io(e, path.as_path()))?;
        if !metadata.is_file() {
            return Err(FileError::NotAFile(path.as_path().to_path_buf()));
        }

        let file = File::open(path)
            .await
            .map_err(|e| FileError::from_io(e, path.as_path()))?;

        Ok(OpenedFile {
            file,
            size: metadata.len(),
            name: path.file_name().unwrap_or_default(),
        })
    }

    /// Delete a file, or a directory together with everything below it.
    ///
    /// The sandbox root itself cannot be deleted.
    pub async fn delete(&self, target: &ResolvedPath) -> FileResult<()> {
        if self.resolver.is_root(target) {
            warn!("Refusing to delete the sandbox root");
            return Err(FileError::Containment(String::new()));
        }

        let metadata = fs::symlink_metadata(target)
            .await
            .map_err(|e| FileError::from_io(e, target.as_path()))?;

        let removed = if metadata.is_dir() {
            fs::remove_dir_all(target).await
        } else {
            fs::remove_file(target).await
        };
        removed.map_err(|e| FileError::from_io(e, target.as_path()))?;

        info!(
            path = %self.resolver.relative(target),
            directory = metadata.is_dir(),
            "Deleted"
        );
        Ok(())
    }

    /// Rename an entry within its parent directory.
    ///
    /// An existing destination is refused. The existence check and the
    /// `rename` call are separate steps, so an entry created concurrently in
    /// between is replaced; no cross-request locking is done.
    pub async fn rename(&self, old: &ResolvedPath, new_name: &str) -> FileResult<ResolvedPath> {
        let destination = self.resolver.sibling(old, new_name)?;

        fs::symlink_metadata(old)
            .await
            .map_err(|e| FileError::from_io(e, old.as_path()))?;

        if fs::symlink_metadata(&destination).await.is_ok() {
            return Err(FileError::AlreadyExists(destination.as_path().to_path_buf()));
        }

        fs::rename(old, &destination)
            .await
            .map_err(|e| FileError::from_io(e, old.as_path()))?;

        info!(
            from = %self.resolver.relative(old),
            to = %self.resolver.relative(&destination),
            "Renamed"
        );
        Ok(destination)
    }

    /// Create a single folder inside an existing directory.
    pub async fn create_folder(
        &self,
        parent: &ResolvedPath,
        name: &str,
    ) -> FileResult<ResolvedPath> {
        let target = self.resolver.child(parent, name)?;

        fs::create_dir(&target).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileError::NotFound(parent.as_path().to_path_buf()),
            std::io::ErrorKind::NotADirectory => {
                FileError::NotADirectory(parent.as_path().to_path_buf())
            }
            _ => FileError::from_io(e, target.as_path()),
        })?;

        info!(path = %self.resolver.relative(&target), "Created folder");
        Ok(target)
    }

    /// Start receiving an upload.
    ///
    /// Content is staged in the sandbox root because the destination may not
    /// be known until the whole request has been read.
    pub async fn start_upload(&self) -> FileResult<PendingUpload> {
        let temp_path = self
            .resolver
            .root()
            .join(format!("{}{}.tmp", UPLOAD_TEMP_PREFIX, Uuid::new_v4()));

        let file = File::create(&temp_path).await?;
        debug!(path = %temp_path.display(), "Started upload");

        Ok(PendingUpload {
            file,
            temp_path,
            written: 0,
        })
    }

    /// Move a staged upload to `dest_dir/file_name`, creating missing
    /// directories.
    ///
    /// An existing file of the same name is replaced. The staging file is
    /// removed whether or not this succeeds.
    pub async fn complete_upload(
        &self,
        upload: PendingUpload,
        dest_dir: &ResolvedPath,
        file_name: &str,
    ) -> FileResult<ResolvedPath> {
        let PendingUpload {
            mut file,
            temp_path,
            written,
        } = upload;

        let result: FileResult<ResolvedPath> = async {
            file.flush().await?;
            file.sync_all().await?;
            drop(file);

            let target = self.prepare_upload_target(dest_dir, file_name).await?;
            move_into_place(&temp_path, &target).await?;
            Ok(target)
        }
        .await;

        match result {
            Ok(target) => {
                info!(
                    path = %self.resolver.relative(&target),
                    size = written,
                    "Uploaded file"
                );
                Ok(target)
            }
            Err(e) => {
                remove_temp(&temp_path).await;
                Err(e)
            }
        }
    }

    /// Remove staging files left behind by interrupted uploads.
    ///
    /// Returns the number of files removed.
    pub async fn cleanup_stale_uploads(&self) -> usize {
        let root = self.resolver.root();
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to scan for stale uploads");
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(UPLOAD_TEMP_PREFIX) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to remove stale upload")
                }
            }
        }

        if removed > 0 {
            info!(count = removed, "Removed stale upload files");
        }
        removed
    }

    async fn prepare_upload_target(
        &self,
        dest_dir: &ResolvedPath,
        file_name: &str,
    ) -> FileResult<ResolvedPath> {
        let target = self.resolver.child(dest_dir, file_name)?;

        if let Ok(existing) = fs::metadata(dest_dir).await {
            if !existing.is_dir() {
                return Err(FileError::NotADirectory(dest_dir.as_path().to_path_buf()));
            }
        }

        fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| FileError::from_io(e, dest_dir.as_path()))?;

        if let Ok(existing) = fs::symlink_metadata(&target).await {
            if existing.is_dir() {
                return Err(FileError::NotAFile(target.as_path().to_path_buf()));
            }
        }

        Ok(target)
    }
}

/// Length of the regular file a symlink points to, zero otherwise.
async fn linked_file_len(link: &Path) -> u64 {
    match fs::metadata(link).await {
        Ok(target) if target.is_file() => target.len(),
        Ok(_) => 0,
        Err(e) => {
            debug!(path = %link.display(), error = %e, "Dangling symlink");
            0
        }
    }
}

/// Rename `temp` onto `target`, copying when they are on different devices.
async fn move_into_place(temp: &Path, target: &ResolvedPath) -> FileResult<()> {
    match fs::rename(temp, target).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            fs::copy(temp, target)
                .await
                .map_err(|e| FileError::from_io(e, target.as_path()))?;
            remove_temp(temp).await;
            Ok(())
        }
        Err(e) => Err(FileError::from_io(e, target.as_path())),
    }
}

async fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to clean up temporary upload file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn service() -> (TempDir, FileService) {
        let temp_dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp_dir.path()).unwrap();
        (temp_dir, FileService::new(resolver, DirectorySizeAggregator::default()))
    }

    async fn upload_bytes(
        service: &FileService,
        dest: &ResolvedPath,
        name: &str,
        content: &[u8],
    ) -> FileResult<ResolvedPath> {
        let mut pending = service.start_upload().await.unwrap();
        pending.write_chunk(content).await.unwrap();
        service.complete_upload(pending, dest, name).await
    }

    fn root_file_count(temp_dir: &TempDir) -> usize {
        stdfs::read_dir(temp_dir.path()).unwrap().count()
    }

    async fn list_names(service: &FileService, relative: &str) -> Vec<String> {
        let dir = service.resolve(relative).unwrap();
        service
            .list(&dir)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[tokio::test]
    async fn test_list_reports_types_and_sizes() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("ten.bin"), [0u8; 10]).unwrap();
        stdfs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        stdfs::write(temp_dir.path().join("sub/five.bin"), [0u8; 5]).unwrap();

        let root = service.resolve("").unwrap();
        let entries = service.list(&root).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].to_protocol(), FileEntry::directory("sub", 5));
        assert_eq!(entries[1].to_protocol(), FileEntry::file("ten.bin", 10));
    }

    #[tokio::test]
    async fn test_list_sorting() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("zebra.txt"), "z").unwrap();
        stdfs::write(temp_dir.path().join("Apple.txt"), "a").unwrap();
        stdfs::create_dir_all(temp_dir.path().join("beta_dir")).unwrap();
        stdfs::create_dir_all(temp_dir.path().join("alpha_dir")).unwrap();

        let names = list_names(&service, "").await;
        assert_eq!(names, vec!["alpha_dir", "beta_dir", "Apple.txt", "zebra.txt"]);
    }

    #[tokio::test]
    async fn test_list_includes_hidden_entries() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join(".hidden"), "h").unwrap();

        assert_eq!(list_names(&service, "").await, vec![".hidden"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let (_temp_dir, service) = service();
        let dir = service.resolve("missing").unwrap();

        let result = service.list(&dir).await;
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_file_is_not_a_directory() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("file.txt"), "x").unwrap();

        let path = service.resolve("file.txt").unwrap();
        let result = service.list(&path).await;
        assert!(matches!(result, Err(FileError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_create_folder_then_list() {
        let (temp_dir, service) = service();
        let root = service.resolve("").unwrap();

        service.create_folder(&root, "x").await.unwrap();
        let entries = service.list(&root).await.unwrap();
        assert_eq!(entries[0].to_protocol(), FileEntry::directory("x", 0));

        stdfs::write(temp_dir.path().join("x/inner.txt"), [1u8; 7]).unwrap();
        let entries = service.list(&root).await.unwrap();
        assert_eq!(entries[0].to_protocol(), FileEntry::directory("x", 7));
    }

    #[tokio::test]
    async fn test_create_folder_invalid_names_touch_nothing() {
        let (temp_dir, service) = service();
        let root = service.resolve("").unwrap();

        for name in ["..", ".", "", "a/b", "../escape"] {
            let result = service.create_folder(&root, name).await;
            assert!(
                matches!(result, Err(FileError::InvalidName(_))),
                "expected InvalidName for {:?}",
                name
            );
        }

        assert_eq!(stdfs::read_dir(temp_dir.path()).unwrap().count(), 0);
        assert!(!temp_dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn test_create_folder_already_exists() {
        let (temp_dir, service) = service();
        stdfs::create_dir(temp_dir.path().join("x")).unwrap();
        let root = service.resolve("").unwrap();

        let result = service.create_folder(&root, "x").await;
        assert!(matches!(result, Err(FileError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_create_folder_missing_parent() {
        let (_temp_dir, service) = service();
        let parent = service.resolve("nope/deeper").unwrap();

        let result = service.create_folder(&parent, "x").await;
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_keeps_size() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("a.txt"), "hello world").unwrap();

        let old = service.resolve("a.txt").unwrap();
        service.rename(&old, "b.txt").await.unwrap();

        let root = service.resolve("").unwrap();
        let entries = service.list(&root).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to_protocol(), FileEntry::file("b.txt", 11));
    }

    #[tokio::test]
    async fn test_rename_nested_stays_in_parent() {
        let (temp_dir, service) = service();
        stdfs::create_dir_all(temp_dir.path().join("docs")).unwrap();
        stdfs::write(temp_dir.path().join("docs/a.txt"), "x").unwrap();

        let old = service.resolve("docs/a.txt").unwrap();
        let new = service.rename(&old, "b.txt").await.unwrap();

        assert_eq!(service.resolver().relative(&new), "docs/b.txt");
        assert!(temp_dir.path().join("docs/b.txt").exists());
    }

    #[tokio::test]
    async fn test_rename_missing_source() {
        let (_temp_dir, service) = service();
        let old = service.resolve("ghost.txt").unwrap();

        let result = service.rename(&old, "b.txt").await;
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_does_not_overwrite() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        stdfs::write(temp_dir.path().join("b.txt"), "b").unwrap();

        let old = service.resolve("a.txt").unwrap();
        let result = service.rename(&old, "b.txt").await;

        assert!(matches!(result, Err(FileError::AlreadyExists(_))));
        assert_eq!(stdfs::read_to_string(temp_dir.path().join("b.txt")).unwrap(), "b");
        assert!(temp_dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_rename_rejects_separator_names() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        let old = service.resolve("a.txt").unwrap();

        let result = service.rename(&old, "../../escaped.txt").await;
        assert!(matches!(result, Err(FileError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_rename_root_is_forbidden() {
        let (_temp_dir, service) = service();
        let root = service.resolve("").unwrap();

        let result = service.rename(&root, "elsewhere").await;
        assert!(matches!(result, Err(FileError::Containment(_))));
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let (_temp_dir, service) = service();
        let target = service.resolve("ghost").unwrap();

        let result = service.delete(&target).await;
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_nested_directory() {
        let (temp_dir, service) = service();
        stdfs::create_dir_all(temp_dir.path().join("tree/a/b")).unwrap();
        stdfs::write(temp_dir.path().join("tree/a/b/leaf.txt"), "leaf").unwrap();
        stdfs::write(temp_dir.path().join("keep.txt"), "keep").unwrap();

        let target = service.resolve("tree").unwrap();
        service.delete(&target).await.unwrap();

        assert!(!temp_dir.path().join("tree").exists());
        assert_eq!(list_names(&service, "").await, vec!["keep.txt"]);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("gone.txt"), "x").unwrap();

        let target = service.resolve("gone.txt").unwrap();
        service.delete(&target).await.unwrap();
        assert!(!temp_dir.path().join("gone.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_root_is_forbidden() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("keep.txt"), "x").unwrap();
        let root = service.resolve("").unwrap();

        let result = service.delete(&root).await;
        assert!(matches!(result, Err(FileError::Containment(_))));
        assert!(temp_dir.path().join("keep.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_symlink_removes_link_only() {
        use std::os::unix::fs::symlink;

        let (temp_dir, service) = service();
        let outside = TempDir::new().unwrap();
        stdfs::write(outside.path().join("precious.txt"), "x").unwrap();
        symlink(outside.path(), temp_dir.path().join("link")).unwrap();

        let target = service.resolve("link").unwrap();
        service.delete(&target).await.unwrap();

        assert!(outside.path().join("precious.txt").exists());
        assert!(stdfs::symlink_metadata(temp_dir.path().join("link")).is_err());
    }

    #[tokio::test]
    async fn test_upload_creates_missing_directories() {
        let (temp_dir, service) = service();
        let dest = service.resolve("missing/nested").unwrap();

        upload_bytes(&service, &dest, "file.txt", b"payload").await.unwrap();

        assert!(temp_dir.path().join("missing").is_dir());
        assert!(temp_dir.path().join("missing/nested").is_dir());
        assert_eq!(
            stdfs::read(temp_dir.path().join("missing/nested/file.txt")).unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn test_upload_overwrites_and_leaves_no_temp_files() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("file.txt"), "old content").unwrap();
        let root = service.resolve("").unwrap();

        upload_bytes(&service, &root, "file.txt", b"new").await.unwrap();

        assert_eq!(stdfs::read(temp_dir.path().join("file.txt")).unwrap(), b"new");
        assert_eq!(list_names(&service, "").await, vec!["file.txt"]);
    }

    #[tokio::test]
    async fn test_upload_rejects_path_in_file_name() {
        let (temp_dir, service) = service();
        let root = service.resolve("").unwrap();

        let result = upload_bytes(&service, &root, "../escape.txt", b"x").await;
        assert!(matches!(result, Err(FileError::InvalidName(_))));
        assert!(!temp_dir.path().join("../escape.txt").exists());
        assert_eq!(root_file_count(&temp_dir), 0);
    }

    #[tokio::test]
    async fn test_upload_onto_directory_fails() {
        let (temp_dir, service) = service();
        stdfs::create_dir(temp_dir.path().join("taken")).unwrap();
        let root = service.resolve("").unwrap();

        let result = upload_bytes(&service, &root, "taken", b"x").await;
        assert!(matches!(result, Err(FileError::NotAFile(_))));
    }

    #[tokio::test]
    async fn test_upload_under_a_file_fails() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("plain"), "x").unwrap();

        for dest in ["plain", "plain/sub"] {
            let dest = service.resolve(dest).unwrap();
            let result = upload_bytes(&service, &dest, "f.txt", b"x").await;
            assert!(
                matches!(result, Err(FileError::NotADirectory(_))),
                "expected NotADirectory, got {:?}",
                result
            );
        }

        assert_eq!(stdfs::read_to_string(temp_dir.path().join("plain")).unwrap(), "x");
        assert_eq!(root_file_count(&temp_dir), 1);
    }

    #[tokio::test]
    async fn test_upload_in_chunks() {
        let (temp_dir, service) = service();
        let root = service.resolve("").unwrap();

        let mut pending = service.start_upload().await.unwrap();
        pending.write_chunk(b"hello ").await.unwrap();
        pending.write_chunk(b"world").await.unwrap();
        assert_eq!(pending.written(), 11);

        service.complete_upload(pending, &root, "greeting.txt").await.unwrap();
        assert_eq!(
            stdfs::read_to_string(temp_dir.path().join("greeting.txt")).unwrap(),
            "hello world"
        );
        assert_eq!(root_file_count(&temp_dir), 1);
    }

    #[tokio::test]
    async fn test_pending_upload_is_hidden_and_cancel_removes_it() {
        let (temp_dir, service) = service();

        let mut pending = service.start_upload().await.unwrap();
        pending.write_chunk(b"partial").await.unwrap();

        assert_eq!(root_file_count(&temp_dir), 1);
        assert!(list_names(&service, "").await.is_empty());

        pending.cancel().await;
        assert_eq!(root_file_count(&temp_dir), 0);
    }

    #[tokio::test]
    async fn test_cleanup_stale_uploads() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("keep.txt"), "k").unwrap();
        stdfs::write(
            temp_dir.path().join(format!("{}orphan.tmp", UPLOAD_TEMP_PREFIX)),
            "stale",
        )
        .unwrap();

        assert_eq!(service.cleanup_stale_uploads().await, 1);
        assert_eq!(root_file_count(&temp_dir), 1);
        assert!(temp_dir.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_create_folder_under_file() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("plain"), "x").unwrap();
        let parent = service.resolve("plain").unwrap();

        let result = service.create_folder(&parent, "x").await;
        assert!(matches!(result, Err(FileError::NotADirectory(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_symlink_size_matches_download() {
        use std::os::unix::fs::symlink;

        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("big.bin"), [0u8; 1000]).unwrap();
        stdfs::create_dir(temp_dir.path().join("dir")).unwrap();
        stdfs::write(temp_dir.path().join("dir/inner.bin"), [0u8; 50]).unwrap();
        symlink(temp_dir.path().join("big.bin"), temp_dir.path().join("link.bin")).unwrap();
        symlink(temp_dir.path().join("dir"), temp_dir.path().join("link_dir")).unwrap();
        symlink(temp_dir.path().join("gone"), temp_dir.path().join("dangling")).unwrap();

        let root = service.resolve("").unwrap();
        let entries: Vec<FileEntry> = service
            .list(&root)
            .await
            .unwrap()
            .iter()
            .map(|e| e.to_protocol())
            .collect();

        assert_eq!(
            entries,
            vec![
                FileEntry::directory("dir", 50),
                FileEntry::file("big.bin", 1000),
                FileEntry::file("dangling", 0),
                FileEntry::file("link.bin", 1000),
                FileEntry::file("link_dir", 0),
            ]
        );

        let link = service.resolve("link.bin").unwrap();
        assert_eq!(service.open(&link).await.unwrap().size, 1000);
    }

    #[tokio::test]
    async fn test_open_reads_content() {
        let (temp_dir, service) = service();
        stdfs::write(temp_dir.path().join("read.me"), "Hello World").unwrap();

        let path = service.resolve("read.me").unwrap();
        let mut opened = service.open(&path).await.unwrap();

        assert_eq!(opened.size, 11);
        assert_eq!(opened.name, "read.me");
        let mut content = String::new();
        opened.file.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "Hello World");
    }

    #[tokio::test]
    async fn test_open_directory_is_not_a_file() {
        let (temp_dir, service) = service();
        stdfs::create_dir(temp_dir.path().join("dir")).unwrap();

        let path = service.resolve("dir").unwrap();
        let result = service.open(&path).await;
        assert!(matches!(result, Err(FileError::NotAFile(_))));
    }

    #[tokio::test]
    async fn test_open_missing() {
        let (_temp_dir, service) = service();
        let path = service.resolve("nothing.txt").unwrap();

        let result = service.open(&path).await;
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }
}
