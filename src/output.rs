//! Output side of a conversion: the destination directory and the file the
//! PDF stream is written to.

use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Create the destination's parent directory (and its ancestors) if missing.
pub fn ensure_output_dir(output: &Path) -> Result<()> {
    let Some(dir) = output.parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() || dir == Path::new(".") || dir.is_dir() {
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(dir).map_err(|source| AppError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

fn resolve_destination(destination: &Path) -> PathBuf {
    match std::fs::symlink_metadata(destination) {
        Ok(meta) if meta.file_type().is_symlink() => {
            std::fs::canonicalize(destination).unwrap_or_else(|_| destination.to_path_buf())
        }
        _ => destination.to_path_buf(),
    }
}

/// Keep the mode of a file being replaced, otherwise 0644.
#[cfg(unix)]
fn output_permissions(destination: &Path) -> std::fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(destination)
        .map(|meta| meta.permissions())
        .unwrap_or_else(|_| std::fs::Permissions::from_mode(0o644))
}

/// Streams PDF bytes into a hidden temp file beside the destination and
/// moves it into place on [`PdfSink::commit`].
///
/// A sink that is dropped before commit removes its temp file, so a failed
/// conversion never leaves a truncated PDF at the destination.
pub struct PdfSink {
    file: File,
    temp_path: TempPath,
    destination: PathBuf,
    written: u64,
}

impl PdfSink {
    /// Open a temp file for `destination`. A symlinked destination is
    /// written through to its target.
    pub async fn create(destination: &Path) -> Result<Self> {
        let destination = resolve_destination(destination);
        let dir = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let create_error = |source| AppError::CreateOutput {
            path: destination.clone(),
            source,
        };
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(".html2pdf-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(create_error)?
            .into_parts();

        // Temp files start out owner-only
        #[cfg(unix)]
        file.set_permissions(output_permissions(&destination))
            .map_err(create_error)?;

        Ok(Self {
            file: File::from_std(file),
            temp_path,
            destination,
            written: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush, sync and rename over the destination, replacing any existing
    /// file. Returns the number of bytes written.
    pub async fn commit(mut self) -> Result<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        self.temp_path
            .persist(&self.destination)
            .map_err(|e| AppError::Write(e.error))?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_creates_nested_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("a").join("b").join("out.pdf");
        ensure_output_dir(&output).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }

    #[test]
    fn test_bare_file_name_needs_no_dir() {
        ensure_output_dir(Path::new("out.pdf")).unwrap();
        ensure_output_dir(Path::new("./out.pdf")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_output_dir_blocked_by_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let err = ensure_output_dir(&blocker.join("out.pdf")).unwrap_err();
        assert!(matches!(err, AppError::OutputDirectory { .. }));
    }

    #[tokio::test]
    async fn test_commit_writes_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let mut sink = PdfSink::create(&output).await.unwrap();
        sink.write_chunk(b"%PDF-1.4\n").await.unwrap();
        sink.write_chunk(b"%%EOF\n").await.unwrap();
        let written = sink.commit().await.unwrap();

        assert_eq!(written, 15);
        assert_eq!(fs::read(&output).unwrap(), b"%PDF-1.4\n%%EOF\n");
    }

    #[tokio::test]
    async fn test_commit_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        fs::write(&output, b"old contents that are longer").unwrap();

        let mut sink = PdfSink::create(&output).await.unwrap();
        sink.write_chunk(b"new").await.unwrap();
        sink.commit().await.unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_new_output_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let mut sink = PdfSink::create(&output).await.unwrap();
        sink.write_chunk(b"%PDF-1.4").await.unwrap();
        sink.commit().await.unwrap();

        let mode = fs::metadata(&output).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_overwrite_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        fs::write(&output, b"old").unwrap();
        fs::set_permissions(&output, fs::Permissions::from_mode(0o640)).unwrap();

        let mut sink = PdfSink::create(&output).await.unwrap();
        sink.write_chunk(b"new").await.unwrap();
        sink.commit().await.unwrap();

        let mode = fs::metadata(&output).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        assert_eq!(fs::read(&output).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_output_is_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.pdf");
        let link = dir.path().join("link.pdf");
        fs::write(&target, b"old").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let mut sink = PdfSink::create(&link).await.unwrap();
        sink.write_chunk(b"new").await.unwrap();
        sink.commit().await.unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_a_create_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("absent").join("out.pdf");

        let err = PdfSink::create(&output).await.err().unwrap();
        assert!(matches!(err, AppError::CreateOutput { .. }));
        assert!(err.to_string().starts_with("failed to create output file"));
    }

    #[tokio::test]
    async fn test_abandoned_sink_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");

        let mut sink = PdfSink::create(&output).await.unwrap();
        sink.write_chunk(b"%PDF-1.4 partial").await.unwrap();
        drop(sink);

        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
