//! Download directory: where reassembled files are written.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Fallback name for files whose announced name has no usable component.
const DEFAULT_FILE_NAME: &str = "download";

/// Writes completed files into a directory without overwriting anything.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    root: PathBuf,
}

impl DownloadDir {
    /// Open `root`, creating it if needed.
    pub async fn open(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create download directory: {}", root.display()))?;
        tracing::info!(download_dir = %root.display(), "download directory opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save `data` under the peer-announced `name`.
    ///
    /// Only the final path component of `name` is used. If the target
    /// exists, ` (1)`, ` (2)`, ... is inserted before the extension.
    pub async fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let file_name = sanitize_file_name(name);
        let mut attempt = 0u32;
        loop {
            let path = self.root.join(numbered_name(&file_name, attempt));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    use tokio::io::AsyncWriteExt;
                    file.write_all(data)
                        .await
                        .with_context(|| format!("failed to write file: {}", path.display()))?;
                    file.flush().await?;
                    tracing::info!(path = %path.display(), bytes = data.len(), "saved download");
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to create file: {}", path.display()));
                }
            }
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty() && n != "." && n != "..")
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

fn numbered_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{} ({attempt}).{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        ),
        _ => format!("{file_name} ({attempt})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_writes_file_contents() {
        let tmp = TempDir::new().unwrap();
        let dir = DownloadDir::open(tmp.path().join("downloads")).await.unwrap();

        let path = dir.save("report.pdf", b"%PDF").await.unwrap();
        assert_eq!(path, tmp.path().join("downloads").join("report.pdf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn save_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let dir = DownloadDir::open(tmp.path().to_path_buf()).await.unwrap();

        let first = dir.save("a.txt", b"one").await.unwrap();
        let second = dir.save("a.txt", b"two").await.unwrap();
        let third = dir.save("a.txt", b"three").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "a.txt");
        assert_eq!(second.file_name().unwrap(), "a (1).txt");
        assert_eq!(third.file_name().unwrap(), "a (2).txt");
        assert_eq!(tokio::fs::read(&first).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn save_strips_directory_components() {
        let tmp = TempDir::new().unwrap();
        let dir = DownloadDir::open(tmp.path().join("dl")).await.unwrap();

        let path = dir.save("../../etc/passwd", b"x").await.unwrap();
        assert_eq!(path, tmp.path().join("dl").join("passwd"));

        let path = dir.save("..", b"y").await.unwrap();
        assert_eq!(path.file_name().unwrap(), DEFAULT_FILE_NAME);
    }

    #[test]
    fn numbered_name_without_extension() {
        assert_eq!(numbered_name("README", 0), "README");
        assert_eq!(numbered_name("README", 3), "README (3)");
        assert_eq!(numbered_name("archive.tar.gz", 1), "archive.tar (1).gz");
    }
}
