use log::debug;
use path_clean::PathClean;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;

/// Root every request path is resolved against.
///
/// Resolution is plain concatenation followed by lexical cleaning. A path
/// containing `..` can still climb out of the root; no containment is
/// enforced here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDir {
    root: PathBuf,
}

impl BaseDir {
    pub fn new(requested_path: impl AsRef<Path>) -> Result<Self, String> {
        let requested_path = requested_path.as_ref();
        if !requested_path.is_dir() {
            return Err(format!(
                "Base directory does not exist: {}",
                requested_path.display()
            ));
        }
        let root = requested_path
            .canonicalize()
            .map_err(|e| format!("Failed to canonicalize base directory: {}", e))?;
        Ok(BaseDir { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: Option<&str>) -> PathBuf {
        let relative = relative.unwrap_or_default().trim_start_matches(['/', '\\']);
        if relative.is_empty() {
            return self.root.clone();
        }
        self.root.join(relative).clean()
    }
}

/// True only for an existing regular file. Directories do not count.
pub async fn file_exists(path: &Path) -> bool {
    tokio_fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

pub async fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    debug!("Reading file: {}", path.display());
    tokio_fs::read(path).await
}

/// Writes `contents` to `path`, creating missing parent directories and
/// replacing whatever was there before.
pub async fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    debug!("Writing {} bytes to {}", contents.len(), path.display());
    if let Some(parent) = path.parent() {
        tokio_fs::create_dir_all(parent).await?;
    }
    tokio_fs::write(path, contents).await
}

pub async fn remove_file(path: &Path) -> io::Result<()> {
    debug!("Removing file: {}", path.display());
    tokio_fs::remove_file(path).await
}
