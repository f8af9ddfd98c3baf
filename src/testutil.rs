use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Scratch site tree, removed when dropped.
pub(crate) struct TempSite {
    dir: TempDir,
}

impl TempSite {
    pub(crate) fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("sitesync-site-")
            .tempdir()
            .unwrap();
        Self { dir }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` at `rel`, creating parent directories.
    pub(crate) fn write(&self, rel: &str, contents: &str) {
        let file = self.path().join(rel);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(file, contents).unwrap();
    }
}
