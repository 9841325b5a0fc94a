use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Prefix of the scratch directory used when the archive is zipped.
pub const SCRATCH_PREFIX: &str = "slack-message-archiver";

const FILES_FOLDER: &str = "files";

/// Where one archive's pieces live on disk.
///
/// ```text
/// root/
///   {name}.xml
///   {name}_files/
///     slack-message-archive.xsl
///     files/{id}.{filetype}
/// ```
///
/// `root` is the output directory, or a scratch directory (removed on drop)
/// whose contents are zipped into the output directory.
#[derive(Debug)]
pub struct ArchiveLayout {
    name: String,
    output_dir: PathBuf,
    root: PathBuf,
    scratch: Option<TempDir>,
}

impl ArchiveLayout {
    /// Writes directly into `output_dir`.
    pub fn in_dir(output_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        let output_dir = output_dir.into();
        Self {
            name: name.into(),
            root: output_dir.clone(),
            output_dir,
            scratch: None,
        }
    }

    /// Writes into a fresh scratch directory under the system temp dir.
    pub fn scratch(output_dir: impl Into<PathBuf>, name: impl Into<String>) -> io::Result<Self> {
        let tmp = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        Ok(Self {
            name: name.into(),
            output_dir: output_dir.into(),
            root: tmp.path().to_path_buf(),
            scratch: Some(tmp),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    pub fn files_subdir_name(&self) -> String {
        format!("{}_files", self.name)
    }

    pub fn files_subdir(&self) -> PathBuf {
        self.root.join(self.files_subdir_name())
    }

    pub fn files_dir(&self) -> PathBuf {
        self.files_subdir().join(FILES_FOLDER)
    }

    /// Path of an attachment relative to `root`, as referenced from the XML.
    pub fn relative_file_path(&self, file_name: &str) -> String {
        format!("{}/{}/{}", self.files_subdir_name(), FILES_FOLDER, file_name)
    }

    pub fn xml_file_name(&self) -> String {
        format!("{}.xml", self.name)
    }

    pub fn xml_path(&self) -> PathBuf {
        self.root.join(self.xml_file_name())
    }

    pub fn zip_file_name(&self) -> String {
        format!("{}.zip", self.name)
    }

    pub fn zip_path(&self) -> PathBuf {
        self.output_dir.join(self.zip_file_name())
    }

    /// Creates `root`, the files subfolder and `files/`.
    pub fn create_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.files_dir())
    }

    /// Removes the scratch directory now, reporting failures. Layouts that
    /// write into the output directory are left untouched.
    pub fn cleanup(self) -> io::Result<()> {
        match self.scratch {
            Some(tmp) => tmp.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_layout_paths() {
        let layout = ArchiveLayout::in_dir("/out", "archive_general");
        assert!(!layout.is_scratch());
        assert_eq!(layout.root(), Path::new("/out"));
        assert_eq!(layout.files_subdir_name(), "archive_general_files");
        assert_eq!(layout.files_dir(), Path::new("/out/archive_general_files/files"));
        assert_eq!(layout.xml_path(), Path::new("/out/archive_general.xml"));
        assert_eq!(layout.zip_path(), Path::new("/out/archive_general.zip"));
        assert_eq!(
            layout.relative_file_path("F1.png"),
            "archive_general_files/files/F1.png"
        );
    }

    #[test]
    fn scratch_layout_is_removed_on_cleanup() {
        let out = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::scratch(out.path(), "archive_x").unwrap();
        assert!(layout.is_scratch());
        assert_ne!(layout.root(), out.path());
        assert_eq!(layout.zip_path(), out.path().join("archive_x.zip"));
        layout.create_dirs().unwrap();
        let root = layout.root().to_path_buf();
        assert!(root.join("archive_x_files/files").is_dir());
        layout.cleanup().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn scratch_layout_is_removed_on_drop() {
        let layout = ArchiveLayout::scratch("/unused", "archive_y").unwrap();
        layout.create_dirs().unwrap();
        let root = layout.root().to_path_buf();
        drop(layout);
        assert!(!root.exists());
    }

    #[test]
    fn direct_layout_cleanup_keeps_files() {
        let out = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::in_dir(out.path(), "archive_z");
        layout.create_dirs().unwrap();
        layout.cleanup().unwrap();
        assert!(out.path().join("archive_z_files/files").is_dir());
    }
}
