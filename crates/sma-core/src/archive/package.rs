//! Zip packaging of a finished archive folder.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::fetch::part_path;

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("walking {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Zips everything below `src` into `dest`, with entry names relative to
/// `src`. The zip is written to `dest.part` first and renamed when complete.
/// Returns the number of file entries written.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<usize, PackageError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let part = part_path(dest);
    match write_zip(src, &part) {
        Ok(count) => {
            fs::rename(&part, dest)?;
            tracing::debug!(dest = %dest.display(), entries = count, "archive zipped");
            Ok(count)
        }
        Err(e) => {
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}

fn write_zip(src: &Path, part: &Path) -> Result<usize, PackageError> {
    let mut writer = ZipWriter::new(File::create(part)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0usize;

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| PackageError::Walk {
            path: src.display().to_string(),
            source,
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut writer)?;
            files += 1;
        }
    }

    writer.finish()?;
    Ok(files)
}
