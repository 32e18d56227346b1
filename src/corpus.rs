//! Facilities for discovering input files and loading text corpora line by line.

use std::fs;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{Result, WeaveError};

/// Discovers files rooted at the provided input paths according to the ingest configuration.
///
/// Directories are traversed recursively by default; set [`IngestConfig::recursive`] to `false`
/// to limit discovery to the first level. Symlink traversal is controlled through
/// [`IngestConfig::follow_symlinks`]. Files found inside a directory are returned in name
/// order so repeated runs learn lines in the same sequence.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(WeaveError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .symlink_metadata()
            .map_err(|err| WeaveError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            let depth = if cfg.recursive { usize::MAX } else { 1 };
            let walker = WalkDir::new(path)
                .max_depth(depth)
                .follow_links(cfg.follow_symlinks)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry.map_err(|err| WeaveError::Internal(err.to_string()))?;
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if metadata.is_file() || (cfg.follow_symlinks && path.is_file()) {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(WeaveError::InvalidConfig(
            "no files discovered in provided inputs".into(),
        ));
    }
    Ok(files)
}

/// Splits raw text into lines, dropping line terminators and blank lines.
pub fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
    data.lines().filter(|line| !line.trim().is_empty())
}

/// Loads every non-blank line of the discovered files, in discovery order.
pub fn load_text_lines<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<Vec<u8>>> {
    let file_paths = collect_paths(inputs, cfg)?;
    let mut lines = Vec::new();
    for file_path in file_paths {
        let data = fs::read(&file_path).map_err(|err| WeaveError::io(err, Some(file_path)))?;
        lines.extend(split_lines(&data).map(<[u8]>::to_vec));
    }
    if lines.is_empty() {
        return Err(WeaveError::InvalidConfig(
            "no text lines could be loaded from inputs".into(),
        ));
    }
    Ok(lines)
}
