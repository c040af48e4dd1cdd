//! Local file validation performed before any analysis request.

use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::upload_config::UploadConfig;

/// A local file chosen for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// File name without directories, sent as the multipart file name.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Size in bytes as reported by the filesystem.
    pub size: u64,
}

impl SelectedFile {
    /// Describe a file whose size is already known.
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path, size }
    }

    /// Read the file's metadata from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(CoreError::Validation(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }
        Ok(Self::new(path, metadata.len()))
    }

    /// Final extension, lower-cased, with the leading dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
    }

    /// Size formatted for display, e.g. `1.5 KB`.
    pub fn size_label(&self) -> String {
        format_file_size(self.size)
    }
}

/// Check a candidate against the allowed extensions and the size limit.
///
/// The size bound is inclusive: a file of exactly `max_file_size` bytes
/// is accepted.
pub fn validate_file(file: &SelectedFile, config: &UploadConfig) -> Result<(), CoreError> {
    let allowed = file
        .extension()
        .is_some_and(|ext| config.is_allowed_extension(&ext));
    if !allowed {
        return Err(CoreError::Validation(format!(
            "Please select a {} file",
            config.allowed_types_label()
        )));
    }

    if file.size > config.max_file_size {
        return Err(CoreError::Validation(format!(
            "File size exceeds {} limit",
            config.max_file_size_label()
        )));
    }

    Ok(())
}

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count with binary units and at most one decimal.
pub fn format_file_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, SIZE_UNITS[unit])
    } else {
        format!("{rounded:.1} {}", SIZE_UNITS[unit])
    }
}
