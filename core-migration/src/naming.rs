//! # Recording Names
//!
//! The composed file name `{label}#{recording_id}#{display_name}.mp4` is the
//! only identity a staged recording carries across restarts. Cleaning keeps
//! the delimiter out of every field, so splitting on `#` always yields the
//! same three parts that went in.
//!
//! After discovery the destination object is renamed to a short canonical
//! name: the display field alone, or `{label}-{display}` when the object sits
//! in the overflow folder (where recordings from many courses share one
//! namespace).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{MigrationError, Result};

pub const FIELD_DELIMITER: char = '#';
pub const MEDIA_EXTENSION: &str = ".mp4";

/// Longest cleaned name kept before truncation.
pub const MAX_CLEAN_LEN: usize = 120;

/// Reduce a label or title to word characters and single dashes.
///
/// Punctuation is dropped, whitespace runs collapse to one `-`, trailing
/// whitespace disappears, and anything past [`MAX_CLEAN_LEN`] characters is
/// cut and marked with `...`.
pub fn clean_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    let mut collapsed = String::with_capacity(kept.len());
    let mut in_space = false;
    for c in kept.chars() {
        if c.is_whitespace() {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }

    let dashed = collapsed.trim_end().replace(' ', "-");
    if dashed.chars().count() > MAX_CLEAN_LEN {
        let mut truncated: String = dashed.chars().take(MAX_CLEAN_LEN).collect();
        truncated.push_str("...");
        truncated
    } else {
        dashed
    }
}

/// `{clean(label)}#{recording_id}#{clean(display_name)}.mp4`
pub fn compose_file_name(label: &str, recording_id: &str, display_name: &str) -> String {
    format!(
        "{}{d}{}{d}{}{}",
        clean_name(label),
        recording_id,
        clean_name(display_name),
        MEDIA_EXTENSION,
        d = FIELD_DELIMITER
    )
}

/// Short name for any destination object name.
///
/// Composed names are reduced to their display field; names without the
/// delimiter are already canonical and come back unchanged.
pub fn canonical_name(name: &str, overflow_label: Option<&str>) -> String {
    let mut fields = name.split(FIELD_DELIMITER);
    let (Some(_), Some(_), Some(display)) = (fields.next(), fields.next(), fields.next()) else {
        return name.to_string();
    };

    let display = display.strip_suffix(MEDIA_EXTENSION).unwrap_or(display);
    let short = display.split_whitespace().collect::<Vec<_>>().join("-");
    match overflow_label {
        Some(label) => format!("{}-{}", label, short),
        None => short,
    }
}

/// A recording downloaded from the source and waiting for transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    pub recording_id: String,
    /// Cleaned course label, as embedded in the file name
    pub course_label: String,
    /// Cleaned title, without extension
    pub display_name: String,
    pub path: PathBuf,
    /// Original creation time on the source, when the stager knew it
    pub created_at: Option<DateTime<Utc>>,
}

impl StagedFile {
    /// Recover identity from the file name alone.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidFileName`] unless the name splits into
    /// exactly three `#`-separated fields with a non-empty recording id.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MigrationError::InvalidFileName(path.display().to_string()))?
            .to_string();

        let fields: Vec<&str> = file_name.split(FIELD_DELIMITER).collect();
        if fields.len() != 3 || fields[1].is_empty() {
            return Err(MigrationError::InvalidFileName(file_name));
        }

        Ok(Self {
            recording_id: fields[1].to_string(),
            course_label: fields[0].to_string(),
            display_name: fields[2]
                .strip_suffix(MEDIA_EXTENSION)
                .unwrap_or(fields[2])
                .to_string(),
            path,
            created_at: None,
        })
    }

    /// Build the staged file a stager writes into `downloads_dir`.
    pub fn compose(
        downloads_dir: &Path,
        label: &str,
        recording_id: &str,
        display_name: &str,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            recording_id: recording_id.to_string(),
            course_label: clean_name(label),
            display_name: clean_name(display_name),
            path: downloads_dir.join(compose_file_name(label, recording_id, display_name)),
            created_at,
        }
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The long composed name, which is also the name the upload lands under.
    pub fn file_name(&self) -> String {
        format!(
            "{}{d}{}{d}{}{}",
            self.course_label,
            self.recording_id,
            self.display_name,
            MEDIA_EXTENSION,
            d = FIELD_DELIMITER
        )
    }

    /// Name after rename; label-prefixed in the overflow folder.
    pub fn canonical_name(&self, in_overflow: bool) -> String {
        let label = in_overflow.then_some(self.course_label.as_str());
        canonical_name(&self.file_name(), label)
    }
}

impl fmt::Display for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
