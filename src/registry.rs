use std::collections::BTreeMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use clap::ValueEnum;

/// Direction of a run: archiving moves data dir -> archive, retrieval is the
/// mirror image. Every direction-parameterized phase resolves its source and
/// destination through this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Archive,
    Retrieve,
}

impl Direction {
    pub fn source_location(self) -> Location {
        match self {
            Direction::Archive => Location::DataDir,
            Direction::Retrieve => Location::Archive,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Archive => write!(f, "archive"),
            Direction::Retrieve => write!(f, "retrieve"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Archive,
    DataDir,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Archive => write!(f, "Archive"),
            Location::DataDir => write!(f, "Data dir"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompressOutcome {
    #[default]
    NotAttempted,
    AlreadyDone,
    Succeeded,
    Failed(String),
}

impl fmt::Display for CompressOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressOutcome::NotAttempted => write!(f, "No compression performed"),
            CompressOutcome::AlreadyDone => write!(f, "Found already compressed"),
            CompressOutcome::Succeeded => write!(f, "Successfully compressed"),
            CompressOutcome::Failed(reason) => write!(f, "Compression failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CopyOutcome {
    #[default]
    NotAttempted,
    Succeeded(Direction),
    Mismatched,
    Failed(String),
}

impl fmt::Display for CopyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyOutcome::NotAttempted => write!(f, "No movement performed"),
            CopyOutcome::Succeeded(direction) => write!(
                f,
                "Successfully copied (direction: {direction}), with matching MD5"
            ),
            CopyOutcome::Mismatched => write!(f, "Copied, MD5 NOT MATCHING"),
            CopyOutcome::Failed(reason) => write!(f, "Copy failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UncompressOutcome {
    #[default]
    NotAttempted,
    AlreadyDone,
    Succeeded,
    MissingArtifact,
    Failed(String),
}

impl fmt::Display for UncompressOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UncompressOutcome::NotAttempted => write!(f, "No uncompression performed"),
            UncompressOutcome::AlreadyDone => write!(
                f,
                "Was not uncompressed due to the presence of a previously uncompressed directory"
            ),
            UncompressOutcome::Succeeded => write!(f, "Uncompressed successfully"),
            UncompressOutcome::MissingArtifact => write!(
                f,
                "Could not be uncompressed, compressed file not found on destination"
            ),
            UncompressOutcome::Failed(reason) => write!(f, "Uncompression failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeleteOutcome {
    #[default]
    NotAttempted,
    NothingToDelete,
    ArchiveMissing,
    Succeeded,
    Failed(String),
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteOutcome::NotAttempted => write!(f, "No deletion performed"),
            DeleteOutcome::NothingToDelete => write!(f, "Nothing to delete, already removed"),
            DeleteOutcome::ArchiveMissing => {
                write!(f, "Archived copy missing, deletion skipped")
            }
            DeleteOutcome::Succeeded => write!(f, "Deleted from data directory"),
            DeleteOutcome::Failed(reason) => write!(f, "Deletion failed: {reason}"),
        }
    }
}

/// Terminal error marker. Once an error is recorded the service is skipped by
/// every later phase of the run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    #[default]
    Clear,
    Error(String),
}

impl ErrorStatus {
    pub fn error(message: impl Into<String>) -> Self {
        ErrorStatus::Error(message.into())
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, ErrorStatus::Clear)
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStatus::Clear => write!(f, "No errors detected"),
            ErrorStatus::Error(message) => write!(f, "{message}"),
        }
    }
}

/// Per-service status for one run. Paths are addresses computed once from
/// metadata; everything else is advanced by the phases.
#[derive(Debug, Clone, Default)]
pub struct ServiceRecord {
    pub id: String,
    pub found_in_system: Option<bool>,
    pub delivery_date: Option<NaiveDate>,
    pub archived_path: Option<Utf8PathBuf>,
    pub non_archived_path: Option<Utf8PathBuf>,
    pub in_archive: bool,
    pub in_data_dir: bool,
    pub archived_size: Option<f64>,
    pub non_archived_size: Option<f64>,
    pub archived_compressed_size: Option<f64>,
    pub non_archived_compressed_size: Option<f64>,
    pub same_size: Option<bool>,
    pub md5_archived: Option<String>,
    pub md5_non_archived: Option<String>,
    pub compressed: CompressOutcome,
    pub copied: CopyOutcome,
    pub uncompressed: UncompressOutcome,
    pub deleted: DeleteOutcome,
    pub error_status: ErrorStatus,
}

impl ServiceRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn located(&self, location: Location) -> bool {
        match location {
            Location::Archive => self.in_archive,
            Location::DataDir => self.in_data_dir,
        }
    }

    pub fn located_summary(&self) -> String {
        match (self.in_archive, self.in_data_dir) {
            (true, true) => "Archive,Data dir".to_string(),
            (true, false) => "Archive".to_string(),
            (false, true) => "Data dir".to_string(),
            (false, false) => "Not found in Archive or Data dir".to_string(),
        }
    }

    pub fn source_path(&self, direction: Direction) -> Option<&Utf8Path> {
        match direction {
            Direction::Archive => self.non_archived_path.as_deref(),
            Direction::Retrieve => self.archived_path.as_deref(),
        }
    }

    pub fn destination_path(&self, direction: Direction) -> Option<&Utf8Path> {
        match direction {
            Direction::Archive => self.archived_path.as_deref(),
            Direction::Retrieve => self.non_archived_path.as_deref(),
        }
    }

    pub fn source_size(&self, direction: Direction) -> Option<f64> {
        match direction {
            Direction::Archive => self.non_archived_size,
            Direction::Retrieve => self.archived_size,
        }
    }

    pub fn set_source_compressed_size(&mut self, direction: Direction, size_gib: f64) {
        match direction {
            Direction::Archive => self.non_archived_compressed_size = Some(size_gib),
            Direction::Retrieve => self.archived_compressed_size = Some(size_gib),
        }
    }

    pub fn set_source_md5(&mut self, direction: Direction, md5: String) {
        match direction {
            Direction::Archive => self.md5_non_archived = Some(md5),
            Direction::Retrieve => self.md5_archived = Some(md5),
        }
    }

    pub fn set_destination_md5(&mut self, direction: Direction, md5: String) {
        match direction {
            Direction::Archive => self.md5_archived = Some(md5),
            Direction::Retrieve => self.md5_non_archived = Some(md5),
        }
    }
}

/// The central mutable table of the run: id -> record, iterated in stable
/// (sorted) order so logs and reports line up between runs.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    records: BTreeMap<String, ServiceRecord>,
}

impl ServiceRegistry {
    pub fn insert(&mut self, id: &str) -> &mut ServiceRecord {
        self.records
            .entry(id.to_string())
            .or_insert_with(|| ServiceRecord::new(id))
    }

    pub fn get(&self, id: &str) -> Option<&ServiceRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ServiceRecord> {
        self.records.get_mut(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServiceRecord)> {
        self.records.iter().map(|(id, rec)| (id.as_str(), rec))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ServiceRecord)> {
        self.records.iter_mut().map(|(id, rec)| (id.as_str(), rec))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
