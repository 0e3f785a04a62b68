use std::fs;

use tracing::{info, warn};

use crate::decide::{
    DecisionProvider, ExistingArtifact, ExistingDestination, ExistingDirectory, MissingSource,
};
use crate::error::SeqvaultError;
use crate::fs_util;
use crate::registry::{
    CompressOutcome, CopyOutcome, DeleteOutcome, Direction, ErrorStatus, ServiceRegistry,
    UncompressOutcome,
};
use crate::transfer::FileTransfer;

const SCOUT_TABLE_ROWS: usize = 10;

/// Runs the five archive phases over the shared registry. Every phase
/// tolerates per-service failure: exceptions are caught at the service
/// boundary, recorded, and the batch continues.
pub struct PhaseRunner<'a> {
    decisions: &'a dyn DecisionProvider,
    transfer: &'a dyn FileTransfer,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(decisions: &'a dyn DecisionProvider, transfer: &'a dyn FileTransfer) -> Self {
        Self {
            decisions,
            transfer,
        }
    }

    /// Scout: measure uncompressed directory sizes wherever a copy exists and
    /// flag size drift between the two copies. Never fatal.
    pub fn scout(&self, registry: &mut ServiceRegistry) {
        info!("starting directory scouting");
        eprintln!("Extracting the size of the involved directories");
        eprintln!("Service ID\tDirectory size (GiB)\tFound in");

        let mut printed = 0usize;
        for (id, record) in registry.iter_mut() {
            let mut data_bytes = None;
            let mut archive_bytes = None;

            if record.in_data_dir {
                if let Some(path) = record.non_archived_path.clone() {
                    match fs_util::dir_size_bytes(&path) {
                        Ok(bytes) => data_bytes = Some(bytes),
                        Err(err) => {
                            warn!("service {id}: size scouting failed for {path}: {err}");
                            record.error_status =
                                ErrorStatus::error(format!("Size scouting failed: {err}"));
                        }
                    }
                }
            }
            if record.in_archive {
                if let Some(path) = record.archived_path.clone() {
                    match fs_util::dir_size_bytes(&path) {
                        Ok(bytes) => archive_bytes = Some(bytes),
                        Err(err) => {
                            warn!("service {id}: size scouting failed for {path}: {err}");
                            record.error_status =
                                ErrorStatus::error(format!("Size scouting failed: {err}"));
                        }
                    }
                }
            }

            record.non_archived_size = data_bytes.map(fs_util::bytes_to_gib);
            record.archived_size = archive_bytes.map(fs_util::bytes_to_gib);
            record.same_size = match (archive_bytes, data_bytes) {
                (Some(archive), Some(data)) => Some(archive == data),
                _ => None,
            };

            if printed < SCOUT_TABLE_ROWS {
                let size = record
                    .non_archived_size
                    .map(|gib| format!("{gib:.3}"))
                    .unwrap_or_else(|| "-".to_string());
                eprintln!("{id}\t{size}\t{}", record.located_summary());
                printed += 1;
            }
        }

        eprintln!(
            "Only the first {SCOUT_TABLE_ROWS} rows are shown here. The full data goes to the report."
        );
        info!("finished directory scouting");
    }

    /// Compress: produce `dir.tar.gz` next to each source directory. Partial
    /// artifacts from a failed run are removed before moving on; compression
    /// failures are usually disk space or permissions and are not retried.
    pub fn compress(
        &self,
        registry: &mut ServiceRegistry,
        direction: Direction,
    ) -> Result<(), SeqvaultError> {
        info!("starting compression ({direction})");
        let mut total_initial = 0.0f64;
        let mut total_compressed = 0.0f64;

        for (id, record) in registry.iter_mut() {
            let source_location = direction.source_location();
            if !record.located(source_location) || !record.error_status.is_clear() {
                info!(
                    "service {id}: not found in the {source_location} directory or has errors, skipping"
                );
                continue;
            }
            let Some(dir) = record.source_path(direction).map(|path| path.to_owned()) else {
                continue;
            };
            let artifact = fs_util::artifact_path_for(&dir);
            let initial_size = record.source_size(direction);

            if artifact.as_std_path().exists() {
                eprintln!("Service {id} has already been compressed at {artifact}");
                match self.decisions.on_existing_artifact(id, &artifact)? {
                    ExistingArtifact::Redo => {
                        if let Err(err) = fs::remove_file(artifact.as_std_path()) {
                            record.error_status = ErrorStatus::error(format!(
                                "Could not remove stale artifact {artifact}: {err}"
                            ));
                            continue;
                        }
                        info!("service {id}: removed stale {artifact}, compressing again");
                    }
                    ExistingArtifact::Skip => {
                        record.compressed = CompressOutcome::AlreadyDone;
                    }
                }
            }

            if record.compressed != CompressOutcome::AlreadyDone {
                eprintln!("Compressing service {id}");
                if let Err(err) = fs_util::create_targz(&artifact, &dir) {
                    eprintln!("Compression of service {id} failed, skipping to the next one");
                    if artifact.as_std_path().exists() {
                        if let Err(remove_err) = fs::remove_file(artifact.as_std_path()) {
                            warn!("service {id}: could not remove partial {artifact}: {remove_err}");
                        }
                    }
                    record.compressed = CompressOutcome::Failed(err.to_string());
                    record.error_status =
                        ErrorStatus::error(format!("Error while compressing the directory: {err}"));
                    continue;
                }
                record.compressed = CompressOutcome::Succeeded;
            }

            match fs_util::file_size_gib(&artifact) {
                Ok(compressed_size) => {
                    record.set_source_compressed_size(direction, compressed_size);
                    total_compressed += compressed_size;
                    if let Some(initial) = initial_size {
                        total_initial += initial;
                    }
                    info!(
                        "service {id}: compressed into {artifact} ({:.3} GiB -> {compressed_size:.3} GiB)",
                        initial_size.unwrap_or(0.0)
                    );
                }
                Err(err) => warn!("service {id}: could not size {artifact}: {err}"),
            }
        }

        let newly: Vec<&str> = registry
            .iter()
            .filter(|(_, rec)| rec.compressed == CompressOutcome::Succeeded)
            .map(|(id, _)| id)
            .collect();
        let already: Vec<&str> = registry
            .iter()
            .filter(|(_, rec)| rec.compressed == CompressOutcome::AlreadyDone)
            .map(|(id, _)| id)
            .collect();

        eprintln!("Compression finished");
        eprintln!(
            "Compressed {} services ({} newly compressed, {} already compressed)",
            newly.len() + already.len(),
            newly.len(),
            already.len()
        );
        eprintln!("Total initial size: {total_initial:.3} GiB");
        eprintln!("Total compressed size: {total_compressed:.3} GiB");
        eprintln!(
            "Saved space: {:.3} GiB",
            total_initial - total_compressed
        );
        info!(
            "finished compression ({direction}): {} newly compressed [{}], {} already compressed [{}]",
            newly.len(),
            newly.join(", "),
            already.len(),
            already.join(", ")
        );
        Ok(())
    }

    /// Transfer: move each source `.tar.gz` to the destination path and verify
    /// it with MD5. On a match the source artifact is deleted; on a mismatch
    /// or transport failure the destination artifact is deleted instead (never
    /// leave a known-corrupt artifact; the source is the last good copy).
    pub fn transfer(
        &self,
        registry: &mut ServiceRegistry,
        direction: Direction,
    ) -> Result<(), SeqvaultError> {
        info!("starting compressed service copy ({direction})");

        for (id, record) in registry.iter_mut() {
            let source_location = direction.source_location();
            if !record.located(source_location) || !record.error_status.is_clear() {
                info!(
                    "service {id}: not found in the {source_location} directory or has errors, skipping"
                );
                continue;
            }
            let (Some(origin), Some(destiny)) = (
                record.source_path(direction).map(|path| path.to_owned()),
                record.destination_path(direction).map(|path| path.to_owned()),
            ) else {
                continue;
            };
            let origin_artifact = fs_util::artifact_path_for(&origin);
            let destiny_artifact = fs_util::artifact_path_for(&destiny);

            if !origin_artifact.as_std_path().exists() {
                eprintln!("{origin_artifact} was not found in the origin directory");
                record.error_status = ErrorStatus::error("Compressed directory not found");
                match self.decisions.on_missing_source(id, &origin_artifact)? {
                    MissingSource::Skip => {
                        info!("service {id}: {origin_artifact} not found, skipped");
                        continue;
                    }
                    MissingSource::Abort => return Err(SeqvaultError::Aborted),
                }
            }

            if destiny_artifact.as_std_path().exists() {
                eprintln!("Service {id} seems to have been moved already ({destiny_artifact})");
                match self.decisions.on_existing_destination(id, &destiny_artifact)? {
                    ExistingDestination::Redo => {
                        if let Err(err) = fs::remove_file(destiny_artifact.as_std_path()) {
                            record.error_status = ErrorStatus::error(format!(
                                "Could not remove {destiny_artifact}: {err}"
                            ));
                            continue;
                        }
                        info!("service {id}: removed {destiny_artifact}, copying again");
                    }
                    ExistingDestination::Ignore => {
                        record.error_status =
                            ErrorStatus::error("Compressed directory found in destination, skipped");
                        continue;
                    }
                }
            }

            let origin_md5 = match fs_util::md5_of(&origin_artifact) {
                Ok(md5) => md5,
                Err(err) => {
                    record.error_status =
                        ErrorStatus::error(format!("Could not checksum {origin_artifact}: {err}"));
                    continue;
                }
            };
            record.set_source_md5(direction, origin_md5.clone());

            if let Err(err) = self.transfer.copy(&origin_artifact, &destiny_artifact) {
                // Treated like a checksum mismatch: the destination may hold a
                // partial file, the source is still the good copy.
                eprintln!("ERROR: {origin_artifact} could not be copied to {destiny_artifact}");
                if destiny_artifact.as_std_path().exists() {
                    if let Err(remove_err) = fs::remove_file(destiny_artifact.as_std_path()) {
                        warn!("service {id}: could not remove partial {destiny_artifact}: {remove_err}");
                    }
                }
                record.copied = CopyOutcome::Failed(err.to_string());
                record.error_status = ErrorStatus::error(format!("Copy error: {err}"));
                continue;
            }

            let destiny_md5 = match fs_util::md5_of(&destiny_artifact) {
                Ok(md5) => md5,
                Err(err) => {
                    record.error_status =
                        ErrorStatus::error(format!("Could not checksum {destiny_artifact}: {err}"));
                    continue;
                }
            };
            record.set_destination_md5(direction, destiny_md5.clone());

            if origin_md5 == destiny_md5 {
                eprintln!(
                    "Service {id}: data copied successfully from {origin_artifact} to \
                     {destiny_artifact} (MD5 {origin_md5}, identical on both sides)"
                );
                record.copied = CopyOutcome::Succeeded(direction);
                if let Err(err) = fs::remove_file(origin_artifact.as_std_path()) {
                    warn!("service {id}: could not remove {origin_artifact}: {err}");
                } else {
                    info!("service {id}: deleted {origin_artifact}");
                }
            } else {
                eprintln!(
                    "ERROR: service {id}: MD5 did not match after copy \
                     (origin {origin_md5}, destination {destiny_md5})"
                );
                record.copied = CopyOutcome::Mismatched;
                record.error_status = ErrorStatus::error("Copy error md5sum not matching");
                if let Err(err) = fs::remove_file(destiny_artifact.as_std_path()) {
                    warn!("service {id}: could not remove corrupt {destiny_artifact}: {err}");
                } else {
                    info!("service {id}: deleted {destiny_artifact}");
                }
            }
        }

        info!("finished compressed service copy ({direction})");
        Ok(())
    }

    /// Decompress: extract the destination `.tar.gz` into the parent of the
    /// target path and delete the now-redundant artifact.
    pub fn decompress(
        &self,
        registry: &mut ServiceRegistry,
        direction: Direction,
    ) -> Result<(), SeqvaultError> {
        info!("starting uncompression ({direction})");
        let mut uncompressed: Vec<String> = Vec::new();
        let mut already: Vec<String> = Vec::new();
        let mut missing: Vec<String> = Vec::new();

        for (id, record) in registry.iter_mut() {
            let source_location = direction.source_location();
            if !record.located(source_location) || !record.error_status.is_clear() {
                info!(
                    "service {id}: not found in the {source_location} directory or has errors, skipping"
                );
                continue;
            }
            let Some(target) = record.destination_path(direction).map(|path| path.to_owned())
            else {
                continue;
            };
            let artifact = fs_util::artifact_path_for(&target);

            if !artifact.as_std_path().exists() {
                eprintln!("The compressed service {artifact} could not be found");
                record.uncompressed = UncompressOutcome::MissingArtifact;
                record.error_status =
                    ErrorStatus::error("Error uncompressing, compressed file not found");
                missing.push(id.to_string());
                continue;
            }

            if target.as_std_path().exists() {
                eprintln!("Service {id} is already uncompressed at {target}");
                match self.decisions.on_existing_directory(id, &target)? {
                    ExistingDirectory::Redo => {
                        if let Err(err) = fs::remove_dir_all(target.as_std_path()) {
                            record.error_status = ErrorStatus::error(format!(
                                "Could not remove {target} before extraction: {err}"
                            ));
                            continue;
                        }
                        info!("service {id}: removed {target} to extract it again");
                    }
                    ExistingDirectory::Skip => {
                        record.uncompressed = UncompressOutcome::AlreadyDone;
                        already.push(id.to_string());
                        continue;
                    }
                }
            }

            let Some(parent) = target.parent().map(|parent| parent.to_owned()) else {
                record.error_status =
                    ErrorStatus::error(format!("No parent directory for {target}"));
                continue;
            };

            eprintln!("Uncompressing {artifact}");
            match fs_util::extract_targz(&artifact, &parent) {
                Ok(()) => {
                    if let Err(err) = fs::remove_file(artifact.as_std_path()) {
                        warn!("service {id}: could not remove {artifact}: {err}");
                    } else {
                        info!("service {id}: deleted {artifact}");
                    }
                    record.uncompressed = UncompressOutcome::Succeeded;
                    uncompressed.push(id.to_string());
                    eprintln!("Service {id} has been successfully uncompressed");
                }
                Err(err) => {
                    record.uncompressed = UncompressOutcome::Failed(err.to_string());
                    record.error_status =
                        ErrorStatus::error(format!("Error while uncompressing: {err}"));
                }
            }
        }

        eprintln!(
            "Uncompressed services: {}: {}",
            uncompressed.len(),
            uncompressed.join(", ")
        );
        if !already.is_empty() {
            eprintln!(
                "{} services were found already uncompressed: {}",
                already.len(),
                already.join(", ")
            );
        }
        if !missing.is_empty() {
            eprintln!(
                "{} services had no compressed file to uncompress: {}",
                missing.len(),
                missing.join(", ")
            );
        }
        info!("finished uncompression ({direction})");
        Ok(())
    }

    /// Cleanup: delete the non-archived directory, but only when the archived
    /// directory is confirmed present at the instant of the check. Never
    /// deletes the only remaining copy.
    pub fn cleanup(&self, registry: &mut ServiceRegistry) {
        info!("starting deletion of non-archived directories");

        for (id, record) in registry.iter_mut() {
            let (Some(non_archived), Some(archived)) = (
                record.non_archived_path.clone(),
                record.archived_path.clone(),
            ) else {
                continue;
            };
            if !non_archived.as_std_path().exists() {
                eprintln!("Service {id} is already gone from the data directory, nothing to delete");
                record.deleted = DeleteOutcome::NothingToDelete;
                continue;
            }
            if !archived.as_std_path().exists() {
                eprintln!("Archived path for service {id} does NOT exist, skipping deletion");
                record.deleted = DeleteOutcome::ArchiveMissing;
                continue;
            }
            eprintln!("Found archived copy of service {id}, deleting it from the data directory");
            match fs::remove_dir_all(non_archived.as_std_path()) {
                Ok(()) => {
                    record.deleted = DeleteOutcome::Succeeded;
                    info!("service {id}: deleted {non_archived}");
                }
                Err(err) => {
                    record.deleted = DeleteOutcome::Failed(err.to_string());
                    record.error_status =
                        ErrorStatus::error(format!("Error deleting {non_archived}: {err}"));
                }
            }
        }

        info!("finished deletion of non-archived directories");
    }
}
