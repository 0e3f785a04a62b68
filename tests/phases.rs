use std::fs;
use std::io::Write;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use seqvault::decide::FixedPolicy;
use seqvault::error::SeqvaultError;
use seqvault::fs_util;
use seqvault::phases::PhaseRunner;
use seqvault::registry::{
    CompressOutcome, CopyOutcome, DeleteOutcome, Direction, ErrorStatus, ServiceRegistry,
    UncompressOutcome,
};
use seqvault::transfer::FileTransfer;

/// Plain local copy standing in for rsync.
struct LocalCopy;

impl FileTransfer for LocalCopy {
    fn copy(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), SeqvaultError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| SeqvaultError::Transfer(err.to_string()))?;
        }
        fs::copy(source.as_std_path(), destination.as_std_path())
            .map(|_| ())
            .map_err(|err| SeqvaultError::Transfer(err.to_string()))
    }
}

/// Copies the file but appends a byte, so checksums never match.
struct CorruptingCopy;

impl FileTransfer for CorruptingCopy {
    fn copy(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), SeqvaultError> {
        LocalCopy.copy(source, destination)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(destination.as_std_path())
            .map_err(|err| SeqvaultError::Transfer(err.to_string()))?;
        file.write_all(b"!")
            .map_err(|err| SeqvaultError::Transfer(err.to_string()))?;
        Ok(())
    }
}

/// Leaves a partial destination file behind and reports a failure.
struct FailingCopy;

impl FileTransfer for FailingCopy {
    fn copy(&self, _source: &Utf8Path, destination: &Utf8Path) -> Result<(), SeqvaultError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| SeqvaultError::Transfer(err.to_string()))?;
        }
        fs::write(destination.as_std_path(), b"partial").unwrap();
        Err(SeqvaultError::Transfer("connection reset".to_string()))
    }
}

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// Registers a service with a populated data-dir directory and an archive
/// path that does not exist yet.
fn seed_service(
    registry: &mut ServiceRegistry,
    id: &str,
    data_root: &Utf8Path,
    archive_root: &Utf8Path,
) {
    let source = data_root.join(id);
    fs::create_dir_all(source.join("analysis").as_std_path()).unwrap();
    fs::write(source.join("readme.txt").as_std_path(), b"service data").unwrap();
    fs::write(
        source.join("analysis/calls.vcf").as_std_path(),
        b"chr1\t12345",
    )
    .unwrap();

    let record = registry.insert(id);
    record.non_archived_path = Some(source);
    record.archived_path = Some(archive_root.join(id));
    record.in_data_dir = true;
}

#[test]
fn full_archive_flow_reaches_the_archive_intact() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");
    fs::create_dir_all(archive_root.as_std_path()).unwrap();

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.scout(&mut registry);
    runner.compress(&mut registry, Direction::Archive).unwrap();
    runner.transfer(&mut registry, Direction::Archive).unwrap();
    runner.decompress(&mut registry, Direction::Archive).unwrap();

    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.compressed, CompressOutcome::Succeeded);
    assert_eq!(record.copied, CopyOutcome::Succeeded(Direction::Archive));
    assert_eq!(record.uncompressed, UncompressOutcome::Succeeded);
    assert_eq!(record.error_status, ErrorStatus::Clear);
    assert_eq!(record.md5_non_archived, record.md5_archived);
    assert!(record.non_archived_size.is_some());

    // Source artifact consumed, destination artifact consumed, tree restored.
    assert!(
        !fs_util::artifact_path_for(&data_root.join("SRVCNM001"))
            .as_std_path()
            .exists()
    );
    assert!(
        !fs_util::artifact_path_for(&archive_root.join("SRVCNM001"))
            .as_std_path()
            .exists()
    );
    let restored = archive_root.join("SRVCNM001");
    assert_eq!(
        fs::read(restored.join("readme.txt").as_std_path()).unwrap(),
        b"service data"
    );
    assert_eq!(
        fs::read(restored.join("analysis/calls.vcf").as_std_path()).unwrap(),
        b"chr1\t12345"
    );
    // The original data-dir copy is untouched by the archive flow itself.
    assert!(data_root.join("SRVCNM001").as_std_path().exists());
}

#[test]
fn compress_failure_does_not_abort_the_batch() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");
    fs::create_dir_all(data_root.as_std_path()).unwrap();

    let mut registry = ServiceRegistry::default();
    // A regular file where a directory is expected makes tar creation fail.
    fs::write(data_root.join("SRVCNM001").as_std_path(), b"not a dir").unwrap();
    let record = registry.insert("SRVCNM001");
    record.non_archived_path = Some(data_root.join("SRVCNM001"));
    record.archived_path = Some(archive_root.join("SRVCNM001"));
    record.in_data_dir = true;

    seed_service(&mut registry, "SRVCNM002", &data_root, &archive_root);

    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.compress(&mut registry, Direction::Archive).unwrap();

    let broken = registry.get("SRVCNM001").unwrap();
    assert_matches!(broken.compressed, CompressOutcome::Failed(_));
    assert_matches!(broken.error_status, ErrorStatus::Error(_));
    assert!(
        !fs_util::artifact_path_for(&data_root.join("SRVCNM001"))
            .as_std_path()
            .exists(),
        "partial artifact must be removed"
    );

    let healthy = registry.get("SRVCNM002").unwrap();
    assert_eq!(healthy.compressed, CompressOutcome::Succeeded);
    assert_eq!(healthy.error_status, ErrorStatus::Clear);

    // The errored service is skipped by the next phase.
    runner.transfer(&mut registry, Direction::Archive).unwrap();
    assert_eq!(
        registry.get("SRVCNM001").unwrap().copied,
        CopyOutcome::NotAttempted
    );
}

#[test]
fn compress_skips_services_already_in_error() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);
    registry.get_mut("SRVCNM001").unwrap().error_status =
        ErrorStatus::error("Size scouting failed: permission denied");

    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.compress(&mut registry, Direction::Archive).unwrap();

    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.compressed, CompressOutcome::NotAttempted);
    assert!(
        !fs_util::artifact_path_for(&data_root.join("SRVCNM001"))
            .as_std_path()
            .exists()
    );
}

#[test]
fn checksum_mismatch_removes_destination_and_keeps_source() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    let runner = PhaseRunner::new(&FixedPolicy, &CorruptingCopy);
    runner.compress(&mut registry, Direction::Archive).unwrap();
    runner.transfer(&mut registry, Direction::Archive).unwrap();

    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.copied, CopyOutcome::Mismatched);
    assert_eq!(
        record.error_status,
        ErrorStatus::error("Copy error md5sum not matching")
    );

    let source_artifact = fs_util::artifact_path_for(&data_root.join("SRVCNM001"));
    let destination_artifact = fs_util::artifact_path_for(&archive_root.join("SRVCNM001"));
    assert!(
        source_artifact.as_std_path().exists(),
        "source is the last good copy"
    );
    assert!(
        !destination_artifact.as_std_path().exists(),
        "corrupt destination must not be left behind"
    );
}

#[test]
fn transport_failure_is_recorded_and_cleaned_up() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    let runner = PhaseRunner::new(&FixedPolicy, &FailingCopy);
    runner.compress(&mut registry, Direction::Archive).unwrap();
    runner.transfer(&mut registry, Direction::Archive).unwrap();

    let record = registry.get("SRVCNM001").unwrap();
    assert_matches!(record.copied, CopyOutcome::Failed(_));
    assert_matches!(record.error_status, ErrorStatus::Error(_));
    assert!(
        fs_util::artifact_path_for(&data_root.join("SRVCNM001"))
            .as_std_path()
            .exists()
    );
    assert!(
        !fs_util::artifact_path_for(&archive_root.join("SRVCNM001"))
            .as_std_path()
            .exists()
    );
}

#[test]
fn transfer_with_missing_artifact_skips_under_fixed_policy() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    // No compress pass: the source .tar.gz does not exist.
    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.transfer(&mut registry, Direction::Archive).unwrap();

    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.copied, CopyOutcome::NotAttempted);
    assert_eq!(
        record.error_status,
        ErrorStatus::error("Compressed directory not found")
    );
}

#[test]
fn skip_prompts_regenerates_an_existing_artifact() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    let artifact = fs_util::artifact_path_for(&data_root.join("SRVCNM001"));
    fs::write(artifact.as_std_path(), b"stale junk").unwrap();

    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.compress(&mut registry, Direction::Archive).unwrap();

    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.compressed, CompressOutcome::Succeeded);
    assert_ne!(fs::read(artifact.as_std_path()).unwrap(), b"stale junk");
}

#[test]
fn cleanup_never_deletes_the_only_copy() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.cleanup(&mut registry);

    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.deleted, DeleteOutcome::ArchiveMissing);
    assert!(data_root.join("SRVCNM001").as_std_path().exists());

    // Once the archived copy exists the deletion is allowed.
    fs::create_dir_all(archive_root.join("SRVCNM001").as_std_path()).unwrap();
    runner.cleanup(&mut registry);
    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.deleted, DeleteOutcome::Succeeded);
    assert!(!data_root.join("SRVCNM001").as_std_path().exists());

    // Re-running is a no-op success, not an error.
    runner.cleanup(&mut registry);
    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.deleted, DeleteOutcome::NothingToDelete);
}

#[test]
fn decompress_without_artifact_records_the_miss() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.decompress(&mut registry, Direction::Archive).unwrap();

    let record = registry.get("SRVCNM001").unwrap();
    assert_eq!(record.uncompressed, UncompressOutcome::MissingArtifact);
    assert_matches!(record.error_status, ErrorStatus::Error(_));
}

#[test]
fn scout_flags_size_drift_between_copies() {
    let temp = tempfile::tempdir().unwrap();
    let data_root = utf8(temp.path()).join("data");
    let archive_root = utf8(temp.path()).join("archive");

    let mut registry = ServiceRegistry::default();
    seed_service(&mut registry, "SRVCNM001", &data_root, &archive_root);

    // An archived copy with different content sizes.
    let archived = archive_root.join("SRVCNM001");
    fs::create_dir_all(archived.as_std_path()).unwrap();
    fs::write(archived.join("readme.txt").as_std_path(), b"longer service data").unwrap();
    registry.get_mut("SRVCNM001").unwrap().in_archive = true;

    let runner = PhaseRunner::new(&FixedPolicy, &LocalCopy);
    runner.scout(&mut registry);

    let record = registry.get("SRVCNM001").unwrap();
    assert!(record.non_archived_size.is_some());
    assert!(record.archived_size.is_some());
    assert_eq!(record.same_size, Some(false));
}
