use std::fs;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use md5::{Digest, Md5};
use tracing::warn;

use crate::error::SeqvaultError;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MD5_CHUNK: usize = 1024 * 1024;

/// Derives the compressed artifact path for a directory: a `.tar.gz` sibling
/// named after the directory itself. Derived on demand, never stored, so every
/// phase can reconstruct state from what is on disk.
pub fn artifact_path_for(directory: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{directory}.tar.gz"))
}

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIB
}

/// Recursive directory size in bytes. Symlinks are sized by their link
/// metadata and never followed, so shared or cyclic targets are not
/// double-counted. Files vanishing mid-walk are tolerated.
pub fn dir_size_bytes(path: &Utf8Path) -> Result<u64, SeqvaultError> {
    let mut size = 0u64;
    let mut stack = vec![path.to_owned()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| SeqvaultError::Filesystem(format!("read dir {dir}: {err}")))?;
        for entry in entries {
            let entry = entry.map_err(|err| SeqvaultError::Filesystem(err.to_string()))?;
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!("entry vanished while scouting size: {err}");
                    continue;
                }
            };
            if file_type.is_dir() {
                let child = Utf8PathBuf::from_path_buf(entry.path()).map_err(|path| {
                    SeqvaultError::Filesystem(format!("non-utf8 path: {}", path.display()))
                })?;
                stack.push(child);
                continue;
            }
            // DirEntry::metadata does not traverse symlinks.
            match entry.metadata() {
                Ok(metadata) => size += metadata.len(),
                Err(err) => warn!("file vanished while scouting size: {err}"),
            }
        }
    }
    Ok(size)
}

pub fn file_size_gib(path: &Utf8Path) -> Result<f64, SeqvaultError> {
    let metadata = fs::metadata(path.as_std_path())
        .map_err(|err| SeqvaultError::Filesystem(format!("stat {path}: {err}")))?;
    Ok(bytes_to_gib(metadata.len()))
}

/// Creates `archive` as a gzip-compressed tar of `directory`, with the
/// directory's basename as the archive root entry. Extraction therefore
/// reproduces a directory of the same name in the extraction target.
/// Symlinks are stored as symlinks, dangling ones included.
pub fn create_targz(archive: &Utf8Path, directory: &Utf8Path) -> Result<(), SeqvaultError> {
    let basename = directory
        .file_name()
        .ok_or_else(|| SeqvaultError::Filesystem(format!("no basename for {directory}")))?;
    let file = fs::File::create(archive.as_std_path())
        .map_err(|err| SeqvaultError::Filesystem(format!("create {archive}: {err}")))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(basename, directory.as_std_path())
        .map_err(|err| SeqvaultError::Filesystem(format!("tar {directory}: {err}")))?;
    let encoder = builder
        .into_inner()
        .map_err(|err| SeqvaultError::Filesystem(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| SeqvaultError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Extracts a `.tar.gz` into `destination_parent`, so the archive's root entry
/// lands exactly at `destination_parent/<basename>`.
pub fn extract_targz(
    archive: &Utf8Path,
    destination_parent: &Utf8Path,
) -> Result<(), SeqvaultError> {
    let file = fs::File::open(archive.as_std_path())
        .map_err(|err| SeqvaultError::Filesystem(format!("open {archive}: {err}")))?;
    let decoder = GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(destination_parent.as_std_path())
        .map_err(|err| SeqvaultError::Filesystem(format!("untar {archive}: {err}")))?;
    Ok(())
}

/// Chunked MD5 digest of a file, rendered as lowercase hex.
pub fn md5_of(path: &Utf8Path) -> Result<String, SeqvaultError> {
    let mut file = fs::File::open(path.as_std_path())
        .map_err(|err| SeqvaultError::Filesystem(format!("open {path}: {err}")))?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; MD5_CHUNK];
    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(SeqvaultError::Filesystem(format!("read {path}: {err}"))),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn artifact_path_is_a_sibling() {
        let artifact = artifact_path_for(Utf8Path::new("/data/bi/SRVCNM001"));
        assert_eq!(artifact, Utf8PathBuf::from("/data/bi/SRVCNM001.tar.gz"));
    }

    #[test]
    fn dir_size_sums_file_sizes() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        fs::create_dir(root.join("sub").as_std_path()).unwrap();
        fs::write(root.join("a.bin").as_std_path(), vec![0u8; 100]).unwrap();
        fs::write(root.join("sub/b.bin").as_std_path(), vec![0u8; 50]).unwrap();

        assert_eq!(dir_size_bytes(&root).unwrap(), 150);
    }

    #[cfg(unix)]
    #[test]
    fn dir_size_counts_symlinks_by_link_metadata() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        fs::write(root.join("big.bin").as_std_path(), vec![0u8; 1000]).unwrap();
        std::os::unix::fs::symlink(
            root.join("big.bin").as_std_path(),
            root.join("link").as_std_path(),
        )
        .unwrap();

        let size = dir_size_bytes(&root).unwrap();
        let link_len = fs::symlink_metadata(root.join("link").as_std_path())
            .unwrap()
            .len();
        assert_eq!(size, 1000 + link_len);
    }

    #[test]
    fn targz_round_trip_preserves_tree() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        let source = root.join("SRVCNM001");
        fs::create_dir_all(source.join("analysis").as_std_path()).unwrap();
        fs::write(source.join("readme.txt").as_std_path(), b"hello").unwrap();
        fs::write(source.join("analysis/calls.vcf").as_std_path(), b"ref\talt").unwrap();

        let artifact = artifact_path_for(&source);
        create_targz(&artifact, &source).unwrap();
        assert!(artifact.as_std_path().exists());

        let extract_root = root.join("restored");
        fs::create_dir(extract_root.as_std_path()).unwrap();
        extract_targz(&artifact, &extract_root).unwrap();

        let restored = extract_root.join("SRVCNM001");
        assert_eq!(
            fs::read(restored.join("readme.txt").as_std_path()).unwrap(),
            b"hello"
        );
        assert_eq!(
            fs::read(restored.join("analysis/calls.vcf").as_std_path()).unwrap(),
            b"ref\talt"
        );
    }

    #[cfg(unix)]
    #[test]
    fn targz_stores_symlinks_as_symlinks() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        let source = root.join("SRVCNM001");
        fs::create_dir_all(source.as_std_path()).unwrap();
        fs::write(source.join("readme.txt").as_std_path(), b"hello").unwrap();
        // Dangling on purpose: pipeline output dirs often point at scratch
        // space that is gone by archive time.
        std::os::unix::fs::symlink("scratch/huge.bam", source.join("link.bam").as_std_path())
            .unwrap();

        let artifact = artifact_path_for(&source);
        create_targz(&artifact, &source).unwrap();

        let extract_root = root.join("restored");
        fs::create_dir(extract_root.as_std_path()).unwrap();
        extract_targz(&artifact, &extract_root).unwrap();

        let link = extract_root.join("SRVCNM001/link.bam");
        assert_eq!(
            fs::read_link(link.as_std_path()).unwrap(),
            std::path::Path::new("scratch/huge.bam")
        );
    }

    #[test]
    fn md5_matches_known_digest() {
        let temp = tempfile::tempdir().unwrap();
        let path = utf8(temp.path()).join("digest.txt");
        fs::write(path.as_std_path(), b"abc").unwrap();

        assert_eq!(md5_of(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }
}
