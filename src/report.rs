use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::error::SeqvaultError;
use crate::registry::{ServiceRecord, ServiceRegistry};

pub const REPORT_HEADER: [&str; 18] = [
    "Service ID",
    "Found on LIMS",
    "Delivery date",
    "Path in archive",
    "Found on archive",
    "Uncompressed size in archive",
    "Compressed size in archive",
    "Compressed md5 in archive",
    "Path in data directory",
    "Found on data directory",
    "Uncompressed size in data directory",
    "Compressed size in data directory",
    "Compressed md5 in data directory",
    "Compressing process",
    "Moving process",
    "Uncompressing process",
    "Deletion process",
    "Error",
];

/// Serializes the registry to a TSV file, one row per service. Dumps current
/// state only; never drives control flow.
pub struct ReportWriter;

impl ReportWriter {
    /// Writes the report, picking a disambiguated sibling name if the target
    /// already exists. Returns the path actually written.
    pub fn write(
        registry: &ServiceRegistry,
        path: &Utf8Path,
    ) -> Result<Utf8PathBuf, SeqvaultError> {
        let target = Self::disambiguate(path);
        if target != path {
            eprintln!("A report named {path} already exists. Writing to {target} instead.");
        }

        let mut file = fs::File::create(target.as_std_path())
            .map_err(|err| SeqvaultError::Filesystem(format!("create {target}: {err}")))?;
        writeln!(file, "{}", REPORT_HEADER.join("\t"))
            .map_err(|err| SeqvaultError::Filesystem(err.to_string()))?;
        for (_, record) in registry.iter() {
            writeln!(file, "{}", Self::render_row(record).join("\t"))
                .map_err(|err| SeqvaultError::Filesystem(err.to_string()))?;
        }

        info!("report with {} rows written to {target}", registry.len());
        Ok(target)
    }

    fn disambiguate(path: &Utf8Path) -> Utf8PathBuf {
        if !path.as_std_path().exists() {
            return path.to_owned();
        }
        for n in 1u32.. {
            let candidate = path.with_extension(format!("{n}.tsv"));
            if !candidate.as_std_path().exists() {
                return candidate;
            }
        }
        unreachable!("ran out of report file names")
    }

    fn render_row(record: &ServiceRecord) -> Vec<String> {
        vec![
            record.id.clone(),
            match record.found_in_system {
                Some(true) => "Found on LIMS".to_string(),
                Some(false) => "NOT found on LIMS".to_string(),
                None => "Not checked".to_string(),
            },
            record
                .delivery_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record
                .archived_path
                .as_ref()
                .map(|path| path.to_string())
                .unwrap_or_else(|| "Archived path could not be generated".to_string()),
            if record.in_archive {
                "Yes".to_string()
            } else {
                "Not found in archive".to_string()
            },
            render_size(record.archived_size),
            render_size(record.archived_compressed_size),
            render_md5(record.md5_archived.as_deref()),
            record
                .non_archived_path
                .as_ref()
                .map(|path| path.to_string())
                .unwrap_or_else(|| "Data path could not be generated".to_string()),
            if record.in_data_dir {
                "Yes".to_string()
            } else {
                "Not found in data dir".to_string()
            },
            render_size(record.non_archived_size),
            render_size(record.non_archived_compressed_size),
            render_md5(record.md5_non_archived.as_deref()),
            record.compressed.to_string(),
            record.copied.to_string(),
            record.uncompressed.to_string(),
            record.deleted.to_string(),
            record.error_status.to_string(),
        ]
    }
}

fn render_size(size: Option<f64>) -> String {
    size.map(|gib| format!("{gib:.3}"))
        .unwrap_or_else(|| "Not calculated".to_string())
}

fn render_md5(md5: Option<&str>) -> String {
    md5.map(str::to_string)
        .unwrap_or_else(|| "Not obtained".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn header_row_is_fixed() {
        let temp = tempfile::tempdir().unwrap();
        let path = utf8(temp.path()).join("report.tsv");
        let mut registry = ServiceRegistry::default();
        registry.insert("SRVCNM001");

        let written = ReportWriter::write(&registry, &path).unwrap();
        let content = fs::read_to_string(written.as_std_path()).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), REPORT_HEADER.join("\t"));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn existing_report_is_never_overwritten() {
        let temp = tempfile::tempdir().unwrap();
        let path = utf8(temp.path()).join("report.tsv");
        let registry = ServiceRegistry::default();

        let first = ReportWriter::write(&registry, &path).unwrap();
        let second = ReportWriter::write(&registry, &path).unwrap();
        let third = ReportWriter::write(&registry, &path).unwrap();

        assert_eq!(first, path);
        assert_eq!(second, path.with_extension("1.tsv"));
        assert_eq!(third, path.with_extension("2.tsv"));
        assert!(first.as_std_path().exists());
        assert!(second.as_std_path().exists());
        assert!(third.as_std_path().exists());
    }

    #[test]
    fn unmeasured_fields_render_placeholders() {
        let record = ServiceRecord::new("SRVCNM001");
        let row = ReportWriter::render_row(&record);
        assert_eq!(row[0], "SRVCNM001");
        assert_eq!(row[5], "Not calculated");
        assert_eq!(row[7], "Not obtained");
        assert_eq!(row[17], "No errors detected");
    }
}
