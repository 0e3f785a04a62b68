use camino::Utf8PathBuf;
use clap::ValueEnum;

use crate::config::ResolvedConfig;
use crate::error::SeqvaultError;
use crate::lims::ServiceDetail;
use crate::registry::ServiceRecord;

/// Facility service kinds. Regular services derive their subdirectory from the
/// requesting user's profile; research resolutions live directly under the
/// kind segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceKind {
    ServicesAndColaborations,
    Research,
}

impl ServiceKind {
    pub fn path_segment(self) -> &'static str {
        match self {
            ServiceKind::ServicesAndColaborations => "services_and_colaborations",
            ServiceKind::Research => "research",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePaths {
    pub archived: Utf8PathBuf,
    pub non_archived: Utf8PathBuf,
}

/// Pure path derivation from configuration and LIMS metadata. No filesystem
/// access except the single `probe` pass that fills `located_in`.
pub struct ServiceLocator<'a> {
    conf: &'a ResolvedConfig,
    kind: ServiceKind,
}

impl<'a> ServiceLocator<'a> {
    pub fn new(conf: &'a ResolvedConfig, kind: ServiceKind) -> Self {
        Self { conf, kind }
    }

    /// Resolves both canonical paths for a regular service. A user without a
    /// profile classification area is a configuration error in the LIMS,
    /// distinct from a not-found service.
    pub fn resolve(&self, id: &str, detail: &ServiceDetail) -> Result<ServicePaths, SeqvaultError> {
        let profile = detail
            .service_user_id
            .profile
            .as_ref()
            .ok_or_else(|| SeqvaultError::MissingProfile(id.to_string()))?;
        let center = profile
            .profile_center
            .as_deref()
            .ok_or_else(|| SeqvaultError::MissingProfile(id.to_string()))?;
        let area = profile
            .profile_classification_area
            .as_deref()
            .ok_or_else(|| SeqvaultError::MissingProfile(id.to_string()))?
            .to_lowercase();
        let folder = detail
            .resolution_folder()
            .ok_or_else(|| SeqvaultError::MissingProfile(id.to_string()))?;

        let segment = self.kind.path_segment();
        Ok(ServicePaths {
            archived: self
                .conf
                .archive_root
                .join(segment)
                .join(center)
                .join(&area)
                .join(folder),
            non_archived: self
                .conf
                .data_root
                .join(segment)
                .join(center)
                .join(&area)
                .join(folder),
        })
    }

    /// Research resolutions need no LIMS detail: paths are root/kind/id.
    pub fn resolve_research(&self, id: &str) -> ServicePaths {
        let segment = self.kind.path_segment();
        ServicePaths {
            archived: self.conf.archive_root.join(segment).join(id),
            non_archived: self.conf.data_root.join(segment).join(id),
        }
    }

    /// One existence probe per service, filling `located_in`. Sizes are a
    /// separate phase; they can be slow on network filesystems.
    pub fn probe(record: &mut ServiceRecord) {
        record.in_archive = record
            .archived_path
            .as_ref()
            .is_some_and(|path| path.as_std_path().exists());
        record.in_data_dir = record
            .non_archived_path
            .as_ref()
            .is_some_and(|path| path.as_std_path().exists());
    }
}
