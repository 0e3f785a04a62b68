use std::fs;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::decide::{DecisionProvider, MissingServices, SelectionMode};
use crate::error::SeqvaultError;
use crate::lims::LimsClient;
use crate::locator::{ServiceKind, ServiceLocator};
use crate::registry::ServiceRegistry;

/// At most one of the selection modes may be active.
#[derive(Debug, Clone, Default)]
pub struct SelectionArgs {
    pub service_id: Option<String>,
    pub services_file: Option<Utf8PathBuf>,
    pub date_from: Option<NaiveDate>,
    pub date_until: Option<NaiveDate>,
}

/// Turns the selection flags into a populated registry: ids resolved, LIMS
/// verdicts established, paths computed, locations probed.
pub struct SelectionResolver<'a> {
    lims: &'a dyn LimsClient,
    locator: &'a ServiceLocator<'a>,
    decisions: &'a dyn DecisionProvider,
    kind: ServiceKind,
}

impl<'a> SelectionResolver<'a> {
    pub fn new(
        lims: &'a dyn LimsClient,
        locator: &'a ServiceLocator<'a>,
        decisions: &'a dyn DecisionProvider,
        kind: ServiceKind,
    ) -> Self {
        Self {
            lims,
            locator,
            decisions,
            kind,
        }
    }

    pub fn resolve(&self, args: &SelectionArgs) -> Result<ServiceRegistry, SeqvaultError> {
        Self::validate(args)?;

        let mut registry = ServiceRegistry::default();
        if let Some(id) = &args.service_id {
            registry.insert(id.trim());
        } else if let Some(file) = &args.services_file {
            let content = fs::read_to_string(file.as_std_path())
                .map_err(|err| SeqvaultError::Filesystem(format!("read {file}: {err}")))?;
            for line in content.lines() {
                let id = line.trim();
                if !id.is_empty() {
                    registry.insert(id);
                }
            }
        } else if let (Some(from), Some(until)) = (args.date_from, args.date_until) {
            self.select_by_dates(&mut registry, from, until)?;
        } else {
            // Research resolutions have no delivery dates in the LIMS, so the
            // date search is only offered for regular services.
            let by_date = self.kind == ServiceKind::ServicesAndColaborations
                && self.decisions.selection_mode()? == SelectionMode::ByDate;
            if by_date {
                let (from, until) = self.decisions.date_range()?;
                if until < from {
                    return Err(SeqvaultError::IncompleteDateRange(format!(
                        "the ending date ({until}) is earlier than the starting date ({from})"
                    )));
                }
                self.select_by_dates(&mut registry, from, until)?;
            } else {
                let mut first = true;
                while let Some(id) = self.decisions.next_service_id(first)? {
                    info!("chosen service: {id} (through prompt)");
                    registry.insert(id.trim());
                    first = false;
                }
            }
        }

        if registry.is_empty() {
            return Err(SeqvaultError::EmptySelection);
        }

        self.lookup_metadata(&mut registry)?;
        self.check_missing(&registry)?;

        eprintln!("Finding the services in the directory tree");
        for (_, record) in registry.iter_mut() {
            ServiceLocator::probe(record);
        }

        Ok(registry)
    }

    fn select_by_dates(
        &self,
        registry: &mut ServiceRegistry,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<(), SeqvaultError> {
        eprintln!("Asking the LIMS about services delivered between {from} and {until}");
        for service in self.lims.delivered_services(from, until)? {
            let record = registry.insert(&service.id);
            record.found_in_system = Some(true);
            record.delivery_date = service.delivered_date;
        }
        info!("services found in the interval: {}", registry.len());
        Ok(())
    }

    fn validate(args: &SelectionArgs) -> Result<(), SeqvaultError> {
        let date_mode = args.date_from.is_some() || args.date_until.is_some();
        if args.date_from.is_some() != args.date_until.is_some() {
            return Err(SeqvaultError::IncompleteDateRange(
                "both --date-from and --date-until must be provided".to_string(),
            ));
        }
        if let (Some(from), Some(until)) = (args.date_from, args.date_until) {
            if until < from {
                return Err(SeqvaultError::IncompleteDateRange(format!(
                    "--date-until ({until}) is earlier than --date-from ({from})"
                )));
            }
        }
        let modes =
            [args.service_id.is_some(), args.services_file.is_some(), date_mode];
        if modes.iter().filter(|active| **active).count() > 1 {
            return Err(SeqvaultError::ConflictingSelection(
                "choose one of --service-id, --services-file or a date range".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-id metadata lookup, common to all selection modes. Not-found is a
    /// per-service verdict; a transport failure aborts the run.
    fn lookup_metadata(&self, registry: &mut ServiceRegistry) -> Result<(), SeqvaultError> {
        let ids: Vec<String> = registry.ids().map(str::to_string).collect();
        for id in ids {
            match self.kind {
                ServiceKind::Research => {
                    // Research resolutions are not tracked per-user in the
                    // LIMS; their paths derive from the id alone.
                    let paths = self.locator.resolve_research(&id);
                    let record = registry.insert(&id);
                    record.found_in_system = Some(true);
                    record.archived_path = Some(paths.archived);
                    record.non_archived_path = Some(paths.non_archived);
                }
                ServiceKind::ServicesAndColaborations => match self.lims.service_detail(&id)? {
                    None => {
                        eprintln!("No service named '{id}' was found, connection seemed right though");
                        warn!("service {id} was not found in the LIMS");
                        let record = registry.insert(&id);
                        record.found_in_system = Some(false);
                        record.archived_path = None;
                        record.non_archived_path = None;
                    }
                    Some(detail) => {
                        let paths = self.locator.resolve(&id, &detail)?;
                        let record = registry.insert(&id);
                        record.found_in_system = Some(true);
                        record.archived_path = Some(paths.archived);
                        record.non_archived_path = Some(paths.non_archived);
                    }
                },
            }
        }
        Ok(())
    }

    fn check_missing(&self, registry: &ServiceRegistry) -> Result<(), SeqvaultError> {
        let missing: Vec<String> = registry
            .iter()
            .filter(|(_, record)| record.found_in_system == Some(false))
            .map(|(id, _)| id.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        if missing.len() == registry.len() {
            warn!("none of the chosen services were found: {}", missing.join(","));
            return Err(SeqvaultError::NothingFound(missing.join(",")));
        }
        eprintln!(
            "The following services were not found in the LIMS: {}",
            missing.join(", ")
        );
        match self.decisions.on_missing_services(&missing)? {
            MissingServices::Continue => Ok(()),
            MissingServices::Abort => Err(SeqvaultError::Aborted),
        }
    }
}
