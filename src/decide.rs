use std::io::{self, BufRead, Write};

use camino::Utf8Path;
use chrono::NaiveDate;
use tracing::debug;

use crate::error::SeqvaultError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingArtifact {
    Redo,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingDestination {
    Redo,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingDirectory {
    Redo,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSource {
    Skip,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingServices {
    Continue,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    ById,
    ByDate,
}

/// One method per interactive decision point. Phases never touch stdin
/// directly; unattended runs plug in `FixedPolicy` instead.
pub trait DecisionProvider {
    /// Compress phase found a `.tar.gz` already present next to the source.
    fn on_existing_artifact(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingArtifact, SeqvaultError>;

    /// Transfer phase found a `.tar.gz` already present at the destination.
    fn on_existing_destination(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingDestination, SeqvaultError>;

    /// Decompress phase found the target directory already extracted.
    fn on_existing_directory(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingDirectory, SeqvaultError>;

    /// Transfer phase could not find the source `.tar.gz`.
    fn on_missing_source(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<MissingSource, SeqvaultError>;

    /// Some (not all) requested services were unknown to the LIMS.
    fn on_missing_services(&self, missing: &[String]) -> Result<MissingServices, SeqvaultError>;

    /// No selection flags were given: choose ids one by one or search the
    /// LIMS by delivery date.
    fn selection_mode(&self) -> Result<SelectionMode, SeqvaultError>;

    /// Date interval for an interactive date search.
    fn date_range(&self) -> Result<(NaiveDate, NaiveDate), SeqvaultError>;

    /// Interactive selection fallback: next service id, `None` to stop.
    fn next_service_id(&self, first: bool) -> Result<Option<String>, SeqvaultError>;
}

/// Skip-prompts policy: every decision resolves to its documented default so
/// the same logic can run unattended.
pub struct FixedPolicy;

impl DecisionProvider for FixedPolicy {
    fn on_existing_artifact(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingArtifact, SeqvaultError> {
        debug!("service {service}: {path} exists, deleting and compressing again (skip-prompts)");
        Ok(ExistingArtifact::Redo)
    }

    fn on_existing_destination(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingDestination, SeqvaultError> {
        debug!("service {service}: {path} exists at destination, removing and copying again (skip-prompts)");
        Ok(ExistingDestination::Redo)
    }

    fn on_existing_directory(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingDirectory, SeqvaultError> {
        debug!("service {service}: {path} already extracted, deleting and extracting again (skip-prompts)");
        Ok(ExistingDirectory::Redo)
    }

    fn on_missing_source(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<MissingSource, SeqvaultError> {
        debug!("service {service}: {path} not found, skipping (skip-prompts)");
        Ok(MissingSource::Skip)
    }

    fn on_missing_services(&self, missing: &[String]) -> Result<MissingServices, SeqvaultError> {
        debug!(
            "{} services unknown to the LIMS, continuing (skip-prompts)",
            missing.len()
        );
        Ok(MissingServices::Continue)
    }

    fn selection_mode(&self) -> Result<SelectionMode, SeqvaultError> {
        Ok(SelectionMode::ById)
    }

    fn date_range(&self) -> Result<(NaiveDate, NaiveDate), SeqvaultError> {
        Err(SeqvaultError::Prompt(
            "a date search needs prompts; pass --date-from/--date-until instead".to_string(),
        ))
    }

    fn next_service_id(&self, _first: bool) -> Result<Option<String>, SeqvaultError> {
        Ok(None)
    }
}

/// Interactive provider: numbered menus on stderr, answers read from stdin.
pub struct InteractivePrompter;

impl InteractivePrompter {
    fn choose(&self, message: &str, options: &[&str]) -> Result<usize, SeqvaultError> {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            eprintln!("{message}");
            for (index, option) in options.iter().enumerate() {
                eprintln!("  [{}] {option}", index + 1);
            }
            eprint!("> ");
            io::stderr()
                .flush()
                .map_err(|err| SeqvaultError::Prompt(err.to_string()))?;
            line.clear();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .map_err(|err| SeqvaultError::Prompt(err.to_string()))?;
            if read == 0 {
                return Err(SeqvaultError::Prompt("stdin closed".to_string()));
            }
            match line.trim().parse::<usize>() {
                Ok(choice) if choice >= 1 && choice <= options.len() => return Ok(choice - 1),
                _ => eprintln!("Please answer with a number between 1 and {}", options.len()),
            }
        }
    }

    fn read_line(&self, message: &str) -> Result<String, SeqvaultError> {
        eprintln!("{message}");
        eprint!("> ");
        io::stderr()
            .flush()
            .map_err(|err| SeqvaultError::Prompt(err.to_string()))?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|err| SeqvaultError::Prompt(err.to_string()))?;
        Ok(line.trim().to_string())
    }

    fn read_date(&self, message: &str) -> Result<NaiveDate, SeqvaultError> {
        loop {
            let line = self.read_line(message)?;
            match line.parse::<NaiveDate>() {
                Ok(date) => return Ok(date),
                Err(_) => eprintln!("Please use the YYYY-MM-DD format"),
            }
        }
    }
}

impl DecisionProvider for InteractivePrompter {
    fn on_existing_artifact(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingArtifact, SeqvaultError> {
        let choice = self.choose(
            &format!("Service {service} seems already compressed ({path}). What to do?"),
            &["Just skip it", "Delete it and compress again"],
        )?;
        Ok(match choice {
            0 => ExistingArtifact::Skip,
            _ => ExistingArtifact::Redo,
        })
    }

    fn on_existing_destination(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingDestination, SeqvaultError> {
        let choice = self.choose(
            &format!("Service {service} already has a compressed copy at {path}. What to do?"),
            &["Remove it and copy again", "Ignore this service"],
        )?;
        Ok(match choice {
            0 => ExistingDestination::Redo,
            _ => ExistingDestination::Ignore,
        })
    }

    fn on_existing_directory(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<ExistingDirectory, SeqvaultError> {
        let choice = self.choose(
            &format!("Service {service} is already uncompressed at {path}. What to do?"),
            &["Skip (do not uncompress)", "Delete it and uncompress again"],
        )?;
        Ok(match choice {
            0 => ExistingDirectory::Skip,
            _ => ExistingDirectory::Redo,
        })
    }

    fn on_missing_source(
        &self,
        service: &str,
        path: &Utf8Path,
    ) -> Result<MissingSource, SeqvaultError> {
        let choice = self.choose(
            &format!("Compressed file {path} for service {service} was not found. What to do?"),
            &["Skip it", "Exit"],
        )?;
        Ok(match choice {
            0 => MissingSource::Skip,
            _ => MissingSource::Abort,
        })
    }

    fn on_missing_services(&self, missing: &[String]) -> Result<MissingServices, SeqvaultError> {
        let choice = self.choose(
            &format!(
                "The following services were not found in the LIMS: {}. Continue?",
                missing.join(", ")
            ),
            &["Yes, continue", "Exit"],
        )?;
        Ok(match choice {
            0 => MissingServices::Continue,
            _ => MissingServices::Abort,
        })
    }

    fn selection_mode(&self) -> Result<SelectionMode, SeqvaultError> {
        let choice = self.choose(
            "No services were selected. How would you like to choose them?",
            &["Enter service ids one by one", "Search by delivery date"],
        )?;
        Ok(match choice {
            0 => SelectionMode::ById,
            _ => SelectionMode::ByDate,
        })
    }

    fn date_range(&self) -> Result<(NaiveDate, NaiveDate), SeqvaultError> {
        let from = self.read_date("Starting date (YYYY-MM-DD):")?;
        let until = self.read_date("Ending date (YYYY-MM-DD):")?;
        Ok((from, until))
    }

    fn next_service_id(&self, first: bool) -> Result<Option<String>, SeqvaultError> {
        if !first {
            let choice = self.choose(
                "Would you like to add any other service?",
                &["Add more services", "Do not add more services"],
            )?;
            if choice == 1 {
                return Ok(None);
            }
        }
        let id = self.read_line("Service id (e.g. SRVCNM584):")?;
        if id.is_empty() {
            return Ok(None);
        }
        Ok(Some(id))
    }
}
