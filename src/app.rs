use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::error::SeqvaultError;
use crate::phases::PhaseRunner;
use crate::registry::{Direction, ServiceRegistry};
use crate::report::ReportWriter;

/// High-level operation chosen by the operator, mapped onto an ordered
/// sequence of phase invocations. Every operation ends with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Scout,
    FullArchive,
    FullRetrieve,
    Compress(Direction),
    Transfer(Direction),
    Decompress(Direction),
    RemoveData,
}

pub fn run_operation(
    runner: &PhaseRunner<'_>,
    operation: Operation,
    registry: &mut ServiceRegistry,
    report_path: &Utf8Path,
) -> Result<Utf8PathBuf, SeqvaultError> {
    info!("chosen operation: {operation:?}");

    match operation {
        Operation::Scout => runner.scout(registry),
        Operation::FullArchive => {
            runner.scout(registry);
            runner.compress(registry, Direction::Archive)?;
            runner.transfer(registry, Direction::Archive)?;
            runner.decompress(registry, Direction::Archive)?;
        }
        Operation::FullRetrieve => {
            runner.compress(registry, Direction::Retrieve)?;
            runner.transfer(registry, Direction::Retrieve)?;
            runner.decompress(registry, Direction::Retrieve)?;
        }
        Operation::Compress(direction) => {
            if direction == Direction::Archive {
                runner.scout(registry);
            }
            runner.compress(registry, direction)?;
        }
        Operation::Transfer(direction) => runner.transfer(registry, direction)?,
        Operation::Decompress(direction) => runner.decompress(registry, direction)?,
        Operation::RemoveData => runner.cleanup(registry),
    }

    ReportWriter::write(registry, report_path)
}
