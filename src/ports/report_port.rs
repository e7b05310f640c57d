//! Report rendering port trait.

use std::io::Write;

use crate::domain::allocation::AllocationFilter;
use crate::domain::engine::AllocationRun;
use crate::domain::error::SmartDcaError;

/// Port for presenting the rows of an allocation run.
pub trait ReportPort {
    fn write(
        &self,
        run: &AllocationRun,
        filter: AllocationFilter,
        out: &mut dyn Write,
    ) -> Result<(), SmartDcaError>;
}
