//! One module per subcommand. Each exposes an `execute` function.

pub mod apply;
pub mod check;
pub mod completions;
pub mod config;
pub mod reset;
pub mod status;

use std::path::Path;

use scaffold_adapters::{LoadedPlan, PlanLoader};

use crate::error::{CliError, CliResult};

/// Load a plan file, reporting a missing file as [`CliError::PlanNotFound`].
pub(crate) fn load_plan(path: &Path) -> CliResult<LoadedPlan> {
    if !path.is_file() {
        return Err(CliError::PlanNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(PlanLoader::new().load(path)?)
}
