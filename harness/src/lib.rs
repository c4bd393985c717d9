pub mod catalog;
pub mod classify;
pub mod report;
pub mod results;
pub mod runner;
pub mod scheduler;
pub mod settings;

#[cfg(test)]
mod testing;

pub use catalog::{
    discover, select, CatalogError, CatalogResult, CatalogWarning, Discovery, TestUnit,
};
pub use classify::{classify, SimulationOutcome, Verdict};
pub use report::{
    render_summary, status_label, summarize, write_json_report, ConsoleProgress, JsonReport,
    ReportError, ReportResult,
};
pub use results::{exit_code, RunSummary, TestResult};
pub use runner::{RunnerSettings, UnitRunner};
pub use scheduler::{NoProgress, ProgressSink, ScheduleOutcome, Scheduler};
pub use settings::{HarnessConfig, SettingsError, SettingsResult};

pub mod prelude {
    pub use crate::catalog::*;
    pub use crate::report::*;
    pub use crate::results::*;
    pub use crate::runner::*;
    pub use crate::scheduler::*;
    pub use crate::settings::*;
}
