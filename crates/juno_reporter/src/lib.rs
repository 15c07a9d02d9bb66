pub mod junit;
pub mod log_sink;
pub mod reporter;
pub mod run;
pub mod state;
pub mod styles;

pub use junit::{JUnitReport, ReportError};
pub use log_sink::{LogSink, SinkError, read_rerun_manifest};
pub use reporter::{Reporter, dispatch};
pub use run::RunReporter;
pub use state::{RunState, SlowTestRanking};
pub use styles::Styles;
