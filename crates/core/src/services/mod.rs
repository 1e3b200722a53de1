pub mod assembler;
pub mod batch;
pub mod cluster;
pub mod discovery;
pub mod probe;

pub use assembler::{assemble, TranscriptInput};
pub use batch::{Analyzer, BatchReport, CoreFailure};
pub use cluster::compare_cores;
pub use discovery::find_core_files;
pub use probe::{CommandOutput, CommandRunner, SystemRunner};
