//! Per-file execution: compile service boundary, isolation and the result
//! envelope.

mod compile;
mod error;
mod result;
mod state;
mod unit;

pub use compile::{program, CompiledFile, Compiler, SourceMap, StaticCompiler, TestProgram};
pub use error::{CompileError, ExecutionError, ScriptError};
pub use result::{FileOutcome, PoolResult};
pub use state::{ExecutionState, InvalidTransition, Lifecycle};
pub use unit::{ExecutionUnit, RunOptions, DEFAULT_FILE_TIMEOUT};
