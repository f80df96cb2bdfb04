#![doc = include_str!("../../../README.md")]

pub mod cell;
pub mod cfg;
pub mod dataflow;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod location;
pub mod log;
pub mod magics;
pub mod parsing;
pub mod printer;
pub mod program;
pub mod refs;
pub mod set;
pub mod slicer;
pub mod spec;
pub mod symtab;
pub mod walker;

pub use cell::{Cell, CellProgram};
pub use error::{Diagnostic, SliceError, SpecError};
pub use location::{LineIndex, SourceLocation};
pub use log::{CellExecution, CellSlice, ExecutionLogSlicer, SlicedExecution};
pub use program::{Program, ProgramBuilder};
pub use refs::{DefUse, Ref, RefKind, RefLevel};
pub use slicer::{Direction, LocationSet};
pub use symtab::SymbolTable;
