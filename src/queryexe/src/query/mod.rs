pub use compiler::PlanCompiler;
pub use conductor::{CompiledQuery, Conductor, ConductorConfig, QueryResult};
pub use cost::{CostCounter, CostReport};
pub use executor::Executor;
pub use fold::ChainFolder;
pub use storage::{
    decode_record, encode_record, import_csv, import_table, write_table, FsStorage, MemoryStorage,
    Storage,
};
pub use task::*;
pub use translate_and_validate::TranslateAndValidate;
mod compiler;
mod conductor;
mod cost;
mod executor;
mod fold;
mod storage;
mod task;
mod translate_and_validate;

// Query flow:
//   sql --TranslateAndValidate--> RaExpr --Optimizer--> RaExpr
//       --PlanCompiler--> TaskGraph --ChainFolder--> TaskGraph
//       --Executor--> output records --CostCounter--> CostReport
//
// Conductor wires these steps together. Distributed graphs stop after
// compilation.
