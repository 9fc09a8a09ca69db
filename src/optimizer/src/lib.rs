#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod optimizer;
mod rules;

pub use crate::optimizer::{Optimizer, OptimizerConfig, Rule};
