#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod query;
