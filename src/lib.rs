pub mod config;
pub mod error;
pub mod evaluator;
pub mod harness;
pub mod matching;
pub mod model;
pub mod semantic;
pub mod table;
pub mod util;
