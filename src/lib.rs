pub mod binding;
pub mod config;
pub mod driver;
pub mod error;
pub mod expression;
pub mod row;
pub mod sanitize;
pub mod syntax;
pub mod value;

pub use config::RunConfig;
pub use driver::{run, Report, RunCounters};
pub use error::{Error, RunResult};
