//! Crate implementing the CLI of the `faultline` fuzzing proxy.

mod cli;
mod config;
mod discover;
mod endpoint;
mod run;

pub use self::cli::CliOpts;
pub use self::config::ProxyConfig;
pub use self::discover::pids_by_name;
pub use self::endpoint::{Endpoint, EndpointError};
pub use self::run::evaluate_run;
