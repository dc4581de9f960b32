//! CLI domain: parse, route, output, and presentation only.
//! Tree semantics live in the engine; the route table only resolves paths and formats.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{map_error, CliError};
pub use parse::{Cli, Commands};
pub use presentation::{format_log, format_ls, format_status, PeerStatus, StatusReport};
pub use route::{command_name, RunContext};
