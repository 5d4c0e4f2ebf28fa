#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod cli;
pub mod entities;
pub mod error;
pub mod render;

mod sources;
mod utils;

pub use sources::pharmguard::{BackendHealth, PharmGuardClient, SUPPORTED_DRUGS};
