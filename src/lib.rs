pub mod cli;
pub mod model;
pub mod packages;
pub mod resolver;
pub mod sync;
pub mod vcs;

mod api;
mod config;
#[cfg(test)]
mod testing;

pub use api::{Gopin, GopinBuilder};
