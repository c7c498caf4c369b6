mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::{OutputMode, execute, run, run_with_format};
