pub mod command;
pub mod config_io;
pub mod git;
pub mod package_io;
