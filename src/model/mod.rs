pub mod archive;
pub mod buffer;
pub mod changelog;
pub mod config;
pub mod patch;
pub mod spec;

pub use archive::ArchiveName;
pub use buffer::{LineId, LinkedTextBuffer};
pub use changelog::*;
pub use config::*;
pub use patch::{Patch, PatchInfo, PatchSeries};
pub use spec::SpecFile;
