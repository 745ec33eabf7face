pub mod changelog_ops;
pub mod patch_ops;
pub mod pq;
pub mod spec_ops;
