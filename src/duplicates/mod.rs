//! Duplicate detection and removal.
//!
//! - [`groups`]: size buckets and signature groups
//! - [`resolver`]: the engine that fingerprints, groups and removes

pub mod groups;
pub mod resolver;

pub use groups::{
    group_by_signature, group_by_size, GroupingStats, SignatureGroup, SignatureKey, SizeGroup,
};
pub use resolver::{
    DuplicateResolver, ResolutionReport, ResolverConfig, ResolverError, DEFAULT_PROGRESS_BATCH,
    DEFAULT_VIDEO_EXTENSIONS,
};
