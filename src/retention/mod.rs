mod cutoff;
mod deleter;
mod filter;
mod job;
mod outcome;

pub use cutoff::{compute_cutoff, RetentionPolicy};
pub use deleter::{BatchDeleter, DEFAULT_MAX_CONCURRENT_DELETES};
pub use filter::{partition, AgePartition, Aged, CreationTime, MetadataAnomaly};
pub use job::{PurgeMode, RetentionConfig, RetentionJob, Scope};
pub use outcome::{DeletionOutcome, JobReport, JobState};
