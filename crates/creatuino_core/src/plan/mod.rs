//! Job resolution and planning.
//!
//! ```text
//! MapEntry ──► EntryResolver ──► Vec<Job> per entry ──► plan() ──► JobQueue
//! ```
//!
//! The resolver turns each map entry into concrete jobs (expanding
//! directories), the planner validates the whole batch at once and produces
//! the ordered queue handed to the dispatcher. Nothing here writes to disk.

mod media;
mod planner;
mod resolver;
mod types;

pub use media::{extension_of, is_media_file, MEDIA_EXTENSIONS};
pub use planner::{plan, PlannerConfig};
pub use resolver::{resolve_all, EntryResolver, ResolvedInput, ResolverConfig};
pub use types::{Disposition, Job, JobKind, JobQueue, PlannedJob, SequenceIndex};
