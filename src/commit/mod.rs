//! Git-side adapters: the staged diff in, the chosen message out.

pub mod diff;
pub mod message;
pub mod select;

pub use diff::{
    ChangedFile, DiffSummary, ExcludeFilter, FileStatus, collect_staged_diff, stage_tracked,
};
pub use message::commit_staged;
pub use select::{choose, first_selectable, menu_items};
