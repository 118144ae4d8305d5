pub mod record;

pub use record::{ActivityRecord, TerminationKind};
