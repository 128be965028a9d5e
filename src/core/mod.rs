pub mod comparator;
pub mod diff;
pub mod engine;
pub mod events;
pub mod reconciler;
pub mod resolver;

pub use comparator::TimestampComparator;
pub use diff::{ActionKind, ActionSummary, DiffPlanner, SyncAction};
pub use engine::{MirrorEngine, MirrorReport, MirrorStatus};
pub use events::MirrorEvent;
pub use reconciler::{ReconcileStats, TreeReconciler};
pub use resolver::{ResolvedVolumes, VolumeResolver};
