/// Graph loading for the splitload ORM
/// Provides load plans, batched lookups, split and single-query loading

pub mod batch_loader;
pub mod eager_loader;
pub mod joined;
pub mod plan;
pub mod splitter;

pub use batch_loader::{BatchConfig, BatchLoader, ChildRows};
pub use eager_loader::{GraphLoader, LoadOutcome, LoadStats, LoadStrategy};
pub use joined::JoinedLoader;
pub use plan::{Include, LoadPlan, LoadRequest, PlanNode};
pub use splitter::{KeyBatching, QuerySplitter};
