pub mod directory;
pub mod engine;
pub mod feed;
pub mod http;
pub mod runtime;
pub mod source;
pub mod store;

pub use directory::{DirectoryClient, DirectoryError, EntityPayload};
pub use engine::{
    Clock, Collaborators, CycleKind, CycleOutcome, CycleReport, CycleScheduler, DispatchAction,
    DispatchOutcome, DrainReport, FixedClock, PaginationDriver, QueueReconciler, SkipReason,
    SystemClock, WalkReport,
};
pub use feed::{FeedClient, FeedError};
pub use http::{HttpClientOptions, HttpMetricsSnapshot};
pub use runtime::config::{SyncConfig, SyncConfigBuilder, SyncConfigParams};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use source::{
    Category, ChangeEvent, ChangeFeedSource, DirectoryAck, DirectoryService, EntityDetailSource,
    EntityDetails,
};
pub use store::{
    BlockList, BlockListFilter, PendingQueueStore, PendingRecord, Watermark, WatermarkStore,
};
