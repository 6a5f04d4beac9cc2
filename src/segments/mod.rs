pub mod store;
pub mod export;

pub use store::{
    NoopSegmentEventEmitter, Segment, SegmentEvent, SegmentEventEmitter, SegmentId,
    SegmentSource, SegmentStore,
};
pub use export::{write_exports, ExportPaths};
