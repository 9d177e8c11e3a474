//! Batch export: apply one watermark to many images.
//!
//! A [`BatchJob`] names the sources, the [`WatermarkSpec`](crate::watermark::WatermarkSpec)
//! and a [`DestinationPolicy`]. [`BatchPipeline`] runs it on a bounded worker
//! pool and returns a [`BatchReport`] with one entry per source, in source
//! order. A failing item never aborts the batch; only problems that make
//! the whole run pointless (bad spec, bad options, unwritable output,
//! unreadable source list) are returned as [`BatchError`].

pub mod cancel;
pub mod destination;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod report;
pub mod sources;

pub use cancel::CancellationToken;
pub use destination::{output_format_for, plan_destinations, resolve_destination, PlannedOutput};
pub use error::BatchError;
pub use job::{BatchJob, ConflictPolicy, DestinationPolicy, NamingRule};
pub use pipeline::{default_workers, BatchEvent, BatchHandle, BatchPipeline};
pub use report::{BatchItemResult, BatchProgress, BatchReport, ItemFailure, Outcome};
pub use sources::{collect_sources, read_source_list};
