//! Statistics and metrics for channels and capture pipelines

pub mod metrics;

pub use metrics::{ChannelStats, ChannelStatsSnapshot, PipelineStats, PipelineStatsSnapshot};
