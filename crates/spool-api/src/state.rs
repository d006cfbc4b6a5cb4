//! Shared state handed to every handler.

use std::sync::Arc;

use spool_config::{AccessConfig, AppConfig};
use spool_stream::RangeStreamer;
use spool_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) streamer: Arc<RangeStreamer>,
    pub(crate) access: Arc<AccessConfig>,
    pub(crate) attachment: bool,
    pub(crate) channel_depth: usize,
    pub(crate) telemetry: Metrics,
}

impl ApiState {
    pub(crate) fn new(streamer: Arc<RangeStreamer>, config: &AppConfig, telemetry: Metrics) -> Self {
        Self {
            streamer,
            access: Arc::new(config.access.clone()),
            attachment: config.server.attachment,
            channel_depth: config.streaming.channel_depth,
            telemetry,
        }
    }
}
