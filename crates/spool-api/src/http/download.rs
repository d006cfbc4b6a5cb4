//! `/download` and `/proxy`: serve (ranges of) torrent files.

use std::io;
use std::sync::Arc;

use axum::{
    Extension,
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{
        HeaderMap, StatusCode,
        header::{
            ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
        },
    },
    response::Response,
};
use serde::Deserialize;
use spool_stream::{ChannelSink, PlanError, StreamError, StreamPlan};
use spool_telemetry::RequestContext;
use spool_torrent_core::InfoHash;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info, warn};

use crate::http::auth::AuthContext;
use crate::http::errors::ApiError;
use crate::http::mime::{attachment_disposition, content_type_for};
use crate::state::ApiState;

/// Query accepted by the download routes. `sid` is an alias of `ih`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DownloadQuery {
    ih: Option<String>,
    sid: Option<String>,
    file: Option<String>,
}

impl DownloadQuery {
    fn target(&self) -> Result<(InfoHash, usize), ApiError> {
        let raw = self
            .ih
            .as_deref()
            .or(self.sid.as_deref())
            .ok_or_else(|| ApiError::bad_request("missing ih parameter"))?;
        let torrent = raw
            .trim()
            .parse::<InfoHash>()
            .map_err(|_| ApiError::bad_request("ih must be 40 hexadecimal characters"))?;
        let file = self
            .file
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("missing file parameter"))?
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::bad_request("file must be a non-negative integer"))?;
        Ok((torrent, file))
    }
}

pub(crate) async fn download(
    State(state): State<Arc<ApiState>>,
    auth: Option<Extension<AuthContext>>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let (torrent, file_index) = query.target()?;
    let range = headers.get(RANGE).and_then(|value| value.to_str().ok());
    let plan = state
        .streamer
        .plan(torrent, file_index, range)
        .map_err(plan_error)?;

    let file_name = plan
        .file_path
        .rsplit('/')
        .next()
        .unwrap_or(plan.file_path.as_str());
    let status = if plan.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_LENGTH, plan.length)
        .header(CONTENT_TYPE, content_type_for(file_name))
        .header(ACCEPT_RANGES, "bytes");
    if state.attachment {
        builder = builder.header(CONTENT_DISPOSITION, attachment_disposition(file_name));
    }
    if plan.partial {
        builder = builder.header(CONTENT_RANGE, plan.content_range());
    }

    let (sink, receiver) = ChannelSink::channel(state.channel_depth);
    let response = builder
        .body(Body::from_stream(ReceiverStream::new(receiver)))
        .map_err(|err| {
            warn!(error = %err, "failed to build download response");
            ApiError::internal("failed to build download response")
        })?;

    let user = auth.and_then(|Extension(context)| context.username);
    info!(
        torrent = %plan.torrent,
        file = %plan.file_path,
        first_byte = plan.first_byte,
        length = plan.length,
        partial = plan.partial,
        user = ?user,
        "download started"
    );
    spawn_stream(&state, plan, sink);
    Ok(response)
}

fn spawn_stream(state: &Arc<ApiState>, plan: StreamPlan, mut sink: ChannelSink) {
    let streamer = Arc::clone(&state.streamer);
    let telemetry = state.telemetry.clone();
    let span = tracing::info_span!(
        "stream",
        torrent = %plan.torrent,
        file = plan.file_index,
        request_id = tracing::field::Empty,
        route = tracing::field::Empty
    );
    if let Some(context) = RequestContext::current() {
        context.record_on(&span);
    }
    tokio::spawn(
        async move {
            telemetry.stream_started();
            let outcome = streamer.stream(&plan, &mut sink).await;
            telemetry.stream_finished(outcome.label(), outcome.bytes_sent);
            match outcome.result {
                Ok(()) => debug!(bytes_sent = outcome.bytes_sent, "download finished"),
                Err(StreamError::ClientGone) => {
                    debug!(bytes_sent = outcome.bytes_sent, "client went away");
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        outcome = err.label(),
                        bytes_sent = outcome.bytes_sent,
                        "download failed"
                    );
                    sink.abort(io::Error::other(err));
                }
            }
        }
        .instrument(span),
    );
}

fn plan_error(err: PlanError) -> ApiError {
    match err {
        PlanError::UnknownTorrent { torrent } => {
            ApiError::not_found(format!("torrent {torrent} is not known"))
        }
        PlanError::FileIndexOutOfRange { index, files } => ApiError::bad_request(format!(
            "file index {index} is out of range; the torrent has {files} files"
        )),
        PlanError::Unsatisfiable { file_size } => ApiError::range_not_satisfiable(file_size),
    }
}
