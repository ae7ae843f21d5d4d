use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use ebert_discord::interaction::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use ebert_discord::{
    Dispatch, FollowupHandle, Interaction, InteractionDispatcher, SignatureVerifier,
};
use http_body::{Frame, SizeHint};
use tracing::{error, warn};

use crate::service::MovieNightService;

#[derive(Clone)]
pub struct InteractionState {
    pub dispatcher: InteractionDispatcher<MovieNightService>,
    pub verifier: Arc<SignatureVerifier>,
}

pub fn router(state: InteractionState) -> Router {
    Router::new().route("/interactions", post(interactions)).with_state(state)
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> &'h str {
    headers.get(name).and_then(|value| value.to_str().ok()).unwrap_or_default()
}

pub async fn interactions(
    State(state): State<InteractionState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = header(&headers, SIGNATURE_HEADER);
    let timestamp = header(&headers, TIMESTAMP_HEADER);
    if let Err(error) = state.verifier.verify(signature, timestamp, &body) {
        warn!(
            event_name = "interaction.unverified",
            error = %error,
            "rejected interaction request"
        );
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(error) => {
            warn!(
                event_name = "interaction.undecodable",
                error = %error,
                "could not decode interaction"
            );
            return (StatusCode::BAD_REQUEST, "malformed interaction").into_response();
        }
    };

    let Dispatch { response, followup } = state.dispatcher.dispatch(interaction);
    let payload = match serde_json::to_vec(&response) {
        Ok(payload) => Bytes::from(payload),
        Err(error) => {
            error!(
                event_name = "interaction.response_unserializable",
                error = %error,
                "could not encode interaction response"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::new(AckBody { payload: Some(payload), followup }),
    )
        .into_response()
}

/// Response body for an interaction acknowledgement. The follow-up is
/// released only after the payload has been handed to the transport; a body
/// dropped before that aborts the follow-up.
struct AckBody {
    payload: Option<Bytes>,
    followup: Option<FollowupHandle>,
}

impl AckBody {
    fn open_gate(&mut self) {
        if let Some(followup) = self.followup.take() {
            drop(followup.release());
        }
    }
}

impl HttpBody for AckBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let this = self.get_mut();
        match this.payload.take() {
            Some(payload) => Poll::Ready(Some(Ok(Frame::data(payload)))),
            None => {
                this.open_gate();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.payload.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.payload.as_ref().map_or(0, |payload| payload.len() as u64))
    }
}

impl Drop for AckBody {
    fn drop(&mut self) {
        if self.payload.is_none() {
            self.open_gate();
        }
    }
}
