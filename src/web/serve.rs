use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, Request, Response},
    middleware, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{MakeSpan, OnRequest, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::{App, Result};

use super::{midware, routes::routes, REQUEST_ID_HEADER};

/// Serves the intake endpoints on the `App`'s listener until the server stops.
///
/// Every request gets an `x-request-id`, a tracing span and one structured log line from the
/// response mapper, which also renders `web::Error`s into their JSON bodies.
pub async fn serve(app: App) -> Result<()> {
    let App {
        app_state,
        listener,
    } = app;
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let router = Router::new().merge(routes(app_state)).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(
                x_request_id.clone(),
                MakeRequestUuid,
            ))
            .layer(build_trace_layer())
            // Responses travel the stack bottom up: the mapper must sit above the propagation
            // layer to see the request id on the response.
            .layer(middleware::map_response(midware::response_mapper))
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    );

    axum::serve(listener, router).await?;

    Ok(())
}

/// Per-request span keyed by the request id. Query strings are left out since they carry emails.
fn build_trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    impl MakeSpan<Body> + Clone,
    impl OnRequest<Body> + Clone,
    impl OnResponse<Body> + Clone,
> {
    TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            let uuid = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|uuid| uuid.to_str().ok())
                .unwrap_or_default()
                .to_string();

            tracing::info_span!(
                "request",
                id = uuid,
                method = %req.method(),
                path = req.uri().path()
            )
        })
        .on_request(|req: &Request<Body>, _s: &Span| tracing::info!("START @ {}", req.uri().path()))
        .on_response(|res: &Response<Body>, latency: Duration, _s: &Span| {
            let st_code = res.status().as_u16();

            if (500..=599).contains(&st_code) {
                tracing::error!("END in: {:?}, STATUS: {st_code}", latency)
            } else if (400..=499).contains(&st_code) {
                tracing::warn!("END in: {:?}, STATUS: {st_code}", latency)
            } else {
                tracing::info!("END in: {:?}, STATUS: {st_code}", latency)
            }
        })
}
