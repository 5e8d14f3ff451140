//! Request routing.
//!
//! `/api/fetch` goes to the fetch relay; every other path is delegated whole
//! to the static file responder. Both share the isolation header step.

use super::headers::{apply_isolation_headers, HeadersExt};
use super::static_files::StaticFiles;
use crate::fetch::{error_response, json_error, FetchError, FetchRelay, RelayBody};
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, warn};

pub const FETCH_PATH: &str = "/api/fetch";

static GET_ONLY: HeaderValue = HeaderValue::from_static("GET");

/// Dispatch one request and apply the shared response headers.
pub async fn route_request<B>(
    relay: &FetchRelay,
    static_files: &StaticFiles,
    req: Request<B>,
) -> Response<RelayBody> {
    // Neither route reads a request body
    let req = req.map(|_| ());
    let mut response = if req.uri().path() == FETCH_PATH {
        handle_fetch(relay, &req).await
    } else {
        static_files.serve(&req).await
    };
    apply_isolation_headers(&mut response);
    response
}

async fn handle_fetch(relay: &FetchRelay, req: &Request<()>) -> Response<RelayBody> {
    if req.method() != Method::GET {
        let mut response = json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        response.set_header(&ALLOW, &GET_ONLY);
        return response;
    }

    let Some(target) = url_param(req.uri().query()) else {
        return error_response(&FetchError::MissingParameter);
    };

    debug!("Fetch requested for {}", target);
    match relay.fetch(&target).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Fetch of '{}' refused: {} ({})", target, err, err.status());
            if let FetchError::Resolution { host, reason } = &err {
                debug!("Resolution of '{}' failed: {}", host, reason);
            }
            error_response(&err)
        }
    }
}

/// Decoded value of the first non-empty `url` query parameter.
fn url_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, value)| key == "url" && !value.trim().is_empty())
        .map(|(_, value)| value.into_owned())
}
