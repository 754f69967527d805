use super::client::{client_address, peer_address};
use crate::AppState;
use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use mime_guess::mime;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, field, warn};

#[axum::debug_handler]
pub async fn image_handler(
    State(app_state): State<AppState>,
    Path(image_name): Path<String>,
    request: Request,
) -> Response {
    let peer = peer_address(&request);
    let client = client_address(request.headers(), &peer);

    match app_state
        .personalizer
        .personalize(&image_name, &client)
        .await
    {
        Ok(artifact) => {
            tracing::Span::current().record("artifact", field::display(artifact.display()));
            serve_artifact(&artifact, request).await
        }
        Err(e) => {
            if e.status_code().is_server_error() {
                error!(
                    "Failed to personalize '{}' for {:?}: {}",
                    image_name, client, e
                );
            } else {
                warn!("Rejected '{}' for {:?}: {}", image_name, client, e);
            }
            e.into_response()
        }
    }
}

pub async fn health_handler() -> &'static str {
    "ok"
}

/// Stream the artifact with range and conditional GET support.
async fn serve_artifact(path: &std::path::Path, request: Request) -> Response {
    let mut response = match ServeFile::new_with_mime(path, &mime::IMAGE_JPEG)
        .oneshot(request)
        .await
    {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    // The body differs per client
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("private"));

    response
}
