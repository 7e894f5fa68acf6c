// src/api/handlers.rs

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::{auth, types::*, ApiState};
use crate::auth::client::{LoginRequest, LOGIN_SUCCESSFUL};
use crate::avatars::AvatarListResponse;
use crate::infra::errors::AvatarError;
use crate::knowledge::extractor::{DocumentKind, UploadedFile};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, body: ErrorResponse) -> ApiError {
    (status, Json(body))
}

/// Read the `file` and `type` fields of an upload form.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, DocumentKind), MultipartError> {
    let mut file = None;
    let mut kind = DocumentKind::from_form_value("");
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                file = Some(UploadedFile::new(name, bytes.to_vec()));
            }
            Some("type") => {
                kind = DocumentKind::from_form_value(field.text().await?.trim());
            }
            _ => {}
        }
    }
    Ok((file, kind))
}

fn processing_error(details: impl Into<String>) -> ApiError {
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new("Error processing file").with_details(details),
    )
}

/// POST /api/process-document: Forward an upload to the document service.
pub async fn process_document(
    State(state): State<ApiState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ContentResponse>, ApiError> {
    let (file, kind) = read_upload(multipart)
        .await
        .map_err(|e| processing_error(e.to_string()))?;

    let Some(file) = file else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("No file uploaded"),
        ));
    };
    let Some(token) = auth::bearer_token(&headers) else {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            ErrorResponse::new("Authorization header missing"),
        ));
    };

    let request_id = uuid::Uuid::new_v4();
    tracing::info!(
        "[{}] Processing {} upload '{}' ({} bytes)",
        request_id,
        kind.as_str(),
        file.name,
        file.bytes.len()
    );

    match state.extractor.extract(&file, kind, token).await {
        Ok(content) => Ok(Json(ContentResponse { content })),
        Err(AvatarError::Http { status, .. }) => {
            tracing::warn!("[{}] Document service returned HTTP {}", request_id, status);
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Err(api_error(
                code,
                ErrorResponse::new("File processing failed").with_status(status),
            ))
        }
        Err(e) => {
            tracing::warn!("[{}] Document extraction failed: {}", request_id, e);
            Err(processing_error(e.to_string()))
        }
    }
}

/// POST /api/get-access-token: Mint a session token with the server key.
/// The body is the raw token text.
pub async fn get_access_token(State(state): State<ApiState>) -> Result<String, ApiError> {
    let Some(account) = state.account.as_ref() else {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("API key is missing"),
        ));
    };
    account.create_token().await.map_err(|e| {
        tracing::warn!("Token request failed: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Failed to retrieve access token").with_details(e.to_string()),
        )
    })
}

/// GET /api/avatars: Account avatar list.
pub async fn list_avatars(
    State(state): State<ApiState>,
) -> Result<Json<AvatarListResponse>, ApiError> {
    let Some(account) = state.account.as_ref() else {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("API key is missing"),
        ));
    };
    account.list_avatars().await.map(Json).map_err(|e| {
        tracing::warn!("Avatar listing failed: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Failed to fetch avatars").with_details(e.to_string()),
        )
    })
}

/// POST /api/login: Log in against the auth service and set the cookie.
pub async fn login(State(state): State<ApiState>, Json(body): Json<LoginRequest>) -> Response {
    match state.auth.login(&body.email, &body.password).await {
        Ok(token) => (
            [(
                header::SET_COOKIE,
                auth::auth_cookie(&token, state.token_max_age_secs),
            )],
            Json(MessageResponse {
                message: LOGIN_SUCCESSFUL.into(),
            }),
        )
            .into_response(),
        Err(AvatarError::Auth(message)) => {
            (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}

/// POST /api/logout: Clear the auth cookie.
pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, auth::clear_auth_cookie())],
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    )
        .into_response()
}

/// GET /api/health: Simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Anything without a route or static file.
pub async fn not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, ErrorResponse::new("Not found"))
}
