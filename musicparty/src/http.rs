//! The thin read-only HTTP surface plus the bind endpoints.
//!
//! Everything stateful goes through the WebSocket hub; these routes only
//! answer snapshot queries against the catalog adapters and manage guest
//! sessions. Error bodies carry a small numeric code the client keys on
//! (1 = unknown catalog, 2 = binding required).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::debug;

use musicparty_core::models::{MusicServiceUser, Playlist, Track};
use musicparty_core::provider::{MusicApi, PLAYLIST_PAGE_SIZE};
use musicparty_core::Error;

use crate::state::AppState;
use crate::ws;

const SESSION_COOKIE: &str = "party_session";

const CODE_GENERAL: u32 = 0;
const CODE_UNKNOWN_API: u32 = 1;
const CODE_NEED_BIND: u32 = 2;

/// The session token of the requesting client, injected by
/// [`session_layer`].
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/profile", get(profile))
        .route("/api/musicservices", get(music_services))
        .route("/api/bindinfo", get(bind_info))
        .route("/api/{api}/searchmusic/{keyword}", get(search_music))
        .route("/api/{api}/searchuser/{keyword}", get(search_user))
        .route("/api/{api}/myplaylists", get(my_playlists))
        .route("/api/{api}/playlistmusics/{id}", get(playlist_musics))
        .route("/api/{api}/bind/{identifier}", get(bind_account))
        .route("/api/{api}/credential", post(set_credential))
        .route("/music", get(ws::music_ws))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Ensure every request runs with a known session, creating one (and
/// setting the cookie) on first contact.
async fn session_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let existing = cookie_value(req.headers(), SESSION_COOKIE)
        .filter(|token| state.sessions.exists(token));
    let (token, is_new) = match existing {
        Some(token) => (token, false),
        None => {
            let (token, name) = state.sessions.create();
            debug!(name, "created guest session");
            (token, true)
        }
    };

    req.extensions_mut().insert(SessionToken(token.clone()));
    let mut response = next.run(req).await;
    if is_new {
        let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

// ---- handlers ----

#[derive(Serialize)]
struct Profile {
    name: String,
}

async fn profile(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
) -> Result<Json<Profile>, AppError> {
    let name = state
        .sessions
        .name(&token.0)
        .ok_or_else(|| AppError::from(Error::NotFound("session".to_string())))?;
    Ok(Json(Profile { name }))
}

async fn music_services(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.apis.names())
}

async fn search_music(
    State(state): State<AppState>,
    Path((api_name, keyword)): Path<(String, String)>,
) -> Result<Json<Vec<Track>>, AppError> {
    let api = lookup_api(&state, &api_name)?;
    Ok(Json(api.search_by_name(&keyword, 0).await.map_err(Error::from)?))
}

async fn search_user(
    State(state): State<AppState>,
    Path((api_name, keyword)): Path<(String, String)>,
) -> Result<Json<Vec<MusicServiceUser>>, AppError> {
    let api = lookup_api(&state, &api_name)?;
    Ok(Json(api.search_users(&keyword).await.map_err(Error::from)?))
}

async fn my_playlists(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    Path(api_name): Path<String>,
) -> Result<Json<Vec<Playlist>>, AppError> {
    let api = lookup_api(&state, &api_name)?;
    let identifier = state.sessions.binding(&token.0, &api_name).ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            CODE_NEED_BIND,
            format!("no {api_name} account bound to this session"),
        )
    })?;
    Ok(Json(
        api.list_user_playlists(&identifier)
            .await
            .map_err(Error::from)?,
    ))
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: usize,
}

async fn playlist_musics(
    State(state): State<AppState>,
    Path((api_name, playlist_id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Track>>, AppError> {
    let api = lookup_api(&state, &api_name)?;
    let offset = query.page * PLAYLIST_PAGE_SIZE;
    Ok(Json(
        api.list_playlist_tracks(&playlist_id, offset)
            .await
            .map_err(Error::from)?,
    ))
}

async fn bind_account(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    Path((api_name, identifier)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    lookup_api(&state, &api_name)?;
    state.sessions.bind(&token.0, &api_name, &identifier);
    Ok(StatusCode::NO_CONTENT)
}

async fn bind_info(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
) -> Json<HashMap<String, String>> {
    Json(state.sessions.bindings(&token.0))
}

#[derive(Deserialize)]
struct CredentialBody {
    credential: String,
}

/// Re-bind a provider's upstream credential (e.g. a fresh cookie after the
/// old one expired). The adapter validates against upstream before
/// swapping; a rejected credential leaves the old one in effect.
async fn set_credential(
    State(state): State<AppState>,
    Path(api_name): Path<String>,
    Json(body): Json<CredentialBody>,
) -> Result<StatusCode, AppError> {
    let api = lookup_api(&state, &api_name)?;
    let accepted = api
        .try_set_credential(&body.credential)
        .await
        .map_err(Error::from)?;
    if accepted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            CODE_GENERAL,
            format!("{api_name} rejected the credential"),
        ))
    }
}

fn lookup_api(state: &AppState, api_name: &str) -> Result<Arc<dyn MusicApi>, AppError> {
    state.apis.get(api_name).ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            CODE_UNKNOWN_API,
            format!("unknown music api: {api_name}"),
        )
    })
}

// ---- error mapping ----

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: u32,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: u32, message: String) -> Self {
        Self {
            status,
            code,
            message,
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, CODE_GENERAL, err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_cookie_value_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; party_session=tok_abc; b=2"),
        );
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("tok_abc")
        );
        assert!(cookie_value(&headers, "missing").is_none());
        assert!(cookie_value(&HeaderMap::new(), SESSION_COOKIE).is_none());
    }

    #[test]
    fn test_error_status_mapping() {
        let err = AppError::from(Error::Upstream("gateway sad".to_string()));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, CODE_GENERAL);

        let err = AppError::from(Error::NotImplemented("no search".to_string()));
        assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);
    }
}
