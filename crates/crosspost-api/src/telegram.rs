use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use tracing::info;

use crosspost_core::SetupOutcome;
use crosspost_types::api::{
    ChannelCheckResponse, ChannelSummary, ConnectionResponse, LinkChannelRequest, SetupResponse,
    StatusResponse, VerifyRequest,
};

use crate::error::ApiError;
use crate::session::{self, Session};
use crate::state::{AppState, blocking};

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Issue a setup token, or report the existing binding.
pub async fn setup(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<SetupResponse>, ApiError> {
    let linker = state.linker.clone();
    let outcome = blocking(move || linker.request_setup(session.owner_id)).await?;

    let response = match outcome {
        SetupOutcome::Connected { telegram_user_id } => SetupResponse {
            connected: true,
            token: None,
            bot_url: None,
            telegram_user_id: Some(telegram_user_id),
        },
        SetupOutcome::Pending { token, bot_url } => SetupResponse {
            connected: false,
            token: Some(token),
            bot_url: Some(bot_url),
            telegram_user_id: None,
        },
    };

    Ok(Json(response))
}

pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    let linker = state.linker.clone();
    blocking(move || linker.verify(&req.token, req.telegram_user_id)).await?;

    Ok(Json(StatusResponse::success()))
}

/// The bearer value is tried as a setup token first, then as a session JWT
/// so the caller can see its permanent binding.
pub async fn check_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConnectionResponse>, ApiError> {
    let token = session::bearer(&headers)
        .ok_or(ApiError::Unauthorized("No token provided"))?
        .to_string();
    let owner_id = session::owner_from_jwt(&state.jwt_secret, &token);

    let linker = state.linker.clone();
    let status = blocking(move || linker.check_connection(&token, owner_id)).await?;

    Ok(Json(ConnectionResponse {
        connected: status.connected,
        telegram_user_id: status.telegram_user_id,
    }))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<StatusResponse>, ApiError> {
    info!(owner_id = session.owner_id, "disconnecting telegram account");
    let linker = state.linker.clone();
    blocking(move || linker.disconnect(session.owner_id)).await?;

    Ok(Json(StatusResponse::success()))
}

pub async fn disconnect_all(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<StatusResponse>, ApiError> {
    info!(owner_id = session.owner_id, "disconnecting all telegram bindings");
    let linker = state.linker.clone();
    blocking(move || linker.disconnect_all(session.owner_id)).await?;

    Ok(Json(StatusResponse::success()))
}

pub async fn disconnect_channel(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<StatusResponse>, ApiError> {
    info!(owner_id = session.owner_id, "disconnecting telegram channel");
    let channels = state.channels.clone();
    blocking(move || channels.disconnect_channel(session.owner_id)).await?;

    Ok(Json(StatusResponse::success()))
}

pub async fn check_channel(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<ChannelCheckResponse>, ApiError> {
    let channels = state.channels.clone();
    let has_channel = blocking(move || channels.has_channel_for_owner(session.owner_id)).await?;

    Ok(Json(ChannelCheckResponse { has_channel }))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<ChannelSummary>>, ApiError> {
    let channels = state.channels.clone();
    let bound = blocking(move || channels.channels_for_owner(session.owner_id)).await?;

    Ok(Json(
        bound
            .into_iter()
            .map(|c| ChannelSummary {
                channel_id: c.channel_id,
                channel_title: c.channel_title,
                created_at: c.created_at,
            })
            .collect(),
    ))
}

pub async fn link_channel(
    State(state): State<AppState>,
    body: Result<Json<LinkChannelRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = body?;
    info!(
        telegram_user_id = req.telegram_user_id,
        channel_id = req.channel_id,
        "linking channel"
    );
    let channels = state.channels.clone();
    blocking(move || {
        channels.link_channel(req.telegram_user_id, req.channel_id, &req.channel_title)
    })
    .await?;

    Ok(Json(StatusResponse::success()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crosspost_core::{ChannelRegistry, Linker, ManualClock};
    use crosspost_db::Store;
    use crosspost_db::memory::MemoryStore;

    use crate::state::AppStateInner;
    use crate::{router, session};

    const SECRET: &str = "test-secret";

    struct Harness {
        app: Router,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let state = Arc::new(AppStateInner {
            linker: Linker::new(store.clone(), clock.clone(), "feedsAIbot"),
            channels: ChannelRegistry::new(store.clone(), clock.clone()),
            jwt_secret: SECRET.into(),
        });
        Harness {
            app: router(state),
            store,
            clock,
        }
    }

    fn session_for(owner_id: i64) -> String {
        session::issue(SECRET, owner_id, Duration::hours(1)).unwrap()
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn setup_token(h: &Harness, owner_id: i64) -> String {
        let (status, body) = call(
            &h.app,
            Method::GET,
            "/api/telegram/setup",
            Some(&session_for(owner_id)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness();
        let (status, body) = call(&h.app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn setup_requires_session() {
        let h = harness();
        let (status, body) = call(&h.app, Method::GET, "/api/telegram/setup", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "No token provided");

        let (status, _) = call(
            &h.app,
            Method::GET,
            "/api/telegram/setup",
            Some("not-a-jwt"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn setup_then_verify_links_account() {
        let h = harness();
        let session = session_for(666);

        let (status, body) = call(&h.app, Method::GET, "/api/telegram/setup", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(
            body["bot_url"],
            format!("https://t.me/feedsAIbot?start={token}")
        );
        assert!(body.get("telegram_user_id").is_none());

        let (status, body) = call(
            &h.app,
            Method::POST,
            "/api/telegram/verify",
            None,
            Some(json!({ "token": token, "telegram_user_id": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success" }));

        let (_, body) = call(&h.app, Method::GET, "/api/telegram/setup", Some(&session), None).await;
        assert_eq!(body, json!({ "connected": true, "telegram_user_id": 42 }));
    }

    #[tokio::test]
    async fn verify_twice_is_invalid() {
        let h = harness();
        let token = setup_token(&h, 666).await;
        let body = json!({ "token": token, "telegram_user_id": 42 });

        let (status, _) = call(&h.app, Method::POST, "/api/telegram/verify", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, err) = call(&h.app, Method::POST, "/api/telegram/verify", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["detail"], "Invalid token");
    }

    #[tokio::test]
    async fn verify_rejects_unknown_token() {
        let h = harness();
        let (status, err) = call(
            &h.app,
            Method::POST,
            "/api/telegram/verify",
            None,
            Some(json!({ "token": "missing", "telegram_user_id": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["detail"], "Invalid token");
    }

    #[tokio::test]
    async fn verify_past_ttl_reports_expiry() {
        let h = harness();
        let token = setup_token(&h, 666).await;

        h.clock.advance(Duration::milliseconds(600_001));
        let (status, err) = call(
            &h.app,
            Method::POST,
            "/api/telegram/verify",
            None,
            Some(json!({ "token": token, "telegram_user_id": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err, json!({ "detail": "Token expired" }));
        assert_eq!(h.store.get_owner_by_telegram_id(42).unwrap(), None);
    }

    #[tokio::test]
    async fn verify_ignores_unknown_fields() {
        let h = harness();
        let token = setup_token(&h, 666).await;

        let (status, _) = call(
            &h.app,
            Method::POST,
            "/api/telegram/verify",
            None,
            Some(json!({ "token": token, "telegram_user_id": 42, "source": "web" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_gets_detail() {
        let h = harness();

        let (status, err) = call(
            &h.app,
            Method::POST,
            "/api/telegram/verify",
            None,
            Some(json!({ "token": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err["detail"].as_str().is_some_and(|d| !d.is_empty()));

        let (status, err) = call(
            &h.app,
            Method::POST,
            "/api/telegram/link-channel",
            None,
            Some(json!({ "channel_id": "not a number" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err["detail"].is_string());
    }

    #[tokio::test]
    async fn check_connection_tracks_token_then_binding() {
        let h = harness();
        let session = session_for(666);
        let token = setup_token(&h, 666).await;

        let (status, body) = call(&h.app, Method::GET, "/api/telegram/check-connection", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "connected": true }));

        h.store.save_account_binding(42, 666, Utc::now()).unwrap();
        h.store.delete_token(&token).unwrap();

        // consumed setup token carries no identity
        let (_, body) = call(&h.app, Method::GET, "/api/telegram/check-connection", Some(&token), None).await;
        assert_eq!(body, json!({ "connected": false }));

        let (_, body) = call(&h.app, Method::GET, "/api/telegram/check-connection", Some(&session), None).await;
        assert_eq!(body, json!({ "connected": true, "telegram_user_id": 42 }));
    }

    #[tokio::test]
    async fn check_connection_expires_token() {
        let h = harness();
        let token = setup_token(&h, 666).await;

        h.clock.advance(Duration::seconds(601));
        let (_, body) = call(&h.app, Method::GET, "/api/telegram/check-connection", Some(&token), None).await;
        assert_eq!(body, json!({ "connected": false }));
        assert!(h.store.get_token(&token).unwrap().is_none());
    }

    #[tokio::test]
    async fn check_connection_requires_bearer() {
        let h = harness();
        let (status, _) = call(&h.app, Method::GET, "/api/telegram/check-connection", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn link_channel_flow() {
        let h = harness();
        let session = session_for(666);

        let (status, err) = call(
            &h.app,
            Method::POST,
            "/api/telegram/link-channel",
            None,
            Some(json!({ "telegram_user_id": 42, "channel_id": 100, "channel_title": "My Channel" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["detail"], "User not found");

        h.store.save_account_binding(42, 666, Utc::now()).unwrap();
        let (status, _) = call(
            &h.app,
            Method::POST,
            "/api/telegram/link-channel",
            None,
            Some(json!({
                "telegram_user_id": 42,
                "channel_id": 100,
                "channel_title": "My Channel",
                "client": "web"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&h.app, Method::GET, "/api/telegram/check-channel", Some(&session), None).await;
        assert_eq!(body, json!({ "hasChannel": true }));

        let (_, body) = call(&h.app, Method::GET, "/api/telegram/channels", Some(&session), None).await;
        assert_eq!(body[0]["channel_id"], 100);
        assert_eq!(body[0]["channel_title"], "My Channel");

        let (status, _) = call(&h.app, Method::POST, "/api/telegram/disconnect-channel", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&h.app, Method::GET, "/api/telegram/check-channel", Some(&session), None).await;
        assert_eq!(body, json!({ "hasChannel": false }));
        assert_eq!(h.store.get_owner_by_telegram_id(42).unwrap(), Some(666));
    }

    #[tokio::test]
    async fn disconnect_all_is_scoped_to_session_owner() {
        let h = harness();
        h.store.save_account_binding(42, 666, Utc::now()).unwrap();
        h.store.save_account_binding(50, 777, Utc::now()).unwrap();
        h.store.save_channel_binding(666, 100, "a", Utc::now()).unwrap();

        let (status, body) = call(
            &h.app,
            Method::POST,
            "/api/telegram/disconnect-all",
            Some(&session_for(666)),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success" }));

        assert!(!h.store.has_channel(666).unwrap());
        assert_eq!(h.store.get_owner_by_telegram_id(42).unwrap(), None);
        assert_eq!(h.store.get_owner_by_telegram_id(50).unwrap(), Some(777));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let h = harness();
        let session = session_for(666);
        for _ in 0..2 {
            let (status, _) = call(&h.app, Method::POST, "/api/telegram/disconnect", Some(&session), None).await;
            assert_eq!(status, StatusCode::OK);
        }
    }
}
