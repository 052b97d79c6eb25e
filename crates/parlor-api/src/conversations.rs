use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use parlor_core::{Principal, ServiceError};
use parlor_types::api::{Claims, ConversationQuery, NewConversationRequest};

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;

/// Run a service call off the async runtime; the stores block on SQLite.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || f(&state)).await?;
    Ok(result?)
}

pub async fn new_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = Principal::from(claims);
    let email = req.email.trim().to_lowercase();

    let profile = blocking(&state, move |s| s.service.new_conversation(&caller, &email)).await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn get_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ConversationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let since = query.since.unwrap_or_default();

    let profiles = blocking(&state, move |s| s.service.get_conversations(&claims.sub, since)).await?;

    Ok(Json(profiles))
}

pub async fn block_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = Principal::from(claims);
    let profile = blocking(&state, move |s| s.service.block_conversation(&id, &caller)).await?;
    Ok(Json(profile))
}

pub async fn unblock_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = Principal::from(claims);
    let profile = blocking(&state, move |s| s.service.unblock_conversation(&id, &caller)).await?;
    Ok(Json(profile))
}

pub async fn blocked_conversations(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> impl IntoResponse {
    Json(state.service.blocked_conversations())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use parlor_db::Database;
    use parlor_gateway::dispatcher::Dispatcher;
    use parlor_types::events::GatewayEvent;

    use super::*;

    const SECRET: &str = "test-secret";

    fn app_state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        Arc::new(AppStateInner::new(db, Dispatcher::new(), SECRET.into(), 1))
    }

    async fn call(state: &AppState, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = crate::router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Registers a user and returns (user_id, token).
    async fn register(state: &AppState, n: u8) -> (String, String) {
        let (status, body) = call(
            state,
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "email": format!("u{}@x.com", n),
                "name": format!("U{}", n),
                "password": "correct horse battery",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["user_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn conversation_routes_require_auth() {
        let state = app_state();

        let (status, _) = call(&state, "GET", "/conversations", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&state, "GET", "/conversations", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_and_login_checks_password() {
        let state = app_state();
        register(&state, 1).await;

        let (status, _) = call(
            &state,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "U1@x.com", "name": "Again", "password": "another password" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &state,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "u1@x.com", "password": "wrong password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &state,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "u1@x.com", "password": "correct horse battery" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "U1");
    }

    #[tokio::test]
    async fn conversation_lifecycle_over_http() {
        let state = app_state();
        let (u1_id, u1_token) = register(&state, 1).await;
        let (u2_id, u2_token) = register(&state, 2).await;
        let (_, mut u2_rx) = state.dispatcher.register_user_channel(&u2_id);

        let (status, profile) = call(
            &state,
            "POST",
            "/conversations",
            Some(&u1_token),
            Some(json!({ "email": "u2@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(profile["email"], "u2@x.com");
        assert_eq!(profile["is_blocked"], false);
        assert_eq!(profile["blocker_id"], "");
        let conv_id = profile["id"].as_str().unwrap().to_string();

        match u2_rx.try_recv().unwrap() {
            GatewayEvent::ConversationAdded(p) => {
                assert_eq!(p.id, conv_id);
                assert_eq!(p.email, "u1@x.com");
            }
            other => panic!("unexpected event {:?}", other),
        }

        let (status, body) = call(
            &state,
            "POST",
            "/conversations",
            Some(&u2_token),
            Some(json!({ "email": "u1@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("already exists"));

        let block_uri = format!("/conversations/{}/block", conv_id);
        let unblock_uri = format!("/conversations/{}/unblock", conv_id);

        let (status, blocked) = call(&state, "POST", &block_uri, Some(&u1_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(blocked["is_blocked"], true);
        assert_eq!(blocked["blocker_id"], u1_id.as_str());

        let (status, _) = call(&state, "POST", &unblock_uri, Some(&u2_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, listed) = call(&state, "GET", "/conversations", Some(&u2_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["email"], "u1@x.com");
        assert_eq!(listed[0]["is_blocked"], true);

        let (status, unblocked) = call(&state, "POST", &unblock_uri, Some(&u1_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unblocked["is_blocked"], false);

        let (status, listed) = call(
            &state,
            "GET",
            "/conversations?since=2999-01-01T00:00:00Z",
            Some(&u1_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_targets_are_not_found() {
        let state = app_state();
        let (_, token) = register(&state, 1).await;

        let (status, body) = call(
            &state,
            "POST",
            "/conversations",
            Some(&token),
            Some(json!({ "email": "nobody@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nobody@x.com"));

        let (status, _) = call(&state, "POST", "/conversations/missing/block", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blocked_listing_is_empty() {
        let state = app_state();
        let (_, token) = register(&state, 1).await;

        let (status, body) = call(&state, "GET", "/conversations/blocked", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
