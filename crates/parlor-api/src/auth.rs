use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use parlor_core::ConversationService;
use parlor_db::Database;
use parlor_db::queries::EmailTaken;
use parlor_gateway::dispatcher::Dispatcher;
use parlor_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub service: ConversationService,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl AppStateInner {
    /// Wire the conversation service to the SQLite stores and the gateway
    /// dispatcher.
    pub fn new(db: Database, dispatcher: Dispatcher, jwt_secret: String, token_ttl_days: i64) -> Self {
        let db = Arc::new(db);
        let service = ConversationService::new(db.clone(), db.clone(), Arc::new(dispatcher.clone()));
        Self {
            db,
            service,
            dispatcher,
            jwt_secret,
            token_ttl_days,
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || email.len() > 254 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > 64 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Check if email is taken
    if state
        .db
        .get_user_by_email(&email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user_id = Uuid::new_v4().to_string();

    state
        .db
        .create_user(&user_id, &email, name, &req.img_url, &password_hash)
        .map_err(|e| create_user_status(&email, e))?;

    let claims = Claims {
        sub: user_id.clone(),
        email,
        name: name.to_string(),
        img_url: req.img_url,
        exp: 0,
    };
    let token = create_token(&state, claims).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!("Registered user {}", user_id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = state
        .db
        .get_user_by_email(&req.email.trim().to_lowercase())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email,
        name: user.name.clone(),
        img_url: user.img_url,
        exp: 0,
    };
    let token = create_token(&state, claims).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        name: user.name,
        token,
    }))
}

/// A concurrent registration may claim the email between the check and the
/// insert; that still reports 409.
fn create_user_status(email: &str, e: anyhow::Error) -> StatusCode {
    if e.is::<EmailTaken>() {
        return StatusCode::CONFLICT;
    }
    error!("Failed to create user {}: {}", email, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Sign `claims`, overriding `exp` with the configured token lifetime.
fn create_token(state: &AppStateInner, mut claims: Claims) -> anyhow::Result<String> {
    claims.exp = (chrono::Utc::now() + chrono::Duration::days(state.token_ttl_days)).timestamp() as usize;

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_race_on_insert_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("user-1", "u1@x.com", "U1", "", "hash").unwrap();

        let err = db
            .create_user("user-2", "u1@x.com", "U1 again", "", "hash")
            .unwrap_err();
        assert_eq!(create_user_status("u1@x.com", err), StatusCode::CONFLICT);

        let other = anyhow::anyhow!("disk I/O error");
        assert_eq!(create_user_status("u1@x.com", other), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
