use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use psyche_core::auth;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn register_router() -> Router<AppState> {
    Router::new().route("/v1/auth/register", post(register))
}

pub fn login_router() -> Router<AppState> {
    Router::new().route("/v1/auth/login", post(login))
}

// ──────────────────────────────────────────────
// POST /v1/auth/register
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserBrief {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserBrief,
}

/// Map a unique-constraint name to the request field it guards. Unknown
/// constraints fall back to `username`.
fn duplicate_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "email",
        _ => "username",
    }
}

fn validate_register(req: &RegisterRequest) -> Result<(), AppError> {
    let username = req.username.trim();
    if username.len() < 3 || username.len() > 50 {
        return Err(AppError::Validation {
            message: "username must be between 3 and 50 characters".to_string(),
            field: Some("username".to_string()),
            received: Some(serde_json::Value::String(req.username.clone())),
            docs_hint: None,
        });
    }
    if !req.email.contains('@') || req.email.trim().is_empty() {
        return Err(AppError::Validation {
            message: "email must be a valid email address".to_string(),
            field: Some("email".to_string()),
            received: Some(serde_json::Value::String(req.email.clone())),
            docs_hint: None,
        });
    }
    if req.password.len() < 6 {
        return Err(AppError::Validation {
            message: "password must be at least 6 characters".to_string(),
            field: Some("password".to_string()),
            received: None,
            docs_hint: None,
        });
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Validation error or duplicate username/email", body = psyche_core::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_register(&req)?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let password_hash = auth::hash_password(&req.password).map_err(AppError::Internal)?;
    let user_id = Uuid::now_v7();

    sqlx::query("INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.code().as_deref() == Some("23505") {
                    let field = duplicate_field(db_err.constraint());
                    return AppError::Validation {
                        message: format!("A user with this {field} is already registered"),
                        field: Some(field.to_string()),
                        received: None,
                        docs_hint: Some("Pick a different username or email.".to_string()),
                    };
                }
            }
            AppError::Database(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user: UserBrief {
                id: user_id,
                username,
                email,
            },
        }),
    ))
}

// ──────────────────────────────────────────────
// POST /v1/auth/login
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// A username or an email address
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserBrief,
    pub token: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 404, description = "Unknown username/email", body = psyche_core::error::ApiError),
        (status = 401, description = "Wrong password", body = psyche_core::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let identifier = req.username.trim();

    let user = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, email, password_hash FROM users \
         WHERE username = $1 OR lower(email) = lower($1)",
    )
    .bind(identifier)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound {
        message: "User not found.".to_string(),
    })?;

    let valid =
        auth::verify_password(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        return Err(AppError::Unauthorized {
            message: "Password incorrect.".to_string(),
        });
    }

    let token = crate::auth::create_access_token(&state.jwt, user.id, &user.username)
        .map_err(AppError::Internal)?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user: UserBrief {
            id: user.id,
            username: user.username,
            email: user.email,
        },
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;

    async fn db_pool_if_available() -> Option<PgPool> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .ok()?;

        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        Some(pool)
    }

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn register_validation_rejects_short_username() {
        let err = validate_register(&request("ab", "a@b.com", "secret1")).unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(f), .. } if f == "username"));
    }

    #[test]
    fn register_validation_rejects_bad_email() {
        let err = validate_register(&request("ayu", "not-an-email", "secret1")).unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(f), .. } if f == "email"));
    }

    #[test]
    fn register_validation_rejects_short_password() {
        let err = validate_register(&request("ayu", "a@b.com", "pw")).unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(f), .. } if f == "password"));
    }

    #[test]
    fn register_validation_accepts_valid_request() {
        assert!(validate_register(&request("ayu", "a@b.com", "secret1")).is_ok());
    }

    #[test]
    fn duplicate_field_maps_known_constraints() {
        assert_eq!(duplicate_field(Some("users_email_key")), "email");
        assert_eq!(duplicate_field(Some("users_username_key")), "username");
        assert_eq!(duplicate_field(None), "username");
    }

    #[tokio::test]
    async fn duplicate_email_violation_reports_email_field() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        let email = format!("dup-{first}@example.com");

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4)",
        )
        .bind(first)
        .bind(format!("user-{first}"))
        .bind(&email)
        .bind("unused-hash")
        .execute(&pool)
        .await
        .expect("first insert");

        let err = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4)",
        )
        .bind(second)
        .bind(format!("user-{second}"))
        .bind(&email)
        .bind("unused-hash")
        .execute(&pool)
        .await
        .expect_err("duplicate email must violate the unique constraint");

        let sqlx::Error::Database(db_err) = err else {
            panic!("expected a database error, got {err:?}");
        };
        assert_eq!(db_err.code().as_deref(), Some("23505"));
        assert_eq!(duplicate_field(db_err.constraint()), "email");
    }
}
