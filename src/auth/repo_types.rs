use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,                         // assigned by the store
    pub display_name: String,             // shown to other users
    pub email: String,                    // normalized (trimmed, lowercase)
    pub password_hash: String,            // Argon2 PHC string
    pub current_token: Option<String>,    // the one active session token, if any
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user; the store fills in the rest.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: String,
    pub email: String,
    pub password_hash: String,
}
