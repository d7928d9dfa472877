use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub email: String, // unique key, normalised
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, salt included
    pub created_at: OffsetDateTime,
}
