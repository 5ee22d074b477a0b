use async_trait::async_trait;
use bunkride_core::profile::{NewProfile, Profile, ProfileUpdate};
use bunkride_core::repository::ProfileRepository;
use bunkride_core::{College, WorkflowError, WorkflowResult};
use bunkride_shared::pii::Masked;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    name: String,
    email: String,
    college: String,
    phone: String,
    year: Option<String>,
    avatar_url: Option<String>,
    show_name: bool,
    show_year: bool,
    email_verified: bool,
    created_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            name: row.name,
            email: row.email,
            college: College::from(row.college),
            phone: Masked::new(row.phone),
            year: row.year,
            avatar_url: row.avatar_url,
            show_name: row.show_name,
            show_year: row.show_year,
            email_verified: row.email_verified,
            created_at: row.created_at,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, name, email, college, phone, year, avatar_url, \
     show_name, show_year, email_verified, created_at";

fn store_err(e: sqlx::Error) -> WorkflowError {
    WorkflowError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn create_profile(
        &self,
        profile: &NewProfile,
        password_hash: &str,
        verification_token: Uuid,
    ) -> WorkflowResult<Profile> {
        let college = College::from_email(&profile.email)?;
        let id = Uuid::new_v4();

        let row: ProfileRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, name, email, password_hash, college, phone, year, verification_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(&profile.name)
        .bind(profile.email.to_ascii_lowercase())
        .bind(password_hash)
        .bind(college.as_str())
        .bind(&profile.phone)
        .bind(&profile.year)
        .bind(verification_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                WorkflowError::Validation("an account with this email already exists".to_string())
            }
            _ => store_err(e),
        })?;

        info!("Profile created: {} ({})", row.id, row.college);
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> WorkflowResult<Option<Profile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> WorkflowResult<Option<Profile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users WHERE email = $1"))
                .bind(email.to_ascii_lowercase())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn password_hash(&self, email: &str) -> WorkflowResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM users WHERE email = $1")
                .bind(email.to_ascii_lowercase())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(row.map(|(hash,)| hash))
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> WorkflowResult<Profile> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 phone = COALESCE($3, phone), \
                 year = COALESCE($4, year), \
                 avatar_url = COALESCE($5, avatar_url), \
                 show_name = COALESCE($6, show_name), \
                 show_year = COALESCE($7, show_year) \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .bind(&update.year)
        .bind(&update.avatar_url)
        .bind(update.show_name)
        .bind(update.show_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(Into::into)
            .ok_or_else(|| WorkflowError::NotFound(format!("profile {id}")))
    }

    async fn verify_email(&self, token: Uuid) -> WorkflowResult<Option<Profile>> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "UPDATE users SET email_verified = TRUE, verification_token = NULL \
             WHERE verification_token = $1 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        if let Some(row) = &row {
            info!("Email verified for {}", row.id);
        }
        Ok(row.map(Into::into))
    }
}
