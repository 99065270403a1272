use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::repo_types::{Gender, NewUser, Role, User};

impl User {
    /// Find a user by email.
    pub async fn find_by_email<'e>(
        db: impl PgExecutor<'e>,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, gender, phone, address,
                   role, active, avatar_key, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, gender, phone, address,
                   role, active, avatar_key, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create<'e>(db: impl PgExecutor<'e>, new: &NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, full_name, gender, phone, address, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, email, password_hash, full_name, gender, phone, address,
                      role, active, avatar_key, created_at
            "#,
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(new.gender.as_str())
        .bind(&new.phone)
        .bind(&new.address)
        .bind(new.role.as_str())
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// All users, optionally restricted to one role, oldest first.
    pub async fn list<'e>(db: impl PgExecutor<'e>, role: Option<Role>) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, gender, phone, address,
                   role, active, avatar_key, created_at
            FROM users
            WHERE $1::text IS NULL OR role = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(role.map(Role::as_str))
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn list_active_salers<'e>(db: impl PgExecutor<'e>) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, full_name, gender, phone, address,
                   role, active, avatar_key, created_at
            FROM users
            WHERE role = 'saler' AND active
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn is_active_saler<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<bool> {
        let (found,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = 'saler' AND active)",
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(found)
    }

    pub async fn update_profile<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        full_name: &str,
        gender: Gender,
        phone: &str,
        address: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET full_name = $2, gender = $3, phone = $4, address = $5
             WHERE id = $1
            RETURNING id, email, password_hash, full_name, gender, phone, address,
                      role, active, avatar_key, created_at
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(gender.as_str())
        .bind(phone)
        .bind(address)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Admin-side update of the account flags; `None` keeps the stored value.
    pub async fn update_access<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        active: Option<bool>,
        role: Option<Role>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET active = COALESCE($2, active),
                   role = COALESCE($3, role)
             WHERE id = $1
            RETURNING id, email, password_hash, full_name, gender, phone, address,
                      role, active, avatar_key, created_at
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(role.map(Role::as_str))
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn set_avatar_key<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        key: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET avatar_key = $2 WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(db)
            .await?;
        Ok(())
    }
}
