use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tokio::task;

use crate::auth::password;
use crate::auth::role::Role;
use crate::config::SecurityConfig;
use crate::entities::users;

/// User data returned from the repository. The password hash never leaves
/// this module.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub team_id: Option<i32>,
    pub team_member_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: Role::from_db(&model.role),
            team_id: model.team_id,
            team_member_id: model.team_member_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// List all users, oldest first
    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Verify a password for a user
    /// Note: This uses `spawn_blocking` because Argon2 verification is
    /// CPU-intensive and would block the async runtime if run directly.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid =
            task::spawn_blocking(move || password::verify_password(&password, &password_hash))
                .await
                .context("Password verification task panicked")?;

        Ok(is_valid)
    }

    /// Create a user with the given role and a freshly hashed password
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        role: Role,
        security: &SecurityConfig,
    ) -> Result<User> {
        let password = password.to_string();
        let security = security.clone();
        let hash = task::spawn_blocking(move || password::hash_password(&password, Some(&security)))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(hash),
            role: Set(role.as_str().to_string()),
            team_id: Set(None),
            team_member_id: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Update password for a user (hashes the new password)
    pub async fn update_password(
        &self,
        username: &str,
        new_password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;

        let password = new_password.to_string();
        let security = security.clone();
        let new_hash =
            task::spawn_blocking(move || password::hash_password(&password, Some(&security)))
                .await
                .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.updated_at = Set(now);
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Update role and team assignment for a user
    pub async fn update_assignment(
        &self,
        id: i32,
        role: Role,
        team_id: Option<i32>,
        team_member_id: Option<i32>,
    ) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for assignment update")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.role = Set(role.as_str().to_string());
        active.team_id = Set(team_id);
        active.team_member_id = Set(team_member_id);
        active.updated_at = Set(now);
        let model = active.update(&self.conn).await?;

        Ok(Some(User::from(model)))
    }

    /// Delete a user by ID
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}
