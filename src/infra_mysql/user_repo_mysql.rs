use super::util::store_error;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool, Row};

macro_rules! select_user_where {
    ($clause:literal) => {
        concat!(
            "SELECT id, username, email, password_hash, img_path, is_admin, created_at ",
            "FROM users WHERE ",
            $clause
        )
    };
}

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_user(row: MySqlRow) -> Result<User, StoreError> {
        Ok(User {
            id: row.try_get("id").map_err(store_error)?,
            username: row.try_get("username").map_err(store_error)?,
            email: row.try_get("email").map_err(store_error)?,
            password_hash: row.try_get("password_hash").map_err(store_error)?,
            img_path: row.try_get("img_path").map_err(store_error)?,
            is_admin: row.try_get("is_admin").map_err(store_error)?,
            created_at: row.try_get("created_at").map_err(store_error)?,
        })
    }

    async fn fetch_user(
        &self,
        query: Query<'_, MySql, MySqlArguments>,
    ) -> Result<Option<User>, StoreError> {
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .map(Self::row_to_user)
            .transpose()
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user(sqlx::query(select_user_where!("email = ?")).bind(email))
            .await
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        self.fetch_user(sqlx::query(select_user_where!("id = ?")).bind(user_id))
            .await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user(sqlx::query(select_user_where!("username = ?")).bind(username))
            .await
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO users (username, email, password_hash, img_path)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.img_path)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let id = UserId(result.last_insert_id() as i64);
        self.get_by_id(id)
            .await?
            .ok_or_else(|| StoreError::Store(format!("user {id} vanished after insert")))
    }

    async fn update_password(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_email(&self, user_id: UserId, email: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_username(&self, user_id: UserId, username: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(username)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, StoreError> {
        // articles, comments and votes go with the user via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }
}
