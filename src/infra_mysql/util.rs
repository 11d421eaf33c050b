use crate::domain_model::VoteAction;
use crate::domain_port::StoreError;
use crate::logger::*;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlDatabaseError;

const ER_DUP_ENTRY: u16 = 1062;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return Some(mysql_err.number());
        }
    }
    None
}

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    mysql_error_number(err) == Some(ER_DUP_ENTRY)
}

/// InnoDB rolled the transaction back to break a deadlock, or gave up
/// waiting on a row lock. Either way the whole transaction may be rerun.
pub fn is_lock_conflict(err: &sqlx::Error) -> bool {
    is_lock_conflict_number(mysql_error_number(err))
}

fn is_lock_conflict_number(number: Option<u16>) -> bool {
    matches!(number, Some(ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT))
}

/// A voter join table, e.g. `article_voters(user_id, article_id)`.
pub struct VoterTable {
    pub table: &'static str,
    pub target_column: &'static str,
}

impl VoterTable {
    /// Flips the vote of `user_id` on `target_id`. Concurrent toggles on the
    /// same row can deadlock on the gap lock; the loser is rerun once.
    pub async fn toggle(
        &self,
        pool: &MySqlPool,
        user_id: i64,
        target_id: i64,
    ) -> Result<VoteAction, StoreError> {
        let mut attempt = 1;
        loop {
            match self.toggle_once(pool, user_id, target_id).await {
                Err(e) if attempt < 2 && is_lock_conflict(&e) => {
                    warn!(table = self.table, error = %e, "vote toggle lost a lock race, retrying");
                    attempt += 1;
                }
                other => return other.map_err(store_error),
            }
        }
    }

    async fn toggle_once(
        &self,
        pool: &MySqlPool,
        user_id: i64,
        target_id: i64,
    ) -> Result<VoteAction, sqlx::Error> {
        let delete = format!(
            "DELETE FROM {} WHERE user_id = ? AND {} = ?",
            self.table, self.target_column
        );
        let insert = format!(
            "INSERT INTO {} (user_id, {}) VALUES (?, ?)",
            self.table, self.target_column
        );
        let mut tx = pool.begin().await?;

        let removed = sqlx::query(&delete)
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let result = if removed > 0 {
            VoteAction::Delete
        } else {
            let inserted = sqlx::query(&insert)
                .bind(user_id)
                .bind(target_id)
                .execute(&mut *tx)
                .await;
            match inserted {
                Ok(_) => VoteAction::Insert,
                // a concurrent toggle inserted first; undo it
                Err(e) if is_dup_key(&e) => {
                    sqlx::query(&delete)
                        .bind(user_id)
                        .bind(target_id)
                        .execute(&mut *tx)
                        .await?;
                    VoteAction::Delete
                }
                Err(e) => return Err(e),
            }
        };
        tx.commit().await?;
        Ok(result)
    }
}

pub fn store_error(err: sqlx::Error) -> StoreError {
    if is_dup_key(&err) {
        return StoreError::Duplicate(err.to_string());
    }
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Store(other.to_string()),
    }
}

/// `%needle%` with LIKE wildcards in the needle matched literally.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
