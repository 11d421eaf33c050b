use super::util::{VoterTable, store_error};
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const COMMENT_VOTERS: VoterTable = VoterTable {
    table: "articlecomment_voters",
    target_column: "articlecomment_id",
};

macro_rules! select_comment {
    ($tail:literal) => {
        concat!(
            "SELECT c.id, c.article_id, c.author_id, u.username AS author_name, c.content, ",
            "c.is_secret, c.paired_comment_id, c.created_at, ",
            "(SELECT COUNT(*) FROM articlecomment_voters v WHERE v.articlecomment_id = c.id) AS voter_count ",
            "FROM article_comments c JOIN users u ON u.id = c.author_id ",
            $tail
        )
    };
}

pub struct MySqlCommentRepo {
    pool: MySqlPool,
}

impl MySqlCommentRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCommentRepo { pool }
    }

    fn row_to_comment(row: MySqlRow) -> Result<Comment, StoreError> {
        Ok(Comment {
            id: row.try_get("id").map_err(store_error)?,
            article_id: row.try_get("article_id").map_err(store_error)?,
            author_id: row.try_get("author_id").map_err(store_error)?,
            author_name: row.try_get("author_name").map_err(store_error)?,
            content: row.try_get("content").map_err(store_error)?,
            is_secret: row.try_get("is_secret").map_err(store_error)?,
            paired_comment_id: row.try_get("paired_comment_id").map_err(store_error)?,
            created_at: row.try_get("created_at").map_err(store_error)?,
            voter_count: row.try_get("voter_count").map_err(store_error)?,
        })
    }
}

#[async_trait::async_trait]
impl CommentRepo for MySqlCommentRepo {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO article_comments (article_id, author_id, content, is_secret, paired_comment_id)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(comment.article_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.is_secret)
        .bind(comment.paired_comment_id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let id = CommentId(result.last_insert_id() as i64);
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::Store(format!("comment {id} vanished after insert")))
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        sqlx::query(select_comment!("WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .map(Self::row_to_comment)
            .transpose()
    }

    async fn update(
        &self,
        id: CommentId,
        content: &str,
        is_secret: bool,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE article_comments SET content = ?, is_secret = ? WHERE id = ?")
            .bind(content)
            .bind(is_secret)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete(&self, id: CommentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM article_comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_replies(&self, id: CommentId) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM article_comments WHERE paired_comment_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn list_for_article(&self, article_id: ArticleId) -> Result<Vec<Comment>, StoreError> {
        sqlx::query(select_comment!(
            "WHERE c.article_id = ? ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(Self::row_to_comment)
        .collect()
    }

    async fn toggle_vote(
        &self,
        id: CommentId,
        user_id: UserId,
    ) -> Result<VoteOutcome, StoreError> {
        let result = COMMENT_VOTERS.toggle(&self.pool, user_id.0, id.0).await?;

        let voter_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articlecomment_voters WHERE articlecomment_id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(VoteOutcome {
            result,
            voter_count,
        })
    }
}
