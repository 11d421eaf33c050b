use super::util::{VoterTable, like_pattern, store_error};
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

const ARTICLE_VOTERS: VoterTable = VoterTable {
    table: "article_voters",
    target_column: "article_id",
};

const ARTICLE_SELECT: &str = r#"
SELECT a.id, a.title, a.content, a.img_path, a.author_id, u.username AS author_name,
       a.created_at,
       (SELECT COUNT(*) FROM article_voters v WHERE v.article_id = a.id) AS voter_count
FROM articles a
JOIN users u ON u.id = a.author_id
WHERE 1 = 1"#;

/// Appends the search predicate. `EXISTS` keeps one row per article however
/// many comments match.
fn push_search(qb: &mut QueryBuilder<'_, MySql>, search: Option<&str>) {
    let Some(search) = search else {
        return;
    };
    let pattern = like_pattern(search);
    qb.push(" AND (a.title LIKE ")
        .push_bind(pattern.clone())
        .push(" OR a.content LIKE ")
        .push_bind(pattern.clone())
        .push(" OR u.username LIKE ")
        .push_bind(pattern.clone())
        .push(
            " OR EXISTS (SELECT 1 FROM article_comments c JOIN users cu ON cu.id = c.author_id \
             WHERE c.article_id = a.id AND (c.content LIKE ",
        )
        .push_bind(pattern.clone())
        .push(" OR cu.username LIKE ")
        .push_bind(pattern)
        .push(")))");
}

pub struct MySqlArticleRepo {
    pool: MySqlPool,
}

impl MySqlArticleRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlArticleRepo { pool }
    }

    fn row_to_article(row: MySqlRow) -> Result<Article, StoreError> {
        Ok(Article {
            id: row.try_get("id").map_err(store_error)?,
            title: row.try_get("title").map_err(store_error)?,
            content: row.try_get("content").map_err(store_error)?,
            img_path: row.try_get("img_path").map_err(store_error)?,
            author_id: row.try_get("author_id").map_err(store_error)?,
            author_name: row.try_get("author_name").map_err(store_error)?,
            created_at: row.try_get("created_at").map_err(store_error)?,
            voter_count: row.try_get("voter_count").map_err(store_error)?,
        })
    }

    async fn fetch_articles(&self, mut qb: QueryBuilder<'_, MySql>) -> Result<Vec<Article>, StoreError> {
        qb.build()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(Self::row_to_article)
            .collect()
    }

    async fn voter_count(&self, id: ArticleId) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM article_voters WHERE article_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }
}

#[async_trait::async_trait]
impl ArticleRepo for MySqlArticleRepo {
    async fn create(&self, article: NewArticle) -> Result<Article, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO articles (title, content, img_path, author_id)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.img_path)
        .bind(article.author_id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let id = ArticleId(result.last_insert_id() as i64);
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::Store(format!("article {id} vanished after insert")))
    }

    async fn get(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        let mut qb = QueryBuilder::new(ARTICLE_SELECT);
        qb.push(" AND a.id = ").push_bind(id);
        Ok(self.fetch_articles(qb).await?.into_iter().next())
    }

    async fn update(&self, id: ArticleId, patch: &ArticlePatch) -> Result<(), StoreError> {
        sqlx::query(
            r#"
UPDATE articles
SET title = COALESCE(?, title),
    content = COALESCE(?, content),
    img_path = COALESCE(?, img_path)
WHERE id = ?
"#,
        )
        .bind(&patch.title)
        .bind(&patch.content)
        .bind(&patch.img_path)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn delete(&self, id: ArticleId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, search: Option<&str>) -> Result<i64, StoreError> {
        let mut qb = QueryBuilder::new(
            "SELECT COUNT(*) FROM articles a JOIN users u ON u.id = a.author_id WHERE 1 = 1",
        );
        push_search(&mut qb, search);
        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn list_window(
        &self,
        offset: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<Vec<Article>, StoreError> {
        let mut qb = QueryBuilder::new(ARTICLE_SELECT);
        push_search(&mut qb, search);
        qb.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ")
            .push_bind(limit.max(0))
            .push(" OFFSET ")
            .push_bind(offset.max(0));
        self.fetch_articles(qb).await
    }

    async fn list_keyset(&self, query: KeysetQuery<'_>) -> Result<Vec<Article>, StoreError> {
        let mut qb = QueryBuilder::new(ARTICLE_SELECT);
        push_search(&mut qb, query.search);

        let order = match (query.cursor, query.direction) {
            (None, _) => " ORDER BY a.created_at DESC, a.id DESC",
            (Some(cursor), direction) => {
                let (cmp, order) = match direction {
                    KeysetDirection::Next => ("<", " ORDER BY a.created_at DESC, a.id DESC"),
                    KeysetDirection::Prev => (">", " ORDER BY a.created_at ASC, a.id ASC"),
                };
                qb.push(format!(" AND (a.created_at {cmp} "))
                    .push_bind(cursor.created_at)
                    .push(" OR (a.created_at = ")
                    .push_bind(cursor.created_at)
                    .push(format!(" AND a.id {cmp} "))
                    .push_bind(cursor.id)
                    .push("))");
                order
            }
        };
        qb.push(order).push(" LIMIT ").push_bind(query.limit.max(0));
        self.fetch_articles(qb).await
    }

    async fn toggle_vote(
        &self,
        id: ArticleId,
        user_id: UserId,
    ) -> Result<VoteOutcome, StoreError> {
        let result = ARTICLE_VOTERS.toggle(&self.pool, user_id.0, id.0).await?;

        Ok(VoteOutcome {
            result,
            voter_count: self.voter_count(id).await?,
        })
    }
}
