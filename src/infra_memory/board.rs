use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct BoardState {
    next_user: i64,
    next_article: i64,
    next_comment: i64,
    users: BTreeMap<UserId, User>,
    articles: BTreeMap<ArticleId, Article>,
    comments: BTreeMap<CommentId, Comment>,
    article_votes: HashSet<(UserId, ArticleId)>,
    comment_votes: HashSet<(UserId, CommentId)>,
}

impl BoardState {
    fn author_name(&self, id: UserId) -> String {
        self.users
            .get(&id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn matches(&self, article: &Article, needle: &str) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(needle);
        hit(&article.title)
            || hit(&article.content)
            || hit(&self.author_name(article.author_id))
            || self.comments.values().any(|c| {
                c.article_id == article.id
                    && (hit(&c.content) || hit(&self.author_name(c.author_id)))
            })
    }

    /// Matching articles, newest first, with live author names and vote counts.
    fn search(&self, search: Option<&str>) -> Vec<Article> {
        let needle = search.map(str::to_lowercase);
        let mut found: Vec<Article> = self
            .articles
            .values()
            .filter(|a| needle.as_deref().is_none_or(|n| self.matches(a, n)))
            .map(|a| self.hydrate_article(a))
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        found
    }

    fn hydrate_article(&self, article: &Article) -> Article {
        let mut article = article.clone();
        article.author_name = self.author_name(article.author_id);
        article.voter_count = self
            .article_votes
            .iter()
            .filter(|(_, a)| *a == article.id)
            .count() as i64;
        article
    }

    fn hydrate_comment(&self, comment: &Comment) -> Comment {
        let mut comment = comment.clone();
        comment.author_name = self.author_name(comment.author_id);
        comment.voter_count = self
            .comment_votes
            .iter()
            .filter(|(_, c)| *c == comment.id)
            .count() as i64;
        comment
    }

    fn drop_comments_where(&mut self, pred: impl Fn(&Comment) -> bool) {
        let doomed: Vec<CommentId> = self
            .comments
            .values()
            .filter(|c| pred(c))
            .map(|c| c.id)
            .collect();
        for id in &doomed {
            self.comments.remove(id);
        }
        self.comment_votes.retain(|(_, c)| !doomed.contains(c));
    }

    fn drop_article(&mut self, id: ArticleId) -> bool {
        let existed = self.articles.remove(&id).is_some();
        self.article_votes.retain(|(_, a)| *a != id);
        self.drop_comments_where(|c| c.article_id == id);
        existed
    }
}

/// Users, articles, comments and votes held in process memory.
#[derive(Default)]
pub struct MemoryBoard {
    state: RwLock<BoardState>,
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BoardState>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Store(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BoardState>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Store(e.to_string()))
    }

    /// Inserts an article with an explicit creation time.
    pub fn insert_article_at(
        &self,
        article: NewArticle,
        created_at: DateTime<Utc>,
    ) -> Result<Article, StoreError> {
        let mut state = self.write()?;
        if !state.users.contains_key(&article.author_id) {
            return Err(StoreError::Store(format!(
                "unknown author {}",
                article.author_id
            )));
        }
        state.next_article += 1;
        let id = ArticleId(state.next_article);
        let stored = Article {
            id,
            title: article.title,
            content: article.content,
            img_path: article.img_path,
            author_id: article.author_id,
            author_name: String::new(),
            created_at,
            voter_count: 0,
        };
        state.articles.insert(id, stored.clone());
        Ok(state.hydrate_article(&stored))
    }

    /// Inserts a comment with an explicit creation time.
    pub fn insert_comment_at(
        &self,
        comment: NewComment,
        created_at: DateTime<Utc>,
    ) -> Result<Comment, StoreError> {
        let mut state = self.write()?;
        if !state.articles.contains_key(&comment.article_id) {
            return Err(StoreError::Store(format!(
                "unknown article {}",
                comment.article_id
            )));
        }
        state.next_comment += 1;
        let id = CommentId(state.next_comment);
        let stored = Comment {
            id,
            article_id: comment.article_id,
            author_id: comment.author_id,
            author_name: String::new(),
            content: comment.content,
            is_secret: comment.is_secret,
            paired_comment_id: comment.paired_comment_id,
            created_at,
            voter_count: 0,
        };
        state.comments.insert(id, stored.clone());
        Ok(state.hydrate_comment(&stored))
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryBoard {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.write()?;
        if state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Duplicate(format!(
                "user {} / {}",
                user.username, user.email
            )));
        }
        state.next_user += 1;
        let id = UserId(state.next_user);
        let stored = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            img_path: user.img_path,
            is_admin: false,
            created_at: Utc::now(),
        };
        state.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_password(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.write()?.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn update_email(&self, user_id: UserId, email: &str) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state
            .users
            .values()
            .any(|u| u.id != user_id && u.email == email)
        {
            return Err(StoreError::Duplicate(format!("email {email}")));
        }
        if let Some(user) = state.users.get_mut(&user_id) {
            user.email = email.to_string();
        }
        Ok(())
    }

    async fn update_username(&self, user_id: UserId, username: &str) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state
            .users
            .values()
            .any(|u| u.id != user_id && u.username == username)
        {
            return Err(StoreError::Duplicate(format!("username {username}")));
        }
        if let Some(user) = state.users.get_mut(&user_id) {
            user.username = username.to_string();
        }
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let existed = state.users.remove(&user_id).is_some();
        let owned: Vec<ArticleId> = state
            .articles
            .values()
            .filter(|a| a.author_id == user_id)
            .map(|a| a.id)
            .collect();
        for id in owned {
            state.drop_article(id);
        }
        state.drop_comments_where(|c| c.author_id == user_id);
        state.article_votes.retain(|(u, _)| *u != user_id);
        state.comment_votes.retain(|(u, _)| *u != user_id);
        Ok(existed)
    }
}

#[async_trait::async_trait]
impl ArticleRepo for MemoryBoard {
    async fn create(&self, article: NewArticle) -> Result<Article, StoreError> {
        self.insert_article_at(article, Utc::now())
    }

    async fn get(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        let state = self.read()?;
        Ok(state.articles.get(&id).map(|a| state.hydrate_article(a)))
    }

    async fn update(&self, id: ArticleId, patch: &ArticlePatch) -> Result<(), StoreError> {
        if let Some(article) = self.write()?.articles.get_mut(&id) {
            if let Some(title) = &patch.title {
                article.title = title.clone();
            }
            if let Some(content) = &patch.content {
                article.content = content.clone();
            }
            if let Some(img_path) = &patch.img_path {
                article.img_path = Some(img_path.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, id: ArticleId) -> Result<bool, StoreError> {
        Ok(self.write()?.drop_article(id))
    }

    async fn count(&self, search: Option<&str>) -> Result<i64, StoreError> {
        Ok(self.read()?.search(search).len() as i64)
    }

    async fn list_window(
        &self,
        offset: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<Vec<Article>, StoreError> {
        let found = self.read()?.search(search);
        Ok(found
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_keyset(&self, query: KeysetQuery<'_>) -> Result<Vec<Article>, StoreError> {
        let found = self.read()?.search(query.search);
        let limit = query.limit.max(0) as usize;
        let rows = match (query.cursor, query.direction) {
            (None, _) => found.into_iter().take(limit).collect(),
            (Some(cursor), KeysetDirection::Next) => found
                .into_iter()
                .filter(|a| cursor.precedes(a))
                .take(limit)
                .collect(),
            (Some(cursor), KeysetDirection::Prev) => found
                .into_iter()
                .rev()
                .filter(|a| cursor.follows(a))
                .take(limit)
                .collect(),
        };
        Ok(rows)
    }

    async fn toggle_vote(
        &self,
        id: ArticleId,
        user_id: UserId,
    ) -> Result<VoteOutcome, StoreError> {
        let mut state = self.write()?;
        let result = if state.article_votes.remove(&(user_id, id)) {
            VoteAction::Delete
        } else {
            state.article_votes.insert((user_id, id));
            VoteAction::Insert
        };
        let voter_count = state.article_votes.iter().filter(|(_, a)| *a == id).count() as i64;
        Ok(VoteOutcome {
            result,
            voter_count,
        })
    }
}

#[async_trait::async_trait]
impl CommentRepo for MemoryBoard {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError> {
        self.insert_comment_at(comment, Utc::now())
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let state = self.read()?;
        Ok(state.comments.get(&id).map(|c| state.hydrate_comment(c)))
    }

    async fn update(
        &self,
        id: CommentId,
        content: &str,
        is_secret: bool,
    ) -> Result<(), StoreError> {
        if let Some(comment) = self.write()?.comments.get_mut(&id) {
            comment.content = content.to_string();
            comment.is_secret = is_secret;
        }
        Ok(())
    }

    async fn delete(&self, id: CommentId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let existed = state.comments.contains_key(&id);
        state.drop_comments_where(|c| c.id == id);
        Ok(existed)
    }

    async fn count_replies(&self, id: CommentId) -> Result<i64, StoreError> {
        Ok(self
            .read()?
            .comments
            .values()
            .filter(|c| c.paired_comment_id == Some(id))
            .count() as i64)
    }

    async fn list_for_article(&self, article_id: ArticleId) -> Result<Vec<Comment>, StoreError> {
        let state = self.read()?;
        let mut found: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.article_id == article_id)
            .map(|c| state.hydrate_comment(c))
            .collect();
        found.sort_by_key(|c| (c.created_at, c.id));
        Ok(found)
    }

    async fn toggle_vote(
        &self,
        id: CommentId,
        user_id: UserId,
    ) -> Result<VoteOutcome, StoreError> {
        let mut state = self.write()?;
        let result = if state.comment_votes.remove(&(user_id, id)) {
            VoteAction::Delete
        } else {
            state.comment_votes.insert((user_id, id));
            VoteAction::Insert
        };
        let voter_count = state.comment_votes.iter().filter(|(_, c)| *c == id).count() as i64;
        Ok(VoteOutcome {
            result,
            voter_count,
        })
    }
}

#[async_trait::async_trait]
impl ContentIndex for MemoryBoard {
    async fn is_referenced_elsewhere(
        &self,
        src: &str,
        owner: MediaOwner,
    ) -> Result<bool, StoreError> {
        let state = self.read()?;
        let in_articles = state
            .articles
            .values()
            .filter(|a| owner != MediaOwner::Article(a.id))
            .any(|a| a.content.contains(src));
        let in_comments = state
            .comments
            .values()
            .filter(|c| owner != MediaOwner::Comment(c.id))
            .any(|c| c.content.contains(src));
        let as_thumbnail = state
            .articles
            .values()
            .any(|a| a.img_path.as_deref() == Some(src));
        let as_avatar = state
            .users
            .values()
            .any(|u| u.img_path.as_deref() == Some(src));
        Ok(in_articles || in_comments || as_thumbnail || as_avatar)
    }
}
