use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Window over-fetched per page when a search may yield duplicate rows.
const SEARCH_FETCH_FACTOR: i64 = 3;

#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// First page number whose "next" link switches to keyset paging.
    pub deep_page_threshold: u32,
    pub default_size: u16,
    pub max_size: u16,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            deep_page_threshold: 100,
            default_size: 10,
            max_size: 100,
        }
    }
}

/// Blank queries mean "no filter".
fn normalize_query(query: Option<&str>) -> Option<&str> {
    query.map(str::trim).filter(|q| !q.is_empty())
}

fn page_count(total: i64, size: PageSize) -> u32 {
    let pages = (total.max(0) + size.get() - 1) / size.get();
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

fn page_window(page: u32, total_pages: u32) -> Vec<u32> {
    let page = page.clamp(1, total_pages);
    (page.saturating_sub(2).max(1)..=page.saturating_add(2).min(total_pages)).collect()
}

pub struct RealArticleService {
    article_repo: Arc<dyn ArticleRepo>,
    comment_repo: Arc<dyn CommentRepo>,
    media_service: Arc<dyn MediaService>,
    config: PaginationConfig,
}

impl RealArticleService {
    pub fn new(
        article_repo: Arc<dyn ArticleRepo>,
        comment_repo: Arc<dyn CommentRepo>,
        media_service: Arc<dyn MediaService>,
        config: PaginationConfig,
    ) -> Self {
        Self {
            article_repo,
            comment_repo,
            media_service,
            config,
        }
    }

    async fn load(&self, id: ArticleId) -> Result<Article, ContentError> {
        self.article_repo
            .get(id)
            .await?
            .ok_or(ContentError::NotFound)
    }

    async fn load_owned(&self, actor: &User, id: ArticleId) -> Result<Article, ContentError> {
        let article = self.load(id).await?;
        if article.author_id != actor.id {
            return Err(ContentError::Forbidden);
        }
        Ok(article)
    }

    /// Offset window without the count query.
    async fn offset_window(
        &self,
        page: PageNumber,
        size: PageSize,
        query: Option<&str>,
    ) -> Result<Vec<Article>, ContentError> {
        let start = (page.get() - 1) * size.get();
        let Some(query) = query else {
            return Ok(self
                .article_repo
                .list_window(start, size.get(), None)
                .await?);
        };

        // A search join can repeat an article once per matching comment, so
        // fetch a wider window that starts a page early and dedupe it.
        let fetch_offset = (start - size.get()).max(0);
        let rows = self
            .article_repo
            .list_window(fetch_offset, size.get() * SEARCH_FETCH_FACTOR, Some(query))
            .await?;
        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|a| seen.insert(a.id))
            .skip((start - fetch_offset) as usize)
            .take(size.get() as usize)
            .collect())
    }

    fn offset_listing(
        &self,
        items: Vec<Article>,
        page: u32,
        size: PageSize,
        total_count: i64,
        total_pages: u32,
        query: Option<&str>,
    ) -> ArticleListing {
        let threshold = self.config.deep_page_threshold;
        let has_prev = page > 1;
        let has_next = page < total_pages;

        let prev = has_prev.then(|| PageLink::offset(page - 1, size, query));
        let next = if !has_next {
            None
        } else if page >= threshold {
            items.last().map(|last| {
                PageLink::cursor(
                    Cursor::of(last),
                    KeysetDirection::Next,
                    total_pages.min(page + 1),
                    size,
                    query,
                )
            })
        } else {
            Some(PageLink::offset(page + 1, size, query))
        };

        ArticleListing {
            mode: BrowseMode::Offset,
            items,
            size: size.0,
            total_count,
            total_pages,
            page,
            has_prev,
            has_next,
            prev,
            next,
            page_range: page_window(page, total_pages),
            deep_page_threshold: threshold,
            query: query.map(str::to_string),
        }
    }

    fn cursor_listing(
        &self,
        keyset: KeysetPage,
        approx_page: u32,
        size: PageSize,
        total_count: i64,
        total_pages: u32,
        query: Option<&str>,
    ) -> ArticleListing {
        let threshold = self.config.deep_page_threshold;

        let prev = if keyset.has_prev {
            let prev_approx = approx_page.saturating_sub(1).max(1);
            if prev_approx < threshold {
                Some(PageLink::offset(threshold.saturating_sub(1).max(1), size, query))
            } else {
                keyset.prev_cursor.map(|c| {
                    PageLink::cursor(c, KeysetDirection::Prev, prev_approx, size, query)
                })
            }
        } else {
            None
        };
        let next = if keyset.has_next {
            let next_approx = total_pages.min(approx_page.saturating_add(1));
            keyset
                .next_cursor
                .map(|c| PageLink::cursor(c, KeysetDirection::Next, next_approx, size, query))
        } else {
            None
        };

        ArticleListing {
            mode: BrowseMode::Cursor,
            items: keyset.items,
            size: size.0,
            total_count,
            total_pages,
            page: approx_page,
            has_prev: keyset.has_prev,
            has_next: keyset.has_next,
            prev,
            next,
            page_range: page_window(approx_page, total_pages),
            deep_page_threshold: threshold,
            query: query.map(str::to_string),
        }
    }
}

#[async_trait::async_trait]
impl ArticleService for RealArticleService {
    async fn count(&self, query: Option<&str>) -> Result<i64, ContentError> {
        Ok(self.article_repo.count(normalize_query(query)).await?)
    }

    async fn list_offset(
        &self,
        page: PageNumber,
        size: PageSize,
        query: Option<&str>,
    ) -> Result<(Vec<Article>, i64), ContentError> {
        let query = normalize_query(query);
        let total = self.article_repo.count(query).await?;
        let items = self.offset_window(page, size, query).await?;
        Ok((items, total))
    }

    async fn list_keyset(
        &self,
        size: PageSize,
        cursor: Option<Cursor>,
        direction: KeysetDirection,
        query: Option<&str>,
    ) -> Result<KeysetPage, ContentError> {
        // Without a cursor there is nothing to go back from.
        let direction = if cursor.is_some() {
            direction
        } else {
            KeysetDirection::Next
        };
        let mut rows = self
            .article_repo
            .list_keyset(KeysetQuery {
                cursor,
                direction,
                limit: size.get() + 1,
                search: normalize_query(query),
            })
            .await?;

        let has_more = rows.len() as i64 > size.get();
        rows.truncate(size.get() as usize);
        if direction == KeysetDirection::Prev {
            rows.reverse();
        }

        let (has_prev, has_next) = match direction {
            KeysetDirection::Next => (cursor.is_some(), has_more),
            KeysetDirection::Prev => (has_more, true),
        };
        Ok(KeysetPage {
            next_cursor: rows.last().map(Cursor::of).or(cursor),
            prev_cursor: rows.first().map(Cursor::of).or(cursor),
            items: rows,
            has_next,
            has_prev,
        })
    }

    async fn browse(&self, request: BrowseRequest) -> Result<ArticleListing, ContentError> {
        let size = PageSize::clamped(request.size, self.config.default_size, self.config.max_size);
        let query = normalize_query(request.query.as_deref());
        let total_count = self.article_repo.count(query).await?;
        let total_pages = page_count(total_count, size);
        let requested_page = request.page.unwrap_or(1).max(1);

        let using_cursor = match request.mode {
            BrowseMode::Cursor => true,
            BrowseMode::Offset => false,
            BrowseMode::Auto => request.cursor.is_some(),
        };

        if using_cursor {
            // without a cursor the keyset starts at the newest article
            let approx_page = match (request.cursor, request.approx_page) {
                (None, _) => 1,
                (Some(_), Some(page)) => page,
                (Some(_), None) => requested_page
                    .min(total_pages)
                    .max(self.config.deep_page_threshold),
            };
            let keyset = self
                .list_keyset(size, request.cursor, request.direction, query)
                .await?;
            debug!(approx_page, total_count, "cursor listing");
            return Ok(self.cursor_listing(
                keyset,
                approx_page,
                size,
                total_count,
                total_pages,
                query,
            ));
        }

        let page = requested_page.min(total_pages);
        let items = if total_count == 0 {
            Vec::new()
        } else {
            self.offset_window(PageNumber(page), size, query).await?
        };
        debug!(page, total_count, "offset listing");
        Ok(self.offset_listing(items, page, size, total_count, total_pages, query))
    }

    async fn create(&self, actor: &User, input: ArticleInput) -> Result<Article, ContentError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ContentError::InvalidInput("title is required".into()));
        }
        if input.content.trim().is_empty() {
            return Err(ContentError::InvalidInput("content is required".into()));
        }

        let article = self
            .article_repo
            .create(NewArticle {
                title: title.to_string(),
                content: input.content,
                img_path: input.img_path,
                author_id: actor.id,
            })
            .await?;

        let owner = MediaOwner::Article(article.id);
        self.media_service.adopt_drafts(actor.id, owner).await?;
        self.media_service
            .cleanup_unused(owner, &article.content)
            .await?;

        info!(article_id = %article.id, author_id = %actor.id, "article created");
        Ok(article)
    }

    async fn get(&self, id: ArticleId) -> Result<Article, ContentError> {
        self.load(id).await
    }

    async fn update(
        &self,
        actor: &User,
        id: ArticleId,
        mut patch: ArticlePatch,
    ) -> Result<Article, ContentError> {
        let before = self.load_owned(actor, id).await?;
        if let Some(title) = patch.title.take() {
            let title = title.trim();
            if title.is_empty() {
                return Err(ContentError::InvalidInput("title must not be empty".into()));
            }
            patch.title = Some(title.to_string());
        }
        if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ContentError::InvalidInput("content must not be empty".into()));
        }

        self.article_repo.update(id, &patch).await?;

        if let Some(content) = &patch.content {
            let owner = MediaOwner::Article(id);
            self.media_service.adopt_drafts(actor.id, owner).await?;
            self.media_service
                .purge_replaced(owner, &before.content, content)
                .await?;
            self.media_service.cleanup_unused(owner, content).await?;
        }

        info!(article_id = %id, "article updated");
        self.load(id).await
    }

    async fn delete(&self, actor: &User, id: ArticleId) -> Result<(), ContentError> {
        let article = self.load_owned(actor, id).await?;

        for comment in self.comment_repo.list_for_article(id).await? {
            self.media_service
                .purge_owner(
                    MediaOwner::Comment(comment.id),
                    &comment.content,
                    comment.author_id,
                )
                .await?;
        }
        self.media_service
            .purge_owner(MediaOwner::Article(id), &article.content, article.author_id)
            .await?;

        if !self.article_repo.delete(id).await? {
            return Err(ContentError::NotFound);
        }
        info!(article_id = %id, "article deleted");
        Ok(())
    }

    async fn vote(&self, actor: &User, id: ArticleId) -> Result<VoteOutcome, ContentError> {
        let article = self.load(id).await?;
        if article.author_id == actor.id {
            return Err(ContentError::Forbidden);
        }
        Ok(self.article_repo.toggle_vote(id, actor.id).await?)
    }
}
