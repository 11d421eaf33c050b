use crate::application_port::MediaError;
use crate::domain_model::*;
use crate::domain_port::StoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("not found")]
    NotFound,
    #[error("not allowed")]
    Forbidden,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub img_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeysetPage {
    pub items: Vec<Article>,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_cursor: Option<Cursor>,
    pub prev_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowseMode {
    #[default]
    Auto,
    Offset,
    Cursor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseRequest {
    pub page: Option<u32>,
    pub size: Option<u16>,
    #[serde(default)]
    pub mode: BrowseMode,
    pub cursor: Option<Cursor>,
    #[serde(default, rename = "dir")]
    pub direction: KeysetDirection,
    pub approx_page: Option<u32>,
    pub query: Option<String>,
}

/// Where a prev/next control leads; the client replays these fields as
/// query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub mode: BrowseMode,
    pub size: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    #[serde(rename = "dir", skip_serializing_if = "Option::is_none")]
    pub direction: Option<KeysetDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approx_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl PageLink {
    pub fn offset(page: u32, size: PageSize, query: Option<&str>) -> Self {
        PageLink {
            mode: BrowseMode::Offset,
            size: size.0,
            page: Some(page),
            cursor: None,
            direction: None,
            approx_page: None,
            query: query.map(str::to_string),
        }
    }

    pub fn cursor(
        cursor: Cursor,
        direction: KeysetDirection,
        approx_page: u32,
        size: PageSize,
        query: Option<&str>,
    ) -> Self {
        PageLink {
            mode: BrowseMode::Cursor,
            size: size.0,
            page: None,
            cursor: Some(cursor),
            direction: Some(direction),
            approx_page: Some(approx_page),
            query: query.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleListing {
    /// `Offset` or `Cursor`, never `Auto`.
    pub mode: BrowseMode,
    pub items: Vec<Article>,
    pub size: u16,
    pub total_count: i64,
    pub total_pages: u32,
    /// Exact in offset mode, approximate in cursor mode.
    pub page: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev: Option<PageLink>,
    pub next: Option<PageLink>,
    pub page_range: Vec<u32>,
    pub deep_page_threshold: u32,
    pub query: Option<String>,
}

#[async_trait::async_trait]
pub trait ArticleService: Send + Sync {
    async fn count(&self, query: Option<&str>) -> Result<i64, ContentError>;

    /// Returns the page items and the total match count.
    async fn list_offset(
        &self,
        page: PageNumber,
        size: PageSize,
        query: Option<&str>,
    ) -> Result<(Vec<Article>, i64), ContentError>;

    async fn list_keyset(
        &self,
        size: PageSize,
        cursor: Option<Cursor>,
        direction: KeysetDirection,
        query: Option<&str>,
    ) -> Result<KeysetPage, ContentError>;

    /// Picks offset or keyset paging for the request and builds navigation.
    async fn browse(&self, request: BrowseRequest) -> Result<ArticleListing, ContentError>;

    async fn create(&self, actor: &User, input: ArticleInput) -> Result<Article, ContentError>;

    async fn get(&self, id: ArticleId) -> Result<Article, ContentError>;

    async fn update(
        &self,
        actor: &User,
        id: ArticleId,
        patch: ArticlePatch,
    ) -> Result<Article, ContentError>;

    async fn delete(&self, actor: &User, id: ArticleId) -> Result<(), ContentError>;

    async fn vote(&self, actor: &User, id: ArticleId) -> Result<VoteOutcome, ContentError>;
}
