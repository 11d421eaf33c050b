use super::cookie::{SessionCookie, add_cookies, cleared_session};
use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use crate::server::CookiePolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// The signed-in user behind a request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub renewed_access: Option<RenewedAccess>,
    pub credentials: RequestCredentials,
}

impl Caller {
    /// Cookie for an access token re-minted while resolving the caller.
    fn renewal_cookie<'a>(&'a self, policy: &'a CookiePolicy) -> Option<SessionCookie<'a>> {
        self.renewed_access
            .as_ref()
            .map(|renewed| SessionCookie::access(policy, &renewed.token.0))
    }
}

fn respond<'a, T: Serialize>(
    status: StatusCode,
    data: T,
    cookies: impl IntoIterator<Item = SessionCookie<'a>>,
) -> Response {
    let json = warp::reply::json(&ApiResponse::ok(data));
    let mut response = warp::reply::with_status(json, status).into_response();
    add_cookies(&mut response, cookies);
    response
}

fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, data, None::<SessionCookie>)
}

fn ok_for<T: Serialize>(caller: &Caller, policy: &CookiePolicy, data: T) -> Response {
    respond(StatusCode::OK, data, caller.renewal_cookie(policy))
}

fn created_for<T: Serialize>(caller: &Caller, policy: &CookiePolicy, data: T) -> Response {
    respond(StatusCode::CREATED, data, caller.renewal_cookie(policy))
}

fn rejection<E: Into<ApiFailure>>(error: E) -> warp::Rejection {
    reject::custom(error.into())
}

// region auth

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub auth_tokens: AuthTokens,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let login_result = auth_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(rejection)?;

    let login_response = LoginResponse {
        user: login_result.user,
        auth_tokens: login_result.tokens,
    };
    let tokens = &login_response.auth_tokens;
    let cookies = [
        SessionCookie::access(&policy, &tokens.access_token.0),
        SessionCookie::refresh(&policy, &tokens.refresh_token.0),
    ];
    Ok(respond(StatusCode::OK, &login_response, cookies))
}

pub async fn logout(
    credentials: RequestCredentials,
    auth_service: Arc<dyn AuthService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    auth_service.logout(&credentials).await.map_err(rejection)?;
    Ok(respond(StatusCode::OK, (), cleared_session(&policy)))
}

pub async fn me(caller: Caller, policy: Arc<CookiePolicy>) -> Result<Response, warp::Rejection> {
    Ok(ok_for(&caller, &policy, &caller.user))
}

// endregion

// region accounts

#[derive(Debug, Deserialize)]
pub struct AuthcodeRequest {
    pub purpose: VerificationPurpose,
    pub email: String,
}

pub async fn request_authcode(
    body: AuthcodeRequest,
    caller: Option<Caller>,
    verification_service: Arc<dyn VerificationService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    verification_service
        .request_code(body.purpose, &body.email, caller.as_ref().map(|c| &c.user))
        .await
        .map_err(rejection)?;
    let renewal = caller.as_ref().and_then(|c| c.renewal_cookie(&policy));
    Ok(respond(StatusCode::OK, (), renewal))
}

pub async fn verify_authcode(
    body: VerifyInput,
    caller: Option<Caller>,
    verification_service: Arc<dyn VerificationService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let outcome = verification_service
        .verify_code(body, caller.as_ref().map(|c| &c.user))
        .await
        .map_err(rejection)?;
    let renewal = caller.as_ref().and_then(|c| c.renewal_cookie(&policy));
    Ok(respond(StatusCode::OK, outcome, renewal))
}

pub async fn register(
    body: RegisterInput,
    account_service: Arc<dyn AccountService>,
) -> Result<Response, warp::Rejection> {
    let user = account_service.register(body).await.map_err(rejection)?;
    info!(user_id = %user.id, "registered");
    Ok(respond(StatusCode::CREATED, user, None::<SessionCookie>))
}

pub async fn reset_lost_password(
    body: ResetPasswordInput,
    account_service: Arc<dyn AccountService>,
) -> Result<Response, warp::Rejection> {
    let user = account_service
        .reset_lost_password(body)
        .await
        .map_err(rejection)?;
    Ok(ok(user))
}

pub async fn change_password(
    user_id: UserId,
    body: ChangePasswordInput,
    caller: Caller,
    account_service: Arc<dyn AccountService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    account_service
        .change_password(&caller.user, user_id, body)
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, ()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

pub async fn update_username(
    user_id: UserId,
    body: UpdateUsernameRequest,
    caller: Caller,
    account_service: Arc<dyn AccountService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let user = account_service
        .update_username(&caller.user, user_id, &body.username)
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, user))
}

pub async fn delete_account(
    user_id: UserId,
    caller: Caller,
    account_service: Arc<dyn AccountService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    account_service
        .delete_account(&caller.user, user_id, &caller.credentials)
        .await
        .map_err(rejection)?;
    info!(%user_id, "account deleted");
    Ok(respond(StatusCode::OK, (), cleared_session(&policy)))
}

// endregion

// region articles

pub async fn browse_articles(
    query: BrowseRequest,
    article_service: Arc<dyn ArticleService>,
) -> Result<Response, warp::Rejection> {
    let listing = article_service.browse(query).await.map_err(rejection)?;
    Ok(ok(listing))
}

pub async fn create_article(
    body: ArticleInput,
    caller: Caller,
    article_service: Arc<dyn ArticleService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let article = article_service
        .create(&caller.user, body)
        .await
        .map_err(rejection)?;
    Ok(created_for(&caller, &policy, article))
}

pub async fn get_article(
    id: i64,
    article_service: Arc<dyn ArticleService>,
) -> Result<Response, warp::Rejection> {
    let article = article_service
        .get(ArticleId(id))
        .await
        .map_err(rejection)?;
    Ok(ok(article))
}

pub async fn update_article(
    id: i64,
    body: ArticlePatch,
    caller: Caller,
    article_service: Arc<dyn ArticleService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let article = article_service
        .update(&caller.user, ArticleId(id), body)
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, article))
}

pub async fn delete_article(
    id: i64,
    caller: Caller,
    article_service: Arc<dyn ArticleService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    article_service
        .delete(&caller.user, ArticleId(id))
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, ()))
}

pub async fn vote_article(
    id: i64,
    caller: Caller,
    article_service: Arc<dyn ArticleService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let outcome = article_service
        .vote(&caller.user, ArticleId(id))
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, outcome))
}

// endregion

// region comments

pub async fn list_comments(
    article_id: i64,
    caller: Option<Caller>,
    comment_service: Arc<dyn CommentService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let comments = comment_service
        .list_for_article(ArticleId(article_id), caller.as_ref().map(|c| &c.user))
        .await
        .map_err(rejection)?;
    let renewal = caller.as_ref().and_then(|c| c.renewal_cookie(&policy));
    Ok(respond(StatusCode::OK, comments, renewal))
}

pub async fn create_comment(
    article_id: i64,
    body: CommentInput,
    caller: Caller,
    comment_service: Arc<dyn CommentService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let comment = comment_service
        .create(&caller.user, ArticleId(article_id), body)
        .await
        .map_err(rejection)?;
    Ok(created_for(&caller, &policy, comment))
}

pub async fn update_comment(
    id: i64,
    body: CommentPatch,
    caller: Caller,
    comment_service: Arc<dyn CommentService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let comment = comment_service
        .update(&caller.user, CommentId(id), body)
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, comment))
}

pub async fn delete_comment(
    id: i64,
    caller: Caller,
    comment_service: Arc<dyn CommentService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    comment_service
        .delete(&caller.user, CommentId(id))
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, ()))
}

pub async fn vote_comment(
    id: i64,
    caller: Caller,
    comment_service: Arc<dyn CommentService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let outcome = comment_service
        .vote(&caller.user, CommentId(id))
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, outcome))
}

// endregion

// region media

#[derive(Debug, Deserialize)]
pub struct MediaMarkRequest {
    pub owner: MediaOwner,
    pub srcs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MediaMarkResponse {
    pub changed: usize,
}

pub async fn mark_media(
    kind: MediaKind,
    body: MediaMarkRequest,
    caller: Caller,
    media_service: Arc<dyn MediaService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let changed = media_service
        .mark(&caller.user, kind, body.owner, &body.srcs)
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, MediaMarkResponse { changed }))
}

pub async fn unmark_media(
    kind: MediaKind,
    body: MediaMarkRequest,
    caller: Caller,
    media_service: Arc<dyn MediaService>,
    policy: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let changed = media_service
        .unmark(&caller.user, kind, body.owner, &body.srcs)
        .await
        .map_err(rejection)?;
    Ok(ok_for(&caller, &policy, MediaMarkResponse { changed }))
}

// endregion
