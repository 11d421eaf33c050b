use super::error::*;
use super::cookie::get_session_cookies;
use super::handler::{self, Caller};
use crate::application_port::*;
use crate::domain_model::{MediaKind, UserId};
use crate::server::*;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let policy = Arc::new(server.cookie_policy.clone());
    let auth = server.auth_service.clone();

    let login = warp::post()
        .and(warp::path!("auth" / "login"))
        .and(json_body())
        .and(with(auth.clone()))
        .and(with(policy.clone()))
        .and_then(handler::login);

    let logout = warp::post()
        .and(warp::path!("auth" / "logout"))
        .and(with_credentials(policy.clone()))
        .and(with(auth.clone()))
        .and(with(policy.clone()))
        .and_then(handler::logout);

    let me = warp::get()
        .and(warp::path!("auth" / "me"))
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(policy.clone()))
        .and_then(handler::me);

    let request_authcode = warp::post()
        .and(warp::path!("accounts" / "authcode" / "request"))
        .and(json_body())
        .and(with_optional_auth(auth.clone(), policy.clone()))
        .and(with(server.verification_service.clone()))
        .and(with(policy.clone()))
        .and_then(handler::request_authcode);

    let verify_authcode = warp::post()
        .and(warp::path!("accounts" / "authcode" / "verify"))
        .and(json_body())
        .and(with_optional_auth(auth.clone(), policy.clone()))
        .and(with(server.verification_service.clone()))
        .and(with(policy.clone()))
        .and_then(handler::verify_authcode);

    let register = warp::post()
        .and(warp::path!("accounts" / "register"))
        .and(json_body())
        .and(with(server.account_service.clone()))
        .and_then(handler::register);

    let reset_lost_password = warp::patch()
        .and(warp::path!("accounts" / "password" / "lost"))
        .and(json_body())
        .and(with(server.account_service.clone()))
        .and_then(handler::reset_lost_password);

    let change_password = warp::patch()
        .and(warp::path!("accounts" / UserId / "password"))
        .and(json_body())
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(server.account_service.clone()))
        .and(with(policy.clone()))
        .and_then(handler::change_password);

    let update_username = warp::patch()
        .and(warp::path!("accounts" / UserId))
        .and(json_body())
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(server.account_service.clone()))
        .and(with(policy.clone()))
        .and_then(handler::update_username);

    let delete_account = warp::delete()
        .and(warp::path!("accounts" / UserId))
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(server.account_service.clone()))
        .and(with(policy.clone()))
        .and_then(handler::delete_account);

    let auth_routes = login.or(logout).or(me);
    let account_routes = request_authcode
        .or(verify_authcode)
        .or(register)
        .or(reset_lost_password)
        .or(change_password)
        .or(update_username)
        .or(delete_account);

    let articles = server.article_service.clone();

    let browse_articles = warp::get()
        .and(warp::path!("articles"))
        .and(warp::query::<BrowseRequest>())
        .and(with(articles.clone()))
        .and_then(handler::browse_articles);

    let create_article = warp::post()
        .and(warp::path!("articles"))
        .and(json_body())
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(articles.clone()))
        .and(with(policy.clone()))
        .and_then(handler::create_article);

    let get_article = warp::get()
        .and(warp::path!("articles" / i64))
        .and(with(articles.clone()))
        .and_then(handler::get_article);

    let update_article = warp::patch()
        .and(warp::path!("articles" / i64))
        .and(json_body())
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(articles.clone()))
        .and(with(policy.clone()))
        .and_then(handler::update_article);

    let delete_article = warp::delete()
        .and(warp::path!("articles" / i64))
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(articles.clone()))
        .and(with(policy.clone()))
        .and_then(handler::delete_article);

    let vote_article = warp::post()
        .and(warp::path!("articles" / i64 / "vote"))
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(articles.clone()))
        .and(with(policy.clone()))
        .and_then(handler::vote_article);

    let article_routes = browse_articles
        .or(create_article)
        .or(get_article)
        .or(update_article)
        .or(delete_article)
        .or(vote_article);

    let comments = server.comment_service.clone();

    let list_comments = warp::get()
        .and(warp::path!("articles" / i64 / "comments"))
        .and(with_optional_auth(auth.clone(), policy.clone()))
        .and(with(comments.clone()))
        .and(with(policy.clone()))
        .and_then(handler::list_comments);

    let create_comment = warp::post()
        .and(warp::path!("articles" / i64 / "comments"))
        .and(json_body())
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(comments.clone()))
        .and(with(policy.clone()))
        .and_then(handler::create_comment);

    let update_comment = warp::patch()
        .and(warp::path!("comments" / i64))
        .and(json_body())
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(comments.clone()))
        .and(with(policy.clone()))
        .and_then(handler::update_comment);

    let delete_comment = warp::delete()
        .and(warp::path!("comments" / i64))
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(comments.clone()))
        .and(with(policy.clone()))
        .and_then(handler::delete_comment);

    let vote_comment = warp::post()
        .and(warp::path!("comments" / i64 / "vote"))
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(comments.clone()))
        .and(with(policy.clone()))
        .and_then(handler::vote_comment);

    let comment_routes = list_comments
        .or(create_comment)
        .or(update_comment)
        .or(delete_comment)
        .or(vote_comment);

    let mark_media = warp::post()
        .and(warp::path!("media" / MediaKind / "mark"))
        .and(json_body())
        .and(with_auth(auth.clone(), policy.clone()))
        .and(with(server.media_service.clone()))
        .and(with(policy.clone()))
        .and_then(handler::mark_media);

    let unmark_media = warp::post()
        .and(warp::path!("media" / MediaKind / "unmark"))
        .and(json_body())
        .and(with_auth(auth, policy.clone()))
        .and(with(server.media_service.clone()))
        .and(with(policy))
        .and_then(handler::unmark_media);

    auth_routes
        .or(account_routes)
        .or(article_routes)
        .or(comment_routes)
        .or(mark_media)
        .or(unmark_media)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T: DeserializeOwned + Send>()
-> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Bearer header and session cookies, whatever their validity.
fn with_credentials(
    policy: Arc<CookiePolicy>,
) -> impl Filter<Extract = (RequestCredentials,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str())
        .and(get_session_cookies(policy.access_name, policy.refresh_name))
        .map(
            |authorization: Option<String>, access_cookie: Option<String>, refresh_cookie: Option<String>| {
                let bearer = authorization
                    .as_deref()
                    .and_then(|h| h.strip_prefix("Bearer "))
                    .map(|t| t.trim().to_string());
                RequestCredentials {
                    bearer,
                    access_cookie,
                    refresh_cookie,
                }
            },
        )
}

fn with_auth(
    auth_service: Arc<dyn AuthService>,
    policy: Arc<CookiePolicy>,
) -> impl Filter<Extract = (Caller,), Error = warp::Rejection> + Clone {
    with_credentials(policy).and_then(move |credentials: RequestCredentials| {
        let auth_service = auth_service.clone();
        async move {
            let authenticated = auth_service
                .authenticate_request(&credentials)
                .await
                .map_err(ApiFailure::from)
                .map_err(reject::custom)?;
            Ok::<_, warp::Rejection>(Caller {
                user: authenticated.user,
                renewed_access: authenticated.renewed_access,
                credentials,
            })
        }
    })
}

fn with_optional_auth(
    auth_service: Arc<dyn AuthService>,
    policy: Arc<CookiePolicy>,
) -> impl Filter<Extract = (Option<Caller>,), Error = warp::Rejection> + Clone {
    with_credentials(policy).and_then(move |credentials: RequestCredentials| {
        let auth_service = auth_service.clone();
        async move {
            let authenticated = auth_service
                .authenticate_optional(&credentials)
                .await
                .map_err(ApiFailure::from)
                .map_err(reject::custom)?;
            Ok::<_, warp::Rejection>(authenticated.map(|a| Caller {
                user: a.user,
                renewed_access: a.renewed_access,
                credentials,
            }))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestApp;
    use serde_json::{Value, json};
    use warp::http::StatusCode;

    fn serve(server: Server) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
        routes(Arc::new(server)).recover(recover_error)
    }

    fn body(response: &http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    fn set_cookies(response: &http::Response<warp::hyper::body::Bytes>) -> Vec<String> {
        response
            .headers()
            .get_all(http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn login_sets_session_cookies() {
        let app = TestApp::new();
        app.seed_user("alice", "alice@example.com", "s3cret!pass").await;
        let api = serve(Server::over_test_app(&app));

        let response = warp::test::request()
            .method("POST")
            .path("/auth/login")
            .json(&json!({ "email": "alice@example.com", "password": "s3cret!pass" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body(&response);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["user"]["username"], "alice");
        assert!(json["data"]["user"].get("password_hash").is_none());

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("access_token="));
        assert!(cookies[0].contains("Max-Age=1800; Path=/; HttpOnly; SameSite=Lax"));
        assert!(cookies[1].starts_with("refresh_token="));
        assert!(cookies[1].contains(&format!("Max-Age={}", 7 * 24 * 60 * 60)));

        let access = json["data"]["auth_tokens"]["access_token"].as_str().unwrap();
        let response = warp::test::request()
            .path("/auth/me")
            .header("cookie", format!("access_token={access}"))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["data"]["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let app = TestApp::new();
        app.seed_user("alice", "alice@example.com", "s3cret!pass").await;

        let response = warp::test::request()
            .method("POST")
            .path("/auth/login")
            .json(&json!({ "email": "alice@example.com", "password": "nope" }))
            .reply(&serve(Server::over_test_app(&app)))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body(&response);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "InvalidCredentials");
    }

    #[tokio::test]
    async fn anonymous_me_is_unauthenticated() {
        let app = TestApp::new();
        let response = warp::test::request().path("/auth/me").reply(&serve(Server::over_test_app(&app))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&response)["error"]["code"], "Unauthenticated");
    }

    #[tokio::test]
    async fn expired_access_is_renewed_from_the_refresh_cookie() {
        let app = TestApp::new();
        let user = app.seed_user("alice", "alice@example.com", "s3cret!pass").await;
        let session = app
            .auth
            .login(LoginInput {
                email: "alice@example.com".into(),
                password: "s3cret!pass".into(),
            })
            .await
            .unwrap();
        let expired = app.codec.issue_expired_access_token(&user);

        let response = warp::test::request()
            .path("/auth/me")
            .header(
                "cookie",
                format!(
                    "access_token={}; refresh_token={}",
                    expired.0, session.tokens.refresh_token.0
                ),
            )
            .reply(&serve(Server::over_test_app(&app)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("access_token="));
        assert!(!cookies[0].starts_with(&format!("access_token={};", expired.0)));
    }

    #[tokio::test]
    async fn logout_clears_cookies_and_revokes_the_token() {
        let app = TestApp::new();
        app.seed_user("alice", "alice@example.com", "s3cret!pass").await;
        let session = app
            .auth
            .login(LoginInput {
                email: "alice@example.com".into(),
                password: "s3cret!pass".into(),
            })
            .await
            .unwrap();
        let bearer = format!("Bearer {}", session.tokens.access_token.0);
        let api = serve(Server::over_test_app(&app));

        let response = warp::test::request()
            .method("POST")
            .path("/auth/logout")
            .header("authorization", bearer.as_str())
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

        let response = warp::test::request()
            .path("/auth/me")
            .header("authorization", bearer.as_str())
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn articles_are_created_and_browsed() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "s3cret!pass").await;
        for i in 0..3 {
            app.seed_article(&alice, &format!("seeded {i}"), "<p>body</p>").await;
        }
        let session = app.auth.issue_tokens(&alice).await.unwrap();
        let api = serve(Server::over_test_app(&app));

        let response = warp::test::request()
            .method("POST")
            .path("/articles")
            .header("authorization", format!("Bearer {}", session.access_token.0))
            .json(&json!({ "title": "Fresh", "content": "<p>hello</p>" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body(&response)["data"]["id"].as_i64().unwrap();

        let response = warp::test::request()
            .path("/articles?size=2&mode=offset&page=1")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let listing = body(&response)["data"].clone();
        assert_eq!(listing["mode"], "offset");
        assert_eq!(listing["total_count"], 4);
        assert_eq!(listing["total_pages"], 2);
        assert_eq!(listing["items"][0]["id"], id);
        assert_eq!(listing["has_next"], true);

        let response = warp::test::request()
            .path(&format!("/articles/{id}"))
            .reply(&api)
            .await;
        assert_eq!(body(&response)["data"]["title"], "Fresh");
    }

    #[tokio::test]
    async fn anonymous_writes_are_refused() {
        let app = TestApp::new();
        let response = warp::test::request()
            .method("POST")
            .path("/articles")
            .json(&json!({ "title": "t", "content": "c" }))
            .reply(&serve(Server::over_test_app(&app)))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_input_is_rejected() {
        let app = TestApp::new();
        let api = serve(Server::over_test_app(&app));

        let response = warp::test::request()
            .method("POST")
            .path("/auth/login")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"]["code"], "InvalidInput");

        let response = warp::test::request()
            .path("/articles?mode=cursor&cursor=%25%25%25")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = warp::test::request().path("/nowhere").reply(&api).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["error"]["code"], "NotFound");
    }

    #[tokio::test]
    async fn media_kind_comes_from_the_path() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "s3cret!pass").await;
        let session = app.auth.issue_tokens(&alice).await.unwrap();

        let response = warp::test::request()
            .method("POST")
            .path("/media/image/mark")
            .header("authorization", format!("Bearer {}", session.access_token.0))
            .json(&json!({
                "owner": { "type": "draft", "id": alice.id.0 },
                "srcs": [
                    format!("/media/images/{}/a.png", alice.id),
                    format!("/media/images/{}/b.png", alice.id),
                ]
            }))
            .reply(&serve(Server::over_test_app(&app)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["data"]["changed"], 2);
    }

    #[tokio::test]
    async fn marking_another_users_upload_is_forbidden() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "s3cret!pass").await;
        let bob = app.seed_user("bob", "bob@example.com", "s3cret!pass").await;
        let session = app.auth.issue_tokens(&bob).await.unwrap();

        let response = warp::test::request()
            .method("POST")
            .path("/media/image/mark")
            .header("authorization", format!("Bearer {}", session.access_token.0))
            .json(&json!({
                "owner": { "type": "draft", "id": bob.id.0 },
                "srcs": [format!("/media/images/{}/draft.png", alice.id)]
            }))
            .reply(&serve(Server::over_test_app(&app)))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body(&response)["error"]["code"], "Forbidden");
    }
}
