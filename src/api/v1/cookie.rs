use crate::logger::*;
use crate::server::CookiePolicy;
use std::fmt;
use std::time::Duration;
use warp::Filter;
use warp::http::HeaderValue;
use warp::http::header::SET_COOKIE;
use warp::reply::Response;

/// A `Set-Cookie` value for one of the session cookies.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookie<'a> {
    name: &'a str,
    value: &'a str,
    max_age: Duration,
    secure: bool,
}

impl<'a> SessionCookie<'a> {
    pub fn access(policy: &'a CookiePolicy, token: &'a str) -> Self {
        SessionCookie {
            name: policy.access_name,
            value: token,
            max_age: policy.access_max_age,
            secure: policy.secure,
        }
    }

    pub fn refresh(policy: &'a CookiePolicy, token: &'a str) -> Self {
        SessionCookie {
            name: policy.refresh_name,
            value: token,
            max_age: policy.refresh_max_age,
            secure: policy.secure,
        }
    }

    /// Tells the browser to drop cookie `name` right away.
    pub fn cleared(policy: &CookiePolicy, name: &'a str) -> Self {
        SessionCookie {
            name,
            value: "",
            max_age: Duration::ZERO,
            secure: policy.secure,
        }
    }
}

impl fmt::Display for SessionCookie<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            self.name,
            self.value,
            self.max_age.as_secs()
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

pub fn cleared_session(policy: &CookiePolicy) -> [SessionCookie<'static>; 2] {
    [
        SessionCookie::cleared(policy, policy.access_name),
        SessionCookie::cleared(policy, policy.refresh_name),
    ]
}

pub fn add_cookies<'a>(response: &mut Response, cookies: impl IntoIterator<Item = SessionCookie<'a>>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(cookie = cookie.name, "dropping unrepresentable cookie: {}", e),
        }
    }
}

/// The access and refresh cookies of a request, either possibly absent.
pub fn get_session_cookies(
    access_name: &'static str,
    refresh_name: &'static str,
) -> impl Filter<Extract = (Option<String>, Option<String>), Error = std::convert::Infallible> + Clone {
    warp::cookie::optional::<String>(access_name)
        .and(warp::cookie::optional::<String>(refresh_name))
}
