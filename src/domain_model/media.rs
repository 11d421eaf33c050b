use crate::domain_model::{ArticleId, CommentId, UserId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("valid regex"));

static VIDEO_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:source|video|iframe)\b[^>]*\bsrc\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Directory under the media root holding per-user folders of this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }

    /// Media sources of this kind referenced by an editor HTML fragment.
    pub fn extract(&self, html: &str) -> BTreeSet<String> {
        let pattern = match self {
            MediaKind::Image => &*IMG_SRC,
            MediaKind::Video => &*VIDEO_SRC,
        };
        pattern
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Whose content a media candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum MediaOwner {
    Article(ArticleId),
    Comment(CommentId),
    /// Content still being edited and not yet saved.
    Draft(UserId),
}

impl fmt::Display for MediaOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaOwner::Article(id) => write!(f, "article:{id}"),
            MediaOwner::Comment(id) => write!(f, "comment:{id}"),
            MediaOwner::Draft(id) => write!(f, "draft:{id}"),
        }
    }
}

/// Relative directory holding `user`'s uploads of `kind`.
pub fn user_media_dir(kind: MediaKind, user: UserId) -> String {
    format!("{}/{}", kind.dir_name(), user)
}

/// Path of `src` below the media root, or `None` for external URLs and
/// anything that would leave the root.
pub fn media_relative_path<'a>(src: &'a str, url_prefix: &str) -> Option<&'a str> {
    let rest = src
        .strip_prefix(url_prefix.trim_end_matches('/'))?
        .strip_prefix('/')?;
    if rest
        .split(['/', '\\'])
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return None;
    }
    Some(rest)
}

/// Whether a relative media path lies inside `user`'s folder for `kind`.
pub fn is_user_media(relative: &str, kind: MediaKind, user: UserId) -> bool {
    relative
        .strip_prefix(&user_media_dir(kind, user))
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_image_sources() {
        let html = r#"<p>hi</p><IMG class="x" SRC="/media/images/1/a.png"><img src='/media/images/1/b.png' alt="">"#;
        let srcs = MediaKind::Image.extract(html);
        assert_eq!(
            srcs.into_iter().collect::<Vec<_>>(),
            vec!["/media/images/1/a.png", "/media/images/1/b.png"]
        );
    }

    #[test]
    fn extracts_video_sources_across_lines() {
        let html = "<video controls>\n<source\n  src=\"/media/videos/2/v.mp4\" type=\"video/mp4\"></video>\
                    <iframe class=\"ql-video\" src=\"https://example.com/embed/1\"></iframe>";
        let srcs = MediaKind::Video.extract(html);
        assert!(srcs.contains("/media/videos/2/v.mp4"));
        assert!(srcs.contains("https://example.com/embed/1"));
        assert!(MediaKind::Image.extract(html).is_empty());
    }

    #[test]
    fn duplicate_sources_collapse() {
        let html = r#"<img src="/a.png"><img src="/a.png">"#;
        assert_eq!(MediaKind::Image.extract(html).len(), 1);
    }

    #[test]
    fn relative_paths_stay_under_the_prefix() {
        assert_eq!(
            media_relative_path("/media/images/7/a.png", "/media/"),
            Some("images/7/a.png")
        );
        assert_eq!(media_relative_path("https://cdn.example.com/a.png", "/media"), None);
        assert_eq!(media_relative_path("/mediax/a.png", "/media"), None);
        assert_eq!(media_relative_path("/media/images/../7/a.png", "/media"), None);
        assert_eq!(media_relative_path("/media//images/a.png", "/media"), None);
    }

    #[test]
    fn user_media_is_scoped_by_kind_and_user() {
        assert!(is_user_media("images/7/a.png", MediaKind::Image, UserId(7)));
        assert!(!is_user_media("images/71/a.png", MediaKind::Image, UserId(7)));
        assert!(!is_user_media("videos/7/a.png", MediaKind::Image, UserId(7)));
        assert!(!is_user_media("images/7/", MediaKind::Image, UserId(7)));
    }

    #[test]
    fn owner_keys_are_distinct_per_kind_of_owner() {
        assert_eq!(MediaOwner::Article(ArticleId(3)).to_string(), "article:3");
        assert_eq!(MediaOwner::Comment(CommentId(3)).to_string(), "comment:3");
        assert_eq!(MediaOwner::Draft(UserId(3)).to_string(), "draft:3");
    }
}
