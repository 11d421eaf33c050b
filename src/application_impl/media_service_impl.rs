use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct RealMediaService {
    article_repo: Arc<dyn ArticleRepo>,
    comment_repo: Arc<dyn CommentRepo>,
    candidates: Arc<dyn MediaCandidateStore>,
    files: Arc<dyn MediaFiles>,
    index: Arc<dyn ContentIndex>,
}

impl RealMediaService {
    pub fn new(
        article_repo: Arc<dyn ArticleRepo>,
        comment_repo: Arc<dyn CommentRepo>,
        candidates: Arc<dyn MediaCandidateStore>,
        files: Arc<dyn MediaFiles>,
        index: Arc<dyn ContentIndex>,
    ) -> Self {
        Self {
            article_repo,
            comment_repo,
            candidates,
            files,
            index,
        }
    }

    async fn author_of(&self, owner: MediaOwner) -> Result<UserId, MediaError> {
        Ok(match owner {
            MediaOwner::Draft(user_id) => user_id,
            MediaOwner::Article(id) => {
                self.article_repo
                    .get(id)
                    .await?
                    .ok_or(MediaError::NotFound(owner))?
                    .author_id
            }
            MediaOwner::Comment(id) => {
                self.comment_repo
                    .get(id)
                    .await?
                    .ok_or(MediaError::NotFound(owner))?
                    .author_id
            }
        })
    }

    async fn authorize(&self, actor: &User, owner: MediaOwner) -> Result<(), MediaError> {
        if self.author_of(owner).await? != actor.id {
            return Err(MediaError::Forbidden(owner));
        }
        Ok(())
    }

    /// Keeps the local sources of `srcs`, failing on any stored outside the
    /// actor's own folder for `kind`.
    fn own_sources(
        &self,
        actor: &User,
        kind: MediaKind,
        srcs: &[String],
    ) -> Result<Vec<String>, MediaError> {
        let mut own = Vec::with_capacity(srcs.len());
        for src in srcs {
            let Some(relative) = self.files.relative_path(src) else {
                debug!(%src, "external media source skipped");
                continue;
            };
            if !is_user_media(relative, kind, actor.id) {
                warn!(user_id = %actor.id, %src, "refused foreign media source");
                return Err(MediaError::ForeignSource(src.clone()));
            }
            own.push(src.clone());
        }
        Ok(own)
    }

    /// Deletes every file in `srcs` that sits in `author`'s folder and no
    /// other content embeds.
    async fn remove_unreferenced(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
        author: UserId,
        srcs: impl IntoIterator<Item = &String>,
    ) -> Result<usize, MediaError> {
        let mut removed = 0;
        for src in srcs {
            let owned = self
                .files
                .relative_path(src)
                .is_some_and(|relative| is_user_media(relative, kind, author));
            if !owned {
                debug!(%owner, %src, "media outside the author's folder, keeping");
                continue;
            }
            if self.index.is_referenced_elsewhere(src, owner).await? {
                debug!(%owner, %src, "media still referenced, keeping");
                continue;
            }
            if self.files.remove_file(src).await? {
                info!(%owner, %src, "media file removed");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl MediaService for RealMediaService {
    async fn mark(
        &self,
        actor: &User,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, MediaError> {
        self.authorize(actor, owner).await?;
        let srcs = self.own_sources(actor, kind, srcs)?;
        Ok(self.candidates.add(kind, owner, &srcs).await?)
    }

    async fn unmark(
        &self,
        actor: &User,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, MediaError> {
        self.authorize(actor, owner).await?;
        Ok(self.candidates.remove(kind, owner, srcs).await?)
    }

    async fn adopt_drafts(&self, user_id: UserId, owner: MediaOwner) -> Result<(), MediaError> {
        for kind in MediaKind::ALL {
            self.candidates
                .move_all(kind, MediaOwner::Draft(user_id), owner)
                .await?;
        }
        Ok(())
    }

    async fn cleanup_unused(
        &self,
        owner: MediaOwner,
        current_html: &str,
    ) -> Result<(), MediaError> {
        let mut known_author = None;
        for kind in MediaKind::ALL {
            let candidates = self.candidates.members(kind, owner).await?;
            if candidates.is_empty() {
                continue;
            }
            let author = match known_author {
                Some(author) => author,
                None => *known_author.insert(self.author_of(owner).await?),
            };
            let current = kind.extract(current_html);
            self.remove_unreferenced(kind, owner, author, candidates.difference(&current))
                .await?;
            self.candidates.delete(kind, owner).await?;
        }
        Ok(())
    }

    async fn purge_replaced(
        &self,
        owner: MediaOwner,
        old_html: &str,
        new_html: &str,
    ) -> Result<(), MediaError> {
        let author = self.author_of(owner).await?;
        for kind in MediaKind::ALL {
            let old = kind.extract(old_html);
            let new = kind.extract(new_html);
            self.remove_unreferenced(kind, owner, author, old.difference(&new))
                .await?;
        }
        Ok(())
    }

    async fn purge_owner(
        &self,
        owner: MediaOwner,
        html: &str,
        user_id: UserId,
    ) -> Result<(), MediaError> {
        for kind in MediaKind::ALL {
            let mut srcs: BTreeSet<String> = kind.extract(html);
            srcs.extend(self.candidates.members(kind, owner).await?);
            self.remove_unreferenced(kind, owner, user_id, &srcs)
                .await?;
            self.candidates.delete(kind, owner).await?;

            let dir = user_media_dir(kind, user_id);
            if self.files.remove_dir_if_empty(&dir).await? {
                debug!(dir, "empty media directory removed");
            }
        }
        Ok(())
    }

    async fn purge_user(&self, user_id: UserId) -> Result<(), MediaError> {
        for kind in MediaKind::ALL {
            self.candidates
                .delete(kind, MediaOwner::Draft(user_id))
                .await?;
            let dir = user_media_dir(kind, user_id);
            if self.files.remove_dir_all(&dir).await? {
                info!(%user_id, dir, "user media directory removed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn img(src: &str) -> String {
        format!(r#"<p><img src="{src}"></p>"#)
    }

    #[tokio::test]
    async fn drafts_belong_to_their_user() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let bob = app.seed_user("bob", "bob@example.com", "pw").await;
        let srcs = vec![format!("/media/images/{}/a.png", alice.id)];

        assert_eq!(
            app.media
                .mark(&alice, MediaKind::Image, MediaOwner::Draft(alice.id), &srcs)
                .await
                .unwrap(),
            1
        );
        assert!(matches!(
            app.media
                .mark(&bob, MediaKind::Image, MediaOwner::Draft(alice.id), &srcs)
                .await,
            Err(MediaError::Forbidden(_))
        ));
        assert!(matches!(
            app.media
                .mark(&bob, MediaKind::Image, MediaOwner::Article(ArticleId(999)), &srcs)
                .await,
            Err(MediaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cleanup_keeps_current_and_shared_media() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let kept = format!("/media/images/{}/kept.png", alice.id);
        let shared = format!("/media/images/{}/shared.png", alice.id);
        let dropped = format!("/media/images/{}/dropped.png", alice.id);
        for src in [&kept, &shared, &dropped] {
            app.files.put(src);
        }

        let article = app.seed_article(&alice, "one", &img(&kept)).await;
        app.seed_article(&alice, "two", &img(&shared)).await;
        let owner = MediaOwner::Article(article.id);
        app.media
            .mark(
                &alice,
                MediaKind::Image,
                owner,
                &[kept.clone(), shared.clone(), dropped.clone()],
            )
            .await
            .unwrap();

        app.media.cleanup_unused(owner, &article.content).await.unwrap();

        assert!(app.files.exists(&kept));
        assert!(app.files.exists(&shared));
        assert!(!app.files.exists(&dropped));
        assert!(
            app.candidates
                .members(MediaKind::Image, owner)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn replaced_media_is_removed() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let old = format!("/media/images/{}/old.png", alice.id);
        let new = format!("/media/images/{}/new.png", alice.id);
        app.files.put(&old);
        app.files.put(&new);
        let article = app.seed_article(&alice, "one", &img(&old)).await;

        app.media
            .purge_replaced(MediaOwner::Article(article.id), &img(&old), &img(&new))
            .await
            .unwrap();

        assert!(!app.files.exists(&old));
        assert!(app.files.exists(&new));
    }

    #[tokio::test]
    async fn purge_owner_removes_content_and_candidates() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let body = format!("/media/videos/{}/clip.mp4", alice.id);
        let stray = format!("/media/videos/{}/stray.mp4", alice.id);
        app.files.put(&body);
        app.files.put(&stray);
        let html = format!(r#"<video><source src="{body}"></video>"#);
        let article = app.seed_article(&alice, "clip", &html).await;
        let owner = MediaOwner::Article(article.id);
        app.media
            .mark(&alice, MediaKind::Video, owner, &[stray.clone()])
            .await
            .unwrap();

        app.media.purge_owner(owner, &html, alice.id).await.unwrap();

        assert!(!app.files.exists(&body));
        assert!(!app.files.exists(&stray));
        assert!(
            app.files
                .in_dir(&user_media_dir(MediaKind::Video, alice.id))
                .is_empty()
        );
    }

    #[tokio::test]
    async fn adopt_moves_draft_candidates() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let article = app.seed_article(&alice, "one", "<p>x</p>").await;
        let src = vec![format!("/media/images/{}/a.png", alice.id)];
        app.media
            .mark(&alice, MediaKind::Image, MediaOwner::Draft(alice.id), &src)
            .await
            .unwrap();

        app.media
            .adopt_drafts(alice.id, MediaOwner::Article(article.id))
            .await
            .unwrap();

        let draft = app
            .candidates
            .members(MediaKind::Image, MediaOwner::Draft(alice.id))
            .await
            .unwrap();
        let adopted = app
            .candidates
            .members(MediaKind::Image, MediaOwner::Article(article.id))
            .await
            .unwrap();
        assert!(draft.is_empty());
        assert_eq!(adopted.len(), 1);
    }

    #[tokio::test]
    async fn foreign_uploads_cannot_be_marked_or_removed() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let bob = app.seed_user("bob", "bob@example.com", "pw").await;
        let theirs = format!("/media/images/{}/draft.png", alice.id);
        app.files.put(&theirs);

        assert!(matches!(
            app.media
                .mark(&bob, MediaKind::Image, MediaOwner::Draft(bob.id), &[theirs.clone()])
                .await,
            Err(MediaError::ForeignSource(src)) if src == theirs
        ));
        assert!(
            app.candidates
                .members(MediaKind::Image, MediaOwner::Draft(bob.id))
                .await
                .unwrap()
                .is_empty()
        );

        let article = app.seed_article(&bob, "mine", "<p>x</p>").await;
        app.media
            .adopt_drafts(bob.id, MediaOwner::Article(article.id))
            .await
            .unwrap();
        app.media
            .cleanup_unused(MediaOwner::Article(article.id), "<p>x</p>")
            .await
            .unwrap();
        assert!(app.files.exists(&theirs));

        // bob embedding and then dropping alice's file does not delete it either
        app.media
            .purge_replaced(MediaOwner::Article(article.id), &img(&theirs), "<p>x</p>")
            .await
            .unwrap();
        assert!(app.files.exists(&theirs));
    }

    #[tokio::test]
    async fn external_sources_are_not_tracked() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let srcs = vec![
            "https://example.com/embed/1".to_string(),
            format!("/media/videos/{}/v.mp4", alice.id),
        ];

        let added = app
            .media
            .mark(&alice, MediaKind::Video, MediaOwner::Draft(alice.id), &srcs)
            .await
            .unwrap();

        assert_eq!(added, 1);
        assert!(matches!(
            app.media
                .mark(
                    &alice,
                    MediaKind::Video,
                    MediaOwner::Draft(alice.id),
                    &[format!("/media/images/{}/a.png", alice.id)],
                )
                .await,
            Err(MediaError::ForeignSource(_))
        ));
    }

    #[tokio::test]
    async fn thumbnails_keep_their_file() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let thumb = format!("/media/images/{}/thumb.png", alice.id);
        app.files.put(&thumb);
        ArticleRepo::create(
            &*app.board,
            NewArticle {
                title: "cover".into(),
                content: "<p>text only</p>".into(),
                img_path: Some(thumb.clone()),
                author_id: alice.id,
            },
        )
        .await
        .unwrap();
        let article = app.seed_article(&alice, "two", &img(&thumb)).await;

        app.media
            .purge_replaced(MediaOwner::Article(article.id), &img(&thumb), "<p>gone</p>")
            .await
            .unwrap();

        assert!(app.files.exists(&thumb));
    }
}
