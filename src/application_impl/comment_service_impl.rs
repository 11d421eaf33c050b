use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

pub struct RealCommentService {
    article_repo: Arc<dyn ArticleRepo>,
    comment_repo: Arc<dyn CommentRepo>,
    media_service: Arc<dyn MediaService>,
}

impl RealCommentService {
    pub fn new(
        article_repo: Arc<dyn ArticleRepo>,
        comment_repo: Arc<dyn CommentRepo>,
        media_service: Arc<dyn MediaService>,
    ) -> Self {
        Self {
            article_repo,
            comment_repo,
            media_service,
        }
    }

    async fn load_owned(&self, actor: &User, id: CommentId) -> Result<Comment, ContentError> {
        let comment = self
            .comment_repo
            .get(id)
            .await?
            .ok_or(ContentError::NotFound)?;
        if comment.author_id != actor.id {
            return Err(ContentError::Forbidden);
        }
        Ok(comment)
    }
}

fn require_content(content: &str) -> Result<(), ContentError> {
    if content.trim().is_empty() {
        return Err(ContentError::InvalidInput("comment is empty".into()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl CommentService for RealCommentService {
    async fn list_for_article(
        &self,
        article_id: ArticleId,
        viewer: Option<&User>,
    ) -> Result<Vec<CommentView>, ContentError> {
        let article = self
            .article_repo
            .get(article_id)
            .await?
            .ok_or(ContentError::NotFound)?;
        let viewer_id = viewer.map(|u| u.id);

        let views = self
            .comment_repo
            .list_for_article(article_id)
            .await?
            .into_iter()
            .map(|mut comment| {
                let visible = !comment.is_secret
                    || viewer_id == Some(comment.author_id)
                    || viewer_id == Some(article.author_id);
                if !visible {
                    comment.content.clear();
                }
                CommentView {
                    comment,
                    content_hidden: !visible,
                }
            })
            .collect();
        Ok(views)
    }

    async fn create(
        &self,
        actor: &User,
        article_id: ArticleId,
        input: CommentInput,
    ) -> Result<Comment, ContentError> {
        require_content(&input.content)?;
        if self.article_repo.get(article_id).await?.is_none() {
            return Err(ContentError::NotFound);
        }
        if let Some(parent_id) = input.paired_comment_id {
            let parent = self
                .comment_repo
                .get(parent_id)
                .await?
                .ok_or(ContentError::NotFound)?;
            if parent.article_id != article_id {
                return Err(ContentError::InvalidInput(
                    "reply target belongs to another article".into(),
                ));
            }
        }

        let comment = self
            .comment_repo
            .create(NewComment {
                article_id,
                author_id: actor.id,
                content: input.content,
                is_secret: input.is_secret,
                paired_comment_id: input.paired_comment_id,
            })
            .await?;

        let owner = MediaOwner::Comment(comment.id);
        self.media_service.adopt_drafts(actor.id, owner).await?;
        self.media_service
            .cleanup_unused(owner, &comment.content)
            .await?;

        info!(comment_id = %comment.id, %article_id, "comment created");
        Ok(comment)
    }

    async fn update(
        &self,
        actor: &User,
        id: CommentId,
        patch: CommentPatch,
    ) -> Result<Comment, ContentError> {
        let before = self.load_owned(actor, id).await?;
        require_content(&patch.content)?;
        let is_secret = patch.is_secret.unwrap_or(before.is_secret);

        self.comment_repo
            .update(id, &patch.content, is_secret)
            .await?;

        let owner = MediaOwner::Comment(id);
        self.media_service.adopt_drafts(actor.id, owner).await?;
        self.media_service
            .purge_replaced(owner, &before.content, &patch.content)
            .await?;
        self.media_service
            .cleanup_unused(owner, &patch.content)
            .await?;

        self.comment_repo
            .get(id)
            .await?
            .ok_or(ContentError::NotFound)
    }

    async fn delete(&self, actor: &User, id: CommentId) -> Result<(), ContentError> {
        let comment = self.load_owned(actor, id).await?;
        if self.comment_repo.count_replies(id).await? > 0 {
            return Err(ContentError::Conflict(
                "comment has replies and cannot be deleted".into(),
            ));
        }

        self.media_service
            .purge_owner(MediaOwner::Comment(id), &comment.content, comment.author_id)
            .await?;
        if !self.comment_repo.delete(id).await? {
            return Err(ContentError::NotFound);
        }
        info!(comment_id = %id, "comment deleted");
        Ok(())
    }

    async fn vote(&self, actor: &User, id: CommentId) -> Result<VoteOutcome, ContentError> {
        let comment = self
            .comment_repo
            .get(id)
            .await?
            .ok_or(ContentError::NotFound)?;
        if comment.author_id == actor.id {
            return Err(ContentError::Forbidden);
        }
        Ok(self.comment_repo.toggle_vote(id, actor.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn input(content: &str) -> CommentInput {
        CommentInput {
            content: content.into(),
            is_secret: false,
            paired_comment_id: None,
        }
    }

    #[tokio::test]
    async fn secret_comments_are_hidden_from_bystanders() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let bob = app.seed_user("bob", "bob@example.com", "pw").await;
        let carol = app.seed_user("carol", "carol@example.com", "pw").await;
        let article = app.seed_article(&alice, "post", "<p>x</p>").await;
        app.comments
            .create(
                &bob,
                article.id,
                CommentInput {
                    is_secret: true,
                    ..input("psst")
                },
            )
            .await
            .unwrap();
        app.comments
            .create(&carol, article.id, input("hello"))
            .await
            .unwrap();

        let hidden_for = |views: &[CommentView]| -> Vec<bool> {
            views.iter().map(|v| v.content_hidden).collect()
        };
        let for_author = app
            .comments
            .list_for_article(article.id, Some(&alice))
            .await
            .unwrap();
        let for_writer = app
            .comments
            .list_for_article(article.id, Some(&bob))
            .await
            .unwrap();
        let for_carol = app
            .comments
            .list_for_article(article.id, Some(&carol))
            .await
            .unwrap();
        let for_guest = app
            .comments
            .list_for_article(article.id, None)
            .await
            .unwrap();

        assert_eq!(hidden_for(&for_author), vec![false, false]);
        assert_eq!(hidden_for(&for_writer), vec![false, false]);
        assert_eq!(hidden_for(&for_carol), vec![true, false]);
        assert_eq!(hidden_for(&for_guest), vec![true, false]);
        assert!(for_guest[0].comment.content.is_empty());
        assert_eq!(for_author[0].comment.content, "psst");
    }

    #[tokio::test]
    async fn replies_stay_within_their_article() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let first = app.seed_article(&alice, "one", "<p>1</p>").await;
        let second = app.seed_article(&alice, "two", "<p>2</p>").await;
        let parent = app
            .comments
            .create(&alice, first.id, input("parent"))
            .await
            .unwrap();

        let reply = CommentInput {
            paired_comment_id: Some(parent.id),
            ..input("reply")
        };
        assert!(matches!(
            app.comments.create(&alice, second.id, reply.clone()).await,
            Err(ContentError::InvalidInput(_))
        ));
        let ok = app.comments.create(&alice, first.id, reply).await.unwrap();
        assert_eq!(ok.paired_comment_id, Some(parent.id));

        assert!(matches!(
            app.comments
                .create(
                    &alice,
                    first.id,
                    CommentInput {
                        paired_comment_id: Some(CommentId(999)),
                        ..input("orphan")
                    }
                )
                .await,
            Err(ContentError::NotFound)
        ));
        assert!(matches!(
            app.comments.create(&alice, ArticleId(999), input("x")).await,
            Err(ContentError::NotFound)
        ));
    }

    #[tokio::test]
    async fn comments_with_replies_cannot_be_deleted() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let bob = app.seed_user("bob", "bob@example.com", "pw").await;
        let article = app.seed_article(&alice, "one", "<p>1</p>").await;
        let parent = app
            .comments
            .create(&alice, article.id, input("parent"))
            .await
            .unwrap();
        let reply = app
            .comments
            .create(
                &bob,
                article.id,
                CommentInput {
                    paired_comment_id: Some(parent.id),
                    ..input("reply")
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            app.comments.delete(&alice, parent.id).await,
            Err(ContentError::Conflict(_))
        ));
        assert!(matches!(
            app.comments.delete(&alice, reply.id).await,
            Err(ContentError::Forbidden)
        ));
        app.comments.delete(&bob, reply.id).await.unwrap();
        app.comments.delete(&alice, parent.id).await.unwrap();
    }

    #[tokio::test]
    async fn update_keeps_secrecy_unless_changed() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let article = app.seed_article(&alice, "one", "<p>1</p>").await;
        let comment = app
            .comments
            .create(
                &alice,
                article.id,
                CommentInput {
                    is_secret: true,
                    ..input("first")
                },
            )
            .await
            .unwrap();

        let edited = app
            .comments
            .update(
                &alice,
                comment.id,
                CommentPatch {
                    content: "second".into(),
                    is_secret: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.content, "second");
        assert!(edited.is_secret);

        assert!(matches!(
            app.comments
                .update(
                    &alice,
                    comment.id,
                    CommentPatch {
                        content: "  ".into(),
                        is_secret: None,
                    },
                )
                .await,
            Err(ContentError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn votes_toggle_and_skip_own_comments() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let bob = app.seed_user("bob", "bob@example.com", "pw").await;
        let article = app.seed_article(&alice, "one", "<p>1</p>").await;
        let comment = app
            .comments
            .create(&alice, article.id, input("vote me"))
            .await
            .unwrap();

        assert!(matches!(
            app.comments.vote(&alice, comment.id).await,
            Err(ContentError::Forbidden)
        ));
        assert_eq!(
            app.comments.vote(&bob, comment.id).await.unwrap(),
            VoteOutcome {
                result: VoteAction::Insert,
                voter_count: 1
            }
        );
        assert_eq!(
            app.comments.vote(&bob, comment.id).await.unwrap(),
            VoteOutcome {
                result: VoteAction::Delete,
                voter_count: 0
            }
        );
    }

    #[tokio::test]
    async fn concurrent_votes_settle_on_one_row() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let bob = app.seed_user("bob", "bob@example.com", "pw").await;
        let article = app.seed_article(&alice, "one", "<p>1</p>").await;
        let comment = app.seed_comment(&alice, article.id, "<p>vote me</p>").await;

        let (a, b, c) = tokio::join!(
            app.comments.vote(&bob, comment.id),
            app.comments.vote(&bob, comment.id),
            app.comments.vote(&bob, comment.id),
        );
        let results: Vec<VoteAction> = [a, b, c].into_iter().map(|o| o.unwrap().result).collect();

        assert_eq!(results.iter().filter(|r| **r == VoteAction::Insert).count(), 2);
        assert_eq!(results.iter().filter(|r| **r == VoteAction::Delete).count(), 1);
        let stored = CommentRepo::get(&*app.board, comment.id).await.unwrap().unwrap();
        assert_eq!(stored.voter_count, 1);
    }
}
