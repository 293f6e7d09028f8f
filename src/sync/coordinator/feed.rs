//! Community feed: photo posts, likes and comments.
//!
//! Posts are never cached locally; the feed is only available online.

use std::collections::BTreeSet;

use super::SyncCoordinator;
use crate::models::{CommunityPost, PostComment};
use crate::sync::error::SyncError;
use crate::sync::view::{Loading, LoadingGuard, Optimistic, ViewState};

/// Posts fetched by [`SyncCoordinator::load_posts`].
pub const FEED_PAGE_SIZE: usize = 20;

/// Posts fetched per [`SyncCoordinator::load_more_posts`].
pub const FEED_MORE_PAGE_SIZE: usize = 10;

impl SyncCoordinator {
    /// Replaces the feed with its newest page. Returns the number of posts.
    ///
    /// Failing to read which posts the user liked leaves them all unliked
    /// and is reported in the view, but does not fail the load.
    pub async fn load_posts(&self) -> Result<usize, SyncError> {
        let _loading = LoadingGuard::start(&self.view, Loading::Feed);
        let result = self.first_page().await;
        self.record(result)
    }

    /// Appends the page of posts older than the oldest one shown. Returns
    /// how many new posts were added.
    pub async fn load_more_posts(&self) -> Result<usize, SyncError> {
        let _loading = LoadingGuard::start(&self.view, Loading::Feed);
        let result = self.next_page().await;
        self.record(result)
    }

    /// Publishes a post for an image that is already hosted. Returns its id.
    pub async fn create_post(&self, caption: &str, image_url: &str) -> Result<String, SyncError> {
        let result = self.publish_post(caption, image_url).await;
        self.record(result)
    }

    /// Flips the signed-in user's like on a post. Returns the new state.
    pub async fn toggle_like(&self, post_id: &str) -> Result<bool, SyncError> {
        let result = self.flip_like(post_id).await;
        self.record(result)
    }

    /// Loads the comment thread of a post into the view, oldest first.
    pub async fn load_comments(&self, post_id: &str) -> Result<Vec<PostComment>, SyncError> {
        let _loading = LoadingGuard::start(&self.view, Loading::Comments);
        self.view.send_modify(|state| {
            state.comments.clear();
            state.comments_post_id = Some(post_id.to_string());
        });

        let result = self.remote.fetch_comments(post_id).await;
        if let Ok(comments) = &result {
            let comments = comments.clone();
            self.view.send_modify(|state| {
                if state.comments_post_id.as_deref() == Some(post_id) {
                    state.comments = comments;
                }
            });
        }
        self.record(result.map_err(SyncError::from))
    }

    pub async fn post_comment(&self, post_id: &str, text: &str) -> Result<PostComment, SyncError> {
        let result = self.add_comment(post_id, text).await;
        self.record(result)
    }

    async fn first_page(&self) -> Result<usize, SyncError> {
        let _exclusive = self.feed_reload.write().await;
        let posts = self.remote.fetch_posts(FEED_PAGE_SIZE, None).await?;
        let liked = self.liked_among(&posts).await;

        tracing::info!("Loaded {} post(s)", posts.len());
        let count = posts.len();
        self.view.send_modify(|state| {
            state.posts = posts;
            state.liked_post_ids = liked;
        });
        Ok(count)
    }

    async fn next_page(&self) -> Result<usize, SyncError> {
        let oldest = self.view.borrow().posts.iter().map(|p| p.created_at).min();
        let Some(before) = oldest else {
            return self.first_page().await;
        };

        let _exclusive = self.feed_reload.write().await;
        let page = self
            .remote
            .fetch_posts(FEED_MORE_PAGE_SIZE, Some(before))
            .await?;
        let liked = self.liked_among(&page).await;

        let mut added = 0;
        self.view.send_modify(|state| {
            for post in page {
                if state.post(&post.id).is_none() {
                    state.posts.push(post);
                    added += 1;
                }
            }
            state.liked_post_ids.extend(liked);
        });
        tracing::debug!("Appended {} older post(s)", added);
        Ok(added)
    }

    /// Ids among `posts` the signed-in user has liked.
    async fn liked_among(&self, posts: &[CommunityPost]) -> BTreeSet<String> {
        let Some(user) = self.auth.current_user() else {
            return BTreeSet::new();
        };
        if posts.is_empty() {
            return BTreeSet::new();
        }

        let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        match self.remote.liked_post_ids(&user.uid, &ids).await {
            Ok(liked) => liked,
            Err(e) => {
                self.report(format!("Failed to load likes: {}", e));
                BTreeSet::new()
            }
        }
    }

    async fn publish_post(&self, caption: &str, image_url: &str) -> Result<String, SyncError> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return Err(SyncError::InvalidInput(
                "post image url must not be blank".to_string(),
            ));
        }
        let owner = self.require_user()?;
        let _shared = self.feed_reload.read().await;

        let draft = CommunityPost::new(&owner.uid, owner.author_name(), image_url, caption.trim());
        let stored = self.remote.create_post(&draft).await?;
        tracing::info!("Published post {}", stored.id);

        let id = stored.id.clone();
        self.view.send_modify(|state| {
            state.posts.retain(|p| p.id != stored.id);
            state.posts.insert(0, stored);
        });
        Ok(id)
    }

    async fn flip_like(&self, post_id: &str) -> Result<bool, SyncError> {
        let owner = self.require_user()?;
        let _shared = self.feed_reload.read().await;
        let _lock = self.locks.lock_post(post_id).await;

        let desired = !self.view.borrow().is_liked(post_id);
        let id = post_id.to_string();

        let update = Optimistic::apply(
            &self.view,
            format!("like {} -> {}", post_id, desired),
            |state| set_liked(state, post_id, desired),
            move |state| set_liked(state, &id, !desired),
        );

        self.remote.set_like(post_id, &owner.uid, desired).await?;

        update.confirm();
        Ok(desired)
    }

    async fn add_comment(&self, post_id: &str, text: &str) -> Result<PostComment, SyncError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::InvalidInput(
                "comment must not be blank".to_string(),
            ));
        }
        let owner = self.require_user()?;
        let _shared = self.feed_reload.read().await;
        let _lock = self.locks.lock_post(post_id).await;

        let draft = PostComment::new(post_id, &owner.uid, owner.author_name(), text);
        let stored = self.remote.add_comment(&draft).await?;
        tracing::info!("Commented on post {}", post_id);

        let comment = stored.clone();
        self.view.send_modify(|state| {
            if state.comments_post_id.as_deref() == Some(post_id) {
                state.comments.push(comment);
            }
            if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                post.comment_count = post.comment_count.saturating_add(1);
            }
        });
        Ok(stored)
    }
}

/// Moves the like count only when the liked set actually changes.
fn set_liked(state: &mut ViewState, post_id: &str, liked: bool) {
    let changed = if liked {
        state.liked_post_ids.insert(post_id.to_string())
    } else {
        state.liked_post_ids.remove(post_id)
    };
    if !changed {
        return;
    }
    if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
        *post = post.with_like(liked);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{setup_cache, TestCache};
    use crate::models::UserProfile;
    use crate::remote::{DocumentStore, RemoteStore, StaticAuth};
    use crate::sync::connectivity::FixedConnectivity;
    use crate::sync::test_support::FlakyRemote;
    use chrono::Utc;
    use std::sync::Arc;

    struct Feed {
        coordinator: SyncCoordinator,
        remote: Arc<FlakyRemote>,
        _cache: TestCache,
    }

    async fn feed(auth: StaticAuth) -> Feed {
        let cache = setup_cache().await;
        let remote = Arc::new(FlakyRemote::new(DocumentStore::in_memory()));
        let coordinator = SyncCoordinator::new(
            remote.clone(),
            cache.cache.clone(),
            Arc::new(auth),
            Arc::new(FixedConnectivity::online()),
        );
        Feed {
            coordinator,
            remote,
            _cache: cache,
        }
    }

    async fn signed_in() -> Feed {
        feed(StaticAuth::signed_in(UserProfile::new("u1").with_display_name("Sam"))).await
    }

    async fn seed_post(remote: &FlakyRemote, caption: &str, minutes_ago: i64) -> CommunityPost {
        let post = CommunityPost::new("u2", "Alex", "https://img/p.jpg", caption)
            .with_created_at(Utc::now() - chrono::Duration::minutes(minutes_ago));
        remote.inner().create_post(&post).await.unwrap()
    }

    async fn stored_post(remote: &FlakyRemote, id: &str) -> CommunityPost {
        remote
            .inner()
            .fetch_posts(100, None)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.id == id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_posts_newest_first_with_likes() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let old = seed_post(&remote, "old", 30).await;
        let new = seed_post(&remote, "new", 5).await;
        remote.inner().set_like(&old.id, "u1", true).await.unwrap();

        assert_eq!(coordinator.load_posts().await.unwrap(), 2);

        let view = coordinator.view();
        let captions: Vec<&str> = view.posts.iter().map(|p| p.caption.as_str()).collect();
        assert_eq!(captions, vec!["new", "old"]);
        assert!(view.is_liked(&old.id));
        assert!(!view.is_liked(&new.id));
        assert!(!view.feed_loading);
    }

    #[tokio::test]
    async fn test_load_more_posts_appends_older_page() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        for i in 0..25 {
            seed_post(&remote, &format!("post {}", i), i + 1).await;
        }

        assert_eq!(coordinator.load_posts().await.unwrap(), FEED_PAGE_SIZE);
        assert_eq!(coordinator.load_more_posts().await.unwrap(), 5);
        assert_eq!(coordinator.load_more_posts().await.unwrap(), 0);

        let view = coordinator.view();
        assert_eq!(view.posts.len(), 25);
        assert!(view
            .posts
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[tokio::test]
    async fn test_likes_failure_still_shows_posts() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        seed_post(&remote, "only", 1).await;
        remote.fail("liked_post_ids");

        assert_eq!(coordinator.load_posts().await.unwrap(), 1);

        let view = coordinator.view();
        assert_eq!(view.posts.len(), 1);
        assert!(view.liked_post_ids.is_empty());
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn test_signed_out_feed_is_readable_but_not_likeable() {
        let Feed { coordinator, remote, _cache } = feed(StaticAuth::signed_out()).await;
        let post = seed_post(&remote, "hello", 1).await;

        coordinator.load_posts().await.unwrap();
        let err = coordinator.toggle_like(&post.id).await.unwrap_err();

        assert!(matches!(err, SyncError::NotAuthenticated));
        assert_eq!(remote.calls("liked_post_ids"), 0);
        assert_eq!(remote.calls("set_like"), 0);
        assert_eq!(coordinator.view().post(&post.id).unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn test_toggle_like_round_trip() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let post = seed_post(&remote, "pie", 1).await;
        coordinator.load_posts().await.unwrap();

        assert!(coordinator.toggle_like(&post.id).await.unwrap());
        assert_eq!(coordinator.view().post(&post.id).unwrap().like_count, 1);
        assert_eq!(stored_post(&remote, &post.id).await.like_count, 1);

        assert!(!coordinator.toggle_like(&post.id).await.unwrap());
        let view = coordinator.view();
        assert!(!view.is_liked(&post.id));
        assert_eq!(view.post(&post.id).unwrap().like_count, 0);
        assert_eq!(stored_post(&remote, &post.id).await.like_count, 0);
    }

    #[tokio::test]
    async fn test_toggle_like_rolls_back_on_failure() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let post = seed_post(&remote, "pie", 1).await;
        coordinator.load_posts().await.unwrap();

        remote.fail("set_like");
        let err = coordinator.toggle_like(&post.id).await.unwrap_err();

        assert!(matches!(err, SyncError::RemoteUnavailable(_)));
        let view = coordinator.view();
        assert!(!view.is_liked(&post.id));
        assert_eq!(view.post(&post.id).unwrap().like_count, 0);
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_likes_on_one_post_stay_consistent() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let post = seed_post(&remote, "pie", 1).await;
        coordinator.load_posts().await.unwrap();

        let (a, b, c) = tokio::join!(
            coordinator.toggle_like(&post.id),
            coordinator.toggle_like(&post.id),
            coordinator.toggle_like(&post.id),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let view = coordinator.view();
        let stored = stored_post(&remote, &post.id).await;
        assert!(view.is_liked(&post.id));
        assert_eq!(stored.like_count, 1);
        assert_eq!(view.post(&post.id).unwrap().like_count, stored.like_count);
    }

    #[tokio::test]
    async fn test_create_post_requires_image_url() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let err = coordinator.create_post("Dinner", "  ").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
        assert_eq!(remote.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_post_goes_to_top_of_feed() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        seed_post(&remote, "earlier", 10).await;
        coordinator.load_posts().await.unwrap();

        let id = coordinator
            .create_post("  Sunday roast ", "https://img/roast.jpg")
            .await
            .unwrap();

        let view = coordinator.view();
        assert_eq!(view.posts.len(), 2);
        assert_eq!(view.posts[0].id, id);
        assert_eq!(view.posts[0].caption, "Sunday roast");
        assert_eq!(view.posts[0].author_name, "Sam");
        assert_eq!(stored_post(&remote, &id).await.image_url, "https://img/roast.jpg");
    }

    #[tokio::test]
    async fn test_post_comment_appends_and_counts() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let post = seed_post(&remote, "pie", 1).await;
        remote
            .inner()
            .add_comment(&PostComment::new(&post.id, "u2", "Alex", "First"))
            .await
            .unwrap();
        coordinator.load_posts().await.unwrap();
        assert_eq!(coordinator.load_comments(&post.id).await.unwrap().len(), 1);

        let comment = coordinator.post_comment(&post.id, " Looks great ").await.unwrap();
        assert_eq!(comment.text, "Looks great");
        assert_eq!(comment.author_name, "Sam");

        let view = coordinator.view();
        let texts: Vec<&str> = view.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Looks great"]);
        assert_eq!(view.post(&post.id).unwrap().comment_count, 2);
        assert_eq!(stored_post(&remote, &post.id).await.comment_count, 2);
        assert!(!view.comments_loading);
    }

    #[tokio::test]
    async fn test_comment_on_other_post_leaves_open_thread() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let open = seed_post(&remote, "open", 1).await;
        let other = seed_post(&remote, "other", 2).await;
        coordinator.load_comments(&open.id).await.unwrap();

        coordinator.post_comment(&other.id, "Nice").await.unwrap();

        let view = coordinator.view();
        assert_eq!(view.comments_post_id.as_deref(), Some(open.id.as_str()));
        assert!(view.comments.is_empty());
    }

    #[tokio::test]
    async fn test_blank_comment_is_rejected() {
        let Feed { coordinator, remote, _cache } = signed_in().await;
        let err = coordinator.post_comment("p1", "   ").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
        assert_eq!(remote.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_is_not_found() {
        let Feed { coordinator, _cache, .. } = signed_in().await;
        let err = coordinator.post_comment("gone", "Hello").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
