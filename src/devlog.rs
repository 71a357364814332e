//! Devlog posts and comments.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::ledger::{AppLink, Ledger, require};
use crate::models::{Comment, Post};
use crate::store::{Formula, RecordStore, RecordStoreExt, patch};
use crate::{Error, Result};

/// `lastPost` of a neighbor's first post.
pub fn devlog_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_default()
}

/// A post with its comment records in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub comment_thread: Vec<Comment>,
}

impl<S: RecordStore> Ledger<S> {
    /// Post a devlog entry, snapshotting the time of the author's previous post.
    pub fn create_post(
        &mut self,
        token: &str,
        app_name: &str,
        demo_video: &str,
        photobooth_video: &str,
        description: &str,
    ) -> Result<Post> {
        require("app name", app_name)?;
        require("demo video", demo_video)?;
        require("photobooth video", photobooth_video)?;
        require("description", description)?;

        let neighbor = self.resolve(token)?;
        let app = self.app_by_name(app_name)?;

        let last_post = self
            .store
            .find_all::<Post>(&Formula::links("neighbor", &neighbor.id))?
            .into_iter()
            .map(|p| p.created_at)
            .max()
            .unwrap_or_else(devlog_epoch);

        let post = self.store.insert(&Post {
            id: String::new(),
            neighbor: vec![neighbor.id.clone()],
            app: vec![app.id.clone()],
            demo_video: demo_video.trim().to_string(),
            photobooth_video: photobooth_video.trim().to_string(),
            description: description.trim().to_string(),
            created_at: Utc::now(),
            last_post,
            comments: Vec::new(),
        })?;

        self.append_app_link(&app.id, AppLink::Devlog, &post.id)?;
        info!(post = %post.id, app = %app.id, last_post = %post.last_post, "created post");
        Ok(post)
    }

    pub fn add_comment(&mut self, token: &str, post_id: &str, content: &str) -> Result<Comment> {
        require("post id", post_id)?;
        require("content", content)?;

        let neighbor = self.resolve(token)?;
        let post = self
            .store
            .fetch::<Post>(post_id)?
            .ok_or_else(|| Error::NotFound(format!("Post not found: {}", post_id)))?;

        let comment = self.store.insert(&Comment {
            id: String::new(),
            content: content.trim().to_string(),
            post: vec![post.id.clone()],
            sent_from: vec![neighbor.id],
            created_at: Utc::now(),
        })?;

        let mut comments = post.comments;
        comments.push(comment.id.clone());
        self.store
            .patch_entity::<Post>(&post.id, patch("comments", &comments)?)?;
        Ok(comment)
    }

    /// An app's devlog, newest first.
    pub fn list_posts(&self, app_name: &str) -> Result<Vec<PostView>> {
        require("app name", app_name)?;
        let app = self.app_by_name(app_name)?;

        let mut posts = self
            .store
            .find_all::<Post>(&Formula::any_id(app.devlog.iter().cloned()))?;
        // Store order is creation order; reverse first so ties stay newest first
        posts.reverse();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        posts
            .into_iter()
            .map(|post| {
                let mut thread = self
                    .store
                    .find_all::<Comment>(&Formula::any_id(post.comments.iter().cloned()))?;
                thread.sort_by_key(|c| c.created_at);
                Ok(PostView {
                    post,
                    comment_thread: thread,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[test]
    fn test_first_post_uses_epoch_and_second_snapshots_first() {
        let mut ledger = test_utils::ledger();
        test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");

        let first = ledger
            .create_post(&ada.token, "Gizmo", "demo1", "booth1", "first")
            .unwrap();
        assert_eq!(first.last_post, devlog_epoch());
        assert_eq!(first.last_post.to_rfc3339(), "1970-01-01T00:00:00+00:00");

        let second = ledger
            .create_post(&ada.token, "Gizmo", "demo2", "booth2", "second")
            .unwrap();
        assert_eq!(second.last_post, first.created_at);
    }

    #[test]
    fn test_last_post_is_per_neighbor_and_frozen() {
        let mut ledger = test_utils::ledger();
        test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        let bob = test_utils::neighbor(&mut ledger, "bob@example.com");

        let first = ledger.create_post(&ada.token, "Gizmo", "d", "b", "ada 1").unwrap();
        let bobs = ledger.create_post(&bob.token, "Gizmo", "d", "b", "bob 1").unwrap();
        assert_eq!(bobs.last_post, devlog_epoch());

        let second = ledger.create_post(&ada.token, "Gizmo", "d", "b", "ada 2").unwrap();
        ledger
            .store_mut()
            .delete(crate::store::Collection::Posts, &first.id)
            .unwrap();
        let reread: Post = ledger.store().fetch(&second.id).unwrap().unwrap();
        assert_eq!(reread.last_post, first.created_at);
    }

    #[test]
    fn test_create_post_errors() {
        let mut ledger = test_utils::ledger();
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        assert!(matches!(
            ledger.create_post(&ada.token, "Gizmo", "", "b", "x"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.create_post(&ada.token, "Gizmo", "d", "b", "x"),
            Err(Error::AppNotFound(_))
        ));
    }

    #[test]
    fn test_comments_are_threaded_under_posts() {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        let bob = test_utils::neighbor(&mut ledger, "bob@example.com");

        let older = ledger.create_post(&ada.token, "Gizmo", "d", "b", "older").unwrap();
        let newer = ledger.create_post(&ada.token, "Gizmo", "d", "b", "newer").unwrap();
        let c1 = ledger.add_comment(&bob.token, &older.id, "nice").unwrap();
        let c2 = ledger.add_comment(&ada.token, &older.id, "thanks").unwrap();

        let views = ledger.list_posts("Gizmo").unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].post.id, newer.id);
        assert_eq!(views[1].post.comments, vec![c1.id.clone(), c2.id.clone()]);
        let thread: Vec<&str> = views[1].comment_thread.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(thread, vec!["nice", "thanks"]);
        assert_eq!(c1.sent_from, vec![bob.id]);

        let value = serde_json::to_value(&views[1]).unwrap();
        assert_eq!(value["commentThread"][0]["content"], "nice");
        assert_eq!(value["description"], "older");
        assert_eq!(ledger.app_by_id(&app.id).unwrap().devlog.len(), 2);
    }

    #[test]
    fn test_comment_on_missing_post() {
        let mut ledger = test_utils::ledger();
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        assert!(matches!(
            ledger.add_comment(&ada.token, "recMissing", "hi"),
            Err(Error::NotFound(_))
        ));
    }
}
