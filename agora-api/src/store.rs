use async_trait::async_trait;

use crate::{Comment, CommentId, Post, PostId};

/// Record storage owned by the surrounding system; the engine only ever
/// reads already-validated records through it
#[async_trait]
pub trait Store {
    async fn fetch_post(&mut self, p: PostId) -> anyhow::Result<Option<Post>>;
    async fn fetch_comment(&mut self, c: CommentId) -> anyhow::Result<Option<Comment>>;

    /// All comments of one post, in no particular order
    async fn comments_for(&mut self, p: PostId) -> anyhow::Result<Vec<Comment>>;
}
