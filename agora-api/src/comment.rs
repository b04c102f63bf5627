use uuid::Uuid;

use crate::{Error, PostId, Store, Time, UserId, Votable, VoteSets, STUB_UUID};

pub const CONTENT_MAX_LEN: usize = 500;

/// Fixed marker shown in place of a soft-deleted comment's content
pub const TOMBSTONE: &str = "This comment has been deleted";

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,

    /// None for a top-level comment; fixed at creation, never repointed
    pub parent_id: Option<CommentId>,

    pub content: String,
    pub created_at: Time,

    /// Soft-deletion flag; a deleted comment keeps its place in the thread
    /// so replies below it stay reachable
    pub is_deleted: bool,

    pub votes: VoteSets,
}

impl Comment {
    /// Soft-deletes: the content is replaced by the tombstone marker, the
    /// record itself stays
    pub fn tombstone(&mut self) {
        self.is_deleted = true;
        self.content = String::from(TOMBSTONE);
    }
}

impl Votable for Comment {
    fn vote_key(&self) -> Uuid {
        self.id.0
    }

    fn vote_sets(&self) -> &VoteSets {
        &self.votes
    }

    fn is_tombstoned(&self) -> bool {
        self.is_deleted
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub parent_id: Option<CommentId>,
    pub date: Time,

    pub content: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_time(&self.date)?;
        crate::validate_text(&self.content, 1, CONTENT_MAX_LEN)
    }

    /// Checks that the post and the optional parent comment exist.
    ///
    /// A tombstoned parent is still a valid reply target, deletion only
    /// hides content.
    pub async fn check_target<S: Store>(&self, store: &mut S) -> Result<(), Error> {
        if store
            .fetch_post(self.post_id)
            .await
            .map_err(Error::storage)?
            .is_none()
        {
            return Err(Error::EntityNotFound(self.post_id.0));
        }
        if let Some(parent) = self.parent_id {
            if parent == self.id {
                return Err(Error::MalformedThread(self.id.0));
            }
            if store
                .fetch_comment(parent)
                .await
                .map_err(Error::storage)?
                .is_none()
            {
                return Err(Error::EntityNotFound(parent.0));
            }
        }
        Ok(())
    }
}

impl From<NewComment> for Comment {
    fn from(c: NewComment) -> Comment {
        Comment {
            id: c.id,
            post_id: c.post_id,
            author_id: c.author_id,
            parent_id: c.parent_id,
            content: c.content,
            created_at: c.date,
            is_deleted: false,
            votes: VoteSets::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_comment(content: &str) -> NewComment {
        NewComment {
            id: CommentId::stub(),
            post_id: PostId::stub(),
            author_id: UserId::stub(),
            parent_id: None,
            date: chrono::Utc::now(),
            content: String::from(content),
        }
    }

    #[test]
    fn content_bounds_are_enforced() {
        assert_eq!(new_comment("hi").validate(), Ok(()));
        assert!(new_comment("").validate().is_err());
        assert!(new_comment(&"x".repeat(501)).validate().is_err());
    }

    #[test]
    fn tombstoning_replaces_content_and_keeps_the_record() {
        let mut c = Comment::from(new_comment("a hot take"));
        c.tombstone();
        assert!(c.is_deleted);
        assert_eq!(c.content, TOMBSTONE);
        assert_eq!(c.id, CommentId::stub());
    }
}
