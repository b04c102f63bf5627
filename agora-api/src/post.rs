use uuid::Uuid;

use crate::{CommentId, CommunityId, Error, Time, UserId, Votable, VoteSets, STUB_UUID};

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 100;
pub const BODY_MAX_LEN: usize = 5000;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn stub() -> PostId {
        PostId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub community_id: CommunityId,
    pub author_id: UserId,
    pub created_at: Time,

    pub title: String,
    pub body: String,
    pub image: Option<String>,

    pub votes: VoteSets,

    /// Comment ids in creation order; the count feeds ranking, the thread
    /// itself is rebuilt from the comments' parent references
    pub comments: Vec<CommentId>,
}

impl Votable for Post {
    fn vote_key(&self) -> Uuid {
        self.id.0
    }

    fn vote_sets(&self) -> &VoteSets {
        &self.votes
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    pub id: PostId,
    pub community_id: CommunityId,
    pub author_id: UserId,
    pub date: Time,

    pub title: String,
    pub body: String,
    pub image: Option<String>,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_time(&self.date)?;
        crate::validate_text(&self.title, TITLE_MIN_LEN, TITLE_MAX_LEN)?;
        crate::validate_text(&self.body, 1, BODY_MAX_LEN)?;
        if let Some(image) = &self.image {
            crate::validate_string(image)?;
        }
        Ok(())
    }
}

impl From<NewPost> for Post {
    fn from(p: NewPost) -> Post {
        Post {
            id: p.id,
            community_id: p.community_id,
            author_id: p.author_id,
            created_at: p.date,
            title: p.title,
            body: p.body,
            image: p.image,
            votes: VoteSets::new(),
            comments: Vec::new(),
        }
    }
}
