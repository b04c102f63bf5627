use std::collections::HashSet;

use uuid::Uuid;

use crate::{Error, UserId, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommunityId(pub Uuid);

impl CommunityId {
    pub fn stub() -> CommunityId {
        CommunityId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,

    /// Users allowed to post here; the creator is a member from the start
    pub members: HashSet<UserId>,
}

impl Community {
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewCommunity {
    pub id: CommunityId,
    pub name: String,
    pub creator_id: UserId,
}

impl NewCommunity {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_text(&self.name, 3, 100)
    }
}

impl From<NewCommunity> for Community {
    fn from(c: NewCommunity) -> Community {
        let mut members = HashSet::new();
        members.insert(c.creator_id);
        Community {
            id: c.id,
            name: c.name,
            members,
        }
    }
}
