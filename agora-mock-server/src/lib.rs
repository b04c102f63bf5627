use std::{
    collections::{btree_map, BTreeMap},
    sync::Arc,
};

use agora_api::{
    Comment, CommentId, Community, CommunityId, Error, FilterSpec, NewComment, NewCommunity,
    NewPost, NewUser, Post, PostId, Store, Tally, Time, User, UserId, VoteDirection,
};
use agora_engine::{assemble, rank, CommentTree, VoteLedger};
use async_trait::async_trait;

mod fuzz;

/// In-memory stand-in for the surrounding forum system: it owns the record
/// maps, enforces the collaborator-side guards (membership, authorship,
/// validation) and hands the already-validated records to the engine.
pub struct MockServer {
    users: BTreeMap<UserId, Arc<User>>,
    communities: BTreeMap<CommunityId, Arc<Community>>,
    posts: BTreeMap<PostId, Arc<Post>>,
    comments: BTreeMap<CommentId, Arc<Comment>>,
    ledger: VoteLedger,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            communities: BTreeMap::new(),
            posts: BTreeMap::new(),
            comments: BTreeMap::new(),
            ledger: VoteLedger::new(),
        }
    }

    pub fn admin_create_user(&mut self, u: NewUser) -> Result<(), Error> {
        u.validate()?;
        if self.users.values().any(|user| user.name == u.name) {
            return Err(Error::NameAlreadyUsed(u.name));
        }
        match self.users.entry(u.id) {
            btree_map::Entry::Occupied(_) => Err(Error::UuidAlreadyUsed(u.id.0)),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Arc::new(User {
                    id: u.id,
                    name: u.name,
                }));
                Ok(())
            }
        }
    }

    pub fn create_community(&mut self, c: NewCommunity) -> Result<(), Error> {
        c.validate()?;
        if !self.users.contains_key(&c.creator_id) {
            return Err(Error::PermissionDenied);
        }
        if self.communities.values().any(|com| com.name == c.name) {
            return Err(Error::NameAlreadyUsed(c.name));
        }
        match self.communities.entry(c.id) {
            btree_map::Entry::Occupied(_) => Err(Error::UuidAlreadyUsed(c.id.0)),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Arc::new(Community::from(c)));
                Ok(())
            }
        }
    }

    pub fn join_community(&mut self, user: UserId, community: CommunityId) -> Result<(), Error> {
        if !self.users.contains_key(&user) {
            return Err(Error::PermissionDenied);
        }
        let community = self
            .communities
            .get_mut(&community)
            .ok_or(Error::EntityNotFound(community.0))?;
        Arc::make_mut(community).members.insert(user);
        Ok(())
    }

    /// Creates a post; the author must already be a member of the target
    /// community
    pub fn submit_post(&mut self, p: NewPost) -> Result<(), Error> {
        p.validate()?;
        if !self.users.contains_key(&p.author_id) {
            return Err(Error::PermissionDenied);
        }
        let community = self
            .communities
            .get(&p.community_id)
            .ok_or(Error::EntityNotFound(p.community_id.0))?;
        if !community.is_member(&p.author_id) {
            return Err(Error::PermissionDenied);
        }
        match self.posts.entry(p.id) {
            btree_map::Entry::Occupied(_) => Err(Error::UuidAlreadyUsed(p.id.0)),
            btree_map::Entry::Vacant(entry) => {
                let post = Post::from(p);
                self.ledger.track(&post);
                entry.insert(Arc::new(post));
                Ok(())
            }
        }
    }

    /// Hard-deletes a post and cascades over its thread; only the author
    /// may do this
    pub fn delete_post(&mut self, actor: UserId, id: PostId) -> Result<(), Error> {
        let post = self.posts.get(&id).ok_or(Error::EntityNotFound(id.0))?;
        if post.author_id != actor {
            return Err(Error::PermissionDenied);
        }
        self.posts.remove(&id);
        self.ledger.forget(id.0);
        let dead: Vec<CommentId> = self
            .comments
            .values()
            .filter(|c| c.post_id == id)
            .map(|c| c.id)
            .collect();
        for c in dead {
            self.comments.remove(&c);
            self.ledger.forget(c.0);
        }
        Ok(())
    }

    /// Creates a reply; the post must exist and a referenced parent comment
    /// must exist too (tombstoned parents are fine)
    pub async fn submit_comment(&mut self, c: NewComment) -> Result<(), Error> {
        c.validate()?;
        if !self.users.contains_key(&c.author_id) {
            return Err(Error::PermissionDenied);
        }
        c.check_target(&mut *self).await?;
        let (post_id, comment_id) = (c.post_id, c.id);
        match self.comments.entry(comment_id) {
            btree_map::Entry::Occupied(_) => return Err(Error::UuidAlreadyUsed(comment_id.0)),
            btree_map::Entry::Vacant(entry) => {
                let comment = Comment::from(c);
                self.ledger.track(&comment);
                entry.insert(Arc::new(comment));
            }
        }
        // record the comment on its post, in creation order
        let post = self
            .posts
            .get_mut(&post_id)
            .ok_or(Error::EntityNotFound(post_id.0))?;
        Arc::make_mut(post).comments.push(comment_id);
        Ok(())
    }

    /// Soft-deletes a comment: the content becomes the tombstone marker,
    /// replies below it stay reachable, and further votes are rejected
    pub fn delete_comment(&mut self, actor: UserId, id: CommentId) -> Result<(), Error> {
        let comment = self
            .comments
            .get_mut(&id)
            .ok_or(Error::EntityNotFound(id.0))?;
        if comment.author_id != actor {
            return Err(Error::PermissionDenied);
        }
        Arc::make_mut(comment).tombstone();
        self.ledger.set_deleted(id.0, true)
    }

    pub fn vote_post(
        &mut self,
        voter: UserId,
        post: PostId,
        direction: VoteDirection,
    ) -> Result<Tally, Error> {
        if !self.users.contains_key(&voter) {
            return Err(Error::PermissionDenied);
        }
        if !self.posts.contains_key(&post) {
            return Err(Error::EntityNotFound(post.0));
        }
        let tally = self.ledger.apply_vote(post.0, voter, direction)?;
        self.persist_post_votes(post);
        Ok(tally)
    }

    pub fn vote_comment(
        &mut self,
        voter: UserId,
        comment: CommentId,
        direction: VoteDirection,
    ) -> Result<Tally, Error> {
        if !self.users.contains_key(&voter) {
            return Err(Error::PermissionDenied);
        }
        if !self.comments.contains_key(&comment) {
            return Err(Error::EntityNotFound(comment.0));
        }
        let tally = self.ledger.apply_vote(comment.0, voter, direction)?;
        self.persist_comment_votes(comment);
        Ok(tally)
    }

    /// Rebuilds the reply forest of one post
    pub async fn thread(&mut self, post: PostId) -> Result<CommentTree, Error> {
        if !self.posts.contains_key(&post) {
            return Err(Error::EntityNotFound(post.0));
        }
        let flat = self.comments_for(post).await.map_err(Error::storage)?;
        assemble(post, flat)
    }

    /// Ranks the post pool for a listing surface
    pub fn feed(&mut self, spec: &FilterSpec, now: Time) -> Vec<Arc<Post>> {
        let ids: Vec<PostId> = self.posts.keys().copied().collect();
        for id in ids {
            self.persist_post_votes(id);
        }
        rank(self.posts.values().cloned().collect(), spec, now)
    }

    pub fn fetch_users(&self) -> Vec<Arc<User>> {
        self.users.values().cloned().collect()
    }

    fn persist_post_votes(&mut self, id: PostId) {
        if let (Some(post), Ok(votes)) = (self.posts.get_mut(&id), self.ledger.snapshot(id.0)) {
            if post.votes != votes {
                Arc::make_mut(post).votes = votes;
            }
        }
    }

    fn persist_comment_votes(&mut self, id: CommentId) {
        if let (Some(comment), Ok(votes)) =
            (self.comments.get_mut(&id), self.ledger.snapshot(id.0))
        {
            if comment.votes != votes {
                Arc::make_mut(comment).votes = votes;
            }
        }
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[async_trait]
impl Store for MockServer {
    async fn fetch_post(&mut self, p: PostId) -> anyhow::Result<Option<Post>> {
        Ok(self.posts.get(&p).map(|p| (**p).clone()))
    }

    async fn fetch_comment(&mut self, c: CommentId) -> anyhow::Result<Option<Comment>> {
        Ok(self.comments.get(&c).map(|c| (**c).clone()))
    }

    async fn comments_for(&mut self, p: PostId) -> anyhow::Result<Vec<Comment>> {
        let ids: Vec<CommentId> = self
            .comments
            .values()
            .filter(|c| c.post_id == p)
            .map(|c| c.id)
            .collect();
        for id in &ids {
            self.persist_comment_votes(*id);
        }
        Ok(ids
            .iter()
            .map(|id| (*self.comments[id]).clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_api::{SortMode, TimeWindow, Uuid, TOMBSTONE};
    use chrono::TimeZone;

    fn uid(n: u128) -> UserId {
        UserId(Uuid::from_u128(n))
    }

    fn at(hour: u32, minute: u32) -> Time {
        chrono::Utc
            .with_ymd_and_hms(2024, 3, 1, hour, minute, 0)
            .unwrap()
    }

    struct Forum {
        server: MockServer,
        alice: UserId,
        bob: UserId,
        community: CommunityId,
        post: PostId,
    }

    // one community, one post by alice, bob joined as second member
    fn seeded_forum() -> Forum {
        let mut server = MockServer::new();
        let (alice, bob) = (uid(1), uid(2));
        let community = CommunityId(Uuid::from_u128(0xc0));
        let post = PostId(Uuid::from_u128(0xb10c));
        server
            .admin_create_user(NewUser {
                id: alice,
                name: String::from("alice"),
            })
            .unwrap();
        server
            .admin_create_user(NewUser {
                id: bob,
                name: String::from("bob"),
            })
            .unwrap();
        server
            .create_community(NewCommunity {
                id: community,
                name: String::from("rustaceans"),
                creator_id: alice,
            })
            .unwrap();
        server.join_community(bob, community).unwrap();
        server
            .submit_post(NewPost {
                id: post,
                community_id: community,
                author_id: alice,
                date: at(8, 0),
                title: String::from("Hello world"),
                body: String::from("first"),
                image: None,
            })
            .unwrap();
        Forum {
            server,
            alice,
            bob,
            community,
            post,
        }
    }

    fn reply(f: &Forum, id: u128, parent: Option<u128>, minute: u32) -> NewComment {
        NewComment {
            id: CommentId(Uuid::from_u128(id)),
            post_id: f.post,
            author_id: f.bob,
            parent_id: parent.map(|p| CommentId(Uuid::from_u128(p))),
            date: at(9, minute),
            content: format!("comment {id}"),
        }
    }

    #[tokio::test]
    async fn posting_requires_membership() {
        let mut f = seeded_forum();
        let carol = uid(3);
        f.server
            .admin_create_user(NewUser {
                id: carol,
                name: String::from("carol"),
            })
            .unwrap();
        let p = NewPost {
            id: PostId(Uuid::from_u128(0xb10d)),
            community_id: f.community,
            author_id: carol,
            date: at(10, 0),
            title: String::from("Sneaking in"),
            body: String::from("body"),
            image: None,
        };
        assert_eq!(f.server.submit_post(p.clone()), Err(Error::PermissionDenied));
        f.server.join_community(carol, f.community).unwrap();
        assert_eq!(f.server.submit_post(p), Ok(()));
    }

    #[tokio::test]
    async fn replying_to_a_missing_parent_is_rejected() {
        let mut f = seeded_forum();
        let c = reply(&f, 1, Some(99), 0);
        assert_eq!(
            f.server.submit_comment(c).await,
            Err(Error::EntityNotFound(Uuid::from_u128(99)))
        );
    }

    #[tokio::test]
    async fn deleted_parents_still_take_replies() {
        let mut f = seeded_forum();
        f.server.submit_comment(reply(&f, 1, None, 0)).await.unwrap();
        f.server
            .delete_comment(f.bob, CommentId(Uuid::from_u128(1)))
            .unwrap();
        f.server
            .submit_comment(reply(&f, 2, Some(1), 1))
            .await
            .unwrap();

        let tree = f.server.thread(f.post).await.unwrap();
        let nested = tree.to_nested();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].comment.content, TOMBSTONE);
        assert!(nested[0].comment.is_deleted);
        assert_eq!(nested[0].children.len(), 1);
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let mut f = seeded_forum();
        f.server.submit_comment(reply(&f, 1, None, 0)).await.unwrap();
        assert_eq!(
            f.server.delete_comment(f.alice, CommentId(Uuid::from_u128(1))),
            Err(Error::PermissionDenied)
        );
        assert_eq!(f.server.delete_post(f.bob, f.post), Err(Error::PermissionDenied));
    }

    #[tokio::test]
    async fn voting_round_trips_through_the_ledger() {
        let mut f = seeded_forum();
        let up = f
            .server
            .vote_post(f.bob, f.post, VoteDirection::Up)
            .unwrap();
        assert_eq!(
            up,
            Tally {
                up_count: 1,
                down_count: 0
            }
        );
        // the persisted record reflects the vote
        let post = f.server.fetch_post(f.post).await.unwrap().unwrap();
        assert!(post.votes.up_voters.contains(&f.bob));

        // up then down leaves only the down vote
        let down = f
            .server
            .vote_post(f.bob, f.post, VoteDirection::Down)
            .unwrap();
        assert_eq!(
            down,
            Tally {
                up_count: 0,
                down_count: 1
            }
        );
        let post = f.server.fetch_post(f.post).await.unwrap().unwrap();
        assert!(post.votes.up_voters.is_empty());
        assert!(post.votes.down_voters.contains(&f.bob));
    }

    #[tokio::test]
    async fn votes_on_tombstoned_comments_are_rejected() {
        let mut f = seeded_forum();
        f.server.submit_comment(reply(&f, 1, None, 0)).await.unwrap();
        let c = CommentId(Uuid::from_u128(1));
        f.server.vote_comment(f.alice, c, VoteDirection::Up).unwrap();
        f.server.delete_comment(f.bob, c).unwrap();
        assert_eq!(
            f.server.vote_comment(f.alice, c, VoteDirection::Down),
            Err(Error::VotingOnDeletedEntity(c.0))
        );
        // the earlier tally survives the deletion
        let comment = f.server.fetch_comment(c).await.unwrap().unwrap();
        assert_eq!(
            comment.votes.tally(),
            Tally {
                up_count: 1,
                down_count: 0
            }
        );
    }

    #[tokio::test]
    async fn unknown_voters_are_rejected() {
        let mut f = seeded_forum();
        assert_eq!(
            f.server.vote_post(uid(99), f.post, VoteDirection::Up),
            Err(Error::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn the_feed_ranks_discussion_over_votes() {
        let mut f = seeded_forum();
        let second = PostId(Uuid::from_u128(0xb10e));
        f.server
            .submit_post(NewPost {
                id: second,
                community_id: f.community,
                author_id: f.bob,
                date: at(7, 0),
                title: String::from("Older but busier"),
                body: String::from("body"),
                image: None,
            })
            .unwrap();
        // first post gets the votes, second one the discussion
        f.server.vote_post(f.alice, f.post, VoteDirection::Up).unwrap();
        f.server.vote_post(f.bob, f.post, VoteDirection::Up).unwrap();
        for (i, minute) in (1..=3).zip(0..) {
            let mut c = reply(&f, i, None, minute);
            c.post_id = second;
            f.server.submit_comment(c).await.unwrap();
        }

        let hot = FilterSpec {
            window: TimeWindow::All,
            sort: SortMode::Hot,
            ..FilterSpec::default()
        };
        let ids: Vec<PostId> = f
            .server
            .feed(&hot, at(12, 0))
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![second, f.post]);

        let top = FilterSpec {
            sort: SortMode::Top,
            ..hot
        };
        let ids: Vec<PostId> = f
            .server
            .feed(&top, at(12, 0))
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![f.post, second]);
    }

    #[tokio::test]
    async fn deleting_a_post_cascades_over_its_thread() {
        let mut f = seeded_forum();
        f.server.submit_comment(reply(&f, 1, None, 0)).await.unwrap();
        f.server.delete_post(f.alice, f.post).unwrap();
        assert_eq!(
            f.server.thread(f.post).await,
            Err(Error::EntityNotFound(f.post.0))
        );
        assert_eq!(
            f.server
                .vote_comment(f.bob, CommentId(Uuid::from_u128(1)), VoteDirection::Up),
            Err(Error::EntityNotFound(Uuid::from_u128(1)))
        );
        assert!(f.server.feed(&FilterSpec::default(), at(12, 0)).is_empty());
    }
}
