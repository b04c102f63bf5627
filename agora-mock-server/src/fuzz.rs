#![cfg(test)]

use std::{
    cmp,
    collections::{HashMap, HashSet},
    ops::RangeTo,
    panic::AssertUnwindSafe,
};

use agora_api::{
    CommentId, CommunityId, Error, FilterSpec, NewComment, NewCommunity, NewPost, NewUser, PostId,
    Store, Tally, Time, UserId, Uuid, VoteDirection,
};
use async_recursion::async_recursion;
use chrono::TimeZone;

use crate::MockServer;

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    CreateUser,
    CreateCommunity {
        creator: usize,
    },
    JoinCommunity {
        user: usize,
        community: usize,
    },
    SubmitPost {
        author: usize,
        community: usize,
    },
    DeletePost {
        actor: usize,
        post: usize,
    },
    Reply {
        author: usize,
        post: usize,
        parent: Option<usize>,
    },
    DeleteComment {
        actor: usize,
        comment: usize,
    },
    VotePost {
        voter: usize,
        post: usize,
        up: bool,
    },
    VoteComment {
        voter: usize,
        comment: usize,
        up: bool,
    },
    Thread {
        post: usize,
    },
    Feed {
        window: usize,
        sort: usize,
    },
}

/// Replays generated operations against the server while keeping a naive
/// model of what the vote sets and thread memberships must look like.
struct Fuzzer {
    server: MockServer,
    users: Vec<UserId>,
    communities: Vec<CommunityId>,
    // these keep stale ids around on purpose, so later operations also hit
    // the deleted-entity paths
    posts: Vec<PostId>,
    comments: Vec<CommentId>,

    post_author: HashMap<PostId, UserId>,
    comment_meta: HashMap<CommentId, (PostId, UserId)>,
    tombstoned: HashSet<CommentId>,
    votes: HashMap<Uuid, HashMap<UserId, VoteDirection>>,

    next_id: u128,
    clock: Time,
}

impl Fuzzer {
    fn new() -> Fuzzer {
        Fuzzer {
            server: MockServer::new(),
            users: Vec::new(),
            communities: Vec::new(),
            posts: Vec::new(),
            comments: Vec::new(),
            post_author: HashMap::new(),
            comment_meta: HashMap::new(),
            tombstoned: HashSet::new(),
            votes: HashMap::new(),
            next_id: 0,
            clock: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn fresh_uuid(&mut self) -> Uuid {
        self.next_id += 1;
        Uuid::from_u128(self.next_id)
    }

    fn tick(&mut self) -> Time {
        self.clock = self.clock + chrono::Duration::minutes(1);
        self.clock
    }

    fn model_tally(&self, key: Uuid) -> Tally {
        let entry = self.votes.get(&key);
        let up = entry
            .map(|e| e.values().filter(|d| **d == VoteDirection::Up).count())
            .unwrap_or(0);
        let down = entry.map(|e| e.len()).unwrap_or(0) - up;
        Tally {
            up_count: up,
            down_count: down,
        }
    }

    fn model_apply(&mut self, key: Uuid, voter: UserId, direction: VoteDirection) -> Tally {
        let entry = self.votes.entry(key).or_default();
        match entry.remove(&voter) {
            Some(held) if held == direction => (),
            _ => {
                entry.insert(voter, direction);
            }
        }
        self.model_tally(key)
    }

    #[async_recursion]
    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::CreateUser => {
                let id = UserId(self.fresh_uuid());
                let name = format!("user-{}", self.users.len());
                self.server
                    .admin_create_user(NewUser { id, name })
                    .expect("creating user");
                self.users.push(id);
            }
            FuzzOp::CreateCommunity { creator } => {
                match resize_int(creator, ..self.users.len()) {
                    None => {
                        self.execute_fuzz_op(FuzzOp::CreateUser).await;
                        self.execute_fuzz_op(FuzzOp::CreateCommunity { creator }).await;
                    }
                    Some(creator) => {
                        let id = CommunityId(self.fresh_uuid());
                        let name = format!("community-{}", self.communities.len());
                        self.server
                            .create_community(NewCommunity {
                                id,
                                name,
                                creator_id: self.users[creator],
                            })
                            .expect("creating community");
                        self.communities.push(id);
                    }
                }
            }
            FuzzOp::JoinCommunity { user, community } => {
                match (
                    resize_int(user, ..self.users.len()),
                    resize_int(community, ..self.communities.len()),
                ) {
                    (None, _) => {
                        self.execute_fuzz_op(FuzzOp::CreateUser).await;
                        self.execute_fuzz_op(FuzzOp::JoinCommunity { user, community })
                            .await;
                    }
                    (_, None) => {
                        self.execute_fuzz_op(FuzzOp::CreateCommunity { creator: user })
                            .await;
                        self.execute_fuzz_op(FuzzOp::JoinCommunity { user, community })
                            .await;
                    }
                    (Some(user), Some(community)) => {
                        self.server
                            .join_community(self.users[user], self.communities[community])
                            .expect("joining community");
                    }
                }
            }
            FuzzOp::SubmitPost { author, community } => {
                match (
                    resize_int(author, ..self.users.len()),
                    resize_int(community, ..self.communities.len()),
                ) {
                    (None, _) => {
                        self.execute_fuzz_op(FuzzOp::CreateUser).await;
                        self.execute_fuzz_op(FuzzOp::SubmitPost { author, community })
                            .await;
                    }
                    (_, None) => {
                        self.execute_fuzz_op(FuzzOp::CreateCommunity { creator: author })
                            .await;
                        self.execute_fuzz_op(FuzzOp::SubmitPost { author, community })
                            .await;
                    }
                    (Some(author), Some(community)) => {
                        let author = self.users[author];
                        let community = self.communities[community];
                        self.server
                            .join_community(author, community)
                            .expect("joining community before posting");
                        let id = PostId(self.fresh_uuid());
                        let date = self.tick();
                        self.server
                            .submit_post(NewPost {
                                id,
                                community_id: community,
                                author_id: author,
                                date,
                                title: format!("post {}", self.posts.len()),
                                body: String::from("body"),
                                image: None,
                            })
                            .expect("submitting post");
                        self.posts.push(id);
                        self.post_author.insert(id, author);
                    }
                }
            }
            FuzzOp::DeletePost { actor, post } => {
                match (
                    resize_int(actor, ..self.users.len()),
                    resize_int(post, ..self.posts.len()),
                ) {
                    (Some(actor), Some(post)) => {
                        let actor = self.users[actor];
                        let post = self.posts[post];
                        let res = self.server.delete_post(actor, post);
                        match self.post_author.get(&post) {
                            None => assert_eq!(res, Err(Error::EntityNotFound(post.0))),
                            Some(author) if *author != actor => {
                                assert_eq!(res, Err(Error::PermissionDenied))
                            }
                            Some(_) => {
                                assert_eq!(res, Ok(()));
                                self.post_author.remove(&post);
                                self.votes.remove(&post.0);
                                let cascaded: Vec<CommentId> = self
                                    .comment_meta
                                    .iter()
                                    .filter(|(_, (p, _))| *p == post)
                                    .map(|(c, _)| *c)
                                    .collect();
                                for c in cascaded {
                                    self.comment_meta.remove(&c);
                                    self.votes.remove(&c.0);
                                }
                            }
                        }
                    }
                    _ => (),
                }
            }
            FuzzOp::Reply {
                author,
                post,
                parent,
            } => {
                match (
                    resize_int(author, ..self.users.len()),
                    resize_int(post, ..self.posts.len()),
                ) {
                    (None, _) => {
                        self.execute_fuzz_op(FuzzOp::CreateUser).await;
                        self.execute_fuzz_op(FuzzOp::Reply {
                            author,
                            post,
                            parent,
                        })
                        .await;
                    }
                    (_, None) => {
                        self.execute_fuzz_op(FuzzOp::SubmitPost {
                            author,
                            community: post,
                        })
                        .await;
                        self.execute_fuzz_op(FuzzOp::Reply {
                            author,
                            post,
                            parent,
                        })
                        .await;
                    }
                    (Some(author), Some(post)) => {
                        let author = self.users[author];
                        let post = self.posts[post];
                        let parent = parent
                            .and_then(|p| resize_int(p, ..self.comments.len()))
                            .map(|p| self.comments[p]);
                        let id = CommentId(self.fresh_uuid());
                        let date = self.tick();
                        let res = self
                            .server
                            .submit_comment(NewComment {
                                id,
                                post_id: post,
                                author_id: author,
                                parent_id: parent,
                                date,
                                content: format!("comment {}", self.comments.len()),
                            })
                            .await;
                        let post_alive = self.post_author.contains_key(&post);
                        let parent_alive = parent
                            .map(|p| self.comment_meta.contains_key(&p))
                            .unwrap_or(true);
                        if post_alive && parent_alive {
                            assert_eq!(res, Ok(()));
                            self.comments.push(id);
                            self.comment_meta.insert(id, (post, author));
                        } else {
                            assert!(
                                matches!(res, Err(Error::EntityNotFound(_))),
                                "replying to dead target returned {res:?}"
                            );
                        }
                    }
                }
            }
            FuzzOp::DeleteComment { actor, comment } => {
                match (
                    resize_int(actor, ..self.users.len()),
                    resize_int(comment, ..self.comments.len()),
                ) {
                    (Some(actor), Some(comment)) => {
                        let actor = self.users[actor];
                        let comment = self.comments[comment];
                        let res = self.server.delete_comment(actor, comment);
                        match self.comment_meta.get(&comment) {
                            None => assert_eq!(res, Err(Error::EntityNotFound(comment.0))),
                            Some((_, author)) if *author != actor => {
                                assert_eq!(res, Err(Error::PermissionDenied))
                            }
                            Some(_) => {
                                assert_eq!(res, Ok(()));
                                self.tombstoned.insert(comment);
                            }
                        }
                    }
                    _ => (),
                }
            }
            FuzzOp::VotePost { voter, post, up } => {
                match (
                    resize_int(voter, ..self.users.len()),
                    resize_int(post, ..self.posts.len()),
                ) {
                    (Some(voter), Some(post)) => {
                        let voter = self.users[voter];
                        let post = self.posts[post];
                        let direction = match up {
                            true => VoteDirection::Up,
                            false => VoteDirection::Down,
                        };
                        let res = self.server.vote_post(voter, post, direction);
                        if self.post_author.contains_key(&post) {
                            let expected = self.model_apply(post.0, voter, direction);
                            assert_eq!(res, Ok(expected));
                        } else {
                            assert_eq!(res, Err(Error::EntityNotFound(post.0)));
                        }
                    }
                    _ => (),
                }
            }
            FuzzOp::VoteComment { voter, comment, up } => {
                match (
                    resize_int(voter, ..self.users.len()),
                    resize_int(comment, ..self.comments.len()),
                ) {
                    (Some(voter), Some(comment)) => {
                        let voter = self.users[voter];
                        let comment = self.comments[comment];
                        let direction = match up {
                            true => VoteDirection::Up,
                            false => VoteDirection::Down,
                        };
                        let res = self.server.vote_comment(voter, comment, direction);
                        if !self.comment_meta.contains_key(&comment) {
                            assert_eq!(res, Err(Error::EntityNotFound(comment.0)));
                        } else if self.tombstoned.contains(&comment) {
                            // rejected with no state change
                            assert_eq!(res, Err(Error::VotingOnDeletedEntity(comment.0)));
                            let stored = self
                                .server
                                .fetch_comment(comment)
                                .await
                                .expect("fetching comment")
                                .expect("comment is alive in the model");
                            assert_eq!(stored.votes.tally(), self.model_tally(comment.0));
                        } else {
                            let expected = self.model_apply(comment.0, voter, direction);
                            assert_eq!(res, Ok(expected));
                        }
                    }
                    _ => (),
                }
            }
            FuzzOp::Thread { post } => {
                if let Some(post) = resize_int(post, ..self.posts.len()) {
                    let post = self.posts[post];
                    let res = self.server.thread(post).await;
                    if self.post_author.contains_key(&post) {
                        let tree = res.expect("assembling thread");
                        let expected = self
                            .comment_meta
                            .values()
                            .filter(|(p, _)| *p == post)
                            .count();
                        assert_eq!(tree.len(), expected);
                        let mut seen = HashSet::new();
                        for c in tree.iter() {
                            assert!(seen.insert(c.id), "comment visited twice");
                            assert_eq!(c.is_deleted, self.tombstoned.contains(&c.id));
                        }
                    } else {
                        assert_eq!(res, Err(Error::EntityNotFound(post.0)));
                    }
                }
            }
            FuzzOp::Feed { window, sort } => {
                let window = ["today", "week", "month", "all"][window % 4];
                let sort = ["hot", "new", "top"][sort % 3];
                let spec = FilterSpec::from_params(Some(window), Some(sort), None, None)
                    .expect("recognized filter tokens");
                let now = self.clock;
                let once: Vec<PostId> =
                    self.server.feed(&spec, now).iter().map(|p| p.id).collect();
                let twice: Vec<PostId> =
                    self.server.feed(&spec, now).iter().map(|p| p.id).collect();
                assert_eq!(once, twice, "feed ordering must be repeatable");
                if let Some(start) = spec.window_start(now) {
                    for p in self.server.feed(&spec, now) {
                        assert!(p.created_at >= start);
                    }
                }
            }
        }
    }

    async fn check_final_invariants(&mut self) {
        let posts: Vec<PostId> = self.post_author.keys().copied().collect();
        for p in posts {
            let post = self
                .server
                .fetch_post(p)
                .await
                .expect("fetching post")
                .expect("post is alive in the model");
            assert!(post.votes.is_disjoint());
            assert_eq!(post.votes.tally(), self.model_tally(p.0));
        }
        let comments: Vec<CommentId> = self.comment_meta.keys().copied().collect();
        for c in comments {
            let comment = self
                .server
                .fetch_comment(c)
                .await
                .expect("fetching comment")
                .expect("comment is alive in the model");
            assert!(comment.votes.is_disjoint());
            assert_eq!(comment.votes.tally(), self.model_tally(c.0));
        }
    }
}

do_tokio_test!(fuzz_forum_ops, Vec<FuzzOp>, |ops: Vec<FuzzOp>| async move {
    let mut fuzzer = Fuzzer::new();
    for op in ops {
        fuzzer.execute_fuzz_op(op).await;
    }
    fuzzer.check_final_invariants().await;
});
