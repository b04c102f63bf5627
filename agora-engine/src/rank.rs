use std::{cmp::Reverse, sync::Arc};

use crate::api::{FilterSpec, Post, SortMode, Time};

/// Scoring knobs for the hot ordering.
///
/// The double weight on comments is a product choice (active discussions
/// beat passively-upvoted posts), not a law; collaborators that want a
/// different balance pass their own weights to `rank_with`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RankWeights {
    pub comment_weight: i64,
}

impl Default for RankWeights {
    fn default() -> RankWeights {
        RankWeights { comment_weight: 2 }
    }
}

pub fn vote_score(post: &Post) -> i64 {
    post.votes.score()
}

pub fn engagement_score(post: &Post, weights: &RankWeights) -> i64 {
    post.votes.tally().up_count as i64 + weights.comment_weight * post.comments.len() as i64
}

/// Orders a pool of posts for a listing surface: scope filters, then the
/// time window ending at `now`, then the requested sort.
///
/// Ties in every mode fall back to newest-first and then id, so the
/// ordering is total and two calls over the same pool agree. An empty
/// result is a valid outcome, not an error.
pub fn rank(posts: Vec<Arc<Post>>, spec: &FilterSpec, now: Time) -> Vec<Arc<Post>> {
    rank_with(posts, spec, now, &RankWeights::default())
}

pub fn rank_with(
    mut posts: Vec<Arc<Post>>,
    spec: &FilterSpec,
    now: Time,
    weights: &RankWeights,
) -> Vec<Arc<Post>> {
    if let Some(community) = spec.community {
        posts.retain(|p| p.community_id == community);
    }
    if let Some(author) = spec.author {
        posts.retain(|p| p.author_id == author);
    }
    if let Some(start) = spec.window_start(now) {
        // the window is boundary-inclusive
        posts.retain(|p| p.created_at >= start);
    }
    match spec.sort {
        SortMode::New => posts.sort_unstable_by_key(|p| (Reverse(p.created_at), p.id)),
        SortMode::Top => {
            posts.sort_unstable_by_key(|p| (Reverse(vote_score(p)), Reverse(p.created_at), p.id))
        }
        SortMode::Hot => posts.sort_unstable_by_key(|p| {
            (
                Reverse(engagement_score(p, weights)),
                Reverse(p.created_at),
                p.id,
            )
        }),
    }
    posts
}
