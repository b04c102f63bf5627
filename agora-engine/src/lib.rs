mod ledger;
pub use ledger::VoteLedger;

mod rank;
pub use rank::{engagement_score, rank, rank_with, vote_score, RankWeights};

mod thread;
pub use thread::{assemble, CommentNode, CommentTree, DepthFirst};

pub mod api {
    pub use agora_api::*;
}
