use std::collections::HashMap;

use crate::api::{Comment, Error, PostId, TOMBSTONE};

// Arena-backed reply forest: nodes live in one flat Vec, edges are index
// lists, so parents and children never own each other.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentTree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Node {
    comment: Comment,
    children: Vec<usize>,
}

/// One comment with its replies nested below it, the shape collaborators
/// serialize out of `CommentTree::to_nested`
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

/// Rebuilds the reply forest of `post` from its flat comment records.
///
/// Siblings end up in creation order (ties broken by id) and are never
/// re-sorted by score. Tombstoned comments keep their place so the replies
/// below them stay reachable. A comment whose parent is missing from the
/// batch is attached at top level rather than dropped; a comment from
/// another post, a duplicated id, or a parent cycle means the batch is
/// corrupt and fails with `MalformedThread`.
pub fn assemble(post: PostId, mut comments: Vec<Comment>) -> Result<CommentTree, Error> {
    for c in &comments {
        if c.post_id != post {
            return Err(Error::MalformedThread(c.id.0));
        }
    }
    comments.sort_unstable_by_key(|c| (c.created_at, c.id));

    let mut index_of = HashMap::with_capacity(comments.len());
    for (i, c) in comments.iter().enumerate() {
        if index_of.insert(c.id, i).is_some() {
            return Err(Error::MalformedThread(c.id.0));
        }
    }

    let mut roots = Vec::new();
    let mut children = vec![Vec::new(); comments.len()];
    for (i, c) in comments.iter().enumerate() {
        match c.parent_id {
            None => roots.push(i),
            Some(p) if p == c.id => return Err(Error::MalformedThread(p.0)),
            Some(p) => match index_of.get(&p) {
                Some(&pi) => children[pi].push(i),
                None => {
                    // e.g. a reply that raced a hard-delete of its thread
                    // ancestor; user content is never silently discarded
                    tracing::warn!(
                        comment = %c.id.0,
                        parent = %p.0,
                        "parent comment missing, attaching reply at top level"
                    );
                    roots.push(i);
                }
            },
        }
    }

    let nodes = comments
        .into_iter()
        .zip(children)
        .map(|(mut comment, children)| {
            if comment.is_deleted {
                // records written before the marker existed may still carry
                // their original text
                comment.content = String::from(TOMBSTONE);
            }
            Node { comment, children }
        })
        .collect::<Vec<_>>();

    let tree = CommentTree { nodes, roots };
    // every parent reference resolved, so any node a root-anchored walk
    // cannot reach sits on a parent cycle
    let mut visited = vec![false; tree.nodes.len()];
    let mut stack = tree.roots.clone();
    while let Some(i) = stack.pop() {
        visited[i] = true;
        stack.extend(tree.nodes[i].children.iter().copied());
    }
    if let Some(stray) = visited.iter().position(|v| !v) {
        return Err(Error::MalformedThread(tree.nodes[stray].comment.id.0));
    }
    Ok(tree)
}

impl CommentTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first walk over all comments, parents before children,
    /// siblings in creation order
    pub fn iter(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Clones the arena out into the nested form collaborators serialize
    pub fn to_nested(&self) -> Vec<CommentNode> {
        self.roots.iter().map(|&r| self.nested_at(r)).collect()
    }

    fn nested_at(&self, i: usize) -> CommentNode {
        let node = &self.nodes[i];
        CommentNode {
            comment: node.comment.clone(),
            children: node.children.iter().map(|&c| self.nested_at(c)).collect(),
        }
    }
}

pub struct DepthFirst<'a> {
    tree: &'a CommentTree,
    stack: Vec<usize>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a Comment;

    fn next(&mut self) -> Option<&'a Comment> {
        let i = self.stack.pop()?;
        let node = &self.tree.nodes[i];
        self.stack.extend(node.children.iter().rev().copied());
        Some(&node.comment)
    }
}
