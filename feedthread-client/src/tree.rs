use std::collections::{hash_map, HashMap};

use crate::api::{Comment, CommentId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node<'a> {
    pub comment: &'a Comment,
    replies: Vec<usize>,
}

impl<'a> Node<'a> {
    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }
}

/// Reply tree of a discussion, built from its flat comment list.
///
/// Nodes borrow the comments they were built from and refer to each other by
/// position, so the forest owns no comment and holds no parent/child cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Forest<'a> {
    nodes: Vec<Node<'a>>,
    roots: Vec<usize>,
    index: HashMap<CommentId, usize>,
}

impl<'a> Forest<'a> {
    /// Builds the forest for `comments`, which must all belong to the same
    /// discussion and be in arrival order.
    ///
    /// Replies keep the relative order they have in `comments`. A comment whose
    /// parent is not in `comments` (or lives in another discussion) becomes a
    /// root: nothing is ever dropped, except later duplicates of an id.
    pub fn build(comments: &'a [Comment]) -> Forest<'a> {
        let mut nodes = Vec::with_capacity(comments.len());
        let mut index = HashMap::with_capacity(comments.len());
        for c in comments {
            match index.entry(c.id) {
                hash_map::Entry::Occupied(_) => {
                    tracing::warn!(comment = ?c.id, "skipping duplicate comment in discussion")
                }
                hash_map::Entry::Vacant(e) => {
                    e.insert(nodes.len());
                    nodes.push(Node {
                        comment: c,
                        replies: Vec::new(),
                    });
                }
            }
        }

        let mut roots = Vec::new();
        for i in 0..nodes.len() {
            match resolve_parent(&nodes, &index, i) {
                Some(p) => nodes[p].replies.push(i),
                None => {
                    if let Some(parent) = nodes[i].comment.parent_id {
                        tracing::debug!(comment = ?nodes[i].comment.id, ?parent, "orphan comment shown as root");
                    }
                    roots.push(i);
                }
            }
        }

        let mut forest = Forest {
            nodes,
            roots,
            index,
        };
        forest.break_cycles();
        forest
    }

    /// Parent links are only ever set towards pre-existing comments, so a cycle
    /// can only come from corrupted input. Nodes not reachable from any root are
    /// promoted to roots, first in input order first.
    fn break_cycles(&mut self) {
        let mut reached = vec![false; self.nodes.len()];
        let mut num_reached = 0;
        let mut stack = self.roots.clone();
        mark_reached(&self.nodes, &mut reached, &mut num_reached, &mut stack);
        if num_reached == self.nodes.len() {
            return;
        }

        for i in 0..self.nodes.len() {
            if reached[i] {
                continue;
            }
            tracing::warn!(comment = ?self.nodes[i].comment.id, "comment is part of a reply cycle, promoting it to root");
            if let Some(p) = resolve_parent(&self.nodes, &self.index, i) {
                self.nodes[p].replies.retain(|r| *r != i);
            }
            self.roots.push(i);
            stack.push(i);
            mark_reached(&self.nodes, &mut reached, &mut num_reached, &mut stack);
        }
        self.roots.sort_unstable();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &CommentId) -> Option<&Node<'a>> {
        self.index.get(id).map(|i| &self.nodes[*i])
    }

    pub fn roots(&self) -> impl DoubleEndedIterator<Item = &Node<'a>> + '_ {
        self.roots.iter().map(|i| &self.nodes[*i])
    }

    pub fn replies<'f>(
        &'f self,
        node: &'f Node<'a>,
    ) -> impl DoubleEndedIterator<Item = &'f Node<'a>> + 'f {
        node.replies.iter().map(|i| &self.nodes[*i])
    }

    /// Depth-first, pre-order traversal: each node comes before its replies.
    /// Roots are at depth 0.
    pub fn walk(&self) -> Walk<'_, 'a> {
        Walk {
            forest: self,
            stack: self.roots.iter().rev().map(|i| (*i, 0)).collect(),
        }
    }
}

fn resolve_parent(nodes: &[Node<'_>], index: &HashMap<CommentId, usize>, i: usize) -> Option<usize> {
    let c = nodes[i].comment;
    let p = *index.get(&c.parent_id?)?;
    if p == i {
        return None;
    }
    if nodes[p].comment.post_id != c.post_id {
        tracing::warn!(comment = ?c.id, parent = ?nodes[p].comment.id, "parent comment belongs to another post");
        return None;
    }
    Some(p)
}

fn mark_reached(
    nodes: &[Node<'_>],
    reached: &mut [bool],
    num_reached: &mut usize,
    stack: &mut Vec<usize>,
) {
    while let Some(i) = stack.pop() {
        if reached[i] {
            continue;
        }
        reached[i] = true;
        *num_reached += 1;
        stack.extend(nodes[i].replies.iter().copied());
    }
}

pub struct Walk<'f, 'a> {
    forest: &'f Forest<'a>,
    stack: Vec<(usize, usize)>,
}

impl<'f, 'a> Iterator for Walk<'f, 'a> {
    type Item = (usize, &'f Node<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let (i, depth) = self.stack.pop()?;
        let node = &self.forest.nodes[i];
        self.stack
            .extend(node.replies.iter().rev().map(|r| (*r, depth + 1)));
        Some((depth, node))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::api::{PostId, UserId, Uuid};

    fn comment(n: i64, parent: Option<&Comment>) -> Comment {
        Comment::new(
            CommentId(Uuid::new_v4()),
            PostId::stub(),
            UserId::stub(),
            String::from("alice"),
            format!("comment {n}"),
            Utc.timestamp_opt(1_000, 0).unwrap() + Duration::seconds(n),
            parent.map(|p| p.id),
        )
    }

    fn shape(forest: &Forest<'_>) -> Vec<(usize, String)> {
        forest
            .walk()
            .map(|(d, n)| (d, n.comment.content.clone()))
            .collect()
    }

    fn expected(items: &[(usize, &str)]) -> Vec<(usize, String)> {
        items.iter().map(|(d, s)| (*d, String::from(*s))).collect()
    }

    #[test]
    fn empty_input() {
        let forest = Forest::build(&[]);
        assert!(forest.is_empty());
        assert_eq!(forest.roots().count(), 0);
        assert_eq!(forest.walk().count(), 0);
    }

    #[test]
    fn nests_replies_in_input_order() {
        let a = comment(0, None);
        let b = comment(1, Some(&a));
        let c = comment(2, None);
        let d = comment(3, Some(&b));
        let e = comment(4, Some(&a));
        let comments = vec![a, b, c, d, e];
        let forest = Forest::build(&comments);

        assert_eq!(
            shape(&forest),
            expected(&[
                (0, "comment 0"),
                (1, "comment 1"),
                (2, "comment 3"),
                (1, "comment 4"),
                (0, "comment 2"),
            ])
        );
        let root = forest.get(&comments[0].id).unwrap();
        assert_eq!(root.reply_count(), 2);
        let replies = forest
            .replies(root)
            .map(|n| n.comment.id)
            .collect::<Vec<_>>();
        assert_eq!(replies, vec![comments[1].id, comments[4].id]);
    }

    #[test]
    fn building_twice_is_identical() {
        let a = comment(0, None);
        let b = comment(1, Some(&a));
        let c = comment(2, Some(&b));
        let comments = vec![a, b, c];
        assert_eq!(Forest::build(&comments), Forest::build(&comments));
    }

    #[test]
    fn appending_a_reply_adds_one_node_at_the_end() {
        let a = comment(0, None);
        let b = comment(1, Some(&a));
        let c = comment(2, None);
        let mut comments = vec![a, b, c];
        let before = shape(&Forest::build(&comments));

        let d = comment(3, Some(&comments[0]));
        comments.push(d);
        let after = shape(&Forest::build(&comments));

        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(
            after,
            expected(&[
                (0, "comment 0"),
                (1, "comment 1"),
                (1, "comment 3"),
                (0, "comment 2"),
            ])
        );
    }

    #[test]
    fn orphans_become_roots() {
        let ghost = comment(0, None);
        let a = comment(1, None);
        let orphan = comment(2, Some(&ghost));
        let reply = comment(3, Some(&orphan));
        let comments = vec![a, orphan, reply];
        let forest = Forest::build(&comments);
        assert_eq!(
            shape(&forest),
            expected(&[(0, "comment 1"), (0, "comment 2"), (1, "comment 3")])
        );
    }

    #[test]
    fn reply_arriving_before_its_parent_is_still_attached() {
        let a = comment(0, None);
        let b = comment(1, Some(&a));
        let comments = vec![b, a];
        let forest = Forest::build(&comments);
        assert_eq!(
            shape(&forest),
            expected(&[(0, "comment 0"), (1, "comment 1")])
        );
    }

    #[test]
    fn parent_from_another_post_is_ignored() {
        let mut a = comment(0, None);
        a.post_id = PostId(Uuid::new_v4());
        let b = comment(1, Some(&a));
        let comments = vec![a, b];
        let forest = Forest::build(&comments);
        assert_eq!(forest.roots().count(), 2);
    }

    #[test]
    fn duplicates_are_skipped() {
        let a = comment(0, None);
        let mut dup = a.clone();
        dup.content = String::from("dup");
        let comments = vec![a, dup];
        let forest = Forest::build(&comments);
        assert_eq!(forest.len(), 1);
        assert_eq!(shape(&forest), expected(&[(0, "comment 0")]));
    }

    #[test]
    fn cycles_do_not_drop_comments() {
        let mut a = comment(0, None);
        let mut b = comment(1, None);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);
        let mut selfish = comment(2, None);
        selfish.parent_id = Some(selfish.id);
        let comments = vec![a, b, selfish];
        let forest = Forest::build(&comments);
        assert_eq!(
            shape(&forest),
            expected(&[(0, "comment 0"), (1, "comment 1"), (0, "comment 2")])
        );
    }

    #[test]
    fn fuzz_build_keeps_every_comment_once() {
        bolero::check!()
            .with_type::<Vec<Option<u8>>>()
            .cloned()
            .for_each(|parents| {
                // parent index is taken modulo the number of preceding comments
                let mut comments: Vec<Comment> = Vec::with_capacity(parents.len());
                for (i, p) in parents.iter().enumerate() {
                    let parent = match (p, i) {
                        (Some(p), i) if i > 0 => Some(comments[*p as usize % i].id),
                        _ => None,
                    };
                    let mut c = comment(i as i64, None);
                    c.parent_id = parent;
                    comments.push(c);
                }

                let forest = Forest::build(&comments);
                assert_eq!(forest, Forest::build(&comments));

                let walked = forest.walk().map(|(_, n)| n.comment.id).collect::<Vec<_>>();
                assert_eq!(walked.len(), comments.len());
                let mut sorted = walked.clone();
                sorted.sort_unstable();
                sorted.dedup();
                assert_eq!(sorted.len(), comments.len());

                for (depth, node) in forest.walk() {
                    assert_eq!(depth == 0, node.comment.parent_id.is_none());
                }

                if let Some(last) = comments.last().cloned() {
                    let before = Forest::build(&comments[..comments.len() - 1])
                        .walk()
                        .map(|(d, n)| (d, n.comment.id))
                        .collect::<Vec<_>>();
                    let after = forest
                        .walk()
                        .map(|(d, n)| (d, n.comment.id))
                        .filter(|(_, id)| *id != last.id)
                        .collect::<Vec<_>>();
                    assert_eq!(before, after);
                }
            });
    }
}
