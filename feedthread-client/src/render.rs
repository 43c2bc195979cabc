//! Turning a discussion into something to show.
//!
//! `render` walks the reply tree and hands a `Renderer` one fully computed
//! `NodeView` per comment, so renderers never look at the viewer or the reply
//! session themselves.

use std::borrow::Cow;

use chrono::Duration;

use crate::{
    api::{Comment, Time, Uuid},
    tree::{Forest, Node},
    Discussion,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeView<'a> {
    pub comment: &'a Comment,

    pub depth: usize,

    /// Display name, or the start of the author id for records sent without one
    pub author: Cow<'a, str>,
    pub created_at: Time,

    pub reply_count: usize,
    pub like_count: usize,
    pub liked_by_viewer: bool,
    pub is_edited: bool,

    /// Whether the viewer can reply to and like this comment
    pub can_reply: bool,

    /// Whether the viewer can edit and delete this comment
    pub can_modify: bool,

    pub reply_open: bool,
}

pub trait Renderer {
    fn open_node(&mut self, node: &NodeView<'_>);

    fn close_node(&mut self, _node: &NodeView<'_>) {}

    /// Called once, instead of anything else, for a discussion without comments
    fn empty(&mut self) {}
}

enum Step<'f, 'a> {
    Open(&'f Node<'a>, usize),
    Close(NodeView<'a>),
}

/// Reply chains can be arbitrarily deep, so the walk keeps its own stack
/// instead of recursing.
pub fn render<R: Renderer + ?Sized>(discussion: &Discussion, renderer: &mut R) {
    let forest = discussion.forest();
    if forest.is_empty() {
        renderer.empty();
        return;
    }
    let mut stack = forest
        .roots()
        .rev()
        .map(|root| Step::Open(root, 0))
        .collect::<Vec<_>>();
    while let Some(step) = stack.pop() {
        match step {
            Step::Open(node, depth) => {
                let view = view(discussion, node, depth);
                renderer.open_node(&view);
                stack.push(Step::Close(view));
                stack.extend(
                    forest
                        .replies(node)
                        .rev()
                        .map(|reply| Step::Open(reply, depth + 1)),
                );
            }
            Step::Close(view) => renderer.close_node(&view),
        }
    }
}

fn view<'a>(discussion: &Discussion, node: &Node<'a>, depth: usize) -> NodeView<'a> {
    let c = node.comment;
    let viewer = discussion.viewer();
    let author = match c.author_name.is_empty() {
        true => Cow::Owned(short(&c.author_id.0)),
        false => Cow::Borrowed(&c.author_name[..]),
    };
    NodeView {
        comment: c,
        depth,
        author,
        created_at: c.created_at,
        reply_count: node.reply_count(),
        like_count: c.like_count(),
        liked_by_viewer: viewer.map_or(false, |v| c.is_liked_by(&v)),
        is_edited: c.is_edited(),
        can_reply: viewer.is_some(),
        can_modify: viewer == Some(c.author_id),
        reply_open: discussion.reply_session().is_open_for(&c.id),
    }
}

fn short(id: &Uuid) -> String {
    let mut s = id.to_string();
    s.truncate(8);
    s
}

fn ago(now: Time, then: Time) -> String {
    let elapsed = now.signed_duration_since(then);
    let (n, unit) = if elapsed < Duration::minutes(1) {
        return String::from("just now");
    } else if elapsed < Duration::hours(1) {
        (elapsed.num_minutes(), "minute")
    } else if elapsed < Duration::days(1) {
        (elapsed.num_hours(), "hour")
    } else if elapsed < Duration::days(30) {
        (elapsed.num_days(), "day")
    } else {
        return format!("on {}", then.format("%Y-%m-%d"));
    };
    match n {
        1 => format!("1 {unit} ago"),
        n => format!("{n} {unit}s ago"),
    }
}

#[derive(Debug)]
pub struct TextRenderer {
    now: Time,
    out: String,
}

impl TextRenderer {
    pub fn new() -> TextRenderer {
        TextRenderer::at(chrono::Utc::now())
    }

    pub fn at(now: Time) -> TextRenderer {
        TextRenderer {
            now,
            out: String::new(),
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Default for TextRenderer {
    fn default() -> TextRenderer {
        TextRenderer::new()
    }
}

impl Renderer for TextRenderer {
    fn open_node(&mut self, node: &NodeView<'_>) {
        let indent = "    ".repeat(node.depth);
        let mut flags = vec![match node.like_count {
            1 => String::from("1 like"),
            n => format!("{n} likes"),
        }];
        if node.liked_by_viewer {
            flags.push(String::from("liked by you"));
        }
        if node.is_edited {
            flags.push(String::from("edited"));
        }
        if node.can_modify {
            flags.push(String::from("yours"));
        }
        self.out.push_str(&format!(
            "{indent}#{} by {}, {} [{}]\n",
            short(&node.comment.id.0),
            node.author,
            ago(self.now, node.created_at),
            flags.join(", "),
        ));
        for line in node.comment.content.lines() {
            self.out.push_str(&format!("{indent}  {line}\n"));
        }
        if node.reply_open {
            self.out.push_str(&format!("{indent}  > replying...\n"));
        }
    }

    fn empty(&mut self) {
        self.out.push_str("No comments yet.\n");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::api::{CommentId, PostId, UserId};

    const ALICE: UserId = UserId(Uuid::from_u128(0xa11ce000_0000_0000_0000_000000000000));
    const BOB: UserId = UserId(Uuid::from_u128(0xb0b00000_0000_0000_0000_000000000000));

    fn comment(n: u128, author: UserId, content: &str, parent: Option<&Comment>) -> Comment {
        let created_at = Utc.timestamp_opt(1_000, 0).unwrap() + Duration::seconds(n as i64);
        let name = match author == ALICE {
            true => "alice",
            false => "bob",
        };
        Comment::new(
            CommentId(Uuid::from_u128(n << 96)),
            PostId::stub(),
            author,
            String::from(name),
            String::from(content),
            created_at,
            parent.map(|p| p.id),
        )
    }

    fn discussion(viewer: Option<UserId>, comments: Vec<Comment>) -> Discussion {
        let mut d = Discussion::new(PostId::stub(), viewer);
        let pending = d.begin_load();
        d.settle_load(pending, Ok(comments)).unwrap();
        d
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Renderer for Recorder {
        fn open_node(&mut self, node: &NodeView<'_>) {
            self.0.push(format!("open {} {}", node.depth, node.comment.content));
        }

        fn close_node(&mut self, node: &NodeView<'_>) {
            self.0.push(format!("close {}", node.comment.content));
        }

        fn empty(&mut self) {
            self.0.push(String::from("empty"));
        }
    }

    #[test]
    fn replies_are_nested_inside_their_parent() {
        let a = comment(1, ALICE, "a", None);
        let b = comment(2, BOB, "b", Some(&a));
        let c = comment(3, ALICE, "c", Some(&b));
        let d = comment(4, BOB, "d", Some(&a));
        let e = comment(5, ALICE, "e", None);
        let disc = discussion(None, vec![a, b, c, d, e]);

        let mut r = Recorder::default();
        render(&disc, &mut r);
        assert_eq!(
            r.0,
            vec![
                "open 0 a", "open 1 b", "open 2 c", "close c", "close b", "open 1 d", "close d",
                "close a", "open 0 e", "close e",
            ]
        );
    }

    #[test]
    fn empty_discussion() {
        let mut r = Recorder::default();
        render(&discussion(Some(ALICE), vec![]), &mut r);
        assert_eq!(r.0, vec!["empty"]);
    }

    #[test]
    fn deep_reply_chains_render() {
        const DEPTH: u128 = 100_000;

        #[derive(Default)]
        struct Depths {
            opened: usize,
            closed: usize,
            deepest: usize,
        }
        impl Renderer for Depths {
            fn open_node(&mut self, node: &NodeView<'_>) {
                self.opened += 1;
                self.deepest = self.deepest.max(node.depth);
            }

            fn close_node(&mut self, node: &NodeView<'_>) {
                assert_eq!(node.depth, self.deepest - self.closed);
                self.closed += 1;
            }
        }

        let mut comments: Vec<Comment> = Vec::with_capacity(DEPTH as usize);
        for n in 1..=DEPTH {
            let c = comment(n, ALICE, "deeper", comments.last());
            comments.push(c);
        }
        let mut r = Depths::default();
        render(&discussion(Some(BOB), comments), &mut r);
        assert_eq!(r.opened, DEPTH as usize);
        assert_eq!(r.closed, DEPTH as usize);
        assert_eq!(r.deepest, DEPTH as usize - 1);
    }

    #[test]
    fn views_depend_on_viewer() {
        let mut a = comment(1, ALICE, "a", None);
        a.liked_by.insert(BOB);

        struct Views(Vec<(bool, bool, bool)>);
        impl Renderer for Views {
            fn open_node(&mut self, n: &NodeView<'_>) {
                self.0.push((n.can_reply, n.can_modify, n.liked_by_viewer));
            }
        }

        for (viewer, expected) in [
            (None, (false, false, false)),
            (Some(ALICE), (true, true, false)),
            (Some(BOB), (true, false, true)),
        ] {
            let mut v = Views(Vec::new());
            render(&discussion(viewer, vec![a.clone()]), &mut v);
            assert_eq!(v.0, vec![expected]);
        }
    }

    #[test]
    fn views_carry_author_and_date() {
        let a = comment(1, ALICE, "named", None);
        let mut b = comment(2, BOB, "unnamed", None);
        b.author_name.clear();

        struct Authors(Vec<(String, Time)>);
        impl Renderer for Authors {
            fn open_node(&mut self, n: &NodeView<'_>) {
                self.0.push((n.author.to_string(), n.created_at));
            }
        }

        let mut r = Authors(Vec::new());
        render(&discussion(None, vec![a.clone(), b.clone()]), &mut r);
        assert_eq!(
            r.0,
            vec![
                (String::from("alice"), a.created_at),
                (String::from("b0b00000"), b.created_at),
            ]
        );
    }

    #[test]
    fn relative_dates() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for (elapsed, expected) in [
            (Duration::seconds(-30), "just now"),
            (Duration::seconds(59), "just now"),
            (Duration::minutes(1), "1 minute ago"),
            (Duration::minutes(59), "59 minutes ago"),
            (Duration::minutes(61), "1 hour ago"),
            (Duration::hours(23), "23 hours ago"),
            (Duration::days(2), "2 days ago"),
        ] {
            assert_eq!(ago(now, now - elapsed), expected);
        }
        assert_eq!(ago(now, Utc.timestamp_opt(1_000, 0).unwrap()), "on 1970-01-01");
    }

    #[test]
    fn text_output() {
        let now = Utc.timestamp_opt(100_000, 0).unwrap();
        let mut a = comment(1, ALICE, "first line\nsecond line", None);
        a.created_at = now - Duration::hours(2);
        a.updated_at = a.created_at;
        a.liked_by.insert(BOB);
        let mut b = comment(2, BOB, "a reply", Some(&a));
        b.created_at = now - Duration::minutes(5);
        b.updated_at = b.created_at + Duration::minutes(3);
        b.liked_by.extend([ALICE, BOB]);
        let mut d = discussion(Some(ALICE), vec![a, b.clone()]);
        d.reply(b.id).unwrap();

        let mut r = TextRenderer::at(now);
        render(&d, &mut r);
        assert_eq!(
            r.finish(),
            "#00000001 by alice, 2 hours ago [1 like, yours]\n\
             \x20 first line\n\
             \x20 second line\n\
             \x20   #00000002 by bob, 5 minutes ago [2 likes, liked by you, edited]\n\
             \x20     a reply\n\
             \x20     > replying...\n"
        );

        let mut r = TextRenderer::at(now);
        render(&discussion(None, vec![]), &mut r);
        assert_eq!(r.finish(), "No comments yet.\n");
    }
}
