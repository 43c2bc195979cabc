use chrono::{Duration, TimeZone, Utc};
use feedthread_api::{Comment, CommentId, PostId, UserId, Uuid};
use rand::{seq::SliceRandom, Rng};

const USER_NAMES: &[&str] = &["alice", "bob", "carol", "dave"];
const NUM_COMMENTS: usize = 60;

// Likelihood for a comment to be a reply to an earlier one
const REPLY_PROBABILITY: f64 = 0.6;
const EDIT_PROBABILITY: f64 = 0.2;

const COMMENT_MIN_WORDS: usize = 3;
const COMMENT_MAX_WORDS: usize = 40;

fn main() {
    let mut rng = rand::thread_rng();
    let post = PostId(Uuid::new_v4());
    let users = USER_NAMES
        .iter()
        .map(|name| (UserId(Uuid::new_v4()), *name))
        .collect::<Vec<_>>();
    let start = Utc
        .timestamp_opt(1_672_531_200, 0)
        .single()
        .expect("start date is valid");

    let mut comments: Vec<Comment> = Vec::with_capacity(NUM_COMMENTS);
    for i in 0..NUM_COMMENTS {
        let parent_id = match comments.is_empty() || !rng.gen_bool(REPLY_PROBABILITY) {
            true => None,
            false => comments.choose(&mut rng).map(|c| c.id),
        };
        let (author, name) = *users.choose(&mut rng).expect("there are users");
        let words = rng.gen_range(COMMENT_MIN_WORDS..=COMMENT_MAX_WORDS);
        let created_at = start + Duration::minutes(i as i64 * 7);
        let mut c = Comment::new(
            CommentId(Uuid::new_v4()),
            post,
            author,
            String::from(name),
            lipsum::lipsum_words(words),
            created_at,
            parent_id,
        );
        if rng.gen_bool(EDIT_PROBABILITY) {
            c.updated_at = created_at + Duration::minutes(rng.gen_range(1..60));
        }
        for (u, _) in users.iter() {
            if rng.gen_bool(0.3) {
                c.liked_by.insert(*u);
            }
        }
        comments.push(c);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&comments).expect("serializing comments")
    );
}
