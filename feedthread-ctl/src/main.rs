use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use feedthread_client::{
    api::{AuthToken, Comment, CommentId, PostId, UserId, Uuid},
    render::{self, TextRenderer},
    Discussion, Intent, Outcome, RestBackend, RestConfig, DEFAULT_TIMEOUT_SECS,
};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base url of the server
    #[structopt(short, long, env = "FEEDTHREAD_HOST", default_value = "http://localhost:8000")]
    host: String,

    /// Session token. Without one, only `show` and `render` work
    #[structopt(long, env = "FEEDTHREAD_TOKEN")]
    token: Option<Uuid>,

    /// Timeout for each request to the server
    #[structopt(long, env = "FEEDTHREAD_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the discussion of a post
    Show { post: Uuid },

    /// Add a top-level comment to a post
    Comment { post: Uuid, content: String },

    /// Reply to a comment
    Reply {
        post: Uuid,
        parent: Uuid,
        content: String,
    },

    /// Change the content of one of your comments
    Edit {
        post: Uuid,
        comment: Uuid,
        content: String,
    },

    /// Like a comment, or unlike it if you already did
    Like { post: Uuid, comment: Uuid },

    /// Delete one of your comments, hiding its replies too
    Delete { post: Uuid, comment: Uuid },

    /// Print a discussion from a JSON list of comments, without any server
    Render {
        file: PathBuf,

        /// User to render the discussion for
        #[structopt(long)]
        viewer: Option<Uuid>,
    },
}

fn print_discussion(d: &Discussion) {
    let mut r = TextRenderer::new();
    render::render(d, &mut r);
    print!("{}", r.finish());
}

fn render_file(file: PathBuf, viewer: Option<UserId>) -> anyhow::Result<()> {
    let data = std::fs::read(&file).with_context(|| format!("reading {file:?}"))?;
    let comments: Vec<Comment> =
        serde_json::from_slice(&data).with_context(|| format!("parsing {file:?}"))?;
    let post = comments.first().map_or(PostId::stub(), |c| c.post_id);
    let mut d = Discussion::new(post, viewer);
    let pending = d.begin_load();
    d.settle_load(pending, Ok(comments))
        .context("loading comments")?;
    print_discussion(&d);
    Ok(())
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::ReplyTarget(_) => String::from("reply composer toggled"),
        Outcome::Added(c) => format!("created comment {}", c.id.0),
        Outcome::Edited(c) => format!("edited comment {}", c.id.0),
        Outcome::Liked(true) => String::from("liked"),
        Outcome::Liked(false) => String::from("unliked"),
        Outcome::Deleted(ids) => format!("deleted {} comment(s)", ids.len()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let (post, intent) = match opt.cmd {
        Command::Render { file, viewer } => return render_file(file, viewer.map(UserId)),
        Command::Show { post } => (post, None),
        Command::Comment { post, content } => (
            post,
            Some(Intent::Add {
                content,
                parent_id: None,
            }),
        ),
        Command::Reply {
            post,
            parent,
            content,
        } => (
            post,
            Some(Intent::Add {
                content,
                parent_id: Some(CommentId(parent)),
            }),
        ),
        Command::Edit {
            post,
            comment,
            content,
        } => (
            post,
            Some(Intent::Edit {
                comment: CommentId(comment),
                content,
            }),
        ),
        Command::Like { post, comment } => (post, Some(Intent::ToggleLike(CommentId(comment)))),
        Command::Delete { post, comment } => (post, Some(Intent::Delete(CommentId(comment)))),
    };

    let mut config = RestConfig::new(opt.host, opt.token.map(AuthToken));
    config.timeout = Duration::from_secs(opt.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let backend = RestBackend::new(config)?;
    let viewer = match backend.config().token {
        None => None,
        Some(_) => Some(backend.whoami().await.context("checking session token")?),
    };
    tracing::debug!(?viewer, "authenticated");

    let mut d = Discussion::new(PostId(post), viewer);
    d.load(&backend).await.context("loading discussion")?;

    let res = match intent {
        None => Ok(()),
        Some(intent) => d
            .dispatch(&backend, intent)
            .await
            .map(|outcome| eprintln!("{}", describe(&outcome))),
    };
    for notice in d.take_notices() {
        eprintln!("{:?}: {}", notice.kind, notice.message);
    }
    print_discussion(&d);
    res.context("applying command")
}
