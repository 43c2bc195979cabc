use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use feedthread_api::Comment;
use feedthread_mock_server::{web, MockServer};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(long, env = "FEEDTHREAD_MOCK_LISTEN", default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Name of a user to create, its session token is printed on startup
    #[structopt(long = "user", number_of_values = 1, default_value = "demo")]
    users: Vec<String>,

    /// JSON file with a list of comments to start with, as output by
    /// generate-test-data
    #[structopt(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let mut server = MockServer::new();
    for name in opt.users.iter() {
        let (user, tok) = server.add_user(name);
        println!("user {name}: id {} token {}", user.0, tok.0);
    }
    if let Some(path) = opt.seed {
        let data = std::fs::read(&path).with_context(|| format!("reading {path:?}"))?;
        let comments: Vec<Comment> =
            serde_json::from_slice(&data).with_context(|| format!("parsing {path:?}"))?;
        tracing::info!(num_comments = comments.len(), "seeding comments");
        for c in comments {
            server.insert_comment(c);
        }
    }

    let (addr, app) = web::serve(server.shared(), opt.listen)?;
    tracing::info!("listening on {}", addr);
    app.await
}
