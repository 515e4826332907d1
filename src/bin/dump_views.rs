// Dump stored views rows as JSON.
//
// Usage: cargo run --bin dump_views -- [DB_PATH] [REPO_NAME]
//   DB_PATH    default: ./data/githubstats.db
//   REPO_NAME  default: every repository in the table

use repostats::views_repo::ViewsRepo;
use std::collections::BTreeMap;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("./data/githubstats.db");

    let mut repo = ViewsRepo::open_existing(path).await?;
    let names = match args.get(2) {
        Some(name) => vec![name.clone()],
        None => repo.repo_names().await?,
    };

    let mut out = BTreeMap::new();
    for name in names {
        let rows = repo.rows_for_repo(&name).await?;
        out.insert(name, rows);
    }
    repo.close().await?;

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
