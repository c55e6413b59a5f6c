//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `assoc_core` linkage against a configured database.
//! - Print the nested author tree of the blog schema as pretty JSON.

use assoc_core::blog::{blog_graph, AUTHOR};
use assoc_core::{install_schema, CoreConfig, EagerFetcher, SqliteRecordStore};
use serde_json::json;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let config = CoreConfig::from_env()?;
    if config.init_logging()? {
        log::info!("event=cli_start module=cli status=ok");
    }

    let graph = blog_graph()?;
    let mut conn = config.open_db()?;
    install_schema(&mut conn, &graph, config.install_mode)?;

    let store = SqliteRecordStore::try_new(&conn, &graph)?;
    let fetcher = EagerFetcher::new(&graph, store);
    let tree = fetcher.fetch_json(AUTHOR, &json!({ "documents": { "annotations": {} } }), None)?;

    println!("assoc_core version={}", assoc_core::core_version());
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}
