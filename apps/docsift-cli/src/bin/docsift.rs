use clap::Parser;
use std::env;
use tracing_subscriber::EnvFilter;

use docsift_analysis::ClusterParams;
use docsift_cli::cli::{build_filters, id_scope};
use docsift_cli::{App, Cli, Command};
use docsift_core::config::Config;
use docsift_core::types::Query;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = Config::load_from_dir(&cli.config_dir, &env_name)?.engine()?;
    let app = App::new(config, &cli.config_dir);

    let output = match cli.command {
        Command::Index { corpus, limit, fresh } => serde_json::to_value(app.index(corpus.as_deref(), limit, fresh).await?)?,
        Command::Search { query, source_type, tags, since, until, limit } => {
            let limit = limit.unwrap_or(app.config().search.default_limit);
            let query = Query::new(query, limit).with_filters(build_filters(source_type, tags, since, until));
            serde_json::to_value(app.search(query).await?)?
        }
        Command::Duplicates { ids, threshold } => serde_json::to_value(app.duplicates(id_scope(ids), threshold).await?)?,
        Command::Cluster { eps, min_pts, ids, metric } => {
            let mut params = ClusterParams::new(eps, min_pts)?.with_config(&app.config().cluster);
            if let Some(m) = metric {
                params.metric = m.into();
            }
            serde_json::to_value(app.cluster(id_scope(ids), params).await?)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
