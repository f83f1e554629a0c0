use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use docsift_core::config::DistanceMetric;
use docsift_core::types::{SearchFilters, TimeRange};

#[derive(Parser, Debug)]
#[command(name = "docsift", version, about = "Hybrid document search, duplicate detection and topic clustering")]
pub struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the lexical and vector indexes from a corpus
    Index {
        /// Corpus file or directory (defaults to data.corpus)
        corpus: Option<PathBuf>,

        /// Only index the first N documents
        #[arg(long)]
        limit: Option<usize>,

        /// Remove the existing vector database first
        #[arg(long, default_value = "false")]
        fresh: bool,
    },
    /// Run a hybrid keyword + semantic search
    Search {
        query: String,

        /// Restrict to one source type
        #[arg(long = "type")]
        source_type: Option<String>,

        /// Required tag; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Earliest timestamp (unix seconds, inclusive)
        #[arg(long)]
        since: Option<i64>,

        /// Latest timestamp (unix seconds, inclusive)
        #[arg(long)]
        until: Option<i64>,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Report exact and near-duplicate groups
    Duplicates {
        /// Comma separated ids (defaults to the whole corpus)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Near-duplicate similarity cutoff in (0, 1]
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Group documents into density-based topic clusters
    Cluster {
        #[arg(long)]
        eps: f32,

        #[arg(long)]
        min_pts: usize,

        /// Comma separated ids (defaults to the whole corpus)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        #[arg(long, value_enum)]
        metric: Option<MetricArg>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricArg {
    Cosine,
    Euclidean,
}

impl From<MetricArg> for DistanceMetric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::Cosine => DistanceMetric::Cosine,
            MetricArg::Euclidean => DistanceMetric::Euclidean,
        }
    }
}

pub fn build_filters(source_type: Option<String>, tags: Vec<String>, since: Option<i64>, until: Option<i64>) -> SearchFilters {
    let time_range = (since.is_some() || until.is_some()).then_some(TimeRange { start: since, end: until });
    SearchFilters { source_type, tags: tags.into_iter().collect(), time_range }
}

/// `None` when no ids were given, meaning the whole corpus.
pub fn id_scope(ids: Vec<String>) -> Option<Vec<String>> {
    if ids.is_empty() { None } else { Some(ids) }
}
