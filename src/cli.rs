use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::anchors::Similarity;

#[derive(Parser, Debug)]
#[command(
    name = "anchorlink",
    version,
    about = "Detect and link people, unit and procedure mentions in HTML documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Annotate(AnnotateArgs),
    Catalog(CatalogArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    #[arg(long)]
    pub catalog: PathBuf,

    #[arg(long = "input", required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = ".cache/anchorlink")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub write_html: bool,

    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    #[arg(long)]
    pub engine_config: Option<PathBuf>,

    #[arg(long)]
    pub fuzzy_threshold: Option<f64>,

    #[arg(long, value_enum)]
    pub similarity: Option<Similarity>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    #[arg(long)]
    pub catalog: PathBuf,
}
