use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::garment::BodyRegion;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File with KEY=VALUE lines holding HUGGINGFACE_TOKEN
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// JSON settings file (defaults to ./vton.json when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Catalog root holding person_images/ and garment_images/
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Directory result images are copied to
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Seed of the refinement model
    #[arg(long)]
    pub seed: Option<i64>,

    /// Denoising steps of the refinement model
    #[arg(long)]
    pub denoise_steps: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Action>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Action {
    /// Interactive menu (default)
    Menu,
    /// One two-step run
    Run {
        #[arg(long)]
        person: PathBuf,
        #[arg(long)]
        garment: PathBuf,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "upper_body")]
        region: BodyRegion,
    },
    /// Shirt then pants, each refined on top of the previous result
    Outfit {
        #[arg(long)]
        person: PathBuf,
        #[arg(long)]
        shirt: Option<PathBuf>,
        #[arg(long)]
        shirt_description: Option<String>,
        #[arg(long)]
        pants: Option<PathBuf>,
        #[arg(long)]
        pants_description: Option<String>,
    },
    /// Report catalog contents and credential status
    Check,
}

impl Cli {
    /// Command-line values win over the settings file.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(root) = &self.root {
            settings.catalog_root = root.clone();
        }
        if let Some(results) = &self.results {
            settings.results_dir = results.clone();
        }
        if let Some(seed) = self.seed {
            settings.refine_params.seed = seed;
        }
        if let Some(steps) = self.denoise_steps {
            settings.refine_params.denoise_steps = steps;
        }
    }
}
