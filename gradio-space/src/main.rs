use std::path::PathBuf;

use clap::Parser;
use gradio_space::{Client, Input, Options};
use serde_json::json;

/// Runs a single refinement call against an IDM-VTON style Space.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "blackmamba2408/IDM-VTON")]
    space: String,

    #[arg(long, default_value = "/tryon")]
    api: String,

    #[arg(long)]
    person: PathBuf,

    #[arg(long)]
    garment: PathBuf,

    #[arg(long, default_value = "upper garment")]
    description: String,

    #[arg(long, default_value_t = 30)]
    denoise_steps: u32,

    #[arg(long, default_value_t = 42)]
    seed: i64,

    /// Falls back to HUGGINGFACE_TOKEN when omitted.
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let options = Options {
        token: args
            .token
            .or_else(|| std::env::var("HUGGINGFACE_TOKEN").ok()),
        ..Options::default()
    };
    let client = Client::connect(&args.space, options).await?;

    let result = client
        .predict(
            &args.api,
            vec![
                (
                    "dict",
                    Input::Editor {
                        background: args.person,
                        layers: Vec::new(),
                        composite: None,
                    },
                ),
                ("garm_img", Input::File(args.garment)),
                ("garment_des", Input::Value(json!(args.description))),
                ("is_checked", Input::Value(json!(true))),
                ("is_checked_crop", Input::Value(json!(false))),
                ("denoise_steps", Input::Value(json!(args.denoise_steps))),
                ("seed", Input::Value(json!(args.seed))),
            ],
        )
        .await?;

    println!("Result: {}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
