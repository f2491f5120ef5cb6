use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use tripo_gen::{Task, TripoClient, DEFAULT_API_URL};

/// Generate 3D models from images or text prompts with the Tripo3D API.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input image: a local file path, an http(s) URL, or an upload token
    #[arg(long, conflicts_with = "prompt")]
    image: Option<String>,

    /// Text prompt describing the model to generate
    #[arg(long)]
    prompt: Option<String>,

    /// Output file path (extension is adjusted to match --format)
    #[arg(short, long, required_unless_present = "balance")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "glb")]
    format: ModelFormat,

    /// Model version to request (sent only when not "default")
    #[arg(long, default_value = "default")]
    model_version: String,

    /// Tripo API key
    #[arg(long, env = "TRIPO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Max seconds to wait for the task to finish
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    /// Seconds between status polls
    #[arg(long, default_value_t = 3)]
    poll_interval: u64,

    /// Check the credit balance and exit
    #[arg(long)]
    balance: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModelFormat {
    Glb,
    Fbx,
    Obj,
    Stl,
    Usdz,
}

impl ModelFormat {
    fn extension(self) -> &'static str {
        match self {
            ModelFormat::Glb => "glb",
            ModelFormat::Fbx => "fbx",
            ModelFormat::Obj => "obj",
            ModelFormat::Stl => "stl",
            ModelFormat::Usdz => "usdz",
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let exit_code = tokio::select! {
        result = run(cli) => match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\ncancelled by user");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<()> {
    let base_url = env::var("TRIPO_API_BASE").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let client = TripoClient::new_with_url(cli.api_key.clone(), &base_url)?;

    if cli.balance {
        let balance = client.get_balance().await?;
        println!(
            "Balance: {} credits ({} frozen)",
            balance.balance, balance.frozen
        );
        return Ok(());
    }

    let output = cli.output.clone().context("--output is required")?;
    let output = normalize_output_path(&output, cli.format);

    let model_version = (cli.model_version != "default").then_some(cli.model_version.as_str());

    let task_id = match (cli.image.as_deref(), cli.prompt.as_deref()) {
        (Some(image), None) => {
            info!(image, "image-to-3D pipeline");
            client.image_to_model(image, model_version).await?
        }
        (None, Some(prompt)) => {
            info!(prompt, "text-to-3D pipeline");
            client.text_to_model(prompt, model_version).await?
        }
        _ => bail!("either --image or --prompt is required"),
    };

    println!("task created: {task_id}");

    let task = poll_with_progress(&client, &task_id, cli.poll_interval, cli.timeout).await?;
    download_with_progress(&client, &task, &output).await?;

    println!("saved: {}", output.display());
    Ok(())
}

async fn poll_with_progress(
    client: &TripoClient,
    task_id: &str,
    poll_interval: u64,
    timeout: u64,
) -> Result<Task> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.green/dim}] {pos}% {msg:.dim}")
            .unwrap()
            .progress_chars("█░ "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message("waiting");

    let result = client
        .wait_for_task(
            task_id,
            Duration::from_secs(poll_interval),
            Duration::from_secs(timeout),
            |task| {
                pb.set_position(u64::from(task.progress));
                pb.set_message(task.status.to_string());
            },
        )
        .await;

    match result {
        Ok(task) => {
            pb.finish_with_message("success");
            Ok(task)
        }
        Err(e) => {
            pb.abandon();
            Err(e.into())
        }
    }
}

async fn download_with_progress(
    client: &TripoClient,
    task: &Task,
    output: &Path,
) -> Result<PathBuf> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} {bytes} / {total_bytes} {msg:.dim}")
            .unwrap(),
    );
    pb.set_message("downloading");

    let result = client
        .download_model(task, output, |downloaded, total| {
            if let Some(total) = total {
                pb.set_length(total);
            }
            pb.set_position(downloaded);
        })
        .await;

    match result {
        Ok(path) => {
            pb.finish_and_clear();
            Ok(path)
        }
        Err(e) => {
            pb.abandon();
            Err(e.into())
        }
    }
}

/// Rewrites the output extension to match the requested format, leaving the
/// path untouched when it already carries the extension (case-insensitive).
fn normalize_output_path(path: &Path, format: ModelFormat) -> PathBuf {
    let ext = format.extension();
    let already_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false);

    if already_matches {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}
