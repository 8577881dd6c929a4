use anyhow::Context;
use clap::Parser;
use cyhair_lib::{
    combine_files, combine_files_async, read_config, save_async, save_with_policy, OversizePolicy,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "CyHair Combiner",
    version = "1.0",
    about = "Combines several CyHair (.hair) files into one"
)]
struct Cli {
    #[arg(
        value_name = "CONFIG",
        help = "JSON array of inputs: {\"filename\", \"user_thickness\"?, \"thickness_scale\"?}."
    )]
    config: PathBuf,

    #[arg(value_name = "OUTPUT", help = "Path to the combined .hair file.")]
    output: PathBuf,

    #[arg(
        short = 's',
        long = "strict",
        default_value = "false",
        help = "Fail instead of truncating attribute streams longer than the point count."
    )]
    strict: bool,

    #[arg(
        short = 'a',
        long = "async",
        default_value = "false",
        help = "Read and write files through the asynchronous I/O path."
    )]
    async_mode: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let inputs = read_config(&cli.config)
        .with_context(|| format!("reading config {}", cli.config.display()))?;
    let policy = if cli.strict {
        OversizePolicy::Reject
    } else {
        OversizePolicy::Truncate
    };

    info!(
        config = %cli.config.display(),
        output = %cli.output.display(),
        inputs = inputs.len(),
        async_mode = cli.async_mode,
        "combining CyHair files"
    );

    let start = Instant::now();

    if cli.async_mode {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(async {
            let merged = combine_files_async(&inputs)
                .await
                .context("failed to combine CyHair files")?;
            save_async(&cli.output, &merged, policy)
                .await
                .context("failed to save CyHair")
        })?;
    } else {
        let merged = combine_files(&inputs).context("failed to combine CyHair files")?;
        save_with_policy(&cli.output, &merged, policy).context("failed to save CyHair")?;
    }

    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        output = %cli.output.display(),
        "combined CyHair"
    );
    Ok(())
}
