pub mod completion;
pub mod config;
pub mod editor;
pub mod error;
pub mod logging;
pub mod model;
pub mod providers;
pub mod repl;
pub mod turn;

use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use std::io;
use std::time::Duration;
use tracing::info;

use config::Config;
use model::Transcript;
use repl::run_repl;
use turn::TurnProcessor;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env();
    info!(
        provider = %cfg.model_provider,
        model = %cfg.model,
        base_url = %cfg.model_base_url,
        temperature = cfg.generation.temperature,
        max_tokens = cfg.generation.max_tokens,
        history_file = %cfg.history_file.display(),
        "loaded runtime configuration"
    );

    let client = Client::builder()
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .build()
        .context("Failed to initialize HTTP client")?;
    let processor = TurnProcessor::new(providers::completion_service(&client, &cfg)?);
    let mut transcript = Transcript::new(cfg.system_prompt.clone());

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        run_repl(&processor, &mut transcript, &cfg).await
    } else {
        let prompt = args.join(" ");
        let mut out = io::stdout();
        processor
            .submit(&mut transcript, prompt.trim(), &mut out, repl::interrupt_signal())
            .await?;
        Ok(())
    }
}
