pub mod deepseek;
pub(crate) mod http_errors;
pub mod sse;

use anyhow::{Result, anyhow};
use reqwest::Client;
use tracing::{debug, warn};

use crate::completion::CompletionService;
use crate::config::Config;

/// Builds the completion service named by `MODEL_PROVIDER`.
pub fn completion_service<'a>(
    client: &'a Client,
    cfg: &'a Config,
) -> Result<Box<dyn CompletionService + 'a>> {
    let provider = cfg.model_provider.to_ascii_lowercase();

    match provider.as_str() {
        "deepseek" => {
            debug!(
                provider = "deepseek",
                model = %cfg.model,
                base_url = %cfg.model_base_url,
                "using deepseek completion service"
            );
            Ok(Box::new(deepseek::DeepSeekService::new(client, cfg)?))
        }
        other => {
            warn!(provider = %other, "unsupported model provider configured");
            Err(anyhow!(
                "Unsupported MODEL_PROVIDER='{}'. Supported providers: deepseek.",
                other
            ))
        }
    }
}
