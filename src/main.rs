use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = deep_chat::logging::init();
    deep_chat::run().await
}
