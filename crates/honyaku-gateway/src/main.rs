use std::sync::Arc;

use tracing::info;

use honyaku_agent::{OpenAiProvider, TranslationGateway, TranslationPrompt};
use honyaku_core::config::HonyakuConfig;
use honyaku_pipeline::Pipeline;
use honyaku_telegram::{bot_from_config, TelegramAdapter, TelegramPlatform};

mod report;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "honyaku_gateway=info,honyaku_pipeline=info,honyaku_telegram=info,honyaku_agent=info"
                    .into()
            }),
        )
        .init();

    // load config: HONYAKU_CONFIG env > ~/.honyaku/honyaku.toml, then env overrides
    let config_path = std::env::var("HONYAKU_CONFIG").ok();
    let config = HonyakuConfig::load(config_path.as_deref())?;
    let tr = &config.translator;
    info!(
        mode = ?tr.mode,
        chats = tr.allow_chats.len(),
        merge_window_ms = tr.merge_window().as_millis() as u64,
        min_interval_ms = tr.min_interval().as_millis() as u64,
        model = %config.openai.model,
        "configuration loaded"
    );

    // translation backend
    let provider = OpenAiProvider::new(
        config.openai.api_key.clone(),
        Some(config.openai.base_url.clone()),
    );
    let prompt = TranslationPrompt::from_config(tr);
    let translator = Arc::new(TranslationGateway::from_config(
        Box::new(provider),
        prompt,
        &config.openai,
    ));

    // one Bot shared by the inbound dispatcher and the outbound platform
    let bot = bot_from_config(&config.telegram)?;
    let platform = Arc::new(TelegramPlatform::new(bot.clone()));

    let (report_tx, report_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(report::log_reports(report_rx));

    let pipeline = Arc::new(Pipeline::new(tr, translator, platform, Some(report_tx)));

    TelegramAdapter::new(bot, pipeline).run().await?;

    info!("honyaku-gateway shutting down");
    Ok(())
}
