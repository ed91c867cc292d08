//! `hypersec serve` - webhook server, Telegram bot and alert digests in one process

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::actions::{ActionExecutor, ActionRegistry, ACTIONS_FILE};
use crate::ai::{AnthropicClient, AnthropicConfig, GeminiClient, GeminiConfig, LanguageModel};
use crate::config::AppConfig;
use crate::conversation::{ConversationRouter, PromptContext};
use crate::ingest::{self, IngestionGateway, WebhookSecrets};
use crate::notification::channels::TelegramChannel;
use crate::notification::{AlertDispatcher, NotificationStore, StoreLock};
use crate::telegram::{AllowedUsers, TelegramApi, TelegramBot};

/// How often closed throttle windows are reported
const DIGEST_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Webhook port (overrides WEBHOOK_PORT)
    #[arg(long, short)]
    pub port: Option<u16>,
    /// Log alerts instead of sending them
    #[arg(long)]
    pub dry_run: bool,
    /// Webhooks only; do not start the Telegram bot
    #[arg(long)]
    pub no_bot: bool,
}

/// Apply CLI overrides on top of the resolved config
pub fn apply_overrides(mut config: AppConfig, args: &ServeArgs) -> AppConfig {
    if let Some(port) = args.port {
        config.webhook_port = port;
    }
    config
}

pub fn webhook_secrets(config: &AppConfig) -> WebhookSecrets {
    let mut secrets = WebhookSecrets::shared(config.webhook_secret.clone());
    if let Some(s) = &config.email_webhook_secret {
        secrets = secrets.with_email(s.clone());
    }
    if let Some(s) = &config.notify_webhook_secret {
        secrets = secrets.with_notify(s.clone());
    }
    secrets
}

/// Fast model: Gemini when configured, otherwise Claude
fn build_models(config: &AppConfig) -> Result<(Option<Arc<dyn LanguageModel>>, Option<Arc<dyn LanguageModel>>)> {
    let deep: Option<Arc<dyn LanguageModel>> = match &config.anthropic_api_key {
        Some(key) => {
            let client = AnthropicClient::new(
                AnthropicConfig::new(key.clone())
                    .with_base_url(&config.anthropic_base_url)
                    .with_model(config.claude_model.clone())
                    .with_timeout_ms(config.model_timeout_ms),
            )?;
            let model: Arc<dyn LanguageModel> = Arc::new(client);
            Some(model)
        }
        None => None,
    };

    let fast: Option<Arc<dyn LanguageModel>> = match &config.google_api_key {
        Some(key) => {
            let client = GeminiClient::new(
                GeminiConfig::new(key.clone())
                    .with_model(config.gemini_model.clone())
                    .with_timeout_ms(config.model_timeout_ms),
            )?;
            let model: Arc<dyn LanguageModel> = Arc::new(client);
            Some(model)
        }
        None => deep.clone(),
    };

    Ok((fast, deep))
}

pub async fn handle_serve(config: AppConfig, args: ServeArgs) -> Result<()> {
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let _lock = StoreLock::acquire(&config.data_dir)?;
    let store = Arc::new(NotificationStore::open(&config.data_dir).context("Cannot open inbox store")?);

    let telegram = match (&config.telegram_token, args.no_bot) {
        (Some(token), false) => Some(TelegramApi::new(token, &config.telegram_api_base)?),
        _ => None,
    };

    let mut dispatcher = AlertDispatcher::new().with_dry_run(args.dry_run);
    if let Some(api) = &telegram {
        dispatcher.register_channel(Arc::new(TelegramChannel::new(api.clone(), config.allowed_users.clone())));
    }
    let dispatcher = Arc::new(dispatcher);

    let gateway = Arc::new(IngestionGateway::new(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
        webhook_secrets(&config),
    ));
    let server = tokio::spawn(ingest::serve(config.webhook_port, gateway));

    let digests = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DIGEST_INTERVAL);
            loop {
                ticker.tick().await;
                let sent = dispatcher.flush_digests();
                if sent > 0 {
                    info!(sent, "Sent alert digests");
                }
            }
        })
    };

    let bot = match telegram {
        Some(api) => {
            let (fast, deep) = build_models(&config)?;
            let fast = fast.context("No language model configured; set GOOGLE_API_KEY or ANTHROPIC_API_KEY")?;

            let registry = Arc::new(ActionRegistry::load(&config.home_dir.join(ACTIONS_FILE)));
            let executor = Arc::new(ActionExecutor::new(registry)?);
            let prompt = Arc::new(PromptContext::load(&config.home_dir));

            let mut router = ConversationRouter::new(Arc::clone(&store), executor, fast, prompt);
            if let Some(deep) = deep {
                router = router.with_deep_model(deep);
            }

            let bot = TelegramBot::new(api, Arc::new(router), AllowedUsers::new(config.allowed_users.clone()));
            Some(tokio::spawn(bot.run()))
        }
        None => {
            info!("Telegram bot disabled; serving webhooks only");
            None
        }
    };

    info!(port = config.webhook_port, "🤖 Hypersecretary online");

    let bot_done = async {
        match bot {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    let result = tokio::select! {
        res = server => res.context("Webhook server task panicked")?,
        res = bot_done => res.context("Telegram task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    digests.abort();
    result
}
