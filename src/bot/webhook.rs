//! Webhook mode implementation for the bot.
//!
//! Uses teloxide's axum webhook support to register the webhook with
//! Telegram and build the update route, then serves it next to a
//! `/healthz` probe. The webhook is deleted again on shutdown.

use std::net::SocketAddr;

use axum::routing::get;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::{error, info};

use super::dispatcher::ThrottledBot;
use crate::config::WebhookConfig;

/// Start the bot in webhook mode.
pub async fn start_webhook(
    webhook: &WebhookConfig,
    mut dispatcher: Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey>,
    bot: ThrottledBot,
) -> anyhow::Result<()> {
    // Listen on all interfaces at the configured port
    let address = SocketAddr::from(([0, 0, 0, 0], webhook.port));

    let mut options = Options::new(address, webhook.url.clone());
    if let Some(secret) = &webhook.secret {
        options = options.secret_token(secret.clone());
        info!("Webhook secret token configured");
    }

    info!("🔗 Setting webhook URL: {}", webhook.url);
    info!("📡 Listening on: {}", address);

    // Webhook setup only needs basic API access, so skip the throttle.
    let (listener, stop_flag, router) = webhooks::axum_to_router(bot.inner().clone(), options).await?;
    let app = router.route("/healthz", get(|| async { "ok" }));

    let tcp = tokio::net::TcpListener::bind(address).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(stop_flag).await {
            error!("Webhook server stopped: {}", e);
        }
    });

    info!("✅ Webhook setup complete, waiting for updates...");

    let error_handler = LoggingErrorHandler::with_custom_text("Error from update listener");
    dispatcher
        .dispatch_with_listener(listener, error_handler)
        .await;

    Ok(())
}
