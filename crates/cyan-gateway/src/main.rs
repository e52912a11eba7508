//! Gateway bot entry point
//!
//! Connects to the gateway and logs what it receives.
//!
//! Run with:
//! ```bash
//! CYAN_APP_ID=... CYAN_TOKEN=... cargo run -p cyan-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use cyan_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use cyan_gateway::events::{ChannelMessageReceived, GuildCreated, ReadyEvent};
use cyan_gateway::{GatewayClient, RestTransport};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Gateway session failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(env = ?config.app.env, bot = ?config.bot, "Starting Cyan gateway bot...");

    let client = GatewayClient::from_config(&config)?;

    client.listen_payload::<ReadyEvent, _, _>(|ready| async move {
        info!(
            session_id = %ready.session_id,
            user = %ready.user.username,
            shard = ?ready.shard,
            "Bot is ready"
        );
        Ok(())
    })?;

    client.listen_payload::<GuildCreated, _, _>(|guild| async move {
        info!(guild_id = %guild.id, name = %guild.name, "Joined guild");
        Ok(())
    })?;

    client.listen::<ChannelMessageReceived, _, _>(|message, client| async move {
        info!(
            channel_id = %message.channel_id,
            author = %message.author.username,
            content = %message.content,
            seq = client.last_sequence(),
            "Mentioned in channel"
        );
        Ok(())
    })?;

    client.on_started(|client| async move {
        let user = client.transport().get_json("/users/@me").await?;
        info!(id = %user["id"], username = %user["username"], "Bot user loaded");
        Ok(())
    });

    client.connect().await?;
    info!(intents = ?client.intents(), "Gateway connected");

    tokio::select! {
        result = client.wait_until_stopped() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received");
            client.disconnect().await?;
        }
    }

    Ok(())
}
