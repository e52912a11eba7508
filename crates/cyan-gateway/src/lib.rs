//! # cyan-gateway
//!
//! Client-side session engine for the bot WebSocket gateway: connects, identifies
//! with the intents the registered events need, keeps the session alive with
//! heartbeats, resumes dropped connections and hands dispatch events to typed
//! handlers.
//!
//! ```no_run
//! use cyan_gateway::events::ChannelMessageReceived;
//! use cyan_gateway::GatewayClient;
//!
//! # async fn run(config: cyan_common::AppConfig) -> anyhow::Result<()> {
//! let client = GatewayClient::from_config(&config)?;
//! client.listen_payload::<ChannelMessageReceived, _, _>(|message| async move {
//!     tracing::info!(content = %message.content, "mentioned");
//!     Ok(())
//! })?;
//! client.connect().await?;
//! client.wait_until_stopped().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod intents;
pub mod protocol;
pub mod session;

pub use connection::{HttpTransport, Method, RestTransport};
pub use error::{GatewayError, GatewayResult};
pub use events::Event;
pub use intents::Intents;
pub use session::{GatewayClient, GatewayConfig, SessionState};
