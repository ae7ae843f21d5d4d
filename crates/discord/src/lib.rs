//! Discord integration over HTTP interactions
//!
//! This crate provides the Discord interface for ebert:
//! - **Interactions** (`interaction`) - payload types, responses, Ed25519 request verification
//! - **Commands** (`commands`) - `/ebert poll start`, `/ebert poll end`, `/movie`
//! - **Platform** (`platform`) - the `ChatPlatform` seam used by the poll service
//! - **REST** (`rest`) - `DiscordRestClient`, a REST API v10 implementation of `ChatPlatform`
//! - **Dispatch** (`dispatch`) - deferred acknowledgement plus exactly one follow-up per command
//!
//! # Getting Started
//!
//! 1. Create an application at https://discord.com/developers/applications
//! 2. Point its Interactions Endpoint URL at `https://<host>/interactions`
//! 3. Register `/ebert poll start`, `/ebert poll end winner:` and `/movie movie: year:`
//! 4. Set env vars: `EBERT_DISCORD_TOKEN`, `EBERT_DISCORD_APPLICATION_ID`, `EBERT_DISCORD_PUBLIC_KEY`
//!
//! # Architecture
//!
//! ```text
//! POST /interactions → SignatureVerifier → InteractionDispatcher → CommandRouter → PollCommandService
//!                                              ↓                                      ↓
//!                                  deferred ack (type 5)              ChatPlatform follow-up
//! ```

pub mod commands;
pub mod dispatch;
pub mod interaction;
pub mod platform;
pub mod rest;

pub use commands::{CommandEnvelope, CommandRouter, PollCommand, PollCommandService};
pub use dispatch::{Dispatch, FollowupHandle, InteractionDispatcher};
pub use interaction::{Interaction, InteractionResponse, SignatureError, SignatureVerifier};
pub use platform::{ChannelInfo, ChatPlatform, PlatformError};
pub use rest::DiscordRestClient;
