use async_trait::async_trait;
use thiserror::Error;

use ebert_core::domain::chat::{ChannelId, GuildEmoji, GuildId, MessageLocation};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    /// `None` for DM channels.
    pub guild_id: Option<GuildId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("resource not found")]
    NotFound,
    #[error("discord returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("discord request failed: {0}")]
    Transport(String),
    #[error("discord response could not be decoded: {0}")]
    Decode(String),
}

/// Outbound chat operations the poll service needs.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn fetch_channel(&self, channel_id: &ChannelId) -> Result<ChannelInfo, PlatformError>;

    async fn fetch_message(&self, location: &MessageLocation) -> Result<(), PlatformError>;

    async fn send_message(
        &self,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<MessageLocation, PlatformError>;

    async fn edit_message(
        &self,
        location: &MessageLocation,
        content: &str,
    ) -> Result<(), PlatformError>;

    async fn pin_message(&self, location: &MessageLocation) -> Result<(), PlatformError>;

    async fn unpin_message(&self, location: &MessageLocation) -> Result<(), PlatformError>;

    async fn add_reaction(
        &self,
        location: &MessageLocation,
        emoji: &GuildEmoji,
    ) -> Result<(), PlatformError>;

    async fn guild_emojis(&self, guild_id: &GuildId) -> Result<Vec<GuildEmoji>, PlatformError>;

    /// Sends the ephemeral follow-up for a deferred interaction.
    async fn send_followup(&self, interaction_token: &str, content: &str)
        -> Result<(), PlatformError>;
}
