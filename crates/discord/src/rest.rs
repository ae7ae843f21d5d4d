use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use ebert_core::config::DiscordConfig;
use ebert_core::domain::chat::{ChannelId, GuildEmoji, GuildId, MessageId, MessageLocation};

use crate::interaction::EPHEMERAL_FLAG;
use crate::platform::{ChannelInfo, ChatPlatform, PlatformError};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// One REST endpoint, relative to the API base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route<'a> {
    GetChannel { channel_id: &'a str },
    GetMessage { channel_id: &'a str, message_id: &'a str },
    CreateMessage { channel_id: &'a str },
    EditMessage { channel_id: &'a str, message_id: &'a str },
    PinMessage { channel_id: &'a str, message_id: &'a str },
    UnpinMessage { channel_id: &'a str, message_id: &'a str },
    AddReaction { channel_id: &'a str, message_id: &'a str, emoji: String },
    GuildEmojis { guild_id: &'a str },
    ExecuteWebhook { application_id: &'a str, token: &'a str },
}

impl Route<'_> {
    pub fn method(&self) -> Method {
        match self {
            Self::GetChannel { .. } | Self::GetMessage { .. } | Self::GuildEmojis { .. } => {
                Method::GET
            }
            Self::CreateMessage { .. } | Self::ExecuteWebhook { .. } => Method::POST,
            Self::EditMessage { .. } => Method::PATCH,
            Self::PinMessage { .. } | Self::AddReaction { .. } => Method::PUT,
            Self::UnpinMessage { .. } => Method::DELETE,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::GetChannel { channel_id } => format!("channels/{channel_id}"),
            Self::GetMessage { channel_id, message_id }
            | Self::EditMessage { channel_id, message_id } => {
                format!("channels/{channel_id}/messages/{message_id}")
            }
            Self::CreateMessage { channel_id } => format!("channels/{channel_id}/messages"),
            Self::PinMessage { channel_id, message_id }
            | Self::UnpinMessage { channel_id, message_id } => {
                format!("channels/{channel_id}/pins/{message_id}")
            }
            Self::AddReaction { channel_id, message_id, emoji } => {
                format!("channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me")
            }
            Self::GuildEmojis { guild_id } => format!("guilds/{guild_id}/emojis"),
            Self::ExecuteWebhook { application_id, token } => {
                format!("webhooks/{application_id}/{token}")
            }
        }
    }

    /// Webhook calls authenticate with the interaction token in the path.
    fn uses_bot_token(&self) -> bool {
        !matches!(self, Self::ExecuteWebhook { .. })
    }
}

/// `name:id` with the colon percent-encoded, as the reaction endpoints expect.
fn reaction_path_segment(emoji: &GuildEmoji) -> String {
    emoji.reaction_key().replace(':', "%3A")
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    id: String,
    guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    id: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct EmojiPayload {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    animated: bool,
}

fn guild_emojis_from(payload: Vec<EmojiPayload>) -> Vec<GuildEmoji> {
    payload
        .into_iter()
        .filter_map(|emoji| {
            Some(GuildEmoji { id: emoji.id?, name: emoji.name?, animated: emoji.animated })
        })
        .collect()
}

/// [`ChatPlatform`] over the Discord REST API v10 with a bot token.
#[derive(Clone, Debug)]
pub struct DiscordRestClient {
    http: Client,
    base_url: Url,
    token: SecretString,
    application_id: String,
}

impl DiscordRestClient {
    pub fn new(
        token: SecretString,
        application_id: impl Into<String>,
    ) -> Result<Self, PlatformError> {
        Self::with_base_url(DEFAULT_API_BASE, token, application_id)
    }

    pub fn with_base_url(
        base_url: &str,
        token: SecretString,
        application_id: impl Into<String>,
    ) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!(
                "DiscordBot (https://github.com/ebert-bot/ebert, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()
            .map_err(|error| PlatformError::Transport(error.to_string()))?;
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|error| PlatformError::Transport(format!("bad api base url: {error}")))?;

        Ok(Self { http, base_url, token, application_id: application_id.into() })
    }

    pub fn from_config(config: &DiscordConfig) -> Result<Self, PlatformError> {
        Self::new(config.token.clone(), config.application_id.clone())
    }

    fn request(&self, route: &Route<'_>) -> Result<RequestBuilder, PlatformError> {
        let url = self
            .base_url
            .join(&route.path())
            .map_err(|error| PlatformError::Transport(error.to_string()))?;
        let builder = self.http.request(route.method(), url);
        if route.uses_bot_token() {
            Ok(builder.header("Authorization", format!("Bot {}", self.token.expose_secret())))
        } else {
            Ok(builder)
        }
    }

    async fn send(
        &self,
        route: Route<'_>,
        builder: RequestBuilder,
    ) -> Result<Response, PlatformError> {
        let response = builder.send().await.map_err(|error| {
            let error = error.without_url();
            warn!(
                event_name = "discord.request_failed",
                route = %route.path(),
                error = %error,
                "discord request failed"
            );
            PlatformError::Transport(error.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(
                event_name = "discord.request",
                method = %route.method(),
                status = status.as_u16(),
                "discord request completed"
            );
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            event_name = "discord.request_rejected",
            method = %route.method(),
            status = status.as_u16(),
            body = %body,
            "discord rejected request"
        );
        Err(PlatformError::Status { status: status.as_u16(), body })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        route: Route<'_>,
        builder: RequestBuilder,
    ) -> Result<T, PlatformError> {
        self.send(route, builder)
            .await?
            .json::<T>()
            .await
            .map_err(|error| PlatformError::Decode(error.to_string()))
    }
}

#[async_trait]
impl ChatPlatform for DiscordRestClient {
    async fn fetch_channel(&self, channel_id: &ChannelId) -> Result<ChannelInfo, PlatformError> {
        let route = Route::GetChannel { channel_id: &channel_id.0 };
        let builder = self.request(&route)?;
        let channel: ChannelPayload = self.send_json(route, builder).await?;
        Ok(ChannelInfo { id: ChannelId(channel.id), guild_id: channel.guild_id.map(GuildId) })
    }

    async fn fetch_message(&self, location: &MessageLocation) -> Result<(), PlatformError> {
        let route = Route::GetMessage {
            channel_id: &location.channel_id.0,
            message_id: &location.message_id.0,
        };
        let builder = self.request(&route)?;
        self.send_json::<MessagePayload>(route, builder).await.map(|_| ())
    }

    async fn send_message(
        &self,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<MessageLocation, PlatformError> {
        let route = Route::CreateMessage { channel_id: &channel_id.0 };
        let builder = self.request(&route)?.json(&json!({ "content": content }));
        let message: MessagePayload = self.send_json(route, builder).await?;
        Ok(MessageLocation {
            channel_id: ChannelId(message.channel_id),
            message_id: MessageId(message.id),
        })
    }

    async fn edit_message(
        &self,
        location: &MessageLocation,
        content: &str,
    ) -> Result<(), PlatformError> {
        let route = Route::EditMessage {
            channel_id: &location.channel_id.0,
            message_id: &location.message_id.0,
        };
        let builder = self.request(&route)?.json(&json!({ "content": content }));
        self.send(route, builder).await.map(|_| ())
    }

    async fn pin_message(&self, location: &MessageLocation) -> Result<(), PlatformError> {
        let route = Route::PinMessage {
            channel_id: &location.channel_id.0,
            message_id: &location.message_id.0,
        };
        let builder = self.request(&route)?;
        self.send(route, builder).await.map(|_| ())
    }

    async fn unpin_message(&self, location: &MessageLocation) -> Result<(), PlatformError> {
        let route = Route::UnpinMessage {
            channel_id: &location.channel_id.0,
            message_id: &location.message_id.0,
        };
        let builder = self.request(&route)?;
        self.send(route, builder).await.map(|_| ())
    }

    async fn add_reaction(
        &self,
        location: &MessageLocation,
        emoji: &GuildEmoji,
    ) -> Result<(), PlatformError> {
        let route = Route::AddReaction {
            channel_id: &location.channel_id.0,
            message_id: &location.message_id.0,
            emoji: reaction_path_segment(emoji),
        };
        let builder = self.request(&route)?;
        self.send(route, builder).await.map(|_| ())
    }

    async fn guild_emojis(&self, guild_id: &GuildId) -> Result<Vec<GuildEmoji>, PlatformError> {
        let route = Route::GuildEmojis { guild_id: &guild_id.0 };
        let builder = self.request(&route)?;
        let emojis: Vec<EmojiPayload> = self.send_json(route, builder).await?;
        Ok(guild_emojis_from(emojis))
    }

    async fn send_followup(
        &self,
        interaction_token: &str,
        content: &str,
    ) -> Result<(), PlatformError> {
        let route = Route::ExecuteWebhook {
            application_id: &self.application_id,
            token: interaction_token,
        };
        let builder =
            self.request(&route)?.json(&json!({ "content": content, "flags": EPHEMERAL_FLAG }));
        self.send(route, builder).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use ebert_core::domain::chat::GuildEmoji;

    use super::{guild_emojis_from, reaction_path_segment, DiscordRestClient, EmojiPayload, Route};

    #[test]
    fn routes_map_to_rest_endpoints() {
        let pin = Route::PinMessage { channel_id: "1", message_id: "2" };
        let unpin = Route::UnpinMessage { channel_id: "1", message_id: "2" };
        let edit = Route::EditMessage { channel_id: "1", message_id: "2" };
        let followup = Route::ExecuteWebhook { application_id: "42", token: "tok" };

        assert_eq!((pin.method(), pin.path()), (Method::PUT, "channels/1/pins/2".to_owned()));
        assert_eq!(unpin.method(), Method::DELETE);
        assert_eq!((edit.method(), edit.path()), (Method::PATCH, "channels/1/messages/2".to_owned()));
        assert_eq!(followup.path(), "webhooks/42/tok");
        assert!(!followup.uses_bot_token());
        assert!(pin.uses_bot_token());
    }

    #[test]
    fn reaction_route_encodes_custom_emoji() {
        let emoji = GuildEmoji { id: "77".to_owned(), name: "shark".to_owned(), animated: false };
        let route = Route::AddReaction {
            channel_id: "1",
            message_id: "2",
            emoji: reaction_path_segment(&emoji),
        };

        assert_eq!(route.method(), Method::PUT);
        assert_eq!(route.path(), "channels/1/messages/2/reactions/shark%3A77/@me");
    }

    #[test]
    fn unicode_emoji_are_dropped_from_guild_list() {
        let emojis = guild_emojis_from(vec![
            EmojiPayload { id: Some("77".to_owned()), name: Some("shark".to_owned()), animated: false },
            EmojiPayload { id: None, name: Some("🍿".to_owned()), animated: false },
        ]);

        assert_eq!(emojis.len(), 1);
        assert_eq!(emojis[0].name, "shark");
    }

    #[test]
    fn request_urls_join_onto_versioned_base() {
        let client = DiscordRestClient::with_base_url(
            "https://discord.com/api/v10",
            "bot-token".to_owned().into(),
            "42",
        )
        .expect("client");
        let request = client
            .request(&Route::GetChannel { channel_id: "8" })
            .expect("builder")
            .build()
            .expect("request");

        assert_eq!(request.url().as_str(), "https://discord.com/api/v10/channels/8");
        assert_eq!(
            request.headers().get("Authorization").and_then(|value| value.to_str().ok()),
            Some("Bot bot-token")
        );
    }
}
