use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use ebert_core::domain::chat::{ChannelId, GuildId, UserId};
use ebert_core::errors::{ApplicationError, CommandKind};

use crate::interaction::{CommandData, CommandOption, Interaction};

pub const ROOT_COMMAND: &str = "ebert";
pub const POLL_GROUP: &str = "poll";
pub const SUGGEST_COMMAND: &str = "movie";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollCommand {
    Start,
    End { winner: String },
    Suggest { title: String, year: Option<String> },
}

impl PollCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Start => CommandKind::Start,
            Self::End { .. } => CommandKind::End,
            Self::Suggest { .. } => CommandKind::Suggest,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "poll.start",
            Self::End { .. } => "poll.end",
            Self::Suggest { .. } => "movie",
        }
    }
}

/// Who invoked a command, where, and how to reach them with the follow-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub interaction_id: String,
    pub application_id: String,
    pub token: String,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub user_id: UserId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("interaction carries no command data")]
    MissingData,
    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),
    #[error("missing required option `{0}`")]
    MissingOption(&'static str),
    #[error("interaction has no {0}")]
    MissingContext(&'static str),
}

pub fn parse_command(data: &CommandData) -> Result<PollCommand, CommandParseError> {
    match data.name.as_str() {
        ROOT_COMMAND => parse_ebert(&data.options),
        SUGGEST_COMMAND => {
            let title = required_text(&data.options, "movie")?;
            let year = optional_text(&data.options, "year");
            Ok(PollCommand::Suggest { title, year })
        }
        other => Err(CommandParseError::UnsupportedCommand(other.to_owned())),
    }
}

fn parse_ebert(options: &[CommandOption]) -> Result<PollCommand, CommandParseError> {
    let group = options
        .iter()
        .find(|option| option.name == POLL_GROUP)
        .ok_or_else(|| CommandParseError::UnsupportedCommand(ROOT_COMMAND.to_owned()))?;
    let sub = group
        .options
        .first()
        .ok_or_else(|| CommandParseError::UnsupportedCommand(format!("{ROOT_COMMAND} {POLL_GROUP}")))?;

    match sub.name.as_str() {
        "start" => Ok(PollCommand::Start),
        "end" => Ok(PollCommand::End { winner: required_text(&sub.options, "winner")? }),
        other => Err(CommandParseError::UnsupportedCommand(format!(
            "{ROOT_COMMAND} {POLL_GROUP} {other}"
        ))),
    }
}

fn optional_text(options: &[CommandOption], name: &str) -> Option<String> {
    options.iter().find(|option| option.name == name).and_then(CommandOption::text_value)
}

fn required_text(options: &[CommandOption], name: &'static str) -> Result<String, CommandParseError> {
    optional_text(options, name).ok_or(CommandParseError::MissingOption(name))
}

pub fn envelope_for(interaction: &Interaction) -> Result<CommandEnvelope, CommandParseError> {
    let channel_id =
        interaction.channel_id.clone().ok_or(CommandParseError::MissingContext("channel"))?;
    let user = interaction.invoking_user().ok_or(CommandParseError::MissingContext("user"))?;

    Ok(CommandEnvelope {
        interaction_id: interaction.id.clone(),
        application_id: interaction.application_id.clone(),
        token: interaction.token.clone(),
        guild_id: interaction.guild_id.clone().map(GuildId),
        channel_id: ChannelId(channel_id),
        user_id: UserId(user.id.clone()),
    })
}

/// The movie-night operations behind the slash commands. Each returns the
/// follow-up text on success.
#[async_trait]
pub trait PollCommandService: Send + Sync {
    async fn start_poll(&self, envelope: &CommandEnvelope) -> Result<String, ApplicationError>;

    async fn end_poll(
        &self,
        winner: &str,
        envelope: &CommandEnvelope,
    ) -> Result<String, ApplicationError>;

    async fn suggest_movie(
        &self,
        title: &str,
        year: Option<&str>,
        envelope: &CommandEnvelope,
    ) -> Result<String, ApplicationError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: PollCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Runs `command` and returns the text for its follow-up, success or not.
    pub async fn route(&self, command: &PollCommand, envelope: &CommandEnvelope) -> String {
        let result = match command {
            PollCommand::Start => self.service.start_poll(envelope).await,
            PollCommand::End { winner } => self.service.end_poll(winner, envelope).await,
            PollCommand::Suggest { title, year } => {
                self.service.suggest_movie(title, year.as_deref(), envelope).await
            }
        };

        match result {
            Ok(text) => {
                info!(
                    event_name = "command.completed",
                    correlation_id = %envelope.interaction_id,
                    command = command.label(),
                    "command completed"
                );
                text
            }
            Err(error) => {
                warn!(
                    event_name = "command.rejected",
                    correlation_id = %envelope.interaction_id,
                    command = command.label(),
                    error = %error,
                    "command rejected"
                );
                error.user_message(command.kind())
            }
        }
    }
}
