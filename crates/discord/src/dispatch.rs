use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::commands::{
    envelope_for, parse_command, CommandParseError, CommandRouter, PollCommandService,
};
use crate::interaction::{Interaction, InteractionKind, InteractionResponse};
use crate::platform::ChatPlatform;

/// What to answer on the HTTP request, plus the pending follow-up if any.
pub struct Dispatch {
    pub response: InteractionResponse,
    pub followup: Option<FollowupHandle>,
}

/// A spawned follow-up that waits until the acknowledgement is on its way.
pub struct FollowupHandle {
    release: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl FollowupHandle {
    /// Lets the follow-up run. Dropping the handle instead aborts it.
    pub fn release(self) -> JoinHandle<()> {
        let _ = self.release.send(());
        self.task
    }
}

pub struct InteractionDispatcher<S> {
    router: Arc<CommandRouter<S>>,
    platform: Arc<dyn ChatPlatform>,
    followups: TaskTracker,
}

impl<S> Clone for InteractionDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            platform: Arc::clone(&self.platform),
            followups: self.followups.clone(),
        }
    }
}

impl<S> InteractionDispatcher<S>
where
    S: PollCommandService + 'static,
{
    pub fn new(router: Arc<CommandRouter<S>>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { router, platform, followups: TaskTracker::new() }
    }

    /// Stops accepting follow-ups and waits for every spawned one to finish.
    pub async fn drain(&self) {
        self.followups.close();
        self.followups.wait().await;
    }

    pub fn dispatch(&self, interaction: Interaction) -> Dispatch {
        match interaction.kind() {
            InteractionKind::Ping => {
                debug!(event_name = "interaction.ping", correlation_id = %interaction.id, "ping");
                Dispatch { response: InteractionResponse::pong(), followup: None }
            }
            InteractionKind::ApplicationCommand => Dispatch {
                response: InteractionResponse::deferred_ephemeral(),
                followup: Some(self.dispatch_command(interaction)),
            },
            InteractionKind::Other(code) => {
                warn!(
                    event_name = "interaction.unsupported",
                    correlation_id = %interaction.id,
                    kind = code,
                    "unsupported interaction type"
                );
                Dispatch {
                    response: InteractionResponse::ephemeral_message(
                        "Unsupported interaction.",
                    ),
                    followup: None,
                }
            }
        }
    }

    fn dispatch_command(&self, interaction: Interaction) -> FollowupHandle {
        let parsed = interaction
            .data
            .as_ref()
            .ok_or(CommandParseError::MissingData)
            .and_then(parse_command)
            .and_then(|command| Ok((command, envelope_for(&interaction)?)));

        match parsed {
            Ok((command, envelope)) => {
                info!(
                    event_name = "command.received",
                    correlation_id = %envelope.interaction_id,
                    command = command.label(),
                    user_id = %envelope.user_id.0,
                    "command received"
                );
                let router = Arc::clone(&self.router);
                let token = envelope.token.clone();
                let correlation_id = envelope.interaction_id.clone();
                self.defer(token, correlation_id, command.label(), async move {
                    router.route(&command, &envelope).await
                })
            }
            Err(error) => {
                warn!(
                    event_name = "interaction.malformed",
                    correlation_id = %interaction.id,
                    error = %error,
                    "could not parse command"
                );
                let text = format!("Could not handle that command: {error}");
                self.defer(interaction.token, interaction.id, "unparsed", async move { text })
            }
        }
    }

    /// Spawns `work` behind a gate and posts its text as the single follow-up.
    fn defer<F>(
        &self,
        token: String,
        correlation_id: String,
        command: &'static str,
        work: F,
    ) -> FollowupHandle
    where
        F: Future<Output = String> + Send + 'static,
    {
        let (release, gate) = oneshot::channel::<()>();
        let platform = Arc::clone(&self.platform);
        let task = self.followups.spawn(async move {
            if gate.await.is_err() {
                warn!(
                    event_name = "command.followup_aborted",
                    correlation_id = %correlation_id,
                    command,
                    "acknowledgement was never sent, dropping command"
                );
                return;
            }

            let text = work.await;
            if let Err(error) = platform.send_followup(&token, &text).await {
                warn!(
                    event_name = "command.followup_failed",
                    correlation_id = %correlation_id,
                    command,
                    error = %error,
                    "could not deliver follow-up"
                );
            }
        });

        FollowupHandle { release, task }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use ebert_core::domain::chat::{ChannelId, GuildEmoji, GuildId, MessageLocation};
    use ebert_core::errors::ApplicationError;

    use super::{FollowupHandle, InteractionDispatcher};
    use crate::commands::{CommandEnvelope, CommandRouter, PollCommandService};
    use crate::interaction::{Interaction, InteractionResponse};
    use crate::platform::{ChannelInfo, ChatPlatform, PlatformError};

    #[derive(Default)]
    struct FollowupRecorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatPlatform for FollowupRecorder {
        async fn fetch_channel(&self, _: &ChannelId) -> Result<ChannelInfo, PlatformError> {
            Err(PlatformError::NotFound)
        }

        async fn fetch_message(&self, _: &MessageLocation) -> Result<(), PlatformError> {
            Err(PlatformError::NotFound)
        }

        async fn send_message(
            &self,
            _: &ChannelId,
            _: &str,
        ) -> Result<MessageLocation, PlatformError> {
            Err(PlatformError::NotFound)
        }

        async fn edit_message(&self, _: &MessageLocation, _: &str) -> Result<(), PlatformError> {
            Err(PlatformError::NotFound)
        }

        async fn pin_message(&self, _: &MessageLocation) -> Result<(), PlatformError> {
            Err(PlatformError::NotFound)
        }

        async fn unpin_message(&self, _: &MessageLocation) -> Result<(), PlatformError> {
            Err(PlatformError::NotFound)
        }

        async fn add_reaction(
            &self,
            _: &MessageLocation,
            _: &GuildEmoji,
        ) -> Result<(), PlatformError> {
            Err(PlatformError::NotFound)
        }

        async fn guild_emojis(&self, _: &GuildId) -> Result<Vec<GuildEmoji>, PlatformError> {
            Ok(Vec::new())
        }

        async fn send_followup(&self, token: &str, content: &str) -> Result<(), PlatformError> {
            self.sent.lock().expect("sent").push((token.to_owned(), content.to_owned()));
            Ok(())
        }
    }

    struct StaticService;

    #[async_trait]
    impl PollCommandService for StaticService {
        async fn start_poll(&self, _: &CommandEnvelope) -> Result<String, ApplicationError> {
            Ok("Poll Started".to_owned())
        }

        async fn end_poll(&self, winner: &str, _: &CommandEnvelope) -> Result<String, ApplicationError> {
            Ok(format!("ended with {winner}"))
        }

        async fn suggest_movie(
            &self,
            title: &str,
            _: Option<&str>,
            _: &CommandEnvelope,
        ) -> Result<String, ApplicationError> {
            Ok(format!("suggested {title}"))
        }
    }

    fn dispatcher() -> (InteractionDispatcher<StaticService>, Arc<FollowupRecorder>) {
        let recorder = Arc::new(FollowupRecorder::default());
        let platform: Arc<dyn ChatPlatform> = recorder.clone();
        let dispatcher =
            InteractionDispatcher::new(Arc::new(CommandRouter::new(StaticService)), platform);
        (dispatcher, recorder)
    }

    fn start_interaction() -> Interaction {
        serde_json::from_value(json!({
            "id": "900", "application_id": "42", "type": 2, "token": "tok-900",
            "guild_id": "7", "channel_id": "8",
            "member": {"user": {"id": "55"}},
            "data": {"name": "ebert", "options": [
                {"name": "poll", "type": 2, "options": [{"name": "start", "type": 1}]}
            ]}
        }))
        .expect("interaction")
    }

    #[tokio::test]
    async fn ping_is_answered_without_followup() {
        let (dispatcher, recorder) = dispatcher();
        let ping: Interaction = serde_json::from_value(json!({
            "id": "1", "application_id": "42", "type": 1, "token": "t"
        }))
        .expect("ping");

        let dispatch = dispatcher.dispatch(ping);

        assert_eq!(dispatch.response, InteractionResponse::pong());
        assert!(dispatch.followup.is_none());
        assert!(recorder.sent.lock().expect("sent").is_empty());
    }

    #[tokio::test]
    async fn command_is_deferred_then_followed_up_once() {
        let (dispatcher, recorder) = dispatcher();

        let dispatch = dispatcher.dispatch(start_interaction());
        assert_eq!(dispatch.response, InteractionResponse::deferred_ephemeral());
        assert!(recorder.sent.lock().expect("sent").is_empty());

        dispatch.followup.expect("followup").release().await.expect("task");

        let sent = recorder.sent.lock().expect("sent").clone();
        assert_eq!(sent, vec![("tok-900".to_owned(), "Poll Started".to_owned())]);
    }

    #[tokio::test]
    async fn unreleased_followup_never_runs_the_command() {
        let (dispatcher, recorder) = dispatcher();

        let FollowupHandle { release, task } =
            dispatcher.dispatch(start_interaction()).followup.expect("followup");
        drop(release);
        task.await.expect("task");

        assert!(recorder.sent.lock().expect("sent").is_empty());
    }

    #[tokio::test]
    async fn malformed_command_gets_its_error_as_the_followup() {
        let (dispatcher, recorder) = dispatcher();
        let unknown: Interaction = serde_json::from_value(json!({
            "id": "2", "application_id": "42", "type": 2, "token": "tok-2",
            "channel_id": "8", "user": {"id": "55"},
            "data": {"name": "quote"}
        }))
        .expect("interaction");

        let dispatch = dispatcher.dispatch(unknown);
        assert_eq!(dispatch.response, InteractionResponse::deferred_ephemeral());
        assert!(recorder.sent.lock().expect("sent").is_empty());

        dispatch.followup.expect("followup").release().await.expect("task");

        let sent = recorder.sent.lock().expect("sent").clone();
        assert_eq!(
            sent,
            vec![(
                "tok-2".to_owned(),
                "Could not handle that command: unsupported command: quote".to_owned()
            )]
        );
    }

    #[tokio::test]
    async fn drain_waits_for_released_followups() {
        let (dispatcher, recorder) = dispatcher();

        let followup = dispatcher.dispatch(start_interaction()).followup.expect("followup");
        drop(followup.release());
        dispatcher.drain().await;

        assert_eq!(recorder.sent.lock().expect("sent").len(), 1);
    }
}
