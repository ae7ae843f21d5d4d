use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupTarget {
    Channel,
    Message,
}

impl LookupTarget {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Message => "message",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("a poll is already open")]
    AlreadyOpen,
    #[error("no poll is open")]
    NotOpen,
    #[error("no catalog match for `{query}`")]
    NotFound { query: String },
    #[error("{matches} catalog matches for `{query}`")]
    Ambiguous { query: String, matches: usize },
    #[error("`{query}` is already an option")]
    AlreadySuggested { query: String },
    #[error("no unused reactions left")]
    NoReactionsLeft,
    #[error("reaction `{react}` is already assigned in this poll")]
    ReactionInUse { react: String },
    #[error("`{winner}` is not an option")]
    NoSuchOption { winner: String },
    #[error("could not locate {}", .0.label())]
    ExternalLookupFailed(LookupTarget),
    #[error("invalid input: {value}")]
    InvalidInput { value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

/// Which command produced an error; some texts differ per command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    End,
    Suggest,
}

impl ApplicationError {
    /// The follow-up text shown to the invoking user.
    pub fn user_message(&self, command: CommandKind) -> String {
        let Self::Poll(error) = self else {
            return match self {
                Self::Integration(_) => {
                    "Could not reach an external service, please try again later.".to_owned()
                }
                _ => "Oops! We encountered an unexpected error on our end.".to_owned(),
            };
        };

        match (error, command) {
            (PollError::AlreadyOpen, _) => {
                "Could not start a movie poll, there is already an open one.".to_owned()
            }
            (PollError::NotOpen, CommandKind::End) => {
                "Could not end a movie poll, there isn't an open one.".to_owned()
            }
            (PollError::NotOpen, _) => "No open movie night polls".to_owned(),
            (PollError::NoSuchOption { winner }, _) => {
                format!("Could not end a movie poll, ``{winner}`` isn't an option.")
            }
            (PollError::NotFound { query }, _) => {
                format!("Could not find any movies in https://www.themoviedb.org for {query}")
            }
            (PollError::Ambiguous { query, .. }, _) => {
                format!("Multiple movies found for {query}, try adding a release year.")
            }
            (PollError::AlreadySuggested { query }, _) => {
                format!("{query} is already an option, try voting for it.")
            }
            (PollError::NoReactionsLeft, _) => {
                "No available emoji left, maybe next raid night?".to_owned()
            }
            (PollError::ReactionInUse { .. }, _) => {
                "That reaction is already taken, please try again.".to_owned()
            }
            (PollError::ExternalLookupFailed(LookupTarget::Channel), _) => {
                "Could not locate channel".to_owned()
            }
            (PollError::ExternalLookupFailed(LookupTarget::Message), _) => {
                "Could not locate message".to_owned()
            }
            (PollError::InvalidInput { value }, _) => format!("{value} is not a valid year."),
        }
    }
}
