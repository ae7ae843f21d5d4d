pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod polls;

pub use catalog::{CatalogEntry, CatalogError, MovieCatalog, SuggestionQuery};
pub use domain::chat::{ChannelId, GuildEmoji, GuildId, MessageId, MessageLocation, UserId};
pub use domain::movie::{ExternalId, Movie, MovieId, MovieLookup, NewMovie};
pub use domain::poll::{Poll, PollId, PollOption, PollState};
pub use errors::{ApplicationError, CommandKind, LookupTarget, PollError};
