//! Movie poll lifecycle: pure transitions, reaction assignment and rendering.

pub mod machine;
pub mod reactions;
pub mod render;

pub use machine::{add_option, close, find_winner, select_candidate, start, suggest, SuggestionPlan};
pub use reactions::{pick_reaction, unused_reactions};
pub use render::{announcement, render, EmojiResolver, GuildEmojis};
