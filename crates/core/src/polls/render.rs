//! Text of the pinned status message and of the suggestion announcement.

use std::collections::HashMap;

use crate::domain::chat::{GuildEmoji, UserId};
use crate::domain::movie::Movie;
use crate::domain::poll::Poll;

pub const OPEN_HEADER: &str = "Vote on the next Movie Night Movie!";
pub const OPEN_FOOTER: &str = "To vote, click a react, or add another movie through ``/movie``";

/// Turns an emoji name stored on a poll option into inline message markup.
pub trait EmojiResolver {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Resolver backed by the guild's custom emoji list.
#[derive(Clone, Debug, Default)]
pub struct GuildEmojis {
    by_name: HashMap<String, GuildEmoji>,
}

impl GuildEmojis {
    pub fn new(emojis: impl IntoIterator<Item = GuildEmoji>) -> Self {
        let by_name = emojis.into_iter().map(|emoji| (emoji.name.clone(), emoji)).collect();
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&GuildEmoji> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl EmojiResolver for GuildEmojis {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name).map(GuildEmoji::markup)
    }
}

fn movie_line(emoji: &str, movie: &Movie) -> String {
    match movie.catalog_url() {
        Some(url) => format!("- {emoji} {} (<{url}>)", movie.title),
        None => format!("- {emoji} {}", movie.title),
    }
}

/// Body of the pinned status message for `poll`.
///
/// Open polls list every option in insertion order; an emoji the resolver
/// does not know renders as its bare name. Closed polls show the winner.
pub fn render(poll: &Poll, emojis: &dyn EmojiResolver) -> String {
    if !poll.open {
        let winner = poll.winning_movie().map(|movie| movie.title.as_str()).unwrap_or_default();
        return format!("Next Movie Night Movie: {winner}");
    }

    let mut lines = vec![OPEN_HEADER.to_owned()];
    for option in &poll.options {
        let emoji = emojis.resolve(&option.react).unwrap_or_else(|| option.react.clone());
        lines.push(movie_line(&emoji, &option.movie));
    }
    lines.push(String::new());
    lines.push(OPEN_FOOTER.to_owned());
    lines.join("\n")
}

/// Channel message posted after a movie joins the poll.
pub fn announcement(movie: &Movie, suggested_by: &UserId) -> String {
    match movie.catalog_url() {
        Some(url) => {
            format!("Added {} (<{url}>), suggested by {}", movie.title, suggested_by.mention())
        }
        None => format!("Added {}, suggested by {}", movie.title, suggested_by.mention()),
    }
}
