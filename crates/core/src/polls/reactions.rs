use std::collections::BTreeSet;

use rand::seq::IteratorRandom;
use rand::Rng;

use crate::domain::poll::Poll;
use crate::errors::PollError;

/// Emoji names from `available` that the poll has not assigned yet, sorted and deduplicated.
pub fn unused_reactions<'a, I>(poll: &Poll, available: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let used: BTreeSet<&str> = poll.used_reactions().collect();
    available
        .into_iter()
        .filter(|name| !used.contains(*name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Picks an unused reaction uniformly at random.
pub fn pick_reaction<'a, I, R>(poll: &Poll, available: I, rng: &mut R) -> Result<String, PollError>
where
    I: IntoIterator<Item = &'a str>,
    R: Rng + ?Sized,
{
    unused_reactions(poll, available)
        .into_iter()
        .choose(rng)
        .map(str::to_owned)
        .ok_or(PollError::NoReactionsLeft)
}
