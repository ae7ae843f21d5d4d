use chrono::{DateTime, Utc};
use rand::Rng;

use crate::catalog::{matching_entries, CatalogEntry, SuggestionQuery};
use crate::domain::movie::Movie;
use crate::domain::poll::{Poll, PollOption};
use crate::errors::PollError;
use crate::polls::reactions::pick_reaction;

/// An admitted suggestion: the catalog entry, the title to store it under and its reaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestionPlan {
    pub entry: CatalogEntry,
    pub title: String,
    pub react: String,
}

/// Opens a new empty poll unless `current` is still open.
pub fn start(current: Option<&Poll>, created_at: DateTime<Utc>) -> Result<Poll, PollError> {
    if current.is_some_and(|poll| poll.open) {
        return Err(PollError::AlreadyOpen);
    }

    Ok(Poll::new_open(created_at))
}

/// Narrows catalog results down to the single entry the user meant.
pub fn select_candidate(
    poll: &Poll,
    query: &SuggestionQuery,
    results: &[CatalogEntry],
) -> Result<CatalogEntry, PollError> {
    if !poll.open {
        return Err(PollError::NotOpen);
    }

    let matches = matching_entries(results, query);
    let entry = match matches.as_slice() {
        [] => return Err(PollError::NotFound { query: query.title.clone() }),
        [entry] => (*entry).clone(),
        _ => {
            return Err(PollError::Ambiguous { query: query.title.clone(), matches: matches.len() })
        }
    };

    if poll.contains_external_id(entry.id) {
        return Err(PollError::AlreadySuggested { query: query.title.clone() });
    }

    Ok(entry)
}

/// Admits one catalog entry into `poll` and assigns it an unused reaction.
/// The movie row itself is resolved by the caller before [`add_option`].
pub fn suggest<'a, I, R>(
    poll: &Poll,
    query: &SuggestionQuery,
    results: &[CatalogEntry],
    available: I,
    rng: &mut R,
) -> Result<SuggestionPlan, PollError>
where
    I: IntoIterator<Item = &'a str>,
    R: Rng + ?Sized,
{
    let entry = select_candidate(poll, query, results)?;
    let react = pick_reaction(poll, available, rng)?;
    let title = entry.display_title(&query.title);
    Ok(SuggestionPlan { entry, title, react })
}

/// Returns `poll` with `movie` appended under `react`.
pub fn add_option(poll: &Poll, react: &str, movie: Movie) -> Result<Poll, PollError> {
    if !poll.open {
        return Err(PollError::NotOpen);
    }
    if poll.uses_reaction(react) {
        return Err(PollError::ReactionInUse { react: react.to_owned() });
    }
    let duplicate = poll.contains_movie(movie.id)
        || movie.external_id.is_some_and(|external_id| poll.contains_external_id(external_id));
    if duplicate {
        return Err(PollError::AlreadySuggested { query: movie.title });
    }

    let mut next = poll.clone();
    next.options.push(PollOption { react: react.to_owned(), movie });
    Ok(next)
}

/// The option matching `winner`: an exact title match, else the only case-insensitive one.
pub fn find_winner<'p>(poll: &'p Poll, winner: &str) -> Result<&'p Movie, PollError> {
    if !poll.open {
        return Err(PollError::NotOpen);
    }

    let movies = || poll.options.iter().map(|option| &option.movie);
    if let Some(movie) = movies().find(|movie| movie.title == winner) {
        return Ok(movie);
    }

    let mut folded = movies().filter(|movie| movie.title.to_lowercase() == winner.to_lowercase());
    match (folded.next(), folded.next()) {
        (Some(movie), None) => Ok(movie),
        _ => Err(PollError::NoSuchOption { winner: winner.to_owned() }),
    }
}

/// Returns `poll` closed with `winner` as the winning option.
pub fn close(poll: &Poll, winner: &str, closed_at: DateTime<Utc>) -> Result<Poll, PollError> {
    let movie_id = find_winner(poll, winner)?.id;

    let mut next = poll.clone();
    next.open = false;
    next.winner = Some(movie_id);
    next.closed_at = Some(closed_at);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{add_option, close, find_winner, select_candidate, start, suggest};
    use crate::catalog::{CatalogEntry, SuggestionQuery};
    use crate::domain::movie::{ExternalId, Movie, MovieId};
    use crate::domain::poll::{Poll, PollState};
    use crate::errors::PollError;

    fn jaws_entry() -> CatalogEntry {
        CatalogEntry {
            id: ExternalId(578),
            title: Some("Jaws".to_owned()),
            original_title: Some("Jaws".to_owned()),
            release_date: Some("1975-06-20".to_owned()),
        }
    }

    fn dune_entries() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry {
                id: ExternalId(841),
                title: Some("Dune".to_owned()),
                original_title: Some("Dune".to_owned()),
                release_date: Some("1984-12-14".to_owned()),
            },
            CatalogEntry {
                id: ExternalId(438631),
                title: Some("Dune".to_owned()),
                original_title: Some("Dune".to_owned()),
                release_date: Some("2021-09-15".to_owned()),
            },
        ]
    }

    fn movie(id: i64, title: &str, external_id: i64) -> Movie {
        Movie { id: MovieId(id), title: title.to_owned(), external_id: Some(ExternalId(external_id)) }
    }

    #[test]
    fn start_refuses_while_a_poll_is_open() {
        let open = start(None, Utc::now()).expect("first start");
        assert_eq!(open.state(), PollState::Open);
        assert!(open.options.is_empty());
        assert!(open.winner.is_none());

        assert_eq!(start(Some(&open), Utc::now()), Err(PollError::AlreadyOpen));

        let mut closed = open.clone();
        closed.open = false;
        assert!(start(Some(&closed), Utc::now()).is_ok());
    }

    #[test]
    fn jaws_walkthrough() {
        let poll = start(None, Utc::now()).expect("start");
        let query = SuggestionQuery::parse("Jaws", None).expect("query");
        let mut rng = StdRng::seed_from_u64(3);

        let plan = suggest(&poll, &query, &[jaws_entry()], ["shark", "boat"], &mut rng)
            .expect("plan");
        assert_eq!(plan.entry.id, ExternalId(578));
        assert_eq!(plan.title, "Jaws");
        assert!(plan.react == "shark" || plan.react == "boat");

        let poll = add_option(&poll, &plan.react, movie(1, "Jaws", 578)).expect("add");
        assert_eq!(poll.options.len(), 1);

        let again = suggest(&poll, &query, &[jaws_entry()], ["shark", "boat"], &mut rng);
        assert_eq!(again, Err(PollError::AlreadySuggested { query: "Jaws".to_owned() }));

        let closed = close(&poll, "Jaws", Utc::now()).expect("close");
        assert_eq!(closed.state(), PollState::Closed);
        assert_eq!(closed.winner, Some(MovieId(1)));
        assert!(closed.closed_at.is_some());

        assert_eq!(close(&closed, "Shark", Utc::now()), Err(PollError::NotOpen));
    }

    #[test]
    fn dune_needs_a_year_to_disambiguate() {
        let poll = start(None, Utc::now()).expect("start");
        let entries = dune_entries();

        let bare = SuggestionQuery::parse("Dune", None).expect("query");
        assert_eq!(
            select_candidate(&poll, &bare, &entries),
            Err(PollError::Ambiguous { query: "Dune".to_owned(), matches: 2 })
        );

        let dated = SuggestionQuery::parse("Dune", Some("1984")).expect("query");
        let entry = select_candidate(&poll, &dated, &entries).expect("1984 entry");
        assert_eq!(entry.id, ExternalId(841));

        let wrong_year = SuggestionQuery::parse("Dune", Some("1999")).expect("query");
        assert_eq!(
            select_candidate(&poll, &wrong_year, &entries),
            Err(PollError::NotFound { query: "Dune".to_owned() })
        );
    }

    #[test]
    fn suggestions_against_a_closed_poll_fail() {
        let poll = start(None, Utc::now()).expect("start");
        let poll = add_option(&poll, "shark", movie(1, "Jaws", 578)).expect("add");
        let closed = close(&poll, "Jaws", Utc::now()).expect("close");
        let query = SuggestionQuery::parse("Jaws", None).expect("query");

        assert_eq!(select_candidate(&closed, &query, &[jaws_entry()]), Err(PollError::NotOpen));
        assert_eq!(add_option(&closed, "boat", movie(2, "Alien", 348)), Err(PollError::NotOpen));
    }

    #[test]
    fn add_option_guards_reactions_and_movies() {
        let poll = start(None, Utc::now()).expect("start");
        let poll = add_option(&poll, "shark", movie(1, "Jaws", 578)).expect("add");

        assert_eq!(
            add_option(&poll, "shark", movie(2, "Alien", 348)),
            Err(PollError::ReactionInUse { react: "shark".to_owned() })
        );
        assert_eq!(
            add_option(&poll, "boat", movie(1, "Jaws", 578)),
            Err(PollError::AlreadySuggested { query: "Jaws".to_owned() })
        );
        assert_eq!(poll.options.len(), 1);
    }

    #[test]
    fn failed_close_leaves_poll_untouched() {
        let poll = start(None, Utc::now()).expect("start");
        let poll = add_option(&poll, "shark", movie(1, "Jaws", 578)).expect("add");
        let before = poll.clone();

        assert_eq!(
            close(&poll, "Shark", Utc::now()),
            Err(PollError::NoSuchOption { winner: "Shark".to_owned() })
        );
        assert_eq!(poll, before);
    }

    #[test]
    fn winner_lookup_prefers_exact_title_then_unique_fold() {
        let poll = start(None, Utc::now()).expect("start");
        let poll = add_option(&poll, "a", movie(1, "Alien", 348)).expect("add");
        let poll = add_option(&poll, "b", movie(2, "ALIEN", 9001)).expect("add");
        let poll = add_option(&poll, "c", movie(3, "Heat", 949)).expect("add");

        assert_eq!(find_winner(&poll, "ALIEN").expect("exact").id, MovieId(2));
        assert_eq!(find_winner(&poll, "heat").expect("folded").id, MovieId(3));
        assert!(matches!(find_winner(&poll, "alien"), Err(PollError::NoSuchOption { .. })));
    }

    #[test]
    fn closing_an_unstarted_state_is_not_open() {
        let mut poll = Poll::new_open(Utc::now());
        poll.open = false;
        assert_eq!(close(&poll, "Anything", Utc::now()), Err(PollError::NotOpen));
    }
}
