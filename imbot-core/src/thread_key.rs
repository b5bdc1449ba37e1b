//! Thread identifier derivation.
//!
//! A sub-thread is identified by the set of participants it addresses, so the key is built from
//! the participant ids after sorting and deduplication: `{B, A}` and `{A, B}` resolve to the same
//! thread. Ids are assumed never to contain [`THREAD_KEY_DELIMITER`].

/// Separator between participant ids in a derived thread key.
pub const THREAD_KEY_DELIMITER: &str = "|";

/// Reserved key of a channel's default (whole-channel) thread.
///
/// Starts with the delimiter, which no derived key can do.
pub const DEFAULT_THREAD_ID: &str = "|default|";

/// Derives the thread key for a participant id set. An empty set maps to [`DEFAULT_THREAD_ID`].
pub fn thread_key<'a, I>(participant_ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ids: Vec<&str> = participant_ids.into_iter().collect();
    if ids.is_empty() {
        return DEFAULT_THREAD_ID.to_string();
    }
    ids.sort_unstable();
    ids.dedup();
    ids.join(THREAD_KEY_DELIMITER)
}

/// Returns true if `key` is the reserved default-thread key.
#[inline]
pub fn is_default_key(key: &str) -> bool {
    key == DEFAULT_THREAD_ID
}
