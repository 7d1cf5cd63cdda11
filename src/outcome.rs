use crate::error::FetchError;

/// Result of one per-item retrieval inside a batch.
///
/// Distinguishes "the source legitimately has nothing" from "we failed to ask".
#[derive(Debug)]
pub enum Outcome<T> {
    Found(Vec<T>),
    Empty,
    Failed(FetchError),
}

impl<T> Outcome<T> {
    /// `NotFound` and empty vectors both become [`Outcome::Empty`].
    pub fn from_result(result: Result<Vec<T>, FetchError>) -> Self {
        match result {
            Ok(items) if items.is_empty() => Outcome::Empty,
            Ok(items) => Outcome::Found(items),
            Err(FetchError::NotFound(what)) => {
                tracing::debug!(message = "treating missing resource as empty", what = what.as_str());
                Outcome::Empty
            }
            Err(error) => Outcome::Failed(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> Outcome<U> {
        match self {
            Outcome::Found(items) => {
                let mapped = f(items);
                if mapped.is_empty() {
                    Outcome::Empty
                } else {
                    Outcome::Found(mapped)
                }
            }
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(error) => Outcome::Failed(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The items, or nothing for empty and failed outcomes.
    pub fn into_items(self) -> Vec<T> {
        match self {
            Outcome::Found(items) => items,
            Outcome::Empty | Outcome::Failed(_) => Vec::new(),
        }
    }
}
