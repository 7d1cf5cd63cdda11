// SPDX-License-Identifier: MPL-2.0
//! # editwars
//!
//! Retrieval and normalization of Wikipedia revision-history and page-protection metadata for edit war research.
//!
//! ## Overview
//!
//! `editwars` pulls metadata about sets of articles across several Wikipedia language editions and turns it into flat, typed records: revisions per month, individual revisions with revert flags and editor activity, and protection events with a canonical expiry.
//!
//! **Key Features:**
//!
//! - **Paginated Retrieval**: Walks cursor-based history feeds (REST `older` links and query API `continue` tokens) with an explicit loop until a stop time is reached or the feed ends.
//! - **Polite by Default**: A courtesy delay before every page, a single retry after a long cooldown when throttled.
//! - **Multi-Locale Expiry Parsing**: Protection expiries written in English, German, Russian, Ukrainian, Arabic, Slovak, Polish, Czech and Italian are parsed into one UTC instant; indefinite protections share a single far-future sentinel.
//! - **Typed Outcomes**: Per-article results distinguish "legitimately empty" from "failed", so batches never drop data silently.
//!
//! ## Getting Started
//!
//! ### Basic Usage
//!
//! ```no_run
//! use editwars::client::WikiClient;
//! use editwars::config::ClientConfig;
//! use editwars::model::ArticleRef;
//! use editwars::aggregate::aggregate_by_month;
//! use chrono::{TimeZone, Utc};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = WikiClient::from_config(ClientConfig::from_env())?;
//!
//!     // Resolve the Ukrainian title of an English article
//!     let title = client.resolve_title("Kyiv", "en", "uk")?;
//!     let article = ArticleRef::new(&title, "uk");
//!
//!     // Walk the history back to 2022 and count revisions per month
//!     let stop_time = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
//!     let history = client.fetch_history(&article, stop_time, None)?;
//!     for (month, count) in aggregate_by_month(&history) {
//!         println!("{month}: {count}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Batches
//!
//! [`batch::Harvester`] runs a pipeline over every (article, language) pair and returns a [`batch::BatchReport`] with the records and an account of succeeded, empty and failed pairs:
//!
//! ```no_run
//! use editwars::batch::Harvester;
//! use editwars::client::WikiClient;
//! use editwars::config::ClientConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WikiClient::from_config(ClientConfig::default())?;
//!     let mut harvester = Harvester::new(client, "en");
//!
//!     let titles = vec!["Kyiv".to_string(), "Crimea".to_string()];
//!     let languages = vec!["en".to_string(), "uk".to_string(), "ru".to_string()];
//!     let report = harvester.protections(&titles, &languages);
//!
//!     println!("{report}");
//!     for failure in &report.failed {
//!         eprintln!("{}:{} failed: {}", failure.language, failure.title, failure.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules and API
//!
//! ### `client` and `transport`
//!
//! [`client::WikiClient`] owns a [`transport::Transport`] (blocking `reqwest` by default), a [`transport::Sleeper`] and the [`config::ClientConfig`]. All retrieval operations are methods on it, defined next to the component they belong to:
//!
//! - `resolve_title` / `language_links` in [`resolver`]
//! - `fetch_history`, `fetch_history_detailed`, `count_revisions` in [`history`]
//! - `revision_id_at`, `count_edits`, `edit_counts_by_month` in [`counts`]
//! - `fetch_protection_log`, `protection_events` in [`protection`]
//! - `editor_edit_count` in [`contributions`]
//!
//! Swapping the transport and sleeper is how the tests run the whole crate without network access or real sleeps.
//!
//! ### `aggregate`
//!
//! Pure functions: [`aggregate::aggregate_by_month`] and [`aggregate::normalize_revision`].
//!
//! ### `protection`
//!
//! Expiry resolution is explicit about its sources: structured `params.details` first, then the description, then the comment. Free text is handed to the [`protection::LocaleRegistry`], which holds one [`protection::LocaleExpiryParser`] per language code. New languages are added by registering another parser:
//!
//! ```rust
//! use editwars::protection::{DateGrammar, GrammarSpec, LocaleRegistry};
//!
//! let mut registry = LocaleRegistry::with_defaults();
//! registry.register(Box::new(DateGrammar::new(GrammarSpec {
//!     language: "nl",
//!     removals: &["verloopt "],
//!     months: &[("mei", "may")],
//!     primary_format: "%H:%M, %d %B %Y",
//! })));
//! assert!(registry.parse("nl", "(verloopt 12:00, 5 mei 2024 (UTC))").is_parsed());
//! ```
//!
//! ## Features and Configuration
//!
//! ### Environment
//!
//! [`config::ClientConfig::from_env`] reads `EDITWARS_REST_BASE`, `EDITWARS_ACTION_API`, `EDITWARS_USER_AGENT`, `EDITWARS_TIMEOUT_MS`, `EDITWARS_COURTESY_DELAY_MS`, `EDITWARS_THROTTLE_COOLDOWN_SECS` and `EDITWARS_PAGE_LIMIT`.
//!
//! ### Logging and Error Handling
//!
//! - Uses the `tracing` crate for logging; the library never installs a subscriber.
//! - Errors are [`error::FetchError`] values. Throttling after the single retry is reported as retryable and never as "not found".
//! - By default an unknown language falls back to the English expiry grammar. Enable the `strict` feature to report such expiries as unparsable instead.
//!
//! ```toml
//! [dependencies]
//! editwars = { version = "0.1.0", features = ["strict"] }
//! ```
//!
//! ## Limitations
//!
//! - **Sequential**: Requests are issued one at a time from a single thread.
//! - **Locales**: Expiry text in a language without a registered grammar is only understood if it happens to follow the English layout.
//!
//! ## Dependencies
//!
//! - **`compact_str`**: Used in the public API for titles, language codes and editor names.
//! - **`chrono`**: All instants are `DateTime<Utc>`.

pub mod aggregate;
pub mod batch;
pub mod client;
pub mod config;
pub mod contributions;
pub mod counts;
pub mod error;
pub mod history;
pub mod model;
pub mod outcome;
pub mod protection;
pub mod resolver;
pub mod transport;

#[cfg(test)]
mod test_support;
