use serde::Deserialize;
use tracing::instrument;

use crate::{
    client::{page_url, WikiClient},
    error::FetchError,
    model::url_safe_title,
    transport::{Sleeper, Transport},
};

/// One entry of `/page/{title}/links/language`.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageLink {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
    pub title: String,
}

impl<T: Transport, S: Sleeper> WikiClient<T, S> {
    /// All inter-language links of `title` in the `source_lang` edition.
    pub fn language_links(
        &mut self,
        title: &str,
        source_lang: &str,
    ) -> Result<Vec<LanguageLink>, FetchError> {
        let url = page_url(
            self.config(),
            source_lang,
            &url_safe_title(title),
            "/links/language",
        );
        let payload = self.get_json(&url)?;
        serde_json::from_value(payload)
            .map_err(|e| FetchError::parse(&url, format!("malformed language links: {e}")))
    }

    /// Title of the article equivalent to `title` in the `target_lang` edition.
    ///
    /// Not retried on failure: a missing translation is usually permanent.
    #[instrument(skip(self))]
    pub fn resolve_title(
        &mut self,
        title: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, FetchError> {
        if title.trim().is_empty() {
            return Err(FetchError::NotFound("empty title".to_string()));
        }
        if source_lang == target_lang {
            return Ok(title.to_string());
        }

        let links = self.language_links(title, source_lang)?;
        links
            .into_iter()
            .find(|link| link.code == target_lang)
            .map(|link| link.title)
            .ok_or_else(|| {
                FetchError::NotFound(format!(
                    "no {target_lang} language link for {source_lang}:{title}"
                ))
            })
    }
}
