//! Free-text expiry grammars, one per language edition.
//!
//! Protection log descriptions embed the expiry in a parenthetical clause
//! written in the wiki's content language, e.g.
//! `[edit=autoconfirmed] (expires 12:00, 5 May 2024 (UTC))` or
//! `[редактирование=autoconfirmed] (истекает 12:00, 5 мая 2024 (UTC))`.
//! Each [`DateGrammar`] strips the language's lead-in phrases, rewrites local
//! month names to English ones and then tries its formats in order.

use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, MatchKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use rustc_hash::FxHashMap;

use super::expiry::Expiry;

/// Words meaning "no expiry" in the supported editions.
pub const INDEFINITE_TOKENS: &[&str] = &[
    "indefinite",
    "unbeschränkt",
    "безстроково",
    "غير محدد",
    "бессрочно",
    "na neurčito",
    "do odvolání",
    "na zawsze",
    "infinito",
    "infinite",
];

/// Tried after the language's own format, in this order.
const GENERIC_FORMATS: [&str; 2] = ["%H:%M, %d %B %Y", "%H:%M, %d %b %Y"];

static EXPIRY_CLAUSE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\(([^)]+)\)").ok());

/// Parses the expiry embedded in a protection log text of one language.
pub trait LocaleExpiryParser: Send + Sync {
    fn language(&self) -> &str;

    fn parse(&self, raw_text: &str) -> Expiry;
}

/// Static description of a language's expiry grammar.
#[derive(Debug, Clone, Copy)]
pub struct GrammarSpec {
    pub language: &'static str,
    /// Phrases removed before parsing (lower case).
    pub removals: &'static [&'static str],
    /// Local month forms (lower case) and the English month they stand for.
    pub months: &'static [(&'static str, &'static str)],
    /// chrono format of the rewritten text.
    pub primary_format: &'static str,
}

pub struct DateGrammar {
    spec: GrammarSpec,
    removals: Option<AhoCorasick>,
    /// Words of the lead-in phrases, for lead-ins that lost their trailing space.
    lead_in_words: Vec<&'static str>,
    month_pattern: Option<Regex>,
    month_names: FxHashMap<&'static str, &'static str>,
}

impl DateGrammar {
    pub fn new(spec: GrammarSpec) -> Self {
        let removals = if spec.removals.is_empty() {
            None
        } else {
            AhoCorasick::builder()
                .match_kind(MatchKind::LeftmostLongest)
                .build(spec.removals)
                .map_err(|e| {
                    tracing::error!(message = "invalid lead-in phrases", language = spec.language, error = %e)
                })
                .ok()
        };

        let month_pattern = if spec.months.is_empty() {
            None
        } else {
            let mut forms: Vec<&str> = spec.months.iter().map(|(form, _)| *form).collect();
            // prefer the longest form when one is a prefix of another
            forms.sort_by_key(|form| std::cmp::Reverse(form.chars().count()));
            let alternation = forms
                .iter()
                .map(|form| regex::escape(form))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"\b(?:{alternation})\b"))
                .map_err(|e| {
                    tracing::error!(message = "invalid month table", language = spec.language, error = %e)
                })
                .ok()
        };

        Self {
            spec,
            removals,
            lead_in_words: spec
                .removals
                .iter()
                .flat_map(|phrase| phrase.split_whitespace())
                .collect(),
            month_pattern,
            month_names: spec.months.iter().copied().collect(),
        }
    }

    fn strip_removals(&self, text: &str) -> String {
        match &self.removals {
            Some(matcher) => {
                let replacements = vec![""; self.spec.removals.len()];
                matcher.replace_all(text, &replacements)
            }
            None => text.to_string(),
        }
    }

    fn substitute_months(&self, text: &str) -> String {
        match &self.month_pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &regex::Captures| {
                    let form = &caps[0];
                    self.month_names.get(form).copied().unwrap_or(form).to_string()
                })
                .into_owned(),
            None => text.to_string(),
        }
    }

    /// Whether the clause, apart from lead-in words, is an indefinite token.
    fn is_indefinite_clause(&self, clause: &str) -> bool {
        let words: Vec<&str> = clause
            .split_whitespace()
            .filter(|word| !self.lead_in_words.iter().any(|lead| lead == word))
            .collect();
        is_indefinite(&words.join(" "))
    }

    fn formats(&self) -> [&str; 3] {
        [self.spec.primary_format, GENERIC_FORMATS[0], GENERIC_FORMATS[1]]
    }
}

impl LocaleExpiryParser for DateGrammar {
    fn language(&self) -> &str {
        self.spec.language
    }

    fn parse(&self, raw_text: &str) -> Expiry {
        let text = self.strip_removals(&raw_text.to_lowercase());
        let clause = expiry_clause(&text);

        if self.is_indefinite_clause(clause) {
            return Expiry::indefinite();
        }

        let candidate = normalize_punctuation(&self.substitute_months(clause));
        for format in self.formats() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&candidate, format) {
                return Expiry::At(DateTime::from_naive_utc_and_offset(dt, Utc));
            }
        }

        tracing::debug!(
            message = "no format matched expiry text",
            language = self.spec.language,
            candidate = candidate.as_str()
        );
        Expiry::Unparsable(raw_text.to_string())
    }
}

/// Content of the first parenthetical clause without its `(UTC)` tail, or the
/// whole text when there is no clause.
fn expiry_clause(text: &str) -> &str {
    let clause = EXPIRY_CLAUSE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);
    // `(12:00, 5 May 2024 (UTC))` captures `12:00, 5 May 2024 (UTC`
    clause.split('(').next().unwrap_or(clause).trim()
}

/// Whether `text` as a whole is one of the [`INDEFINITE_TOKENS`].
pub fn is_indefinite(text: &str) -> bool {
    let normalized = text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    INDEFINITE_TOKENS.contains(&normalized.as_str())
}

/// ASCII digits and comma, single spaces.
fn normalize_punctuation(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '،' => ',',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub const ENGLISH: GrammarSpec = GrammarSpec {
    language: "en",
    removals: &["expires "],
    months: &[],
    primary_format: "%H:%M, %d %B %Y",
};

pub const GERMAN: GrammarSpec = GrammarSpec {
    language: "de",
    removals: &["bis ", " uhr"],
    months: &[
        ("januar", "january"),
        ("jänner", "january"),
        ("februar", "february"),
        ("feber", "february"),
        ("märz", "march"),
        ("april", "april"),
        ("mai", "may"),
        ("juni", "june"),
        ("juli", "july"),
        ("august", "august"),
        ("september", "september"),
        ("oktober", "october"),
        ("november", "november"),
        ("dezember", "december"),
    ],
    primary_format: "%d. %B %Y, %H:%M",
};

pub const RUSSIAN: GrammarSpec = GrammarSpec {
    language: "ru",
    removals: &["истекает "],
    months: &[
        ("января", "january"),
        ("февраля", "february"),
        ("марта", "march"),
        ("апреля", "april"),
        ("мая", "may"),
        ("июня", "june"),
        ("июля", "july"),
        ("августа", "august"),
        ("сентября", "september"),
        ("октября", "october"),
        ("ноября", "november"),
        ("декабря", "december"),
        ("январь", "january"),
        ("февраль", "february"),
        ("март", "march"),
        ("апрель", "april"),
        ("май", "may"),
        ("июнь", "june"),
        ("июль", "july"),
        ("август", "august"),
        ("сентябрь", "september"),
        ("октябрь", "october"),
        ("ноябрь", "november"),
        ("декабрь", "december"),
    ],
    primary_format: "%H:%M, %d %B %Y",
};

pub const UKRAINIAN: GrammarSpec = GrammarSpec {
    language: "uk",
    removals: &["закінчується "],
    months: &[
        ("січня", "january"),
        ("лютого", "february"),
        ("березня", "march"),
        ("квітня", "april"),
        ("травня", "may"),
        ("червня", "june"),
        ("липня", "july"),
        ("серпня", "august"),
        ("вересня", "september"),
        ("жовтня", "october"),
        ("листопада", "november"),
        ("грудня", "december"),
        ("січень", "january"),
        ("лютий", "february"),
        ("березень", "march"),
        ("квітень", "april"),
        ("травень", "may"),
        ("червень", "june"),
        ("липень", "july"),
        ("серпень", "august"),
        ("вересень", "september"),
        ("жовтень", "october"),
        ("листопад", "november"),
        ("грудень", "december"),
    ],
    primary_format: "%H:%M, %d %B %Y",
};

pub const ARABIC: GrammarSpec = GrammarSpec {
    language: "ar",
    removals: &["تنتهي في "],
    months: &[
        ("يناير", "january"),
        ("فبراير", "february"),
        ("مارس", "march"),
        ("أبريل", "april"),
        ("إبريل", "april"),
        ("مايو", "may"),
        ("يونيو", "june"),
        ("يوليو", "july"),
        ("أغسطس", "august"),
        ("سبتمبر", "september"),
        ("أكتوبر", "october"),
        ("نوفمبر", "november"),
        ("ديسمبر", "december"),
    ],
    primary_format: "%H:%M, %d %b %Y",
};

pub const SLOVAK: GrammarSpec = GrammarSpec {
    language: "sk",
    removals: &["vyprší o "],
    months: &[
        ("januára", "january"),
        ("februára", "february"),
        ("marca", "march"),
        ("apríla", "april"),
        ("mája", "may"),
        ("júna", "june"),
        ("júla", "july"),
        ("augusta", "august"),
        ("septembra", "september"),
        ("októbra", "october"),
        ("novembra", "november"),
        ("decembra", "december"),
        ("január", "january"),
        ("február", "february"),
        ("marec", "march"),
        ("apríl", "april"),
        ("máj", "may"),
        ("jún", "june"),
        ("júl", "july"),
        ("august", "august"),
        ("september", "september"),
        ("október", "october"),
        ("november", "november"),
        ("december", "december"),
    ],
    primary_format: "%H:%M, %d. %B %Y",
};

pub const POLISH: GrammarSpec = GrammarSpec {
    language: "pl",
    removals: &["wygasa "],
    months: &[
        ("stycznia", "january"),
        ("lutego", "february"),
        ("marca", "march"),
        ("kwietnia", "april"),
        ("maja", "may"),
        ("czerwca", "june"),
        ("lipca", "july"),
        ("sierpnia", "august"),
        ("września", "september"),
        ("października", "october"),
        ("listopada", "november"),
        ("grudnia", "december"),
        ("sty", "january"),
        ("lut", "february"),
        ("mar", "march"),
        ("kwi", "april"),
        ("maj", "may"),
        ("cze", "june"),
        ("lip", "july"),
        ("sie", "august"),
        ("wrz", "september"),
        ("paź", "october"),
        ("lis", "november"),
        ("gru", "december"),
    ],
    primary_format: "%H:%M, %d %b %Y",
};

pub const CZECH: GrammarSpec = GrammarSpec {
    language: "cs",
    removals: &["vyprší v "],
    months: &[],
    primary_format: "%d. %m. %Y, %H:%M",
};

pub const ITALIAN: GrammarSpec = GrammarSpec {
    language: "it",
    removals: &["scade il ", "scade ", "alle "],
    months: &[
        ("gennaio", "january"),
        ("febbraio", "february"),
        ("marzo", "march"),
        ("aprile", "april"),
        ("maggio", "may"),
        ("giugno", "june"),
        ("luglio", "july"),
        ("agosto", "august"),
        ("settembre", "september"),
        ("ottobre", "october"),
        ("novembre", "november"),
        ("dicembre", "december"),
        ("gen", "january"),
        ("feb", "february"),
        ("mar", "march"),
        ("apr", "april"),
        ("mag", "may"),
        ("giu", "june"),
        ("lug", "july"),
        ("ago", "august"),
        ("set", "september"),
        ("ott", "october"),
        ("nov", "november"),
        ("dic", "december"),
    ],
    primary_format: "%d %b %Y %H:%M",
};

pub const BUILTIN_GRAMMARS: &[GrammarSpec] = &[
    ENGLISH, GERMAN, RUSSIAN, UKRAINIAN, ARABIC, SLOVAK, POLISH, CZECH, ITALIAN,
];

/// Expiry parsers keyed by language code.
pub struct LocaleRegistry {
    parsers: FxHashMap<String, Box<dyn LocaleExpiryParser>>,
    fallback: DateGrammar,
}

impl LocaleRegistry {
    /// A registry without any language; only the English fallback applies.
    pub fn empty() -> Self {
        Self {
            parsers: FxHashMap::default(),
            fallback: DateGrammar::new(ENGLISH),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for spec in BUILTIN_GRAMMARS {
            registry.register(Box::new(DateGrammar::new(*spec)));
        }
        registry
    }

    /// Add or replace the parser for its language.
    pub fn register(&mut self, parser: Box<dyn LocaleExpiryParser>) {
        self.parsers.insert(parser.language().to_string(), parser);
    }

    pub fn get(&self, language: &str) -> Option<&dyn LocaleExpiryParser> {
        self.parsers.get(language).map(|parser| parser.as_ref())
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    /// Parse `raw_text` with the grammar of `language`.
    ///
    /// Unknown languages fall back to the English grammar unless the `strict`
    /// feature is enabled, in which case they are unparsable.
    pub fn parse(&self, language: &str, raw_text: &str) -> Expiry {
        if let Some(parser) = self.get(language) {
            return parser.parse(raw_text);
        }

        if cfg!(feature = "strict") {
            tracing::warn!(message = "no expiry grammar for language", language);
            Expiry::Unparsable(raw_text.to_string())
        } else {
            tracing::debug!(message = "no expiry grammar for language, using fallback", language);
            self.fallback.parse(raw_text)
        }
    }
}

impl Default for LocaleRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
