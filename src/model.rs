//! Reading data model shared by the adapters, the aggregator and the stores.
//!
//! A [`ReadingBundle`] is one day's reading: an ordered list of [`Section`]s,
//! each contributed by a single [`SourceKind`]. Character counts are computed
//! at construction time so the count invariants cannot drift from the items.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Source Kinds
// ============================================================================

/// Where a section's content came from.
///
/// The declaration order is the aggregator's invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Wikipedia,
    News,
    Weather,
    Fallback,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Wikipedia,
        SourceKind::News,
        SourceKind::Weather,
        SourceKind::Fallback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Wikipedia => "wikipedia",
            SourceKind::News => "news",
            SourceKind::Weather => "weather",
            SourceKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    /// Accepts the canonical names plus the short query aliases
    /// (`wiki`, `gov`, `government`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wikipedia" | "wiki" => Ok(SourceKind::Wikipedia),
            "news" => Ok(SourceKind::News),
            "weather" | "gov" | "government" => Ok(SourceKind::Weather),
            "fallback" => Ok(SourceKind::Fallback),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}

/// A set of enabled sources, iterated in invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSet {
    wikipedia: bool,
    news: bool,
    weather: bool,
    fallback: bool,
}

impl SourceSet {
    /// The three live providers. Fallback is opt-in.
    pub fn providers() -> Self {
        Self {
            wikipedia: true,
            news: true,
            weather: true,
            fallback: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: SourceKind) -> Self {
        self.set(kind, true);
        self
    }

    pub fn set(&mut self, kind: SourceKind, enabled: bool) {
        match kind {
            SourceKind::Wikipedia => self.wikipedia = enabled,
            SourceKind::News => self.news = enabled,
            SourceKind::Weather => self.weather = enabled,
            SourceKind::Fallback => self.fallback = enabled,
        }
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Wikipedia => self.wikipedia,
            SourceKind::News => self.news,
            SourceKind::Weather => self.weather,
            SourceKind::Fallback => self.fallback,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = SourceKind> + '_ {
        SourceKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl FromIterator<SourceKind> for SourceSet {
    fn from_iter<I: IntoIterator<Item = SourceKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), SourceSet::with)
    }
}

impl FromStr for SourceSet {
    type Err = String;

    /// Parses a comma-separated list such as `wiki,news`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(SourceKind::from_str)
            .collect()
    }
}

// ============================================================================
// Items
// ============================================================================

/// One historical event from the Wikipedia date page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikipediaItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One news headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// The weather overview published by a public agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherItem {
    pub text: String,
    pub agency: String,
}

/// A literary passage used when live sources are unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackItem {
    pub text: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
}

/// A reading snippet. The variant always matches the owning section's source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Wikipedia(WikipediaItem),
    News(NewsItem),
    Weather(WeatherItem),
    Fallback(FallbackItem),
}

impl Item {
    pub fn text(&self) -> &str {
        match self {
            Item::Wikipedia(item) => &item.text,
            Item::News(item) => &item.text,
            Item::Weather(item) => &item.text,
            Item::Fallback(item) => &item.text,
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            Item::Wikipedia(_) => SourceKind::Wikipedia,
            Item::News(_) => SourceKind::News,
            Item::Weather(_) => SourceKind::Weather,
            Item::Fallback(_) => SourceKind::Fallback,
        }
    }
}

/// Number of characters (Unicode scalar values) in `text`.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

// ============================================================================
// Sections and Bundles
// ============================================================================

/// One source's contribution to a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub source: SourceKind,
    pub title: String,
    pub items: Vec<Item>,
    pub char_count: usize,
    pub attribution: String,
    pub fetched_at: DateTime<Utc>,
}

impl Section {
    /// Build a section, computing `char_count` from the concatenated item texts.
    pub fn new(
        source: SourceKind,
        title: impl Into<String>,
        items: Vec<Item>,
        attribution: impl Into<String>,
    ) -> Self {
        let char_count = items.iter().map(|item| char_count(item.text())).sum();
        Self {
            source,
            title: title.into(),
            items,
            char_count,
            attribution: attribution.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(Item::text)
    }
}

/// The full daily aggregation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingBundle {
    pub date: NaiveDate,
    pub sections: Vec<Section>,
    pub total_char_count: usize,
    pub generated_at: DateTime<Utc>,
    /// True when served from the local cache rather than fetched.
    #[serde(default)]
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_errors: Option<BTreeMap<SourceKind, String>>,
}

impl ReadingBundle {
    /// Assemble a bundle from successful sections; an empty error map is dropped.
    pub fn new(
        date: NaiveDate,
        sections: Vec<Section>,
        errors: BTreeMap<SourceKind, String>,
    ) -> Self {
        let total_char_count = sections.iter().map(|s| s.char_count).sum();
        Self {
            date,
            sections,
            total_char_count,
            generated_at: Utc::now(),
            cached: false,
            partial_errors: (!errors.is_empty()).then_some(errors),
        }
    }

    /// Sources that contributed a section, in bundle order.
    pub fn source_list(&self) -> Vec<SourceKind> {
        self.sections.iter().map(|s| s.source).collect()
    }

    /// Every source this bundle was requested for, successful or not.
    pub fn requested_sources(&self) -> SourceSet {
        let failed = self.partial_errors.iter().flat_map(|m| m.keys().copied());
        self.sections.iter().map(|s| s.source).chain(failed).collect()
    }
}
