//! Headlines from a single RSS feed.
use chrono::{DateTime, Utc};
use feed_rs::parser;

use crate::content::http::{HttpClient, SourceError};
use crate::content::normalize::within_chars;
use crate::model::{Item, NewsItem, Section, SourceKind};
use crate::util::strip_control_chars;

pub const TITLE: &str = "今日のニュース";
pub const ATTRIBUTION: &str = "NHKニュース";

const HEADLINE_MIN_CHARS: usize = 10;
const HEADLINE_MAX_CHARS: usize = 60;
/// Entries considered by the strict pass and the target it stops at.
const STRICT_WINDOW: usize = 7;
const STRICT_TARGET: usize = 5;
/// Entries considered by the relaxed pass and the cap it stops at.
const RELAXED_WINDOW: usize = 10;
const RELAXED_TARGET: usize = 7;

/// A feed entry reduced to what headline selection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Parse an RSS/Atom document into headlines, in feed order.
pub fn parse_headlines(bytes: &[u8]) -> Result<Vec<Headline>, SourceError> {
    let feed = parser::parse(bytes).map_err(|e| SourceError::Parse(e.to_string()))?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| Headline {
            title: entry
                .title
                .map(|t| strip_control_chars(t.content.trim()).into_owned())
                .unwrap_or_default(),
            url: entry.links.first().map(|l| l.href.clone()),
            published_at: entry.published.or(entry.updated),
        })
        .collect())
}

/// Pick five to seven headlines.
///
/// The strict pass takes headlines of 10 to 60 characters from the first
/// seven entries, stopping at five. If it comes up short, the relaxed pass
/// walks the first ten entries and adds any non-empty headline not already
/// chosen, stopping at seven.
pub fn select_headlines(headlines: &[Headline]) -> Vec<&Headline> {
    let mut selected: Vec<&Headline> = Vec::new();

    for headline in headlines.iter().take(STRICT_WINDOW) {
        if within_chars(&headline.title, HEADLINE_MIN_CHARS, HEADLINE_MAX_CHARS) {
            selected.push(headline);
        }
        if selected.len() >= STRICT_TARGET {
            break;
        }
    }

    if selected.len() < STRICT_TARGET {
        for headline in headlines.iter().take(RELAXED_WINDOW) {
            if !headline.title.is_empty() && !selected.iter().any(|s| s.title == headline.title) {
                selected.push(headline);
            }
            if selected.len() >= RELAXED_TARGET {
                break;
            }
        }
    }

    selected
}

/// Fetch the feed and build the news section.
pub async fn fetch(http: &HttpClient, feed_url: &str) -> Result<Section, SourceError> {
    let body = http
        .get_text(
            feed_url,
            "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8",
        )
        .await?;
    let headlines = parse_headlines(body.as_bytes())?;

    let items: Vec<Item> = select_headlines(&headlines)
        .into_iter()
        .map(|h| {
            Item::News(NewsItem {
                text: h.title.clone(),
                url: h.url.clone(),
                published_at: h.published_at,
            })
        })
        .collect();

    if items.is_empty() {
        return Err(SourceError::NoData("feed has no headlines".to_string()));
    }

    tracing::debug!(
        entries = headlines.len(),
        selected = items.len(),
        "Selected news headlines"
    );

    Ok(Section::new(SourceKind::News, TITLE, items, ATTRIBUTION))
}
