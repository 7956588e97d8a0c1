//! "On this day" events from the Japanese Wikipedia date page.
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use url::Url;

use crate::content::http::{HttpClient, SourceError};
use crate::content::normalize::{extract_list_items, within_chars, Candidate};
use crate::model::{Item, Section, SourceKind, WikipediaItem};

pub const ATTRIBUTION: &str = "Wikipedia日本語版（CC-BY-SA）";

/// Events mentioning any of these are preferred.
pub const DOMESTIC_KEYWORDS: [&str; 18] = [
    "日本", "天皇", "将軍", "幕府", "江戸", "東京", "京都", "大阪", "明治", "大正", "昭和", "平成",
    "令和", "戦国", "鎌倉", "室町", "安土", "桃山",
];

const EVENT_MIN_CHARS: usize = 15;
const EVENT_MAX_CHARS: usize = 150;
const DOMESTIC_QUOTA: usize = 3;
const OTHER_QUOTA: usize = 2;
const TARGET_EVENTS: usize = 5;
/// Below this the length filter is abandoned.
const MIN_EVENTS: usize = 3;

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<ParseBody>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    text: Option<ParseText>,
}

#[derive(Debug, Deserialize)]
struct ParseText {
    #[serde(rename = "*")]
    html: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    info: Option<String>,
}

/// Date page title, e.g. `10月5日`.
pub fn page_title(date: NaiveDate) -> String {
    format!("{}月{}日", date.month(), date.day())
}

/// Fetch the events section for `date` and select up to five items.
pub async fn fetch(
    http: &HttpClient,
    api_url: &str,
    page_base_url: &str,
    date: NaiveDate,
) -> Result<Section, SourceError> {
    let page = page_title(date);
    let url = Url::parse_with_params(
        api_url,
        &[
            ("action", "parse"),
            ("page", page.as_str()),
            ("format", "json"),
            ("prop", "text"),
            ("section", "1"),
            ("origin", "*"),
        ],
    )?;

    let response: ParseResponse = http.get_json(url.as_str()).await?;
    if let Some(error) = response.error {
        let reason = error
            .info
            .or(error.code)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(SourceError::Upstream(format!("Wikipedia error: {reason}")));
    }
    let html = response
        .parse
        .and_then(|p| p.text)
        .map(|t| t.html)
        .ok_or_else(|| SourceError::Parse("no page content in response".to_string()))?;

    let events = extract_list_items(&html);
    if events.is_empty() {
        return Err(SourceError::NotFound(format!("no events listed for {page}")));
    }

    let page_url = format!(
        "{}/{}",
        page_base_url.trim_end_matches('/'),
        url::form_urlencoded::byte_serialize(page.as_bytes()).collect::<String>()
    );
    let items: Vec<Item> = select_events(&events)
        .into_iter()
        .map(|event| {
            Item::Wikipedia(WikipediaItem {
                text: event.text.clone(),
                year: event.year,
                url: Some(page_url.clone()),
            })
        })
        .collect();

    tracing::debug!(
        page = %page,
        candidates = events.len(),
        selected = items.len(),
        "Selected Wikipedia events"
    );

    Ok(Section::new(
        SourceKind::Wikipedia,
        format!("今日は何の日（{page}）"),
        items,
        ATTRIBUTION,
    ))
}

fn is_domestic(text: &str) -> bool {
    DOMESTIC_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Choose which events to read.
///
/// Domestic events in the length window come first (up to three), then other
/// events (up to two). Short of five, further other events are appended. If
/// fewer than three survive, the first five raw candidates are used instead.
pub fn select_events(events: &[Candidate]) -> Vec<&Candidate> {
    let (domestic, other): (Vec<&Candidate>, Vec<&Candidate>) = events
        .iter()
        .filter(|e| within_chars(&e.text, EVENT_MIN_CHARS, EVENT_MAX_CHARS))
        .partition(|e| is_domestic(&e.text));

    let mut selected: Vec<&Candidate> = domestic
        .iter()
        .take(DOMESTIC_QUOTA)
        .chain(other.iter().take(OTHER_QUOTA))
        .copied()
        .collect();

    if selected.len() < TARGET_EVENTS {
        let missing = TARGET_EVENTS - selected.len();
        selected.extend(other.iter().skip(OTHER_QUOTA).take(missing).copied());
    }

    if selected.len() < MIN_EVENTS {
        selected = events.iter().take(TARGET_EVENTS).collect();
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(text: &str) -> Candidate {
        Candidate {
            year: Some(1900),
            text: text.to_string(),
        }
    }

    fn domestic(n: usize) -> Candidate {
        candidate(&format!("日本で第{n}回目の大きな出来事が起こった"))
    }

    fn foreign(n: usize) -> Candidate {
        candidate(&format!("遠い国で第{n}回目の大きな出来事が起こった"))
    }

    fn texts(selected: &[&Candidate]) -> Vec<String> {
        selected.iter().map(|c| c.text.clone()).collect()
    }

    #[test]
    fn test_page_title() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(page_title(date), "1月9日");
    }

    #[test]
    fn test_quota_three_domestic_two_other() {
        let events: Vec<_> = (0..5).map(domestic).chain((0..5).map(foreign)).collect();
        let selected = select_events(&events);
        assert_eq!(
            texts(&selected),
            vec![
                events[0].text.clone(),
                events[1].text.clone(),
                events[2].text.clone(),
                events[5].text.clone(),
                events[6].text.clone(),
            ]
        );
    }

    #[test]
    fn test_backfills_from_other_events() {
        let events: Vec<_> = std::iter::once(domestic(0))
            .chain((0..6).map(foreign))
            .collect();
        let selected = select_events(&events);
        assert_eq!(selected.len(), 5);
        assert_eq!(selected[0].text, events[0].text);
        // other[0], other[1], then backfill other[2], other[3]
        assert_eq!(selected[4].text, events[4].text);
    }

    #[test]
    fn test_length_filter_abandoned_when_too_few() {
        let events = vec![
            candidate("短めの出来事"),
            candidate("これも短い話"),
            candidate("日本の短い出来事"),
            domestic(1),
        ];
        let selected = select_events(&events);
        // Only one event passes the window, so the raw candidates are used
        assert_eq!(selected.len(), 4);
        assert_eq!(selected[0].text, "短めの出来事");
    }

    #[test]
    fn test_over_long_events_are_filtered() {
        let long = "長".repeat(151);
        let events = vec![
            candidate(&long),
            domestic(0),
            domestic(1),
            foreign(0),
        ];
        let selected = select_events(&events);
        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|c| c.text != long));
    }

    fn http() -> HttpClient {
        HttpClient::new(reqwest::Client::new(), Duration::from_secs(5))
            .retry_base(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_fetch_builds_section() {
        let mock_server = MockServer::start().await;
        let html = "<ul>\
            <li>1868年 - 明治天皇が京都から東京へ初めて行幸される。</li>\
            <li>1957年 - 人工衛星スプートニク1号が打ち上げられる。</li>\
            <li>1964年 - 東京オリンピックの開会式が挙行される。</li>\
            </ul>";
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("page", "10月5日"))
            .and(query_param("action", "parse"))
            .and(query_param("section", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"parse": {"text": {"*": html}}})),
            )
            .mount(&mock_server)
            .await;

        let date = NaiveDate::from_ymd_opt(2025, 10, 5).unwrap();
        let section = fetch(
            &http(),
            &format!("{}/w/api.php", mock_server.uri()),
            "https://ja.wikipedia.org/wiki",
            date,
        )
        .await
        .unwrap();

        assert_eq!(section.source, SourceKind::Wikipedia);
        assert_eq!(section.title, "今日は何の日（10月5日）");
        assert_eq!(section.attribution, ATTRIBUTION);
        assert_eq!(section.items.len(), 3);
        // Domestic events before others
        assert_eq!(section.items[0].text(), "明治天皇が京都から東京へ初めて行幸される。");
        assert_eq!(section.items[1].text(), "東京オリンピックの開会式が挙行される。");
        let expected: usize = section.texts().map(|t| t.chars().count()).sum();
        assert_eq!(section.char_count, expected);
        match &section.items[0] {
            Item::Wikipedia(item) => {
                assert_eq!(item.year, Some(1868));
                assert_eq!(
                    item.url.as_deref(),
                    Some("https://ja.wikipedia.org/wiki/10%E6%9C%885%E6%97%A5")
                );
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_api_error_object() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"code": "missingtitle", "info": "The page you specified doesn't exist."}
            })))
            .mount(&mock_server)
            .await;

        let date = NaiveDate::from_ymd_opt(2025, 10, 5).unwrap();
        let result = fetch(&http(), &mock_server.uri(), "https://ja.wikipedia.org/wiki", date).await;
        assert!(matches!(result, Err(SourceError::Upstream(msg)) if msg.contains("doesn't exist")));
    }

    #[tokio::test]
    async fn test_fetch_no_list_items_is_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"parse": {"text": {"*": "<p>本文なし</p>"}}})),
            )
            .mount(&mock_server)
            .await;

        let date = NaiveDate::from_ymd_opt(2025, 10, 5).unwrap();
        let result = fetch(&http(), &mock_server.uri(), "https://ja.wikipedia.org/wiki", date).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_missing_text_is_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"parse": {}})))
            .mount(&mock_server)
            .await;

        let date = NaiveDate::from_ymd_opt(2025, 10, 5).unwrap();
        let result = fetch(&http(), &mock_server.uri(), "https://ja.wikipedia.org/wiki", date).await;
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }
}
