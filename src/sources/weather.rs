//! Weather overview from the Japan Meteorological Agency forecast API.
use serde::Deserialize;

use crate::content::http::{HttpClient, SourceError};
use crate::content::normalize::{compact_whitespace, sentences, take_chars};
use crate::model::{char_count, Item, Section, SourceKind, WeatherItem};
use crate::util::strip_control_chars;

pub const AGENCY: &str = "気象庁";
pub const DEFAULT_REGION: &str = "130000";
const DEFAULT_REGION_NAME: &str = "関東地方";

const OVERVIEW_MAX_CHARS: usize = 150;
const OVERVIEW_MIN_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverviewForecast {
    publishing_office: Option<String>,
    target_area: Option<String>,
    #[serde(default)]
    text: String,
}

/// Fetch the overview forecast for a JMA region code such as `130000`.
pub async fn fetch(http: &HttpClient, base_url: &str, region: &str) -> Result<Section, SourceError> {
    let url = format!("{}/{}.json", base_url.trim_end_matches('/'), region);
    let forecast: OverviewForecast = http.get_json(&url).await?;

    let overview = strip_control_chars(forecast.text.trim()).into_owned();
    if overview.is_empty() {
        return Err(SourceError::Upstream(format!(
            "empty weather overview for region {region}"
        )));
    }

    let text = shape_overview(&overview);
    let region_name = forecast
        .publishing_office
        .filter(|s| !s.is_empty())
        .or(forecast.target_area.filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_REGION_NAME.to_string());

    tracing::debug!(
        region = %region,
        raw_chars = char_count(&overview),
        chars = char_count(&text),
        "Shaped weather overview"
    );

    Ok(Section::new(
        SourceKind::Weather,
        format!("今日の天気（{region_name}）"),
        vec![Item::Weather(WeatherItem {
            text,
            agency: AGENCY.to_string(),
        })],
        AGENCY,
    ))
}

/// Bring a forecast overview to reading length.
///
/// Whitespace is removed. Text over 150 characters is cut to its first
/// sentence; text under 50 characters that lost something to compaction is
/// rebuilt from its first two sentences. The result never exceeds 150
/// characters.
pub fn shape_overview(overview: &str) -> String {
    let compact = compact_whitespace(overview);
    let mut text = if char_count(&compact) > OVERVIEW_MAX_CHARS {
        first_sentence(&compact)
    } else {
        compact.clone()
    };

    let len = char_count(&text);
    if len < OVERVIEW_MIN_CHARS && len < char_count(overview) {
        let two: Vec<&str> = sentences(&compact).into_iter().take(2).collect();
        let rebuilt = format!("{}。", two.join("。"));
        if char_count(&rebuilt) <= OVERVIEW_MAX_CHARS {
            text = rebuilt;
        }
    }
    text
}

/// The first sentence plus `。`, cut at the last `、` if it is still too
/// long. A cut that would leave fewer than 50 characters becomes a hard cut.
fn first_sentence(compact: &str) -> String {
    let first = sentences(compact).into_iter().next().unwrap_or_default();
    if char_count(first) < OVERVIEW_MAX_CHARS {
        return format!("{first}。");
    }

    let head = take_chars(first, OVERVIEW_MAX_CHARS - 1);
    let cut = match head.rfind('、') {
        Some(idx) if char_count(&head[..idx]) >= OVERVIEW_MIN_CHARS => &head[..idx],
        _ => head.as_str(),
    };
    format!("{cut}。")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_short_overview_is_compacted() {
        let text = shape_overview(
            "東京地方は、晴れています。\n\n　本州付近は高気圧に覆われています。関東甲信地方は晴れや曇りとなっています。",
        );
        assert_eq!(
            text,
            "東京地方は、晴れています。本州付近は高気圧に覆われています。関東甲信地方は晴れや曇りとなっています。"
        );
    }

    #[test]
    fn test_long_overview_keeps_first_sentence() {
        let first = "関東甲信地方は高気圧に覆われて晴れていますが、夕方以降は湿った空気の影響で雲が広がりやすいでしょう";
        let rest = "東京地方は今日は晴れ夜は曇りでしょう。".repeat(10);
        let text = shape_overview(&format!("{first}。\n{rest}"));
        assert_eq!(text, format!("{first}。"));
    }

    #[test]
    fn test_first_sentence_over_limit_is_cut_at_comma() {
        let clause = "東京地方は晴れていますが雲が広がりやすく、";
        let overview = format!("{}。", clause.repeat(10));
        let text = shape_overview(&overview);
        assert!(char_count(&text) <= OVERVIEW_MAX_CHARS);
        assert!(text.ends_with("く。"));
    }

    #[test]
    fn test_first_sentence_without_comma_is_hard_cut() {
        let overview = "晴".repeat(400);
        let text = shape_overview(&overview);
        assert_eq!(char_count(&text), OVERVIEW_MAX_CHARS);
        assert!(text.ends_with('。'));
    }

    #[test]
    fn test_early_comma_does_not_truncate_to_a_fragment() {
        let overview = format!("晴、{}。曇り。", "晴".repeat(300));
        let text = shape_overview(&overview);
        assert_eq!(char_count(&text), OVERVIEW_MAX_CHARS);
        assert!(text.starts_with("晴、晴晴"));
        assert!(text.ends_with("晴。"));
    }

    #[test]
    fn test_short_compacted_text_uses_two_sentences() {
        // Compaction removed whitespace, and the text is under 50 characters
        let text = shape_overview("晴れ。 曇り。 雨。");
        assert_eq!(text, "晴れ。曇り。");
    }

    #[test]
    fn test_short_text_without_whitespace_is_unchanged() {
        assert_eq!(shape_overview("晴れ。曇り。雨。"), "晴れ。曇り。雨。");
    }

    fn http() -> HttpClient {
        HttpClient::new(reqwest::Client::new(), Duration::from_secs(5))
            .retry_base(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_fetch_builds_single_item_section() {
        let mock_server = MockServer::start().await;
        let long = format!(
            "{}。{}",
            "関東甲信地方は高気圧に覆われて晴れています".repeat(3),
            "東京地方は今日は晴れでしょう。".repeat(10)
        );
        Mock::given(method("GET"))
            .and(path("/overview_forecast/130000.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "publishingOffice": "気象庁",
                "reportDatetime": "2025-10-05T10:41:00+09:00",
                "targetArea": "東京都",
                "headlineText": "",
                "text": long,
            })))
            .mount(&mock_server)
            .await;

        let base = format!("{}/overview_forecast", mock_server.uri());
        let section = fetch(&http(), &base, DEFAULT_REGION).await.unwrap();

        assert_eq!(section.source, SourceKind::Weather);
        assert_eq!(section.title, "今日の天気（気象庁）");
        assert_eq!(section.items.len(), 1);
        assert!(section.char_count <= OVERVIEW_MAX_CHARS);
        assert_eq!(section.char_count, char_count(section.items[0].text()));
    }

    #[tokio::test]
    async fn test_fetch_region_name_falls_back() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "晴れています。"})),
            )
            .mount(&mock_server)
            .await;

        let section = fetch(&http(), &mock_server.uri(), "270000").await.unwrap();
        assert_eq!(section.title, "今日の天気（関東地方）");
    }

    #[tokio::test]
    async fn test_fetch_empty_overview_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"publishingOffice": "気象庁", "text": "  "})),
            )
            .mount(&mock_server)
            .await;

        let result = fetch(&http(), &mock_server.uri(), DEFAULT_REGION).await;
        assert!(matches!(result, Err(SourceError::Upstream(_))));
    }
}
