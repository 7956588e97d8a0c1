pub mod fallback;
pub mod news;
pub mod weather;
pub mod wikipedia;

use chrono::NaiveDate;

use crate::config::Config;
use crate::content::http::HttpClient;
use crate::model::{Section, SourceKind};

pub use crate::content::http::SourceError;

/// Provider endpoints, taken from config so tests can point them at a mock.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub wikipedia_api_url: String,
    pub wikipedia_page_url: String,
    pub news_feed_url: String,
    pub weather_base_url: String,
    pub weather_region: String,
}

impl From<&Config> for Endpoints {
    fn from(config: &Config) -> Self {
        Self {
            wikipedia_api_url: config.wikipedia_api_url.clone(),
            wikipedia_page_url: config.wikipedia_page_url.clone(),
            news_feed_url: config.news_feed_url.clone(),
            weather_base_url: config.weather_base_url.clone(),
            weather_region: config.weather_region.clone(),
        }
    }
}

/// Dispatches one fetch per [`SourceKind`] to the matching adapter.
#[derive(Debug, Clone)]
pub struct Sources {
    http: HttpClient,
    endpoints: Endpoints,
}

impl Sources {
    pub fn new(http: HttpClient, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let http = HttpClient::with_user_agent(&config.user_agent, config.request_timeout())?;
        Ok(Self::new(http, Endpoints::from(config)))
    }

    /// Fetch one source's section for `date`.
    ///
    /// The date only affects Wikipedia and the fallback; news and weather
    /// always report the current state.
    pub async fn fetch(&self, kind: SourceKind, date: NaiveDate) -> Result<Section, SourceError> {
        let ep = &self.endpoints;
        match kind {
            SourceKind::Wikipedia => {
                wikipedia::fetch(&self.http, &ep.wikipedia_api_url, &ep.wikipedia_page_url, date)
                    .await
            }
            SourceKind::News => news::fetch(&self.http, &ep.news_feed_url).await,
            SourceKind::Weather => {
                weather::fetch(&self.http, &ep.weather_base_url, &ep.weather_region).await
            }
            SourceKind::Fallback => Ok(fallback::reading(date)),
        }
    }
}
