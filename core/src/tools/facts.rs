//! Movie fact API client

use crate::config::FactApiConfig;
use crate::error::{FactError, Result};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A single fact the API can look up for a movie title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Rating,
    Year,
    Actor,
    Location,
    Genre,
}

impl FactKind {
    /// Fact kinds in the order their tools are advertised
    pub const ALL: [FactKind; 5] = [
        FactKind::Rating,
        FactKind::Location,
        FactKind::Year,
        FactKind::Actor,
        FactKind::Genre,
    ];

    /// Path segment appended to the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            FactKind::Rating => "rating",
            FactKind::Year => "year",
            FactKind::Actor => "actor",
            FactKind::Location => "location",
            FactKind::Genre => "genre",
        }
    }

    /// Name of the tool that looks up this fact
    pub fn tool_name(&self) -> &'static str {
        match self {
            FactKind::Rating => "get_movie_rating",
            FactKind::Year => "get_movie_year",
            FactKind::Actor => "get_movie_actor",
            FactKind::Location => "get_movie_location",
            FactKind::Genre => "get_movie_genre",
        }
    }

    /// Tool description shown to the model
    pub fn description(&self) -> &'static str {
        match self {
            FactKind::Rating => "Gets the rating of a movie",
            FactKind::Year => "Gets the release year of a movie",
            FactKind::Actor => "Gets the leading actor of a movie",
            FactKind::Location => "Gets the location of a movie",
            FactKind::Genre => "Gets the genre of a movie",
        }
    }

    /// Text returned to the model when the lookup fails
    pub fn fallback(&self) -> &'static str {
        match self {
            FactKind::Rating => "Sorry, I couldn't find a rating for that movie.",
            FactKind::Year => "Sorry, I couldn't find a year for that movie.",
            FactKind::Actor => "Sorry, I couldn't find an actor for that movie.",
            FactKind::Location => "Sorry, I couldn't find a location for that movie.",
            FactKind::Genre => "Sorry, I couldn't find a genre for that movie.",
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// HTTP client for the fact API.
///
/// Each lookup is `GET {base_url}{kind}` with the title in a `title` header;
/// the plain-text body is the fact.
#[derive(Clone)]
pub struct FactClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FactClient {
    /// Create a client with the configured timeout and retry budget
    pub fn new(config: &FactApiConfig) -> Result<Self> {
        Self::with_backoff(
            config,
            ExponentialBackoff::builder().build_with_max_retries(config.max_retries),
        )
    }

    /// Create a client with a custom retry policy
    pub fn with_backoff(config: &FactApiConfig, policy: ExponentialBackoff) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut builder = ClientBuilder::new(http);
        if config.max_retries > 0 {
            builder = builder.with(RetryTransientMiddleware::new_with_policy(policy));
        }

        // The fact kind is appended directly, so the base must end in a slash
        let base_url = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };

        Ok(Self {
            client: builder.build(),
            base_url,
        })
    }

    /// Look up one fact for a title
    pub async fn lookup(&self, kind: FactKind, title: &str) -> std::result::Result<String, FactError> {
        let url = format!("{}{}", self.base_url, kind.path());
        tracing::debug!(%kind, title, "Fact lookup");

        let response = self
            .client
            .get(&url)
            .header("title", title)
            .send()
            .await
            .map_err(|e| FactError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FactError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FactError::Transport {
            message: e.to_string(),
        })?;

        tracing::debug!(%kind, response = %body, "Fact API response");
        Ok(body)
    }

    /// Look up one fact, falling back to the kind's apology text on any failure
    pub async fn lookup_or_fallback(&self, kind: FactKind, title: &str) -> String {
        match self.lookup(kind, title).await {
            Ok(fact) => fact,
            Err(e) => {
                tracing::warn!(%kind, title, error = %e, "Fact lookup failed, using fallback");
                kind.fallback().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> FactApiConfig {
        FactApiConfig::new(format!("{}/", server.uri())).with_max_retries(0)
    }

    #[test]
    fn test_fallback_texts_are_kind_specific() {
        assert_eq!(
            FactKind::Rating.fallback(),
            "Sorry, I couldn't find a rating for that movie."
        );
        assert_eq!(
            FactKind::Actor.fallback(),
            "Sorry, I couldn't find an actor for that movie."
        );
        assert_eq!(
            FactKind::Location.fallback(),
            "Sorry, I couldn't find a location for that movie."
        );
        assert_eq!(
            FactKind::Genre.fallback(),
            "Sorry, I couldn't find a genre for that movie."
        );
    }

    #[tokio::test]
    async fn test_lookup_sends_title_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/year"))
            .and(header("title", "Inception"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2010"))
            .expect(1)
            .mount(&server)
            .await;

        let client = FactClient::new(&config(&server)).unwrap();
        let fact = client.lookup(FactKind::Year, "Inception").await.unwrap();
        assert_eq!(fact, "2010");
    }

    #[tokio::test]
    async fn test_base_url_without_trailing_slash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/year"))
            .and(header("title", "Inception"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2010"))
            .expect(1)
            .mount(&server)
            .await;

        let config = FactApiConfig::new(server.uri()).with_max_retries(0);
        let client = FactClient::new(&config).unwrap();
        assert_eq!(client.lookup_or_fallback(FactKind::Year, "Inception").await, "2010");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rating"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = FactClient::new(&config(&server)).unwrap();
        let result = client.lookup(FactKind::Rating, "Unknown").await;
        assert!(matches!(result, Err(FactError::Status { status: 404 })));
        assert_eq!(
            client.lookup_or_fallback(FactKind::Rating, "Unknown").await,
            FactKind::Rating.fallback()
        );
    }

    #[tokio::test]
    async fn test_timeout_resolves_to_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/genre"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Sci-Fi")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = FactClient::new(&config(&server).with_timeout_secs(1)).unwrap();
        let fact = client.lookup_or_fallback(FactKind::Genre, "Alien").await;
        assert_eq!(fact, FactKind::Genre.fallback());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/actor"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/actor"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Leonardo DiCaprio"))
            .mount(&server)
            .await;

        let policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(5), Duration::from_millis(20))
            .build_with_max_retries(1);
        let client = FactClient::with_backoff(&config(&server).with_max_retries(1), policy).unwrap();

        let fact = client.lookup(FactKind::Actor, "Inception").await.unwrap();
        assert_eq!(fact, "Leonardo DiCaprio");
    }

    #[tokio::test]
    async fn test_unreachable_host_resolves_to_fallback() {
        let config = FactApiConfig::new("http://127.0.0.1:9/").with_max_retries(0);
        let client = FactClient::new(&config).unwrap();
        let fact = client.lookup_or_fallback(FactKind::Location, "Alien").await;
        assert_eq!(fact, FactKind::Location.fallback());
    }
}
