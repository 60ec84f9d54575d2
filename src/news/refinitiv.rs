//! Refinitiv Knowledge Direct (RKD) news client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::NewsError;
use crate::http::{self, RetryPolicy};

const TOKEN_PATH: &str =
    "TokenManagement/TokenManagement.svc/REST/Anonymous/TokenManagement_1/CreateServiceToken_1";
const HEADLINE_PATH: &str = "News/News.svc/REST/News_1/RetrieveHeadlineML_1";
const STORY_PATH: &str = "News/News.svc/REST/News_1/RetrieveStoryML_1";

const APP_ID_HEADER: &str = "x-trkd-auth-applicationid";
const TOKEN_HEADER: &str = "x-trkd-auth-token";

/// RKD connection and query settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinitivConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// RKD application id.
    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub username: String,

    /// Environment variable holding the RKD password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Look back this many weeks from now.
    #[serde(default = "default_weeks_prior")]
    pub weeks_prior: u32,

    /// Headlines per query.
    #[serde(default = "default_max_count")]
    pub max_count: u32,

    /// Language metadata filter, e.g. `EN` or `ZH`.
    #[serde(default = "default_language")]
    pub language: String,

    /// Where the free text must match: `headline` or `body`.
    #[serde(default = "default_query_aspect")]
    pub query_aspect: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.rkd.refinitiv.com/api".to_string()
}

fn default_password_env() -> String {
    "RKD_PASSWORD".to_string()
}

fn default_weeks_prior() -> u32 {
    1
}

fn default_max_count() -> u32 {
    10
}

fn default_language() -> String {
    "EN".to_string()
}

fn default_query_aspect() -> String {
    "headline".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RefinitivConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: String::new(),
            username: String::new(),
            password_env: default_password_env(),
            weeks_prior: default_weeks_prior(),
            max_count: default_max_count(),
            language: default_language(),
            query_aspect: default_query_aspect(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A usable headline returned by a free-text query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Headline {
    /// Story id (`ID`).
    pub id: String,
    /// Creation time as sent by RKD (`CT`).
    pub creation_date: String,
    /// Headline text (`HT`).
    pub headline: String,
}

/// Blocking RKD client. Holds the service token after [`authenticate`].
///
/// [`authenticate`]: RefinitivClient::authenticate
pub struct RefinitivClient {
    client: Client,
    config: RefinitivConfig,
    password: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RefinitivClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinitivClient")
            .field("base_url", &self.config.base_url)
            .field("app_id", &self.config.app_id)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl RefinitivClient {
    pub fn new(
        config: &RefinitivConfig,
        password: &str,
        retry: RetryPolicy,
    ) -> Result<Self, NewsError> {
        if config.app_id.trim().is_empty() || config.username.trim().is_empty() {
            return Err(NewsError::Config(
                "refinitiv.app_id and refinitiv.username are required".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(NewsError::Config(format!(
                "missing RKD password (set {})",
                config.password_env
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=utf-8"),
        );
        let client = http::build_client(Duration::from_secs(config.timeout_secs.max(1)), headers)
            .map_err(|e| NewsError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            password: password.to_string(),
            token: None,
            retry,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Create a service token and keep it for later requests.
    pub fn authenticate(&mut self) -> Result<(), NewsError> {
        let body = json!({
            "CreateServiceToken_Request_1": {
                "ApplicationID": self.config.app_id,
                "Username": self.config.username,
                "Password": self.password,
            }
        });
        let response = self
            .post(TOKEN_PATH, &body, None)
            .map_err(|e| match e {
                NewsError::Status { status, body } => {
                    NewsError::Auth(format!("status {status}: {body}"))
                }
                other => other,
            })?;

        let token = response
            .pointer("/CreateServiceToken_Response_1/Token")
            .and_then(Value::as_str)
            .ok_or_else(|| NewsError::Auth("response has no token".to_string()))?;
        self.token = Some(token.to_string());
        tracing::info!(target: "news", "RKD authentication succeeded");
        Ok(())
    }

    /// Usable headlines matching `query` over the configured look-back window.
    pub fn headlines(&self, query: &str) -> Result<Vec<Headline>, NewsError> {
        let end = Utc::now();
        let start = end - chrono::Duration::weeks(i64::from(self.config.weeks_prior));
        self.headlines_between(query, start, end)
    }

    /// Usable headlines matching `query` between `start` and `end`.
    pub fn headlines_between(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Headline>, NewsError> {
        let token = self.token.as_deref().ok_or(NewsError::NotAuthenticated)?;
        let body = headline_request(&self.config, query, start, end);
        let response = self.post(HEADLINE_PATH, &body, Some(token))?;
        let headlines = parse_headlines(&response, query)?;
        tracing::debug!(
            target: "news",
            "{} usable headline(s) for {query:?}",
            headlines.len()
        );
        Ok(headlines)
    }

    /// Body text of story `id`.
    pub fn story(&self, id: &str) -> Result<Option<String>, NewsError> {
        let token = self.token.as_deref().ok_or(NewsError::NotAuthenticated)?;
        let body = json!({
            "RetrieveStoryML_Request_1": {
                "StoryMLRequest": { "StoryId": [id] }
            }
        });
        let response = self.post(STORY_PATH, &body, Some(token))?;
        Ok(parse_story(&response))
    }

    fn post(&self, path: &str, body: &Value, token: Option<&str>) -> Result<Value, NewsError> {
        let url = http::join_url(&self.config.base_url, path);
        self.retry.run("rkd request", |attempt| {
            tracing::debug!(target: "news", "POST {url} (attempt {attempt})");
            let mut request = self.client.post(&url).json(body);
            if let Some(token) = token {
                request = request
                    .header(APP_ID_HEADER, self.config.app_id.as_str())
                    .header(TOKEN_HEADER, token);
            }
            let resp = request.send()?;
            let status = resp.status();
            if !status.is_success() {
                return Err(NewsError::from_status(status, http::error_body(resp)));
            }
            resp.json::<Value>()
                .map_err(|e| NewsError::MalformedResponse(e.to_string()))
        })
    }
}

/// `RetrieveHeadlineML_1` request body.
pub fn headline_request(
    config: &RefinitivConfig,
    query: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Value {
    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
    json!({
        "RetrieveHeadlineML_Request_1": {
            "HeadlineMLRequest": {
                "TimeOut": 0,
                "MaxCount": config.max_count,
                "Direction": "Newer",
                "StartTime": start.format(FORMAT).to_string(),
                "EndTime": end.format(FORMAT).to_string(),
                "Filter": [
                    {
                        "FreeTextConstraint": {
                            "Value": { "Text": query },
                            "where": config.query_aspect,
                        }
                    },
                    {
                        "MetaDataConstraint": {
                            "Value": { "Text": config.language },
                            "class": "Language",
                        }
                    }
                ]
            }
        }
    })
}

/// Extract usable headlines from a `RetrieveHeadlineML_1` response.
///
/// A null `HEADLINEML` means the query matched nothing.
pub fn parse_headlines(response: &Value, query: &str) -> Result<Vec<Headline>, NewsError> {
    let headline_ml = response
        .pointer("/RetrieveHeadlineML_Response_1/HeadlineMLResponse")
        .ok_or_else(|| NewsError::MalformedResponse("missing HeadlineMLResponse".to_string()))?
        .get("HEADLINEML")
        .filter(|v| !v.is_null())
        .ok_or_else(|| NewsError::NoResults {
            query: query.to_string(),
        })?;

    let items = headline_ml
        .get("HL")
        .and_then(Value::as_array)
        .ok_or_else(|| NewsError::MalformedResponse("HEADLINEML has no HL list".to_string()))?;

    Ok(items
        .iter()
        .filter(|item| item.get("ST").and_then(Value::as_str) == Some("Usable"))
        .map(|item| Headline {
            id: field(item, "ID"),
            creation_date: field(item, "CT"),
            headline: field(item, "HT"),
        })
        .collect())
}

/// Body text (`TE`) of the first story in a `RetrieveStoryML_1` response.
pub fn parse_story(response: &Value) -> Option<String> {
    response
        .pointer("/RetrieveStoryML_Response_1/StoryMLResponse/STORYML/HL/0/TE")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_headline_request_shape() {
        let config = RefinitivConfig::default();
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 5, 8, 9, 0, 0).unwrap();
        let body = headline_request(&config, "HSBC", start, end);
        let req = &body["RetrieveHeadlineML_Request_1"]["HeadlineMLRequest"];
        assert_eq!(req["MaxCount"], 10);
        assert_eq!(req["Direction"], "Newer");
        assert_eq!(req["StartTime"], "2023-05-01T09:00:00");
        assert_eq!(req["EndTime"], "2023-05-08T09:00:00");
        assert_eq!(req["Filter"][0]["FreeTextConstraint"]["Value"]["Text"], "HSBC");
        assert_eq!(req["Filter"][0]["FreeTextConstraint"]["where"], "headline");
        assert_eq!(req["Filter"][1]["MetaDataConstraint"]["class"], "Language");
        assert_eq!(req["Filter"][1]["MetaDataConstraint"]["Value"]["Text"], "EN");
    }

    #[test]
    fn test_only_usable_headlines_are_kept() {
        let response = json!({
            "RetrieveHeadlineML_Response_1": {
                "HeadlineMLResponse": {
                    "HEADLINEML": {
                        "HL": [
                            {"ID": "urn:1", "CT": "2023-05-02T01:00:00", "HT": "HSBC profit beats", "ST": "Usable"},
                            {"ID": "urn:2", "CT": "2023-05-02T02:00:00", "HT": "Withdrawn", "ST": "Canceled"},
                            {"ID": "urn:3", "CT": "2023-05-03T03:00:00", "HT": "HSBC buyback", "ST": "Usable"}
                        ]
                    }
                }
            }
        });
        let headlines = parse_headlines(&response, "HSBC").unwrap();
        let ids: Vec<&str> = headlines.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["urn:1", "urn:3"]);
        assert_eq!(headlines[0].headline, "HSBC profit beats");
        assert_eq!(headlines[1].creation_date, "2023-05-03T03:00:00");
    }

    #[test]
    fn test_null_headlineml_is_no_results() {
        let response = json!({
            "RetrieveHeadlineML_Response_1": {"HeadlineMLResponse": {"HEADLINEML": null}}
        });
        let err = parse_headlines(&response, "nothing").unwrap_err();
        assert!(matches!(err, NewsError::NoResults { query } if query == "nothing"));
    }

    #[test]
    fn test_parse_story() {
        let response = json!({
            "RetrieveStoryML_Response_1": {
                "StoryMLResponse": {"STORYML": {"HL": [{"ID": "urn:1", "TE": "<p>Body</p>"}]}}
            }
        });
        assert_eq!(parse_story(&response).as_deref(), Some("<p>Body</p>"));
        assert_eq!(parse_story(&json!({})), None);
    }

    #[test]
    fn test_requires_credentials() {
        let err = RefinitivClient::new(&RefinitivConfig::default(), "pw", RetryPolicy::once())
            .unwrap_err();
        assert!(matches!(err, NewsError::Config(_)));
    }

    #[test]
    fn test_queries_need_token() {
        let config = RefinitivConfig {
            app_id: "app".to_string(),
            username: "user".to_string(),
            ..Default::default()
        };
        let client = RefinitivClient::new(&config, "pw", RetryPolicy::once()).unwrap();
        assert!(!client.is_authenticated());
        assert!(matches!(
            client.headlines("HSBC"),
            Err(NewsError::NotAuthenticated)
        ));
    }
}
