//! GitHub GraphQL client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ItemType, RawItem, RawPage, TrackerClient, TrackerError, TrackerTarget};

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Author login GitHub shows for deleted accounts
pub const GHOST_LOGIN: &str = "ghost";

// `CONNECTION` is replaced with the repository connection name
const PAGE_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    items: CONNECTION(first: $first, after: $after, orderBy: {field: CREATED_AT, direction: ASC}) {
      pageInfo { endCursor hasNextPage }
      nodes {
        id
        number
        author { login }
        createdAt
        closedAt
        state
        labels(first: 100) { nodes { name } }
      }
    }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GitHubClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("prime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrackerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TrackerClient for GitHubClient {
    async fn fetch_page(
        &self,
        target: &TrackerTarget,
        item_type: ItemType,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RawPage, TrackerError> {
        let body = json!({
            "query": PAGE_QUERY.replace("CONNECTION", item_type.connection()),
            "variables": {
                "owner": target.owner,
                "name": target.name,
                "first": page_size,
                "after": cursor,
            }
        });

        debug!(
            "POST {} ({} of {}, after {:?})",
            self.endpoint,
            item_type.connection(),
            target,
            cursor
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response.headers(), target, Utc::now()));
        }

        let text = response.text().await.map_err(classify_transport)?;
        parse_page_body(&text, target)
    }
}

fn classify_transport(error: reqwest::Error) -> TrackerError {
    if error.is_timeout() {
        TrackerError::Timeout
    } else if error.is_decode() {
        TrackerError::Decode(error.to_string())
    } else {
        TrackerError::Transport(error.to_string())
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Map a non-success HTTP status onto a tracker error.
///
/// The wait comes from `Retry-After`, or failing that from the quota reset
/// time (`x-ratelimit-reset`, epoch seconds) once the quota is used up.
pub fn classify_status(
    status: StatusCode,
    headers: &HeaderMap,
    target: &TrackerTarget,
    now: DateTime<Utc>,
) -> TrackerError {
    let quota_exhausted = header(headers, "x-ratelimit-remaining") == Some("0");
    let retry_after = header(headers, RETRY_AFTER.as_str())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .or_else(|| {
            if !quota_exhausted {
                return None;
            }
            let reset = header(headers, "x-ratelimit-reset")?.parse::<i64>().ok()?;
            let reset = DateTime::from_timestamp(reset, 0)?;
            Some((reset - now).to_std().unwrap_or(Duration::ZERO))
        });

    match status {
        StatusCode::UNAUTHORIZED => TrackerError::Unauthorized,
        StatusCode::NOT_FOUND => TrackerError::NotFound {
            target: target.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => TrackerError::RateLimited { retry_after },
        StatusCode::FORBIDDEN if quota_exhausted || retry_after.is_some() => {
            TrackerError::RateLimited { retry_after }
        }
        s if s.is_server_error() => TrackerError::Server(s.as_u16()),
        s => TrackerError::Http(s.as_u16()),
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    items: ItemConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemConnection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<ItemNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemNode {
    id: String,
    number: i64,
    author: Option<Author>,
    created_at: String,
    closed_at: Option<String>,
    state: String,
    labels: Option<LabelConnection>,
}

#[derive(Debug, Deserialize)]
struct Author {
    login: String,
}

#[derive(Debug, Deserialize)]
struct LabelConnection {
    #[serde(default)]
    nodes: Vec<Option<Label>>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

/// Decode a GraphQL response body into one page of raw items
pub fn parse_page_body(body: &str, target: &TrackerTarget) -> Result<RawPage, TrackerError> {
    let response: GraphQlResponse =
        serde_json::from_str(body).map_err(|e| TrackerError::Decode(e.to_string()))?;

    if !response.errors.is_empty() {
        let kinds: Vec<&str> = response.errors.iter().filter_map(|e| e.kind.as_deref()).collect();
        if kinds.contains(&"NOT_FOUND") {
            return Err(TrackerError::NotFound {
                target: target.to_string(),
            });
        }
        if kinds.contains(&"RATE_LIMITED") {
            return Err(TrackerError::RateLimited { retry_after: None });
        }
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(TrackerError::Api(messages.join("; ")));
    }

    let repository = response
        .data
        .and_then(|d| d.repository)
        .ok_or_else(|| TrackerError::NotFound {
            target: target.to_string(),
        })?;

    let connection = repository.items;
    let items = connection
        .nodes
        .into_iter()
        .flatten()
        .map(|node| RawItem {
            id: node.id,
            number: node.number,
            author: node.author.map(|a| a.login),
            created_at: node.created_at,
            closed_at: node.closed_at,
            state: node.state,
            labels: node
                .labels
                .map(|l| l.nodes.into_iter().flatten().map(|label| label.name).collect())
                .unwrap_or_default(),
        })
        .collect();

    Ok(RawPage {
        items,
        end_cursor: connection.page_info.end_cursor,
        has_next_page: connection.page_info.has_next_page,
    })
}
