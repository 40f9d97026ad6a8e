//! The slice of the GitHub REST API the changelog needs: closed pull requests
//! for a repository and the comments on their backing issues.

use std::fmt;

use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument, trace};
use url::Url;

use crate::credentials::Credentials;
use crate::errors::*;

pub const API_BASE_URL: &str = "https://api.github.com";

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub const ACCEPT: &str = "application/vnd.github.v3+json";

const PER_PAGE: &str = "100";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub login: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub user: User,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Accepts `owner/name`, or a bare `name` owned by `default_owner`.
    pub fn parse(repo: &str, default_owner: &str) -> Result<Self> {
        let invalid = || ErrorKind::InvalidRepo(repo.to_string());
        let repo = repo.trim();

        let (owner, name) = match repo.split_once('/') {
            Some((owner, name)) => (owner, name),
            None => (default_owner, repo),
        };

        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

pub trait PullRequestApi {
    /// Every closed pull request, in the order the API returns them.
    fn list_closed_pull_requests(&self, repo: &RepoSlug) -> Result<Vec<PullRequest>>;

    /// Comments on the issue backing pull request `number`.
    fn list_issue_comments(&self, repo: &RepoSlug, number: u64) -> Result<Vec<Comment>>;
}

pub struct GitHubClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl GitHubClient {
    pub fn new(credentials: Credentials, base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .chain_err(|| "Couldn't build the HTTP client")?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::from(format!("{} can't be used as an API base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("per_page", PER_PAGE)
            .append_pair("page", "1");
        Ok(url)
    }

    /// GETs `url` and every page after it, concatenating the JSON arrays.
    fn get_all<T: DeserializeOwned>(&self, mut url: Url) -> Result<Vec<T>> {
        let mut items = Vec::new();

        loop {
            trace!("GitHub API URL: {}", url);

            let response = self
                .client
                .get(url.clone())
                .header(header::ACCEPT, ACCEPT)
                .basic_auth(&self.credentials.username, Some(&self.credentials.token))
                .send()
                .chain_err(|| format!("GET {} failed", url))?;

            let status = response.status();
            debug!("GitHub API response status: {}", status);

            match status {
                s if s.is_success() => {}
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    debug!("Authentication failed when accessing GitHub API");
                    bail!(ErrorKind::Unauthorized(url.to_string()));
                }
                StatusCode::NOT_FOUND => bail!(ErrorKind::NotFound(url.to_string())),
                _ => {
                    let body = response.text().unwrap_or_default();
                    bail!(ErrorKind::UnexpectedStatus(url.to_string(), status.as_u16(), body));
                }
            }

            let next = next_page(response.headers());
            let mut page: Vec<T> = response
                .json()
                .chain_err(|| format!("Failed to parse response from {}", url))?;
            items.append(&mut page);

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(items)
    }
}

impl PullRequestApi for GitHubClient {
    #[instrument(skip(self), level = "debug")]
    fn list_closed_pull_requests(&self, repo: &RepoSlug) -> Result<Vec<PullRequest>> {
        let mut url = self.endpoint(&["repos", &repo.owner, &repo.name, "pulls"])?;
        url.query_pairs_mut().append_pair("state", "closed");

        let pulls: Vec<PullRequest> = self.get_all(url)?;
        debug!("Fetched {} closed pull requests", pulls.len());
        Ok(pulls)
    }

    #[instrument(skip(self), level = "debug")]
    fn list_issue_comments(&self, repo: &RepoSlug, number: u64) -> Result<Vec<Comment>> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", &repo.owner, &repo.name, "issues", &number, "comments"])?;

        self.get_all(url)
    }
}

/// The `rel="next"` target of a `Link` header, if any.
fn next_page(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(header::LINK)?.to_str().ok()?;

    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|param| param.trim() == r#"rel="next""#) {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    // base64("test_user:test_token")
    const BASIC_AUTH: &str = "Basic dGVzdF91c2VyOnRlc3RfdG9rZW4=";

    fn client_for(uri: &str) -> GitHubClient {
        let credentials = Credentials {
            username: "test_user".to_string(),
            token: "test_token".to_string(),
        };
        GitHubClient::new(credentials, Url::parse(uri).unwrap()).unwrap()
    }

    fn repo() -> RepoSlug {
        RepoSlug {
            owner: "owner".to_string(),
            name: "repo".to_string(),
        }
    }

    fn pull_json(number: u64, title: &str, login: &str) -> serde_json::Value {
        json!({
            "number": number,
            "title": title,
            "state": "closed",
            "html_url": format!("https://github.com/owner/repo/pull/{}", number),
            "user": { "login": login, "id": 1 }
        })
    }

    #[test]
    fn repo_slug_with_owner() {
        let slug = RepoSlug::parse("rust-lang/cargo", "alice").unwrap();
        assert_eq!(slug.owner, "rust-lang");
        assert_eq!(slug.name, "cargo");
        assert_eq!(slug.to_string(), "rust-lang/cargo");
    }

    #[test]
    fn bare_repo_name_belongs_to_the_user() {
        let slug = RepoSlug::parse("dotfiles", "alice").unwrap();
        assert_eq!(slug.to_string(), "alice/dotfiles");
    }

    #[test]
    fn malformed_repo_names_are_rejected() {
        for bad in ["", "/repo", "owner/", "a/b/c"] {
            let err = RepoSlug::parse(bad, "alice").unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::InvalidRepo(_)), "{bad}");
        }
    }

    #[test]
    fn null_comment_body_is_empty() {
        let comment: Comment = serde_json::from_value(json!({ "id": 1, "body": null })).unwrap();
        assert_eq!(comment.body, "");
    }

    #[test]
    fn next_page_follows_rel_next() {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::LINK,
            HeaderValue::from_static(
                "<https://api.github.com/repositories/1/pulls?page=3>; rel=\"next\", \
                 <https://api.github.com/repositories/1/pulls?page=9>; rel=\"last\"",
            ),
        );

        let next = next_page(&headers).unwrap();
        assert_eq!(next.as_str(), "https://api.github.com/repositories/1/pulls?page=3");
    }

    #[test]
    fn last_page_has_no_next() {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"first\", <https://api.github.com/x?page=1>; rel=\"prev\""),
        );
        assert!(next_page(&headers).is_none());
        assert!(next_page(&HeaderMap::new()).is_none());
    }

    #[test]
    fn endpoint_keeps_enterprise_path_prefix() {
        let client = client_for("https://ghe.example.com/api/v3/");
        let url = client.endpoint(&["repos", "owner", "repo", "pulls"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/owner/repo/pulls?per_page=100&page=1"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lists_closed_pull_requests_across_pages() {
        let mock_server = MockServer::start().await;
        let next = format!(
            "<{}/repos/owner/repo/pulls?state=closed&per_page=100&page=2>; rel=\"next\"",
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/pulls"))
            .and(query_param("state", "closed"))
            .and(query_param("page", "1"))
            .and(header("accept", ACCEPT))
            .and(header("user-agent", USER_AGENT))
            .and(header("authorization", BASIC_AUTH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(json!([pull_json(12, "Second", "bob"), pull_json(11, "First", "alice")])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/pulls"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([pull_json(3, "Old", "carol")])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let uri = mock_server.uri();
        let numbers = tokio::task::spawn_blocking(move || {
            client_for(&uri)
                .list_closed_pull_requests(&repo())
                .unwrap()
                .into_iter()
                .map(|pull| (pull.number, pull.user.login))
                .collect::<Vec<_>>()
        })
        .await
        .unwrap();

        assert_eq!(
            numbers,
            vec![(12, "bob".to_string()), (11, "alice".to_string()), (3, "carol".to_string())]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lists_issue_comments() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues/42/comments"))
            .and(header("authorization", BASIC_AUTH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "body": "See [docs](https://example.com/docs)" },
                { "id": 2, "body": null }
            ])))
            .mount(&mock_server)
            .await;

        let uri = mock_server.uri();
        let bodies = tokio::task::spawn_blocking(move || {
            client_for(&uri)
                .list_issue_comments(&repo(), 42)
                .unwrap()
                .into_iter()
                .map(|comment| comment.body)
                .collect::<Vec<_>>()
        })
        .await
        .unwrap();

        assert_eq!(bodies, vec!["See [docs](https://example.com/docs)".to_string(), String::new()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthorized_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/pulls"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let uri = mock_server.uri();
        let unauthorized = tokio::task::spawn_blocking(move || {
            let err = client_for(&uri).list_closed_pull_requests(&repo()).unwrap_err();
            matches!(err.kind(), ErrorKind::Unauthorized(_))
        })
        .await
        .unwrap();

        assert!(unauthorized);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_repository_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/pulls"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let uri = mock_server.uri();
        let message = tokio::task::spawn_blocking(move || {
            client_for(&uri)
                .list_closed_pull_requests(&repo())
                .unwrap_err()
                .to_string()
        })
        .await
        .unwrap();

        assert!(message.starts_with("Not found: "));
        assert!(message.contains("/repos/owner/repo/pulls"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unexpected_status_carries_the_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues/7/comments"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let uri = mock_server.uri();
        let message = tokio::task::spawn_blocking(move || {
            client_for(&uri)
                .list_issue_comments(&repo(), 7)
                .unwrap_err()
                .to_string()
        })
        .await
        .unwrap();

        assert!(message.contains("HTTP 502 - bad gateway"));
    }
}
