// Realtime database REST client
//
// Wraps `reqwest::Client` with path-to-URL construction (`<base>/<a>/<b>.json`),
// auth-token injection, and status/error-body handling. Every location in the
// database is addressed by a slice of raw path segments; percent-encoding is
// applied here so callers can use keys such as `"Testing Sites"` verbatim.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{ErrorBody, PushResponse};
use crate::transport::TransportConfig;

/// HTTP client for one realtime database instance.
///
/// Cheap to clone: both inner `reqwest::Client`s are reference-counted.
#[derive(Clone)]
pub struct RealtimeClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: Url,
    auth: Option<SecretString>,
}

impl RealtimeClient {
    /// Create a client for the database at `base_url`
    /// (e.g. `https://project-default-rtdb.firebaseio.com`).
    pub fn new(
        base_url: Url,
        auth: Option<SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        ensure_base(&base_url)?;
        Ok(Self {
            http: transport.build_client()?,
            stream_http: transport.build_stream_client()?,
            base_url,
            auth,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`, used for both
    /// REST calls and event streams.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        ensure_base(&base_url)?;
        Ok(Self {
            stream_http: http.clone(),
            http,
            base_url,
            auth: None,
        })
    }

    /// Attach an auth token, sent as the `auth` query parameter.
    #[must_use]
    pub fn with_auth(mut self, token: SecretString) -> Self {
        self.auth = Some(token);
        self
    }

    /// The database base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The client used for long-lived event streams.
    pub(crate) fn stream_http(&self) -> &reqwest::Client {
        &self.stream_http
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build the REST URL for a database location.
    ///
    /// `["Testing Sites", "40_713 -74_006"]` becomes
    /// `<base>/Testing%20Sites/40_713%20-74_006.json`. The empty path
    /// addresses the database root (`<base>/.json`).
    pub fn url_for(&self, path: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::CannotBeABase(self.base_url.to_string()))?;
            segments.pop_if_empty();
            match path.split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }

        if let Some(ref token) = self.auth {
            url.query_pairs_mut()
                .append_pair("auth", token.expose_secret());
        }

        Ok(url)
    }

    // ── REST verbs ───────────────────────────────────────────────────

    /// Read the value at `path`. A location with no data reads as `None`.
    pub async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<Option<T>, Error> {
        let url = self.url_for(path)?;
        debug!(path = %path.join("/"), "GET");

        let resp = self.http.get(url).send().await?;
        let body = check_status(resp).await?.text().await?;

        serde_json::from_str::<Option<T>>(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Overwrite the value at `path`.
    pub async fn put(&self, path: &[&str], body: &impl Serialize) -> Result<(), Error> {
        let url = self.url_for(path)?;
        debug!(path = %path.join("/"), "PUT");

        let resp = self
            .http
            .put(url)
            .query(&[("print", "silent")])
            .json(body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Append a child under `path` with a server-generated key and return
    /// that key (chronologically ordered push id).
    pub async fn push(&self, path: &[&str], body: &impl Serialize) -> Result<String, Error> {
        let url = self.url_for(path)?;
        debug!(path = %path.join("/"), "POST");

        let resp = self.http.post(url).json(body).send().await?;
        let text = check_status(resp).await?.text().await?;

        serde_json::from_str::<PushResponse>(&text)
            .map(|r| r.name)
            .map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text,
            })
    }

    /// Delete the value at `path` (and everything below it).
    pub async fn delete(&self, path: &[&str]) -> Result<(), Error> {
        let url = self.url_for(path)?;
        debug!(path = %path.join("/"), "DELETE");

        let resp = self.http.delete(url).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn ensure_base(url: &Url) -> Result<(), Error> {
    if url.cannot_be_a_base() {
        return Err(Error::CannotBeABase(url.to_string()));
    }
    Ok(())
}

/// Map non-success statuses to typed errors, extracting the database's
/// `{"error": "..."}` message when present.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);

    match status.as_u16() {
        401 | 403 => Err(Error::PermissionDenied { message }),
        code => Err(Error::Api {
            status: code,
            message,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> RealtimeClient {
        RealtimeClient::from_reqwest(base, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn url_encodes_segments_and_appends_json() {
        let c = client("https://example.firebaseio.com");
        let url = c.url_for(&["Testing Sites", "40_713 -74_006"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.firebaseio.com/Testing%20Sites/40_713%20-74_006.json"
        );
    }

    #[test]
    fn root_url() {
        let c = client("https://example.firebaseio.com/");
        assert_eq!(
            c.url_for(&[]).unwrap().as_str(),
            "https://example.firebaseio.com/.json"
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let c = client("http://localhost:9000/ns/");
        assert_eq!(
            c.url_for(&["Vaccination Sites"]).unwrap().as_str(),
            "http://localhost:9000/ns/Vaccination%20Sites.json"
        );
    }

    #[test]
    fn auth_token_goes_in_query() {
        let c = client("https://example.firebaseio.com")
            .with_auth(SecretString::from("s3cret".to_string()));
        let url = c.url_for(&["Testing Sites"]).unwrap();
        assert_eq!(url.query(), Some("auth=s3cret"));
    }

    #[test]
    fn non_base_url_rejected() {
        let err = RealtimeClient::from_reqwest("mailto:someone@example.com", reqwest::Client::new());
        assert!(matches!(err, Err(Error::CannotBeABase(_))));
    }
}
