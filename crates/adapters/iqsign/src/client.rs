//! REST client for the iQsign sign service.
//!
//! Every reply carries a `status` field; anything but `OK` is a rejection.
//! The service keys its server-side state on a session id that is passed
//! back in the query string or the JSON body of each call.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::IqsignError;

/// Reply to `POST rest/authorize`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Authorization {
    pub session: String,
    #[serde(default)]
    pub userid: Option<Value>,
}

/// One sign owned by the user, as listed by `rest/signs`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sign {
    pub signid: u64,
    pub name: String,
    #[serde(default)]
    pub displayname: Option<String>,
}

impl Sign {
    /// What the sign currently shows.
    #[must_use]
    pub fn current(&self) -> &str {
        self.displayname.as_deref().unwrap_or(&self.name)
    }
}

/// A saved sign definition from `rest/namedsigns`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavedSign {
    pub name: String,
}

#[derive(Deserialize)]
struct DataReply<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Serialize)]
struct SetTo<'a> {
    session: &'a str,
    signid: u64,
    value: &'a str,
    other: &'a str,
}

#[derive(Debug, Clone)]
pub struct IqsignClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl IqsignClient {
    /// # Errors
    ///
    /// Returns [`IqsignError::InvalidUrl`] when `base_url` does not parse.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        token: impl Into<String>,
    ) -> Result<Self, IqsignError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        resp: reqwest::Response,
    ) -> Result<T, IqsignError> {
        let http_status = resp.status();
        let body: Value = resp.json().await?;
        let status = body.get("status").and_then(Value::as_str);
        if !http_status.is_success() || status != Some("OK") {
            let message = body
                .get("message")
                .or_else(|| body.get("reason"))
                .and_then(Value::as_str)
                .map_or_else(|| format!("HTTP {}", http_status.as_u16()), str::to_string);
            return Err(IqsignError::Rejected {
                path: path.to_string(),
                message,
            });
        }
        serde_json::from_value(body).map_err(|err| IqsignError::Rejected {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, session: &str) -> Result<T, IqsignError> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut().append_pair("session", session);
        tracing::debug!(path, "GET");
        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;
        Self::decode(path, resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, IqsignError> {
        let url = self.base_url.join(path)?;
        tracing::debug!(path, "POST");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(path, resp).await
    }

    /// Exchange the login code for a service session.
    ///
    /// # Errors
    ///
    /// Returns an [`IqsignError`] on transport failure or rejection.
    pub async fn authorize(&self) -> Result<Authorization, IqsignError> {
        self.post("rest/authorize", &serde_json::json!({})).await
    }

    /// # Errors
    ///
    /// Returns an [`IqsignError`] on transport failure or rejection.
    pub async fn signs(&self, session: &str) -> Result<Vec<Sign>, IqsignError> {
        let reply: DataReply<Sign> = self.get("rest/signs", session).await?;
        Ok(reply.data)
    }

    /// # Errors
    ///
    /// Returns an [`IqsignError`] on transport failure or rejection.
    pub async fn saved_signs(&self, session: &str) -> Result<Vec<SavedSign>, IqsignError> {
        let reply: DataReply<SavedSign> = self.get("rest/namedsigns", session).await?;
        Ok(reply.data)
    }

    /// Display the saved sign `value` on `signid`, with optional extra text.
    ///
    /// # Errors
    ///
    /// Returns an [`IqsignError`] on transport failure or rejection.
    pub async fn set_sign(
        &self,
        session: &str,
        signid: u64,
        value: &str,
        other: &str,
    ) -> Result<Value, IqsignError> {
        self.post(
            "rest/sign/setto",
            &SetTo {
                session,
                signid,
                value,
                other,
            },
        )
        .await
    }
}
