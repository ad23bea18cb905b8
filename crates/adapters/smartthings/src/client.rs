//! Bearer-token REST client for the SmartThings API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::SmartThingsError;

/// A device as listed by `GET devices`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StDevice {
    pub device_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub components: Vec<StComponent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StComponent {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityRef>,
}

/// `(id, version)` pair naming one capability definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct CapabilityRef {
    pub id: String,
    #[serde(default = "first_version")]
    pub version: u32,
}

fn first_version() -> u32 {
    1
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "_links", default)]
    links: Option<PageLinks>,
}

#[derive(Deserialize)]
struct PageLinks {
    next: Option<Link>,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

impl<T> Page<T> {
    fn next(&self) -> Option<&str> {
        self.links.as_ref()?.next.as_ref().map(|link| link.href.as_str())
    }
}

/// One command in a `POST devices/{id}/commands` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StCommand {
    pub component: String,
    pub capability: String,
    pub command: String,
    pub arguments: Vec<Value>,
}

#[derive(Serialize)]
struct CommandBatch<'a> {
    commands: &'a [StCommand],
}

/// Client bound to one user's personal access token.
#[derive(Debug, Clone)]
pub struct SmartThingsClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl SmartThingsClient {
    /// Build a client for `api_url` (a trailing `/` is added when missing).
    ///
    /// # Errors
    ///
    /// Returns [`SmartThingsError::InvalidUrl`] when `api_url` does not parse.
    pub fn new(
        http: reqwest::Client,
        api_url: &str,
        token: impl Into<String>,
    ) -> Result<Self, SmartThingsError> {
        let mut base_url = Url::parse(api_url)?;
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

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SmartThingsError> {
        let url = self.base_url.join(path)?;
        tracing::debug!(%url, "GET");
        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;
        Self::decode(path, resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, SmartThingsError> {
        let url = self.base_url.join(path)?;
        tracing::debug!(%url, "POST");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(path, resp).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        resp: reqwest::Response,
    ) -> Result<T, SmartThingsError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(SmartThingsError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(resp.json().await?)
    }

    /// `GET devices`, following `_links.next` until the last page.
    ///
    /// # Errors
    ///
    /// Returns a [`SmartThingsError`] on transport or HTTP failure.
    pub async fn list_devices(&self) -> Result<Vec<StDevice>, SmartThingsError> {
        let mut devices = Vec::new();
        let mut next = Some("devices".to_string());
        while let Some(href) = next.take() {
            let page: Page<StDevice> = self.get(&href).await?;
            next = page.next().filter(|n| *n != href).map(str::to_string);
            devices.extend(page.items);
        }
        Ok(devices)
    }

    /// `GET devices/{id}/status`: `{components: {comp: {cap: {attr: state}}}}`.
    ///
    /// # Errors
    ///
    /// Returns a [`SmartThingsError`] on transport or HTTP failure.
    pub async fn device_status(&self, device_id: &str) -> Result<Value, SmartThingsError> {
        self.get(&format!("devices/{device_id}/status")).await
    }

    /// `GET devices/{id}/presentation`
    ///
    /// # Errors
    ///
    /// Returns a [`SmartThingsError`] on transport or HTTP failure.
    pub async fn device_presentation(&self, device_id: &str) -> Result<Value, SmartThingsError> {
        self.get(&format!("devices/{device_id}/presentation")).await
    }

    /// `GET capabilities/{id}/{version}`
    ///
    /// # Errors
    ///
    /// Returns a [`SmartThingsError`] on transport or HTTP failure.
    pub async fn capability(&self, cap: &CapabilityRef) -> Result<Value, SmartThingsError> {
        self.get(&format!("capabilities/{}/{}", cap.id, cap.version))
            .await
    }

    /// `POST devices/{id}/commands`
    ///
    /// # Errors
    ///
    /// Returns a [`SmartThingsError`] on transport or HTTP failure.
    pub async fn execute(
        &self,
        device_id: &str,
        commands: &[StCommand],
    ) -> Result<Value, SmartThingsError> {
        self.post(
            &format!("devices/{device_id}/commands"),
            &CommandBatch { commands },
        )
        .await
    }
}
