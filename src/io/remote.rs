use std::time::Duration;

use chrono::{Local, NaiveDate};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::model::config::Settings;
use crate::model::record::{DeepLinks, ParentRef, RawRecord, decorate};
use crate::ops::add_task::NewTask;

/// Header carrying the API token.
pub const TOKEN_HEADER: &str = "X-API-Token";

/// Error type for remote API calls
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("no API token configured (set api.token or MVM_API_TOKEN)")]
    MissingToken,
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("local server failed ({local}); remote API failed ({remote})")]
    BothFailed {
        local: Box<RemoteError>,
        remote: Box<RemoteError>,
    },
}

/// Read and write calls against the task service.
///
/// Every record returned is already decorated with a `deepLink` and a
/// normalized `type`.
pub trait TaskService: Sync {
    fn categories(&self) -> Result<Vec<RawRecord>, RemoteError>;
    fn children(&self, parent: &ParentRef) -> Result<Vec<RawRecord>, RemoteError>;
    /// Items scheduled for `date`
    fn scheduled_items(&self, date: NaiveDate) -> Result<Vec<RawRecord>, RemoteError>;
    /// Items due on or before `date`
    fn due_items(&self, date: NaiveDate) -> Result<Vec<RawRecord>, RemoteError>;
    fn add_task(&self, task: &NewTask) -> Result<RawRecord, RemoteError>;
    fn mark_done(&self, item_id: &str) -> Result<Value, RemoteError>;
}

struct ApiRequest {
    path: &'static str,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    fn get(path: &'static str) -> Self {
        ApiRequest {
            path,
            query: Vec::new(),
            body: None,
        }
    }

    fn post(path: &'static str, body: Value) -> Self {
        ApiRequest {
            path,
            query: Vec::new(),
            body: Some(body),
        }
    }

    fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

/// HTTP client for the Marvin API, with an optional local server tried first.
#[derive(Clone)]
pub struct RemoteClient {
    http: Client,
    token: String,
    remote_base: String,
    local_base: Option<String>,
    links: DeepLinks,
}

impl RemoteClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, RemoteError> {
        let token = settings.api_token();
        if token.is_empty() {
            return Err(RemoteError::MissingToken);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.api.timeout_secs.max(1)))
            .build()
            .map_err(RemoteError::Client)?;
        let local_base = settings.local_server.enabled.then(|| {
            format!(
                "http://{}:{}/api",
                settings.local_server.host, settings.local_server.port
            )
        });
        Ok(RemoteClient {
            http,
            token,
            remote_base: settings.api.base_url.trim_end_matches('/').to_string(),
            local_base,
            links: DeepLinks::new(&settings.api.app_url),
        })
    }

    pub fn links(&self) -> &DeepLinks {
        &self.links
    }

    /// Local server first when enabled; on any failure, the remote API.
    fn send(&self, request: &ApiRequest) -> Result<String, RemoteError> {
        let Some(local) = &self.local_base else {
            return self.send_to(&self.remote_base, request);
        };
        match self.send_to(local, request) {
            Ok(body) => Ok(body),
            Err(local_err) => {
                debug!(error = %local_err, "local server failed, falling back to remote API");
                self.send_to(&self.remote_base, request)
                    .map_err(|remote_err| RemoteError::BothFailed {
                        local: Box::new(local_err),
                        remote: Box::new(remote_err),
                    })
            }
        }
    }

    fn send_to(&self, base: &str, request: &ApiRequest) -> Result<String, RemoteError> {
        let url = format!("{}/{}", base.trim_end_matches('/'), request.path);
        let builder = match &request.body {
            Some(body) => self.http.post(&url).json(body),
            None => self.http.get(&url).query(&request.query),
        };
        let response = builder
            .header(TOKEN_HEADER, &self.token)
            .send()
            .map_err(|source| RemoteError::Transport {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        let body = response.text().map_err(|source| RemoteError::Transport {
            url: url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }
        debug!(%url, status = status.as_u16(), "api call ok");
        Ok(body)
    }

    fn fetch(&self, request: ApiRequest) -> Result<Vec<RawRecord>, RemoteError> {
        let body = self.send(&request)?;
        let records: Vec<RawRecord> =
            serde_json::from_str(&body).map_err(|source| RemoteError::Decode {
                url: request.path.to_string(),
                source,
            })?;
        Ok(records
            .into_iter()
            .map(|record| decorate(record, &self.links))
            .collect())
    }
}

impl TaskService for RemoteClient {
    fn categories(&self) -> Result<Vec<RawRecord>, RemoteError> {
        self.fetch(ApiRequest::get("categories"))
    }

    fn children(&self, parent: &ParentRef) -> Result<Vec<RawRecord>, RemoteError> {
        self.fetch(ApiRequest::get("children").query("parentId", parent.as_query()))
    }

    fn scheduled_items(&self, date: NaiveDate) -> Result<Vec<RawRecord>, RemoteError> {
        self.fetch(ApiRequest::get("todayItems").query("date", date_param(date)))
    }

    fn due_items(&self, date: NaiveDate) -> Result<Vec<RawRecord>, RemoteError> {
        self.fetch(ApiRequest::get("dueItems").query("date", date_param(date)))
    }

    fn add_task(&self, task: &NewTask) -> Result<RawRecord, RemoteError> {
        let mut body = json!({
            "title": task.title,
            "timeZoneOffset": time_zone_offset(),
        });
        if let Some(parent) = &task.parent_id {
            body["parentId"] = Value::String(parent.clone());
        }
        if let Some(note) = &task.note {
            body["note"] = Value::String(note.clone());
        }
        let request = ApiRequest::post("addTask", body);
        let text = self.send(&request)?;
        let record: RawRecord =
            serde_json::from_str(&text).map_err(|source| RemoteError::Decode {
                url: request.path.to_string(),
                source,
            })?;
        Ok(decorate(record, &self.links))
    }

    fn mark_done(&self, item_id: &str) -> Result<Value, RemoteError> {
        let request = ApiRequest::post(
            "markDone",
            json!({ "itemId": item_id, "timeZoneOffset": time_zone_offset() }),
        );
        let text = self.send(&request)?;
        // Acknowledgements are not always JSON.
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| {
            warn!(item_id, "markDone acknowledged with non-JSON body");
            Value::String(text)
        }))
    }
}

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Minutes east of UTC for the local zone.
pub fn time_zone_offset() -> i32 {
    Local::now().offset().local_minus_utc() / 60
}
