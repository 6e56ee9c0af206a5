use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use runway_core::ApiConfig;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::service::{Build, BuildService, CreateBuildRequest, CreatedBuild, LogEntry, Upload};

const API_KEY_HEADER: &str = "X-API-Key";
const CONTENT_LENGTH_RANGE_HEADER: &str = "X-Goog-Content-Length-Range";

/// [`BuildService`] over the runway HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBuildService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpBuildService {
    pub fn new(config: &ApiConfig) -> Self {
        Self::with_client(
            reqwest::Client::new(),
            &config.endpoint,
            config.api_key.clone(),
        )
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &'static str,
        url: String,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        tracing::debug!(method, %url, "api request");
        let response = builder.send().await.map_err(|e| ApiError::Transport {
            method,
            url: url.clone(),
            source: e,
        })?;
        let response = check_status(method, url.clone(), response).await?;
        response.json().await.map_err(|e| ApiError::Decode {
            method,
            url,
            source: e,
        })
    }
}

async fn check_status(
    method: &'static str,
    url: String,
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound { method, url });
    }
    if status.is_client_error() || status.is_server_error() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("<unreadable body: {e}>"),
        };
        return Err(ApiError::Status {
            method,
            url,
            status: status.as_u16(),
            body: body.trim().to_owned(),
        });
    }
    Ok(response)
}

// ── Wire types ──

#[derive(Debug, Deserialize)]
struct CreateUploadResponse {
    upload: UploadRef,
    #[serde(rename = "writeOnlyURL")]
    write_only_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateBuildResponse {
    build: BuildRef,
    #[serde(default, rename = "imageURL")]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BuildRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetBuildResponse {
    build: Build,
}

#[derive(Debug, Deserialize)]
struct GetLogsResponse {
    #[serde(default)]
    logs: Vec<LogEntry>,
}

impl BuildService for HttpBuildService {
    async fn create_upload(&self, size_bytes: u64) -> Result<Upload, ApiError> {
        let url = self.url("/v0/builds/createUpload");
        let builder = self
            .request(Method::POST, &url)
            .json(&serde_json::json!({ "sizeBytes": size_bytes }));
        let res: CreateUploadResponse = self.send("POST", url, builder).await?;
        Ok(Upload {
            id: res.upload.id,
            write_url: res.write_only_url,
        })
    }

    async fn put_archive(&self, write_url: &str, archive: &Path) -> Result<(), ApiError> {
        let open_err = |e| ApiError::Archive {
            path: archive.to_path_buf(),
            source: e,
        };
        let file = tokio::fs::File::open(archive).await.map_err(open_err)?;
        let size = file.metadata().await.map_err(open_err)?.len();

        tracing::debug!(size, "uploading archive");
        // The write URL is pre-signed, so no API key is sent along.
        let response = self
            .client
            .put(write_url)
            .header(CONTENT_LENGTH_RANGE_HEADER, format!("0,{size}"))
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                method: "PUT",
                url: redact_query(write_url),
                source: e,
            })?;
        check_status("PUT", redact_query(write_url), response).await?;
        Ok(())
    }

    async fn create_build(&self, request: &CreateBuildRequest) -> Result<CreatedBuild, ApiError> {
        let url = self.url("/v0/builds/create");
        let builder = self.request(Method::POST, &url).json(request);
        let res: CreateBuildResponse = self.send("POST", url, builder).await?;
        Ok(CreatedBuild {
            id: res.build.id,
            image: res.image_url,
        })
    }

    async fn get_build(&self, id: &str) -> Result<Build, ApiError> {
        let url = self.url("/v0/builds/get");
        let builder = self.request(Method::GET, &url).query(&[("id", id)]);
        let res: GetBuildResponse = self.send("GET", url, builder).await?;
        Ok(res.build)
    }

    async fn get_build_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogEntry>, ApiError> {
        let url = self.url("/v0/builds/getLogs");
        let mut query = vec![("buildID", id.to_owned())];
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Nanos, true)));
        }
        let builder = self.request(Method::GET, &url).query(&query);
        let res: GetLogsResponse = self.send("GET", url, builder).await?;
        Ok(res.logs)
    }
}

/// Pre-signed URLs carry credentials in the query string.
fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_owned(),
    }
}
