use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::credentials::{ServiceAccountKey, TokenProvider, SPREADSHEETS_SCOPE};
use crate::row::TranscriptRow;
use crate::sink::{RowSink, SinkError};

/// How the spreadsheet interprets appended values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueInputOption {
    /// Values are stored as-is.
    #[default]
    Raw,
    /// Values are parsed as if typed into the UI.
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseValueInputOptionError(String);

impl std::fmt::Display for ParseValueInputOptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not a valid value input option", self.0)
    }
}

impl FromStr for ValueInputOption {
    type Err = ParseValueInputOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RAW" => Ok(ValueInputOption::Raw),
            "USER_ENTERED" => Ok(ValueInputOption::UserEntered),
            _ => Err(ParseValueInputOptionError(s.to_owned())),
        }
    }
}

pub struct SheetsConfig {
    pub api_url: String,
    pub spreadsheet_id: String,
    /// The tab, or A1 range, rows are appended after.
    pub range: String,
    pub value_input_option: ValueInputOption,
    pub request_timeout: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: Option<UpdateSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummary {
    updated_range: Option<String>,
}

/// A `RowSink` appending each row to a fixed spreadsheet range.
pub struct SheetsSink {
    client: reqwest::Client,
    tokens: TokenProvider,
    append_url: Url,
    value_input_option: ValueInputOption,
}

impl SheetsSink {
    pub fn new(config: SheetsConfig, key: ServiceAccountKey) -> Result<Self, SinkError> {
        let append_url = append_url(&config.api_url, &config.spreadsheet_id, &config.range)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent("transcript-hook")
            .timeout(config.request_timeout)
            .build()?;

        let tokens = TokenProvider::new(key, SPREADSHEETS_SCOPE, client.clone())?;

        Ok(Self {
            client,
            tokens,
            append_url,
            value_input_option: config.value_input_option,
        })
    }

    pub fn append_url(&self) -> &Url {
        &self.append_url
    }
}

fn append_url(api_url: &str, spreadsheet_id: &str, range: &str) -> Result<Url, SinkError> {
    let append_segment = format!("{}:append", range);
    let mut url = Url::parse(api_url)
        .map_err(|e| SinkError::Configuration(format!("invalid api url {}: {}", api_url, e)))?;

    url.path_segments_mut()
        .map_err(|_| SinkError::Configuration(format!("{} cannot be a base url", api_url)))?
        .pop_if_empty()
        .extend([
            "v4",
            "spreadsheets",
            spreadsheet_id,
            "values",
            append_segment.as_str(),
        ]);

    Ok(url)
}

#[async_trait]
impl RowSink for SheetsSink {
    async fn append(&self, row: TranscriptRow) -> Result<(), SinkError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(self.append_url.clone())
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", self.value_input_option.as_str()),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": [row.to_values()] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let updated_range = response
            .json::<AppendResponse>()
            .await
            .ok()
            .and_then(|r| r.updates)
            .and_then(|u| u.updated_range);
        debug!(?updated_range, "appended transcript row");

        Ok(())
    }
}
