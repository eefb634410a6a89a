use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, Url};
use serde_json::{json, Value};
use std::future::Future;
use std::path::Path;
use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::helpers::schedule::{Row, HEADER};
use crate::models::sheets::{
    JwtClaims, ServiceAccountKey, SpreadsheetMeta, TokenResponse, ValueRange,
};

const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Row bound used when the sheet metadata carries no grid size.
const MAX_GRID_ROWS: u64 = 10_000_000;

/// Which cells a clear removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Everything,
    /// Every row after the first.
    BelowHeader,
}

/// The destination sheet as the publisher sees it.
pub trait SheetTarget {
    fn header_row(&mut self) -> impl Future<Output = Result<Vec<String>, SyncError>> + Send;

    fn clear(&mut self, scope: ClearScope) -> impl Future<Output = Result<(), SyncError>> + Send;

    fn append_row(&mut self, cells: &[&str])
        -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Replaces the sheet content with the header followed by `rows`, one append
/// per row. A correct existing header is kept and only the rows under it are
/// cleared. There is no rollback: a failure part way leaves the rows written
/// so far.
pub async fn publish_rows<S: SheetTarget>(sheet: &mut S, rows: &[Row]) -> Result<usize, SyncError> {
    let existing_header = sheet.header_row().await?;

    if existing_header == HEADER {
        sheet.clear(ClearScope::BelowHeader).await?;
        info!("Header already in place, cleared existing data rows");
    } else {
        sheet.clear(ClearScope::Everything).await?;
        info!("Cleared existing data.");
        sheet.append_row(&HEADER).await?;
        info!("Header row written");
    }

    for (i, row) in rows.iter().enumerate() {
        if let Err(e) = sheet.append_row(&row.cells()).await {
            error!(
                "Append failed after {} of {} rows, sheet is partially rebuilt",
                i,
                rows.len()
            );
            return Err(e);
        }
    }

    info!("Data uploaded successfully, {} rows written", rows.len());
    Ok(rows.len())
}

enum Credentials {
    ServiceAccount(ServiceAccountKey),
    Static(String),
}

/// Spreadsheet service client. Each call to [`SheetsClient::open`] fetches a
/// fresh access token.
pub struct SheetsClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl SheetsClient {
    pub fn from_credentials_file<P: AsRef<Path>>(
        path: P,
        base_url: &str,
    ) -> Result<Self, SyncError> {
        let path = path.as_ref();
        info!("Loading service account credentials from {}", path.display());

        let raw = std::fs::read_to_string(path).map_err(|e| {
            error!("Failed to read credentials file {}: {}", path.display(), e);
            SyncError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let key = serde_json::from_str::<ServiceAccountKey>(&raw).map_err(|e| {
            error!("Failed to parse credentials file: {}", e);
            SyncError::Config(format!("invalid service account key: {e}"))
        })?;

        Ok(Self::from_service_account(key, base_url))
    }

    pub fn from_service_account(key: ServiceAccountKey, base_url: &str) -> Self {
        Self::with_credentials(Credentials::ServiceAccount(key), base_url)
    }

    /// Uses a pre-issued bearer token instead of the service-account grant.
    pub fn with_access_token(token: impl Into<String>, base_url: &str) -> Self {
        Self::with_credentials(Credentials::Static(token.into()), base_url)
    }

    fn with_credentials(credentials: Credentials, base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn access_token(&self) -> Result<String, SyncError> {
        let key = match &self.credentials {
            Credentials::Static(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => key,
        };

        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &key.client_email,
            scope: SCOPES,
            aud: &key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            error!("Service account private key is not a valid RSA key: {}", e);
            SyncError::Config(format!("invalid service account private key: {e}"))
        })?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| SyncError::Publish(format!("failed to sign token request: {e}")))?;

        info!("Requesting access token for {}", key.client_email);
        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await;

        let text = read_success(response, "token").await?;
        let token = parse_body::<TokenResponse>(&text, "token response")?;
        Ok(token.access_token)
    }

    /// Opens the spreadsheet by id and targets its first sheet.
    pub async fn open(&self, spreadsheet_id: &str) -> Result<Spreadsheet, SyncError> {
        let token = self.access_token().await?;
        let spreadsheet = Spreadsheet {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token,
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_title: String::new(),
            row_count: None,
            url: None,
        };

        let meta_url = spreadsheet.url_for(
            &[],
            &[("fields", "spreadsheetId,spreadsheetUrl,sheets.properties")],
        )?;
        let response = spreadsheet
            .http
            .get(meta_url)
            .bearer_auth(&spreadsheet.token)
            .send()
            .await;
        let text = read_success(response, "open spreadsheet").await?;
        let meta = parse_body::<SpreadsheetMeta>(&text, "spreadsheet metadata")?;

        let first = meta
            .sheets
            .into_iter()
            .min_by_key(|sheet| sheet.properties.index)
            .ok_or_else(|| SyncError::Publish(format!("spreadsheet {spreadsheet_id} has no sheets")))?;

        let url = meta.spreadsheet_url;
        match &url {
            Some(url) => info!("Opened existing spreadsheet: {}", url),
            None => info!("Opened existing spreadsheet: {}", meta.spreadsheet_id),
        }

        Ok(Spreadsheet {
            sheet_title: first.properties.title,
            row_count: first.properties.grid_properties.and_then(|grid| grid.row_count),
            url,
            ..spreadsheet
        })
    }
}

/// First sheet of an opened spreadsheet.
pub struct Spreadsheet {
    http: Client,
    base_url: String,
    token: String,
    spreadsheet_id: String,
    sheet_title: String,
    row_count: Option<u64>,
    url: Option<String>,
}

impl Spreadsheet {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn sheet_title(&self) -> &str {
        &self.sheet_title
    }

    /// A1 range over the whole sheet, with an optional row span suffix.
    fn range(&self, rows: Option<&str>) -> String {
        let quoted = format!("'{}'", self.sheet_title.replace('\'', "''"));
        match rows {
            Some(rows) => format!("{quoted}!{rows}"),
            None => quoted,
        }
    }

    /// Rows 2 through the last row of the grid.
    fn rows_below_header(&self) -> String {
        let last = self.row_count.unwrap_or(MAX_GRID_ROWS).max(2);
        self.range(Some(&format!("2:{last}")))
    }

    fn url_for(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SyncError::Config(format!("invalid sheets API url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Config("sheets API url cannot be a base".to_string()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn post_values(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<String, SyncError> {
        let url = self.url_for(&["values", endpoint], query)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await;
        read_success(response, endpoint).await
    }
}

impl SheetTarget for Spreadsheet {
    async fn header_row(&mut self) -> Result<Vec<String>, SyncError> {
        let url = self.url_for(&["values", &self.range(Some("1:1"))], &[])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await;
        let text = read_success(response, "read header").await?;
        let values = parse_body::<ValueRange>(&text, "header row")?;

        Ok(values
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|cell| match cell {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }

    async fn clear(&mut self, scope: ClearScope) -> Result<(), SyncError> {
        let range = match scope {
            ClearScope::Everything => self.range(None),
            ClearScope::BelowHeader => self.rows_below_header(),
        };
        self.post_values(&format!("{range}:clear"), &[], &json!({}))
            .await
            .map(|_| ())
    }

    async fn append_row(&mut self, cells: &[&str]) -> Result<(), SyncError> {
        let range = self.range(None);
        self.post_values(
            &format!("{range}:append"),
            &[("valueInputOption", "RAW")],
            &json!({ "values": [cells] }),
        )
        .await
        .map(|_| ())
    }
}

async fn read_success(
    response: reqwest::Result<Response>,
    operation: &str,
) -> Result<String, SyncError> {
    let resp = match response {
        Ok(resp) => resp,
        Err(e) => {
            error!("Failed to send {} request to spreadsheet service: {}", operation, e);
            return Err(SyncError::Publish(format!("{operation}: {e}")));
        }
    };

    let status = resp.status();
    let text = resp.text().await.map_err(|e| {
        error!("Failed to read {} response body: {}", operation, e);
        SyncError::Publish(format!("{operation}: {e}"))
    })?;

    if !status.is_success() {
        error!(
            "Spreadsheet service returned error status {} for {}: {}",
            status, operation, text
        );
        return Err(SyncError::Publish(format!(
            "{operation} returned status {status}: {text}"
        )));
    }

    Ok(text)
}

fn parse_body<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T, SyncError> {
    serde_json::from_str::<T>(text).map_err(|e| {
        warn!("Raw {} response: {}", what, text);
        error!("Failed to parse {}: {}", what, e);
        SyncError::Publish(format!("malformed {what}: {e}"))
    })
}
