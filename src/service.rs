use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    error::SyncError,
    helpers::{
        arctic::{self, ArcticClient},
        email::{self, Notifier},
        enrich::CustomerRecord,
        schedule::{self, Row},
        sheets::{publish_rows, SheetTarget, SheetsClient},
    },
};

pub const DEFAULT_ARCTIC_API_URL: &str = "https://mild2wild.arcticres.com/api/rest";
pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_CREDENTIALS_FILE: &str = "g_creds.json";

/// Failure e-mail settings. All three values must be present to enable it.
#[derive(Clone, Debug, PartialEq)]
pub struct NotifyConfig {
    pub api_key: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Configuration for the sync service
#[derive(Clone, Debug, PartialEq)]
pub struct SyncConfig {
    pub arctic_api_url: String,
    pub arctic_username: String,
    pub arctic_password: String,
    pub business_group_id: String,
    pub component: String,
    pub credentials_file: PathBuf,
    pub spreadsheet_id: String,
    pub sheets_api_url: String,
    pub notify: Option<NotifyConfig>,
    pub webhook_token: Option<String>,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &str| {
            optional(key).ok_or_else(|| SyncError::Config(format!("{key} is not set")))
        };
        let or_default = |key: &str, default: &str| optional(key).unwrap_or_else(|| default.to_string());

        let notify = match (
            optional("RESEND_API_KEY"),
            optional("NOTIFY_FROM"),
            optional("NOTIFY_TO"),
        ) {
            (Some(api_key), Some(from), Some(to)) => Some(NotifyConfig {
                api_key,
                from,
                to: to
                    .split(',')
                    .map(str::trim)
                    .filter(|addr| !addr.is_empty())
                    .map(String::from)
                    .collect(),
            }),
            (None, None, None) => None,
            _ => {
                warn!("RESEND_API_KEY, NOTIFY_FROM and NOTIFY_TO must all be set, failure e-mails disabled");
                None
            }
        };

        Ok(SyncConfig {
            arctic_api_url: or_default("ARCTIC_API_URL", DEFAULT_ARCTIC_API_URL),
            arctic_username: required("ARCTIC_USERNAME")?,
            arctic_password: required("ARCTIC_PASSWORD")?,
            business_group_id: or_default(
                "ARCTIC_BUSINESS_GROUP_ID",
                arctic::utils::DEFAULT_BUSINESS_GROUP_ID,
            ),
            component: or_default("ARCTIC_COMPONENT", arctic::utils::DEFAULT_COMPONENT),
            credentials_file: PathBuf::from(or_default(
                "GOOGLE_CREDENTIALS_FILE",
                DEFAULT_CREDENTIALS_FILE,
            )),
            spreadsheet_id: required("SPREADSHEET_ID")?,
            sheets_api_url: or_default("SHEETS_API_URL", DEFAULT_SHEETS_API_URL),
            notify,
            webhook_token: optional("SYNC_WEBHOOK_TOKEN"),
        })
    }
}

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub reservations: usize,
    pub rows_written: usize,
    pub spreadsheet_url: Option<String>,
}

/// Lists the reservations, enriches each activity one at a time, and returns
/// the number listed with the rows sorted by trip time. Any fetch failure
/// aborts the whole run.
pub async fn collect_rows(arctic: &ArcticClient) -> Result<(usize, Vec<Row>), SyncError> {
    let activity_ids = arctic.fetch_activity_ids().await?;

    let mut records = Vec::with_capacity(activity_ids.len());
    for activity_id in &activity_ids {
        let activity = arctic.fetch_activity(activity_id).await?;
        records.push(CustomerRecord::from(activity));
    }
    info!("Enriched {} activities", records.len());

    let rows = schedule::sort_by_trip_time(records)?;
    Ok((activity_ids.len(), rows))
}

/// Full pipeline against any sheet. Rows are built and sorted before the
/// sheet is touched, so fetch and time errors never leave it cleared.
pub async fn sync_reservations<S: SheetTarget>(
    arctic: &ArcticClient,
    sheet: &mut S,
) -> Result<SyncReport, SyncError> {
    let (reservations, rows) = collect_rows(arctic).await?;
    let rows_written = publish_rows(sheet, &rows).await?;

    Ok(SyncReport {
        reservations,
        rows_written,
        spreadsheet_url: None,
    })
}

/// The sync service: reservation client, spreadsheet client, optional
/// failure notifier. Runs through one service never overlap.
pub struct SyncService {
    pub arctic: ArcticClient,
    pub sheets: SheetsClient,
    pub notifier: Option<Notifier>,
    pub config: SyncConfig,
    run_lock: Mutex<()>,
}

impl SyncService {
    pub fn new(
        arctic: ArcticClient,
        sheets: SheetsClient,
        notifier: Option<Notifier>,
        config: SyncConfig,
    ) -> Self {
        info!("Creating new SyncService instance");
        Self {
            arctic,
            sheets,
            notifier,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: SyncConfig) -> Result<Self, SyncError> {
        let query = arctic::utils::build_reservation_query(&config.business_group_id, &config.component);
        let arctic = arctic::arctic_client_init(
            &config.arctic_api_url,
            config.arctic_username.clone(),
            config.arctic_password.clone(),
            query,
        )?;
        let sheets = SheetsClient::from_credentials_file(&config.credentials_file, &config.sheets_api_url)?;
        let notifier = config
            .notify
            .as_ref()
            .map(|n| Notifier::new(&n.api_key, n.from.clone(), n.to.clone()));

        Ok(Self::new(arctic, sheets, notifier, config))
    }

    /// Create an Axum router for the sync service
    pub fn router(self) -> Router {
        info!("Creating sync service router");
        let shared_state = Arc::new(self);

        Router::new()
            .route("/sync-webhook", post(sync_webhook))
            .route("/sync-test", get(sync_test))
            .route("/sheet-info", get(sheet_info))
            .with_state(shared_state)
    }

    /// Fetch reservations, rebuild the sheet, report failures by e-mail
    pub async fn process_sync(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.run_lock.lock().await;
        info!("Syncing reservations into spreadsheet {}", self.config.spreadsheet_id);

        match self.run_once().await {
            Ok(report) => {
                info!(
                    "Sync finished: {} reservations, {} rows written",
                    report.reservations, report.rows_written
                );
                Ok(report)
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                if let Some(notifier) = &self.notifier {
                    let _ = email::send_error_info(notifier, &e.to_string()).await;
                }
                Err(e)
            }
        }
    }

    async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let mut sheet = self.sheets.open(&self.config.spreadsheet_id).await?;
        let report = sync_reservations(&self.arctic, &mut sheet).await?;

        Ok(SyncReport {
            spreadsheet_url: sheet.url().map(String::from),
            ..report
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct WebhookTrigger {
    pub token: String,
}

// Route handlers
async fn sync_webhook(
    State(service): State<Arc<SyncService>>,
    Json(payload): Json<WebhookTrigger>,
) -> (StatusCode, String) {
    info!("Received sync webhook");

    match &service.config.webhook_token {
        None => {
            warn!("Webhook called but SYNC_WEBHOOK_TOKEN is not configured");
            return (StatusCode::NOT_FOUND, "webhook disabled".to_string());
        }
        Some(expected) if *expected != payload.token => {
            info!("Webhook token mismatch, ignoring trigger");
            return (StatusCode::UNAUTHORIZED, "invalid webhook token".to_string());
        }
        Some(_) => {}
    }

    run_and_report(&service).await
}

async fn sync_test(State(service): State<Arc<SyncService>>) -> (StatusCode, String) {
    info!("Processing manual sync request");
    run_and_report(&service).await
}

async fn run_and_report(service: &SyncService) -> (StatusCode, String) {
    match service.process_sync().await {
        Ok(report) => (
            StatusCode::OK,
            format!(
                "Sync completed: {} rows written to {}",
                report.rows_written,
                report
                    .spreadsheet_url
                    .as_deref()
                    .unwrap_or(&service.config.spreadsheet_id)
            ),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error processing sync: {}", e),
        ),
    }
}

async fn sheet_info(State(service): State<Arc<SyncService>>) -> (StatusCode, String) {
    info!("Retrieving sheet info for: {}", service.config.spreadsheet_id);

    let result = async {
        let mut sheet = service.sheets.open(&service.config.spreadsheet_id).await?;
        let header = sheet.header_row().await?;
        Ok::<_, SyncError>(format!(
            "{} (sheet '{}'), header: {:?}",
            sheet.url().unwrap_or(&service.config.spreadsheet_id),
            sheet.sheet_title(),
            header
        ))
    }
    .await;

    match result {
        Ok(info) => (StatusCode::OK, info),
        Err(e) => {
            error!("Failed to retrieve sheet info: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                format!("Error retrieving sheet info: {}", e),
            )
        }
    }
}
