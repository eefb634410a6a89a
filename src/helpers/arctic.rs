use reqwest::{header, Client, Response};
use tracing::{error, info};

use crate::error::SyncError;
use crate::models::arctic::{Activity, ActivityId, ReservationList};

/// Reservation API client with the basic-auth credentials it sends on every
/// request.
#[derive(Clone)]
pub struct ArcticClient {
    pub http: Client,
    pub base_url: String,
    username: String,
    password: String,
    query: String,
}

pub fn arctic_client_init(
    base_url: &str,
    username: String,
    password: String,
    query: String,
) -> Result<ArcticClient, SyncError> {
    info!("Initializing Arctic reservation client for {}", base_url);

    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );

    match Client::builder().default_headers(headers).build() {
        Ok(http) => {
            info!("Arctic client initialized successfully");
            Ok(ArcticClient {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                username,
                password,
                query,
            })
        }
        Err(e) => {
            error!("Failed to build Arctic client: {}", e);
            Err(SyncError::Config(format!("failed to build HTTP client: {e}")))
        }
    }
}

impl ArcticClient {
    async fn get(&self, url: &str, query: Option<&str>) -> Result<String, SyncError> {
        let mut request = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(query) = query {
            request = request.query(&[("query", query)]);
        }

        let response = match request.send().await {
            Ok(resp) => ensure_success(resp).await?,
            Err(e) => {
                error!("Failed to send request to Arctic API: {}", e);
                return Err(SyncError::UpstreamUnavailable(e.to_string()));
            }
        };

        response.text().await.map_err(|e| {
            error!("Failed to read response body: {}", e);
            SyncError::UpstreamUnavailable(e.to_string())
        })
    }

    /// Runs the fixed reservation query and returns the activity keys in the
    /// order the API listed them.
    pub async fn fetch_activity_ids(&self) -> Result<Vec<ActivityId>, SyncError> {
        let url = format!("{}/reservation", self.base_url);
        info!("Fetching reservations from {}", url);

        let text = self.get(&url, Some(&self.query)).await?;

        match serde_json::from_str::<ReservationList>(&text) {
            Ok(list) => {
                info!("Reservation query returned {} entries", list.entries.len());
                Ok(list.entries.into_iter().map(|e| e.activityid).collect())
            }
            Err(e) => {
                error!("Failed to parse reservation list: {}", e);
                error!("Raw response: {}", text);
                Err(SyncError::UpstreamUnavailable(format!(
                    "malformed reservation list: {e}"
                )))
            }
        }
    }

    pub async fn fetch_activity(&self, activity_id: &ActivityId) -> Result<Activity, SyncError> {
        let url = format!("{}/activity/{}", self.base_url, activity_id);
        info!("Fetching activity {}", activity_id);

        let text = self.get(&url, None).await?;

        serde_json::from_str::<Activity>(&text).map_err(|e| {
            error!("Failed to parse activity {}: {}", activity_id, e);
            error!("Raw response: {}", text);
            SyncError::UpstreamUnavailable(format!("malformed activity {activity_id}: {e}"))
        })
    }
}

async fn ensure_success(resp: Response) -> Result<Response, SyncError> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let error_text = resp
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    error!("Arctic API returned error status {}: {}", status, error_text);
    Err(SyncError::UpstreamUnavailable(format!(
        "Arctic API returned status {status}: {error_text}"
    )))
}

pub mod utils {
    use tracing::info;

    pub const DEFAULT_BUSINESS_GROUP_ID: &str = "27";
    pub const DEFAULT_COMPONENT: &str = "Photos";

    /// Open trips starting today or later, not canceled, inside the business
    /// group, with the given deliverable among their components.
    pub fn build_reservation_query(business_group_id: &str, component: &str) -> String {
        let query = format!(
            "activity.status IN ('unfinished', 'finished', 'over') \
             AND trip.canceled = false \
             AND activity.start.datetimerelative APPLY('operator','on','count','0','units','day','direction','future') \
             AND activity.businessgroupid.businessgroupcondition APPLY('operator','is-or-within','value','{business_group_id}') \
             AND allcomponents LIKE '%{component}%'"
        );

        info!("Reservation query built with length: {} chars", query.len());
        query
    }

}
