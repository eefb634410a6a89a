use serde::{Deserialize, Serialize};

/// The downloaded service-account JSON key. Only the fields needed for the
/// JWT bearer grant are kept.
#[derive(Deserialize, Debug, Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Serialize, Debug)]
pub struct JwtClaims<'a> {
    pub iss: &'a str,
    pub scope: &'a str,
    pub aud: &'a str,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
}

// Sheets v4 payloads

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetMeta {
    pub spreadsheet_id: String,
    pub spreadsheet_url: Option<String>,
    #[serde(default)]
    pub sheets: Vec<SheetMeta>,
}

#[derive(Deserialize, Debug)]
pub struct SheetMeta {
    pub properties: SheetProperties,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: i64,
    pub grid_properties: Option<GridProperties>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    pub row_count: Option<u64>,
    pub column_count: Option<u64>,
}
