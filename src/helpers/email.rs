use resend_rs::{
    types::{CreateEmailBaseOptions, CreateEmailResponse},
    Resend,
};
use tracing::{error, info};

/// Where failure reports go.
#[derive(Clone)]
pub struct Notifier {
    pub resend: Resend,
    pub from: String,
    pub to: Vec<String>,
}

impl Notifier {
    pub fn new(api_key: &str, from: String, to: Vec<String>) -> Self {
        Self {
            resend: Resend::new(api_key),
            from,
            to,
        }
    }
}

pub async fn send_error_info(
    notifier: &Notifier,
    error_info: &str,
) -> Result<CreateEmailResponse, resend_rs::Error> {
    let subject = "Error from booking sheet sync";

    info!("Sending error information email to {} recipient(s)", notifier.to.len());
    info!("Error details: {}", error_info);

    let email = CreateEmailBaseOptions::new(&notifier.from, &notifier.to, subject)
        .with_text(&error_body(error_info));

    let result = notifier.resend.emails.send(email).await;
    match &result {
        Ok(response) => info!(
            "Error info email sent successfully with ID: {}",
            response.id
        ),
        Err(e) => error!("Failed to send error info email: {}", e),
    }

    result
}

fn error_body(error_info: &str) -> String {
    format!(
        "The booking sheet sync failed and the sheet may be incomplete until the next successful run.\n\n{error_info}"
    )
}
