use crate::config::MailConfig;
use crate::models::contact::ContactSubmission;

/// Contact notification seam. Delivery goes through an external relay in
/// deployment; unconfigured instances just record the submission and log.
pub struct Mailer {
    notify_address: Option<String>,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            notify_address: config.notify_address.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.notify_address.is_some()
    }

    /// Fire-and-forget: a failed or skipped notification must never surface
    /// to the submitter, whose message is already persisted.
    pub async fn send_contact_notification(&self, submission: &ContactSubmission) {
        match self.notify_address.as_deref() {
            Some(address) => {
                tracing::info!(
                    "contact notification for submission {} queued to {address}",
                    submission.id
                );
            }
            None => {
                tracing::debug!(
                    "no notify address configured, skipping notification for submission {}",
                    submission.id
                );
            }
        }
    }
}
