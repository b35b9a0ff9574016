use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Notification, Notifier};
use crate::error::NotifyError;

/// POSTs each notification as JSON to a URL.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(n)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status { status: status.as_u16() });
        }
        debug!(url = %self.url, kind = ?n.kind, "Webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_notification_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/jobfill"))
            .and(body_partial_json(serde_json::json!({
                "type": "captcha_detected",
                "job_id": "job-9",
                "priority": "urgent"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookNotifier::new(format!("{}/hooks/jobfill", server.uri()), 5).unwrap();
        sink.notify(&Notification::captcha_detected("job-9", None, "recaptcha", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = WebhookNotifier::new(server.uri(), 5).unwrap();
        let err = sink
            .notify(&Notification::job_failed("j", None, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Status { status: 503 }));
    }
}
