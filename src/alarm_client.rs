use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use crate::clock::{Clock, SystemClock};
use crate::error::{ChannelError, StudyError, StudyResult};
use crate::models::TimeOfDay;
use crate::notify::AlarmDelegate;
use crate::recurrence;

/// Delegated device alarm that forwards the request to a webhook
/// (phone automation, home assistant, …). Fire-and-forget.
#[derive(Clone)]
pub struct WebhookAlarm {
    client: reqwest::Client,
    url: String,
    clock: Arc<dyn Clock>,
}

impl WebhookAlarm {
    pub fn new(url: impl Into<String>, debug: bool) -> StudyResult<Self> {
        let url = url.into();
        let mut builder = reqwest::Client::builder()
            .user_agent("study-reminders")
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(15));

        // local test endpoints are usually self-signed
        if debug {
            warn!("debug mode enabled - accepting invalid certificates");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|err| StudyError::network(format!("failed to create HTTP client: {err}")))?;

        Ok(Self {
            client,
            url,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Request body: the alarm time, its title and the next local instant it maps to.
    pub fn payload(&self, time: TimeOfDay, title: &str) -> Value {
        let alarm_at = recurrence::next_one_shot(self.clock.now(), time);
        json!({
            "time": time.to_string(),
            "title": title,
            "alarm_at": alarm_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        })
    }

    async fn post(client: reqwest::Client, url: String, body: Value) -> Result<(), String> {
        let start = Instant::now();
        let response = client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| format!("alarm request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("alarm HTTP error: {}", status));
        }

        info!(
            "delegated alarm accepted by {} in {}ms",
            url,
            start.elapsed().as_millis()
        );
        Ok(())
    }
}

impl AlarmDelegate for WebhookAlarm {
    fn schedule_alarm(&self, time: TimeOfDay, title: &str) -> Result<(), ChannelError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::Unsupported)?;

        let body = self.payload(time, title);
        let client = self.client.clone();
        let url = self.url.clone();
        runtime.spawn(async move {
            if let Err(err) = Self::post(client, url, body).await {
                warn!("delegated alarm failed, in-app notification only: {}", err);
            }
        });
        Ok(())
    }
}
