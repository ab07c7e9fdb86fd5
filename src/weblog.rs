//! Interference reports posted to an external web form.
//!
//! The form is a Google Form in practice: a POST of url-encoded answers to
//! `<url_base>/formResponse`, with the `viewform` page as referer. Field ids
//! come from `[weblog]` in the configuration.

#[cfg(feature = "weblog")]
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::WeblogConfig;
use crate::logutil::escape_log;
use crate::serial::Outcome;

pub struct WebFormLogger {
    config: WeblogConfig,
    dry_run: bool,
    #[cfg(feature = "weblog")]
    client: reqwest::Client,
}

impl WebFormLogger {
    /// `dry_run` is set in simulation mode: reports are acknowledged but not sent.
    pub fn new(config: WeblogConfig, dry_run: bool) -> Self {
        Self {
            config,
            dry_run,
            #[cfg(feature = "weblog")]
            client: reqwest::Client::new(),
        }
    }

    pub fn submit_url(&self) -> String {
        format!("{}/formResponse", self.config.url_base.trim_end_matches('/'))
    }

    pub fn referer(&self) -> String {
        format!("{}/viewform", self.config.url_base.trim_end_matches('/'))
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// Form answers for one report, in submission order.
    pub fn form_fields(&self, caller: &str, location: &str, minutes: u32) -> Vec<(String, String)> {
        let mut fields = vec![
            (self.config.call_field.clone(), caller.to_string()),
            (self.config.location_field.clone(), location.to_string()),
            (self.config.duration_field.clone(), format!("Yes - {minutes} min")),
        ];
        for (name, value) in &self.config.extra_fields {
            fields.push((name.clone(), value.clone()));
        }
        fields.push(("draftResponse".to_string(), "[]".to_string()));
        fields.push(("pageHistory".to_string(), "0".to_string()));
        fields
    }

    /// Submit one interference report.
    pub async fn log(&self, caller: &str, location: &str, minutes: u32) -> Outcome {
        if !self.config.enabled {
            debug!("Interference report dropped, weblog disabled");
            return Outcome::failure("Interference logging is not configured");
        }
        if self.dry_run {
            info!(
                "(simulated) Interference report from {} at {} for {} min",
                escape_log(caller),
                escape_log(location),
                minutes
            );
            return Outcome::success("Action NOT logged. (Testing mode)");
        }
        self.post(caller, location, minutes).await
    }

    #[cfg(feature = "weblog")]
    async fn post(&self, caller: &str, location: &str, minutes: u32) -> Outcome {
        let fields = self.form_fields(caller, location, minutes);
        let request = self
            .client
            .post(self.submit_url())
            .header(reqwest::header::REFERER, self.referer())
            .header(reqwest::header::USER_AGENT, self.user_agent())
            .form(&fields);
        let limit = Duration::from_secs(self.config.timeout_seconds as u64);

        match tokio::time::timeout(limit, request.send()).await {
            Ok(Ok(response)) if response.status() == reqwest::StatusCode::OK => {
                debug!("Interference report accepted by {}", self.submit_url());
                Outcome::success("Action logged.")
            }
            Ok(Ok(response)) => {
                warn!("Interference report refused: {}", response.status());
                Outcome::failure(format!("Logging failed: {}", response.status().as_u16()))
            }
            Ok(Err(e)) => {
                warn!("Interference report failed: {}", e);
                Outcome::failure(format!("Logging failed: {e}"))
            }
            Err(_) => {
                warn!(
                    "Interference report timed out after {}s",
                    self.config.timeout_seconds
                );
                Outcome::failure(format!(
                    "Logging failed: timeout after {}s",
                    self.config.timeout_seconds
                ))
            }
        }
    }

    #[cfg(not(feature = "weblog"))]
    async fn post(&self, _caller: &str, _location: &str, _minutes: u32) -> Outcome {
        warn!("Interference report dropped, built without the weblog feature");
        Outcome::failure("Interference logging is not available in this build")
    }
}
