//! Outbound delivery of events to webhook URLs.

use std::sync::Arc;
use std::time::Duration;

use evstore_core::{Event, Settings};

use crate::error::DeliveryError;

/// Sends one event to one subscriber endpoint.
pub trait Deliverer: Send + Sync {
    fn deliver(&self, url: &str, event: &Event) -> Result<(), DeliveryError>;
}

impl<D> Deliverer for Arc<D>
where
    D: Deliverer + ?Sized,
{
    fn deliver(&self, url: &str, event: &Event) -> Result<(), DeliveryError> {
        (**self).deliver(url, event)
    }
}

/// POSTs the event as JSON; any non-2xx answer counts as a failure.
#[derive(Debug, Clone)]
pub struct HttpDeliverer {
    client: reqwest::blocking::Client,
}

impl HttpDeliverer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.delivery_timeout)
    }
}

impl Default for HttpDeliverer {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl Deliverer for HttpDeliverer {
    fn deliver(&self, url: &str, event: &Event) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
