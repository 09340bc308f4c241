//! Traits describing provider capabilities and the errors they surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{AddressQuery, ScheduleResult, ValidatedAddress};

#[derive(thiserror::Error, Debug)]
/// Failures of the single outbound lookup request.
pub enum TransportError {
    /// No response arrived within the request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The endpoint answered with a non-2xx status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
}

#[derive(thiserror::Error, Debug)]
/// Setup-time failures of address validation.
pub enum ValidateError {
    /// Transport, timeout, or non-2xx response.
    #[error("Cannot connect to the city lookup: {0}")]
    ConnectionFailure(#[from] TransportError),
    /// The city could not determine a schedule for the address.
    #[error("Address not found")]
    AddressNotFound,
}

#[derive(thiserror::Error, Debug)]
/// Runtime failures of a scheduled poll.
pub enum PollError {
    /// Transport, timeout, or non-2xx response.
    #[error("Error communicating with the city lookup: {0}")]
    Connection(#[from] TransportError),
    /// The city no longer resolves the configured address.
    #[error("Address not found or schedule unavailable for {0}")]
    AddressNotFound(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Field-local failure to turn scraped text into a calendar date.
pub enum DateParseError {
    /// The page carried no text for this stream.
    #[error("No date text found")]
    Missing,
    /// The text did not match any accepted date layout.
    #[error("Unrecognised date text '{0}'")]
    Unrecognized(String),
}

#[async_trait]
/// Checks once, at setup time, that the city resolves an address.
pub trait AddressValidator: Send + Sync {
    /// Validate the address against the city lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::ConnectionFailure`] when the request fails and
    /// [`ValidateError::AddressNotFound`] when the city has no schedule for it.
    async fn validate(&self, address: &AddressQuery) -> Result<ValidatedAddress, ValidateError>;
}

#[async_trait]
/// Fetches the next pickup dates for a validated address.
pub trait SchedulePoller: Send + Sync {
    /// Fetch and parse the current schedule.
    ///
    /// # Errors
    ///
    /// Returns a [`PollError`] when the request fails or the address stopped resolving.
    /// Missing or unparsable dates are not errors.
    async fn poll(&self, address: &ValidatedAddress) -> Result<ScheduleResult, PollError>;
}

/// Validator and poller implementing one provider.
#[derive(Clone)]
pub struct ProviderPorts {
    /// Setup-time address check.
    pub validator: Arc<dyn AddressValidator>,
    /// Scheduled schedule fetch.
    pub poller: Arc<dyn SchedulePoller>,
}
