//! Provider implementation for Milwaukee using the DPW garbage day lookup page.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use curbside_core::{
    model::{AddressQuery, ScheduleResult, ValidatedAddress, WasteStream},
    ports::{
        AddressValidator, DateParseError, PollError, ProviderPorts, SchedulePoller, ValidateError,
    },
};

mod dates;
mod extract;
mod transport;

pub use dates::parse_pickup_date;
pub use extract::{NOT_FOUND_MARKER, collapse_nbsp, contains_not_found_marker, extract_date_text};
pub use transport::{BASE_URL, FormTransport, HttpTransport, LookupForm};

/// Timeout of the setup-time validation request.
pub const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout of each scheduled poll.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(15);

/// Address validation against the city lookup.
pub struct MilwaukeeAddressValidator {
    transport: Arc<dyn FormTransport>,
}

impl MilwaukeeAddressValidator {
    /// Create a validator sending requests through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn FormTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl AddressValidator for MilwaukeeAddressValidator {
    async fn validate(&self, address: &AddressQuery) -> Result<ValidatedAddress, ValidateError> {
        let form = LookupForm::for_address(address);
        let body = self
            .transport
            .post_form(&form, VALIDATE_TIMEOUT)
            .await
            .inspect_err(|err| tracing::error!(%address, error = %err, "Cannot reach city lookup"))?;

        if contains_not_found_marker(&body) {
            tracing::warn!(%address, "Address not found");
            return Err(ValidateError::AddressNotFound);
        }

        tracing::debug!(%address, "Validation successful");
        Ok(ValidatedAddress::from(address.clone()))
    }
}

/// Scheduled schedule fetch from the city lookup.
pub struct MilwaukeeSchedulePoller {
    transport: Arc<dyn FormTransport>,
}

impl MilwaukeeSchedulePoller {
    /// Create a poller sending requests through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn FormTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl SchedulePoller for MilwaukeeSchedulePoller {
    async fn poll(&self, address: &ValidatedAddress) -> Result<ScheduleResult, PollError> {
        let form = LookupForm::for_address(&address.query);
        let body = self.transport.post_form(&form, POLL_TIMEOUT).await?;

        // city data can regress after setup
        if contains_not_found_marker(&body) {
            return Err(PollError::AddressNotFound(
                address.formatted_address.clone(),
            ));
        }

        Ok(parse_schedule(&body, &address.formatted_address))
    }
}

/// Extract and parse both pickup dates from a lookup page.
///
/// A missing or unparsable date is logged and left as `None`.
#[must_use]
pub fn parse_schedule(body: &str, address: &str) -> ScheduleResult {
    let date_for = |stream: WasteStream| {
        let text = extract_date_text(body, stream);
        let parsed = text
            .as_deref()
            .map_or(Err(DateParseError::Missing), parse_pickup_date);
        parsed
            .inspect_err(|err| {
                tracing::warn!(%address, %stream, error = %err, "No usable pickup date");
            })
            .ok()
    };

    ScheduleResult {
        garbage_date: date_for(WasteStream::Garbage),
        recycling_date: date_for(WasteStream::Recycling),
    }
}

/// Build the validator and poller sharing one pooled HTTP client.
#[must_use]
pub fn provider(client: Client) -> ProviderPorts {
    provider_with_transport(Arc::new(HttpTransport::new(client)))
}

/// Build the validator and poller on top of an arbitrary transport.
#[must_use]
pub fn provider_with_transport(transport: Arc<dyn FormTransport>) -> ProviderPorts {
    ProviderPorts {
        validator: Arc::new(MilwaukeeAddressValidator::new(Arc::clone(&transport))),
        poller: Arc::new(MilwaukeeSchedulePoller::new(transport)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use curbside_core::{
        model::{StreetDirection, StreetSuffix},
        ports::TransportError,
    };

    use super::*;

    enum Reply {
        Body(&'static str),
        Status(u16),
        Timeout,
    }

    /// Transport answering every request with the same reply.
    struct CannedTransport {
        reply: Reply,
        seen: Mutex<Vec<(LookupForm, Duration)>>,
    }

    impl CannedTransport {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn timeouts(&self) -> Vec<Duration> {
            self.seen
                .lock()
                .expect("seen lock")
                .iter()
                .map(|(_, timeout)| *timeout)
                .collect()
        }
    }

    #[async_trait]
    impl FormTransport for CannedTransport {
        async fn post_form(
            &self,
            form: &LookupForm,
            timeout: Duration,
        ) -> Result<String, TransportError> {
            self.seen
                .lock()
                .expect("seen lock")
                .push((form.clone(), timeout));
            match self.reply {
                Reply::Body(body) => Ok(body.to_owned()),
                Reply::Status(code) => Err(TransportError::Status(code)),
                Reply::Timeout => Err(TransportError::Timeout(timeout)),
            }
        }
    }

    const NOT_FOUND_PAGE: &str = "<html><body>\n<p>Your garbage collection schedule could not be determined.</p>\n<p>The next garbage collection pickup is <strong>Tuesday April 9, 2025</strong></p>\n</body></html>";

    const GARBAGE_ONLY_PAGE: &str = "<div>\n  Next Garbage Collection: <strong>Tuesday April 9, 2025</strong>\n</div>";

    const FULL_PAGE: &str = "<h2>The next garbage collection pickup for this location is:</h2>\n<strong>Wednesday April 9, 2025</strong>\n<h2>The next estimated pickup time for your next recycling collection is:</h2>\n<strong>Monday&nbsp;April 14, 2025</strong>";

    fn address() -> AddressQuery {
        AddressQuery::new("2100", Some(StreetDirection::North), "main", StreetSuffix::Street)
    }

    fn date(month: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, month, day)
    }

    #[tokio::test]
    async fn validate_returns_normalized_address() {
        let transport = CannedTransport::new(Reply::Body(FULL_PAGE));
        let validator = MilwaukeeAddressValidator::new(Arc::clone(&transport) as _);

        let validated = validator.validate(&address()).await.expect("valid");
        assert_eq!(validated.formatted_address, "2100 N MAIN ST");
        assert_eq!(validated.query.street_name, "MAIN");
        assert_eq!(transport.timeouts(), vec![VALIDATE_TIMEOUT]);
    }

    #[tokio::test]
    async fn validate_marker_wins_over_other_content() {
        let validator =
            MilwaukeeAddressValidator::new(CannedTransport::new(Reply::Body(NOT_FOUND_PAGE)));
        let err = validator.validate(&address()).await.expect_err("not found");
        assert!(matches!(err, ValidateError::AddressNotFound));
    }

    #[tokio::test]
    async fn validate_transport_failures_are_connection_failures() {
        for reply in [Reply::Timeout, Reply::Status(500)] {
            let validator = MilwaukeeAddressValidator::new(CannedTransport::new(reply));
            let err = validator.validate(&address()).await.expect_err("must fail");
            assert!(matches!(err, ValidateError::ConnectionFailure(_)), "{err}");
        }
    }

    #[tokio::test]
    async fn poll_reads_both_dates() {
        let transport = CannedTransport::new(Reply::Body(FULL_PAGE));
        let poller = MilwaukeeSchedulePoller::new(Arc::clone(&transport) as _);

        let result = poller.poll(&address().into()).await.expect("poll");
        assert_eq!(result.garbage_date, date(4, 9));
        assert_eq!(result.recycling_date, date(4, 14));
        assert_eq!(transport.timeouts(), vec![POLL_TIMEOUT]);
    }

    #[tokio::test]
    async fn poll_with_garbage_section_only() {
        let poller =
            MilwaukeeSchedulePoller::new(CannedTransport::new(Reply::Body(GARBAGE_ONLY_PAGE)));
        let result = poller.poll(&address().into()).await.expect("poll");
        assert_eq!(
            result,
            ScheduleResult {
                garbage_date: date(4, 9),
                recycling_date: None,
            }
        );
    }

    #[tokio::test]
    async fn poll_survives_unparsable_and_missing_dates() {
        let page = "next garbage collection <strong>To be announced</strong>";
        let poller = MilwaukeeSchedulePoller::new(CannedTransport::new(Reply::Body(page)));
        let result = poller.poll(&address().into()).await.expect("poll still succeeds");
        assert_eq!(result, ScheduleResult::default());
    }

    #[tokio::test]
    async fn poll_detects_regressed_address() {
        let poller =
            MilwaukeeSchedulePoller::new(CannedTransport::new(Reply::Body(NOT_FOUND_PAGE)));
        let err = poller.poll(&address().into()).await.expect_err("regressed");
        assert!(
            matches!(&err, PollError::AddressNotFound(title) if title == "2100 N MAIN ST"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn poll_timeout_returns_no_partial_result() {
        let poller = MilwaukeeSchedulePoller::new(CannedTransport::new(Reply::Timeout));
        let err = poller.poll(&address().into()).await.expect_err("timeout");
        assert!(
            matches!(err, PollError::Connection(TransportError::Timeout(timeout)) if timeout == POLL_TIMEOUT)
        );
    }

    #[tokio::test]
    async fn polling_unchanged_page_is_idempotent() {
        let poller = MilwaukeeSchedulePoller::new(CannedTransport::new(Reply::Body(FULL_PAGE)));
        let address = ValidatedAddress::from(address());
        let first = poller.poll(&address).await.expect("first");
        let second = poller.poll(&address).await.expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn provider_ports_share_the_transport() {
        let transport = CannedTransport::new(Reply::Status(503));
        let ports = provider_with_transport(Arc::clone(&transport) as _);
        assert_eq!(Arc::strong_count(&transport), 3, "validator and poller hold it");
        drop(ports);
        assert_eq!(Arc::strong_count(&transport), 1);
    }
}
