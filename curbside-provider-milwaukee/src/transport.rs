//! Form-encoded POST against the city lookup endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;

use curbside_core::{model::AddressQuery, ports::TransportError};

/// City of Milwaukee DPW garbage day lookup.
pub const BASE_URL: &str = "https://itmdapps.milwaukee.gov/DpwServletsPublic/garbage_day";

/// Body of the lookup form as the city page submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupForm {
    /// House number.
    pub laddr: String,
    /// Direction code, empty when the street has none.
    pub sdir: String,
    /// Street name.
    pub sname: String,
    /// Street suffix code.
    pub stype: String,
    /// Ask for the embeddable page variant.
    pub embed: &'static str,
    /// Submit button value.
    #[serde(rename = "Submit")]
    pub submit: &'static str,
}

impl LookupForm {
    /// Encode an address; everything but the house number is uppercased.
    #[must_use]
    pub fn for_address(address: &AddressQuery) -> Self {
        Self {
            laddr: address.house_number.clone(),
            sdir: address.direction_code().to_owned(),
            sname: address.street_name.to_uppercase(),
            stype: address.street_suffix.code().to_owned(),
            embed: "y",
            submit: "Submit",
        }
    }
}

#[async_trait]
/// Sends a lookup form and returns the response body.
pub trait FormTransport: Send + Sync {
    /// POST `form` and return the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on timeout, network failure, or a non-2xx status.
    async fn post_form(&self, form: &LookupForm, timeout: Duration)
    -> Result<String, TransportError>;
}

/// [`FormTransport`] backed by a shared, pooled [`reqwest::Client`].
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport posting to [`BASE_URL`].
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_url(client, BASE_URL)
    }

    /// Create a transport posting to a custom endpoint.
    #[must_use]
    pub fn with_url<U: Into<String>>(client: Client, url: U) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl FormTransport for HttpTransport {
    async fn post_form(
        &self,
        form: &LookupForm,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let req = self.client.post(&self.url).timeout(timeout).form(form);
        fetch_text(req, timeout).await
    }
}

// Send, check the status, and read the body, mapping timeouts explicitly.
async fn fetch_text(req: RequestBuilder, timeout: Duration) -> Result<String, TransportError> {
    let map_err = |err: reqwest::Error| {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else {
            TransportError::Network(err)
        }
    };

    let response = req.send().await.map_err(map_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }
    response.text().await.map_err(map_err)
}
