//! Config flow turning raw form input into a stored, validated entry.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::model::{AddressQuery, InstanceId, ValidatedAddress};
use crate::ports::{AddressValidator, TransportError, ValidateError};

/// Stored configuration of one address instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Registry key.
    pub entry_id: InstanceId,
    /// Identity key derived from the address fields.
    pub unique_id: String,
    /// Display title, the formatted address.
    pub title: String,
    /// Normalized address fields.
    pub address: AddressQuery,
}

impl From<ValidatedAddress> for ConfigEntry {
    fn from(validated: ValidatedAddress) -> Self {
        Self {
            entry_id: InstanceId::for_address(&validated.query),
            unique_id: validated.query.unique_id(),
            title: validated.formatted_address,
            address: validated.query,
        }
    }
}

/// Persistence of config entries, owned by the host.
pub trait ConfigStore: Send + Sync {
    /// All stored entries.
    fn entries(&self) -> Vec<ConfigEntry>;

    /// Whether an entry with this unique id exists.
    fn has_unique_id(&self, unique_id: &str) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.unique_id == unique_id)
    }

    /// Store a new entry. Returns `false` if its unique id is already present.
    fn insert(&self, entry: ConfigEntry) -> bool;

    /// Remove an entry by id.
    fn remove(&self, entry_id: &InstanceId) -> Option<ConfigEntry>;
}

/// [`ConfigStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: RwLock<Vec<ConfigEntry>>,
}

impl ConfigStore for MemoryConfigStore {
    fn entries(&self) -> Vec<ConfigEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn insert(&self, entry: ConfigEntry) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .iter()
            .any(|existing| existing.unique_id == entry.unique_id)
        {
            return false;
        }
        entries.push(entry);
        true
    }

    fn remove(&self, entry_id: &InstanceId) -> Option<ConfigEntry> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let index = entries
            .iter()
            .position(|entry| &entry.entry_id == entry_id)?;
        Some(entries.remove(index))
    }
}

/// Raw user input of the address form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressForm {
    /// House number, e.g. `2100`.
    pub house_number: String,
    /// Direction code or empty.
    #[serde(default)]
    pub direction: String,
    /// Street name.
    pub street_name: String,
    /// Street suffix code.
    pub street_suffix: String,
}

/// Form field a validation error points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    /// House number field.
    HouseNumber,
    /// Direction field.
    Direction,
    /// Street name field.
    StreetName,
    /// Street suffix field.
    StreetSuffix,
}

impl FormField {
    /// Key used in form error maps.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::HouseNumber => "house_number",
            Self::Direction => "direction",
            Self::StreetName => "street_name",
            Self::StreetSuffix => "street_suffix",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.key())
    }
}

impl AddressForm {
    /// Parse the raw fields into an [`AddressQuery`].
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] for an empty required field or an unknown code.
    pub fn parse(&self) -> Result<AddressQuery, FlowError> {
        let house_number = self.house_number.trim();
        if house_number.is_empty() {
            return Err(FlowError::InvalidInput(FormField::HouseNumber));
        }

        let street_name = self.street_name.trim();
        if street_name.is_empty() {
            return Err(FlowError::InvalidInput(FormField::StreetName));
        }

        let direction = match self.direction.trim() {
            "" => None,
            code => Some(
                code.parse()
                    .map_err(|_err| FlowError::InvalidInput(FormField::Direction))?,
            ),
        };

        let street_suffix = self
            .street_suffix
            .parse()
            .map_err(|_err| FlowError::InvalidInput(FormField::StreetSuffix))?;

        Ok(AddressQuery::new(
            house_number,
            direction,
            street_name,
            street_suffix,
        ))
    }
}

#[derive(thiserror::Error, Debug)]
/// Reasons the config flow did not create an entry.
pub enum FlowError {
    /// A form field is empty or holds an unknown code.
    #[error("Invalid value for {0}")]
    InvalidInput(FormField),
    /// The city lookup could not be reached.
    #[error("Cannot connect to the city lookup: {0}")]
    CannotConnect(#[source] TransportError),
    /// The city could not determine a schedule for the address.
    #[error("Address not found")]
    AddressNotFound,
    /// An entry for the same address already exists.
    #[error("Address is already configured")]
    AlreadyConfigured,
}

impl FlowError {
    /// Error key shown next to the form.
    #[must_use]
    pub fn form_error_key(&self) -> &'static str {
        match self {
            Self::InvalidInput(FormField::HouseNumber) => "invalid_house_number",
            Self::InvalidInput(FormField::Direction) => "invalid_direction",
            Self::InvalidInput(FormField::StreetName) => "invalid_street_name",
            Self::InvalidInput(FormField::StreetSuffix) => "invalid_street_suffix",
            Self::CannotConnect(_) => "cannot_connect",
            Self::AddressNotFound => "address_not_found",
            Self::AlreadyConfigured => "already_configured",
        }
    }

    /// Whether re-showing the form makes sense; duplicates abort the flow instead.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AlreadyConfigured)
    }
}

impl From<ValidateError> for FlowError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::ConnectionFailure(source) => Self::CannotConnect(source),
            ValidateError::AddressNotFound => Self::AddressNotFound,
        }
    }
}

/// Setup-time flow: parse, de-duplicate, validate, store.
pub struct ConfigFlow {
    validator: Arc<dyn AddressValidator>,
    store: Arc<dyn ConfigStore>,
}

impl ConfigFlow {
    /// Create a flow bound to a validator and a config store.
    #[must_use]
    pub fn new(validator: Arc<dyn AddressValidator>, store: Arc<dyn ConfigStore>) -> Self {
        Self { validator, store }
    }

    /// Run the flow for one form submission.
    ///
    /// # Errors
    ///
    /// Returns a [`FlowError`] when the input is invalid, the address is already
    /// configured, or validation fails.
    pub async fn submit(&self, form: &AddressForm) -> Result<ConfigEntry, FlowError> {
        let query = form.parse()?;
        if self.store.has_unique_id(&query.unique_id()) {
            return Err(FlowError::AlreadyConfigured);
        }

        tracing::debug!(address = %query, "Validating address");
        let validated = self
            .validator
            .validate(&query)
            .await
            .inspect_err(|err| tracing::warn!(address = %query, error = %err, "Validation failed"))?;

        let entry = ConfigEntry::from(validated);
        if !self.store.insert(entry.clone()) {
            return Err(FlowError::AlreadyConfigured);
        }

        tracing::info!(title = %entry.title, "Created config entry");
        Ok(entry)
    }
}
