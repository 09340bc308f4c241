use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use curbside_core::{
    coordinator::{PollState, Snapshot},
    flow::{AddressForm, ConfigEntry, ConfigFlow, ConfigStore, FlowError, MemoryConfigStore},
    model::StreetDirection,
    ports::ProviderPorts,
    registry::InstanceRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Dashboard,
    AddAddress,
}

/// One configured address as the dashboard shows it.
pub(crate) struct InstanceRow {
    pub entry: ConfigEntry,
    pub snapshot: Snapshot,
    pub state: PollState,
}

pub(crate) struct App {
    pub registry: Arc<InstanceRegistry>,
    pub store: Arc<MemoryConfigStore>,
    pub flow: ConfigFlow,
    pub ports: ProviderPorts,

    pub screen: Screen,
    pub list_index: usize,

    pub address_input: String,
    pub form_error: Option<String>,

    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(registry: Arc<InstanceRegistry>, ports: ProviderPorts) -> Self {
        let store = Arc::new(MemoryConfigStore::default());
        let flow = ConfigFlow::new(
            Arc::clone(&ports.validator),
            Arc::clone(&store) as Arc<dyn ConfigStore>,
        );
        Self {
            registry,
            store,
            flow,
            ports,
            screen: Screen::Dashboard,
            list_index: 0,
            address_input: String::new(),
            form_error: None,
            is_loading: false,
            error_message: None,
        }
    }

    pub(crate) fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub(crate) fn rows(&self) -> Vec<InstanceRow> {
        self.registry
            .instances()
            .into_iter()
            .map(|(entry, coordinator)| InstanceRow {
                entry,
                snapshot: coordinator.snapshot(),
                state: coordinator.state(),
            })
            .collect()
    }

    pub(crate) fn selected_entry(&self) -> Option<ConfigEntry> {
        self.registry
            .instances()
            .into_iter()
            .nth(self.list_index)
            .map(|(entry, _)| entry)
    }

    /// Run the config flow, then set up the instance. A failed setup removes the entry again.
    pub(crate) async fn configure(&self, form: &AddressForm) -> Result<ConfigEntry> {
        let entry = self
            .flow
            .submit(form)
            .await
            .map_err(|err| {
                let key = err.form_error_key();
                anyhow::Error::new(err).context(key)
            })?;

        if let Err(err) = self
            .registry
            .setup(entry.clone(), Arc::clone(&self.ports.poller))
            .await
        {
            self.store.remove(&entry.entry_id);
            return Err(err).with_context(|| format!("Setting up {} failed", entry.title));
        }
        Ok(entry)
    }

    /// Force a poll of the selected address.
    pub(crate) async fn refresh_selected(&self) -> Result<()> {
        let entry = self
            .selected_entry()
            .context("No address selected")?;
        let coordinator = self
            .registry
            .coordinator(&entry.entry_id)
            .context("Address is no longer set up")?;
        coordinator
            .refresh()
            .await
            .with_context(|| format!("Refreshing {} failed", entry.title))?;
        Ok(())
    }

    /// Tear down the selected address and forget its entry.
    pub(crate) fn remove_selected(&mut self) -> Option<ConfigEntry> {
        let entry = self.selected_entry()?;
        self.registry.teardown(&entry.entry_id);
        self.store.remove(&entry.entry_id);
        self.list_index = self.list_index.min(self.registry.len().saturating_sub(1));
        Some(entry)
    }

    /// Whether a failed `configure` leaves the user on the form to correct the input.
    pub(crate) fn form_can_retry(err: &anyhow::Error) -> bool {
        err.downcast_ref::<FlowError>()
            .is_none_or(FlowError::is_retryable)
    }

    pub(crate) fn open_add_address(&mut self) {
        self.address_input.clear();
        self.form_error = None;
        self.screen = Screen::AddAddress;
    }
}

/// Split typed input like `2100 N Main St` into form fields.
///
/// The first word is the house number and the last the suffix; a compass code right
/// after the house number is taken as direction when a street name follows it.
pub(crate) fn parse_address_input(input: &str) -> AddressForm {
    let words = input.split_whitespace().collect::<Vec<_>>();
    let Some((house_number, rest)) = words.split_first() else {
        return AddressForm::default();
    };
    let Some((street_suffix, middle)) = rest.split_last() else {
        return AddressForm {
            house_number: (*house_number).to_owned(),
            ..AddressForm::default()
        };
    };

    let (direction, street) = match middle.split_first() {
        Some((first, street)) if !street.is_empty() && first.parse::<StreetDirection>().is_ok() => {
            ((*first).to_owned(), street)
        }
        _ => (String::new(), middle),
    };

    AddressForm {
        house_number: (*house_number).to_owned(),
        direction,
        street_name: street.join(" "),
        street_suffix: (*street_suffix).to_owned(),
    }
}
