//! Domain data structures for addresses, validated entries, and pickup schedules.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Compass prefix of a Milwaukee street, e.g. the `N` in `2100 N MAIN ST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreetDirection {
    /// North.
    North,
    /// South.
    South,
    /// East.
    East,
    /// West.
    West,
    /// Northeast.
    Northeast,
    /// Northwest.
    Northwest,
    /// Southeast.
    Southeast,
    /// Southwest.
    Southwest,
}

impl StreetDirection {
    /// All directions in the order the city form lists them.
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::South,
        Self::East,
        Self::West,
        Self::Northeast,
        Self::Northwest,
        Self::Southeast,
        Self::Southwest,
    ];

    /// Abbreviation sent to the city endpoint.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::North => "N",
            Self::South => "S",
            Self::East => "E",
            Self::West => "W",
            Self::Northeast => "NE",
            Self::Northwest => "NW",
            Self::Southeast => "SE",
            Self::Southwest => "SW",
        }
    }
}

/// Street type codes accepted by the city lookup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreetSuffix {
    /// Avenue.
    Avenue,
    /// Boulevard.
    Boulevard,
    /// Circle.
    Circle,
    /// Court.
    Court,
    /// Drive.
    Drive,
    /// Lane.
    Lane,
    /// Parkway.
    Parkway,
    /// Place.
    Place,
    /// Road.
    Road,
    /// Square.
    Square,
    /// Street.
    Street,
    /// Service drive.
    ServiceDrive,
    /// Terrace.
    Terrace,
    /// Way.
    Way,
}

impl StreetSuffix {
    /// All suffix codes in the order the city form lists them.
    pub const ALL: [Self; 14] = [
        Self::Avenue,
        Self::Boulevard,
        Self::Circle,
        Self::Court,
        Self::Drive,
        Self::Lane,
        Self::Parkway,
        Self::Place,
        Self::Road,
        Self::Square,
        Self::Street,
        Self::ServiceDrive,
        Self::Terrace,
        Self::Way,
    ];

    /// Code sent to the city endpoint.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Avenue => "AV",
            Self::Boulevard => "BL",
            Self::Circle => "CR",
            Self::Court => "CT",
            Self::Drive => "DR",
            Self::Lane => "LA",
            Self::Parkway => "PK",
            Self::Place => "PL",
            Self::Road => "RD",
            Self::Square => "SQ",
            Self::Street => "ST",
            Self::ServiceDrive => "SV",
            Self::Terrace => "TR",
            Self::Way => "WA",
        }
    }
}

/// Error returned when a direction or suffix code is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown code: {0}")]
pub struct UnknownCode(pub String);

impl FromStr for StreetDirection {
    type Err = UnknownCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let code = raw.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|direction| direction.code() == code)
            .ok_or(UnknownCode(code))
    }
}

impl FromStr for StreetSuffix {
    type Err = UnknownCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let code = raw.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|suffix| suffix.code() == code)
            .ok_or(UnknownCode(code))
    }
}

impl fmt::Display for StreetDirection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.code())
    }
}

impl fmt::Display for StreetSuffix {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.code())
    }
}

/// Street address as entered by a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressQuery {
    /// House number, kept as typed (the city accepts ranges like `2100-2102`).
    pub house_number: String,
    /// Optional compass prefix.
    pub direction: Option<StreetDirection>,
    /// Street name without direction or suffix.
    pub street_name: String,
    /// Street type code.
    pub street_suffix: StreetSuffix,
}

impl AddressQuery {
    /// Construct a query, trimming the house number and uppercasing the street name.
    #[must_use]
    pub fn new<H: Into<String>, S: Into<String>>(
        house_number: H,
        direction: Option<StreetDirection>,
        street_name: S,
        street_suffix: StreetSuffix,
    ) -> Self {
        Self {
            house_number: house_number.into().trim().to_owned(),
            direction,
            street_name: street_name
                .into()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase(),
            street_suffix,
        }
    }

    /// Direction code, or an empty string when the street has none.
    #[must_use]
    pub fn direction_code(&self) -> &'static str {
        self.direction.map_or("", StreetDirection::code)
    }

    /// Identity key built from the four address fields.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.house_number,
            self.direction_code(),
            self.street_name,
            self.street_suffix
        )
    }

    /// Human-readable address with single spaces, e.g. `2100 N MAIN ST`.
    #[must_use]
    pub fn formatted(&self) -> String {
        [
            self.house_number.as_str(),
            self.direction_code(),
            self.street_name.as_str(),
            self.street_suffix.code(),
        ]
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
    }
}

impl fmt::Display for AddressQuery {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.formatted())
    }
}

/// Identifier of one configured address instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    /// Id of the instance for an address; equal to its [`AddressQuery::unique_id`]
    /// so the registry and the config store key entries identically.
    #[must_use]
    pub fn for_address(address: &AddressQuery) -> Self {
        Self(address.unique_id())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Address the city recognised, together with its display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedAddress {
    /// Normalized address fields.
    pub query: AddressQuery,
    /// Formatted address used as entry title.
    pub formatted_address: String,
}

impl From<AddressQuery> for ValidatedAddress {
    fn from(query: AddressQuery) -> Self {
        let formatted_address = query.formatted();
        Self {
            query,
            formatted_address,
        }
    }
}

/// Waste streams the city publishes a next pickup for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteStream {
    /// Household garbage cart.
    Garbage,
    /// Recycling cart.
    Recycling,
}

impl WasteStream {
    /// Both streams in display order.
    pub const ALL: [Self; 2] = [Self::Garbage, Self::Recycling];

    /// Lowercase slug used in keys and log lines.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Garbage => "garbage",
            Self::Recycling => "recycling",
        }
    }
}

impl fmt::Display for WasteStream {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.slug())
    }
}

/// Next pickup dates returned by a single poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Next garbage collection, if the page listed a parsable one.
    pub garbage_date: Option<NaiveDate>,
    /// Next recycling collection, if the page listed a parsable one.
    pub recycling_date: Option<NaiveDate>,
}

impl ScheduleResult {
    /// Date for the given stream.
    #[must_use]
    pub fn date_for(&self, stream: WasteStream) -> Option<NaiveDate> {
        match stream {
            WasteStream::Garbage => self.garbage_date,
            WasteStream::Recycling => self.recycling_date,
        }
    }
}
