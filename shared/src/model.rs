use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Money fields arrive either as JSON numbers or as decimal strings
/// such as `"1200.00"`.
pub(crate) mod decimal {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    fn parse<E: Error>(raw: Raw) -> Result<Option<f64>, E> {
        match raw {
            Raw::Number(n) => Ok(Some(n)),
            Raw::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                text.parse()
                    .map(Some)
                    .map_err(|_| E::custom(format!("invalid decimal {text:?}")))
            }
        }
    }

    pub fn optional<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            Some(raw) => parse(raw),
            None => Ok(None),
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(optional(d)?.unwrap_or_default())
    }
}

/// A record shown in one of the list screens. Identity is the id, every
/// other field is a replaceable snapshot of server state.
pub trait ListItem: Clone + Send + Sync + 'static {
    fn id(&self) -> ItemId;

    /// Short text used in dialogs and toasts.
    fn label(&self) -> String;
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Cancelled,
        Self::Completed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Booking {
    pub id: ItemId,
    #[serde(default)]
    pub property: Option<ItemId>,
    #[serde(default)]
    pub property_title: String,
    #[serde(default)]
    pub guest_name: String,
    #[serde(default)]
    pub guest_email: String,
    #[serde(default)]
    pub guest_phone: String,
    #[serde(default)]
    pub check_in: Option<NaiveDate>,
    #[serde(default)]
    pub check_out: Option<NaiveDate>,
    #[serde(default)]
    pub guests: u32,
    #[serde(default, deserialize_with = "decimal::optional")]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Nights between check-in and check-out, when both are known.
    pub fn nights(&self) -> Option<i64> {
        match (self.check_in, self.check_out) {
            (Some(check_in), Some(check_out)) if check_out > check_in => {
                Some((check_out - check_in).num_days())
            }
            _ => None,
        }
    }
}

impl ListItem for Booking {
    fn id(&self) -> ItemId {
        self.id
    }

    fn label(&self) -> String {
        if self.guest_name.is_empty() {
            format!("Booking #{}", self.id)
        } else {
            format!("Booking #{} ({})", self.id, self.guest_name)
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Agent {
    pub id: ItemId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub role: String,
}

fn default_true() -> bool {
    true
}

impl Agent {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }
}

impl ListItem for Agent {
    fn id(&self) -> ItemId {
        self.id
    }

    fn label(&self) -> String {
        self.full_name()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    #[default]
    Rent,
    Sale,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Property {
    pub id: ItemId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "decimal::optional")]
    pub price: Option<f64>,
    #[serde(default)]
    pub listing_type: ListingType,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    /// Assigned agent's user id.
    #[serde(default)]
    pub agent: Option<ItemId>,
}

impl ListItem for Property {
    fn id(&self) -> ItemId {
        self.id
    }

    fn label(&self) -> String {
        if self.title.is_empty() {
            format!("Property #{}", self.id)
        } else {
            self.title.clone()
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Faq {
    pub id: ItemId,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl ListItem for Faq {
    fn id(&self) -> ItemId {
        self.id
    }

    fn label(&self) -> String {
        self.question.clone()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Review {
    pub id: ItemId,
    #[serde(default)]
    pub property: Option<ItemId>,
    #[serde(default)]
    pub property_title: String,
    #[serde(default)]
    pub reviewer_name: String,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ListItem for Review {
    fn id(&self) -> ItemId {
        self.id
    }

    fn label(&self) -> String {
        if self.reviewer_name.is_empty() {
            format!("Review #{}", self.id)
        } else {
            format!("Review by {}", self.reviewer_name)
        }
    }
}

/// Items whose moderation status can be changed from a list screen.
pub trait HasStatus: ListItem {
    type Status: Copy + PartialEq + Serialize + fmt::Display + Send + Sync + 'static;

    fn status(&self) -> Self::Status;
    fn set_status(&mut self, status: Self::Status);
}

impl HasStatus for Booking {
    type Status = BookingStatus;

    fn status(&self) -> BookingStatus {
        self.status
    }

    fn set_status(&mut self, status: BookingStatus) {
        self.status = status;
    }
}

impl HasStatus for Review {
    type Status = ReviewStatus;

    fn status(&self) -> ReviewStatus {
        self.status
    }

    fn set_status(&mut self, status: ReviewStatus) {
        self.status = status;
    }
}
