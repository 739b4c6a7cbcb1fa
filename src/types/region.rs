//! Region and canonical state types

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};

/// Number of regions tracked for the whole process lifetime
pub const REGION_COUNT: usize = 25;

/// Native and international names of every tracked region, in list order.
/// Region ids are 1-based positions in this table.
const REGION_NAMES: [(&str, &str); REGION_COUNT] = [
    ("Вінницька область", "Vinnytsia oblast"),
    ("Волинська область", "Volyn oblast"),
    ("Дніпропетровська область", "Dnipropetrovsk oblast"),
    ("Донецька область", "Donetsk oblast"),
    ("Житомирська область", "Zhytomyr oblast"),
    ("Закарпатська область", "Zakarpattia oblast"),
    ("Запорізька область", "Zaporizhzhia oblast"),
    ("Івано-Франківська область", "Ivano-Frankivsk oblast"),
    ("Київська область", "Kyiv oblast"),
    ("Кіровоградська область", "Kirovohrad oblast"),
    ("Луганська область", "Luhansk oblast"),
    ("Львівська область", "Lviv oblast"),
    ("Миколаївська область", "Mykolaiv oblast"),
    ("Одеська область", "Odesa oblast"),
    ("Полтавська область", "Poltava oblast"),
    ("Рівненська область", "Rivne oblast"),
    ("Сумська область", "Sumy oblast"),
    ("Тернопільська область", "Ternopil oblast"),
    ("Харківська область", "Kharkiv oblast"),
    ("Херсонська область", "Kherson oblast"),
    ("Хмельницька область", "Khmelnytskyi oblast"),
    ("Черкаська область", "Cherkasy oblast"),
    ("Чернівецька область", "Chernivtsi oblast"),
    ("Чернігівська область", "Chernihiv oblast"),
    ("м. Київ", "Kyiv"),
];

/// One administrative area tracked for alert status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: u32,
    #[serde(rename = "name")]
    pub native_name: String,
    #[serde(rename = "name_en")]
    pub intl_name: String,
    pub alert: bool,
    /// When the alert flag last changed, in the configured timezone
    #[serde(rename = "changed")]
    pub changed_at: Option<DateTime<FixedOffset>>,
}

impl Region {
    /// Create a region with no alert and no recorded change
    pub fn new(id: u32, native_name: impl Into<String>, intl_name: impl Into<String>) -> Self {
        Self {
            id,
            native_name: native_name.into(),
            intl_name: intl_name.into(),
            alert: false,
            changed_at: None,
        }
    }
}

/// The fixed region table every fresh process starts from
pub fn default_regions() -> Vec<Region> {
    REGION_NAMES
        .iter()
        .zip(1u32..)
        .map(|(&(native, intl), id)| Region::new(id, native, intl))
        .collect()
}

/// Process-wide alert state: the region table plus feed bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalState {
    #[serde(rename = "states", default)]
    pub regions: Vec<Region>,
    /// Wall-clock time of the last successful feed poll
    #[serde(default)]
    pub last_update: DateTime<Utc>,
    /// Highest feed message id already processed
    #[serde(rename = "last_message_id", default, deserialize_with = "deserialize_cursor")]
    pub last_cursor: Option<i64>,
}

/// Message ids start at 1; a stored `0` means no message was processed yet
fn deserialize_cursor<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.filter(|id| *id > 0))
}

impl Default for CanonicalState {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            last_update: DateTime::<Utc>::default(),
            last_cursor: None,
        }
    }
}

impl CanonicalState {
    /// Find a region by id
    pub fn find_region(&self, id: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Re-seed the region table if a loaded state carried none
    pub fn ensure_regions(&mut self) {
        if self.regions.is_empty() {
            self.regions = default_regions();
        }
    }
}

/// Canonical state shared between the updater (sole writer) and readers
pub type SharedState = Arc<RwLock<CanonicalState>>;
