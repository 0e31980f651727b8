use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

use crate::RemoteError;

/// Country id used when a region code is not in the table (United States).
pub const FALLBACK_COUNTRY_ID: &str = "78";

const DEFAULT_COUNTRIES: [(&str, &str); 18] = [
    ("AU", "23"),
    ("BR", "29"),
    ("CA", "33"),
    ("FR", "45"),
    ("DE", "39"),
    ("GR", "327"),
    ("HK", "331"),
    ("IS", "265"),
    ("IN", "337"),
    ("IT", "269"),
    ("JP", "267"),
    ("NL", "67"),
    ("SK", "412"),
    ("KR", "348"),
    ("ES", "270"),
    ("SE", "73"),
    ("GB", "46"),
    ("US", "78"),
];

/// Maps two-letter region codes to the catalog's numeric country ids.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CountryTable {
    ids: HashMap<String, String>,
}

impl Default for CountryTable {
    fn default() -> Self {
        DEFAULT_COUNTRIES
            .iter()
            .map(|(code, id)| (code.to_string(), id.to_string()))
            .collect()
    }
}

impl FromIterator<(String, String)> for CountryTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl CountryTable {
    /// Look up the catalog id for `country_code`, falling back to the US id.
    pub fn country_id(&self, country_code: &str) -> String {
        match self.ids.get(country_code) {
            Some(id) => id.clone(),
            None => {
                warn!(country_code, "Country code not found, using fallback");
                FALLBACK_COUNTRY_ID.to_string()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn split_addresses<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(parse_address_list(&raw))
}

/// Split a comma-separated address list, dropping blanks.
pub fn parse_address_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Read-only integration configuration, supplied once at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub entity_id: String,
    #[serde(default)]
    pub adb_server_address: String,
    #[serde(default, deserialize_with = "split_addresses")]
    pub firetv_address_list: Vec<String>,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub netflix_country_code: String,
    #[serde(default)]
    pub country_table: CountryTable,
}

impl RemoteConfig {
    pub fn new(
        entity_id: &str,
        adb_server_address: &str,
        firetv_addresses: &str,
        api_token: &str,
        country_code: &str,
    ) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            adb_server_address: adb_server_address.to_string(),
            firetv_address_list: parse_address_list(firetv_addresses),
            api_token: api_token.to_string(),
            netflix_country_code: country_code.to_string(),
            country_table: CountryTable::default(),
        }
    }

    /// Replace the country lookup table.
    pub fn with_country_table(mut self, table: CountryTable) -> Self {
        self.country_table = table;
        self
    }

    /// Build a config from the host's JSON, accepting the fields either at the
    /// top level or nested under `data`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RemoteError> {
        let inner = match value {
            serde_json::Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or_default()
            }
            other => other,
        };
        let config: RemoteConfig = serde_json::from_value(inner)?;
        if config.entity_id.is_empty() {
            return Err(RemoteError::InvalidConfig("entity_id is empty".to_string()));
        }
        Ok(config)
    }

    pub fn has_credential(&self) -> bool {
        !self.api_token.trim().is_empty()
    }

    pub fn country_id(&self) -> String {
        self.country_table.country_id(&self.netflix_country_code)
    }
}
