use serde::{Deserialize, Serialize};

pub const OSF_LOGO_URL: &str = "https://osf.io/static/img/institutions/shields/cos-shield.png";

/// Normalized description of one OSF project, serialized as the mirror's `DATS.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDescription {
    pub title: String,
    /// Children listing of the project's root folder. `None` when the project has no storage.
    pub files: Option<String>,
    pub homepage: String,
    pub creators: Vec<Creator>,
    pub description: String,
    pub version: String,
    pub licenses: Vec<License>,
    pub keywords: Vec<Keyword>,
    pub distributions: Vec<Distribution>,
    pub extra_properties: Vec<ExtraProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub size: f64,
    pub unit: Unit,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    pub landing_page: String,
    pub authorizations: Vec<Authorization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraProperty {
    pub category: String,
    pub values: Vec<PropertyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub value: String,
}

impl DatasetDescription {
    pub fn creator_names(&self) -> Vec<&str> {
        self.creators.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        self.distributions.first()
    }

    /// Replaces the placeholder size with the aggregate byte count of the synced tree.
    pub fn set_distribution_size(&mut self, total_bytes: u64) {
        let (size, unit) = natural_size(total_bytes);
        if let Some(distribution) = self.distributions.first_mut() {
            distribution.size = size;
            distribution.unit.value = unit;
        }
    }
}

impl Distribution {
    pub fn public(landing_page: &str) -> Self {
        Self {
            size: 0.0,
            unit: Unit {
                value: "B".to_string(),
            },
            access: Access {
                landing_page: landing_page.to_string(),
                authorizations: vec![Authorization {
                    value: "public".to_string(),
                }],
            },
        }
    }
}

impl ExtraProperty {
    pub fn osf_logo() -> Self {
        Self {
            category: "logo".to_string(),
            values: vec![PropertyValue {
                value: OSF_LOGO_URL.to_string(),
            }],
        }
    }
}

const DECIMAL_UNITS: [&str; 8] = ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Decimal (powers of 1000) magnitude and unit, rounded to one decimal place.
///
/// Byte counts below one kilobyte stay integral: `1 Byte`, `350 Bytes`.
pub fn natural_size(bytes: u64) -> (f64, String) {
    if bytes == 1 {
        return (1.0, "Byte".to_string());
    }
    if bytes < 1000 {
        return (bytes as f64, "Bytes".to_string());
    }

    let mut value = bytes as f64 / 1000.0;
    let mut unit = DECIMAL_UNITS[0];
    for next in &DECIMAL_UNITS[1..] {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    let rounded = (value * 10.0).round() / 10.0;
    (rounded, unit.to_string())
}

/// Directory name for a mirror, derived from the project title.
pub fn mirror_dir_name(title: &str) -> String {
    let name: String = title
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_start_matches('.');
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name.to_string()
    }
}
