//! Activities, their exchanges, and the process and product labels derived
//! from them

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::record::RawFlowRecord;

/// Kind of activity as declared by the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    #[default]
    Ordinary,
    /// Mixes the supply of one product in one geography
    Market,
    /// Any other declared type, keyed by its numeric code
    Other(u8),
}

impl ActivityType {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Ordinary => "ordinary".to_string(),
            Self::Market => "market".to_string(),
            Self::Other(code) => format!("other({code})"),
        }
    }

    /// Inverse of [`ActivityType::label`]
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "ordinary" => Some(Self::Ordinary),
            "market" => Some(Self::Market),
            other => other
                .strip_prefix("other(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|code| code.parse().ok())
                .map(Self::Other),
        }
    }
}

/// Technology level of an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TechnologyLevel {
    #[default]
    Undefined,
    New,
    Modern,
    Current,
    Old,
    Outdated,
}

impl TechnologyLevel {
    /// Map the numeric level used by ecospold datasets
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::New,
            2 => Self::Modern,
            3 => Self::Current,
            4 => Self::Old,
            5 => Self::Outdated,
            _ => Self::Undefined,
        }
    }

    /// Inverse of [`TechnologyLevel::as_str`]; unknown names are undefined
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "New" => Self::New,
            "Modern" => Self::Modern,
            "Current" => Self::Current,
            "Old" => Self::Old,
            "Outdated" => Self::Outdated,
            _ => Self::Undefined,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::New => "New",
            Self::Modern => "Modern",
            Self::Current => "Current",
            Self::Old => "Old",
            Self::Outdated => "Outdated",
        }
    }
}

/// One exchange listed by an activity dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exchange {
    /// Product consumed, optionally tied to the activity that supplies it
    IntermediateInput {
        source_activity: Option<String>,
        product: String,
        amount: f64,
    },
    /// Product supplied by this activity
    IntermediateOutput {
        product: String,
        amount: f64,
        production_volume: Option<f64>,
    },
    /// Exchange with the environment
    Elementary { exchange_id: String, amount: f64 },
}

impl Exchange {
    #[must_use]
    pub const fn amount(&self) -> f64 {
        match self {
            Self::IntermediateInput { amount, .. }
            | Self::IntermediateOutput { amount, .. }
            | Self::Elementary { amount, .. } => *amount,
        }
    }
}

/// One raw per-activity dataset, as yielded by a record source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_id: String,
    /// Reference product of the dataset
    pub product_id: String,
    pub activity_name: String,
    pub product_name: String,
    #[serde(default)]
    pub isic: Option<String>,
    #[serde(default)]
    pub ecospold_category: Option<String>,
    #[serde(default)]
    pub geography: Option<String>,
    #[serde(default)]
    pub technology_level: TechnologyLevel,
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
}

impl ActivityRecord {
    #[must_use]
    pub fn new(activity_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        let activity_id = activity_id.into();
        let product_id = product_id.into();
        Self {
            activity_name: activity_id.clone(),
            product_name: product_id.clone(),
            activity_id,
            product_id,
            isic: None,
            ecospold_category: None,
            geography: None,
            technology_level: TechnologyLevel::Undefined,
            activity_type: ActivityType::Ordinary,
            unit: None,
            start_date: None,
            end_date: None,
            exchanges: Vec::new(),
        }
    }

    /// Id of the process this dataset describes
    #[must_use]
    pub fn process_id(&self) -> String {
        process_id(&self.activity_id, &self.product_id)
    }

    #[must_use]
    pub fn with_geography(mut self, geography: impl Into<String>) -> Self {
        self.geography = Some(geography.into());
        self
    }

    #[must_use]
    pub fn with_isic(mut self, isic: impl Into<String>) -> Self {
        self.isic = Some(isic.into());
        self
    }

    #[must_use]
    pub const fn with_activity_type(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = activity_type;
        self
    }

    #[must_use]
    pub fn with_output(mut self, product: impl Into<String>, amount: f64, volume: Option<f64>) -> Self {
        self.exchanges.push(Exchange::IntermediateOutput {
            product: product.into(),
            amount,
            production_volume: volume,
        });
        self
    }

    #[must_use]
    pub fn with_input(
        mut self,
        source_activity: Option<&str>,
        product: impl Into<String>,
        amount: f64,
    ) -> Self {
        self.exchanges.push(Exchange::IntermediateInput {
            source_activity: source_activity.map(str::to_string),
            product: product.into(),
            amount,
        });
        self
    }

    #[must_use]
    pub fn with_elementary(mut self, exchange_id: impl Into<String>, amount: f64) -> Self {
        self.exchanges.push(Exchange::Elementary {
            exchange_id: exchange_id.into(),
            amount,
        });
        self
    }
}

/// Id of the process made of an activity and one of its products
#[must_use]
pub fn process_id(activity_id: &str, product_id: &str) -> String {
    format!("{activity_id}_{product_id}")
}

/// Master data describing an elementary exchange id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementaryExchangeRecord {
    pub id: String,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub cas: Option<String>,
    pub comp: String,
    #[serde(default)]
    pub subcomp: Option<String>,
}

impl ElementaryExchangeRecord {
    /// Name observation in the inventory's own scheme
    #[must_use]
    pub fn to_raw(&self, scheme: &str) -> RawFlowRecord {
        RawFlowRecord {
            name: Some(self.name.clone()),
            comp: Some(self.comp.clone()),
            subcomp: self.subcomp.clone(),
            cas: self.cas.clone(),
            unit: Some(self.unit.clone()),
            scheme: scheme.to_string(),
            source_id: Some(self.id.clone()),
            ..RawFlowRecord::default()
        }
    }
}

/// A raw characterisation record: one factor for one named flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterisationRecord {
    pub name: Option<String>,
    #[serde(default)]
    pub name2: Option<String>,
    #[serde(default)]
    pub cas: Option<String>,
    pub unit: String,
    pub comp: String,
    #[serde(default)]
    pub subcomp: Option<String>,
    pub impact: String,
    pub method: String,
    pub value: f64,
    /// Scheme that spelled `name`
    pub scheme: String,
    /// Scheme that spelled `name2`
    #[serde(default)]
    pub alt_scheme: Option<String>,
}

impl CharacterisationRecord {
    #[must_use]
    pub fn to_raw(&self) -> RawFlowRecord {
        RawFlowRecord {
            name: self.name.clone(),
            name2: self.name2.clone(),
            comp: Some(self.comp.clone()),
            subcomp: self.subcomp.clone(),
            cas: self.cas.clone(),
            unit: Some(self.unit.clone()),
            value: Some(self.value),
            scheme: self.scheme.clone(),
            alt_scheme: self.alt_scheme.clone(),
            impact: Some(self.impact.clone()),
            method: Some(self.method.clone()),
            ..RawFlowRecord::default()
        }
    }
}

/// Process row label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: String,
    pub activity_id: String,
    pub product_id: String,
    pub activity_name: String,
    pub product_name: String,
    pub isic: Option<String>,
    pub ecospold_category: Option<String>,
    pub geography: Option<String>,
    pub technology_level: String,
    pub activity_type: String,
    pub unit: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(skip)]
    pub is_market: bool,
}

impl From<&ActivityRecord> for Process {
    fn from(record: &ActivityRecord) -> Self {
        Self {
            id: record.process_id(),
            activity_id: record.activity_id.clone(),
            product_id: record.product_id.clone(),
            activity_name: record.activity_name.clone(),
            product_name: record.product_name.clone(),
            isic: record.isic.clone(),
            ecospold_category: record.ecospold_category.clone(),
            geography: record.geography.clone(),
            technology_level: record.technology_level.as_str().to_string(),
            activity_type: record.activity_type.label(),
            unit: record.unit.clone(),
            start_date: record.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            end_date: record.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            is_market: record.activity_type == ActivityType::Market,
        }
    }
}

/// Product column label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub unit: Option<String>,
}
