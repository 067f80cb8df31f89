//! Fingerprint-keyed cache of parsed records
//!
//! A cache entry is a directory `<root>/<fingerprint>/` with one Parquet
//! file per record kind. Activity datasets are stored flat: one table of
//! dataset attributes and one table of exchanges keyed by dataset and
//! position.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::error::util::ensure_directory;
use crate::error::{LciError, Result};
use crate::models::{ActivityRecord, ActivityType, CharacterisationRecord, ElementaryExchangeRecord, Exchange, TechnologyLevel};
use crate::source::SourceData;
use crate::utils::io::{read_parquet, write_parquet};
use crate::utils::logging::{log_stage_complete, log_stage_start};

pub const ACTIVITIES_FILE: &str = "activities.parquet";
pub const EXCHANGES_FILE: &str = "exchanges.parquet";
pub const ELEMENTARY_FILE: &str = "elementary.parquet";
pub const CHARACTERISATION_FILE: &str = "characterisation.parquet";

/// Files making up one cache entry
pub const ENTRY_FILES: [&str; 4] = [ACTIVITIES_FILE, EXCHANGES_FILE, ELEMENTARY_FILE, CHARACTERISATION_FILE];

/// Dataset attributes, one row per activity dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
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
}

/// One exchange of one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRow {
    pub activity_id: String,
    pub product_id: String,
    pub position: u32,
    /// `input`, `output` or `elementary`
    pub kind: String,
    pub product: Option<String>,
    pub source_activity: Option<String>,
    pub exchange_id: Option<String>,
    pub amount: f64,
    pub production_volume: Option<f64>,
}

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map_err(|e| LciError::Cache(format!("invalid date '{s}': {e}")))
    })
    .transpose()
}

/// Split activity datasets into attribute and exchange rows
pub fn flatten_activities(activities: &[ActivityRecord]) -> Result<(Vec<ActivityRow>, Vec<ExchangeRow>)> {
    let mut rows = Vec::with_capacity(activities.len());
    let mut exchanges = Vec::new();
    for a in activities {
        rows.push(ActivityRow {
            activity_id: a.activity_id.clone(),
            product_id: a.product_id.clone(),
            activity_name: a.activity_name.clone(),
            product_name: a.product_name.clone(),
            isic: a.isic.clone(),
            ecospold_category: a.ecospold_category.clone(),
            geography: a.geography.clone(),
            technology_level: a.technology_level.as_str().to_string(),
            activity_type: a.activity_type.label(),
            unit: a.unit.clone(),
            start_date: format_date(a.start_date),
            end_date: format_date(a.end_date),
        });
        for (i, exchange) in a.exchanges.iter().enumerate() {
            let position = u32::try_from(i)
                .map_err(|_| LciError::Cache(format!("too many exchanges in {}", a.process_id())))?;
            let mut row = ExchangeRow {
                activity_id: a.activity_id.clone(),
                product_id: a.product_id.clone(),
                position,
                kind: String::new(),
                product: None,
                source_activity: None,
                exchange_id: None,
                amount: exchange.amount(),
                production_volume: None,
            };
            match exchange {
                Exchange::IntermediateInput { source_activity, product, .. } => {
                    row.kind = "input".to_string();
                    row.product = Some(product.clone());
                    row.source_activity.clone_from(source_activity);
                }
                Exchange::IntermediateOutput { product, production_volume, .. } => {
                    row.kind = "output".to_string();
                    row.product = Some(product.clone());
                    row.production_volume = *production_volume;
                }
                Exchange::Elementary { exchange_id, .. } => {
                    row.kind = "elementary".to_string();
                    row.exchange_id = Some(exchange_id.clone());
                }
            }
            exchanges.push(row);
        }
    }
    Ok((rows, exchanges))
}

fn exchange_from_row(row: ExchangeRow) -> Result<Exchange> {
    let missing = |field: &str| {
        LciError::Cache(format!(
            "{} exchange {} of {}_{} lacks {field}",
            row.kind, row.position, row.activity_id, row.product_id
        ))
    };
    match row.kind.as_str() {
        "input" => Ok(Exchange::IntermediateInput {
            product: row.product.clone().ok_or_else(|| missing("product"))?,
            source_activity: row.source_activity.clone(),
            amount: row.amount,
        }),
        "output" => Ok(Exchange::IntermediateOutput {
            product: row.product.clone().ok_or_else(|| missing("product"))?,
            amount: row.amount,
            production_volume: row.production_volume,
        }),
        "elementary" => Ok(Exchange::Elementary {
            exchange_id: row.exchange_id.clone().ok_or_else(|| missing("exchange_id"))?,
            amount: row.amount,
        }),
        other => Err(LciError::Cache(format!("unknown exchange kind '{other}'"))),
    }
}

/// Reassemble activity datasets, keeping dataset and exchange order
pub fn assemble_activities(rows: Vec<ActivityRow>, exchanges: Vec<ExchangeRow>) -> Result<Vec<ActivityRecord>> {
    let mut by_dataset: FxHashMap<(String, String), Vec<ExchangeRow>> = FxHashMap::default();
    for row in exchanges {
        by_dataset
            .entry((row.activity_id.clone(), row.product_id.clone()))
            .or_default()
            .push(row);
    }
    rows.into_iter()
        .map(|row| {
            let mut listed = by_dataset
                .remove(&(row.activity_id.clone(), row.product_id.clone()))
                .unwrap_or_default();
            listed.sort_by_key(|e| e.position);
            Ok(ActivityRecord {
                exchanges: listed.into_iter().map(exchange_from_row).collect::<Result<_>>()?,
                activity_type: ActivityType::from_label(&row.activity_type).ok_or_else(|| {
                    LciError::Cache(format!("unknown activity type '{}'", row.activity_type))
                })?,
                technology_level: TechnologyLevel::from_name(&row.technology_level),
                start_date: parse_date(row.start_date.as_deref())?,
                end_date: parse_date(row.end_date.as_deref())?,
                activity_id: row.activity_id,
                product_id: row.product_id,
                activity_name: row.activity_name,
                product_name: row.product_name,
                isic: row.isic,
                ecospold_category: row.ecospold_category,
                geography: row.geography,
                unit: row.unit,
            })
        })
        .collect()
}

/// Encode rows as a record batch
pub fn rows_to_batch<T>(rows: &[T]) -> Result<RecordBatch>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default().allow_null_fields(true))?;
    Ok(serde_arrow::to_record_batch(&fields, &rows)?)
}

/// Decode rows from record batches
pub fn rows_from_batches<T>(batches: &[RecordBatch]) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut rows = Vec::new();
    for batch in batches {
        rows.extend(serde_arrow::from_record_batch::<Vec<T>>(batch)?);
    }
    Ok(rows)
}

/// Decoded contents of the four files of an entry, in [`ENTRY_FILES`] order
pub fn decode_entry(batches: [Vec<RecordBatch>; 4]) -> Result<SourceData> {
    let [activities, exchanges, elementary, characterisation] = batches;
    Ok(SourceData {
        activities: assemble_activities(rows_from_batches(&activities)?, rows_from_batches(&exchanges)?)?,
        elementary: rows_from_batches::<ElementaryExchangeRecord>(&elementary)?,
        characterisation: rows_from_batches::<CharacterisationRecord>(&characterisation)?,
    })
}

/// Parsed records stored under their source fingerprint
#[derive(Debug, Clone)]
pub struct IntermediateCache {
    root: PathBuf,
}

impl IntermediateCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn entry_dir(&self, fingerprint: &str) -> PathBuf {
        self.root.join(fingerprint)
    }

    /// True if every file of the entry exists
    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        let dir = self.entry_dir(fingerprint);
        ENTRY_FILES.iter().all(|f| dir.join(f).is_file())
    }

    /// Write an entry, replacing any previous one
    pub fn store(&self, fingerprint: &str, data: &SourceData) -> Result<PathBuf> {
        let start = Instant::now();
        let dir = self.entry_dir(fingerprint);
        ensure_directory(&dir, "intermediate cache")?;
        let (activities, exchanges) = flatten_activities(&data.activities)?;
        write_parquet(&dir.join(ACTIVITIES_FILE), &rows_to_batch(&activities)?)?;
        write_parquet(&dir.join(EXCHANGES_FILE), &rows_to_batch(&exchanges)?)?;
        write_parquet(&dir.join(ELEMENTARY_FILE), &rows_to_batch(&data.elementary)?)?;
        write_parquet(&dir.join(CHARACTERISATION_FILE), &rows_to_batch(&data.characterisation)?)?;
        log_stage_complete("Cached", data.record_count(), start.elapsed());
        Ok(dir)
    }

    /// Read an entry; `Ok(None)` when the fingerprint is not cached
    pub fn load(&self, fingerprint: &str) -> Result<Option<SourceData>> {
        if !self.contains(fingerprint) {
            return Ok(None);
        }
        let dir = self.entry_dir(fingerprint);
        log_stage_start("Reading cached records", ENTRY_FILES.len());
        let read = |file: &str| read_parquet(&dir.join(file));
        let batches = [
            read(ACTIVITIES_FILE)?,
            read(EXCHANGES_FILE)?,
            read(ELEMENTARY_FILE)?,
            read(CHARACTERISATION_FILE)?,
        ];
        decode_entry(batches).map(Some)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
