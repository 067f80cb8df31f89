//! Where parsed records come from
//!
//! Parsing the ecospold XML itself happens upstream; a [`RecordSource`]
//! yields the already-parsed activity datasets, elementary exchange master
//! data and characterisation records, together with a fingerprint of what
//! it read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::util::{safe_read_to_string, validate_directory};
use crate::error::Result;
use crate::models::{ActivityRecord, CharacterisationRecord, ElementaryExchangeRecord};
use crate::utils::hashing::{fingerprint_bytes, fingerprint_directory};

/// Every record a run needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub activities: Vec<ActivityRecord>,
    pub elementary: Vec<ElementaryExchangeRecord>,
    pub characterisation: Vec<CharacterisationRecord>,
}

impl SourceData {
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.activities.len() + self.elementary.len() + self.characterisation.len()
    }
}

/// A provider of parsed records
pub trait RecordSource {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Content fingerprint; equal fingerprints mean equal records
    fn fingerprint(&self) -> Result<String>;

    fn load(&self) -> Result<SourceData>;
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    data: SourceData,
}

impl InMemorySource {
    #[must_use]
    pub const fn new(data: SourceData) -> Self {
        Self { data }
    }
}

impl RecordSource for InMemorySource {
    fn describe(&self) -> String {
        format!("{} in-memory records", self.data.record_count())
    }

    fn fingerprint(&self) -> Result<String> {
        Ok(fingerprint_bytes(&serde_json::to_vec(&self.data)?))
    }

    fn load(&self) -> Result<SourceData> {
        Ok(self.data.clone())
    }
}

/// A directory holding `activities.json`, `elementary.json` and an optional
/// `characterisation.json`
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    dir: PathBuf,
    fingerprint: Option<String>,
}

impl JsonDirectorySource {
    pub const ACTIVITIES: &'static str = "activities.json";
    pub const ELEMENTARY: &'static str = "elementary.json";
    pub const CHARACTERISATION: &'static str = "characterisation.json";

    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fingerprint: None,
        }
    }

    /// Use a fingerprint already computed for this directory, e.g. by
    /// [`crate::async_io::fingerprint_directory_async`], instead of hashing
    /// it again
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str, required: bool) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        if !required && !path.exists() {
            log::info!("{} not present; no records of that kind", path.display());
            return Ok(Vec::new());
        }
        let text = safe_read_to_string(&path, "source records")?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl RecordSource for JsonDirectorySource {
    fn describe(&self) -> String {
        format!("JSON records in {}", self.dir.display())
    }

    fn fingerprint(&self) -> Result<String> {
        match &self.fingerprint {
            Some(known) => Ok(known.clone()),
            None => fingerprint_directory(&self.dir),
        }
    }

    fn load(&self) -> Result<SourceData> {
        validate_directory(&self.dir, "source records")?;
        let data = SourceData {
            activities: self.read(Self::ACTIVITIES, true)?,
            elementary: self.read(Self::ELEMENTARY, true)?,
            characterisation: self.read(Self::CHARACTERISATION, false)?,
        };
        log::info!(
            "Loaded {} activities, {} elementary exchanges and {} characterisation records from {}",
            data.activities.len(),
            data.elementary.len(),
            data.characterisation.len(),
            self.dir.display()
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        let activities = vec![ActivityRecord::new("mine", "ore").with_output("ore", 1.0, None)];
        std::fs::write(
            dir.path().join(JsonDirectorySource::ACTIVITIES),
            serde_json::to_string(&activities).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join(JsonDirectorySource::ELEMENTARY), "[]").unwrap();

        let source = JsonDirectorySource::new(dir.path());
        let data = source.load().unwrap();
        assert_eq!(data.activities, activities);
        assert!(data.characterisation.is_empty());

        let before = source.fingerprint().unwrap();
        std::fs::write(dir.path().join(JsonDirectorySource::ELEMENTARY), "[ ]").unwrap();
        assert_ne!(before, source.fingerprint().unwrap());
    }

    #[test]
    fn test_missing_activities_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonDirectorySource::new(dir.path()).load().is_err());
    }
}
