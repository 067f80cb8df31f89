//! Persisting matrices, label tables and the run manifest
//!
//! Every matrix can be written as a dense Parquet table, a sparse Parquet
//! table of `(row, col, value)` triplets, or an Arrow IPC file of index
//! triplets that carries its labels in the schema metadata. All three hold
//! the same numbers; undefined cells are written as NaN.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::config::{OutputFormat, PipelineConfig};
use crate::error::util::{ensure_directory, safe_create_file, safe_open_file, safe_read_to_string};
use crate::error::{LciError, Result};
use crate::matrix::{LabelledMatrix, Triplet};
use crate::utils::hashing::fingerprint_file;
use crate::utils::io::{read_parquet, write_parquet};
use crate::utils::logging::log_artifact;

/// File name of the run manifest inside the output directory
pub const MANIFEST_FILE: &str = "manifest.json";

const ROW_LABEL_COLUMN: &str = "row_label";
const META_NAME: &str = "lci:name";
const META_ROWS: &str = "lci:row_labels";
const META_COLS: &str = "lci:col_labels";
const META_UNDEFINED: &str = "lci:undefined_columns";

/// One persisted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Path relative to the output directory
    pub file: String,
    /// Matrix or table name
    pub artifact: String,
    pub format: String,
    pub sha256: String,
    pub shape: Option<(usize, usize)>,
}

/// Index of everything a run wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub project: String,
    pub mode: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// Fingerprint of the source records the run read
    pub source_fingerprint: Option<String>,
    pub artifacts: Vec<ArtifactEntry>,
}

impl Manifest {
    /// Read the manifest of an output directory
    pub fn load(out_dir: &Path) -> Result<Self> {
        let text = safe_read_to_string(&out_dir.join(MANIFEST_FILE), "manifest")?;
        Ok(serde_json::from_str(&text)?)
    }

    #[must_use]
    pub fn artifact(&self, file: &str) -> Option<&ArtifactEntry> {
        self.artifacts.iter().find(|a| a.file == file)
    }
}

/// Writes the artifacts of one run and records them for the manifest
#[derive(Debug)]
pub struct Exporter {
    out_dir: PathBuf,
    project: String,
    formats: BTreeSet<OutputFormat>,
    entries: Vec<ArtifactEntry>,
}

impl Exporter {
    /// Create an exporter writing into `config.out_dir`
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        ensure_directory(&config.out_dir, "output")?;
        Ok(Self {
            out_dir: config.out_dir.clone(),
            project: config.project_name.clone(),
            formats: config.output_formats.clone(),
            entries: Vec::new(),
        })
    }

    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write a matrix in every configured format
    pub fn save_matrix(&mut self, matrix: &LabelledMatrix) -> Result<()> {
        for format in self.formats.clone() {
            let file = format!("{}_{}.{}", self.project, matrix.name(), format.suffix());
            let path = self.out_dir.join(&file);
            match format {
                OutputFormat::DenseTable => write_parquet(&path, &dense_batch(matrix)?)?,
                OutputFormat::SparseTable => write_parquet(&path, &sparse_batch(matrix)?)?,
                OutputFormat::BinaryMatrix => write_binary_matrix(&path, matrix)?,
            }
            self.record(&file, matrix.name(), &format!("{format:?}"), Some(matrix.shape()))?;
        }
        Ok(())
    }

    /// Write a label table as Parquet
    pub fn save_labels<T>(&mut self, name: &str, rows: &[T]) -> Result<()>
    where
        T: Serialize + for<'de> Deserialize<'de>,
    {
        let file = format!("{}_{name}_labels.parquet", self.project);
        let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default().allow_null_fields(true))?;
        let batch = serde_arrow::to_record_batch(&fields, &rows)?;
        write_parquet(&self.out_dir.join(&file), &batch)?;
        self.record(&file, name, "labels", None)
    }

    /// Write any serializable value as pretty JSON
    pub fn save_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let file = format!("{}_{name}.json", self.project);
        let writer = safe_create_file(&self.out_dir.join(&file), "writing JSON artifact")?;
        serde_json::to_writer_pretty(writer, value)?;
        self.record(&file, name, "json", None)
    }

    /// Write the manifest listing every recorded artifact
    pub fn finish(self, mode: &str, source_fingerprint: Option<String>) -> Result<Manifest> {
        let manifest = Manifest {
            project: self.project,
            mode: mode.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            source_fingerprint,
            artifacts: self.entries,
        };
        let path = self.out_dir.join(MANIFEST_FILE);
        let writer = safe_create_file(&path, "writing manifest")?;
        serde_json::to_writer_pretty(writer, &manifest)?;
        log::info!(
            "Manifest with {} artifact(s) written to {}",
            manifest.artifacts.len(),
            path.display()
        );
        Ok(manifest)
    }

    fn record(&mut self, file: &str, artifact: &str, format: &str, shape: Option<(usize, usize)>) -> Result<()> {
        let path = self.out_dir.join(file);
        let sha256 = fingerprint_file(&path)?;
        log_artifact(artifact, &path, &sha256);
        self.entries.push(ArtifactEntry {
            file: file.to_string(),
            artifact: artifact.to_string(),
            format: format.to_string(),
            sha256,
            shape,
        });
        Ok(())
    }
}

/// Recompute the fingerprint of every artifact listed in the manifest of
/// `out_dir`; returns the files that are missing or changed
pub fn verify_manifest(out_dir: &Path) -> Result<Vec<String>> {
    let manifest = Manifest::load(out_dir)?;
    let mut mismatched = Vec::new();
    for entry in &manifest.artifacts {
        let path = out_dir.join(&entry.file);
        match fingerprint_file(&path) {
            Ok(digest) if digest == entry.sha256 => {}
            Ok(_) => {
                log::warn!("Fingerprint of {} changed", entry.file);
                mismatched.push(entry.file.clone());
            }
            Err(e) => {
                log::warn!("Cannot verify {}: {e}", entry.file);
                mismatched.push(entry.file.clone());
            }
        }
    }
    Ok(mismatched)
}

fn dense_batch(matrix: &LabelledMatrix) -> Result<RecordBatch> {
    let dense = matrix.to_dense();
    let mut fields = vec![Field::new(ROW_LABEL_COLUMN, DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(matrix.row_labels().to_vec()))];
    for (j, label) in matrix.col_labels().iter().enumerate() {
        fields.push(Field::new(label, DataType::Float64, false));
        let values: Float64Array = dense.iter().map(|row| Some(row[j])).collect();
        columns.push(Arc::new(values));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn sparse_batch(matrix: &LabelledMatrix) -> Result<RecordBatch> {
    let triplets: Vec<Triplet> = matrix
        .cells()
        .into_iter()
        .map(|(r, c, value)| Triplet {
            row: matrix.row_labels()[r].clone(),
            col: matrix.col_labels()[c].clone(),
            value,
        })
        .collect();
    let fields = Vec::<FieldRef>::from_type::<Triplet>(TracingOptions::default())?;
    Ok(serde_arrow::to_record_batch(&fields, &triplets)?)
}

fn label_metadata(matrix: &LabelledMatrix) -> Result<HashMap<String, String>> {
    let undefined: Vec<usize> = matrix.undefined_columns().collect();
    Ok(HashMap::from([
        (META_NAME.to_string(), matrix.name().to_string()),
        (META_ROWS.to_string(), serde_json::to_string(matrix.row_labels())?),
        (META_COLS.to_string(), serde_json::to_string(matrix.col_labels())?),
        (META_UNDEFINED.to_string(), serde_json::to_string(&undefined)?),
    ]))
}

fn write_binary_matrix(path: &Path, matrix: &LabelledMatrix) -> Result<()> {
    let schema = Arc::new(
        Schema::new(vec![
            Field::new("row", DataType::UInt32, false),
            Field::new("col", DataType::UInt32, false),
            Field::new("value", DataType::Float64, false),
        ])
        .with_metadata(label_metadata(matrix)?),
    );
    let cells = matrix.cells();
    let index = |i: usize| {
        u32::try_from(i).map_err(|_| LciError::Export(format!("{} is too large for u32 indices", matrix.name())))
    };
    let rows = cells.iter().map(|(r, _, _)| index(*r)).collect::<Result<Vec<u32>>>()?;
    let cols = cells.iter().map(|(_, c, _)| index(*c)).collect::<Result<Vec<u32>>>()?;
    let values: Vec<f64> = cells.iter().map(|(_, _, v)| *v).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(UInt32Array::from(rows)),
            Arc::new(UInt32Array::from(cols)),
            Arc::new(Float64Array::from(values)),
        ],
    )?;

    let file = safe_create_file(path, "writing binary matrix")?;
    let mut writer = FileWriter::try_new(file, &schema)?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}

fn metadata_json<T: for<'de> Deserialize<'de>>(metadata: &HashMap<String, String>, key: &str) -> Result<T> {
    let raw = metadata
        .get(key)
        .ok_or_else(|| LciError::Export(format!("binary matrix lacks metadata {key}")))?;
    Ok(serde_json::from_str(raw)?)
}

fn column<'b, A: Array + 'static>(batch: &'b RecordBatch, i: usize, what: &str) -> Result<&'b A> {
    batch
        .column(i)
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| LciError::Export(format!("unexpected type for column {what}")))
}

/// Read a matrix written in the binary format
pub fn read_binary_matrix(path: &Path) -> Result<LabelledMatrix> {
    let file = safe_open_file(path, "reading binary matrix")?;
    let reader = FileReader::try_new(file, None)?;
    let schema = reader.schema();
    let metadata = schema.metadata();
    let name: String = metadata
        .get(META_NAME)
        .cloned()
        .ok_or_else(|| LciError::Export("binary matrix lacks a name".to_string()))?;
    let mut matrix = LabelledMatrix::new(
        name,
        metadata_json(metadata, META_ROWS)?,
        metadata_json(metadata, META_COLS)?,
    )?;
    let undefined: BTreeSet<usize> = metadata_json(metadata, META_UNDEFINED)?;

    for batch in reader {
        let batch = batch?;
        let rows = column::<UInt32Array>(&batch, 0, "row")?;
        let cols = column::<UInt32Array>(&batch, 1, "col")?;
        let values = column::<Float64Array>(&batch, 2, "value")?;
        for i in 0..batch.num_rows() {
            let col = cols.value(i) as usize;
            if !undefined.contains(&col) {
                matrix.set_at(rows.value(i) as usize, col, values.value(i));
            }
        }
    }
    for col in undefined {
        matrix.mark_undefined(col);
    }
    Ok(matrix)
}

/// Read a matrix written as a dense table. A column holding only NaN is
/// read back as undefined.
pub fn read_dense_table(path: &Path, name: &str) -> Result<LabelledMatrix> {
    let batches = read_parquet(path)?;
    let Some(first) = batches.first() else {
        return Err(LciError::Export(format!("{} holds no data", path.display())));
    };
    let col_labels: Vec<String> = first
        .schema()
        .fields()
        .iter()
        .skip(1)
        .map(|f| f.name().clone())
        .collect();
    let mut row_labels = Vec::new();
    for batch in &batches {
        let labels = column::<StringArray>(batch, 0, ROW_LABEL_COLUMN)?;
        row_labels.extend((0..labels.len()).map(|i| labels.value(i).to_string()));
    }
    let mut matrix = LabelledMatrix::new(name, row_labels, col_labels)?;
    let (n_rows, n_cols) = matrix.shape();

    let mut nan_count = vec![0usize; n_cols];
    let mut offset = 0;
    for batch in &batches {
        for j in 0..n_cols {
            let values = column::<Float64Array>(batch, j + 1, "value")?;
            for i in 0..values.len() {
                let v = values.value(i);
                if v.is_nan() {
                    nan_count[j] += 1;
                }
                if v != 0.0 {
                    matrix.set_at(offset + i, j, v);
                }
            }
        }
        offset += batch.num_rows();
    }
    for (j, count) in nan_count.into_iter().enumerate() {
        if n_rows > 0 && count == n_rows {
            matrix.mark_undefined(j);
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LabelledMatrix {
        let labels = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        let mut m = LabelledMatrix::new("A", labels(&["p1", "p2"]), labels(&["p1", "p2", "p3"])).unwrap();
        m.add("p1", "p1", 0.25).unwrap();
        m.add("p2", "p1", -1.5).unwrap();
        m.add("p2", "p2", 3.0).unwrap();
        m.mark_undefined(2);
        m
    }

    fn same_numbers(a: &LabelledMatrix, b: &LabelledMatrix) -> bool {
        let (da, db) = (a.to_dense(), b.to_dense());
        da.iter().flatten().zip(db.iter().flatten()).all(|(x, y)| {
            (x.is_nan() && y.is_nan()) || x == y
        }) && a.row_labels() == b.row_labels()
            && a.col_labels() == b.col_labels()
    }

    #[test]
    fn test_every_format_keeps_the_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_project_name("demo")
            .with_out_dir(dir.path());
        let matrix = sample();
        let mut exporter = Exporter::new(&config).unwrap();
        exporter.save_matrix(&matrix).unwrap();
        let manifest = exporter.finish("leontief", None).unwrap();
        assert_eq!(manifest.artifacts.len(), 3);

        let binary = read_binary_matrix(&dir.path().join("demo_A.arrow")).unwrap();
        assert!(same_numbers(&matrix, &binary));
        assert_eq!(binary.undefined_columns().collect::<Vec<_>>(), vec![2]);

        let dense = read_dense_table(&dir.path().join("demo_A.dense.parquet"), "A").unwrap();
        assert!(same_numbers(&matrix, &dense));

        let sparse = read_parquet(&dir.path().join("demo_A.sparse.parquet")).unwrap();
        let triplets: Vec<Triplet> = serde_arrow::from_record_batch(&sparse[0]).unwrap();
        // three stored cells plus two NaN cells of the undefined column
        assert_eq!(triplets.len(), 5);
    }

    #[test]
    fn test_verify_detects_changed_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_out_dir(dir.path())
            .with_output_formats([OutputFormat::SparseTable]);
        let mut exporter = Exporter::new(&config).unwrap();
        exporter.save_matrix(&sample()).unwrap();
        exporter.save_json("note", &vec!["a", "b"]).unwrap();
        exporter.finish("leontief", Some("abc".to_string())).unwrap();

        assert!(verify_manifest(dir.path()).unwrap().is_empty());
        std::fs::write(dir.path().join("lci_note.json"), "[]").unwrap();
        assert_eq!(verify_manifest(dir.path()).unwrap(), vec!["lci_note.json"]);
    }
}
