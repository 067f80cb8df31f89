//! End-to-end runs: records in, matrices and a manifest out
//!
//! Stages run in order: source (or cache), label normalization, identity
//! resolution, characterisation factors, flow graph, matrix assembly,
//! export. Any untraceable flow aborts the run before a matrix is written.

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::cache::IntermediateCache;
use crate::characterisation::{Characterisation, FactorTable, characterise};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::export::{Exporter, Manifest};
use crate::graph::{FlowGraph, FlowGraphBuilder, Traceability};
use crate::matrix::{LeontiefSystem, SupplyUseSystem, assemble_leontief, assemble_sut};
use crate::models::{NormalizedRecord, RawFlowRecord};
use crate::normalize::{CorrectionTable, LabelNormalizer, NormalizedBatch};
use crate::report::{RunReport, Warning};
use crate::resolve::SubstanceResolver;
use crate::source::{RecordSource, SourceData};
use crate::store::StagingStore;
use crate::taxonomy::SubcompartmentMatcher;
use crate::utils::logging::log_warning;

/// Result of a Leontief run
#[derive(Debug)]
pub struct LeontiefOutput {
    pub system: LeontiefSystem,
    pub characterisation: Option<Characterisation>,
    pub report: RunReport,
    pub manifest: Manifest,
}

/// Result of a supply-use run
#[derive(Debug)]
pub struct SutOutput {
    pub system: SupplyUseSystem,
    pub characterisation: Option<Characterisation>,
    pub report: RunReport,
    pub manifest: Manifest,
}

/// Records after normalization and resolution
struct Prepared {
    data: SourceData,
    fingerprint: String,
    elementary: Vec<NormalizedRecord>,
    /// Exchange ids of rejected elementary master records, with the reason
    rejected_elementary: FxHashMap<String, String>,
    factors: FactorTable,
}

/// Runs every stage against one staging store
pub struct Pipeline<S: StagingStore> {
    config: PipelineConfig,
    normalizer: LabelNormalizer,
    resolver: SubstanceResolver,
    matcher: SubcompartmentMatcher,
    store: S,
}

impl<S: StagingStore> Pipeline<S> {
    /// Create a pipeline; fails if the configuration is invalid
    pub fn new(config: PipelineConfig, corrections: CorrectionTable, store: S) -> Result<Self> {
        config.validate()?;
        log::info!("{config}");
        Ok(Self {
            resolver: SubstanceResolver::from_table(&corrections),
            normalizer: LabelNormalizer::new(corrections).with_progress(config.show_progress),
            matcher: SubcompartmentMatcher::default(),
            config,
            store,
        })
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: SubcompartmentMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Build and persist `A`, `F` (and `Z`, `G`) from allocated datasets
    pub fn run_leontief(&mut self, source: &dyn RecordSource) -> Result<LeontiefOutput> {
        let start = Instant::now();
        let mut report = RunReport::new();
        let prepared = self.prepare(source, &mut report)?;
        let graph = self.build_graph(&prepared, Traceability::Process, &mut report)?;

        let system = assemble_leontief(&graph, &self.config)?;
        let characterisation = self.characterise(&system.stressors, &prepared.factors, &mut report)?;

        let mut exporter = Exporter::new(&self.config)?;
        for matrix in system.matrices() {
            exporter.save_matrix(matrix)?;
        }
        if let Some(ch) = &characterisation {
            exporter.save_matrix(&ch.c)?;
        }
        exporter.save_labels("processes", &system.processes)?;
        exporter.save_labels("stressors", &system.stressors)?;
        exporter.save_labels("products", &graph.products)?;
        exporter.save_json("report", &report)?;
        let manifest = exporter.finish("leontief", Some(prepared.fingerprint))?;

        report.log_summary();
        log::info!("Leontief run finished in {:?}", start.elapsed());
        Ok(LeontiefOutput {
            system,
            characterisation,
            report,
            manifest,
        })
    }

    /// Build and persist `V`, `U`, `G_act` and `V_prod_vol` from
    /// unallocated datasets
    pub fn run_sut(&mut self, source: &dyn RecordSource) -> Result<SutOutput> {
        let start = Instant::now();
        let mut report = RunReport::new();
        let prepared = self.prepare(source, &mut report)?;
        let traceability = if self.config.untraceable_use {
            Traceability::Product
        } else {
            Traceability::Activity
        };
        let graph = self.build_graph(&prepared, traceability, &mut report)?;

        let system = assemble_sut(&graph, &self.config)?;
        let characterisation = self.characterise(&system.stressors, &prepared.factors, &mut report)?;

        let mut exporter = Exporter::new(&self.config)?;
        for matrix in system.matrices() {
            exporter.save_matrix(matrix)?;
        }
        if let Some(ch) = &characterisation {
            exporter.save_matrix(&ch.c)?;
        }
        exporter.save_labels("processes", &graph.processes)?;
        exporter.save_labels("products", &system.products)?;
        exporter.save_labels("stressors", &system.stressors)?;
        exporter.save_json("report", &report)?;
        let manifest = exporter.finish("sut", Some(prepared.fingerprint))?;

        report.log_summary();
        log::info!("Supply-use run finished in {:?}", start.elapsed());
        Ok(SutOutput {
            system,
            characterisation,
            report,
            manifest,
        })
    }

    /// Records of `source`, from the cache when allowed and present
    fn acquire(&self, source: &dyn RecordSource) -> Result<(SourceData, String)> {
        let fingerprint = source.fingerprint()?;
        log::info!("Source {} has fingerprint {fingerprint}", source.describe());
        let cache = self.config.cache_dir.as_ref().map(IntermediateCache::new);

        if let (Some(cache), true) = (&cache, self.config.prefer_cached_intermediate) {
            match cache.load(&fingerprint) {
                Ok(Some(data)) => {
                    log::info!("Using cached records from {}", cache.entry_dir(&fingerprint).display());
                    return Ok((data, fingerprint));
                }
                Ok(None) => log::info!("No cached records for this fingerprint"),
                Err(e) => log_warning(
                    &format!("Cached records unusable ({e}), reading the source instead"),
                    Some(&cache.entry_dir(&fingerprint)),
                ),
            }
        }

        let data = source.load()?;
        if let (Some(cache), true) = (&cache, self.config.save_intermediate) {
            if let Err(e) = cache.store(&fingerprint, &data) {
                log_warning(&format!("Could not cache parsed records ({e})"), Some(cache.root()));
            }
        }
        Ok((data, fingerprint))
    }

    fn normalize(
        &self,
        raw: Vec<RawFlowRecord>,
        what: &str,
        report: &mut RunReport,
    ) -> (Vec<NormalizedRecord>, FxHashMap<String, String>) {
        let NormalizedBatch {
            records,
            rejected,
            corrections_applied,
            bad_checksums,
            cas_nulled,
        } = self.normalizer.normalize(raw);
        report.add_count(&format!("{what}_records_normalized"), records.len());
        report.add_count(&format!("{what}_records_rejected"), rejected.len());
        report.add_count("cas_corrections_applied", corrections_applied.len());
        report.add_count("cas_bad_checksums", bad_checksums);
        report.add_count("cas_nulled", cas_nulled);

        let mut rejected_ids = FxHashMap::default();
        for r in rejected {
            if let Some(id) = &r.record.source_id {
                rejected_ids.insert(id.clone(), r.reason.clone());
            }
            report.push(Warning::MalformedRecord {
                record: r.record.describe(),
                reason: r.reason,
            });
        }
        (records, rejected_ids)
    }

    fn prepare(&mut self, source: &dyn RecordSource, report: &mut RunReport) -> Result<Prepared> {
        let (data, fingerprint) = self.acquire(source)?;

        let scheme = self.config.inventory_scheme.clone();
        let elementary_raw = data.elementary.iter().map(|e| e.to_raw(&scheme)).collect();
        let characterisation_raw = data.characterisation.iter().map(|c| c.to_raw()).collect();
        let (mut records, rejected_elementary) = self.normalize(elementary_raw, "elementary", report);
        let n_elementary = records.len();
        let (characterisation, _) = self.normalize(characterisation_raw, "characterisation", report);
        records.extend(characterisation);

        // one resolver pass so that characterisation names join the
        // substances of the inventory's own names
        let resolution = self.resolver.resolve(&mut self.store, &mut records)?;
        report.add_count("substances_created", resolution.substances_created);
        report.add_count("names_registered", resolution.names_registered);
        report.add_count("resolved_by_cas", resolution.resolved_by_cas);
        report.add_count("resolved_by_name", resolution.resolved_by_name);
        report.extend(resolution.warnings);

        let characterisation_records = records.split_off(n_elementary);
        let (mut factors, warnings) = FactorTable::build(&characterisation_records);
        report.extend(warnings);
        let overrides = factors.apply_overrides(&self.normalizer.table().custom_factors, &self.store);
        report.add_count("custom_factors_applied", overrides);
        let persisted = factors.persist(&mut self.store)?;
        report.add_count("factors", persisted);

        Ok(Prepared {
            data,
            fingerprint,
            elementary: records,
            rejected_elementary,
            factors,
        })
    }

    fn build_graph(&self, prepared: &Prepared, traceability: Traceability, report: &mut RunReport) -> Result<FlowGraph> {
        let (graph, warnings) = FlowGraphBuilder::new(&self.config)
            .with_rejected_elementary(&prepared.rejected_elementary)
            .build(&prepared.data.activities, &prepared.elementary, traceability)?;
        report.add_count("processes", graph.processes.len());
        report.add_count("products", graph.products.len());
        report.add_count("stressors", graph.stressors.len());
        report.extend(warnings);
        Ok(graph)
    }

    fn characterise(
        &self,
        stressors: &[crate::models::Stressor],
        factors: &FactorTable,
        report: &mut RunReport,
    ) -> Result<Option<Characterisation>> {
        if factors.is_empty() {
            log::info!("No characterisation factors; C is not built");
            return Ok(None);
        }
        let result = characterise(stressors, factors, &self.matcher)?;
        report.add_count("uncharacterised_stressors", result.warnings.len());
        report.extend(result.warnings.iter().cloned());
        Ok(Some(result))
    }
}
