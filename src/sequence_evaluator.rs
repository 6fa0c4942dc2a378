/*!
# Sequence Evaluator
Turns the best path for one reference sequence into categorized records, ROC lines and counts,
and drives the worker pool that does this for every sequence.
*/

use anyhow::{bail, ensure, Context};
use derive_builder::Builder;
use indicatif::ProgressBar;
use log::{debug, error};
use rust_lib_reference_genome::reference_genome::ReferenceGenome;
use std::collections::BTreeMap;
use std::sync::mpsc;

use crate::data_types::roc_container::{RocFilter, RocLine};
use crate::data_types::sequence_result::{RecordRef, SequenceResult};
use crate::data_types::summary_metrics::{PhasingCounts, SummaryMetrics, WarningCounts};
use crate::data_types::variant_set::VariantSet;
use crate::data_types::variants::{Variant, Variation};
use crate::eval_synchronizer::{EvalError, EvalSynchronizer};
use crate::path_finder::PathFinder;
use crate::phasing_evaluator::count_phasings;
use crate::writers::variant_categorizer::CategorizeError;

/// Weighted called true positives must sum to the baseline true positives within this tolerance
const WEIGHT_TOLERANCE: f64 = 1e-3;

/// Internal bookkeeping that disagrees with itself
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum InconsistencyError {
    #[error("{sequence_name}: weighted true positives ({weighted_tp}) do not match baseline true positives ({baseline_tp})")]
    WeightMismatch { sequence_name: String, weighted_tp: f64, baseline_tp: f64 }
}

/// True if the error comes from broken internal bookkeeping or inputs that changed underneath us, rather than from I/O
pub fn is_data_inconsistency(error: &anyhow::Error) -> bool {
    error.chain().any(|e| e.is::<InconsistencyError>() || e.is::<CategorizeError>())
}

/// Controls the per-sequence evaluation
#[derive(Builder, Clone, Copy, Debug)]
#[builder(default)]
pub struct EvalConfig {
    /// Frontier size that makes the search skip a region
    max_complexity: usize,
    /// if True, matched baseline records are kept for the baseline true-positive output
    output_baseline_tp: bool
}

impl Default for EvalConfig {
    fn default() -> Self {
        // main.rs sets these from the CLI
        Self {
            max_complexity: 1000,
            output_baseline_tp: true
        }
    }
}

impl EvalConfig {
    pub fn max_complexity(&self) -> usize {
        self.max_complexity
    }

    pub fn output_baseline_tp(&self) -> bool {
        self.output_baseline_tp
    }
}

/// Everything produced by evaluating one sequence
#[derive(Clone, Debug, Default)]
pub struct SequenceEvaluation {
    /// Records to write, by category
    pub result: SequenceResult,
    /// One line per called variant that took part in the best path
    pub roc_lines: Vec<RocLine>,
    /// TP/FP/FN counts for each ROC filter
    pub counts: BTreeMap<RocFilter, SummaryMetrics>,
    pub phasing: PhasingCounts,
    pub warnings: WarningCounts
}

fn record_ref(variant: &Variant, weight: Option<f64>) -> RecordRef {
    RecordRef {
        source_index: variant.source_index(),
        start: variant.start(),
        weight
    }
}

/// Evaluates the calls against the baseline for one reference sequence.
/// # Arguments
/// * `variant_set` - the loaded variants for the sequence
/// * `reference` - the sequence itself
/// * `config` - search and output settings
/// # Errors
/// * if the search fails
/// * if the weighted true positives do not add up to the baseline true positives
pub fn evaluate_sequence(variant_set: &VariantSet, reference: &[u8], config: EvalConfig) -> anyhow::Result<SequenceEvaluation> {
    let sequence_name = variant_set.sequence_name();
    let mut evaluation = SequenceEvaluation {
        result: SequenceResult::new(sequence_name.to_string()),
        warnings: variant_set.warnings(),
        ..Default::default()
    };

    let search = PathFinder::new(
        sequence_name, reference,
        variant_set.calls(), variant_set.baseline(),
        config.max_complexity()
    ).find_best_path()?;
    for region in search.skipped_regions.iter() {
        evaluation.warnings.skipped_regions += 1;
        evaluation.warnings.skipped_called += region.called as u64;
        evaluation.warnings.skipped_baseline += region.baseline as u64;
    }

    let best = &search.best;
    let weights = best.calculate_weights();
    let weighted_tp: f64 = weights.called.iter().map(|ov| ov.weight()).sum();
    let baseline_tp = weights.baseline.len() as f64;
    if (weighted_tp - baseline_tp).abs() > WEIGHT_TOLERANCE {
        bail!(InconsistencyError::WeightMismatch { sequence_name: sequence_name.to_string(), weighted_tp, baseline_tp });
    }
    evaluation.phasing = count_phasings(best);

    let result = &mut evaluation.result;
    let counts = &mut evaluation.counts;
    for ov in weights.called.iter() {
        let variant = ov.variant();
        result.true_positives.push(record_ref(variant, Some(ov.weight())));
        evaluation.roc_lines.push(RocLine { score: variant.score(), weight: ov.weight(), filters: variant.roc_filters() });
        for filter in variant.roc_filters() {
            counts.entry(filter).or_default().called_tp += 1;
        }
    }

    for &variant in best.called().excluded().iter().chain(weights.demoted_called.iter()) {
        result.false_positives.push(record_ref(variant, None));
        evaluation.roc_lines.push(RocLine { score: variant.score(), weight: 0.0, filters: variant.roc_filters() });
        for filter in variant.roc_filters() {
            counts.entry(filter).or_default().called_fp += 1;
        }
    }

    for ov in weights.baseline.iter() {
        let variant = ov.variant();
        if config.output_baseline_tp() {
            result.baseline_true_positives.push(record_ref(variant, None));
        }
        for filter in variant.roc_filters() {
            counts.entry(filter).or_default().baseline_tp += 1;
        }
    }

    for &variant in best.baseline().excluded().iter().chain(weights.demoted_baseline.iter()) {
        result.false_negatives.push(record_ref(variant, None));
        for filter in variant.roc_filters() {
            counts.entry(filter).or_default().baseline_fn += 1;
        }
    }

    result.sort();
    debug!("{sequence_name}: {} TP, {} FP, {} FN", result.true_positives.len(), result.false_positives.len(), result.false_negatives.len());
    Ok(evaluation)
}

/// Pulls sequences until the source is exhausted, evaluating and reporting each one
fn run_worker(
    synchronizer: &EvalSynchronizer, reference_genome: &ReferenceGenome, config: EvalConfig, progress_bar: &ProgressBar
) -> anyhow::Result<()> {
    while let Some(variant_set) = synchronizer.next_set()? {
        let sequence_name = variant_set.sequence_name();
        ensure!(
            reference_genome.contig_keys().iter().any(|k| k == sequence_name),
            "sequence {sequence_name} is not in the reference genome"
        );
        let reference = reference_genome.get_full_chromosome(sequence_name);

        let evaluation = evaluate_sequence(&variant_set, reference, config)
            .with_context(|| format!("Error while evaluating {sequence_name}:"))?;
        synchronizer.add_roc_lines(&evaluation.roc_lines)?;
        synchronizer.add_variants(&evaluation.counts)?;
        synchronizer.add_phasings(evaluation.phasing)?;
        synchronizer.add_warnings(evaluation.warnings)?;
        synchronizer.write(&evaluation.result)
            .with_context(|| format!("Error while writing {sequence_name}:"))?;
        progress_bar.set_message(sequence_name.to_string());
        progress_bar.inc(1);
    }
    Ok(())
}

/// Runs `workers` evaluation loops on the global rayon pool until every sequence is written.
/// The first failure aborts the other workers.
/// # Arguments
/// * `synchronizer` - the shared source, output, and statistics
/// * `reference_genome` - the pre-loaded reference
/// * `config` - search and output settings
/// * `workers` - number of concurrent evaluation loops
/// * `progress_bar` - incremented once per written sequence
/// # Errors
/// * the first non-abort error raised by any worker
pub fn evaluate_all(
    synchronizer: &EvalSynchronizer, reference_genome: &ReferenceGenome, config: EvalConfig,
    workers: usize, progress_bar: &ProgressBar
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    rayon::scope(|s| {
        for _ in 0..workers.max(1) {
            let tx = tx.clone();
            s.spawn(move |_| {
                if let Err(e) = run_worker(synchronizer, reference_genome, config, progress_bar) {
                    synchronizer.abort();
                    // rx lives until after the scope, so this cannot fail
                    let _ = tx.send(e);
                }
            });
        }
    });
    drop(tx);

    // workers that were only woken by the abort are not the interesting failure
    let mut errors: Vec<anyhow::Error> = rx.try_iter().collect();
    let first_cause = errors.iter().position(|e| e.downcast_ref::<EvalError>().is_none());
    match first_cause {
        Some(index) => {
            for (i, e) in errors.iter().enumerate() {
                if i != index {
                    error!("Additional worker error: {e:#}");
                }
            }
            Err(errors.swap_remove(index))
        },
        None => match errors.pop() {
            Some(e) => Err(e),
            None => Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::cli::eval::SortOrder;
    use crate::data_types::roc_container::RocContainer;
    use crate::eval_synchronizer::{EvalOutput, VariantSetSource};

    const REFERENCE: &str = "ACCGTTACCAGGACTTGACAAACCGTTAGCAAGT";

    fn hom(index: usize, start: u64, end: u64, allele: &[u8], score: f64) -> Variant {
        Variant::new(index, start, end, allele.to_vec(), None, false, score).unwrap()
    }

    fn evaluate(baseline: Vec<Variant>, calls: Vec<Variant>) -> SequenceEvaluation {
        let variant_set = VariantSet::new("chr1".to_string(), baseline, calls, Default::default());
        evaluate_sequence(&variant_set, REFERENCE.as_bytes(), EvalConfig::default()).unwrap()
    }

    #[test]
    fn test_matching_snv() {
        let evaluation = evaluate(vec![hom(0, 5, 6, b"C", 10.0)], vec![hom(0, 5, 6, b"C", 30.0)]);
        let result = &evaluation.result;
        assert_eq!(result.true_positives, vec![RecordRef { source_index: 0, start: 5, weight: Some(1.0) }]);
        assert!(result.false_positives.is_empty());
        assert!(result.false_negatives.is_empty());
        assert_eq!(result.baseline_true_positives.len(), 1);

        let all = evaluation.counts[&RocFilter::All];
        assert_eq!(all, SummaryMetrics::new(1, 0, 1, 0));
        assert_eq!(evaluation.roc_lines, vec![RocLine { score: 30.0, weight: 1.0, filters: [RocFilter::All, RocFilter::Homozygous] }]);
    }

    #[test]
    fn test_unmatched_call() {
        let evaluation = evaluate(vec![], vec![hom(0, 12, 13, b"T", 5.0)]);
        let result = &evaluation.result;
        assert!(result.true_positives.is_empty());
        assert_eq!(result.false_positives, vec![RecordRef { source_index: 0, start: 12, weight: None }]);
        assert_eq!(evaluation.roc_lines.len(), 1);
        assert_approx_eq!(evaluation.roc_lines[0].weight, 0.0);
        assert_eq!(evaluation.counts[&RocFilter::All], SummaryMetrics::new(0, 0, 0, 1));
    }

    #[test]
    fn test_missed_baseline() {
        let evaluation = evaluate(vec![hom(0, 12, 13, b"T", 5.0)], vec![]);
        assert_eq!(evaluation.result.false_negatives.len(), 1);
        assert!(evaluation.roc_lines.is_empty());
        assert_eq!(evaluation.counts[&RocFilter::Homozygous].baseline_fn, 1);
    }

    #[test]
    fn test_representation_difference() {
        // baseline: complex replacement of "TA" at 5-7 with "CGT"; calls: SNV T>C at 5, then an insertion of G and A>T at 6
        let baseline = vec![hom(0, 5, 7, b"CGT", 10.0)];
        let calls = vec![hom(0, 5, 6, b"C", 10.0), hom(1, 6, 7, b"GT", 10.0)];
        let evaluation = evaluate(baseline, calls);
        let result = &evaluation.result;
        assert_eq!(result.true_positives.len(), 2);
        assert!(result.false_positives.is_empty());
        assert!(result.false_negatives.is_empty());

        let weighted: f64 = result.true_positives.iter().map(|r| r.weight.unwrap()).sum();
        assert_approx_eq!(weighted, 1.0);
        assert_approx_eq!(result.true_positives[0].weight.unwrap(), 0.5);
    }

    #[test]
    fn test_mixed_conservation() {
        let baseline = vec![hom(0, 3, 4, b"T", 1.0), hom(1, 9, 10, b"T", 1.0), hom(2, 20, 21, b"G", 1.0), hom(3, 28, 29, b"T", 1.0)];
        let calls = vec![hom(0, 3, 4, b"T", 1.0), hom(1, 9, 10, b"C", 1.0), hom(2, 20, 21, b"G", 1.0), hom(3, 25, 26, b"A", 1.0)];
        let evaluation = evaluate(baseline, calls);
        let result = &evaluation.result;

        let tp_indices: Vec<usize> = result.true_positives.iter().map(|r| r.source_index).collect();
        let fp_indices: Vec<usize> = result.false_positives.iter().map(|r| r.source_index).collect();
        let fn_indices: Vec<usize> = result.false_negatives.iter().map(|r| r.source_index).collect();
        assert_eq!(tp_indices, vec![0, 2]);
        assert_eq!(fp_indices, vec![1, 3]);
        assert_eq!(fn_indices, vec![1, 3]);

        let weighted: f64 = result.true_positives.iter().map(|r| r.weight.unwrap()).sum();
        assert_approx_eq!(weighted, result.baseline_true_positives.len() as f64);
    }

    #[test]
    fn test_no_baseline_output() {
        let variant_set = VariantSet::new("chr1".to_string(), vec![hom(0, 5, 6, b"C", 1.0)], vec![hom(0, 5, 6, b"C", 1.0)], Default::default());
        let config = EvalConfigBuilder::default()
            .output_baseline_tp(false)
            .build().unwrap();
        let evaluation = evaluate_sequence(&variant_set, REFERENCE.as_bytes(), config).unwrap();
        assert!(evaluation.result.baseline_true_positives.is_empty());
        assert_eq!(evaluation.counts[&RocFilter::All].baseline_tp, 1);
    }

    struct SetSource {
        sets: VecDeque<VariantSet>
    }

    impl VariantSetSource for SetSource {
        fn next_set(&mut self) -> anyhow::Result<Option<VariantSet>> {
            Ok(self.sets.pop_front())
        }
    }

    struct CollectingOutput {
        results: Arc<Mutex<Vec<SequenceResult>>>
    }

    impl EvalOutput for CollectingOutput {
        fn write_sequence(&mut self, result: &SequenceResult) -> anyhow::Result<()> {
            self.results.lock().unwrap().push(result.clone());
            Ok(())
        }

        fn finish(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn build_genome() -> ReferenceGenome {
        let mut reference_genome = ReferenceGenome::empty_reference();
        reference_genome.add_contig("chr1".to_string(), REFERENCE).unwrap();
        reference_genome.add_contig("chr2".to_string(), "ACGTACGTACGTACGT").unwrap();
        reference_genome
    }

    #[test]
    fn test_evaluate_all() {
        let reference_genome = build_genome();
        let sets = VecDeque::from([
            VariantSet::new("chr1".to_string(), vec![hom(0, 5, 6, b"C", 1.0)], vec![hom(0, 5, 6, b"C", 2.0)], Default::default()),
            VariantSet::empty("chr2".to_string())
        ]);
        let results: Arc<Mutex<Vec<SequenceResult>>> = Default::default();
        let synchronizer = EvalSynchronizer::new(
            Box::new(SetSource { sets }),
            Box::new(CollectingOutput { results: results.clone() }),
            RocContainer::new(SortOrder::Descending)
        );

        evaluate_all(&synchronizer, &reference_genome, EvalConfig::default(), 2, &ProgressBar::hidden()).unwrap();
        let names: Vec<String> = results.lock().unwrap().iter().map(|r| r.sequence_name.clone()).collect();
        assert_eq!(names, vec!["chr1".to_string(), "chr2".to_string()]);

        let totals = synchronizer.finish().unwrap();
        assert_eq!(totals.metrics[&RocFilter::All], SummaryMetrics::new(1, 0, 1, 0));
        assert_approx_eq!(totals.roc.totals(RocFilter::All).true_positives, 1.0);
    }

    #[test]
    fn test_evaluate_all_missing_contig() {
        let reference_genome = build_genome();
        let sets = VecDeque::from([VariantSet::empty("chr1".to_string()), VariantSet::empty("chrUn".to_string())]);
        let synchronizer = EvalSynchronizer::new(
            Box::new(SetSource { sets }),
            Box::new(CollectingOutput { results: Default::default() }),
            RocContainer::new(SortOrder::Descending)
        );
        let error = evaluate_all(&synchronizer, &reference_genome, EvalConfig::default(), 2, &ProgressBar::hidden()).unwrap_err();
        assert!(format!("{error:#}").contains("chrUn"));
        assert!(synchronizer.is_aborted());
    }
}
