/*!
# Eval Synchronizer
Shared state for the worker pool.
Workers pull one reference sequence at a time, evaluate it independently, and then wait for their turn to write so that
the outputs always come out in the order the sequences were handed out.
The aggregate statistics are each behind their own lock.
*/

use anyhow::anyhow;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::data_types::roc_container::{RocContainer, RocFilter, RocLine};
use crate::data_types::sequence_result::SequenceResult;
use crate::data_types::summary_metrics::{PhasingCounts, SummaryMetrics, WarningCounts};
use crate::data_types::variant_set::VariantSet;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("evaluation was aborted before {sequence_name} could be written")]
    Aborted { sequence_name: String },
    #[error("{sequence_name} was never handed out, so it has no place in the output order")]
    NotQueued { sequence_name: String }
}

/// Hands out the variants for each reference sequence, in output order
pub trait VariantSetSource: Send {
    /// Returns the next sequence, or None once every sequence has been handed out
    fn next_set(&mut self) -> anyhow::Result<Option<VariantSet>>;
}

/// Receives the categorized records for each sequence, in output order
pub trait EvalOutput: Send {
    /// Writes all the records for one sequence
    fn write_sequence(&mut self, result: &SequenceResult) -> anyhow::Result<()>;
    /// Flushes and finalizes the outputs once every sequence is written
    fn finish(self: Box<Self>) -> anyhow::Result<()>;
}

/// Everything accumulated over a full run
#[derive(Debug)]
pub struct EvalTotals {
    pub roc: RocContainer,
    pub metrics: BTreeMap<RocFilter, SummaryMetrics>,
    pub phasing: PhasingCounts,
    pub warnings: WarningCounts
}

/// Coordinates the workers evaluating different sequences
pub struct EvalSynchronizer {
    /// Where the variant sets come from
    source: Mutex<Box<dyn VariantSetSource>>,
    /// Where categorized records go
    output: Mutex<Box<dyn EvalOutput>>,
    /// Sequences handed out but not yet written, in hand-out order
    order: Mutex<VecDeque<String>>,
    /// Signalled whenever the front of `order` changes or the run is aborted
    turn: Condvar,
    /// Set once any worker fails
    aborted: AtomicBool,
    roc: Mutex<RocContainer>,
    metrics: Mutex<BTreeMap<RocFilter, SummaryMetrics>>,
    phasing: Mutex<PhasingCounts>,
    warnings: Mutex<WarningCounts>,
    /// Upper bound on a single wait for our turn to write
    poll_interval: Duration
}

/// Locks a mutex, converting poisoning into an error
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("a worker panicked while holding a shared lock"))
}

impl EvalSynchronizer {
    /// Constructor
    /// # Arguments
    /// * `source` - provides the variant sets, one per reference sequence
    /// * `output` - consumes the categorized records
    /// * `roc` - the empty ROC container, already configured with the sort order
    pub fn new(source: Box<dyn VariantSetSource>, output: Box<dyn EvalOutput>, roc: RocContainer) -> Self {
        Self {
            source: Mutex::new(source),
            output: Mutex::new(output),
            order: Default::default(),
            turn: Condvar::new(),
            aborted: AtomicBool::new(false),
            roc: Mutex::new(roc),
            metrics: Default::default(),
            phasing: Default::default(),
            warnings: Default::default(),
            poll_interval: Duration::from_millis(100)
        }
    }

    /// Pulls the next variant set and reserves its place in the output order.
    /// Returns None once the source is exhausted or the run was aborted.
    pub fn next_set(&self) -> anyhow::Result<Option<VariantSet>> {
        if self.is_aborted() {
            return Ok(None);
        }

        // the source lock is held until the name is queued, so hand-out order is output order
        let mut source = lock(&self.source)?;
        let next = source.next_set()?;
        if let Some(variant_set) = next.as_ref() {
            lock(&self.order)?.push_back(variant_set.sequence_name().to_string());
        }
        Ok(next)
    }

    /// Blocks until `result` is next in the output order, then writes it.
    /// # Errors
    /// * if the run is aborted while waiting
    /// * if the sequence was never handed out by `next_set`
    /// * if the output fails
    pub fn write(&self, result: &SequenceResult) -> anyhow::Result<()> {
        let sequence_name = &result.sequence_name;
        let mut order = lock(&self.order)?;
        loop {
            if self.is_aborted() {
                return Err(EvalError::Aborted { sequence_name: sequence_name.clone() }.into());
            }
            if order.front() == Some(sequence_name) {
                break;
            }
            if !order.contains(sequence_name) {
                return Err(EvalError::NotQueued { sequence_name: sequence_name.clone() }.into());
            }
            let (guard, _timeout) = self.turn.wait_timeout(order, self.poll_interval)
                .map_err(|_| anyhow!("a worker panicked while holding the output order lock"))?;
            order = guard;
        }
        drop(order);

        // nobody else writes until we pop ourselves off the front
        let write_result = lock(&self.output).and_then(|mut output| output.write_sequence(result));

        lock(&self.order)?.pop_front();
        self.turn.notify_all();
        write_result
    }

    /// Marks the run as failed and wakes every waiting writer
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        let _guard = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        self.turn.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Adds called variants to the ROC curves
    pub fn add_roc_lines(&self, lines: &[RocLine]) -> anyhow::Result<()> {
        let mut roc = lock(&self.roc)?;
        for line in lines.iter() {
            roc.add_roc_line(line);
        }
        Ok(())
    }

    /// Adds per-filter TP/FP/FN counts
    pub fn add_variants(&self, counts: &BTreeMap<RocFilter, SummaryMetrics>) -> anyhow::Result<()> {
        let mut metrics = lock(&self.metrics)?;
        for (&filter, &count) in counts.iter() {
            *metrics.entry(filter).or_default() += count;
        }
        Ok(())
    }

    pub fn add_phasings(&self, counts: PhasingCounts) -> anyhow::Result<()> {
        *lock(&self.phasing)? += counts;
        Ok(())
    }

    pub fn add_warnings(&self, counts: WarningCounts) -> anyhow::Result<()> {
        *lock(&self.warnings)? += counts;
        Ok(())
    }

    /// Finalizes the output and returns the accumulated statistics
    pub fn finish(self) -> anyhow::Result<EvalTotals> {
        let into_inner = |_| anyhow!("a worker panicked while holding a shared lock");
        let output = self.output.into_inner().map_err(into_inner)?;
        output.finish()?;
        Ok(EvalTotals {
            roc: self.roc.into_inner().map_err(|_| anyhow!("a worker panicked while holding the ROC lock"))?,
            metrics: self.metrics.into_inner().map_err(|_| anyhow!("a worker panicked while holding the metrics lock"))?,
            phasing: self.phasing.into_inner().map_err(|_| anyhow!("a worker panicked while holding the phasing lock"))?,
            warnings: self.warnings.into_inner().map_err(|_| anyhow!("a worker panicked while holding the warnings lock"))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::cli::eval::SortOrder;

    /// Hands out empty sets for a fixed list of names
    struct NameSource {
        names: VecDeque<String>
    }

    impl VariantSetSource for NameSource {
        fn next_set(&mut self) -> anyhow::Result<Option<VariantSet>> {
            Ok(self.names.pop_front().map(VariantSet::empty))
        }
    }

    /// Records the order sequences were written in
    struct RecordingOutput {
        written: Arc<Mutex<Vec<String>>>
    }

    impl EvalOutput for RecordingOutput {
        fn write_sequence(&mut self, result: &SequenceResult) -> anyhow::Result<()> {
            self.written.lock().unwrap().push(result.sequence_name.clone());
            Ok(())
        }

        fn finish(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn build(names: &[&str]) -> (EvalSynchronizer, Arc<Mutex<Vec<String>>>) {
        let written: Arc<Mutex<Vec<String>>> = Default::default();
        let source = NameSource { names: names.iter().map(|n| n.to_string()).collect() };
        let output = RecordingOutput { written: written.clone() };
        let synchronizer = EvalSynchronizer::new(Box::new(source), Box::new(output), RocContainer::new(SortOrder::Descending));
        (synchronizer, written)
    }

    #[test]
    fn test_output_order_with_skewed_cost() {
        let names = ["chr1", "chr2", "chr3", "chr4", "chr5"];
        let (synchronizer, written) = build(&names);

        // earlier sequences take longer, so they finish last
        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    while let Some(variant_set) = synchronizer.next_set().unwrap() {
                        let index = names.iter().position(|&n| n == variant_set.sequence_name()).unwrap();
                        std::thread::sleep(Duration::from_millis(20 * (names.len() - index) as u64));
                        synchronizer.write(&SequenceResult::new(variant_set.sequence_name().to_string())).unwrap();
                    }
                });
            }
        });

        assert_eq!(*written.lock().unwrap(), names.to_vec());
        synchronizer.finish().unwrap();
    }

    #[test]
    fn test_abort_wakes_writers() {
        let (synchronizer, written) = build(&["chr1", "chr2"]);
        let first = synchronizer.next_set().unwrap().unwrap();
        let second = synchronizer.next_set().unwrap().unwrap();
        assert_eq!(first.sequence_name(), "chr1");

        std::thread::scope(|s| {
            let waiter = s.spawn(|| synchronizer.write(&SequenceResult::new(second.sequence_name().to_string())));
            std::thread::sleep(Duration::from_millis(50));
            synchronizer.abort();
            let error = waiter.join().unwrap().unwrap_err();
            assert_eq!(error.downcast_ref::<EvalError>(), Some(&EvalError::Aborted { sequence_name: "chr2".to_string() }));
        });

        assert!(written.lock().unwrap().is_empty());
        assert!(synchronizer.next_set().unwrap().is_none());
    }

    #[test]
    fn test_not_queued() {
        let (synchronizer, _written) = build(&["chr1"]);
        let error = synchronizer.write(&SequenceResult::new("chrX".to_string())).unwrap_err();
        assert_eq!(error.downcast_ref::<EvalError>(), Some(&EvalError::NotQueued { sequence_name: "chrX".to_string() }));
    }

    #[test]
    fn test_statistics() {
        let (synchronizer, _written) = build(&[]);
        let counts = BTreeMap::from([(RocFilter::All, SummaryMetrics::new(1, 2, 3, 4))]);
        synchronizer.add_variants(&counts).unwrap();
        synchronizer.add_variants(&counts).unwrap();
        synchronizer.add_phasings(PhasingCounts { correct: 2, misphasings: 1, unphaseable: 0 }).unwrap();
        synchronizer.add_warnings(WarningCounts { skipped_regions: 1, ..Default::default() }).unwrap();
        synchronizer.add_roc_lines(&[RocLine { score: 1.0, weight: 1.0, filters: [RocFilter::All, RocFilter::Homozygous] }]).unwrap();

        let totals = synchronizer.finish().unwrap();
        assert_eq!(totals.metrics[&RocFilter::All], SummaryMetrics::new(2, 4, 6, 8));
        assert_eq!(totals.phasing.correct, 2);
        assert_eq!(totals.warnings.skipped_regions, 1);
        assert_eq!(totals.roc.totals(RocFilter::Homozygous).false_positives, 0);
    }
}
