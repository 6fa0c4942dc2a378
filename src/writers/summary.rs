use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::data_types::roc_container::RocFilter;
use crate::data_types::summary_metrics::{PhasingCounts, SummaryMetrics};

/// Contains all the data written to each row of our stats file
#[derive(Serialize)]
struct SummaryRow {
    /// The variant partition this row covers
    filter: String,
    /// Total number of variants in the baseline
    baseline_total: u64,
    /// Total number of true positives in the baseline
    baseline_tp: u64,
    /// Total number of false negatives
    baseline_fn: u64,
    /// Total number of true positives in the calls
    called_tp: u64,
    /// Total number of false positives
    called_fp: u64,
    /// Recall = baseline.TP / (baseline.TP+baseline.FN)
    metric_recall: Option<f64>,
    /// Precision = called.TP / (called.TP + called.FP)
    metric_precision: Option<f64>,
    /// F1 = combination score of recall and precision
    metric_f1: Option<f64>
}

impl SummaryRow {
    /// Creates a new row from a label and summary metrics
    pub fn new(filter: String, metrics: &SummaryMetrics) -> Self {
        Self {
            filter,
            baseline_total: metrics.baseline_total(),
            baseline_tp: metrics.baseline_tp,
            baseline_fn: metrics.baseline_fn,
            called_tp: metrics.called_tp,
            called_fp: metrics.called_fp,
            metric_recall: metrics.recall(),
            metric_precision: metrics.precision(),
            metric_f1: metrics.f1()
        }
    }
}

/// The single row of the phasing file
#[derive(Serialize)]
struct PhasingRow {
    correct: u64,
    misphasings: u64,
    unphaseable: u64
}

/// Opens a delimited writer, switching to "," if the file ends with .csv
fn open_delimited(filename: &Path) -> csv::Result<csv::Writer<File>> {
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(filename)
}

/// Will write the summary out to the given file path, one row per ROC filter
/// # Arguments
/// * `metrics` - the accumulated counts for each filter
/// * `filename` - the filename for the output (tsv/csv)
pub fn write_summary(metrics: &BTreeMap<RocFilter, SummaryMetrics>, filename: &Path) -> csv::Result<()> {
    let mut csv_writer = open_delimited(filename)?;
    for filter in RocFilter::ALL_FILTERS.iter() {
        let filter_metrics = metrics.get(filter).copied().unwrap_or_default();
        csv_writer.serialize(SummaryRow::new(filter.as_ref().to_string(), &filter_metrics))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the phasing counts to the given file path
/// # Arguments
/// * `phasing` - the accumulated phasing counts
/// * `filename` - the filename for the output (tsv/csv)
pub fn write_phasing(phasing: &PhasingCounts, filename: &Path) -> csv::Result<()> {
    let mut csv_writer = open_delimited(filename)?;
    csv_writer.serialize(PhasingRow {
        correct: phasing.correct,
        misphasings: phasing.misphasings,
        unphaseable: phasing.unphaseable
    })?;
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_summary() {
        let folder = std::env::temp_dir().join(format!("varsync_summary_{}", std::process::id()));
        std::fs::create_dir_all(&folder).unwrap();

        let metrics = BTreeMap::from([
            (RocFilter::All, SummaryMetrics::new(3, 1, 3, 1)),
            (RocFilter::Heterozygous, SummaryMetrics::new(3, 1, 3, 1))
        ]);
        let summary_fn = folder.join("summary.tsv");
        write_summary(&metrics, &summary_fn).unwrap();
        let text = std::fs::read_to_string(&summary_fn).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "filter\tbaseline_total\tbaseline_tp\tbaseline_fn\tcalled_tp\tcalled_fp\tmetric_recall\tmetric_precision\tmetric_f1");
        assert_eq!(lines[1], "weighted\t4\t3\t1\t3\t1\t0.75\t0.75\t0.75");
        // nothing homozygous, so the ratios are empty
        assert_eq!(lines[3], "homozygous\t0\t0\t0\t0\t0\t\t\t");

        let phasing_fn = folder.join("phasing.csv");
        write_phasing(&PhasingCounts { correct: 5, misphasings: 1, unphaseable: 2 }, &phasing_fn).unwrap();
        let text = std::fs::read_to_string(&phasing_fn).unwrap();
        assert_eq!(text, "correct,misphasings,unphaseable\n5,1,2\n");
        std::fs::remove_dir_all(&folder).unwrap();
    }
}
