use anyhow::Context;
use flate2::write::GzEncoder;
use log::debug;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::data_types::roc_container::{RocContainer, RocFilter};
use crate::parsing::variant_loader::RocScoreField;

/// Writes one gzipped ROC table per filter, named `<filter>_roc.tsv.gz`.
/// Each table starts with `#` comment lines describing the run, followed by the cumulative rows.
/// # Arguments
/// * `roc` - the accumulated ROC points
/// * `output_folder` - where the tables go
/// * `score_field` - recorded in the comment lines
/// * `baseline_totals` - total baseline variants for each filter, recorded in the comment lines
/// # Errors
/// * if any file cannot be created or written
pub fn write_roc_tables(
    roc: &RocContainer,
    output_folder: &Path,
    score_field: &RocScoreField,
    baseline_totals: impl Fn(RocFilter) -> u64
) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = vec![];
    for filter in RocFilter::ALL_FILTERS.into_iter() {
        let roc_fn = output_folder.join(format!("{}_roc.tsv.gz", filter.as_ref()));
        debug!("Writing {roc_fn:?}...");
        write_roc_table(roc, filter, &roc_fn, score_field, baseline_totals(filter))
            .with_context(|| format!("Error while writing {roc_fn:?}:"))?;
        written.push(roc_fn);
    }
    Ok(written)
}

/// Writes a single ROC table
fn write_roc_table(
    roc: &RocContainer,
    filter: RocFilter,
    filename: &Path,
    score_field: &RocScoreField,
    baseline_total: u64
) -> anyhow::Result<()> {
    let mut encoder = GzEncoder::new(File::create(filename)?, flate2::Compression::default());
    let cli_string = std::env::args().collect::<Vec<String>>().join(" ");
    writeln!(encoder, "#varsync_version: {}", crate::cli::core::FULL_VERSION.as_str())?;
    writeln!(encoder, "#varsync_command: {cli_string}")?;
    writeln!(encoder, "#score_field: {score_field}")?;
    writeln!(encoder, "#sort_order: {}", roc.sort_order().as_ref())?;
    writeln!(encoder, "#total_baseline_variants: {baseline_total}")?;

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(encoder);
    for row in roc.cumulative_rows(filter).iter() {
        csv_writer.serialize(row)?;
    }
    let encoder = csv_writer.into_inner()
        .map_err(|e| e.into_error())?;
    encoder.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::eval::SortOrder;
    use crate::data_types::roc_container::RocLine;
    use std::io::Read;

    #[test]
    fn test_write_roc_tables() {
        let folder = std::env::temp_dir().join(format!("varsync_roc_writer_{}", std::process::id()));
        std::fs::create_dir_all(&folder).unwrap();

        let mut roc = RocContainer::new(SortOrder::Descending);
        let het = [RocFilter::All, RocFilter::Heterozygous];
        roc.add_roc_line(&RocLine { score: 10.0, weight: 1.0, filters: het });
        roc.add_roc_line(&RocLine { score: 20.0, weight: 0.5, filters: het });
        roc.add_roc_line(&RocLine { score: 5.0, weight: 0.0, filters: het });

        let written = write_roc_tables(&roc, &folder, &RocScoreField::default(), |_| 4).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written[0].ends_with("weighted_roc.tsv.gz"));

        let mut text = String::new();
        flate2::read::MultiGzDecoder::new(File::open(&written[1]).unwrap())
            .read_to_string(&mut text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("#varsync_version"));
        assert_eq!(lines[2], "#score_field: FORMAT.GQ");
        assert_eq!(lines[3], "#sort_order: descending");
        assert_eq!(lines[4], "#total_baseline_variants: 4");
        assert_eq!(lines[5], "score\ttrue_positives\tfalse_positives");
        assert_eq!(lines[6..].to_vec(), vec!["20.0\t0.5\t0", "10.0\t1.5\t0", "5.0\t1.5\t1"]);

        // no homozygous calls at all
        let mut text = String::new();
        flate2::read::MultiGzDecoder::new(File::open(&written[2]).unwrap())
            .read_to_string(&mut text).unwrap();
        assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 0);
        std::fs::remove_dir_all(&folder).unwrap();
    }
}
