use anyhow::{Context, anyhow};
use indexmap::IndexMap;
use log::debug;
use noodles::bed::io::reader::Builder as BedBuilder;
use noodles::bed::{io::Reader as BedReader, Record as BedRecord};
use noodles::core::Region;
use noodles::core::region::Interval;
use noodles::vcf;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::writers::noodles_idx::tabix_filename;

/// Wrapper function that handles both gzip compressed and uncompressed BED files
/// # Arguments
/// * `filename` - path to the .bed(.gz) file to open
pub fn open_bed_file(filename: &Path) -> anyhow::Result<BedReader<3, BufReader<Box<dyn std::io::Read>>>> {
    let is_compressed = match filename.extension() {
        Some(extension) => {
            extension == "gz"
        },
        None => false
    };

    let buf_reader: Box<dyn std::io::Read> = if is_compressed {
        #[allow(clippy::default_constructed_unit_structs)]
        let bgzf_reader = noodles::bgzf::io::reader::Builder::default()
            .build_from_path(filename)
            .with_context(|| format!("Error while loading {filename:?}:"))?;
        Box::new(bgzf_reader)
    } else {
        Box::new(std::fs::File::open(filename)?)
    };

    #[allow(clippy::default_constructed_unit_structs)]
    let bed_reader = BedBuilder::<3>::default()
        .build_from_reader(buf_reader);
    Ok(bed_reader)
}

/// A pre-loaded BED file where chromosome order is supported and the intervals are sorted.
pub struct LoadedBed {
    /// Map from chromosome to the sorted intervals
    chrom_lookup: IndexMap<String, Vec<Interval>>
}

impl LoadedBed {
    /// This will load an entire BED file into memory, preserving chromosome order but also sorting any intervals if they are not sorted already.
    /// # Arguments
    /// * `filename` - path to the .bed(.gz) file to open
    pub fn preload_bed_file(filename: &Path) -> anyhow::Result<Self> {
        debug!("Pre-loading {filename:?}...");
        let mut bed_handle = open_bed_file(filename)?;

        let mut record = BedRecord::<3>::default();
        let mut chrom_lookup: IndexMap<String, Vec<Interval>> = Default::default();
        while bed_handle.read_record(&mut record)? > 0 {
            let chrom = record.reference_sequence_name().to_string();
            let start = record.feature_start()
                .with_context(|| format!("Error while parsing start for record: {record:?}"))?;
            let end = record.feature_end()
                .unwrap_or(Err(std::io::Error::other("Missing end")))
                .with_context(|| format!("Error while parsing end for record: {record:?}"))?;
            let interval = Interval::from(start..=end);

            let entry = chrom_lookup.entry(chrom.clone()).or_default();
            entry.push(interval);
        }

        for (chrom, interval_set) in chrom_lookup.iter_mut() {
            let num_entries = interval_set.len();
            if !interval_set.is_sorted_by_key(|i| (i.start(), i.end())) {
                debug!("Sorting {num_entries} BED entries for {chrom}...");
                interval_set.sort_by_key(|i| (i.start(), i.end()));
            } else {
                debug!("Found {num_entries} sorted BED entries for {chrom}.");
            }
        }

        Ok(Self {
            chrom_lookup
        })
    }

    // getters
    pub fn chrom_lookup(&self) -> &IndexMap<String, Vec<Interval>> {
        &self.chrom_lookup
    }
}

/// A bgzipped VCF with its tabix index, queried one reference sequence at a time.
/// Unlike the generic indexed readers, this is `Send`, so it can sit behind the worker locks.
pub struct IndexedVcf {
    /// Where the file came from, for error messages
    filename: PathBuf,
    /// Reader over the BGZF blocks
    reader: vcf::io::Reader<noodles::bgzf::io::Reader<File>>,
    /// The parsed .tbi file
    index: noodles::tabix::Index,
    /// The parsed header
    header: vcf::Header
}

impl IndexedVcf {
    /// Opens a .vcf.gz and the .tbi next to it
    /// # Arguments
    /// * `filename` - the VCF to open
    /// # Errors
    /// * if either the VCF or its index cannot be read
    pub fn open(filename: &Path) -> anyhow::Result<Self> {
        let file = File::open(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;
        let mut reader = vcf::io::Reader::new(noodles::bgzf::io::Reader::new(file));
        let header = reader.read_header()
            .with_context(|| format!("Error while reading header of {filename:?}:"))?;

        let tbi_fn = tabix_filename(filename);
        let index = noodles::tabix::fs::read(&tbi_fn)
            .with_context(|| format!("Error while reading index {tbi_fn:?}:"))?;

        Ok(Self {
            filename: filename.to_owned(),
            reader,
            index,
            header
        })
    }

    /// Loads every record on a reference sequence, in file order.
    /// A sequence the index does not know about has no records.
    /// # Arguments
    /// * `sequence_name` - the reference sequence to load
    pub fn query_sequence(&mut self, sequence_name: &str) -> anyhow::Result<Vec<vcf::variant::RecordBuf>> {
        let region = Region::new(sequence_name, ..);
        let query = match self.reader.query(&self.header, &self.index, &region) {
            Ok(q) => q,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                debug!("No index entries for {sequence_name} in {:?}", self.filename);
                return Ok(vec![]);
            },
            Err(e) => {
                return Err(e).with_context(|| format!("Error while querying {sequence_name} in {:?}:", self.filename));
            }
        };

        let mut records = vec![];
        for result in query {
            let record = result
                .with_context(|| format!("Error while reading {sequence_name} in {:?}:", self.filename))?;
            let record_buf = vcf::variant::RecordBuf::try_from_variant_record(&self.header, &record)?;
            records.push(record_buf);
        }
        Ok(records)
    }

    /// Finds the index of a sample by name, or the first sample if no name is given
    /// # Arguments
    /// * `sample_name` - the sample to look up
    pub fn sample_index(&self, sample_name: Option<&str>) -> anyhow::Result<usize> {
        match sample_name {
            Some(name) => self.header.sample_names().get_index_of(name)
                .ok_or(anyhow!("Sample {name:?} was not found in {:?}", self.filename)),
            None => {
                if self.header.sample_names().is_empty() {
                    Err(anyhow!("No samples were found in {:?}", self.filename))
                } else {
                    Ok(0)
                }
            }
        }
    }

    // getters
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn header(&self) -> &vcf::Header {
        &self.header
    }
}

/// This will open a VCF file and retrieve the sample name at the given index
/// # Arguments
/// * `vcf_fn` - the VCF filename to open
/// * `index` - the index of the sample to return; 0 = first sample
pub fn get_vcf_sample_name(vcf_fn: &Path, index: usize) -> anyhow::Result<String> {
    let vcf_reader = IndexedVcf::open(vcf_fn)?;
    let sample_name = vcf_reader.header().sample_names().get_index(index)
        .ok_or(anyhow!("Sample index {index} does not exist."))?
        .clone();
    Ok(sample_name)
}
