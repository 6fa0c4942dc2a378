use std::path::{Path, PathBuf};

/// The tabix index path that sits next to a bgzipped VCF, i.e. `<vcf_fn>.tbi`
pub fn tabix_filename(vcf_fn: &Path) -> PathBuf {
    let mut tbi_fn = vcf_fn.to_owned().into_os_string();
    tbi_fn.push(".tbi");
    PathBuf::from(tbi_fn)
}

/// Builds a tabix index for a finished, coordinate-sorted .vcf.gz and writes it to `tabix_filename(vcf_fn)`.
/// # Arguments
/// * `vcf_fn` - the filename to index
/// # Errors
/// * if the VCF cannot be read or is not sorted
/// * if the index cannot be written
pub fn index_vcf(vcf_fn: &Path) -> anyhow::Result<PathBuf> {
    let index = noodles::vcf::fs::index(vcf_fn)?;
    let tbi_fn = tabix_filename(vcf_fn);
    noodles::tabix::fs::write(&tbi_fn, &index)?;
    Ok(tbi_fn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tabix_filename() {
        assert_eq!(tabix_filename(Path::new("out/tp.vcf.gz")), PathBuf::from("out/tp.vcf.gz.tbi"));
    }
}
