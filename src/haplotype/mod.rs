/// Replays the search state for a single haplotype
pub mod playback;
/// One side of the search, with its two haplotypes
pub mod half_path;
/// Joint called and baseline state
pub mod path;
