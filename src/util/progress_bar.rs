use indicatif::{ProgressState, ProgressStyle};

/// Progress bar styling for the per-sequence evaluation; `{msg}` carries the sequence currently being written
pub fn get_progress_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} sequences ({percent}); ETA: {eta_precise} {msg}")
        .unwrap()
        .with_key("percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| write!(w, "{:.1}%", state.fraction()*100.0).unwrap())
        .progress_chars("##-")
}
