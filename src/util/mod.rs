/// Helper functions for read/writing JSON via serde
pub mod json_io;
/// Shared-tail immutable list used by the search state
pub mod persistent_list;
/// Helper functions for generating the progress bars
pub mod progress_bar;
