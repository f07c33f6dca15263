//! External media fetcher invocation
//!
//! - [`FetchOption`] and [`build_args`]: deterministic flag serialization
//! - [`MediaFetcher`]: the seam the pipeline calls
//! - [`CliFetcher`]: runs a youtube-dl compatible binary and parses its
//!   `--print-json` output

mod cli;
mod options;
mod parser;
mod traits;

pub use cli::CliFetcher;
pub use options::{FetchOption, build_args, default_options};
pub use parser::{check_media_id, parse_fetch_output};
pub use traits::MediaFetcher;
