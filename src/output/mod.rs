//! Report output: flat JSON dumps and terminal summaries.

pub mod json;
pub mod terminal;

pub use json::{to_json, to_json_pretty, DumpValue, SampleDump};
pub use terminal::{format_report, RenderOptions};
