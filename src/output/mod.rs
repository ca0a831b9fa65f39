//! Result rendering for the CLI.
//!
//! - `OutputWriter`: Writes outcomes, events and config documents as text,
//!   JSON or NDJSON

mod writer;

pub use writer::OutputWriter;
