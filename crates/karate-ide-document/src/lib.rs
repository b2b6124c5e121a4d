//! Feature-file parsing for the Karate IDE tooling.
//!
//! The parser is intentionally forgiving: it makes a single forward pass over
//! the document, recognises the handful of line shapes the test explorer
//! cares about (tags, `Feature:`, `Scenario:`/`Scenario Outline:`,
//! `Examples:` tables) and ignores everything else. There is no notion of a
//! syntax error; text without a `Feature:` line simply yields no document.
//!
//! ```
//! use karate_ide_document::parse;
//!
//! let feature = parse("@slow\nFeature: F\n  Scenario: S\n    Given x\n");
//! let feature = feature.as_ref().map(|f| (f.title.as_str(), f.scenarios.len()));
//! assert_eq!(feature, Some(("Feature: F", 1)));
//! ```

mod errors;
mod line;
mod model;
mod parser;

pub use errors::DocumentError;
pub use line::{LineKind, classify};
pub use model::{Example, Feature, Scenario};
pub use parser::{parse, parse_file};
