//! Request, response and configuration types for the span analysis API.
//!
//! All types serialize as camelCase JSON and derive [`schemars::JsonSchema`] so
//! the API surface can be published as a schema.

mod common;
mod request;
mod response;

pub use common::{CaseSensitivity, MaskingLevel};
pub use request::{AnalysisOptions, AnalyzeRequest, Dialect, DEFAULT_MAX_FIXPOINT_ITERATIONS};
pub use response::{
    ColumnResource, MaskingAttributes, QuerySpan, QuerySpanResult, SensitiveField,
    SourceColumnSet,
};
