//! Descriptors domain module.
//!
//! Converts discovered candidates into the metadata advertised to MCP
//! clients: tool names, descriptions, parameter schemas and resource URI
//! templates.
//!
//! ## Architecture
//!
//! - `extractor.rs` - Candidate to descriptor conversion
//! - `schema.rs` - Closed parameter type set and JSON Schema rendering
//! - `template.rs` - URI template parsing and matching
//! - `error.rs` - Extraction errors

mod error;
mod extractor;
mod schema;
mod template;

pub use error::{ExtractionError, TemplateError};
pub use extractor::{
    Descriptor, RESERVED_IDENTIFIERS, ResourceDescriptor, ToolDescriptor, extract,
};
pub use schema::{ParamSpec, ParamType, input_schema};
pub use template::UriTemplate;
