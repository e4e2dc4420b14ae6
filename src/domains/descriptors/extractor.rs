//! Descriptor extraction.
//!
//! Turns a [`Candidate`] into the protocol-visible metadata for a tool or a
//! resource. Extraction is a pure transformation: it touches neither the
//! registry nor the filesystem.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

use super::error::ExtractionError;
use super::schema::{ParamSpec, ParamType, input_schema};
use super::template::UriTemplate;
use crate::domains::discovery::{Candidate, ParamDecl, SourceLocation};

/// Method namespaces and names used by MCP itself.
pub const RESERVED_IDENTIFIERS: &[&str] = &[
    "completion",
    "elicitation",
    "initialize",
    "logging",
    "notifications",
    "ping",
    "prompts",
    "resources",
    "roots",
    "sampling",
    "tools",
];

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]{1,64}$")
        .unwrap_or_else(|e| unreachable!("invalid identifier pattern: {e}"))
});

/// Metadata of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier.
    pub name: String,

    /// Documentation shown to callers. May be empty.
    pub description: String,

    /// Declared inputs in declaration order.
    pub params: Vec<ParamSpec>,

    /// Where the tool was declared.
    pub source: SourceLocation,
}

impl ToolDescriptor {
    /// JSON Schema of the tool's input object.
    pub fn input_schema(&self) -> Map<String, Value> {
        input_schema(&self.params)
    }
}

/// Metadata of a registered resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDescriptor {
    /// URI template, the registry key.
    #[serde(rename = "uri_template", serialize_with = "serialize_template")]
    pub template: UriTemplate,

    /// Display name.
    pub name: String,

    pub description: String,

    /// MIME type of the produced content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// One parameter per placeholder, in declaration order.
    pub params: Vec<ParamSpec>,

    pub source: SourceLocation,
}

impl ResourceDescriptor {
    /// The URI template as written.
    pub fn uri_template(&self) -> &str {
        self.template.as_str()
    }

    /// Placeholder names in template order.
    pub fn placeholders(&self) -> &[String] {
        self.template.placeholders()
    }
}

fn serialize_template<S: serde::Serializer>(
    template: &UriTemplate,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(template.as_str())
}

/// The descriptor extracted from a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Tool(ToolDescriptor),
    Resource(ResourceDescriptor),
}

impl Descriptor {
    /// Registry key: tool name or URI template.
    pub fn key(&self) -> &str {
        match self {
            Self::Tool(tool) => &tool.name,
            Self::Resource(resource) => resource.uri_template(),
        }
    }
}

/// Derive the descriptor of a candidate.
pub fn extract(candidate: &Candidate) -> Result<Descriptor, ExtractionError> {
    let function = &candidate.function;
    let location = &candidate.location;
    let description = function.description.as_deref().unwrap_or_default().trim().to_string();
    let params = extract_params(&function.params, location)?;

    match (&function.tool, &function.resource) {
        (Some(_), Some(_)) => Err(ExtractionError::ConflictingMarks {
            location: location.clone(),
        }),
        (Some(mark), None) => {
            let name = mark.name.clone().unwrap_or_else(|| function.name.clone());
            validate_identifier(&name, location)?;
            Ok(Descriptor::Tool(ToolDescriptor {
                name,
                description,
                params,
                source: location.clone(),
            }))
        }
        (None, Some(mark)) => {
            let template =
                UriTemplate::parse(&mark.uri).map_err(|source| ExtractionError::InvalidTemplate {
                    template: mark.uri.clone(),
                    source,
                    location: location.clone(),
                })?;
            check_placeholders(&template, &params, location)?;

            let name = mark.name.clone().unwrap_or_else(|| function.name.clone());
            if name.trim().is_empty() {
                return Err(ExtractionError::EmptyIdentifier {
                    location: location.clone(),
                });
            }

            Ok(Descriptor::Resource(ResourceDescriptor {
                template,
                name,
                description,
                mime_type: mark.mime_type.clone(),
                params,
                source: location.clone(),
            }))
        }
        (None, None) => Err(ExtractionError::Unmarked {
            location: location.clone(),
        }),
    }
}

fn validate_identifier(name: &str, location: &SourceLocation) -> Result<(), ExtractionError> {
    if name.is_empty() {
        return Err(ExtractionError::EmptyIdentifier {
            location: location.clone(),
        });
    }
    if !IDENTIFIER.is_match(name) {
        return Err(ExtractionError::InvalidIdentifier {
            name: name.to_string(),
            location: location.clone(),
        });
    }
    if RESERVED_IDENTIFIERS.contains(&name.to_lowercase().as_str()) {
        return Err(ExtractionError::ReservedIdentifier {
            name: name.to_string(),
            location: location.clone(),
        });
    }
    Ok(())
}

fn extract_params(
    decls: &[ParamDecl],
    location: &SourceLocation,
) -> Result<Vec<ParamSpec>, ExtractionError> {
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(decls.len());

    for (index, decl) in decls.iter().enumerate() {
        if decl.name.trim().is_empty() {
            return Err(ExtractionError::EmptyParamName {
                index,
                location: location.clone(),
            });
        }
        if !seen.insert(decl.name.as_str()) {
            return Err(ExtractionError::DuplicateParam {
                param: decl.name.clone(),
                location: location.clone(),
            });
        }

        let kind = match decl.kind.as_deref() {
            Some(name) => name.parse::<ParamType>().map_err(|reason| ExtractionError::UnknownType {
                param: decl.name.clone(),
                reason,
                location: location.clone(),
            })?,
            None => ParamType::Any,
        };

        if let Some(default) = &decl.default
            && !kind.accepts(default)
        {
            return Err(ExtractionError::InvalidDefault {
                param: decl.name.clone(),
                expected: kind.to_string(),
                location: location.clone(),
            });
        }

        let required = decl.default.is_none() && !decl.optional;
        params.push(ParamSpec {
            name: decl.name.clone(),
            kind,
            required,
            default: decl.default.clone(),
            description: decl.description.as_deref().unwrap_or_default().trim().to_string(),
        });
    }

    Ok(params)
}

fn check_placeholders(
    template: &UriTemplate,
    params: &[ParamSpec],
    location: &SourceLocation,
) -> Result<(), ExtractionError> {
    if let Some(placeholder) = template
        .placeholders()
        .iter()
        .find(|p| !params.iter().any(|param| &param.name == *p))
    {
        return Err(ExtractionError::PlaceholderWithoutParam {
            placeholder: placeholder.clone(),
            location: location.clone(),
        });
    }

    if let Some(param) = params
        .iter()
        .find(|param| !template.placeholders().contains(&param.name))
    {
        return Err(ExtractionError::ParamWithoutPlaceholder {
            param: param.name.clone(),
            location: location.clone(),
        });
    }

    Ok(())
}
