//! Function module manifest schema.
//!
//! A function module is a TOML file. It declares an optional `[module]`
//! header and any number of `[[function]]` entries:
//!
//! ```toml
//! [module]
//! description = "Arithmetic helpers"
//! requires = ["sh"]
//!
//! [[function]]
//! name = "add"
//! description = "Add two integers."
//! params = [
//!     { name = "a", type = "integer" },
//!     { name = "b", type = "integer" },
//! ]
//! command = ["sh", "-c", "echo $(( {{a}} + {{b}} ))"]
//! tool = {}
//! ```
//!
//! Only functions carrying a `tool` or `resource` table are candidates for
//! registration; the others are private to the module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File extension of function modules.
pub const MODULE_EXTENSION: &str = "toml";

/// A parsed function module.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Module header.
    #[serde(default)]
    pub module: ModuleHeader,

    /// Declared functions, in file order.
    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionDecl>,
}

/// Module-level settings shared by every function of the module.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleHeader {
    /// Free-form description of the module.
    #[serde(default)]
    pub description: String,

    /// Programs that must be resolvable before the module can load.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Command run once when the module is loaded.
    #[serde(default)]
    pub init: Option<Vec<String>>,

    /// Environment variables passed to every command of the module.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A single `[[function]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionDecl {
    /// Function name. Also the default tool identifier.
    pub name: String,

    /// Attached documentation.
    #[serde(default)]
    pub description: Option<String>,

    /// Declared inputs, in order.
    #[serde(default)]
    pub params: Vec<ParamDecl>,

    /// Tool capability tag.
    #[serde(default)]
    pub tool: Option<ToolMark>,

    /// Resource capability tag.
    #[serde(default)]
    pub resource: Option<ResourceMark>,

    /// Body: external program and its arguments.
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Body: inline text template.
    #[serde(default)]
    pub text: Option<String>,

    /// Body: native handler compiled into the host.
    #[serde(default)]
    pub builtin: Option<String>,

    /// How the handler output is interpreted.
    #[serde(default)]
    pub output: OutputFormat,

    /// Per-call timeout overriding the server default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl FunctionDecl {
    /// Whether the function carries a capability tag.
    pub fn is_marked(&self) -> bool {
        self.tool.is_some() || self.resource.is_some()
    }
}

/// Marks a function as a tool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolMark {
    /// Explicit tool identifier.
    #[serde(default)]
    pub name: Option<String>,
}

/// Marks a function as a resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceMark {
    /// URI template, e.g. `file://data/{id}`.
    pub uri: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// MIME type of the produced content.
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// A declared function input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,

    /// Declared type name. Absent means "any".
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Default value. Its presence makes the parameter optional.
    #[serde(default)]
    pub default: Option<Value>,

    /// Optional without a default (the handler sees nothing).
    #[serde(default)]
    pub optional: bool,
}

/// Interpretation of handler output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON when the output parses as JSON, text otherwise.
    #[default]
    Auto,
    Text,
    Json,
}

/// Where a candidate was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path of the module file.
    pub path: PathBuf,

    /// Position of the function in the module.
    pub index: usize,

    /// Declared function name.
    pub function: String,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.function)
    }
}

/// Context shared by every candidate of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContext {
    /// Path of the module file.
    pub path: PathBuf,

    /// Working directory for the module's commands.
    pub dir: PathBuf,

    /// Environment for the module's commands.
    pub env: BTreeMap<String, String>,
}

impl ModuleContext {
    /// The directory is made absolute: commands run with it as their
    /// working directory and module-relative programs are joined onto it.
    pub fn new(path: &Path, header: &ModuleHeader) -> Self {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = std::path::absolute(parent).unwrap_or_else(|_| parent.to_path_buf());
        Self {
            path: path.to_path_buf(),
            dir,
            env: header.env.clone(),
        }
    }
}

/// A marked function found during scanning, not yet validated.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub function: FunctionDecl,
    pub location: SourceLocation,
    pub module: Arc<ModuleContext>,
}

impl ModuleManifest {
    /// Parse a manifest from TOML source.
    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Split the manifest into candidates, dropping unmarked functions.
    pub fn into_candidates(self, path: &Path) -> Vec<Candidate> {
        let module = Arc::new(ModuleContext::new(path, &self.module));
        self.functions
            .into_iter()
            .enumerate()
            .filter(|(_, function)| function.is_marked())
            .map(|(index, function)| Candidate {
                location: SourceLocation {
                    path: path.to_path_buf(),
                    index,
                    function: function.name.clone(),
                },
                function,
                module: module.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = r#"
        [module]
        description = "demo"
        env = { GREETING = "hi" }

        [[function]]
        name = "add"
        description = "Add two integers."
        params = [
            { name = "a", type = "integer" },
            { name = "b", type = "integer", default = 0 },
        ]
        command = ["sh", "-c", "echo $(( {{a}} + {{b}} ))"]
        tool = {}

        [[function]]
        name = "helper"
        text = "not exported"

        [[function]]
        name = "item"
        params = [{ name = "id" }]
        text = "item {{id}}"
        resource = { uri = "file://data/{id}", mime_type = "text/plain" }
    "#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ModuleManifest::parse(MODULE).unwrap();
        assert_eq!(manifest.module.description, "demo");
        assert_eq!(manifest.functions.len(), 3);
        assert_eq!(manifest.functions[0].params[1].default, Some(serde_json::json!(0)));
        assert_eq!(manifest.functions[0].output, OutputFormat::Auto);
    }

    #[test]
    fn test_unmarked_functions_are_ignored() {
        let manifest = ModuleManifest::parse(MODULE).unwrap();
        let candidates = manifest.into_candidates(Path::new("/mods/demo.toml"));

        let names: Vec<_> = candidates.iter().map(|c| c.function.name.as_str()).collect();
        assert_eq!(names, vec!["add", "item"]);
        assert_eq!(candidates[1].location.index, 2);
        assert_eq!(candidates[1].location.to_string(), "/mods/demo.toml#item");
        assert_eq!(candidates[0].module.dir, PathBuf::from("/mods"));
        assert_eq!(candidates[0].module.env.get("GREETING").map(String::as_str), Some("hi"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = ModuleManifest::parse("[[function]]\nname = \"x\"\ncomand = [\"ls\"]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_module() {
        let manifest = ModuleManifest::parse("").unwrap();
        assert!(manifest.functions.is_empty());
    }

    #[test]
    fn test_module_dir_is_absolute() {
        let header = ModuleHeader::default();
        let context = ModuleContext::new(Path::new("functions/math.toml"), &header);
        assert!(context.dir.is_absolute());
        assert!(context.dir.ends_with("functions"));
        assert_eq!(context.path, PathBuf::from("functions/math.toml"));

        let bare = ModuleContext::new(Path::new("math.toml"), &ModuleHeader::default());
        assert!(bare.dir.is_absolute());
        assert!(bare.dir.starts_with(std::env::current_dir().unwrap()));
    }
}
