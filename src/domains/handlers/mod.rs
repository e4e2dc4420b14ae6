//! Handlers domain module.
//!
//! Binds a candidate's body to something that can be invoked. Binding is
//! kept apart from descriptor extraction: extraction only reads metadata,
//! binding resolves builtins and prepares commands.
//!
//! ## Architecture
//!
//! - `handler.rs` - The `FunctionHandler` trait and handler output
//! - `command.rs` - External programs
//! - `text.rs` - Inline text templates
//! - `builtin.rs` - Native handlers and their catalog
//! - `render.rs` - `{{param}}` substitution shared by command and text bodies
//! - `error.rs` - Handler failures

mod builtin;
mod command;
mod error;
mod handler;
mod render;
mod text;

use std::sync::Arc;

pub use builtin::{Builtin, BuiltinCatalog, BuiltinHandler, EchoBuiltin, NowBuiltin, SleepBuiltin};
pub use command::CommandHandler;
pub use error::HandlerFailure;
pub use handler::{FunctionHandler, Output};
pub use render::{render, value_to_text};
pub use text::TextHandler;

use crate::domains::descriptors::ExtractionError;
use crate::domains::discovery::Candidate;

/// Build the handler for a candidate's body.
///
/// Exactly one of `command`, `text` or `builtin` must be declared.
pub fn bind(
    candidate: &Candidate,
    catalog: &BuiltinCatalog,
) -> Result<Arc<dyn FunctionHandler>, ExtractionError> {
    let function = &candidate.function;
    let location = || candidate.location.clone();

    match (&function.command, &function.text, &function.builtin) {
        (Some(argv), None, None) => {
            if argv.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(ExtractionError::EmptyCommand { location: location() });
            }
            Ok(Arc::new(CommandHandler::new(
                argv.clone(),
                candidate.module.clone(),
                function.output,
            )))
        }
        (None, Some(template), None) => {
            Ok(Arc::new(TextHandler::new(template.clone(), function.output)))
        }
        (None, None, Some(name)) => {
            let builtin = catalog.get(name).ok_or_else(|| ExtractionError::UnknownBuiltin {
                name: name.clone(),
                location: location(),
            })?;
            Ok(Arc::new(BuiltinHandler::new(builtin)))
        }
        (None, None, None) => Err(ExtractionError::MissingBody { location: location() }),
        _ => Err(ExtractionError::ConflictingBodies { location: location() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::discovery::ModuleManifest;
    use serde_json::Map;
    use std::path::Path;

    /// Bind a single tool named `a` whose body is given as TOML lines.
    fn bind_one(body: &str) -> Result<Arc<dyn FunctionHandler>, ExtractionError> {
        let source = format!("[[function]]\nname = \"a\"\n{body}tool = {{}}\n");
        let candidates = ModuleManifest::parse(&source)
            .unwrap()
            .into_candidates(Path::new("/mods/test.toml"));
        bind(&candidates[0], &BuiltinCatalog::with_defaults())
    }

    #[test]
    fn test_bind_each_body() {
        assert_eq!(bind_one("command = [\"ls\"]\n").unwrap().kind(), "command");
        assert_eq!(bind_one("text = \"x\"\n").unwrap().kind(), "text");
        assert_eq!(bind_one("builtin = \"echo\"\n").unwrap().kind(), "builtin");
    }

    #[test]
    fn test_bind_errors() {
        let err = bind_one("").err().unwrap();
        assert!(matches!(err, ExtractionError::MissingBody { .. }));

        let err = bind_one("text = \"x\"\nbuiltin = \"echo\"\n").err().unwrap();
        assert!(matches!(err, ExtractionError::ConflictingBodies { .. }));

        let err = bind_one("command = []\n").err().unwrap();
        assert!(matches!(err, ExtractionError::EmptyCommand { .. }));

        let err = bind_one("builtin = \"nope\"\n").err().unwrap();
        assert!(matches!(err, ExtractionError::UnknownBuiltin { ref name, .. } if name == "nope"));
    }

    #[tokio::test]
    async fn test_bound_text_handler_runs() {
        let handler = bind_one("text = \"hi\"\noutput = \"text\"\n").unwrap();
        assert_eq!(handler.call(Map::new()).await.unwrap(), Output::Text("hi".to_string()));
    }
}
