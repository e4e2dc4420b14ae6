//! Module scanner.
//!
//! Walks the configured roots, loads every function module it finds and
//! yields the marked functions inside. A unit that fails to load produces a
//! [`ScanWarning`] and the walk moves on to the next unit.

use futures::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use super::error::{LoadError, ScanWarning};
use super::manifest::{Candidate, MODULE_EXTENSION, ModuleContext, ModuleManifest};

/// One item produced by a scan.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A marked function ready for extraction.
    Candidate(Candidate),

    /// A unit or root that was skipped.
    Warning(ScanWarning),
}

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on loading a single unit, `init` command included.
    pub load_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(10),
        }
    }
}

/// Discovers function modules beneath a set of roots.
#[derive(Debug, Clone, Default)]
pub struct ModuleScanner {
    options: ScanOptions,
}

impl ModuleScanner {
    /// Create a new scanner.
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Scan the roots, in order.
    ///
    /// The returned stream is lazy: a root is walked when the stream reaches
    /// it and each unit is loaded when it is polled.
    pub fn scan(&self, roots: &[PathBuf]) -> impl Stream<Item = ScanEvent> + Send + 'static {
        let load_timeout = self.options.load_timeout;

        stream::iter(roots.to_vec())
            .then(walk_root)
            .flat_map(stream::iter)
            .then(move |unit| async move {
                match unit {
                    Ok(path) => match load_unit(&path, load_timeout).await {
                        Ok(candidates) => {
                            debug!(
                                path = %path.display(),
                                candidates = candidates.len(),
                                "Loaded module"
                            );
                            candidates.into_iter().map(ScanEvent::Candidate).collect()
                        }
                        Err(error) => vec![ScanEvent::Warning(ScanWarning::new(&path, error))],
                    },
                    Err(warning) => vec![ScanEvent::Warning(warning)],
                }
            })
            .flat_map(stream::iter)
    }

    /// Scan the roots and collect every event.
    pub async fn scan_all(&self, roots: &[PathBuf]) -> Vec<ScanEvent> {
        self.scan(roots).collect().await
    }
}

/// [`enumerate_units`] on the blocking pool.
async fn walk_root(root: PathBuf) -> Vec<Result<PathBuf, ScanWarning>> {
    let location = root.clone();
    tokio::task::spawn_blocking(move || enumerate_units(&root))
        .await
        .unwrap_or_else(|e| {
            vec![Err(ScanWarning::new(location, LoadError::Background(e.to_string())))]
        })
}

/// List the module units beneath one root in lexical order.
///
/// Hidden entries are not descended into, and module files whose name
/// starts with `_` are private to their directory.
pub fn enumerate_units(root: &Path) -> Vec<Result<PathBuf, ScanWarning>> {
    if !root.exists() {
        return vec![Err(ScanWarning::new(root, LoadError::MissingRoot))];
    }

    if root.is_file() {
        return if is_module_file(root) {
            vec![Ok(root.to_path_buf())]
        } else {
            vec![Err(ScanWarning::new(root, LoadError::NotAModule))]
        };
    }

    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(|entry| match entry {
            Ok(entry)
                if entry.file_type().is_file()
                    && is_module_file(entry.path())
                    && !is_private(entry.file_name()) =>
            {
                Some(Ok(entry.into_path()))
            }
            Ok(_) => None,
            Err(e) => {
                let location = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                Some(Err(ScanWarning::new(location, LoadError::Walk(e.to_string()))))
            }
        })
        .collect()
}

fn is_module_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MODULE_EXTENSION)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_private(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('_')
}

/// Load a single unit under the per-unit timeout.
pub async fn load_unit(path: &Path, load_timeout: Duration) -> Result<Vec<Candidate>, LoadError> {
    tokio::time::timeout(load_timeout, load_unit_inner(path))
        .await
        .map_err(|_| LoadError::Timeout(load_timeout))?
}

async fn load_unit_inner(path: &Path) -> Result<Vec<Candidate>, LoadError> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::Read(e.to_string()))?;

    let manifest = ModuleManifest::parse(&source)
        .map_err(|e| LoadError::Parse(e.message().trim().to_string()))?;
    let context = ModuleContext::new(path, &manifest.module);

    if !manifest.module.requires.is_empty() {
        let requires = manifest.module.requires.clone();
        let dir = context.dir.clone();
        tokio::task::spawn_blocking(move || check_requires(&requires, &dir))
            .await
            .map_err(|e| LoadError::Background(e.to_string()))??;
    }

    if let Some(init) = &manifest.module.init {
        run_init(init, &context).await?;
    }

    Ok(manifest.into_candidates(path))
}

/// Look up every required program on `PATH`, relative to the module directory.
fn check_requires(requires: &[String], dir: &Path) -> Result<(), LoadError> {
    let path = std::env::var_os("PATH");
    for program in requires {
        which::which_in(program, path.clone(), dir)
            .map_err(|_| LoadError::MissingDependency(program.clone()))?;
    }
    Ok(())
}

/// Run a module's `init` command. The child is killed if loading is abandoned.
async fn run_init(argv: &[String], context: &ModuleContext) -> Result<(), LoadError> {
    let (program, args) = argv.split_first().ok_or(LoadError::EmptyInit)?;

    let output = Command::new(program)
        .args(args)
        .current_dir(&context.dir)
        .envs(&context.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| LoadError::InitSpawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(LoadError::InitFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VALID: &str = r#"
        [[function]]
        name = "lookup"
        params = [{ name = "key", type = "string" }]
        text = "value of {{key}}"
        tool = {}

        [[function]]
        name = "greet"
        text = "hello"
        tool = { name = "say_hello" }
    "#;

    fn module(name: &str) -> String {
        format!("[[function]]\nname = \"{name}\"\ntext = \"\"\ntool = {{}}\n")
    }

    fn names(events: &[ScanEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Candidate(c) => Some(c.function.name.clone()),
                ScanEvent::Warning(_) => None,
            })
            .collect()
    }

    fn warnings(events: &[ScanEvent]) -> Vec<&ScanWarning> {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Warning(w) => Some(w),
                ScanEvent::Candidate(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_broken_module_does_not_stop_scan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a_broken.toml"), "[[function]\nname = ").unwrap();
        fs::write(dir.path().join("b_valid.toml"), VALID).unwrap();

        let events = ModuleScanner::default().scan_all(&[dir.path().to_path_buf()]).await;

        assert_eq!(names(&events), vec!["lookup", "greet"]);
        let warnings = warnings(&events);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].location.ends_with("a_broken.toml"));
        assert!(matches!(warnings[0].error, LoadError::Parse(_)));
    }

    #[tokio::test]
    async fn test_lexical_order_and_recursion() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/m.toml"), module("second")).unwrap();
        fs::write(dir.path().join("a.toml"), module("first")).unwrap();
        fs::write(dir.path().join("z.toml"), module("third")).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".hidden/x.toml"), "not even toml [").unwrap();
        fs::write(dir.path().join("_private.toml"), module("private")).unwrap();
        fs::write(dir.path().join("nested/_shared.toml"), "broken [").unwrap();

        let events = ModuleScanner::default().scan_all(&[dir.path().to_path_buf()]).await;

        assert_eq!(names(&events), vec!["first", "second", "third"]);
        assert!(warnings(&events).is_empty());
    }

    #[tokio::test]
    async fn test_roots_keep_input_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("z.toml"), module("from_first")).unwrap();
        fs::write(second.path().join("a.toml"), module("from_second")).unwrap();

        let roots = vec![second.path().to_path_buf(), first.path().join("z.toml")];
        let events = ModuleScanner::default().scan_all(&roots).await;

        assert_eq!(names(&events), vec!["from_second", "from_first"]);
    }

    #[tokio::test]
    async fn test_missing_root_is_a_warning() {
        let events = ModuleScanner::default()
            .scan_all(&[PathBuf::from("/nonexistent/functions/12345")])
            .await;

        let warnings = warnings(&events);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].error, LoadError::MissingRoot);
    }

    #[tokio::test]
    async fn test_missing_dependency() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("needs.toml"),
            "[module]\nrequires = [\"definitely-not-a-real-program-12345\"]\n",
        )
        .unwrap();

        let events = ModuleScanner::default().scan_all(&[dir.path().to_path_buf()]).await;
        let warnings = warnings(&events);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0].error, LoadError::MissingDependency(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_init() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("init.toml"),
            format!(
                "[module]\ninit = [\"sh\", \"-c\", \"echo boom >&2; exit 3\"]\n\n{}",
                module("x")
            ),
        )
        .unwrap();

        let events = ModuleScanner::default().scan_all(&[dir.path().to_path_buf()]).await;
        assert!(names(&events).is_empty());
        match &warnings(&events)[0].error {
            LoadError::InitFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_init_times_out() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a_slow.toml"), "[module]\ninit = [\"sleep\", \"5\"]\n").unwrap();
        fs::write(dir.path().join("b_valid.toml"), VALID).unwrap();

        let scanner = ModuleScanner::new(ScanOptions {
            load_timeout: Duration::from_millis(200),
        });
        let events = scanner.scan_all(&[dir.path().to_path_buf()]).await;

        assert_eq!(names(&events), vec!["lookup", "greet"]);
        assert!(matches!(warnings(&events)[0].error, LoadError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.toml"), VALID).unwrap();
        let roots = vec![dir.path().to_path_buf()];
        let scanner = ModuleScanner::default();

        let first = scanner.scan_all(&roots).await;
        let second = scanner.scan_all(&roots).await;

        assert_eq!(names(&first), names(&second));
        let locations = |events: &[ScanEvent]| -> Vec<String> {
            events
                .iter()
                .filter_map(|e| match e {
                    ScanEvent::Candidate(c) => Some(c.location.to_string()),
                    ScanEvent::Warning(_) => None,
                })
                .collect()
        };
        assert_eq!(locations(&first), locations(&second));
    }
}
