use crate::context::Context;
use crate::error::{Result, TycoError};
use crate::lexer;
use crate::serialization::Value;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};

/// The result of a successful analysis of Tyco source. Holds the fully
/// rendered context plus its materialized output, and provides methods for
/// serialization and further inspection.
#[derive(Debug)]
pub struct Analysis {
    pub context: Context,
    value: Value,
}

impl Serialize for Analysis {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl Analysis {
    /// The rendered output: globals by name, then every struct with
    /// primary keys as an ordered list of instances.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }

    /// Serializes the rendered output into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the rendered output into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }
}

/// Analyzes a Tyco source string: lexing, schema binding, and the full
/// rendering pipeline.
///
/// This is the primary entry point for in-memory source. `file_name` is
/// used only for error reporting.
///
/// # Errors
///
/// Returns a `TycoError` if lexing or any rendering phase fails.
pub fn analyze(source: &str, file_name: &str) -> Result<Analysis> {
    let mut context = Context::new();
    lexer::process_source(&mut context, source, Some(file_name))?;
    finish(context)
}

/// Analyzes a file, or a directory tree of `.tyco` files.
///
/// A directory is walked recursively; the files found are loaded in sorted
/// path order into one shared context, so later files can reference structs
/// and globals from earlier ones.
///
/// # Errors
///
/// Returns a `TycoError` if a path cannot be read or analysis fails.
pub fn analyze_path(path: impl AsRef<Path>) -> Result<Analysis> {
    let path = path.as_ref();
    let mut context = Context::new();
    if path.is_dir() {
        let mut files = Vec::new();
        collect_tyco_files(path, &mut files)?;
        files.sort();
        for file in &files {
            lexer::process_path(&mut context, file)?;
        }
    } else {
        lexer::process_path(&mut context, path)?;
    }
    finish(context)
}

fn finish(mut context: Context) -> Result<Analysis> {
    context.render_content()?;
    let value = context.to_object();
    Ok(Analysis { context, value })
}

fn collect_tyco_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| TycoError::io(format!("cannot read directory {}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry
            .map_err(|e| TycoError::io(format!("cannot read directory {}: {e}", dir.display())))?;
        let path = entry.path();
        if path.is_dir() {
            collect_tyco_files(&path, out)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("tyco") {
            out.push(path);
        }
    }
    Ok(())
}
