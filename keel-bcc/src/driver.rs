//! Compilation driver: file in, class file out.
//!
//! Errors accumulate across parse, compile and link; the class file is
//! still written when possible so a broken build remains inspectable.
//! Only failing to read the source or to map the output aborts a file.

use crate::error::{CompileError, WriteError};
use crate::{compiler, linker, parse, writer};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Source files the compiler consumes.
pub const SOURCE_EXT: &str = "kasm";

/// Class files the compiler produces.
pub const CLASS_EXT: &str = "klz";

/// Everything a single compilation produced.
#[derive(Debug)]
pub struct Outcome {
    /// Dotted name of the compiled class; empty when no `CLZ` was found.
    pub class_name: String,
    /// Path of the written class file, when one could be written.
    pub output: Option<PathBuf>,
    /// Every diagnostic of the run, in accumulation order.
    pub errors: Vec<CompileError>,
    /// Classes this one references: extends, implements and imports.
    pub imports: Vec<String>,
}

/// Non-recoverable failures of a compilation run.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The source file could not be read.
    #[error("could not read '{path}': {source}")]
    Read {
        /// Source path.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },
    /// The output file could not be produced.
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Compile one source file into `<build_dir>/<dotted class path>.klz`.
pub fn compile_file(source: &Path, build_dir: &Path) -> Result<Outcome, DriverError> {
    let text = fs::read_to_string(source).map_err(|e| DriverError::Read {
        path: source.to_owned(),
        source: e,
    })?;
    debug!(path = %source.display(), bytes = text.len(), "parsing");
    let (ast, mut errors) = parse::parse(&text);

    let mut code = Vec::new();
    for proc in &ast.procedures {
        match compiler::compile(proc) {
            Ok(method) => {
                debug!(
                    method = %method.name,
                    words = method.instructions.len(),
                    stack = method.stack_size,
                    "compiled"
                );
                code.push(method);
            }
            Err(mut method_errors) => {
                warn!(method = %proc.name, count = method_errors.len(), "method dropped");
                errors.append(&mut method_errors);
            }
        }
    }

    let mut imports: Vec<String> = Vec::new();
    imports.extend(ast.extends.iter().cloned());
    imports.extend(ast.implements.iter().cloned());
    imports.extend(ast.imported_classes.iter().map(|(name, _)| name.clone()));

    if ast.name.is_empty() {
        return Ok(Outcome {
            class_name: String::new(),
            output: None,
            errors,
            imports,
        });
    }

    let (linked, mut link_errors) = linker::link(&ast, code);
    errors.append(&mut link_errors);

    let out_path = output_path(build_dir, &linked.name);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|e| WriteError::Create {
            path: parent.to_owned(),
            source: e,
        })?;
    }
    let layout = writer::write(&linked, &out_path)?;
    info!(
        class = %linked.name,
        path = %out_path.display(),
        bytes = layout.file_size,
        methods = linked.code.len(),
        "wrote class file"
    );

    Ok(Outcome {
        class_name: linked.name,
        output: Some(out_path),
        errors,
        imports,
    })
}

/// Breadth-first compilation of a file and its transitive import closure.
/// Imported class names map to sources under the working directory.
pub fn compile_with_imports(
    seed: &Path,
    build_dir: &Path,
) -> Vec<(PathBuf, Result<Outcome, DriverError>)> {
    let mut queue = VecDeque::from([seed.to_owned()]);
    let mut seen: HashSet<String> = HashSet::new();
    let mut results = Vec::new();
    while let Some(path) = queue.pop_front() {
        let result = compile_file(&path, build_dir);
        if let Ok(outcome) = &result {
            seen.insert(outcome.class_name.clone());
            for import in &outcome.imports {
                if seen.insert(import.clone()) {
                    queue.push_back(source_path_for(import));
                }
            }
        }
        results.push((path, result));
    }
    results
}

/// `a.b.C` compiled into `build_dir` lands at `build_dir/a/b/C.klz`.
pub fn output_path(build_dir: &Path, class_name: &str) -> PathBuf {
    let mut path = build_dir.to_owned();
    for part in class_name.split('.') {
        path.push(part);
    }
    path.set_extension(CLASS_EXT);
    path
}

/// Source location of a class name: dots become path separators.
pub fn source_path_for(class_name: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for part in class_name.split('.') {
        path.push(part);
    }
    path.set_extension(SOURCE_EXT);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_mirrors_the_dotted_name() {
        let path = output_path(Path::new("build"), "a.b.C");
        assert_eq!(path, Path::new("build/a/b/C.klz"));
        assert_eq!(source_path_for("a.b.C"), Path::new("a/b/C.kasm"));
    }
}
