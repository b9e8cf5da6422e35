//! Resolver template scanner
//!
//! A resolvers directory holds pairs of mapping templates named
//! `{OperationType}.{OperationName}.req.vtl` and `.res.vtl`. For a GraphQL
//! type `T`, every operation whose name ends in `T` or `Ts` gets a resolver.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One request/response template pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverTemplate {
    /// GraphQL operation type, e.g. `Query` or `Mutation`
    pub operation_type: String,
    /// Field the resolver is attached to, e.g. `listNotes`
    pub operation_name: String,
    pub request_path: PathBuf,
    pub response_path: PathBuf,
    /// Request template, verbatim
    pub request: String,
    /// Response template, verbatim
    pub response: String,
}

/// Pattern matching request templates of `type_name`
fn request_pattern(type_name: &str) -> Result<Regex> {
    let pattern = format!(
        r"^([a-zA-Z]+)\.([a-zA-Z]+{}s?)\.req\.vtl$",
        regex::escape(type_name)
    );
    Regex::new(&pattern).with_context(|| format!("Invalid GraphQL type name '{type_name}'"))
}

/// Find all template pairs for `type_name` in `dir`, sorted by file name
///
/// Fails if the directory cannot be read or if a request template has no
/// response template next to it.
pub fn scan(dir: &Path, type_name: &str) -> Result<Vec<ResolverTemplate>> {
    let pattern = request_pattern(type_name)?;

    if !dir.is_dir() {
        bail!("Resolvers directory not found: {}", dir.display());
    }

    let mut templates = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("Could not read resolvers in {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        let Some(caps) = pattern.captures(&file_name) else {
            continue;
        };

        let operation_type = caps[1].to_string();
        let operation_name = caps[2].to_string();
        let request_path = entry.path().to_path_buf();
        let response_path = dir.join(format!("{operation_type}.{operation_name}.res.vtl"));

        if !response_path.is_file() {
            bail!(
                "Missing response template {} for {}",
                response_path.display(),
                request_path.display()
            );
        }

        let request = std::fs::read_to_string(&request_path)
            .with_context(|| format!("Could not read {}", request_path.display()))?;
        let response = std::fs::read_to_string(&response_path)
            .with_context(|| format!("Could not read {}", response_path.display()))?;

        log::debug!("Found resolver {operation_type}.{operation_name}");

        templates.push(ResolverTemplate {
            operation_type,
            operation_name,
            request_path,
            response_path,
            request,
            response,
        });
    }

    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn pair(dir: &Path, op: &str, name: &str) {
        write(dir, &format!("{op}.{name}.req.vtl"), &format!("req {name}\n"));
        write(dir, &format!("{op}.{name}.res.vtl"), &format!("res {name}\n"));
    }

    #[test]
    fn test_scan_matches_type_and_plural() {
        let dir = TempDir::new().unwrap();
        pair(dir.path(), "Query", "getNote");
        pair(dir.path(), "Query", "listNotes");
        pair(dir.path(), "Mutation", "createNote");
        pair(dir.path(), "Query", "getComment");

        let found = scan(dir.path(), "Note").unwrap();
        let names: Vec<(&str, &str)> = found
            .iter()
            .map(|t| (t.operation_type.as_str(), t.operation_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Mutation", "createNote"),
                ("Query", "getNote"),
                ("Query", "listNotes"),
            ]
        );
    }

    #[test]
    fn test_templates_read_verbatim() {
        let dir = TempDir::new().unwrap();
        let request = "## request\n$util.toJson({\"version\": \"2017-02-28\"})\n";
        let response = "$util.toJson($ctx.result)";
        write(dir.path(), "Query.getNote.req.vtl", request);
        write(dir.path(), "Query.getNote.res.vtl", response);

        let found = scan(dir.path(), "Note").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].request, request);
        assert_eq!(found[0].response, response);
        assert_eq!(found[0].response_path, dir.path().join("Query.getNote.res.vtl"));
    }

    #[test]
    fn test_missing_response_template_fails() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Query.getNote.req.vtl", "req");

        let err = scan(dir.path(), "Note").unwrap_err();
        assert!(err.to_string().contains("Query.getNote.res.vtl"));
    }

    #[test]
    fn test_non_matching_names_are_ignored() {
        let dir = TempDir::new().unwrap();
        pair(dir.path(), "Query", "getNote");
        write(dir.path(), "Query.getNote.req.vtl.bak", "old");
        write(dir.path(), "Query.Note.req.vtl", "no prefix");
        write(dir.path(), "Query.getNotebook.req.vtl", "other type");
        write(dir.path(), "README.md", "docs");
        std::fs::create_dir(dir.path().join("Query.listNotes.req.vtl")).unwrap();

        let found = scan(dir.path(), "Note").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].operation_name, "getNote");
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let err = scan(&dir.path().join("resolvers"), "Note").unwrap_err();
        assert!(err.to_string().contains("Resolvers directory not found"));
    }
}
