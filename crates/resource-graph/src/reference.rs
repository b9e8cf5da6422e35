//! Output references between resources
//!
//! A string property may embed `${name.path}` to use the output `path` of
//! resource `name`. Paths are dot-separated and walk into nested objects
//! (and arrays, by index). A string that is exactly one reference resolves
//! to the raw output value; otherwise the output is interpolated as text.
//! `$${` is a literal `${`.

use crate::error::{Error, Result};
use crate::types::Properties;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid"));

/// A reference to an output of another resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    /// Logical name of the referenced resource
    pub resource: String,
    /// Output path, at least one segment
    pub path: Vec<String>,
}

impl Reference {
    /// Parse the text between `${` and `}`
    pub fn parse(expr: &str) -> std::result::Result<Self, String> {
        let mut segments = expr.trim().split('.');
        let resource = segments.next().unwrap_or_default();
        if !is_valid_segment(resource) {
            return Err("expected '<resource>.<output>'".to_string());
        }

        let path: Vec<String> = segments.map(str::to_string).collect();
        if path.is_empty() {
            return Err("missing output name after resource".to_string());
        }
        if let Some(bad) = path.iter().find(|s| !is_valid_segment(s)) {
            return Err(format!("invalid output segment '{bad}'"));
        }

        Ok(Self {
            resource: resource.to_string(),
            path,
        })
    }

    /// Find the referenced value in a resource's outputs
    pub fn lookup<'a>(&self, outputs: &'a Properties) -> Option<&'a Value> {
        let (first, rest) = self.path.split_first()?;
        let mut current = outputs.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.path.join("."))
    }
}

/// Check that a name can appear as a reference segment
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Escape every placeholder so `s` resolves to itself
pub fn escape_literal(s: &str) -> String {
    PLACEHOLDER.replace_all(s, "$$$0").into_owned()
}

#[derive(Debug)]
enum Token {
    Text(String),
    Ref(Reference),
}

/// Split a string into literal text and references
fn tokenize(resource: &str, s: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        let start = whole.start();

        // "$${" escapes the placeholder
        if start > 0 && s[..start].ends_with('$') {
            text.push_str(&s[last..start - 1]);
            text.push_str(whole.as_str());
            last = whole.end();
            continue;
        }

        text.push_str(&s[last..start]);
        let expr = caps.get(1).map_or("", |m| m.as_str());
        let reference = Reference::parse(expr).map_err(|reason| Error::InvalidReference {
            resource: resource.to_string(),
            reference: whole.as_str().to_string(),
            reason,
        })?;

        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(&mut text)));
        }
        tokens.push(Token::Ref(reference));
        last = whole.end();
    }

    text.push_str(&s[last..]);
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    Ok(tokens)
}

/// Collect every reference in a property bag, in property order
pub fn collect_references(resource: &str, properties: &Properties) -> Result<Vec<Reference>> {
    let mut found = Vec::new();
    for value in properties.values() {
        collect_from_value(resource, value, &mut found)?;
    }
    Ok(found)
}

fn collect_from_value(resource: &str, value: &Value, found: &mut Vec<Reference>) -> Result<()> {
    match value {
        Value::String(s) => {
            for token in tokenize(resource, s)? {
                if let Token::Ref(reference) = token {
                    found.push(reference);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_from_value(resource, item, found)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_from_value(resource, item, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Names of all resources referenced by a property bag
pub fn referenced_resources(resource: &str, properties: &Properties) -> Result<BTreeSet<String>> {
    Ok(collect_references(resource, properties)?
        .into_iter()
        .map(|r| r.resource)
        .collect())
}

/// Replace every reference with the referenced output value
///
/// `outputs_of` returns the outputs of an already-applied resource.
pub fn resolve_properties<'a, F>(
    resource: &str,
    properties: &Properties,
    outputs_of: F,
) -> Result<Properties>
where
    F: Fn(&str) -> Option<&'a Properties>,
{
    properties
        .iter()
        .map(|(key, value)| Ok((key.clone(), resolve_value(resource, value, &outputs_of)?)))
        .collect()
}

fn resolve_value<'a, F>(resource: &str, value: &Value, outputs_of: &F) -> Result<Value>
where
    F: Fn(&str) -> Option<&'a Properties>,
{
    match value {
        Value::String(s) => resolve_string(resource, s, outputs_of),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(resource, item, outputs_of))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve_value(resource, v, outputs_of)?)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

fn resolve_string<'a, F>(resource: &str, s: &str, outputs_of: &F) -> Result<Value>
where
    F: Fn(&str) -> Option<&'a Properties>,
{
    let tokens = tokenize(resource, s)?;

    let lookup = |reference: &Reference| -> Result<Value> {
        outputs_of(&reference.resource)
            .and_then(|outputs| reference.lookup(outputs))
            .cloned()
            .ok_or_else(|| Error::UnresolvedReference {
                resource: resource.to_string(),
                reference: reference.to_string(),
            })
    };

    if let [Token::Ref(reference)] = tokens.as_slice() {
        return lookup(reference);
    }

    let mut out = String::new();
    for token in &tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Ref(reference) => match lookup(reference)? {
                Value::String(s) => out.push_str(&s),
                other => out.push_str(&other.to_string()),
            },
        }
    }
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_reference() {
        let r = Reference::parse("api.uris.GRAPHQL").unwrap();
        assert_eq!(r.resource, "api");
        assert_eq!(r.path, vec!["uris", "GRAPHQL"]);
        assert_eq!(r.to_string(), "api.uris.GRAPHQL");

        assert!(Reference::parse("api").is_err());
        assert!(Reference::parse("api..id").is_err());
        assert!(Reference::parse("").is_err());
        assert!(Reference::parse("a b.id").is_err());
    }

    #[test]
    fn test_collect_nested_references() {
        let p = props(json!({
            "user_pool_id": "${pool.id}",
            "config": { "client": "${client.id}", "list": ["x", "arn:${table.arn}/*"] },
            "count": 3
        }));

        let names = referenced_resources("r", &p).unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["client", "pool", "table"]
        );
    }

    #[test]
    fn test_invalid_reference_is_rejected() {
        let p = props(json!({ "x": "${pool}" }));
        let err = collect_references("r", &p).unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));
    }

    #[test]
    fn test_escaped_placeholder_is_literal() {
        let p = props(json!({ "tpl": "$${ctx.args.id} and ${pool.id}" }));
        let refs = collect_references("r", &p).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].resource, "pool");

        let pool = props(json!({ "id": "p-1" }));
        let resolved =
            resolve_properties("r", &p, |name| (name == "pool").then_some(&pool)).unwrap();
        assert_eq!(resolved["tpl"], json!("${ctx.args.id} and p-1"));
    }

    #[test]
    fn test_escape_literal_round_trips() {
        let template = "#set($id = \"${ctx.args.id}\") $${kept} ${ no close";
        let p = props(json!({ "tpl": escape_literal(template) }));

        assert!(collect_references("r", &p).unwrap().is_empty());
        let resolved = resolve_properties("r", &p, |_| None).unwrap();
        assert_eq!(resolved["tpl"], json!(template));
    }

    #[test]
    fn test_whole_string_reference_keeps_type() {
        let api = props(json!({ "uris": { "GRAPHQL": "https://x/graphql" }, "port": 62225 }));
        let p = props(json!({
            "uris": "${api.uris}",
            "port": "${api.port}",
            "url": "endpoint=${api.uris.GRAPHQL}:${api.port}"
        }));

        let resolved = resolve_properties("r", &p, |_| Some(&api)).unwrap();
        assert_eq!(resolved["uris"], json!({ "GRAPHQL": "https://x/graphql" }));
        assert_eq!(resolved["port"], json!(62225));
        assert_eq!(resolved["url"], json!("endpoint=https://x/graphql:62225"));
    }

    #[test]
    fn test_unresolved_reference() {
        let p = props(json!({ "id": "${pool.missing}" }));
        let pool = props(json!({ "id": "p-1" }));
        let err = resolve_properties("client", &p, |_| Some(&pool)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unresolved reference '${pool.missing}' in resource 'client'"
        );
    }

    #[test]
    fn test_lookup_array_index() {
        let outputs = props(json!({ "arns": ["a", "b"] }));
        let r = Reference::parse("x.arns.1").unwrap();
        assert_eq!(r.lookup(&outputs), Some(&json!("b")));
    }
}
