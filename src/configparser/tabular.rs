//! The tabular, YAML-like configuration format (§4.3).
//!
//! `${name}` placeholders are substituted as a textual pre-pass before
//! handing the document to `serde_yaml`, since the substitution has to
//! happen before the YAML grammar (which knows nothing about the
//! placeholder syntax) ever sees the text. Multi-document streams
//! (`---`-separated) produce one `Value` per document; the first is
//! primary.

use serde::Deserialize;
use serde_json::Value;

/// Resolves a `${name}`-style placeholder to its replacement text, or
/// `None` to leave the placeholder untouched.
pub type PlaceholderResolver<'a> = dyn Fn(&str) -> Option<String> + 'a;

pub fn substitute_placeholders(source: &str, resolve: &PlaceholderResolver<'_>) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        let end = start + end;
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..end];
        match resolve(name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Parses a (placeholder-substituted) YAML document stream into one JSON
/// value per document.
pub fn parse_documents(substituted: &str) -> Result<Vec<Value>, String> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(substituted) {
        let value = Value::deserialize(document).map_err(|e| e.to_string())?;
        documents.push(value);
    }
    if documents.is_empty() {
        documents.push(Value::Null);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_placeholders_and_leaves_unknown_ones() {
        let resolved = substitute_placeholders(
            "host: ${DB_HOST}\nport: ${DB_PORT}\nmissing: ${NOT_SET}",
            &|name| match name {
                "DB_HOST" => Some("db.internal".to_owned()),
                "DB_PORT" => Some("3306".to_owned()),
                _ => None,
            },
        );
        assert!(resolved.contains("host: db.internal"));
        assert!(resolved.contains("port: 3306"));
        assert!(resolved.contains("missing: ${NOT_SET}"));
    }

    #[test]
    fn first_document_is_primary_in_multi_document_stream() {
        let source = "name: primary\n---\nname: secondary\n";
        let documents = parse_documents(source).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["name"], "primary");
        assert_eq!(documents[1]["name"], "secondary");
    }

    #[test]
    fn single_document_stream_has_length_one() {
        let documents = parse_documents("key: value\n").unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["key"], "value");
    }
}
