//! ConfigParser (§4.3): given a configuration file path, produce
//! `{format, data, errors, warnings, metadata}` without ever executing
//! the file's contents.
//!
//! A small `FormatParser` registry picks the first parser whose
//! `supports(path)` matches, by registration order — the same pattern
//! `PathResolver` and `DiscoveryPipeline` use for their own pluggable
//! strategies.

pub mod php_literal;
pub mod tabular;
pub mod xml_like;

use crate::error::{Error, ErrorCode, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub format: &'static str,
    pub data: Value,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: HashMap<String, String>,
}

trait FormatParser: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, path: &Path) -> bool;
    fn parse(&self, contents: &str, limits: &php_literal::ParseLimits) -> ParsedConfig;
}

/// Resolves `${name}` placeholders and allowlisted PHP constant
/// references for the tabular and code-style parsers respectively.
pub struct ConfigParser {
    parsers: Vec<Box<dyn FormatParser>>,
    max_file_size: u64,
    max_depth: usize,
    placeholder_resolver: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    const_resolver: Box<dyn Fn(&str) -> Option<Value> + Send + Sync>,
}

impl ConfigParser {
    pub fn with_defaults() -> Self {
        ConfigParser {
            parsers: vec![
                Box::new(PhpLiteralFormatParser),
                Box::new(TabularFormatParser),
                Box::new(XmlLikeFormatParser),
            ],
            max_file_size: 10 * 1024 * 1024,
            max_depth: 50,
            placeholder_resolver: Box::new(|name| std::env::var(name).ok()),
            const_resolver: Box::new(|_| None),
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_placeholder_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.placeholder_resolver = Box::new(resolver);
        self
    }

    pub fn with_const_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.const_resolver = Box::new(resolver);
        self
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedConfig> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() > self.max_file_size {
            return Err(Error::validation(
                ErrorCode::ConfigSecurity,
                format!(
                    "{} is {} bytes, exceeds the {} byte cap",
                    path.display(),
                    metadata.len(),
                    self.max_file_size
                ),
            ));
        }

        let contents = std::fs::read_to_string(path)?;
        let Some(parser) = self.parsers.iter().find(|p| p.supports(path)) else {
            return Err(Error::validation(
                ErrorCode::ConfigUnsupported,
                format!("no registered format parser supports {}", path.display()),
            ));
        };

        let limits = php_literal::ParseLimits {
            max_depth: self.max_depth,
        };
        let mut parsed = parser.parse(&contents, &limits);

        if parser.name() == "php-literal" {
            parsed = self.reevaluate_with_resolver(parsed, &contents, &limits);
        } else if parser.name() == "tabular" {
            parsed = self.reparse_tabular_with_placeholders(&contents);
        }

        // `errors` records every individual failure a caller inspecting a
        // file directly (e.g. a future `inspect` CLI command) might want,
        // but callers that only need pass/fail (discovery's configuration
        // sub-stage) get it as a `Result`, matching every other failure in
        // the pipeline.
        if !parsed.errors.is_empty() {
            return Err(Error::parse(ErrorCode::ConfigParse, parsed.errors.join("; ")));
        }

        Ok(parsed)
    }

    fn reevaluate_with_resolver(
        &self,
        mut parsed: ParsedConfig,
        contents: &str,
        limits: &php_literal::ParseLimits,
    ) -> ParsedConfig {
        let tokens = php_literal::tokenize(contents);
        match php_literal::find_and_parse_return(&tokens, limits) {
            Ok(expr) => match php_literal::evaluate(&expr, self.const_resolver.as_ref()) {
                Ok(value) => {
                    parsed.data = value;
                    parsed.errors.clear();
                }
                Err(e) => parsed.errors.push(e),
            },
            Err(e) => parsed.errors.push(e),
        }
        parsed
    }

    fn reparse_tabular_with_placeholders(&self, contents: &str) -> ParsedConfig {
        let substituted = tabular::substitute_placeholders(contents, self.placeholder_resolver.as_ref());
        let mut metadata = HashMap::new();
        match tabular::parse_documents(&substituted) {
            Ok(documents) => {
                metadata.insert("document_count".to_owned(), documents.len().to_string());
                ParsedConfig {
                    format: "tabular",
                    data: documents.into_iter().next().unwrap_or(Value::Null),
                    errors: Vec::new(),
                    warnings: Vec::new(),
                    metadata,
                }
            }
            Err(e) => ParsedConfig {
                format: "tabular",
                data: Value::Null,
                errors: vec![e],
                warnings: Vec::new(),
                metadata,
            },
        }
    }
}

struct PhpLiteralFormatParser;

impl FormatParser for PhpLiteralFormatParser {
    fn name(&self) -> &'static str {
        "php-literal"
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("php")
    }

    fn parse(&self, contents: &str, limits: &php_literal::ParseLimits) -> ParsedConfig {
        let tokens = php_literal::tokenize(contents);
        match php_literal::find_and_parse_return(&tokens, limits) {
            Ok(_) => ParsedConfig {
                format: "php-literal",
                data: Value::Null,
                errors: Vec::new(),
                warnings: Vec::new(),
                metadata: HashMap::new(),
            },
            Err(e) => ParsedConfig {
                format: "php-literal",
                data: Value::Null,
                errors: vec![e],
                warnings: Vec::new(),
                metadata: HashMap::new(),
            },
        }
    }
}

struct TabularFormatParser;

impl FormatParser for TabularFormatParser {
    fn name(&self) -> &'static str {
        "tabular"
    }

    fn supports(&self, path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
    }

    fn parse(&self, _contents: &str, _limits: &php_literal::ParseLimits) -> ParsedConfig {
        ParsedConfig {
            format: "tabular",
            data: Value::Null,
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

struct XmlLikeFormatParser;

impl FormatParser for XmlLikeFormatParser {
    fn name(&self) -> &'static str {
        "xml-like"
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("xml")
    }

    fn parse(&self, contents: &str, _limits: &php_literal::ParseLimits) -> ParsedConfig {
        match xml_like::parse(contents.as_bytes()) {
            Ok(data) => ParsedConfig {
                format: "xml-like",
                data,
                errors: Vec::new(),
                warnings: Vec::new(),
                metadata: HashMap::new(),
            },
            Err(e) => ParsedConfig {
                format: "xml-like",
                data: Value::Null,
                errors: vec![e],
                warnings: Vec::new(),
                metadata: HashMap::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_php_literal_parser_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LocalConfiguration.php");
        std::fs::write(&path, r#"<?php return array('DB' => array('host' => 'localhost'));"#).unwrap();

        let parser = ConfigParser::with_defaults();
        let parsed = parser.parse_file(&path).unwrap();
        assert_eq!(parsed.format, "php-literal");
        assert_eq!(parsed.data["DB"]["host"], "localhost");
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn dispatches_to_tabular_parser_and_substitutes_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "host: ${DB_HOST}\n").unwrap();

        let parser = ConfigParser::with_defaults()
            .with_placeholder_resolver(|name| (name == "DB_HOST").then(|| "db.internal".to_owned()));
        let parsed = parser.parse_file(&path).unwrap();
        assert_eq!(parsed.format, "tabular");
        assert_eq!(parsed.data["host"], "db.internal");
    }

    #[test]
    fn dispatches_to_xml_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.xml");
        std::fs::write(&path, "<services><service id=\"a\"/></services>").unwrap();

        let parser = ConfigParser::with_defaults();
        let parsed = parser.parse_file(&path).unwrap();
        assert_eq!(parsed.format, "xml-like");
        assert_eq!(parsed.data["service"]["@id"], "a");
    }

    #[test]
    fn unrecognized_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "whatever").unwrap();

        let parser = ConfigParser::with_defaults();
        let err = parser.parse_file(&path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigUnsupported);
    }

    #[test]
    fn oversized_file_is_rejected_as_security_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.php");
        std::fs::write(&path, "<?php return array();").unwrap();

        let parser = ConfigParser::with_defaults().with_max_file_size(1);
        let err = parser.parse_file(&path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigSecurity);
    }

    #[test]
    fn const_resolver_feeds_allowlisted_identifiers_in_php_literal_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AdditionalConfiguration.php");
        std::fs::write(&path, r#"<?php return array('version' => TYPO3_VERSION_ID);"#).unwrap();

        let parser = ConfigParser::with_defaults()
            .with_const_resolver(|name| (name == "TYPO3_VERSION_ID").then(|| Value::from(1204)));
        let parsed = parser.parse_file(&path).unwrap();
        assert_eq!(parsed.data["version"], 1204);
    }
}
