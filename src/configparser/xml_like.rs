//! The tree-structured, XML-like configuration format (§4.3).
//!
//! Grounded in `session/pm.rs`'s own use of `xml::reader::EventReader` /
//! `XmlEvent` for reading POM documents. `xml-rs`'s reader never fetches
//! external entities or DTDs over the network regardless of configuration
//! — there is no toggle to disable because it never does it — so the
//! "external entity resolution disabled unconditionally" requirement
//! holds by construction.

use serde_json::{Map, Value};
use std::io::Read;
use xml::reader::{EventReader, XmlEvent};

const ATTRIBUTE_PREFIX: &str = "@";

struct Node {
    children: Map<String, Value>,
    text: String,
    attributes: Map<String, Value>,
}

impl Node {
    fn new() -> Self {
        Node {
            children: Map::new(),
            text: String::new(),
            attributes: Map::new(),
        }
    }

    fn into_value(mut self) -> Value {
        if self.children.is_empty() && self.attributes.is_empty() {
            return Value::String(self.text);
        }
        for (key, value) in self.attributes {
            self.children.insert(format!("{ATTRIBUTE_PREFIX}{key}"), value);
        }
        let trimmed = self.text.trim();
        if !trimmed.is_empty() {
            self.children.insert("#text".to_owned(), Value::String(trimmed.to_owned()));
        }
        Value::Object(self.children)
    }
}

/// Inserts `value` for `name` into `parent`, turning a second occurrence
/// of the same child name into a sequence (§4.3: "repeated names become
/// sequences").
fn insert_child(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        None => {
            parent.insert(name, value);
        }
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let previous = existing.take();
            *parent.get_mut(&name).unwrap() = Value::Array(vec![previous, value]);
        }
    }
}

/// Parses an XML-like document into the same nested-map representation
/// the other config formats produce. Returns `Err` on malformed XML.
pub fn parse<R: Read>(source: R) -> Result<Value, String> {
    let parser = EventReader::new(source);
    let mut stack: Vec<(String, Node)> = Vec::new();
    let mut root: Option<Value> = None;

    for event in parser {
        let event = event.map_err(|e| e.to_string())?;
        match event {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                let mut node = Node::new();
                for attribute in attributes {
                    node.attributes.insert(
                        attribute.name.local_name,
                        Value::String(attribute.value),
                    );
                }
                stack.push((name.local_name, node));
            }
            XmlEvent::Characters(text) | XmlEvent::CData(text) => {
                if let Some((_, node)) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            XmlEvent::EndElement { .. } => {
                let Some((name, node)) = stack.pop() else {
                    continue;
                };
                let value = node.into_value();
                match stack.last_mut() {
                    Some((_, parent)) => insert_child(&mut parent.children, name, value),
                    None => root = Some(value),
                }
            }
            XmlEvent::EndDocument => break,
            _ => {}
        }
    }

    root.ok_or_else(|| "document contained no root element".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_elements_become_nested_maps() {
        let xml = r#"<config><db><host>localhost</host><port>3306</port></db></config>"#;
        let value = parse(xml.as_bytes()).unwrap();
        assert_eq!(value["db"]["host"], "localhost");
        assert_eq!(value["db"]["port"], "3306");
    }

    #[test]
    fn repeated_child_names_collapse_into_a_sequence() {
        let xml = r#"<extensions><ext>news</ext><ext>powermail</ext></extensions>"#;
        let value = parse(xml.as_bytes()).unwrap();
        let seq = value["ext"].as_array().unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[0], "news");
        assert_eq!(seq[1], "powermail");
    }

    #[test]
    fn attributes_are_stored_under_a_distinguishable_prefix() {
        let xml = r#"<typo3 version="12.4"><feature enabled="true">x</feature></typo3>"#;
        let value = parse(xml.as_bytes()).unwrap();
        assert_eq!(value["@version"], "12.4");
        assert_eq!(value["feature"]["@enabled"], "true");
        assert_eq!(value["feature"]["#text"], "x");
    }

    #[test]
    fn malformed_xml_produces_an_error_not_a_panic() {
        let xml = r#"<config><db></config>"#;
        assert!(parse(xml.as_bytes()).is_err());
    }
}
