//! Payload rendering, keyed by the subscription's Content-Type header.
//!
//! JSON is the native format; XML support exists for consumers that insist.

use std::collections::HashMap;
use std::sync::Arc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::envelope::Envelope;
use crate::error::DeliveryError;

/// Renders an envelope into a request body for one content type.
pub trait PayloadRenderer: Send + Sync {
    /// Content-Type header value sent with the rendered body.
    fn content_type(&self) -> &'static str;

    fn render(&self, envelope: &Envelope) -> Result<String, DeliveryError>;
}

/// Renderers indexed by normalized content type.
#[derive(Clone)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn PayloadRenderer>>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut registry = Self {
            renderers: HashMap::new(),
        };
        registry.insert("application/json", Arc::new(JsonRenderer));
        let xml: Arc<dyn PayloadRenderer> = Arc::new(XmlRenderer);
        registry.insert("application/xml", Arc::clone(&xml));
        registry.insert("text/xml", xml);
        registry
    }
}

impl RendererRegistry {
    pub fn insert(&mut self, content_type: &str, renderer: Arc<dyn PayloadRenderer>) {
        self.renderers
            .insert(normalize_content_type(content_type), renderer);
    }

    /// Look up by header value; parameters (`; charset=...`) are ignored.
    pub fn get(&self, content_type: &str) -> Option<&Arc<dyn PayloadRenderer>> {
        self.renderers.get(&normalize_content_type(content_type))
    }
}

fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub struct JsonRenderer;

impl PayloadRenderer for JsonRenderer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, envelope: &Envelope) -> Result<String, DeliveryError> {
        serde_json::to_string(envelope).map_err(|e| DeliveryError::Render(e.to_string()))
    }
}

pub struct XmlRenderer;

impl PayloadRenderer for XmlRenderer {
    fn content_type(&self) -> &'static str {
        "application/xml"
    }

    fn render(&self, envelope: &Envelope) -> Result<String, DeliveryError> {
        let value =
            serde_json::to_value(envelope).map_err(|e| DeliveryError::Render(e.to_string()))?;

        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| DeliveryError::Render(e.to_string()))?;
        write_value(&mut writer, "webhook", &value)
            .map_err(|e| DeliveryError::Render(e.to_string()))?;

        String::from_utf8(writer.into_inner()).map_err(|e| DeliveryError::Render(e.to_string()))
    }
}

/// XML element names are stricter than JSON keys; anything else becomes `_`.
fn element_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        out.insert(0, '_');
    }
    out
}

fn write_value(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &serde_json::Value,
) -> Result<(), quick_xml::Error> {
    let name = element_name(name);
    match value {
        serde_json::Value::Null => {
            writer.write_event(Event::Empty(BytesStart::new(name.as_str())))?;
        }
        serde_json::Value::Object(map) => {
            writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
            for (key, child) in map {
                write_value(writer, key, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        }
        serde_json::Value::Array(items) => {
            writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
            for item in items {
                write_value(writer, "item", item)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        }
        serde_json::Value::Bool(b) => {
            write_text(writer, &name, if *b { "true" } else { "false" })?;
        }
        serde_json::Value::Number(n) => {
            write_text(writer, &name, &n.to_string())?;
        }
        serde_json::Value::String(s) => {
            write_text(writer, &name, s)?;
        }
    }
    Ok(())
}

fn write_text(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Best-effort parse of a response body for the audit log, keyed by the
/// response's declared Content-Type. Anything that is not JSON or XML (or
/// fails to parse) stays unstructured; the raw body is stored either way.
pub fn parse_response_body(content_type: Option<&str>, body: &str) -> Option<serde_json::Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let content_type = normalize_content_type(content_type?);
    if content_type.ends_with("json") {
        serde_json::from_str(trimmed).ok()
    } else if content_type.ends_with("xml") {
        xml_to_value(trimmed)
    } else {
        None
    }
}

/// Lossy XML-to-JSON conversion: element text becomes strings, repeated
/// sibling names become arrays, attributes are ignored.
pub fn xml_to_value(body: &str) -> Option<serde_json::Value> {
    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<(String, serde_json::Map<String, serde_json::Value>, Option<String>)> =
        Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().ok()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push((name, serde_json::Map::new(), None));
            }
            Event::Text(text) => {
                if let Some((_, _, slot)) = stack.last_mut() {
                    *slot = Some(text.unescape().ok()?.into_owned());
                }
            }
            Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                attach(&mut stack, &mut root, name, serde_json::Value::Null);
            }
            Event::End(_) => {
                let (name, children, text) = stack.pop()?;
                let value = if children.is_empty() {
                    text.map_or(serde_json::Value::Null, serde_json::Value::String)
                } else {
                    serde_json::Value::Object(children)
                };
                attach(&mut stack, &mut root, name, value);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root
}

fn attach(
    stack: &mut [(String, serde_json::Map<String, serde_json::Value>, Option<String>)],
    root: &mut Option<serde_json::Value>,
    name: String,
    value: serde_json::Value,
) {
    if let Some((_, children, _)) = stack.last_mut() {
        match children.get_mut(&name) {
            Some(serde_json::Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = serde_json::Value::Array(vec![first, value]);
            }
            None => {
                children.insert(name, value);
            }
        }
    } else if root.is_none() {
        let mut map = serde_json::Map::new();
        map.insert(name, value);
        *root = Some(serde_json::Value::Object(map));
    }
}
