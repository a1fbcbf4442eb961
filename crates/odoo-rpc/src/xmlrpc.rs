//! XML-RPC wire codec.
//!
//! Values travel as [`serde_json::Value`]. Encoding maps `Null` to the `nil`
//! extension (the server runs with `allow_none`), integers to `int`, floats to
//! `double`. Decoding keeps `dateTime.iso8601` and `base64` payloads as their
//! verbatim text.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use serde_json::{Map, Number, Value};

use crate::errors::RpcError;

/// Render a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(flag) => {
            out.push_str("<boolean>");
            out.push(if *flag { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                out.push_str(&format!("<int>{int}</int>"));
            } else if let Some(uint) = number.as_u64() {
                out.push_str(&format!("<int>{uint}</int>"));
            } else {
                let float = number.as_f64().unwrap_or_default();
                out.push_str(&format!("<double>{float:?}</double>"));
            }
        }
        Value::String(text) => {
            out.push_str("<string>");
            out.push_str(&escape(text.as_str()));
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Decode a `methodResponse` document into its single return value.
///
/// A `<fault>` response becomes [`RpcError::Fault`].
pub fn decode_response(xml: &str) -> Result<Value, RpcError> {
    let root = parse_document(xml)?;
    if root.name != "methodResponse" {
        return Err(protocol(format!(
            "expected methodResponse root, found '{}'",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| protocol("fault without value"))?;
        return Err(fault_from_value(decode_value(value)?));
    }

    let param = root
        .child("params")
        .and_then(|params| params.child("param"))
        .ok_or_else(|| protocol("methodResponse without params/param"))?;
    let value = param
        .child("value")
        .ok_or_else(|| protocol("param without value"))?;
    decode_value(value)
}

fn fault_from_value(value: Value) -> RpcError {
    let code = value.get("faultCode");
    let message = value
        .get("faultString")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| code.and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| value.to_string());
    RpcError::Fault {
        code: code.and_then(Value::as_i64).unwrap_or_default(),
        message,
    }
}

fn decode_value(value: &Element) -> Result<Value, RpcError> {
    let Some(typed) = value.elements().next() else {
        return Ok(Value::String(value.text()));
    };

    match typed.name.as_str() {
        "string" => Ok(Value::String(typed.text())),
        "int" | "i4" | "i8" => {
            let text = typed.text();
            text.trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| protocol(format!("invalid integer '{text}'")))
        }
        "boolean" => match typed.text().trim() {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            other => Err(protocol(format!("invalid boolean '{other}'"))),
        },
        "double" => {
            let text = typed.text();
            text.trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| protocol(format!("invalid double '{text}'")))
        }
        "nil" => Ok(Value::Null),
        "dateTime.iso8601" | "base64" => Ok(Value::String(typed.text().trim().to_string())),
        "array" => {
            let data = typed
                .child("data")
                .ok_or_else(|| protocol("array without data"))?;
            data.elements()
                .filter(|item| item.name == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = Map::new();
            for member in typed.elements().filter(|item| item.name == "member") {
                let name = member
                    .child("name")
                    .ok_or_else(|| protocol("struct member without name"))?
                    .text();
                let value = member
                    .child("value")
                    .ok_or_else(|| protocol(format!("struct member '{name}' without value")))?;
                members.insert(name, decode_value(value)?);
            }
            Ok(Value::Object(members))
        }
        other => Err(protocol(format!("unsupported value type '{other}'"))),
    }
}

fn protocol(message: impl Into<String>) -> RpcError {
    RpcError::Protocol(message.into())
}

#[derive(Debug)]
struct Element {
    name: String,
    children: Vec<Content>,
}

#[derive(Debug)]
enum Content {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
        }
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|content| match content {
            Content::Element(element) => Some(element),
            Content::Text(_) => None,
        })
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|content| match content {
                Content::Text(text) => Some(text.as_str()),
                Content::Element(_) => None,
            })
            .collect()
    }
}

fn parse_document(xml: &str) -> Result<Element, RpcError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Element::new(String::new())];

    loop {
        let event = reader.read_event().map_err(|err| {
            protocol(format!("{err} at byte {}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push(Element::new(name));
            }
            Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                push_content(&mut stack, Content::Element(Element::new(name)))?;
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(protocol("unbalanced closing tag"));
                }
                let Some(element) = stack.pop() else {
                    return Err(protocol("unbalanced closing tag"));
                };
                push_content(&mut stack, Content::Element(element))?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|err| protocol(format!("bad text content: {err}")))?;
                push_content(&mut stack, Content::Text(text.into_owned()))?;
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|err| protocol(format!("cdata is not utf-8: {err}")))?;
                push_content(&mut stack, Content::Text(text))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(protocol("document ended inside an open element"));
    }
    stack
        .pop()
        .and_then(|document| {
            document.children.into_iter().find_map(|content| match content {
                Content::Element(element) => Some(element),
                Content::Text(_) => None,
            })
        })
        .ok_or_else(|| protocol("empty document"))
}

fn push_content(stack: &mut [Element], content: Content) -> Result<(), RpcError> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| protocol("content outside of document"))?;
    parent.children.push(content);
    Ok(())
}
