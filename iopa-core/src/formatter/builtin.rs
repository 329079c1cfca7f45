//! Built-in formatters

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::{Map, Value};

use super::{BodyFormatter, FormatError, FormatInput, Rendered};

const JSON_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/hal+json",
    "text/javascript",
    "application/x-fb-flatbuffer",
];

static TAG_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*<").expect("tag pattern is valid"));

pub(super) fn parsed_formatters() -> Vec<BodyFormatter> {
    vec![
        BodyFormatter {
            name: "ImageFormatter",
            request: None,
            response: Some(image),
        },
        BodyFormatter {
            name: "VideoFormatter",
            request: None,
            response: Some(video),
        },
        BodyFormatter {
            name: "LogEventFormatter",
            request: Some(log_event),
            response: None,
        },
        BodyFormatter {
            name: "GraphQLBatchFormatter",
            request: Some(graphql_batch),
            response: None,
        },
        BodyFormatter {
            name: "JSONFormatter",
            request: Some(json_tree),
            response: Some(json_tree),
        },
        BodyFormatter {
            name: "FormUrlencodedFormatter",
            request: Some(form_urlencoded),
            response: None,
        },
        BodyFormatter {
            name: "XMLTextFormatter",
            request: Some(xml_text),
            response: Some(xml_text),
        },
        BodyFormatter {
            name: "BinaryFormatter",
            request: Some(binary),
            response: Some(binary),
        },
    ]
}

pub(super) fn text_formatters() -> Vec<BodyFormatter> {
    vec![BodyFormatter {
        name: "JSONTextFormatter",
        request: Some(json_text),
        response: Some(json_text),
    }]
}

fn is_json(content_type: &str) -> bool {
    JSON_CONTENT_TYPES.iter().any(|t| content_type.starts_with(t))
}

/// Parse a body holding one JSON document, or one per line
fn parse_json_roots(body: &str) -> Result<Value, FormatError> {
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(_) => body
            .split('\n')
            .map(|line| serde_json::from_str(line).map_err(FormatError::from))
            .collect::<Result<Vec<Value>, _>>()
            .map(Value::Array),
    }
}

fn url_encoded_object(body: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// Replace a string field holding JSON with the parsed value
fn expand_json_field(data: &mut Map<String, Value>, key: &str) -> Result<(), FormatError> {
    if let Some(Value::String(raw)) = data.get(key) {
        let parsed = serde_json::from_str(raw)?;
        data.insert(key.to_string(), parsed);
    }
    Ok(())
}

fn image(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    let content_type = input.content_type();
    if !content_type.starts_with("image/") {
        return Ok(None);
    }
    let bytes = input.body.as_binary().ok_or(FormatError::NotBinary)?;
    Ok(Some(Rendered::Image {
        src: format!("data:{};base64,{}", content_type, STANDARD.encode(bytes)),
    }))
}

fn video(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    let content_type = input.content_type();
    if !content_type.starts_with("video/") {
        return Ok(None);
    }
    Ok(Some(Rendered::Video {
        src: input.url.to_string(),
        content_type: content_type.to_string(),
    }))
}

fn log_event(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    if !input.url.contains("logging_client_event") {
        return Ok(None);
    }
    let mut data = url_encoded_object(input.body_text());
    expand_json_field(&mut data, "message")?;
    Ok(Some(Rendered::Tree {
        data: Value::Object(data),
    }))
}

fn graphql_batch(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    if !input.url.contains("graphqlbatch") {
        return Ok(None);
    }
    let mut data = url_encoded_object(input.body_text());
    expand_json_field(&mut data, "queries")?;
    Ok(Some(Rendered::Tree {
        data: Value::Object(data),
    }))
}

fn json_tree(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    if !is_json(input.content_type()) {
        return Ok(None);
    }
    let data = parse_json_roots(input.body_text())?;
    Ok(Some(Rendered::Tree { data }))
}

fn form_urlencoded(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    if !input
        .content_type()
        .starts_with("application/x-www-form-urlencoded")
    {
        return Ok(None);
    }
    Ok(Some(Rendered::Tree {
        data: Value::Object(url_encoded_object(input.body_text())),
    }))
}

fn xml_text(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    if !input.content_type().starts_with("text/html") {
        return Ok(None);
    }
    Ok(Some(Rendered::Markup {
        text: format!("{}\n", beautify_markup(input.body_text())),
    }))
}

fn binary(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    Ok((input.content_type() == "application/octet-stream").then_some(Rendered::Binary))
}

fn json_text(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    if !is_json(input.content_type()) {
        return Ok(None);
    }
    let body = input.body_text();
    let roots = match serde_json::from_str::<Value>(body) {
        Ok(value) => vec![value],
        Err(_) => body
            .split('\n')
            .map(serde_json::from_str)
            .collect::<Result<Vec<Value>, _>>()?,
    };

    let mut text = String::new();
    for root in &roots {
        text.push_str(&serde_json::to_string_pretty(root)?);
        text.push('\n');
    }
    Ok(Some(Rendered::Text { text }))
}

/// Put every tag on its own line, indented by nesting depth
pub fn beautify_markup(markup: &str) -> String {
    let split = TAG_BOUNDARY.replace_all(markup.trim(), ">\n<");
    let mut depth = 0usize;
    let mut lines = Vec::new();

    for line in split.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let closing = line.starts_with("</");
        let opening = line.starts_with('<')
            && !closing
            && !line.starts_with("<!")
            && !line.starts_with("<?")
            && !line.ends_with("/>")
            && !line.contains("</");

        if closing {
            depth = depth.saturating_sub(1);
        }
        lines.push(format!("{}{}", "  ".repeat(depth), line));
        if opening {
            depth += 1;
        }
    }
    lines.join("\n")
}
