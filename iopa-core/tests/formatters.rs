//! Body formatting for captured requests.

use iopa_core::formatter::{BodyFormatter, FormatError, FormatInput};
use iopa_core::{
    BodyFormat, Direction, FormatterRegistry, Rendered, RequestContext, SerializedRequest,
};
use serde_json::{json, Value};

fn exchange(request: Value, reply: Value) -> RequestContext {
    let mut data = request;
    data["response"] = reply;
    let data: SerializedRequest = serde_json::from_value(data).unwrap();
    RequestContext::from_serialized(data)
}

#[test]
fn test_graphql_batch_request() {
    let ctx = exchange(
        json!({
            "iopa.Id": "g",
            "iopa.Method": "POST",
            "iopa.OriginalUrl": "https://graph.example.com/graphqlbatch",
            "iopa.Headers": {"Content-Type": "application/x-www-form-urlencoded"},
            "iopa.Body": "batch_name=feed&queries=%7B%22q1%22%3A%7B%22id%22%3A1%7D%7D"
        }),
        json!({"iopa.StatusCode": 200}),
    );

    let out = FormatterRegistry::parsed().format(&ctx, Direction::Request);
    assert_eq!(out.formatted_by, Some("GraphQLBatchFormatter"));
    assert_eq!(
        out.rendered,
        Rendered::Tree {
            data: json!({"batch_name": "feed", "queries": {"q1": {"id": 1}}})
        }
    );
}

#[test]
fn test_response_uses_response_headers() {
    let ctx = exchange(
        json!({
            "iopa.Id": "h",
            "iopa.Method": "GET",
            "iopa.OriginalUrl": "https://example.com/",
            "iopa.Headers": {"Content-Type": "application/json"},
            "iopa.Body": "{}"
        }),
        json!({
            "iopa.StatusCode": 200,
            "iopa.Headers": {"Content-Type": "text/html; charset=utf-8"},
            "iopa.Body": "<html><body><p>hi</p></body></html>"
        }),
    );

    let out = FormatterRegistry::parsed().format(&ctx, Direction::Response);
    assert_eq!(out.formatted_by, Some("XMLTextFormatter"));
    assert_eq!(
        out.rendered,
        Rendered::Markup {
            text: "<html>\n  <body>\n    <p>hi</p>\n  </body>\n</html>\n".to_string()
        }
    );
}

#[test]
fn test_formatted_mode_pretty_prints_json_lines() {
    let ctx = exchange(
        json!({
            "iopa.Id": "l",
            "iopa.Method": "GET",
            "iopa.OriginalUrl": "https://example.com/stream"
        }),
        json!({
            "iopa.StatusCode": 200,
            "iopa.Headers": {"Content-Type": "application/json"},
            "iopa.Body": "{\"a\":1}\n{\"b\":2}"
        }),
    );

    let out = FormatterRegistry::for_format(BodyFormat::Formatted).format(&ctx, Direction::Response);
    assert_eq!(out.formatted_by, Some("JSONTextFormatter"));
    assert_eq!(
        out.rendered,
        Rendered::Text {
            text: "{\n  \"a\": 1\n}\n{\n  \"b\": 2\n}\n".to_string()
        }
    );
}

#[test]
fn test_broken_json_falls_back_to_raw_text() {
    let ctx = exchange(
        json!({
            "iopa.Id": "b",
            "iopa.Method": "GET",
            "iopa.OriginalUrl": "https://example.com/"
        }),
        json!({
            "iopa.StatusCode": 502,
            "iopa.Headers": {"Content-Type": "application/json"},
            "iopa.Body": "Bad Gateway"
        }),
    );

    for format in [BodyFormat::Parsed, BodyFormat::Formatted] {
        let out = FormatterRegistry::for_format(format).format(&ctx, Direction::Response);
        assert_eq!(out.formatted_by, None);
        assert_eq!(out.rendered, Rendered::Text { text: "Bad Gateway".to_string() });
    }
}

fn shout(input: &FormatInput<'_>) -> Result<Option<Rendered>, FormatError> {
    Ok(input.content_type().starts_with("text/plain").then(|| Rendered::Text {
        text: input.body_text().to_uppercase(),
    }))
}

#[test]
fn test_registered_formatter_runs_after_builtins() {
    let mut registry = FormatterRegistry::parsed();
    registry.register(BodyFormatter {
        name: "ShoutFormatter",
        request: Some(shout),
        response: None,
    });
    assert_eq!(registry.names().last(), Some(&"ShoutFormatter"));

    let ctx = exchange(
        json!({
            "iopa.Id": "s",
            "iopa.Method": "POST",
            "iopa.OriginalUrl": "https://example.com/echo",
            "iopa.Headers": {"Content-Type": "text/plain"},
            "iopa.Body": "quiet"
        }),
        json!({"iopa.StatusCode": 200}),
    );

    let out = registry.format(&ctx, Direction::Request);
    assert_eq!(out.formatted_by, Some("ShoutFormatter"));
    assert_eq!(out.rendered, Rendered::Text { text: "QUIET".to_string() });

    let out = registry.format(&ctx, Direction::Response);
    assert_eq!(out.rendered, Rendered::Empty);
}
