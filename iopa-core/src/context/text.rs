//! Copy-as-text for the request table

use super::body::body_as_string;
use super::headers::Headers;
use super::request::RequestContext;

/// Placeholder when nothing usable is selected
pub const EMPTY_REQUEST: &str = "<empty request>";

/// Plain-text summary of the first request in `contexts`
pub fn contexts_to_text(contexts: &[&RequestContext]) -> String {
    let Some(context) = contexts.first().filter(|c| !c.original_url.is_empty()) else {
        return EMPTY_REQUEST.to_string();
    };

    let (host, url) = match &context.url {
        Some(url) => (url.host_str().unwrap_or_default(), url.as_str()),
        None => ("", context.original_url.as_str()),
    };

    let mut text = format!(
        "# HTTP request for {} (ID: {})\n## Request\nHTTP {} {}\n{}",
        host,
        context.id,
        context.method,
        url,
        header_lines(&context.headers)
    );

    if context.body.is_some() {
        text.push_str("\n\n");
        text.push_str(body_as_string(context.body.as_ref()));
    }

    if let Some(response) = context.response.as_ref().filter(|r| r.status_code != 0) {
        text.push_str(&format!(
            "\n\n## Response\nHTTP {} {}\n{}",
            response.status_code,
            response.status_text,
            header_lines(&response.headers)
        ));
        if response.body.is_some() {
            text.push_str("\n\n");
            text.push_str(body_as_string(response.body.as_ref()));
        }
    }
    text
}

fn header_lines(headers: &Headers) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ResponseContext, SerializedReply, SerializedRequest};
    use serde_json::json;

    fn context() -> RequestContext {
        let data: SerializedRequest = serde_json::from_value(json!({
            "iopa.Id": "9",
            "iopa.Method": "GET",
            "iopa.OriginalUrl": "https://example.com/a?b=1",
            "iopa.Headers": {"Accept": "text/plain"},
            "server.Timestamp": 0
        }))
        .unwrap();
        RequestContext::from_serialized(data)
    }

    #[test]
    fn test_empty_selection() {
        assert_eq!(contexts_to_text(&[]), EMPTY_REQUEST);

        let mut ctx = context();
        ctx.original_url.clear();
        assert_eq!(contexts_to_text(&[&ctx]), EMPTY_REQUEST);
    }

    #[test]
    fn test_request_only() {
        let ctx = context();
        assert_eq!(
            contexts_to_text(&[&ctx]),
            "# HTTP request for example.com (ID: 9)\n## Request\nHTTP GET https://example.com/a?b=1\naccept: text/plain"
        );
    }

    #[test]
    fn test_with_response() {
        let mut ctx = context();
        let reply: SerializedReply = serde_json::from_value(json!({
            "iopa.StatusCode": 200,
            "iopa.StatusText": "OK",
            "iopa.Headers": {"Content-Type": "text/plain"},
            "iopa.Body": "hello",
            "server.Timestamp": 5
        }))
        .unwrap();
        ctx.set_response(ResponseContext::from_serialized(reply), Some(5.0));

        let text = contexts_to_text(&[&ctx]);
        assert!(text.ends_with("## Response\nHTTP 200 OK\ncontent-type: text/plain\n\nhello"));
    }
}
