//! Copy-as-cURL

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::body::Body;
use super::request::RequestContext;

static NEEDS_ESCAPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f-\x9f!]").expect("escape pattern is valid"));

/// Shell command reproducing the request
///
/// Only text bodies are included; binary payloads cannot be passed with `-d`.
pub fn to_curl_command(request: &RequestContext) -> String {
    let mut command = format!("curl -v -X {}", request.method);
    command.push(' ');
    command.push_str(&escaped_string(&request.original_url));

    for (name, value) in request.headers.iter() {
        command.push_str(" -H ");
        command.push_str(&escaped_string(&format!("{}: {}", name, value)));
    }

    if let Some(Body::Text(body)) = &request.body {
        command.push_str(" -d ");
        command.push_str(&escaped_string(body));
    }
    command
}

/// Quote a string for a POSIX shell
///
/// Strings with control characters, `!` or `'` use ANSI-C quoting (`$'...'`);
/// everything else is single-quoted.
pub fn escaped_string(s: &str) -> String {
    if !NEEDS_ESCAPING.is_match(s) && !s.contains('\'') {
        return format!("'{}'", s);
    }

    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    let escaped = NEEDS_ESCAPING.replace_all(&escaped, |caps: &Captures| {
        let code = caps[0].chars().next().map_or(0, u32::from);
        if code < 16 {
            format!("\\u0{:x}", code)
        } else {
            format!("\\u{:x}", code)
        }
    });
    format!("$'{}'", escaped)
}
