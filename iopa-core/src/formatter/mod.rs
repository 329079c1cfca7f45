//! Body formatters
//!
//! A formatter turns a request or response body into something richer than
//! raw text: a JSON tree, an image source, pretty-printed markup. Formatters
//! are tried in registry order and the first one that produces a result wins.
//! A formatter that fails (a body that claims to be JSON but is not, say) is
//! skipped and the next one is tried; if none applies the raw body is shown.
//!
//! ## Registries
//!
//! | Mode | Order |
//! |------|-------|
//! | [`BodyFormat::Parsed`] | Image, Video, LogEvent, GraphQLBatch, JSON, FormUrlencoded, XML, Binary |
//! | [`BodyFormat::Formatted`] | JSONText |

mod builtin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::context::{body_as_string, Body, Headers, RequestContext};

pub use builtin::beautify_markup;

/// Which side of an exchange is being formatted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

/// User preference for body display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// Pretty-printed text
    Formatted,
    /// Structured views
    #[default]
    Parsed,
}

impl std::str::FromStr for BodyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "formatted" => Ok(BodyFormat::Formatted),
            "parsed" => Ok(BodyFormat::Parsed),
            other => Err(format!("unknown body format '{}'", other)),
        }
    }
}

/// What a formatter produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Rendered {
    /// No body
    Empty,
    /// Structured data for a tree inspector
    Tree { data: Value },
    /// Preformatted text
    Text { text: String },
    /// Indented markup
    Markup { text: String },
    /// An image, as a data URI or a URL
    Image { src: String },
    /// A video streamed from `src`
    Video {
        src: String,
        #[serde(rename = "contentType")]
        content_type: String,
    },
    /// Opaque binary content
    Binary,
}

/// A rendered body and the formatter that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedBody {
    pub rendered: Rendered,
    /// `None` for empty and raw bodies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_by: Option<&'static str>,
}

/// Why a formatter gave up on a body it claimed
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a binary body")]
    NotBinary,
}

/// Everything a formatter may look at
#[derive(Debug, Clone, Copy)]
pub struct FormatInput<'a> {
    pub direction: Direction,
    /// URL of the request, for both directions
    pub url: &'a str,
    pub body: &'a Body,
    /// Headers of the side being formatted
    pub headers: &'a Headers,
}

impl<'a> FormatInput<'a> {
    pub fn content_type(&self) -> &'a str {
        self.headers.content_type().unwrap_or_default()
    }

    pub fn body_text(&self) -> &'a str {
        body_as_string(Some(self.body))
    }
}

/// Signature shared by all formatters
pub type FormatFn = fn(&FormatInput<'_>) -> Result<Option<Rendered>, FormatError>;

/// A named formatter for requests, responses or both
#[derive(Clone, Copy)]
pub struct BodyFormatter {
    pub name: &'static str,
    pub request: Option<FormatFn>,
    pub response: Option<FormatFn>,
}

impl BodyFormatter {
    fn for_direction(&self, direction: Direction) -> Option<FormatFn> {
        match direction {
            Direction::Request => self.request,
            Direction::Response => self.response,
        }
    }
}

impl std::fmt::Debug for BodyFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyFormatter")
            .field("name", &self.name)
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

/// Ordered list of formatters
#[derive(Debug, Clone)]
pub struct FormatterRegistry {
    formatters: Vec<BodyFormatter>,
}

impl FormatterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            formatters: Vec::new(),
        }
    }

    /// Structured views
    pub fn parsed() -> Self {
        Self {
            formatters: builtin::parsed_formatters(),
        }
    }

    /// Pretty-printed text
    pub fn text() -> Self {
        Self {
            formatters: builtin::text_formatters(),
        }
    }

    pub fn for_format(format: BodyFormat) -> Self {
        match format {
            BodyFormat::Formatted => Self::text(),
            BodyFormat::Parsed => Self::parsed(),
        }
    }

    /// Add a formatter after the existing ones
    pub fn register(&mut self, formatter: BodyFormatter) {
        self.formatters.push(formatter);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.formatters.iter().map(|f| f.name).collect()
    }

    /// Render one side of a request
    pub fn format(&self, context: &RequestContext, direction: Direction) -> FormattedBody {
        let (body, headers) = match direction {
            Direction::Request => (context.body.as_ref(), &context.headers),
            Direction::Response => match &context.response {
                Some(response) => (response.body.as_ref(), &response.headers),
                None => (None, &context.headers),
            },
        };
        let Some(body) = body.filter(|b| !b.is_empty()) else {
            return FormattedBody {
                rendered: Rendered::Empty,
                formatted_by: None,
            };
        };

        let input = FormatInput {
            direction,
            url: &context.original_url,
            body,
            headers,
        };
        self.format_input(&input)
    }

    /// Render a body with explicit inputs
    pub fn format_input(&self, input: &FormatInput<'_>) -> FormattedBody {
        for formatter in &self.formatters {
            let Some(format) = formatter.for_direction(input.direction) else {
                continue;
            };
            match format(input) {
                Ok(Some(rendered)) => {
                    return FormattedBody {
                        rendered,
                        formatted_by: Some(formatter.name),
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(formatter = formatter.name, error = %err, "body formatter failed");
                }
            }
        }

        FormattedBody {
            rendered: Rendered::Text {
                text: input.body_text().to_string(),
            },
            formatted_by: None,
        }
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::parsed()
    }
}
