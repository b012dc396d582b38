//! Recovers the image ID and URL from a `generate-image` result.
//!
//! The service reports its result as prose in the first content block,
//! e.g. `"Image ID: abc123. Image URL: http://host/abc123.png"`. Parsing
//! follows a small grammar rather than a schema:
//!
//! ```text
//! segment   := text after the first occurrence of a marker, up to the next
//!              occurrence of the same marker or the end of the block
//! id-field  := "Image ID: " ID     ; ID is the segment up to the first "."
//! url-field := "Image URL: " URL   ; URL is the whole segment
//! ```
//!
//! The first occurrence of a marker wins and the two markers are
//! independent. A missing marker is a normal outcome and yields `None`.

use crate::protocol::ToolResponse;

/// Marker preceding the image identifier.
pub const IMAGE_ID_MARKER: &str = "Image ID: ";

/// Marker preceding the image URL.
pub const IMAGE_URL_MARKER: &str = "Image URL: ";

/// Fields recovered from a tool result. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub image_id: Option<String>,
    pub image_url: Option<String>,
}

/// Extracts both fields from the first content block of `result`.
pub fn extract(result: &ToolResponse) -> Extracted {
    let text = result.first_text();
    Extracted {
        image_id: parse_image_id(text).map(str::to_owned),
        image_url: parse_image_url(text).map(str::to_owned),
    }
}

pub fn image_id(result: &ToolResponse) -> Option<String> {
    parse_image_id(result.first_text()).map(str::to_owned)
}

pub fn image_url(result: &ToolResponse) -> Option<String> {
    parse_image_url(result.first_text()).map(str::to_owned)
}

/// Image ID in `text`: everything after the marker up to the next `.`.
pub fn parse_image_id(text: &str) -> Option<&str> {
    let segment = segment(text, IMAGE_ID_MARKER)?;
    Some(segment.split('.').next().unwrap_or(segment))
}

/// Image URL in `text`: everything after the marker.
pub fn parse_image_url(text: &str) -> Option<&str> {
    segment(text, IMAGE_URL_MARKER)
}

fn segment<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let (_, rest) = text.split_once(marker)?;
    Some(rest.split(marker).next().unwrap_or(rest))
}
