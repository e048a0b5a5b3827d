//! Response normalization
//!
//! The service does not commit to one response shape across versions and
//! configurations. Positional (tuple-like) and keyed responses are both
//! folded into a [`NormalizedResult`] before anything downstream looks at them.

use crate::error::ItemError;
use crate::types::{NormalizedResult, RawResponse};
use serde_json::Value;

/// Key read from mapping responses for the processing time
pub const PROCESSING_TIME_KEY: &str = "processing_time";

/// Convert a raw response into canonical form
///
/// - sequence of two or more: `[0]` is the locator, `[1]` the processing time
/// - sequence of one: `[0]` is the locator
/// - mapping: the mapping itself is the locator, processing time from
///   [`PROCESSING_TIME_KEY`]
/// - anything else fails with [`ItemError::UnrecognizedResponseShape`]
pub fn normalize(raw: RawResponse) -> Result<NormalizedResult, ItemError> {
    let (artifact_locator, processing_time) = match &raw {
        RawResponse::Sequence(items) => match items.as_slice() {
            [locator, time, ..] => (Some(locator.clone()), render_time(time)),
            [locator] => (Some(locator.clone()), None),
            [] => {
                return Err(ItemError::UnrecognizedResponseShape {
                    shape: raw.shape_name(),
                });
            }
        },
        RawResponse::Mapping(map) => (
            Some(Value::Object(map.clone())),
            map.get(PROCESSING_TIME_KEY).and_then(render_time),
        ),
        RawResponse::Scalar(_) => {
            return Err(ItemError::UnrecognizedResponseShape {
                shape: raw.shape_name(),
            });
        }
    };

    Ok(NormalizedResult {
        artifact_locator,
        processing_time,
        raw,
    })
}

/// Strings verbatim, other scalars via `to_string`, `null` as unset
fn render_time(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Compact rendering of a response for the activity log, cut at `max_chars`
pub fn preview(raw: &RawResponse, max_chars: usize) -> String {
    let text = raw.to_value().to_string();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
