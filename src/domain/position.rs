// Reader position strings (`/body/DocFragment[12]/body/div/a`) to page + scroll anchor

use crate::error::SyncError;

const FRAGMENT_PREFIX: &str = "DocFragment[";
const FRAGMENT_SUFFIX: &str = "]";
const DEFAULT_TAG: &str = "a";
const MIN_SEGMENTS: usize = 6;

/// Scroll anchor the web reader resolves; only the final tag is meaningful to the device.
const SCROLL_ANCHOR_PREFIX: &str = "//html[1]/BODY/APP-ROOT[1]/DIV[1]/DIV[1]/DIV[1]/APP-BOOK-READER[1]/DIV[1]/DIV[2]/DIV[1]/DIV[1]/DIV[1]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPosition {
    Decoded {
        page_number: i32,
        scroll_anchor: Option<String>,
    },
    /// Too few segments to carry a position; stored progress stays as it was
    Skipped,
}

/// Decode a reader position string.
///
/// A non-numeric fragment index is fatal for the request.
pub fn decode_position(position: &str) -> Result<DecodedPosition, SyncError> {
    let segments: Vec<&str> = position.split('/').collect();
    if segments.len() < MIN_SEGMENTS {
        return Ok(DecodedPosition::Skipped);
    }

    let fragment = segments[2];
    let digits = fragment.strip_prefix(FRAGMENT_PREFIX).unwrap_or(fragment);
    let digits = digits.strip_suffix(FRAGMENT_SUFFIX).unwrap_or(digits);
    let index: i32 = digits
        .parse()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| SyncError::UnparsablePageFragment {
            fragment: fragment.to_string(),
        })?;

    let tag = segments[5].to_uppercase();
    let scroll_anchor = if tag == DEFAULT_TAG.to_uppercase() {
        None
    } else {
        Some(format!("{SCROLL_ANCHOR_PREFIX}/{tag}"))
    };

    Ok(DecodedPosition::Decoded {
        page_number: index - 1,
        scroll_anchor,
    })
}

/// Encode a stored position for the reader.
pub fn encode_position(page_number: i32, scroll_anchor: Option<&str>) -> String {
    let fragment_index = page_number + 1;
    let tag = match scroll_anchor {
        Some(anchor) if !anchor.is_empty() => anchor
            .rsplit('/')
            .next()
            .unwrap_or(DEFAULT_TAG)
            .to_lowercase(),
        _ => DEFAULT_TAG.to_string(),
    };

    format!("/body/{FRAGMENT_PREFIX}{fragment_index}{FRAGMENT_SUFFIX}/body/div/{tag}")
}
