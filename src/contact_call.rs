use crate::models::ContactRequest;

const FENCE: &str = "```";

// Fence tags the assistant may use for the contact block
const CONTACT_TAGS: [&str; 2] = ["contact", "json"];

/// Finds the contact block the assistant emits once the visitor confirmed.
///
/// Returns the last fenced block tagged `contact` (or `json`) whose body
/// parses as a contact request; other blocks are ignored.
pub fn extract_contact_call(reply: &str) -> Option<ContactRequest> {
    let mut found = None;
    let mut rest = reply;

    while let Some(start) = rest.find(FENCE) {
        let after_open = &rest[start + FENCE.len()..];
        let Some(end) = after_open.find(FENCE) else {
            break;
        };

        let block = &after_open[..end];
        let (tag, body) = block.split_once('\n').unwrap_or((block, ""));
        let tag = tag.trim();
        if CONTACT_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) {
            if let Ok(req) = serde_json::from_str::<ContactRequest>(body.trim()) {
                found = Some(req);
            }
        }

        rest = &after_open[end + FENCE.len()..];
    }

    found
}
