use tracing::warn;

use crate::emails::EmailRecord;
use crate::gmail::types::{Message, MessagePart};

/// Builds a cache record from a `format=metadata` message. Header values are
/// stored verbatim, so `From` keeps any display name (`Alice <a@x.com>`).
pub fn parse_email_record(message: &Message) -> EmailRecord {
    let payload = message.payload.as_ref();

    EmailRecord {
        id: message.id.clone(),
        from_address: required_header(payload, &message.id, "From"),
        to_address: required_header(payload, &message.id, "To"),
        subject: required_header(payload, &message.id, "Subject"),
        date_received: required_header(payload, &message.id, "Date"),
    }
}

fn required_header(payload: Option<&MessagePart>, message_id: &str, name: &str) -> String {
    match header_value(payload, name) {
        Some(value) => value,
        None => {
            warn!(message_id, header = name, "message is missing header; storing empty value");
            String::new()
        }
    }
}

fn header_value(payload: Option<&MessagePart>, name: &str) -> Option<String> {
    payload.and_then(|p| {
        p.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    })
}
