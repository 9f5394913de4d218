//! Chat notices
//!
//! Only `SERVER_FULL_NOTICE` is produced by the server. Join, leave and chat
//! lines are produced by clients and relayed like any other payload.

/// Sent to a connection turned away because the registry is at capacity
pub const SERVER_FULL_NOTICE: &str = "*** Server is full, try again later ***";

/// Shown locally by a client when the server closes its side
pub const DISCONNECTED_NOTICE: &str = "*** Server disconnected ***";

/// Usernames keep at most this many bytes
pub const MAX_USERNAME_LEN: usize = 31;

pub fn join_notice(username: &str) -> String {
    format!("*** {} has joined the chat ***", username)
}

pub fn leave_notice(username: &str) -> String {
    format!("*** {} has left the chat ***", username)
}

/// Format a typed line the way every client sends it: `<name>: <text>`
pub fn chat_line(username: &str, text: &str) -> String {
    format!("{}: {}", username, text)
}

/// Cut `text` to at most `max` bytes without splitting a UTF-8 sequence
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_match_wire_text() {
        assert_eq!(join_notice("ana"), "*** ana has joined the chat ***");
        assert_eq!(leave_notice("ana"), "*** ana has left the chat ***");
        assert_eq!(chat_line("ana", "hi"), "ana: hi");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // "é" is two bytes; cutting at 2 would split it
        assert_eq!(truncate_utf8("aé", 2), "a");
        assert_eq!(truncate_utf8("", 0), "");
    }
}
