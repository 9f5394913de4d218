//! Chat wire protocol
//!
//! There is no framing: one read on one connection is relayed verbatim as one
//! unit. This module only holds the fixed notices and text helpers.

pub mod notices;

pub use notices::{
    DISCONNECTED_NOTICE, MAX_USERNAME_LEN, SERVER_FULL_NOTICE, chat_line, join_notice,
    leave_notice, truncate_utf8,
};
