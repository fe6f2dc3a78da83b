//! DNS-over-stream wire codec (RFC 1035 §4.2.2, RFC 7830, RFC 8467)
//!
//! Messages travel as a 2-byte big-endian length followed by the DNS
//! message. Queries sent over an encrypted stream are padded with the
//! EDNS(0) Padding option so their size reveals less about the name.

pub mod framing;
pub mod message;
pub mod padding;

pub use framing::{
    encode_frame, read_frame, read_frame_with_limit, write_frame, FrameError, MAX_MESSAGE_SIZE,
};
pub use message::{decode_message, encode_message, message_id, DNS_HEADER_LEN};
pub use padding::{has_padding, pad_query, QUERY_PADDING_BLOCK_SIZE};
