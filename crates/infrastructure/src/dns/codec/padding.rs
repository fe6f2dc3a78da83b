use super::framing::MAX_MESSAGE_SIZE;
use super::message::encode_message;
use dotline_domain::DomainError;
use hickory_proto::op::{Edns, Message};
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};

/// Block size queries are padded to (RFC 8467 §4.1).
pub const QUERY_PADDING_BLOCK_SIZE: usize = 128;

/// UDP payload size advertised when an OPT record has to be added.
const EDNS_MAX_PAYLOAD: u16 = 4096;

/// Option code plus option length.
const OPTION_HEADER_LEN: usize = 4;

pub fn has_padding(message: &Message) -> bool {
    message
        .extensions()
        .as_ref()
        .is_some_and(|edns| edns.option(EdnsCode::Padding).is_some())
}

/// Add an EDNS(0) Padding option so the encoded query ends on a
/// [`QUERY_PADDING_BLOCK_SIZE`] boundary. Queries that already carry
/// padding are left alone.
pub fn pad_query(message: &mut Message) -> Result<(), DomainError> {
    if has_padding(message) {
        return Ok(());
    }

    if message.extensions().is_none() {
        let mut edns = Edns::new();
        edns.set_max_payload(EDNS_MAX_PAYLOAD);
        message.set_edns(edns);
    }

    let unpadded = encode_message(message)?.len() + OPTION_HEADER_LEN;
    let target = unpadded
        .div_ceil(QUERY_PADDING_BLOCK_SIZE)
        .saturating_mul(QUERY_PADDING_BLOCK_SIZE)
        .min(MAX_MESSAGE_SIZE);
    if unpadded > target {
        // No room left for even an empty option.
        return Ok(());
    }

    if let Some(edns) = message.extensions_mut().as_mut() {
        edns.options_mut().insert(EdnsOption::Unknown(
            EdnsCode::Padding.into(),
            vec![0; target - unpadded],
        ));
    }
    Ok(())
}
