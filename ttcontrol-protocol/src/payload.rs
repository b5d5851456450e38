//! Base64 blocks carried by `flash_program_base64`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use heapless::Vec;

use crate::command::ParseError;

/// Largest decoded block, one flash page
pub const MAX_BASE64_BLOCK: usize = 256;

/// Encoded length of a full block
pub const MAX_BASE64_TEXT: usize = MAX_BASE64_BLOCK.div_ceil(3) * 4;

/// A decoded block
pub type Block = Vec<u8, MAX_BASE64_BLOCK>;

/// Decode standard, padded base64 text into a block
pub fn decode_block(text: &str) -> Result<Block, ParseError> {
    // Room for the decoder's worst-case estimate of a full-length text
    let mut scratch = [0u8; MAX_BASE64_TEXT / 4 * 3];
    if text.len() > MAX_BASE64_TEXT {
        return Err(ParseError::InvalidArgument);
    }
    let len = STANDARD
        .decode_slice(text, &mut scratch)
        .map_err(|_| ParseError::InvalidArgument)?;
    Vec::from_slice(&scratch[..len]).map_err(|_| ParseError::InvalidArgument)
}
