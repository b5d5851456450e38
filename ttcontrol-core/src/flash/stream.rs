//! Chunk header parsing for the programming stream.

use embedded_io_async::{Read, ReadExactError};

use super::error::SessionError;

/// Longest accepted length line (fits any `u32`)
pub const MAX_LENGTH_DIGITS: usize = 10;

/// Map a host link read failure onto the session error
pub(crate) fn read_error<E, L>(e: ReadExactError<L>) -> SessionError<E> {
    match e {
        ReadExactError::UnexpectedEof => SessionError::ProtocolUnderrun,
        ReadExactError::Other(_) => SessionError::Link,
    }
}

/// Read one `<decimal length>\n` line from the host
///
/// A trailing `\r` is tolerated. A length of zero ends the session.
pub async fn read_chunk_length<R: Read, E>(source: &mut R) -> Result<u32, SessionError<E>> {
    let mut digits = 0usize;
    let mut value: u32 = 0;

    loop {
        let mut byte = [0u8; 1];
        source.read_exact(&mut byte).await.map_err(read_error)?;

        match byte[0] {
            b'\n' => break,
            b'\r' => continue,
            c @ b'0'..=b'9' => {
                digits += 1;
                if digits > MAX_LENGTH_DIGITS {
                    return Err(SessionError::MalformedChunkHeader);
                }
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add((c - b'0') as u32))
                    .ok_or(SessionError::MalformedChunkHeader)?;
            }
            _ => return Err(SessionError::MalformedChunkHeader),
        }
    }

    if digits == 0 {
        return Err(SessionError::MalformedChunkHeader);
    }
    Ok(value)
}
