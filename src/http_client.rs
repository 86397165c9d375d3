//! HTTP agent construction and bounded response helpers.

use std::io::{self, Read};
use std::time::Duration;

/// Largest response body accepted from the service.
pub(crate) const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Build an agent whose whole-request timeout is `timeout`.
///
/// Connect, read and write are all capped by the same deadline so a stalled
/// service never blocks the caller for longer than requested.
pub(crate) fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout(timeout)
        .build()
}

/// Read a response into memory, enforcing a maximum byte size.
pub(crate) fn read_response_bytes(
    response: ureq::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, io::Error> {
    check_content_length(&response, max_bytes)?;
    let reader = response.into_reader();
    let mut limited = reader.take(max_bytes as u64 + 1);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response exceeded {max_bytes} bytes"),
        ));
    }
    Ok(bytes)
}

/// Read a response body as text, replacing invalid UTF-8 sequences.
pub(crate) fn read_response_text(
    response: ureq::Response,
    max_bytes: usize,
) -> Result<String, io::Error> {
    let bytes = read_response_bytes(response, max_bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn check_content_length(response: &ureq::Response, max_bytes: usize) -> Result<(), io::Error> {
    let Some(length) = response.header("Content-Length") else {
        return Ok(());
    };
    let Ok(length) = length.parse::<u64>() else {
        return Ok(());
    };
    if length > max_bytes as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response too large: {length} bytes"),
        ));
    }
    Ok(())
}
