//! Wire format for probe datagrams.
//!
//! A probe datagram is the ASCII text `"<workerId>-<rxCount>"` right-padded
//! with `'#'` to exactly the payload budget, which is the configured MTU
//! minus the IP and UDP headers. In ACK mode the server echoes the text back
//! to the sender, using the first `'#'` as the end marker.

use crate::errors::ProbeError;

/// IP (20) + UDP (8) header bytes, excluded from the datagram budget.
pub const MTU_OVERHEAD: usize = 28;

/// Padding byte that marks the end of the text prefix.
pub(crate) const DELIMITER: u8 = b'#';

/// Largest datagram either side will receive, the MTU upper bound.
pub(crate) const MAX_DATAGRAM: usize = 1500;

/// Builds one probe datagram of exactly `payload_size` bytes.
///
/// `rx_count` is the packet count the paired receive worker has seen so far,
/// embedded as a liveness indicator. Fails with
/// [`ProbeError::PayloadTooLarge`] when the text prefix does not leave room
/// for at least one padding byte; there is no valid payload in that case,
/// only a misconfigured MTU.
pub(crate) fn build(
    worker_id: usize,
    rx_count: u64,
    payload_size: usize,
) -> Result<Vec<u8>, ProbeError> {
    let text = format!("{worker_id}-{rx_count}");
    if text.len() >= payload_size {
        return Err(ProbeError::PayloadTooLarge {
            prefix_len: text.len(),
            budget: payload_size,
        });
    }

    let mut datagram = text.into_bytes();
    datagram.resize(payload_size, DELIMITER);
    Ok(datagram)
}

/// The echo payload of a received datagram: the bytes before the first
/// `'#'`. `None` means the datagram carries no delimiter at all and is
/// malformed.
pub(crate) fn echo_prefix(datagram: &[u8]) -> Option<&[u8]> {
    let end = datagram.iter().position(|&b| b == DELIMITER)?;
    Some(&datagram[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datagram_is_padded_to_the_exact_budget() {
        let datagram = build(7, 3, 64).unwrap();
        assert_eq!(datagram.len(), 64);
        assert!(datagram.starts_with(b"7-3"));
        assert!(datagram[3..].iter().all(|&b| b == DELIMITER));
    }

    #[test]
    fn oversized_prefix_is_an_error_not_a_truncation() {
        // "10-123456" is 9 bytes; a 9 byte budget leaves no room for padding.
        let err = build(10, 123_456, 9).unwrap_err();
        assert!(matches!(
            err,
            ProbeError::PayloadTooLarge {
                prefix_len: 9,
                budget: 9,
            }
        ));

        assert!(build(10, 123_456, 4).is_err());
    }

    #[test]
    fn echo_prefix_stops_at_the_first_delimiter() {
        assert_eq!(echo_prefix(b"7-3####"), Some(&b"7-3"[..]));
        assert_eq!(echo_prefix(b"0-0#x#y"), Some(&b"0-0"[..]));
    }

    #[test]
    fn missing_delimiter_is_malformed() {
        assert_eq!(echo_prefix(b"no delimiter here"), None);
        assert_eq!(echo_prefix(b""), None);
    }

    #[test]
    fn leading_delimiter_yields_an_empty_echo() {
        assert_eq!(echo_prefix(b"####"), Some(&b""[..]));
    }
}
