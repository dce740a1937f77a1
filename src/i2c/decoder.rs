//! # I2C Reply Decoder
//!
//! Interprets the bridge's replies to I2C write and read reports.
//!
//! The first payload byte of every reply is a status byte. Bit 7 set means
//! the slave did not acknowledge; otherwise it holds a byte count. Read
//! replies carry the data bytes right after the status byte.

use super::protocol::*;
use crate::error::LinkError;

/// Check a reply's report id
fn expect_id(reply: &Report, expected: u8) -> Result<(), LinkError> {
    if reply.id() != expected {
        return Err(LinkError::UnexpectedReport {
            expected,
            actual: reply.id(),
        });
    }
    Ok(())
}

/// Check the acknowledge bit of the status byte and return the byte
fn status(reply: &Report) -> Result<u8, LinkError> {
    let status = reply.payload()[0];
    if status & STATUS_NACK != 0 {
        return Err(LinkError::NotAcknowledged { status });
    }
    Ok(status)
}

/// Decode the reply to an I2C write
///
/// # Returns
///
/// Number of bytes the slave accepted. A full sensor command transfer is
/// [`COMMAND_TRANSFER_LEN`] bytes.
///
/// # Errors
///
/// - [`LinkError::NotAcknowledged`] when the status byte has bit 7 set,
///   whatever the other bytes contain
/// - [`LinkError::UnexpectedReport`] when the reply is not a write report
pub fn decode_write_ack(reply: &Report) -> Result<u8, LinkError> {
    expect_id(reply, REPORT_ID_I2C_WRITE)?;
    status(reply)
}

/// Decode the reply to an I2C read
///
/// # Returns
///
/// The `expected_len` data bytes following the status byte.
///
/// # Errors
///
/// - [`LinkError::NotAcknowledged`] when the status byte has bit 7 set
/// - [`LinkError::UnexpectedReport`] when the reply is not a read report
/// - [`LinkError::ShortReply`] when `expected_len` does not fit in a report
pub fn decode_read(reply: &Report, expected_len: u8) -> Result<&[u8], LinkError> {
    expect_id(reply, REPORT_ID_I2C_READ)?;
    status(reply)?;

    let data = &reply.payload()[1..];
    let expected = usize::from(expected_len);
    if expected > data.len() {
        return Err(LinkError::ShortReply {
            expected,
            available: data.len(),
        });
    }

    Ok(&data[..expected])
}

/// Confirm that a write reply acknowledged a full 3-byte command
///
/// # Errors
///
/// [`LinkError::IncompleteTransfer`] when fewer bytes were accepted, plus
/// everything [`decode_write_ack`] returns.
pub fn decode_command_ack(reply: &Report) -> Result<(), LinkError> {
    let accepted = decode_write_ack(reply)?;
    if accepted != COMMAND_TRANSFER_LEN {
        return Err(LinkError::IncompleteTransfer { accepted });
    }
    Ok(())
}
