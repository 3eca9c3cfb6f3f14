//! Parsers for the structured frames the modem emits, and the checksum used
//! by the binary transfer handshake.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::SbdError;

/// `MO status` disposition reported in a session frame when the message was
/// accepted by the network.
pub const MO_STATUS_SENT: i32 = 1;

/// Start of the Iridium era-2 epoch, 2014-05-11T14:23:55Z.
/// See ITN0018: the device time counter was rebased to this instant.
const ERA2_EPOCH_UNIX_SECS: u64 = 1_399_818_235;

/// The device time counter counts 90 ms intervals since the epoch.
const TICK_MILLIS: u64 = 90;

/// Result of the last send/receive session, as reported in a
/// `+SBDI:`/`+SBDIX:` frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// Disposition of the mobile-originated transaction.
    pub mo_status: i32,
    /// Mobile-originated message sequence number.
    pub mo_msn: i32,
    /// Disposition of the mobile-terminated transaction.
    pub mt_status: i32,
    /// Mobile-terminated message sequence number.
    pub mt_msn: i32,
    /// Length in bytes of the received mobile-terminated message.
    pub mt_len: i32,
    /// Count of mobile-terminated messages still queued at the gateway.
    pub mt_queued: i32,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MO {}/{} MT {}/{} len {} queued {}",
            self.mo_status, self.mo_msn, self.mt_status, self.mt_msn, self.mt_len, self.mt_queued
        )
    }
}

/// Parse a session status frame such as `+SBDIX: 0, 4, 1, 2, 6, 9`.
///
/// Exactly six comma-separated integers are required; anything else is a
/// parse error and leaves the caller's previous snapshot intact.
pub fn parse_session_status(line: &str) -> Result<SessionStatus, SbdError> {
    let rest = line
        .strip_prefix("+SBDIX:")
        .or_else(|| line.strip_prefix("+SBDI:"))
        .ok_or_else(|| SbdError::Parse(format!("not a session status frame: {line}")))?;

    let fields = rest
        .split(',')
        .map(|f| f.trim().parse::<i32>())
        .collect::<Result<Vec<i32>, _>>()
        .map_err(|_| SbdError::Parse(format!("non-numeric session status field: {line}")))?;
    if fields.len() != 6 {
        return Err(SbdError::Parse(format!(
            "expected 6 session status fields, got {}: {line}",
            fields.len()
        )));
    }

    Ok(SessionStatus {
        mo_status: fields[0],
        mo_msn: fields[1],
        mt_status: fields[2],
        mt_msn: fields[3],
        mt_len: fields[4],
        mt_queued: fields[5],
    })
}

/// Parse a signal quality frame such as `+CSQ:3` (0 = no signal, 5 = best).
pub fn parse_signal_quality(line: &str) -> Result<i32, SbdError> {
    let rest = line
        .strip_prefix("+CSQ:")
        .ok_or_else(|| SbdError::Parse(format!("not a signal quality frame: {line}")))?;
    rest.trim()
        .parse::<i32>()
        .map_err(|_| SbdError::Parse(format!("non-numeric signal quality: {line}")))
}

/// Parse a device time frame such as `-MSSTM: 3b9cad12`: a hex count of
/// 90 ms ticks since the era-2 epoch.
///
/// A modem without network service answers `-MSSTM: no network service`,
/// which lands here as a parse error.
// TODO: detect counter rollover into the next era (the counter wraps after
// roughly twelve years and restarts from zero).
pub fn parse_system_time(line: &str) -> Result<SystemTime, SbdError> {
    let rest = line
        .strip_prefix("-MSSTM:")
        .ok_or_else(|| SbdError::Parse(format!("not a device time frame: {line}")))?;
    let ticks = u64::from_str_radix(rest.trim(), 16)
        .map_err(|_| SbdError::Parse(format!("invalid device time: {line}")))?;

    let since_epoch = Duration::from_millis(ticks * TICK_MILLIS);
    Ok(UNIX_EPOCH + Duration::from_secs(ERA2_EPOCH_UNIX_SECS) + since_epoch)
}

/// Checksum appended to binary payloads: the low 16 bits of the byte sum,
/// big-endian.
pub fn binary_checksum(payload: &[u8]) -> [u8; 2] {
    let sum: u32 = payload.iter().map(|&b| u32::from(b)).sum();
    [(sum >> 8) as u8, sum as u8]
}
