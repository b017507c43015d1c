//! Plaintext DTLS record header walk.
//!
//! The engine consumes alerts internally and only reports that the
//! handshake failed. To report which alert the peer sent, every datagram
//! arriving during the handshake is walked here before being handed over.

use nom::bytes::complete::take;
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::alert::Alert;

/// Record header size: type(1) version(2) epoch(2) sequence(6) length(2).
pub(crate) const RECORD_HEADER_LEN: usize = 13;

const CONTENT_TYPE_ALERT: u8 = 21;

/// A DTLS 1.0/1.2 record, borrowing the fragment from the datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Record<'a> {
    pub content_type: u8,
    pub version: u16,
    pub epoch: u16,
    pub fragment: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Record<'a>> {
        let (input, content_type) = be_u8(input)?;
        let (input, version) = be_u16(input)?;
        let (input, epoch) = be_u16(input)?;
        // 48 bit sequence number, not needed here.
        let (input, _) = take(6_usize)(input)?;
        let (input, fragment) = length_data(be_u16)(input)?;
        Ok((
            input,
            Record {
                content_type,
                version,
                epoch,
                fragment,
            },
        ))
    }

    /// The alert in this record, if it is an unencrypted alert.
    pub fn plaintext_alert(&self) -> Option<Alert> {
        if self.content_type != CONTENT_TYPE_ALERT || self.epoch != 0 {
            return None;
        }
        Alert::parse(self.fragment).ok().map(|(_, alert)| alert)
    }
}

/// Walk all records in a datagram and return the last plaintext alert.
///
/// Encrypted alerts (epoch > 0) can't be read without the engine's keys
/// and are skipped. A malformed record ends the walk.
pub(crate) fn find_alert(datagram: &[u8]) -> Option<Alert> {
    let mut input = datagram;
    let mut found = None;

    while input.len() >= RECORD_HEADER_LEN {
        let Ok((rest, record)) = Record::parse(input) else {
            trace!("Malformed record in {} byte datagram", datagram.len());
            break;
        };
        if let Some(alert) = record.plaintext_alert() {
            trace!("Plaintext alert {} (version {:#06x})", alert, record.version);
            found = Some(alert);
        }
        input = rest;
    }

    found
}
