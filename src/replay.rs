// 10.0 replay.rs: decoding recorded chain data for replay runs. each CSV row
// is [optional sequence index, hex block-header blob, colon-separated ticket
// id list]. a row is fully decoded and validated before the simulator touches
// any state, so a malformed row aborts the run with nothing mutated.

use std::io;

use crate::lifecycle::BlockIntents;
use crate::types::TicketId;

/// Fields per CSV record.
pub const RECORD_FIELDS: usize = 3;

/// Size of the fixed-layout header blob.
pub const HEADER_LEN: usize = 180;

// little-endian field offsets within the header blob
const VOTE_BITS_OFFSET: usize = 100;
const VOTERS_OFFSET: usize = 108;
const FRESH_STAKE_OFFSET: usize = 110;
const REVOCATIONS_OFFSET: usize = 111;

/// Bit 0 of the vote bits: the voters approved the parent block's regular
/// transactions.
pub const BLOCK_VALID_FLAG: u16 = 0x0001;

/// Replay decode errors. All of these surface before any simulator state
/// changes for the offending row.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("csv read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("record has {found} fields, expected 3")]
    FieldCount { found: usize },

    #[error("invalid hex in block header blob: {0}")]
    HeaderHex(#[source] hex::FromHexError),

    #[error("block header blob is {found} bytes, expected 180")]
    HeaderLength { found: usize },

    #[error("invalid ticket id {value:?}: {source}")]
    TicketId {
        value: String,
        source: hex::FromHexError,
    },

    #[error("{supplied} ticket ids in record for {declared} new tickets")]
    TicketCountMismatch { declared: u8, supplied: usize },
}

/// Stake-relevant fields decoded from the header blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub vote_bits: u16,
    pub voters: u16,
    pub fresh_stake: u8,
    pub revocations: u8,
}

/// Decode the fixed-layout header blob.
pub fn decode_header(bytes: &[u8]) -> Result<HeaderFields, ReplayError> {
    if bytes.len() != HEADER_LEN {
        return Err(ReplayError::HeaderLength { found: bytes.len() });
    }
    let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    Ok(HeaderFields {
        vote_bits: u16_at(VOTE_BITS_OFFSET),
        voters: u16_at(VOTERS_OFFSET),
        fresh_stake: bytes[FRESH_STAKE_OFFSET],
        revocations: bytes[REVOCATIONS_OFFSET],
    })
}

/// One fully decoded replay row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayData {
    pub voters: u16,
    pub prev_valid: bool,
    pub new_tickets: u8,
    pub ticket_ids: Vec<TicketId>,
    pub revocations: u16,
}

impl ReplayData {
    pub fn to_intents(&self) -> BlockIntents {
        BlockIntents {
            new_tickets: self.new_tickets,
            ticket_ids: Some(self.ticket_ids.clone()),
            voters: self.voters,
            revocations: self.revocations,
            prev_valid: self.prev_valid,
        }
    }
}

/// Convert a raw CSV record into concrete replay data. The declared fresh
/// stake count must match the number of supplied ticket ids exactly.
pub fn parse_record(record: &csv::StringRecord) -> Result<ReplayData, ReplayError> {
    if record.len() != RECORD_FIELDS {
        return Err(ReplayError::FieldCount {
            found: record.len(),
        });
    }

    let header_bytes = hex::decode(&record[1]).map_err(ReplayError::HeaderHex)?;
    let header = decode_header(&header_bytes)?;

    let id_field = &record[2];
    let id_strings: Vec<&str> = if id_field.is_empty() {
        Vec::new()
    } else {
        id_field.split(':').collect()
    };
    if id_strings.len() != usize::from(header.fresh_stake) {
        return Err(ReplayError::TicketCountMismatch {
            declared: header.fresh_stake,
            supplied: id_strings.len(),
        });
    }

    let mut ticket_ids = Vec::with_capacity(id_strings.len());
    for value in id_strings {
        let id = TicketId::from_hex(value).map_err(|source| ReplayError::TicketId {
            value: value.to_string(),
            source,
        })?;
        ticket_ids.push(id);
    }

    Ok(ReplayData {
        voters: header.voters,
        prev_valid: header.vote_bits & BLOCK_VALID_FLAG != 0,
        new_tickets: header.fresh_stake,
        ticket_ids,
        revocations: u16::from(header.revocations),
    })
}

/// Streaming reader over replay CSV input. A non-numeric first field on the
/// first row is treated as a header line and skipped.
pub struct ReplayReader<R: io::Read> {
    records: csv::StringRecordsIntoIter<R>,
    handled_header: bool,
}

impl<R: io::Read> ReplayReader<R> {
    pub fn new(input: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        Self {
            records: reader.into_records(),
            handled_header: false,
        }
    }
}

impl<R: io::Read> Iterator for ReplayReader<R> {
    type Item = Result<ReplayData, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(err.into())),
            };

            if !self.handled_header {
                self.handled_header = true;
                let first = record.get(0).unwrap_or_default();
                if first.parse::<i64>().is_err() {
                    continue;
                }
            }

            return Some(parse_record(&record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_hex(vote_bits: u16, voters: u16, fresh_stake: u8, revocations: u8) -> String {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[VOTE_BITS_OFFSET..VOTE_BITS_OFFSET + 2].copy_from_slice(&vote_bits.to_le_bytes());
        bytes[VOTERS_OFFSET..VOTERS_OFFSET + 2].copy_from_slice(&voters.to_le_bytes());
        bytes[FRESH_STAKE_OFFSET] = fresh_stake;
        bytes[REVOCATIONS_OFFSET] = revocations;
        hex::encode(bytes)
    }

    fn id_hex(n: u32) -> String {
        TicketId::generate(0, n).to_string()
    }

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn parses_a_complete_record() {
        let ids = format!("{}:{}:{}", id_hex(0), id_hex(1), id_hex(2));
        let header = header_hex(0x0001, 5, 3, 2);
        let data = parse_record(&record(&["17", &header, &ids])).unwrap();

        assert_eq!(data.voters, 5);
        assert!(data.prev_valid);
        assert_eq!(data.new_tickets, 3);
        assert_eq!(data.ticket_ids.len(), 3);
        assert_eq!(data.ticket_ids[1], TicketId::generate(0, 1));
        assert_eq!(data.revocations, 2);

        let intents = data.to_intents();
        assert_eq!(intents.new_tickets, 3);
        assert_eq!(intents.ticket_ids.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn vote_bits_flag_controls_prev_valid() {
        let header = header_hex(0x0000, 5, 0, 0);
        let data = parse_record(&record(&["1", &header, ""])).unwrap();
        assert!(!data.prev_valid);
        assert!(data.ticket_ids.is_empty());
    }

    #[test]
    fn ticket_count_mismatch_is_rejected() {
        let ids = format!("{}:{}", id_hex(0), id_hex(1));
        let header = header_hex(0x0001, 5, 3, 0);
        let err = parse_record(&record(&["1", &header, &ids])).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::TicketCountMismatch {
                declared: 3,
                supplied: 2
            }
        ));
    }

    #[test]
    fn header_blob_must_be_exact_length() {
        let err = parse_record(&record(&["1", "deadbeef", ""])).unwrap_err();
        assert!(matches!(err, ReplayError::HeaderLength { found: 4 }));

        let err = parse_record(&record(&["1", "xyz", ""])).unwrap_err();
        assert!(matches!(err, ReplayError::HeaderHex(_)));
    }

    #[test]
    fn bad_ticket_id_is_rejected() {
        let header = header_hex(0x0001, 5, 1, 0);
        let err = parse_record(&record(&["1", &header, "nothex"])).unwrap_err();
        assert!(matches!(err, ReplayError::TicketId { .. }));
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let err = parse_record(&record(&["1", "aa"])).unwrap_err();
        assert!(matches!(err, ReplayError::FieldCount { found: 2 }));
    }

    #[test]
    fn reader_skips_a_header_line() {
        let header = header_hex(0x0001, 5, 1, 0);
        let csv_input = format!(
            "Index,Block Header,Ticket Hashes\n0,{},{}\n1,{},{}\n",
            header,
            id_hex(0),
            header,
            id_hex(1),
        );
        let rows: Vec<_> = ReplayReader::new(csv_input.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticket_ids[0], TicketId::generate(0, 0));
        assert_eq!(rows[1].ticket_ids[0], TicketId::generate(0, 1));
    }

    #[test]
    fn reader_keeps_a_numeric_first_row() {
        let header = header_hex(0x0001, 5, 0, 0);
        let csv_input = format!("0,{},\n", header);
        let rows: Vec<_> = ReplayReader::new(csv_input.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
