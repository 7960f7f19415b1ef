//! Checkpoint records — one line of the resumption tape.
//!
//! The textual form is `BLOCK <height> <blockHash> <prevBlockHash> <unixTimestamp>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{BlockHash, BlockHeader, Height, Timestamp, TypesError};

/// Leading keyword of every tape line.
pub const RECORD_TAG: &str = "BLOCK";

/// Durable marker that a block has been fully processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub height: Height,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    pub timestamp: Timestamp,
}

impl From<&BlockHeader> for CheckpointRecord {
    fn from(header: &BlockHeader) -> Self {
        Self {
            height: header.height,
            hash: header.hash,
            prev_hash: header.prev_hash,
            timestamp: header.time,
        }
    }
}

impl fmt::Display for CheckpointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{RECORD_TAG} {} {} {} {}",
            self.height, self.hash, self.prev_hash, self.timestamp
        )
    }
}

impl FromStr for CheckpointRecord {
    type Err = TypesError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidRecord(line.to_string());
        let mut fields = line.split_whitespace();
        if fields.next() != Some(RECORD_TAG) {
            return Err(invalid());
        }
        let height = fields.next().and_then(|f| f.parse().ok()).ok_or_else(invalid)?;
        let hash = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let prev_hash = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let timestamp = fields
            .next()
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(invalid)?;
        if fields.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            height,
            hash,
            prev_hash,
            timestamp: Timestamp::new(timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "BLOCK 609693 000000000000000003a8d6a69e65643f3dbdf00dd36e46509ef5f6a090537f9d 00000000000000000466925f21e1ad6f52ad31ff1572de70f7b1a4734e562ac9 1574304292";

    #[test]
    fn parses_and_formats_tape_line() {
        let record: CheckpointRecord = LINE.parse().unwrap();
        assert_eq!(record.height, 609693);
        assert_eq!(record.timestamp.as_secs(), 1574304292);
        assert_eq!(record.to_string(), LINE);
    }

    #[test]
    fn rejects_wrong_tag_and_missing_fields() {
        assert!(LINE.replace("BLOCK", "TX").parse::<CheckpointRecord>().is_err());
        assert!("BLOCK 1".parse::<CheckpointRecord>().is_err());
        assert!(format!("{LINE} extra").parse::<CheckpointRecord>().is_err());
        assert!("".parse::<CheckpointRecord>().is_err());
    }

    #[test]
    fn built_from_header() {
        let header = BlockHeader {
            height: 3,
            hash: BlockHash::new([3u8; 32]),
            prev_hash: BlockHash::new([2u8; 32]),
            time: Timestamp::new(99),
        };
        let record = CheckpointRecord::from(&header);
        assert_eq!(record.height, 3);
        assert_eq!(record.prev_hash, header.prev_hash);
        assert_eq!(record.timestamp, header.time);
    }
}
