//! Firmware image format: Motorola S-record.
use std::path::Path;

use crate::constants::{IMAGE_EXTENSION, MAX_RECORD_LEN};
use crate::error::{FlashError, ParseError};

/// One data record of the image, a payload for a 16-bit data flash address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteRecord {
    address: u16,
    data: Vec<u8>,
    checksum: u8,
}

impl WriteRecord {
    /// Returns `None` when the payload is empty, longer than a record may be,
    /// or runs past the end of the 16-bit address space.
    pub fn new(address: u16, data: Vec<u8>) -> Option<Self> {
        if data.is_empty() || data.len() > MAX_RECORD_LEN {
            return None;
        }
        if address as usize + data.len() > 0x1_0000 {
            return None;
        }
        let mut raw = vec![(2 + data.len() + 1) as u8];
        raw.extend_from_slice(&address.to_be_bytes());
        raw.extend_from_slice(&data);
        Some(WriteRecord {
            address,
            checksum: line_checksum(&raw),
            data,
        })
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Checksum of the record's S1 line, whatever width it was read from.
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Serialize as an S1 line.
    pub fn to_srec(&self) -> String {
        let mut raw = vec![(2 + self.data.len() + 1) as u8];
        raw.extend_from_slice(&self.address.to_be_bytes());
        raw.extend_from_slice(&self.data);
        let checksum = line_checksum(&raw);
        format!("S1{}{:02X}", hex::encode_upper(&raw), checksum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Header,
    Data,
    Terminator,
}

/// Ones' complement of the low byte of the sum.
pub fn line_checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Parse an S-record image into its data records, in file order.
///
/// Parsing stops at the first termination record (S7/S8/S9). Lines after
/// it are not looked at.
pub fn parse(image: &str) -> Result<Vec<WriteRecord>, ParseError> {
    let mut records = vec![];

    for (idx, line) in image.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut chars = line.chars();
        if chars.next() != Some('S') {
            return Err(ParseError::malformed(line_no, "missing 'S' type marker"));
        }
        let kind = chars
            .next()
            .ok_or_else(|| ParseError::malformed(line_no, "missing record type"))?;
        let (kind, addr_width) = match kind {
            '0' => (RecordKind::Header, 2),
            '1' => (RecordKind::Data, 2),
            '2' => (RecordKind::Data, 3),
            '3' => (RecordKind::Data, 4),
            '7' => (RecordKind::Terminator, 4),
            '8' => (RecordKind::Terminator, 3),
            '9' => (RecordKind::Terminator, 2),
            '4' | '5' | '6' => return Err(ParseError::UnsupportedType { line: line_no, kind }),
            other => {
                return Err(ParseError::malformed(
                    line_no,
                    format!("invalid record type {other:?}"),
                ));
            }
        };

        let raw = hex::decode(chars.as_str())
            .map_err(|e| ParseError::malformed(line_no, e.to_string()))?;
        let Some((&count, rest)) = raw.split_first() else {
            return Err(ParseError::malformed(line_no, "missing byte count"));
        };
        if rest.len() != count as usize {
            return Err(ParseError::malformed(
                line_no,
                format!("byte count {count} but {} bytes follow", rest.len()),
            ));
        }
        if rest.len() < addr_width + 1 {
            return Err(ParseError::malformed(line_no, "record too short for its address"));
        }

        let Some((&actual, body)) = raw.split_last() else {
            return Err(ParseError::malformed(line_no, "missing checksum"));
        };
        let expected = line_checksum(body);
        if expected != actual {
            return Err(ParseError::BadChecksum {
                line: line_no,
                expected,
                actual,
            });
        }

        let address = body[1..1 + addr_width]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        let data = &body[1 + addr_width..];

        match kind {
            RecordKind::Header => {
                log::debug!("header: {}", String::from_utf8_lossy(data));
            }
            RecordKind::Terminator => {
                log::debug!("termination record at line {}", line_no);
                return Ok(records);
            }
            RecordKind::Data => {
                let record = u16::try_from(address)
                    .ok()
                    .and_then(|address| WriteRecord::new(address, data.to_vec()))
                    .ok_or_else(|| {
                        ParseError::malformed(
                            line_no,
                            format!(
                                "{} bytes at {:#x} do not fit the 16-bit data flash (1..={} bytes)",
                                data.len(),
                                address,
                                MAX_RECORD_LEN
                            ),
                        )
                    })?;
                records.push(record);
            }
        }
    }

    Err(ParseError::MissingTerminator)
}

/// Serialize records back into an S-record image with an S9 terminator.
pub fn to_srec(records: &[WriteRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_srec());
        out.push('\n');
    }
    out.push_str("S9030000FC\n");
    out
}

/// Checks that `path` is a regular file with the `.srec` extension.
pub fn check_image_path<P: AsRef<Path>>(path: P) -> Result<(), FlashError> {
    let p = path.as_ref();
    let invalid = |reason: &str| FlashError::InvalidImage {
        path: p.to_path_buf(),
        reason: reason.to_string(),
    };

    if !p.is_file() {
        return Err(invalid("no such file"));
    }
    let ext = p
        .extension()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext != IMAGE_EXTENSION {
        return Err(invalid("expected a .srec image"));
    }
    Ok(())
}

/// Validate, read and parse an image file.
pub fn read_image_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<WriteRecord>, FlashError> {
    let p = path.as_ref();
    check_image_path(p)?;
    let text = std::fs::read_to_string(p)?;
    let records = parse(&text)?;
    log::info!("Read {} ({} records)", p.display(), records.len());
    Ok(records)
}
