//! Text memory images.
//!
//! An image is a whitespace-separated stream of hexadecimal numbers:
//! records of `<start> <count> <unit>...`, terminated by the entry address,
//! written either alone or as `<entry> 0`. A leading `0x` on any number is
//! accepted.

use std::str::FromStr;

use thiserror::Error;

/// Parse failures for memory images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// A token was not a hexadecimal number.
    #[error("token {index} ({token:?}) is not a hexadecimal number")]
    BadToken {
        /// Zero-based token position.
        index: usize,
        /// Offending text.
        token: String,
    },
    /// A record announced more units than the image holds.
    #[error("record at {start:#x} announces {expected} unit(s) but only {found} follow")]
    TruncatedRecord {
        /// Record start address.
        start: u64,
        /// Announced unit count.
        expected: u64,
        /// Units present.
        found: usize,
    },
    /// The image ended without an entry address.
    #[error("image has no entry address")]
    MissingEntry,
}

/// Consecutive units starting at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Address of the first unit.
    pub start: u64,
    /// Unit values in address order.
    pub units: Vec<u64>,
}

/// A parsed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Data records in file order.
    pub records: Vec<ImageRecord>,
    /// Entry address.
    pub entry: u64,
}

impl Image {
    /// Total units across all records.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.records.iter().map(|record| record.units.len()).sum()
    }
}

fn parse_hex(index: usize, token: &str) -> Result<u64, ImageError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).map_err(|_| ImageError::BadToken {
        index,
        token: token.to_owned(),
    })
}

impl FromStr for Image {
    type Err = ImageError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut records = Vec::new();
        let mut cursor = 0;
        loop {
            let Some(first) = tokens.get(cursor) else {
                return Err(ImageError::MissingEntry);
            };
            let start = parse_hex(cursor, first)?;
            let Some(second) = tokens.get(cursor + 1) else {
                return Ok(Self {
                    records,
                    entry: start,
                });
            };
            let count = parse_hex(cursor + 1, second)?;
            let body = cursor + 2;
            if count == 0 && body == tokens.len() {
                return Ok(Self {
                    records,
                    entry: start,
                });
            }
            let available = tokens.len() - body;
            let wanted = usize::try_from(count)
                .ok()
                .filter(|wanted| *wanted <= available)
                .ok_or(ImageError::TruncatedRecord {
                    start,
                    expected: count,
                    found: available,
                })?;
            let units = tokens[body..body + wanted]
                .iter()
                .enumerate()
                .map(|(offset, token)| parse_hex(body + offset, token))
                .collect::<Result<Vec<_>, _>>()?;
            if !units.is_empty() {
                records.push(ImageRecord { start, units });
            }
            cursor = body + wanted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Image, ImageError, ImageRecord};

    #[test]
    fn records_then_lone_entry() {
        let image: Image = "0 3 a b c\n10 1 ff\n4".parse().expect("valid image");
        assert_eq!(
            image.records,
            vec![
                ImageRecord {
                    start: 0,
                    units: vec![0xA, 0xB, 0xC],
                },
                ImageRecord {
                    start: 0x10,
                    units: vec![0xFF],
                },
            ]
        );
        assert_eq!(image.entry, 4);
        assert_eq!(image.unit_count(), 4);
    }

    #[test]
    fn entry_with_zero_count_and_hex_prefix() {
        let image: Image = "0x20 2 0x1 0X2 0x100 0".parse().expect("valid image");
        assert_eq!(image.records.len(), 1);
        assert_eq!(image.entry, 0x100);
    }

    #[test]
    fn malformed_images_are_rejected() {
        assert_eq!("".parse::<Image>(), Err(ImageError::MissingEntry));
        assert_eq!("0 1 5".parse::<Image>(), Err(ImageError::MissingEntry));
        assert_eq!(
            "0 4 1 2".parse::<Image>(),
            Err(ImageError::TruncatedRecord {
                start: 0,
                expected: 4,
                found: 2,
            })
        );
        assert_eq!(
            "0 1 zz 0".parse::<Image>(),
            Err(ImageError::BadToken {
                index: 2,
                token: "zz".into(),
            })
        );
    }
}
