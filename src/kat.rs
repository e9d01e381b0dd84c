//! Known answer tests in the NIST CAVP response file format
//! (`XTSGenAES128.rsp`, `XTSGenAES256.rsp`).
//!
//! A response file is a list of `[ENCRYPT]` / `[DECRYPT]` sections, each
//! holding blank-line separated records:
//!
//! ```text
//! COUNT = 1
//! DataUnitLen = 128
//! Key = 46e6ed9ef42dcdb3c893093c28e1fc0f91f5caa3b6e0bc5a14e783215c1d5b61
//! i = 72f3b054cbdc2f9e3c5bc551d44ddba0
//! PT = e3778d68e730ef945b4ae3bc5b936bdd
//! CT = 97409f1f71ae4521cb49a32973de4d05
//! ```
//!
//! `Key` is the combined `Key1 || Key2`. The tweak is either given as hex
//! (`i`) or as a decimal data unit sequence number (`DataUnitSeqNumber`).

use crate::xts::{
    tweak_from_sequence_number, AesCipher, Block, Direction, XtsContext, XtsError, XtsKey,
};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KatError {
    #[error("line {line}: expected `NAME = VALUE`, found {text:?}")]
    Malformed { line: usize, text: String },
    #[error("line {line}: unknown section [{name}]")]
    UnknownSection { line: usize, name: String },
    #[error("line {line}: record outside of an [ENCRYPT] or [DECRYPT] section")]
    NoSection { line: usize },
    #[error("line {line}: {field} is not valid hex")]
    Hex {
        line: usize,
        field: String,
        #[source]
        source: hex::FromHexError,
    },
    #[error("line {line}: {field} is not a valid number")]
    Number { line: usize, field: String },
    #[error("line {line}: tweak must be 16 bytes, found {len}")]
    TweakLength { line: usize, len: usize },
    #[error("vector COUNT = {count}: missing {field}")]
    MissingField { count: u32, field: &'static str },
    #[error("vector COUNT = {count}: DataUnitLen of {bits} bits does not match the data")]
    LengthMismatch { count: u32, bits: usize },
    #[error("vector COUNT = {count}: {source}")]
    Xts {
        count: u32,
        #[source]
        source: XtsError,
    },
}

pub type Result<T> = std::result::Result<T, KatError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KatVector {
    pub count: u32,
    pub direction: Direction,
    pub data_unit_bits: usize,
    pub key: Vec<u8>,
    pub tweak: Block,
    pub plaintext: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KatOutcome {
    Passed,
    Failed { expected: Vec<u8>, actual: Vec<u8> },
    Skipped(&'static str),
}

impl KatVector {
    /// Runs the vector in the direction of its section.
    pub fn run(&self) -> Result<KatOutcome> {
        if self.data_unit_bits % 8 != 0 {
            return Ok(KatOutcome::Skipped("data unit is not a whole number of bytes"));
        }
        let len = self.data_unit_bits / 8;
        if self.plaintext.len() != len || self.ciphertext.len() != len {
            return Err(KatError::LengthMismatch {
                count: self.count,
                bits: self.data_unit_bits,
            });
        }
        let xts_err = |source| KatError::Xts {
            count: self.count,
            source,
        };
        let key = XtsKey::from_combined(&self.key).map_err(xts_err)?;
        let ctx = XtsContext::<AesCipher>::new(&key).map_err(xts_err)?;
        let (input, expected) = match self.direction {
            Direction::Encrypt => (&self.plaintext, &self.ciphertext),
            Direction::Decrypt => (&self.ciphertext, &self.plaintext),
        };
        let mut actual = input.clone();
        ctx.process_in_place(&mut actual, &self.tweak, self.direction)
            .map_err(xts_err)?;
        if &actual == expected {
            Ok(KatOutcome::Passed)
        } else {
            Ok(KatOutcome::Failed {
                expected: expected.clone(),
                actual,
            })
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KatSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl KatSummary {
    pub fn record(&mut self, outcome: &KatOutcome) {
        match outcome {
            KatOutcome::Passed => self.passed += 1,
            KatOutcome::Failed { .. } => self.failed += 1,
            KatOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: KatSummary) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for KatSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed, self.failed, self.skipped
        )
    }
}

/// Runs every vector, stopping only on malformed vectors.
pub fn run_all(vectors: &[KatVector]) -> Result<KatSummary> {
    let mut summary = KatSummary::default();
    for vector in vectors {
        let outcome = vector.run()?;
        match &outcome {
            KatOutcome::Failed { expected, actual } => warn!(
                "{:?} COUNT = {} failed: expected {}, got {}",
                vector.direction,
                vector.count,
                hex::encode(expected),
                hex::encode(actual)
            ),
            KatOutcome::Skipped(reason) => {
                debug!("{:?} COUNT = {} skipped: {}", vector.direction, vector.count, reason)
            }
            KatOutcome::Passed => {}
        }
        summary.record(&outcome);
    }
    debug!("KAT run finished: {}", summary);
    Ok(summary)
}

/// Fields of the record currently being read.
#[derive(Default)]
struct Record {
    count: Option<u32>,
    data_unit_bits: Option<usize>,
    key: Option<Vec<u8>>,
    tweak: Option<Block>,
    plaintext: Option<Vec<u8>>,
    ciphertext: Option<Vec<u8>>,
}

impl Record {
    fn is_empty(&self) -> bool {
        self.count.is_none()
            && self.data_unit_bits.is_none()
            && self.key.is_none()
            && self.tweak.is_none()
            && self.plaintext.is_none()
            && self.ciphertext.is_none()
    }

    fn finish(self, direction: Direction) -> Result<KatVector> {
        let count = self.count.unwrap_or(0);
        let missing = |field| KatError::MissingField { count, field };
        let plaintext = self.plaintext.ok_or_else(|| missing("PT"))?;
        Ok(KatVector {
            count,
            direction,
            data_unit_bits: self.data_unit_bits.unwrap_or(plaintext.len() * 8),
            key: self.key.ok_or_else(|| missing("Key"))?,
            tweak: self.tweak.ok_or_else(|| missing("i"))?,
            ciphertext: self.ciphertext.ok_or_else(|| missing("CT"))?,
            plaintext,
        })
    }
}

fn parse_hex(line: usize, field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|source| KatError::Hex {
        line,
        field: field.to_owned(),
        source,
    })
}

fn parse_number<T: std::str::FromStr>(line: usize, field: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| KatError::Number {
        line,
        field: field.to_owned(),
    })
}

/// Parses a CAVP response file into its vectors, in file order.
pub fn parse_rsp(input: &str) -> Result<Vec<KatVector>> {
    let mut vectors = Vec::new();
    let mut direction = None;
    let mut record = Record::default();

    fn flush(
        record: &mut Record,
        direction: Option<Direction>,
        vectors: &mut Vec<KatVector>,
        line: usize,
    ) -> Result<()> {
        if record.is_empty() {
            return Ok(());
        }
        let direction = direction.ok_or(KatError::NoSection { line })?;
        vectors.push(std::mem::take(record).finish(direction)?);
        Ok(())
    }

    for (index, raw) in input.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.starts_with('#') {
            continue;
        }
        if text.is_empty() {
            flush(&mut record, direction, &mut vectors, line)?;
            continue;
        }
        if let Some(name) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            flush(&mut record, direction, &mut vectors, line)?;
            direction = Some(match name.trim().to_ascii_uppercase().as_str() {
                "ENCRYPT" => Direction::Encrypt,
                "DECRYPT" => Direction::Decrypt,
                _ => {
                    return Err(KatError::UnknownSection {
                        line,
                        name: name.to_owned(),
                    })
                }
            });
            continue;
        }
        let Some((field, value)) = text.split_once('=') else {
            return Err(KatError::Malformed {
                line,
                text: text.to_owned(),
            });
        };
        if direction.is_none() {
            return Err(KatError::NoSection { line });
        }
        let (field, value) = (field.trim(), value.trim());
        match field.to_ascii_uppercase().as_str() {
            "COUNT" => {
                flush(&mut record, direction, &mut vectors, line)?;
                record.count = Some(parse_number(line, field, value)?);
            }
            "DATAUNITLEN" => record.data_unit_bits = Some(parse_number(line, field, value)?),
            "KEY" => record.key = Some(parse_hex(line, field, value)?),
            "I" => {
                let tweak = parse_hex(line, field, value)?;
                let len = tweak.len();
                record.tweak = Some(
                    tweak
                        .try_into()
                        .map_err(|_| KatError::TweakLength { line, len })?,
                );
            }
            "DATAUNITSEQNUMBER" => {
                let sequence_number: u128 = parse_number(line, field, value)?;
                record.tweak = Some(tweak_from_sequence_number(sequence_number));
            }
            "PT" => record.plaintext = Some(parse_hex(line, field, value)?),
            "CT" => record.ciphertext = Some(parse_hex(line, field, value)?),
            _ => trace!("line {}: ignoring field {}", line, field),
        }
    }
    flush(&mut record, direction, &mut vectors, input.lines().count())?;
    debug!("Parsed {} KAT vectors", vectors.len());
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const SAMPLE: &str = "\
# CAVS 11.0
# XTSGen information for \"sample\"
# Generated on Thu Sep 01 12:00:00 2011

[ENCRYPT]

COUNT = 1
DataUnitLen = 128
Key = 46e6ed9ef42dcdb3c893093c28e1fc0f91f5caa3b6e0bc5a14e783215c1d5b61
i = 72f3b054cbdc2f9e3c5bc551d44ddba0
PT = e3778d68e730ef945b4ae3bc5b936bdd
CT = 97409f1f71ae4521cb49a32973de4d05

COUNT = 2
DataUnitLen = 168
Key = 46e6ed9ef42dcdb3c893093c28e1fc0f91f5caa3b6e0bc5a14e783215c1d5b61
DataUnitSeqNumber = 84
PT = 0123456789abcdeffedcba98765432100011223344
CT = 69964b90d6386b9af3154b381b18d07ea57c56a4cc

COUNT = 3
DataUnitLen = 130
Key = 46e6ed9ef42dcdb3c893093c28e1fc0f91f5caa3b6e0bc5a14e783215c1d5b61
i = 72f3b054cbdc2f9e3c5bc551d44ddba0
PT = e3778d68e730ef945b4ae3bc5b936bdd40
CT = 97409f1f71ae4521cb49a32973de4d0500

[DECRYPT]

COUNT = 1
DataUnitLen = 576
Key = 4f5ea01ac23120fd07d0494e0e395d420a14cd2043c0d3749dc783ac0c9122cd
i = 010c3ae44f1140785f4b9e37304f03b7
CT = e141a039f727b730341048694ee5adc043e32cbf090f0d3febab871b32338ca714b6ad07d23f2ed2f0ab4f17d085e14a1a41dcd43286ccfd3e317d848644cb474ca178707aafb73a
PT = 000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f4041424344454647
";

    #[test]
    fn test_parse_sample() {
        let vectors = parse_rsp(SAMPLE).unwrap();
        assert_eq!(vectors.len(), 4);

        assert_eq!(vectors[0].count, 1);
        assert_eq!(vectors[0].direction, Direction::Encrypt);
        assert_eq!(vectors[0].data_unit_bits, 128);
        assert_eq!(vectors[0].tweak, hex!("72f3b054cbdc2f9e3c5bc551d44ddba0"));

        assert_eq!(vectors[1].tweak, hex!("54000000000000000000000000000000"));
        assert_eq!(vectors[2].data_unit_bits, 130);

        assert_eq!(vectors[3].direction, Direction::Decrypt);
        assert_eq!(vectors[3].plaintext.len(), 72);
    }

    #[test]
    fn test_run_sample() {
        let vectors = parse_rsp(SAMPLE).unwrap();
        let outcomes: Vec<_> = vectors.iter().map(|v| v.run().unwrap()).collect();
        assert_eq!(outcomes[0], KatOutcome::Passed);
        assert_eq!(outcomes[1], KatOutcome::Passed);
        assert!(matches!(outcomes[2], KatOutcome::Skipped(_)));
        assert_eq!(outcomes[3], KatOutcome::Passed);

        let summary = run_all(&vectors).unwrap();
        assert_eq!(
            summary,
            KatSummary {
                passed: 3,
                failed: 0,
                skipped: 1
            }
        );
        assert!(summary.is_success());
        assert_eq!(summary.to_string(), "3 passed, 0 failed, 1 skipped");
    }

    #[test]
    fn test_wrong_answer_is_reported() {
        let input = SAMPLE.replace(
            "CT = 97409f1f71ae4521cb49a32973de4d05\n",
            "CT = 97409f1f71ae4521cb49a32973de4d06\n",
        );
        let vectors = parse_rsp(&input).unwrap();
        match vectors[0].run().unwrap() {
            KatOutcome::Failed { expected, actual } => {
                assert_eq!(expected, hex!("97409f1f71ae4521cb49a32973de4d06"));
                assert_eq!(actual, hex!("97409f1f71ae4521cb49a32973de4d05"));
            }
            other => panic!("expected a failure, got {other:?}"),
        }
        let summary = run_all(&vectors).unwrap();
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_rsp("[ENCRYPT]\nCOUNT 1\n"),
            Err(KatError::Malformed { line: 2, .. })
        ));
        assert!(matches!(
            parse_rsp("[MONTE]\n"),
            Err(KatError::UnknownSection { line: 1, .. })
        ));
        assert!(matches!(
            parse_rsp("COUNT = 1\nKey = 00\ni = 00\nPT = 00\nCT = 00\n"),
            Err(KatError::NoSection { line: 1 })
        ));
        assert!(matches!(
            parse_rsp("[ENCRYPT]\nCOUNT = 1\nKey = 0g\n"),
            Err(KatError::Hex { line: 3, .. })
        ));
        assert!(matches!(
            parse_rsp("[ENCRYPT]\nCOUNT = one\n"),
            Err(KatError::Number { line: 2, .. })
        ));
        assert!(matches!(
            parse_rsp("[ENCRYPT]\nCOUNT = 1\ni = 0011\n"),
            Err(KatError::TweakLength { line: 3, len: 2 })
        ));
        assert!(matches!(
            parse_rsp("[ENCRYPT]\nCOUNT = 7\nKey = 00\nPT = 00\nCT = 00\n"),
            Err(KatError::MissingField {
                count: 7,
                field: "i"
            })
        ));
    }

    #[test]
    fn test_record_before_section_reports_its_first_line() {
        // the record is well formed, only the section header is missing
        let input = "\
# no section header

COUNT = 1
DataUnitLen = 128
Key = 46e6ed9ef42dcdb3c893093c28e1fc0f91f5caa3b6e0bc5a14e783215c1d5b61
i = 72f3b054cbdc2f9e3c5bc551d44ddba0
PT = e3778d68e730ef945b4ae3bc5b936bdd
CT = 97409f1f71ae4521cb49a32973de4d05
";
        assert!(matches!(
            parse_rsp(input),
            Err(KatError::NoSection { line: 3 })
        ));
    }

    #[test]
    fn test_bad_key_is_an_error() {
        let input = SAMPLE.replacen(
            "Key = 46e6ed9ef42dcdb3c893093c28e1fc0f91f5caa3b6e0bc5a14e783215c1d5b61",
            "Key = 46e6ed9ef42dcdb3c893093c28e1fc0f91f5caa3b6e0bc5a14e783215c1d",
            1,
        );
        let vectors = parse_rsp(&input).unwrap();
        assert!(matches!(
            vectors[0].run(),
            Err(KatError::Xts {
                count: 1,
                source: XtsError::InvalidParameter(_)
            })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let input = SAMPLE.replacen("DataUnitLen = 128", "DataUnitLen = 256", 1);
        let vectors = parse_rsp(&input).unwrap();
        assert!(matches!(
            vectors[0].run(),
            Err(KatError::LengthMismatch {
                count: 1,
                bits: 256
            })
        ));
    }
}
