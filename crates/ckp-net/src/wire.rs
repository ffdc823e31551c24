//! Wire format.
//!
//! Messages are single ASCII lines, one per datagram: a tag, decimal
//! numeric fields, and hex-encoded digests, separated by spaces. Binary
//! key material never appears on the wire, only digests.
//!
//! ```text
//! CAND <round> <digest> [<digest> ...]   candidate identifiers for a round
//! MATCH <round> <index>                  sender matched our candidate
//! KEY <num-parts> <digest>               sender proposes a candidate key
//! ACK <digest>                           sender acknowledges a proposed key
//! NACK                                   sender aborts the protocol run
//! ```
//!
//! A round whose candidate list does not fit the transport's maximum
//! payload is split across several datagrams, each restating the round
//! number so receivers can reassemble the set independently of packet
//! boundaries.

use bytes::Bytes;

use ckp_core::{CandidateIdentifier, FragmentDigest};

use crate::error::WireError;

const TAG_CANDIDATES: &str = "CAND";
const TAG_MATCH: &str = "MATCH";
const TAG_KEY: &str = "KEY";
const TAG_ACK: &str = "ACK";
const TAG_NACK: &str = "NACK";

/// Hex characters in an encoded digest.
const DIGEST_HEX_LEN: usize = 64;

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Candidate identifiers for one round (possibly one of several
    /// datagrams for that round). The candidate index is implicit in the
    /// list position.
    Candidates {
        round: u32,
        digests: Vec<FragmentDigest>,
    },
    /// The sender's history matched the identifier we broadcast at
    /// (`round`, `index`), in our numbering, echoed back.
    Match { round: u32, index: u8 },
    /// The sender proposes a candidate key assembled from `num_parts`
    /// matching parts.
    Key {
        num_parts: usize,
        digest: FragmentDigest,
    },
    /// The sender reconstructed and accepts the key with this digest.
    Ack { digest: FragmentDigest },
    /// The sender aborts the protocol run with us.
    Nack,
}

impl WireMessage {
    /// Parse one datagram.
    pub fn parse(payload: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(payload).map_err(|_| WireError::NotText)?;
        let mut fields = text.split_ascii_whitespace();
        let tag = fields.next().ok_or(WireError::MissingField("tag"))?;

        match tag {
            TAG_CANDIDATES => {
                let round = parse_number(&mut fields, "round")?;
                let digests: Vec<FragmentDigest> = fields
                    .map(parse_digest)
                    .collect::<Result<_, WireError>>()?;
                if digests.is_empty() {
                    return Err(WireError::EmptyCandidateList);
                }
                Ok(Self::Candidates { round, digests })
            }
            TAG_MATCH => Ok(Self::Match {
                round: parse_number(&mut fields, "round")?,
                index: parse_number(&mut fields, "index")?,
            }),
            TAG_KEY => Ok(Self::Key {
                num_parts: parse_number(&mut fields, "num-parts")?,
                digest: parse_digest(fields.next().ok_or(WireError::MissingField("digest"))?)?,
            }),
            TAG_ACK => Ok(Self::Ack {
                digest: parse_digest(fields.next().ok_or(WireError::MissingField("digest"))?)?,
            }),
            TAG_NACK => Ok(Self::Nack),
            other => Err(WireError::UnknownTag(other.to_string())),
        }
    }

    /// Encode into one datagram payload.
    pub fn encode(&self) -> Bytes {
        let line = match self {
            Self::Candidates { round, digests } => {
                let mut line = format!("{TAG_CANDIDATES} {round}");
                for digest in digests {
                    line.push(' ');
                    line.push_str(&digest.to_hex());
                }
                line
            }
            Self::Match { round, index } => format!("{TAG_MATCH} {round} {index}"),
            Self::Key { num_parts, digest } => {
                format!("{TAG_KEY} {num_parts} {}", digest.to_hex())
            }
            Self::Ack { digest } => format!("{TAG_ACK} {}", digest.to_hex()),
            Self::Nack => TAG_NACK.to_string(),
        };
        let mut payload = line.into_bytes();
        payload.push(b'\n');
        Bytes::from(payload)
    }
}

/// Turn the identifiers of one round into candidate identifiers with the
/// implicit-position convention used on the wire.
pub fn identifiers_from_digests(round: u32, digests: &[FragmentDigest]) -> Vec<CandidateIdentifier> {
    digests
        .iter()
        .enumerate()
        .map(|(index, digest)| CandidateIdentifier {
            round,
            // Index saturates past the per-round limit; such lists are
            // rejected by the matcher anyway.
            index: index.min(u8::MAX as usize) as u8,
            digest: *digest,
        })
        .collect()
}

/// Encode one round of candidate digests, splitting across datagrams when
/// the encoded list exceeds `max_payload`. Every datagram restates the
/// round number.
pub fn encode_candidate_round(
    round: u32,
    digests: &[FragmentDigest],
    max_payload: usize,
) -> Result<Vec<Bytes>, WireError> {
    let header_len = TAG_CANDIDATES.len() + 1 + decimal_width(round);
    // Header, one space-separated digest, newline.
    if header_len + 1 + DIGEST_HEX_LEN + 1 > max_payload {
        return Err(WireError::PayloadTooSmall { max: max_payload });
    }
    let per_datagram = (max_payload - header_len - 1) / (DIGEST_HEX_LEN + 1);

    Ok(digests
        .chunks(per_datagram)
        .map(|chunk| {
            WireMessage::Candidates {
                round,
                digests: chunk.to_vec(),
            }
            .encode()
        })
        .collect())
}

fn parse_number<T: std::str::FromStr>(
    fields: &mut std::str::SplitAsciiWhitespace<'_>,
    field: &'static str,
) -> Result<T, WireError> {
    let value = fields.next().ok_or(WireError::MissingField(field))?;
    value.parse().map_err(|_| WireError::BadNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_digest(hex_digest: &str) -> Result<FragmentDigest, WireError> {
    let bytes = hex::decode(hex_digest)?;
    if bytes.len() != 32 {
        return Err(WireError::BadDigestLength(bytes.len()));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(FragmentDigest::from_bytes(arr))
}

fn decimal_width(mut n: u32) -> usize {
    let mut width = 1;
    while n >= 10 {
        n /= 10;
        width += 1;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(tag: u8) -> FragmentDigest {
        FragmentDigest::digest(&[tag])
    }

    #[test]
    fn test_candidates_roundtrip() {
        let msg = WireMessage::Candidates {
            round: 17,
            digests: vec![digest(1), digest(2), digest(3)],
        };
        let encoded = msg.encode();
        assert!(encoded.ends_with(b"\n"));
        assert_eq!(WireMessage::parse(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_match_roundtrip() {
        let msg = WireMessage::Match { round: 3, index: 2 };
        assert_eq!(&*msg.encode(), b"MATCH 3 2\n");
        assert_eq!(WireMessage::parse(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_key_ack_nack_roundtrip() {
        for msg in [
            WireMessage::Key {
                num_parts: 4,
                digest: digest(9),
            },
            WireMessage::Ack { digest: digest(9) },
            WireMessage::Nack,
        ] {
            assert_eq!(WireMessage::parse(&msg.encode()).unwrap(), msg);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_tag() {
        assert!(matches!(
            WireMessage::parse(b"HELLO world\n"),
            Err(WireError::UnknownTag(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        assert!(matches!(
            WireMessage::parse(b"MATCH x 2\n"),
            Err(WireError::BadNumber { field: "round", .. })
        ));
        // Index must fit a byte.
        assert!(matches!(
            WireMessage::parse(b"MATCH 1 300\n"),
            Err(WireError::BadNumber { field: "index", .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_digest() {
        assert!(matches!(
            WireMessage::parse(b"ACK zzzz\n"),
            Err(WireError::BadHex(_))
        ));
        assert!(matches!(
            WireMessage::parse(b"ACK abcd\n"),
            Err(WireError::BadDigestLength(2))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_candidate_list() {
        assert!(matches!(
            WireMessage::parse(b"CAND 5\n"),
            Err(WireError::EmptyCandidateList)
        ));
        assert!(matches!(
            WireMessage::parse(b""),
            Err(WireError::MissingField("tag"))
        ));
    }

    #[test]
    fn test_parse_rejects_binary() {
        assert!(matches!(
            WireMessage::parse(&[0xFF, 0xFE, 0x00]),
            Err(WireError::NotText)
        ));
    }

    #[test]
    fn test_round_split_restates_round() {
        let digests: Vec<FragmentDigest> = (0u8..10).map(digest).collect();
        // Room for the header plus three digests per datagram.
        let max = "CAND 12345".len() + 3 * (DIGEST_HEX_LEN + 1) + 1;
        let datagrams = encode_candidate_round(12345, &digests, max).unwrap();
        assert_eq!(datagrams.len(), 4);

        let mut reassembled = Vec::new();
        for datagram in &datagrams {
            assert!(datagram.len() <= max);
            match WireMessage::parse(datagram).unwrap() {
                WireMessage::Candidates { round, digests } => {
                    assert_eq!(round, 12345);
                    reassembled.extend(digests);
                }
                other => panic!("expected candidates, got {other:?}"),
            }
        }
        assert_eq!(reassembled, digests);
    }

    #[test]
    fn test_round_split_rejects_tiny_payload() {
        assert!(matches!(
            encode_candidate_round(1, &[digest(1)], 16),
            Err(WireError::PayloadTooSmall { max: 16 })
        ));
    }

    #[test]
    fn test_identifiers_use_list_position() {
        let ids = identifiers_from_digests(7, &[digest(1), digest(2)]);
        assert_eq!(ids[0].index, 0);
        assert_eq!(ids[1].index, 1);
        assert_eq!(ids[1].round, 7);
    }
}
