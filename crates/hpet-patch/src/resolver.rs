//! Grows a listing-derived byte pattern until it is specific enough to patch in the real table.
//!
//! The same bytes can show up many times in a DSDT (similar `_CRS` bodies, repeated method
//! prologues), and the listing alone cannot tell how often. The pattern is therefore checked
//! against the raw table and padded with the following hex lines until the occurrence count is
//! within bounds.

use tracing::debug;

use crate::error::{FixError, Result};
use crate::listing::Listing;
use crate::patch::Patch;
use crate::FixConfig;

/// Non-overlapping occurrences of `needle` in `haystack`. An empty needle matches everywhere.
pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() {
        return haystack.len() + 1;
    }

    let mut count = 0;
    let mut pos = 0;
    while pos + needle.len() <= haystack.len() {
        if haystack[pos..pos + needle.len()] == *needle {
            count += 1;
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    count
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

fn decode_payload(line: usize, payload: &str) -> Result<Vec<u8>> {
    hex::decode(payload).map_err(|_| FixError::InvalidHex {
        line,
        payload: payload.to_string(),
    })
}

/// A pattern that starts at a hex line and is unique enough in the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniquePattern {
    /// Payload of the starting hex line.
    pub base: String,
    /// Payloads of the following hex lines that were needed for uniqueness.
    pub pad: String,
    /// Last listing line consumed (the start line when no padding was needed).
    pub last_line: usize,
    pub occurrences: usize,
}

impl UniquePattern {
    pub fn find(&self) -> String {
        format!("{}{}", self.base, self.pad)
    }
}

/// Extends the payload at `start` with following payloads until it occurs at most `max` times
/// in `table`.
pub fn resolve_unique(
    listing: &Listing,
    start: usize,
    table: &[u8],
    max: usize,
) -> Result<UniquePattern> {
    let base = listing
        .payload(start)
        .ok_or_else(|| FixError::NotFound(format!("hex line at listing index {start}")))?
        .to_ascii_uppercase();
    let mut bytes = decode_payload(start, &base)?;
    let mut pad = String::new();
    let mut last_line = start;

    loop {
        let occurrences = count_occurrences(table, &bytes);
        if occurrences <= max {
            return Ok(UniquePattern {
                base,
                pad,
                last_line,
                occurrences,
            });
        }

        let Some(next) = listing.find_next_hex(last_line) else {
            return Err(FixError::Ambiguous {
                pattern: format!("{base}{pad}"),
                occurrences,
            });
        };
        // `find_next_hex` only returns hex lines, so the payload is present.
        let payload = listing.payload(next).unwrap_or_default().to_ascii_uppercase();
        debug!(
            occurrences,
            line = next,
            "pattern not unique yet, padding with {payload}"
        );
        bytes.extend(decode_payload(next, &payload)?);
        pad.push_str(&payload);
        last_line = next;
    }
}

/// Replaces every byte-aligned occurrence of `from` in the hex string `digits`.
fn replace_aligned(digits: &str, from: &str, to: &str) -> (String, usize) {
    debug_assert_eq!(from.len(), to.len());
    let mut out = String::with_capacity(digits.len());
    let mut replaced = 0;
    let mut pos = 0;
    while pos < digits.len() {
        if digits[pos..].starts_with(from) {
            out.push_str(to);
            pos += from.len();
            replaced += 1;
        } else {
            let end = (pos + 2).min(digits.len());
            out.push_str(&digits[pos..end]);
            pos = end;
        }
    }
    (out, replaced)
}

/// Builds the `_CRS` -> `XCRS` rename for the resource method whose body starts at `start`.
pub fn rename_patch(
    listing: &Listing,
    start: usize,
    table: &[u8],
    cfg: &FixConfig,
) -> Result<Patch> {
    let unique = resolve_unique(listing, start, table, cfg.max_occurrences)?;

    let (renamed, replaced) = replace_aligned(
        &unique.base,
        &cfg.method.hex(),
        &cfg.renamed_method.hex(),
    );
    if replaced == 0 {
        return Err(FixError::NotFound(format!(
            "{} ({}) in the hex payload on listing line {start}",
            cfg.method,
            cfg.method.hex()
        )));
    }

    Patch::new(
        format!(
            "Rename {} to {} in {}",
            cfg.method, cfg.renamed_method, cfg.device
        ),
        unique.find(),
        format!("{renamed}{}", unique.pad),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_non_overlapping_matches() {
        assert_eq!(count_occurrences(b"aaaa", b"aa"), 2);
        assert_eq!(count_occurrences(b"abcabc", b"abc"), 2);
        assert_eq!(count_occurrences(b"abc", b"abcd"), 0);
        assert_eq!(count_occurrences(b"abc", b""), 4);
        assert!(contains(b"xx_CRSxx", b"_CRS"));
        assert!(!contains(b"xx_CRxx", b"_CRS"));
    }

    #[test]
    fn aligned_replace_ignores_odd_nibble_matches() {
        assert_eq!(
            replace_aligned("5F4352535F435253", "5F435253", "58435253"),
            ("5843525358435253".to_string(), 2)
        );
        // "F4352535" straddles a byte boundary and must not be touched.
        assert_eq!(
            replace_aligned("05F4352530", "5F435253", "58435253"),
            ("05F4352530".to_string(), 0)
        );
    }

    fn listing() -> Listing {
        Listing::from_lines([
            "Device (HPET)",
            "Method (_CRS, 0, Serialized)",
            "0080: 5F 43 52 53",
            "Return (CRS)",
            "0084: 11 22",
            "",
            "0086: 33 44",
        ])
    }

    #[test]
    fn unique_pattern_needs_no_padding() {
        let table = b"\x00_CRS\x11\x22\x33\x44";
        let unique = resolve_unique(&listing(), 2, table, 2).unwrap();
        assert_eq!(unique.find(), "5F435253");
        assert_eq!(unique.pad, "");
        assert_eq!(unique.last_line, 2);
        assert_eq!(unique.occurrences, 1);
    }

    #[test]
    fn repeated_pattern_is_padded_until_unique() {
        let table = b"_CRS\x00_CRS\x01_CRS\x11\x22\x33\x44_CRS\x11\x22\x00_CRS\x11\x22\x01";
        let unique = resolve_unique(&listing(), 2, table, 2).unwrap();
        assert_eq!(unique.find(), "5F43525311223344");
        assert_eq!(unique.last_line, 6);
        assert!(count_occurrences(table, &hex::decode(unique.find()).unwrap()) <= 2);
    }

    #[test]
    fn exhausted_listing_is_ambiguous() {
        let table = b"_CRS\x11\x22\x33\x44_CRS\x11\x22\x33\x44_CRS\x11\x22\x33\x44";
        let err = resolve_unique(&listing(), 2, table, 2).unwrap_err();
        assert!(matches!(err, FixError::Ambiguous { occurrences: 3, .. }));
    }

    #[test]
    fn rename_keeps_find_and_replace_the_same_length() {
        let table = b"_CRS_CRS_CRS\x11\x22";
        let patch = rename_patch(&listing(), 2, table, &FixConfig::default()).unwrap();
        assert_eq!(patch.find(), "5F4352531122");
        assert_eq!(patch.replace(), "584352531122");
        assert_eq!(patch.label(), "Rename _CRS to XCRS in HPET");
    }

    #[test]
    fn rename_requires_the_method_tag_in_the_payload() {
        let listing = Listing::from_lines(["0000: 14 0B 00 00"]);
        let err = rename_patch(&listing, 0, b"\x14\x0B\x00\x00", &FixConfig::default())
            .unwrap_err();
        assert!(matches!(err, FixError::NotFound(_)));
    }

    #[test]
    fn invalid_payload_is_reported_with_its_line() {
        let listing = Listing::from_lines(["0000: 5F 43 GG"]);
        let err = resolve_unique(&listing, 0, b"", 2).unwrap_err();
        assert_eq!(
            err,
            FixError::InvalidHex {
                line: 0,
                payload: "5F43GG".to_string()
            }
        );
    }
}
