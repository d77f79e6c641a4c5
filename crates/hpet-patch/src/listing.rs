//! Line-level view of a mixed `iasl -l` listing.
//!
//! The listing interleaves ASL source lines with hex dump lines of the form
//! `<offset>: <hex bytes> // comment`. Nothing here understands AML; lines are only classified as
//! hex lines (payload-bearing) or structural lines (everything else).

use tracing::debug;

/// Returns the part of `line` before the first `//` comment marker.
fn code_part(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// A hex line carries a `:` outside of its trailing comment.
pub fn is_hex_line(line: &str) -> bool {
    code_part(line).contains(':')
}

/// Extracts the hex digits of a hex line: everything after the first `:`, up to the comment
/// marker, with all whitespace removed.
pub fn hex_payload(line: &str) -> String {
    let Some((_, rest)) = line.split_once(':') else {
        return String::new();
    };
    code_part(rest)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Extracts the identifier of a `<keyword> (<name>...` declaration, e.g. `HPET` from
/// `Device (HPET)`.
pub fn declared_name<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let opener = format!("{keyword} (");
    let start = line.find(&opener)? + opener.len();
    let rest = &line[start..];
    let end = rest.find([')', ','])?;
    let name = rest[..end].trim();
    (!name.is_empty()).then_some(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InTargetDevice,
    InMethod { line: usize },
}

/// Ordered lines of a listing. Indices are 0-based and stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    lines: Vec<String>,
}

impl Listing {
    pub fn new(text: &str) -> Self {
        Self::from_lines(text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)))
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Hex payload of line `index`, or `None` if it is out of range or not a hex line.
    pub fn payload(&self, index: usize) -> Option<String> {
        let line = self.line(index)?;
        is_hex_line(line).then(|| hex_payload(line))
    }

    /// Index of the first hex line strictly after `index`.
    pub fn find_next_hex(&self, index: usize) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .skip(index.saturating_add(1))
            .find(|(_, line)| is_hex_line(line))
            .map(|(idx, _)| idx)
    }

    /// Locates the first hex line of `method` inside `Device (<device>)`.
    ///
    /// Only the most recently matched device name is tracked, not block depth: once the target
    /// device has been seen, the next structural line declaring `method` is accepted even if it
    /// belongs to a later sibling block.
    pub fn find_resource_method(&self, device: &str, method: &str) -> Option<usize> {
        let method_decl = format!("Method ({method}");
        let mut state = ScanState::Outside;

        for (index, line) in self.lines.iter().enumerate() {
            if is_hex_line(line) {
                continue;
            }

            state = match state {
                ScanState::Outside if declared_name(line, "Device") == Some(device) => {
                    debug!(index, "found Device ({device})");
                    ScanState::InTargetDevice
                }
                ScanState::InTargetDevice if line.contains(&method_decl) => {
                    debug!(index, "found Method ({method}) in {device}");
                    ScanState::InMethod { line: index }
                }
                other => other,
            };

            if let ScanState::InMethod { line } = state {
                return self.find_next_hex(line);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_strips_label_whitespace_and_comment() {
        assert_eq!(hex_payload("label:AABBCC//comment"), "AABBCC");
        assert_eq!(
            hex_payload("    00000080:  5F 43 52 53 00  // _CRS."),
            "5F43525300"
        );
        assert_eq!(hex_payload("no colon here"), "");
    }

    #[test]
    fn colon_inside_comment_is_not_a_hex_line() {
        assert!(is_hex_line("0010: 00 01"));
        assert!(!is_hex_line("    Name (_HID, EisaId (\"PNP0103\"))  // _HID: Hardware ID"));
        assert!(!is_hex_line(""));
    }

    #[test]
    fn declared_name_handles_method_arguments() {
        assert_eq!(declared_name("External (_SB_.PCI0, DeviceObj)", "Device"), None);
        assert_eq!(declared_name("    Device (HPET)", "Device"), Some("HPET"));
        assert_eq!(
            declared_name("  Method (_CRS, 0, Serialized)", "Method"),
            Some("_CRS")
        );
        assert_eq!(declared_name("Device ()", "Device"), None);
    }

    #[test]
    fn find_next_hex_skips_the_start_line() {
        let listing = Listing::from_lines(["0000: 00", "Device (A)", "", "0004: 11 22"]);
        assert_eq!(listing.find_next_hex(0), Some(3));
        assert_eq!(listing.find_next_hex(3), None);
        assert_eq!(listing.payload(3).as_deref(), Some("1122"));
        assert_eq!(listing.payload(1), None);
    }

    #[test]
    fn locates_resource_method_after_target_device() {
        let listing = Listing::new(
            "Device (RTC)\n\
             Method (_CRS, 0, NotSerialized)\n\
             0040: 14 0B 5F 43 52 53 00\n\
             Device (HPET)\n\
             Name (_HID, EisaId (\"PNP0103\"))\n\
             0070: 08 5F 48 49 44\n\
             Method (_STA, 0, NotSerialized)\n\
             Method (_CRS, 0, Serialized)  // _CRS: Current Resource Settings\n\
             0080: 5F4352535F43525300\n",
        );
        let index = listing.find_resource_method("HPET", "_CRS");
        assert_eq!(index, Some(8));
        assert_eq!(listing.payload(8).as_deref(), Some("5F4352535F43525300"));
    }

    #[test]
    fn missing_device_or_trailing_hex_is_not_found() {
        let listing = Listing::new("Device (RTC)\nMethod (_CRS, 0)\n0000: 00\n");
        assert_eq!(listing.find_resource_method("HPET", "_CRS"), None);

        let listing = Listing::new("Device (HPET)\nMethod (_CRS, 0)\n}\n");
        assert_eq!(listing.find_resource_method("HPET", "_CRS"), None);
    }
}
