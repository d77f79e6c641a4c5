use crate::error::{FixError, Result};

/// A byte-exact find/replace against the compiled table.
///
/// Both sides are uppercase hex of the same even length, so applying the patch never resizes the
/// table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    label: String,
    find: String,
    replace: String,
}

impl Patch {
    pub fn new(
        label: impl Into<String>,
        find: impl Into<String>,
        replace: impl Into<String>,
    ) -> Result<Self> {
        let label = label.into();
        let find = find.into().to_ascii_uppercase();
        let replace = replace.into().to_ascii_uppercase();

        for side in [&find, &replace] {
            if side.is_empty() || hex::decode(side).is_err() {
                return Err(FixError::MalformedPatch {
                    label,
                    digits: side.clone(),
                });
            }
        }
        if find.len() != replace.len() {
            return Err(FixError::PatchLength {
                label,
                find: find.len(),
                replace: replace.len(),
            });
        }

        Ok(Self {
            label,
            find,
            replace,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn find(&self) -> &str {
        &self.find
    }

    pub fn replace(&self) -> &str {
        &self.replace
    }

    pub fn find_bytes(&self) -> Vec<u8> {
        // Validated in `new`.
        hex::decode(&self.find).unwrap_or_default()
    }

    pub fn replace_bytes(&self) -> Vec<u8> {
        hex::decode(&self.replace).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_equal_length_hex() {
        let patch = Patch::new("TMR IRQ 0 Patch", "220100", "220000").unwrap();
        assert_eq!(patch.find_bytes(), vec![0x22, 0x01, 0x00]);
        assert_eq!(patch.replace_bytes(), vec![0x22, 0x00, 0x00]);
    }

    #[test]
    fn normalizes_to_uppercase() {
        let patch = Patch::new("x", "5f435253", "58435253").unwrap();
        assert_eq!(patch.find(), "5F435253");
    }

    #[test]
    fn rejects_resizing_and_malformed_hex() {
        assert!(matches!(
            Patch::new("x", "2201007900", "220000"),
            Err(FixError::PatchLength { find: 10, replace: 6, .. })
        ));
        assert!(matches!(
            Patch::new("x", "22010", "22000"),
            Err(FixError::MalformedPatch { .. })
        ));
        assert!(matches!(
            Patch::new("x", "", ""),
            Err(FixError::MalformedPatch { .. })
        ));
    }
}
