//! `IRQNoFlags` bitmask codec.
//!
//! In AML an `IRQNoFlags () {a,b,...}` descriptor is the small resource item `22 <lo> <hi>`: tag
//! byte `0x22` followed by a 16-bit mask (bit n = IRQ n) in little-endian order. Adjacent
//! descriptors compile to back-to-back triples, so a run of adjacent statements is matched and
//! replaced as one contiguous byte string.

use core::fmt;

use crate::resolver::contains;

/// Small resource item tag for `IRQNoFlags` (type 0x04, length 2).
pub const IRQ_NO_FLAGS_TAG: u8 = 0x22;

/// Highest legacy IRQ a 16-bit mask can express.
pub const MAX_IRQ: u8 = 15;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IrqMask(u16);

impl IrqMask {
    pub const EMPTY: Self = Self(0);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Builds a mask from IRQ numbers; anything above [`MAX_IRQ`] is dropped.
    pub fn from_irqs(irqs: impl IntoIterator<Item = u8>) -> Self {
        irqs.into_iter()
            .filter(|&irq| irq <= MAX_IRQ)
            .fold(Self::EMPTY, |acc, irq| Self(acc.0 | (1 << irq)))
    }

    /// Parses the contents of one `{...}` literal, e.g. `0,8,11`.
    ///
    /// Tokens that are not integers in `0..=15` are ignored, so `{}` yields an empty mask.
    pub fn parse_group(text: &str) -> Self {
        Self::from_irqs(
            text.split(',')
                .filter_map(|token| token.trim().parse::<u8>().ok()),
        )
    }

    pub fn contains(self, irq: u8) -> bool {
        irq <= MAX_IRQ && self.0 & (1 << irq) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Clears the bit of every IRQ in `irqs`, leaving all other bits untouched.
    pub fn without(self, irqs: &[u8]) -> Self {
        Self(self.0 & !Self::from_irqs(irqs.iter().copied()).0)
    }

    pub fn irqs(self) -> impl Iterator<Item = u8> {
        (0..=MAX_IRQ).filter(move |&irq| self.contains(irq))
    }

    pub fn to_wire(self) -> [u8; 3] {
        let [lo, hi] = self.0.to_le_bytes();
        [IRQ_NO_FLAGS_TAG, lo, hi]
    }

    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [IRQ_NO_FLAGS_TAG, lo, hi] => Some(Self(u16::from_le_bytes([lo, hi]))),
            _ => None,
        }
    }
}

impl fmt::Debug for IrqMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IrqMask({:#06x})", self.0)
    }
}

/// Rendering of an `IRQNoFlags () {}` statement that asserts nothing.
pub const EMPTY_GROUP_MARKER: &str = "{}";

/// One `{...}` literal that followed an `IRQNoFlags` statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrqGroup {
    /// Literal text between the braces, with whitespace removed. Empty for `{}`.
    pub text: String,
    pub mask: IrqMask,
}

impl fmt::Display for IrqGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            f.write_str(EMPTY_GROUP_MARKER)
        } else {
            f.write_str(&self.text)
        }
    }
}

impl IrqGroup {
    pub fn parse(text: &str) -> Self {
        let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mask = IrqMask::parse_group(&text);
        Self { text, mask }
    }
}

/// Groups from adjacent `IRQNoFlags` statements, encoded back to back in the table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IrqRun {
    pub groups: Vec<IrqGroup>,
}

impl IrqRun {
    pub fn masks(&self) -> impl Iterator<Item = IrqMask> + '_ {
        self.groups.iter().map(|g| g.mask)
    }

    pub fn irqs(&self) -> impl Iterator<Item = u8> + '_ {
        self.masks().flat_map(IrqMask::irqs)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        self.masks().flat_map(IrqMask::to_wire).collect()
    }
}

impl fmt::Display for IrqRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, group) in self.groups.iter().enumerate() {
            if idx > 0 {
                f.write_str(":")?;
            }
            write!(f, "{group}")?;
        }
        Ok(())
    }
}

fn encode_masks(masks: impl Iterator<Item = IrqMask>) -> String {
    let bytes: Vec<u8> = masks.flat_map(IrqMask::to_wire).collect();
    hex::encode_upper(bytes)
}

/// Find/replace pair for one run, before terminator resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunPatch {
    /// The run's groups as written in the listing (`0:8`).
    pub text: String,
    pub find: String,
    pub replace: String,
    pub changed: bool,
}

/// Encodes `run` as it currently is and with every IRQ in `neutralize` masked out.
pub fn run_patch(run: &IrqRun, neutralize: &[u8]) -> RunPatch {
    let find = encode_masks(run.masks());
    let replace = encode_masks(run.masks().map(|m| m.without(neutralize)));
    let changed = find != replace;
    RunPatch {
        text: run.to_string(),
        find,
        replace,
        changed,
    }
}

/// Byte pair that can follow an `IRQNoFlags` run in the compiled table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminator {
    /// `79 00`: end tag, the IRQ list closes the resource template.
    EndTag,
    /// `86 09`: a `Memory32Fixed` descriptor follows inside a longer template.
    Memory32Fixed,
    /// `47 01`: an `IO (Decode16, ...)` descriptor follows.
    Io,
}

impl Terminator {
    pub fn bytes(self) -> [u8; 2] {
        match self {
            Terminator::EndTag => [0x79, 0x00],
            Terminator::Memory32Fixed => [0x86, 0x09],
            Terminator::Io => [0x47, 0x01],
        }
    }

    pub fn hex(self) -> String {
        hex::encode_upper(self.bytes())
    }
}

/// Ordered terminator candidates; the first one present after the run in the table wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminatorPolicy {
    candidates: Vec<Terminator>,
}

impl Default for TerminatorPolicy {
    fn default() -> Self {
        Self::new(vec![
            Terminator::EndTag,
            Terminator::Memory32Fixed,
            Terminator::Io,
        ])
    }
}

impl TerminatorPolicy {
    pub fn new(candidates: Vec<Terminator>) -> Self {
        Self { candidates }
    }

    /// Picks the first candidate `t` such that `find ++ t` occurs in `table`.
    pub fn resolve(&self, find: &[u8], table: &[u8]) -> Option<Terminator> {
        self.candidates.iter().copied().find(|t| {
            let mut needle = find.to_vec();
            needle.extend_from_slice(&t.bytes());
            contains(table, &needle)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_bracket_contents() {
        assert_eq!(IrqMask::parse_group("0,8,11").bits(), 0x0901);
        assert_eq!(IrqMask::parse_group(" 3, 4 ").bits(), 0x0018);
        assert_eq!(IrqMask::parse_group("").bits(), 0);
        // Out-of-range and non-numeric tokens are ignored.
        assert_eq!(IrqMask::parse_group("16,-1,x,8").bits(), 0x0100);
    }

    #[test]
    fn wire_form_is_tag_then_little_endian() {
        assert_eq!(IrqMask::from_bits(0x0901).to_wire(), [0x22, 0x01, 0x09]);
        assert_eq!(IrqMask::from_bits(0x0100).to_wire(), [0x22, 0x00, 0x01]);
        assert_eq!(IrqMask::from_wire(&[0x23, 0x00, 0x01]), None);
        assert_eq!(IrqMask::from_wire(&[0x22, 0x00]), None);
    }

    #[test]
    fn wire_roundtrip_covers_every_mask() {
        for bits in 0..=u16::MAX {
            let wire = IrqMask::from_bits(bits).to_wire();
            let decoded = IrqMask::from_wire(&wire).unwrap();
            assert_eq!(decoded.to_wire(), wire);
        }
    }

    #[test]
    fn fully_conflicting_group_is_cleared() {
        let run = IrqRun {
            groups: vec![IrqGroup::parse("0,8,11")],
        };
        let patch = run_patch(&run, &[0, 8, 11]);
        assert_eq!(patch.text, "0,8,11");
        assert_eq!(patch.find, "220901");
        assert_eq!(patch.replace, "220000");
        assert!(patch.changed);
    }

    #[test]
    fn adjacent_groups_concatenate_in_order() {
        let run = IrqRun {
            groups: vec![IrqGroup::parse("0"), IrqGroup::parse("3"), IrqGroup::parse("8")],
        };
        let patch = run_patch(&run, &[0, 8]);
        assert_eq!(patch.text, "0:3:8");
        assert_eq!(patch.find, "220100220800220001");
        assert_eq!(patch.replace, "220000220800220000");
        assert_eq!(patch.find.len(), patch.replace.len());
    }

    #[test]
    fn run_without_conflicts_is_unchanged() {
        let run = IrqRun {
            groups: vec![IrqGroup::parse("1"), IrqGroup::parse("")],
        };
        let patch = run_patch(&run, &[0, 8, 11]);
        assert_eq!(patch.text, "1:{}");
        assert_eq!(patch.find, "220200220000");
        assert!(!patch.changed);
    }

    #[test]
    fn terminator_candidates_are_tried_in_order() {
        let policy = TerminatorPolicy::default();
        let table = [0x10, 0x22, 0x01, 0x09, 0x86, 0x09, 0x22, 0x01, 0x09, 0x79, 0x00];
        assert_eq!(
            policy.resolve(&[0x22, 0x01, 0x09], &table),
            Some(Terminator::EndTag)
        );
        assert_eq!(policy.resolve(&[0x22, 0x00, 0x01], &table), None);

        let io_only = TerminatorPolicy::new(vec![Terminator::Io]);
        assert_eq!(io_only.resolve(&[0x22, 0x01, 0x09], &table), None);
    }

    proptest! {
        #[test]
        fn masking_clears_exactly_the_requested_bit(bits in any::<u16>(), irq in 0u8..=15) {
            let mask = IrqMask::from_bits(bits);
            let masked = mask.without(&[irq]);
            if mask.contains(irq) {
                prop_assert_eq!(masked.bits(), bits & !(1 << irq));
            } else {
                prop_assert_eq!(masked, mask);
            }
            prop_assert!(!masked.contains(irq));
        }

        #[test]
        fn parse_group_matches_from_irqs(irqs in proptest::collection::vec(0u8..=15, 0..8)) {
            let text = irqs.iter().map(u8::to_string).collect::<Vec<_>>().join(",");
            prop_assert_eq!(IrqMask::parse_group(&text), IrqMask::from_irqs(irqs));
        }
    }
}
