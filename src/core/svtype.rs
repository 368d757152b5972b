//! Structural variant allele normalization.
//!
//! Symbolic alleles such as `<DEL>` or `<DEL:ME:ALU>` say nothing about the
//! event size, so two records of the same deletion can spell it differently
//! while two different deletions can share a spelling. Before computing an id
//! the alt is rewritten to `SVTYPE-SVLEN` padded to [`SV_ALT_WIDTH`] bytes.

use crate::constants::{SV_ALT_FILL, SV_ALT_WIDTH};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvInfo<'a> {
    pub svtype: &'a str,
    /// First SVLEN value, if any.
    pub svlen: Option<i64>,
}

impl<'a> SvInfo<'a> {
    pub fn new(svtype: &'a str, svlen: Option<i64>) -> Self {
        Self { svtype, svlen }
    }
}

/// True when `alt` is the symbolic allele `<SVTYPE>` or a subtype `<SVTYPE:...>`.
pub fn is_symbolic_for(alt: &str, svtype: &str) -> bool {
    let Some(inner) = alt.strip_prefix('<').and_then(|s| s.strip_suffix('>')) else {
        return false;
    };
    if svtype.is_empty() {
        return false;
    }
    match inner.strip_prefix(svtype) {
        Some("") => true,
        Some(rest) => rest.starts_with(':'),
        None => false,
    }
}

pub fn normalize_sv_alt<'a>(alt: &'a str, sv: Option<&SvInfo<'_>>) -> Cow<'a, str> {
    let Some(sv) = sv else {
        return Cow::Borrowed(alt);
    };
    if !is_symbolic_for(alt, sv.svtype) {
        return Cow::Borrowed(alt);
    }

    let mut canonical = match sv.svlen {
        Some(svlen) => format!("{}-{}", sv.svtype, svlen),
        None => format!("{}-.", sv.svtype),
    };
    while canonical.len() < SV_ALT_WIDTH {
        canonical.push(SV_ALT_FILL as char);
    }
    Cow::Owned(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_allele_matching() {
        assert!(is_symbolic_for("<DEL>", "DEL"));
        assert!(is_symbolic_for("<DEL:ME:ALU>", "DEL"));
        assert!(!is_symbolic_for("<DELX>", "DEL"));
        assert!(!is_symbolic_for("DEL", "DEL"));
        assert!(!is_symbolic_for("<INS>", "DEL"));
        assert!(!is_symbolic_for("<>", ""));
    }

    #[test]
    fn equivalent_spellings_normalize_identically() {
        let sv = SvInfo::new("DEL", Some(-350));
        let plain = normalize_sv_alt("<DEL>", Some(&sv));
        let subtype = normalize_sv_alt("<DEL:ME>", Some(&sv));
        assert_eq!(plain, subtype);
        assert_eq!(plain.len(), SV_ALT_WIDTH);
        assert!(plain.starts_with("DEL--350-"));
    }

    #[test]
    fn different_lengths_stay_distinct() {
        let short = SvInfo::new("DUP", Some(100));
        let long = SvInfo::new("DUP", Some(1000));
        assert_ne!(
            normalize_sv_alt("<DUP>", Some(&short)),
            normalize_sv_alt("<DUP>", Some(&long))
        );
    }

    #[test]
    fn literal_alleles_are_untouched() {
        let sv = SvInfo::new("INS", Some(5));
        assert!(matches!(
            normalize_sv_alt("ACGTA", Some(&sv)),
            Cow::Borrowed("ACGTA")
        ));
        assert!(matches!(normalize_sv_alt("<INS>", None), Cow::Borrowed("<INS>")));
    }
}
