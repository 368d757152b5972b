//! 64-bit variant identity.
//!
//! Ids live in two disjoint subspaces selected by the high bit:
//!
//! ```text
//! packed (bit 63 = 0)
//! | 0 | real_pos (pos_bits) | len(ref) (5) | len(alt) (4) | alt, 2 bits/base (seq_bits) |
//!
//! hashed (bit 63 = 1)
//! | 1 | FNV-1a(real_pos, ref, alt) >> 1                                              |
//! ```
//!
//! `pos_bits` is the bit length of the genome size, so the packed layout depends
//! on the contig table and ids are only comparable within one table. Alleles
//! that are not pure ACGT, do not fit the remaining bits, or sit past the end
//! of the genome are hashed. Packed ids keep the position in their top bits,
//! which is what makes [`partition`] a genomic range split.

use crate::{
    constants::{STAR_MARKER_FILL, SV_ALT_WIDTH},
    core::{
        contigs::ContigIndex,
        svtype::{normalize_sv_alt, SvInfo},
    },
    utils::util::{stable_hash64, Result},
};
use std::borrow::Cow;

pub type VariantId = u64;

const HASHED_FLAG: u64 = 1 << 63;
const REF_LEN_BITS: u32 = 5;
const ALT_LEN_BITS: u32 = 4;
const MAX_REF_LEN: usize = (1 << REF_LEN_BITS) - 1;
const MAX_ALT_LEN: usize = (1 << ALT_LEN_BITS) - 1;
// Smallest allele budget that still packs a one base alt.
const MIN_ALLELE_BITS: u32 = REF_LEN_BITS + ALT_LEN_BITS + 2;

#[inline(always)]
pub(crate) fn nuc2bit(nuc: u8) -> Option<u64> {
    match nuc.to_ascii_uppercase() {
        b'A' => Some(0b00),
        b'C' => Some(0b01),
        b'G' => Some(0b10),
        b'T' => Some(0b11),
        _ => None,
    }
}

#[inline(always)]
pub(crate) fn seq2bit(seq: &[u8]) -> Option<u64> {
    let mut two_bit = 0;
    for nuc in seq {
        two_bit <<= 2;
        two_bit |= nuc2bit(*nuc)?;
    }
    Some(two_bit)
}

fn bit2nuc(bits: u64) -> char {
    match bits & 0b11 {
        0b00 => 'A',
        0b01 => 'C',
        0b10 => 'G',
        _ => 'T',
    }
}

pub fn is_hashed(id: VariantId) -> bool {
    id & HASHED_FLAG != 0
}

/// `*` marks an allele overlapping an upstream deletion, not a sequence. It is
/// widened so it always hashes and cannot meet a literal one-byte allele.
pub fn expand_star(alt: &str) -> Cow<'_, str> {
    if alt != "*" {
        return Cow::Borrowed(alt);
    }
    let mut marker = String::with_capacity(SV_ALT_WIDTH);
    marker.push('*');
    while marker.len() < SV_ALT_WIDTH {
        marker.push(STAR_MARKER_FILL as char);
    }
    Cow::Owned(marker)
}

/// Id encoder bound to one genome size. Cheap to copy; build once per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdEncoder {
    real_pos_max: u64,
    allele_bits: u32,
    seq_bits: u32,
    max_alt_len: Option<usize>,
}

impl IdEncoder {
    pub fn new(real_pos_max: u64) -> Self {
        let pos_bits = u64::BITS - real_pos_max.leading_zeros();
        let allele_bits = 63u32.saturating_sub(pos_bits);
        let seq_bits = allele_bits.saturating_sub(REF_LEN_BITS + ALT_LEN_BITS);
        let max_alt_len = (allele_bits >= MIN_ALLELE_BITS)
            .then(|| MAX_ALT_LEN.min((seq_bits / 2) as usize));
        Self {
            real_pos_max,
            allele_bits,
            seq_bits,
            max_alt_len,
        }
    }

    pub fn for_index(index: &ContigIndex) -> Self {
        Self::new(index.total_length())
    }

    pub fn real_pos_max(&self) -> u64 {
        self.real_pos_max
    }

    /// Longest alt that can take the packed path, `None` if packing is impossible.
    pub fn max_packed_alt_len(&self) -> Option<usize> {
        self.max_alt_len
    }

    pub fn encode(&self, real_pos: u64, ref_seq: &str, alt_seq: &str) -> VariantId {
        let alt_seq = expand_star(alt_seq);
        self.pack(real_pos, ref_seq.as_bytes(), alt_seq.as_bytes())
            .unwrap_or_else(|| hash_variant(real_pos, ref_seq.as_bytes(), alt_seq.as_bytes()))
    }

    fn pack(&self, real_pos: u64, ref_seq: &[u8], alt_seq: &[u8]) -> Option<VariantId> {
        let max_alt_len = self.max_alt_len?;
        if real_pos > self.real_pos_max
            || ref_seq.len() > MAX_REF_LEN
            || alt_seq.len() > max_alt_len
        {
            return None;
        }
        if !ref_seq.iter().all(|nuc| nuc2bit(*nuc).is_some()) {
            return None;
        }
        let alt_bits = seq2bit(alt_seq)?;

        let mut id = real_pos << self.allele_bits;
        id |= (ref_seq.len() as u64) << (ALT_LEN_BITS + self.seq_bits);
        id |= (alt_seq.len() as u64) << self.seq_bits;
        id |= alt_bits;
        Some(id)
    }

    /// Recovers `(real_pos, len(ref), alt)` from a packed id.
    pub fn decode(&self, id: VariantId) -> Option<PackedVariant> {
        if is_hashed(id) || self.max_alt_len.is_none() {
            return None;
        }
        let real_pos = id >> self.allele_bits;
        let ref_len = ((id >> (ALT_LEN_BITS + self.seq_bits)) & MAX_REF_LEN as u64) as usize;
        let alt_len = ((id >> self.seq_bits) & MAX_ALT_LEN as u64) as usize;
        let alt_bits = id & ((1u64 << self.seq_bits) - 1);
        let alt = (0..alt_len)
            .rev()
            .map(|index| bit2nuc(alt_bits >> (index * 2)))
            .collect();
        Some(PackedVariant {
            real_pos,
            ref_len,
            alt,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedVariant {
    pub real_pos: u64,
    pub ref_len: usize,
    pub alt: String,
}

fn hash_variant(real_pos: u64, ref_seq: &[u8], alt_seq: &[u8]) -> VariantId {
    let mut key = Vec::with_capacity(12 + ref_seq.len() + alt_seq.len());
    key.extend(real_pos.to_be_bytes());
    key.extend((ref_seq.len() as u32).to_be_bytes());
    key.extend(ref_seq);
    key.extend(alt_seq);
    HASHED_FLAG | (stable_hash64(&key) >> 1)
}

pub fn real_pos(table: &ContigIndex, chr: &str, pos: u64) -> Result<u64> {
    let offset = table.offset(chr)?;
    offset.checked_add(pos).ok_or_else(|| {
        crate::varhive_error!("Position {pos} on contig {chr} overflows the genome coordinate")
    })
}

pub fn encode(real_pos: u64, ref_seq: &str, alt_seq: &str, real_pos_max: u64) -> VariantId {
    IdEncoder::new(real_pos_max).encode(real_pos, ref_seq, alt_seq)
}

/// Full path from a record to its id: SV normalization, genome coordinate, encoding.
pub fn encode_variant(
    table: &ContigIndex,
    chr: &str,
    pos: u64,
    ref_seq: &str,
    alt_seq: &str,
    sv: Option<&SvInfo<'_>>,
) -> Result<VariantId> {
    let real_pos = real_pos(table, chr, pos)?;
    let alt_seq = normalize_sv_alt(alt_seq, sv);
    Ok(IdEncoder::for_index(table).encode(real_pos, ref_seq, &alt_seq))
}

/// Top `bits` bits under the flag bit of a packed id; hashed ids all share the last bucket.
/// `bits` is capped at [`MAX_PARTITION_BITS`](crate::constants::MAX_PARTITION_BITS),
/// and zero bits puts every id in bucket 0.
pub fn partition(id: VariantId, bits: u8) -> u32 {
    let bits = u32::from(bits.min(crate::constants::MAX_PARTITION_BITS));
    if bits == 0 {
        return 0;
    }
    if is_hashed(id) {
        (1u32 << bits) - 1
    } else {
        ((id << 1) >> (u64::BITS - bits)) as u32
    }
}
