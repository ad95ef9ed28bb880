//! Amino acid state alphabet.
//!
//! States are ordered A R N D C Q E G H I L K M F P S T W Y V, the usual
//! ordering of empirical replacement matrices. Every other symbol (gaps,
//! `X`, `B`, `Z`, `?`, stop codons) is treated as missing data.

/// Number of amino acid states.
pub const AA_STATES: usize = 20;

/// One-letter codes indexed by state.
pub const AA_ORDER: [u8; AA_STATES] = [
    b'A', b'R', b'N', b'D', b'C', b'Q', b'E', b'G', b'H', b'I',
    b'L', b'K', b'M', b'F', b'P', b'S', b'T', b'W', b'Y', b'V',
];

/// Map an amino acid byte to its state index (0-19), case-insensitively.
///
/// Returns `None` for anything that is not one of the twenty residues.
pub fn amino_acid_index(aa: u8) -> Option<usize> {
    let upper = aa.to_ascii_uppercase();
    AA_ORDER.iter().position(|&c| c == upper)
}

/// One-letter code for a state index, or `None` if out of range.
pub fn amino_acid_symbol(state: usize) -> Option<char> {
    AA_ORDER.get(state).map(|&b| b as char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_all_twenty() {
        for (i, &aa) in AA_ORDER.iter().enumerate() {
            assert_eq!(amino_acid_index(aa), Some(i));
            assert_eq!(amino_acid_symbol(i), Some(aa as char));
        }
    }

    #[test]
    fn lowercase_accepted() {
        assert_eq!(amino_acid_index(b'v'), Some(19));
        assert_eq!(amino_acid_index(b'a'), Some(0));
    }

    #[test]
    fn ambiguity_and_gaps_are_unknown() {
        for &b in b"-?.XBZJUO*" {
            assert_eq!(amino_acid_index(b), None, "{}", b as char);
        }
    }

    #[test]
    fn symbol_out_of_range() {
        assert_eq!(amino_acid_symbol(AA_STATES), None);
    }
}
