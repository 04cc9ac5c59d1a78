//! Protein-change notation harmonization.
//!
//! Sources spell the same change differently (`V600E`, `p.V600E`,
//! `p.Val600Glu`, `600V>E`). Merging keys on the genomic change, so every
//! spelling of a single-residue substitution is rendered as `p.X###Y`.
//! Anything that cannot be parsed is kept verbatim rather than guessed at.

use once_cell::sync::Lazy;
use regex::Regex;

static ONE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z])(\d+)([A-Z*])$").unwrap());
static THREE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][a-z]{2})(\d+)([A-Z][a-z]{2}|\*)$").unwrap());
static POSITION_FIRST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([A-Z])[/>]([A-Z*])$").unwrap());
static SINGLE_SITE_EVENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z](?:[a-z]{2})?)?(\d+)[A-Za-z*]*?(delins|fs|del|ins|dup)(.*)$").unwrap());

fn three_to_one(code: &str) -> Option<&'static str> {
    let one = match code {
        "Ala" => "A",
        "Arg" => "R",
        "Asn" => "N",
        "Asp" => "D",
        "Cys" => "C",
        "Gln" => "Q",
        "Glu" => "E",
        "Gly" => "G",
        "His" => "H",
        "Ile" => "I",
        "Leu" => "L",
        "Lys" => "K",
        "Met" => "M",
        "Phe" => "F",
        "Pro" => "P",
        "Ser" => "S",
        "Thr" => "T",
        "Trp" => "W",
        "Tyr" => "Y",
        "Val" => "V",
        "Ter" | "*" => "*",
        _ => return None,
    };
    Some(one)
}

/// Residue code in one-letter form; accepts one- or three-letter input.
fn residue(code: &str) -> Option<&str> {
    if code.len() == 1 {
        Some(code)
    } else {
        three_to_one(code)
    }
}

/// Render a protein change as `p.X###Y` when it is a recognised notation.
/// Returns `None` for empty input.
pub fn harmonize_protein_change(raw: &str) -> Option<String> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    let body = cleaned.strip_prefix("p.").unwrap_or(cleaned);
    let body = body
        .strip_prefix('(')
        .and_then(|b| b.strip_suffix(')'))
        .unwrap_or(body);

    if let Some(caps) = ONE_LETTER.captures(body) {
        return Some(format!("p.{}{}{}", &caps[1], &caps[2], &caps[3]));
    }

    if let Some(caps) = THREE_LETTER.captures(body) {
        if let (Some(ref_aa), Some(alt_aa)) = (three_to_one(&caps[1]), three_to_one(&caps[3])) {
            return Some(format!("p.{}{}{}", ref_aa, &caps[2], alt_aa));
        }
        return Some(cleaned.to_string());
    }

    if let Some(caps) = POSITION_FIRST.captures(body) {
        return Some(format!("p.{}{}{}", &caps[2], &caps[1], &caps[3]));
    }

    // Ranges (E746_A750del, V600_K601delinsE) carry more than one residue;
    // collapsing them to a single position would merge distinct changes.
    if !body.contains('_') {
        if let Some(caps) = SINGLE_SITE_EVENT.captures(body) {
            let ref_aa = caps
                .get(1)
                .and_then(|m| residue(m.as_str()))
                .unwrap_or("X");
            // Frameshift tails (fsTer14) vary by caller; inserted residues do not
            let tail = if &caps[3] == "fs" { "" } else { &caps[4] };
            return Some(format!("p.{}{}{}{}", ref_aa, &caps[2], &caps[3], tail));
        }
    }

    if body.contains('_') && !cleaned.starts_with("p.") {
        return Some(format!("p.{}", body));
    }

    Some(cleaned.to_string())
}

/// Choose the genomic change for an observation: protein change first, then
/// the CDS change, then the genomic position, each as given by the source.
pub fn resolve_genomic_change(
    protein_change: Option<&str>,
    cds_change: Option<&str>,
    genome_position: Option<&str>,
) -> Option<String> {
    if let Some(change) = protein_change.and_then(harmonize_protein_change) {
        return Some(change);
    }
    let verbatim = |v: Option<&str>| {
        v.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };
    verbatim(cds_change).or_else(|| verbatim(genome_position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution_spellings_converge() {
        for spelling in ["V600E", "p.V600E", "p.Val600Glu", "Val600Glu", "600V>E", "600V/E", "p.(V600E)"] {
            assert_eq!(harmonize_protein_change(spelling).as_deref(), Some("p.V600E"), "{}", spelling);
        }
    }

    #[test]
    fn test_stop_codons() {
        assert_eq!(harmonize_protein_change("R213*").as_deref(), Some("p.R213*"));
        assert_eq!(harmonize_protein_change("p.Arg213Ter").as_deref(), Some("p.R213*"));
    }

    #[test]
    fn test_single_site_events_keep_kind() {
        assert_eq!(harmonize_protein_change("R248fs").as_deref(), Some("p.R248fs"));
        assert_eq!(harmonize_protein_change("p.Arg248GlyfsTer14").as_deref(), Some("p.R248fs"));
        assert_eq!(harmonize_protein_change("E746del").as_deref(), Some("p.E746del"));
    }

    #[test]
    fn test_delins_is_not_a_deletion() {
        let delins = harmonize_protein_change("V600delinsYM");
        let del = harmonize_protein_change("V600del");
        assert_eq!(delins.as_deref(), Some("p.V600delinsYM"));
        assert_eq!(del.as_deref(), Some("p.V600del"));
        assert_ne!(delins, del);
        assert_ne!(
            harmonize_protein_change("p.A767insASV"),
            harmonize_protein_change("p.A767insG")
        );
    }

    #[test]
    fn test_ranges_are_not_collapsed() {
        assert_eq!(harmonize_protein_change("E746_A750del").as_deref(), Some("p.E746_A750del"));
        assert_eq!(
            harmonize_protein_change("p.V600_K601delinsE").as_deref(),
            Some("p.V600_K601delinsE")
        );
    }

    #[test]
    fn test_unparseable_kept_verbatim() {
        assert_eq!(harmonize_protein_change(" Amplification ").as_deref(), Some("Amplification"));
        assert_eq!(harmonize_protein_change("   "), None);
    }

    #[test]
    fn test_resolution_order() {
        assert_eq!(
            resolve_genomic_change(Some("G12D"), Some("c.35G>A"), None).as_deref(),
            Some("p.G12D")
        );
        assert_eq!(
            resolve_genomic_change(Some(""), Some("c.35G>A"), Some("12:25398284")).as_deref(),
            Some("c.35G>A")
        );
        assert_eq!(
            resolve_genomic_change(None, None, Some("12:25398284")).as_deref(),
            Some("12:25398284")
        );
        assert_eq!(resolve_genomic_change(None, Some(" "), None), None);
    }
}
