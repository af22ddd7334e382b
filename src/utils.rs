use crate::Issn;
use regex::Regex;
use std::sync::LazyLock;

static YEAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4})(?:\D|$)").unwrap());

/// Standardizes an ISSN to the `NNNN-NNNC` form.
///
/// Accepts hyphenated or bare forms and registry suffixes such as `(Print)`.
/// Returns `None` when the value does not hold exactly eight ISSN characters.
pub fn format_issn(issn_str: &str) -> Option<Issn> {
    let clean_issn = issn_str
        .trim()
        .replace("(Electronic)", "")
        .replace("(Linking)", "")
        .replace("(Print)", "")
        .to_ascii_uppercase();

    let digits: String = clean_issn
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X')
        .collect();

    let extra = clean_issn
        .chars()
        .filter(|c| !c.is_ascii_digit() && *c != 'X' && *c != '-' && !c.is_whitespace())
        .count();

    // Check digit X is only valid in the last position
    if digits.len() != 8 || extra > 0 || digits[..7].contains('X') {
        return None;
    }

    Some(Issn::from(format!("{}-{}", &digits[..4], &digits[4..])))
}

/// Standardizes an ISSN, keeping the trimmed upper-cased value when it is not
/// a well-formed ISSN.
pub fn standardize_issn(issn_str: &str) -> Issn {
    format_issn(issn_str).unwrap_or_else(|| Issn::from(issn_str.trim().to_ascii_uppercase()))
}

/// Extracts a four-digit publication year from a free-text date.
pub fn parse_year(year_str: &str) -> Option<i32> {
    YEAR_REGEX
        .captures(year_str.trim())
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .filter(|year| *year > 0)
}

/// Extracts the volume number: the first run of digits anywhere in the value.
pub fn parse_volume(volume: &str) -> Option<u32> {
    let numbers: String = volume
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if numbers.is_empty() {
        None
    } else {
        numbers.parse().ok()
    }
}

/// Splits a multi-valued cell (`a#b#c`), dropping blank values.
pub fn split_values(cell: &str, separator: char) -> impl Iterator<Item = &str> {
    cell.split(separator).map(str::trim).filter(|v| !v.is_empty())
}
