//! Best-effort decomposition of UK postcodes.
//!
//! These helpers feed matching and pricing, not validation, so they accept any string and
//! degrade to returning whatever is left rather than failing.

/// Length of the inward code (`1AA` in `SW1A 1AA`).
const INWARD_CODE_LEN: usize = 3;

fn normalize(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Uppercased postcode with whitespace removed and the inward code dropped.
///
/// Inputs shorter than four characters after cleaning are returned whole.
///
/// ```
/// use moveleads::marketplace::postcode::outward_code;
///
/// assert_eq!(outward_code("SW1A 1AA"), "SW1A");
/// assert_eq!(outward_code("n1 9gu"), "N1");
/// ```
pub fn outward_code(postcode: &str) -> String {
    let cleaned = normalize(postcode);
    let len = cleaned.chars().count();
    if len < INWARD_CODE_LEN + 1 {
        return cleaned;
    }
    cleaned.chars().take(len - INWARD_CODE_LEN).collect()
}

/// Leading one or two letters of the outward code, or the outward code itself when it does
/// not start with a letter.
///
/// ```
/// use moveleads::marketplace::postcode::area_code;
///
/// assert_eq!(area_code("SW1A 1AA"), "SW");
/// assert_eq!(area_code("N1 9GU"), "N");
/// ```
pub fn area_code(postcode: &str) -> String {
    let outward = outward_code(postcode);
    let letters: String = outward
        .chars()
        .take_while(|ch| ch.is_ascii_alphabetic())
        .take(2)
        .collect();
    if letters.is_empty() {
        outward
    } else {
        letters
    }
}
