use unicode_normalization::UnicodeNormalization;

/// Case-fold a sheet name for comparisons.
///
/// Sheet names compare case-insensitively across Unicode, so names are
/// NFKC-normalized and uppercased before comparing.
pub fn sheet_name_casefold(name: &str) -> String {
    if name.is_ascii() {
        return name.to_ascii_uppercase();
    }
    name.nfkc().flat_map(char::to_uppercase).collect()
}

/// Returns true if two sheet names refer to the same sheet.
pub fn sheet_name_eq_case_insensitive(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    sheet_name_casefold(a) == sheet_name_casefold(b)
}

/// Returns true if `name` must be quoted (`'My Sheet'!A1`) when it prefixes a reference.
pub fn sheet_name_needs_quotes(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return true;
    };
    if first.is_ascii_digit() {
        return true;
    }
    if looks_like_reference(name) {
        return true;
    }
    !name
        .chars()
        .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '.')
}

/// Render a sheet name the way it appears before `!` in a formula.
pub fn quote_sheet_name(name: &str) -> String {
    if sheet_name_needs_quotes(name) {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

// `A1` or `R1C1` shaped names would be read back as references.
fn looks_like_reference(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    let digits = bytes[letters..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if (1..=3).contains(&letters) && digits > 0 && letters + digits == bytes.len() {
        return true;
    }
    looks_like_r1c1(&upper)
}

fn looks_like_r1c1(upper: &str) -> bool {
    if upper == "R" || upper == "C" {
        return true;
    }
    let Some(rest) = upper.strip_prefix('R') else {
        return false;
    };
    let Some((row, col)) = rest.split_once('C') else {
        return false;
    };
    row.bytes().all(|b| b.is_ascii_digit()) && col.bytes().all(|b| b.is_ascii_digit())
}
