//! Column type guessing from observed string values.

use crate::models::SqlType;
use regex::Regex;
use std::sync::OnceLock;

/// Pre-compiled value-shape patterns.
struct ValuePatterns {
    integer: Regex,
    number: Regex,
}

impl ValuePatterns {
    fn instance() -> &'static Self {
        static PATTERNS: OnceLock<ValuePatterns> = OnceLock::new();
        PATTERNS.get_or_init(|| {
            #[allow(clippy::expect_used)]
            ValuePatterns {
                integer: Regex::new(r"^-?[0-9]+$").expect("Invalid integer pattern"),
                number: Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("Invalid number pattern"),
            }
        })
    }
}

/// Infers the column type for a set of trimmed, non-empty values.
///
/// All-integer columns are `BIGINT`. Columns whose values are all numeric but
/// include fractions are *also* `BIGINT`: the guesser never promotes to
/// `DECIMAL`, so such a column will fail at bind time unless its type is
/// overridden. Empty input and any non-numeric value give `TEXT`.
///
/// No locale-aware parsing happens here; `"9,99"` is not numeric.
pub fn guess_type<'a, I>(values: I) -> SqlType
where
    I: IntoIterator<Item = &'a str>,
{
    let patterns = ValuePatterns::instance();
    let mut seen_any = false;
    let mut all_int = true;
    let mut all_num = true;

    for value in values {
        seen_any = true;
        if all_int && !patterns.integer.is_match(value) {
            all_int = false;
        }
        if all_num && !patterns.number.is_match(value) {
            all_num = false;
        }
        if !all_int && !all_num {
            break;
        }
    }

    if !seen_any {
        return SqlType::Text;
    }

    if all_int || all_num {
        SqlType::BigInt
    } else {
        SqlType::Text
    }
}
