// ── Field-name casing conversion ──
//
// The wire protocol uses snake_case keys; models use PascalCase field
// names. The two functions are deliberately not exact inverses: names
// containing digits or uppercase runs round-trip lossily, and callers
// treat round-trip fidelity as a tested property rather than an
// assumption.

/// Convert a snake_case identifier to PascalCase.
///
/// Underscores are removed, the character following each is uppercased,
/// and the first character of the result is uppercased:
/// `"user_id"` → `"UserId"`, `"created_at"` → `"CreatedAt"`.
pub fn snake_to_pascal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = true;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a PascalCase identifier to snake_case.
///
/// Every uppercase letter is lowercased and prefixed with an underscore.
/// The leading underscore is then stripped — unless the name begins with
/// a run of two or more uppercase letters, which keeps it:
/// `"UserId"` → `"user_id"`, but `"ID"` → `"_i_d"`.
pub fn pascal_to_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }

    let mut chars = s.chars();
    let leading_upper_run = matches!(
        (chars.next(), chars.next()),
        (Some(a), Some(b)) if a.is_ascii_uppercase() && b.is_ascii_uppercase()
    );
    if !leading_upper_run && out.starts_with('_') {
        out.remove(0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snake_to_pascal_basic() {
        assert_eq!(snake_to_pascal("user_id"), "UserId");
        assert_eq!(snake_to_pascal("created_at"), "CreatedAt");
        assert_eq!(snake_to_pascal("name"), "Name");
    }

    #[test]
    fn snake_to_pascal_degenerate_inputs() {
        assert_eq!(snake_to_pascal(""), "");
        assert_eq!(snake_to_pascal("_"), "");
        assert_eq!(snake_to_pascal("__double"), "Double");
        assert_eq!(snake_to_pascal("trailing_"), "Trailing");
    }

    #[test]
    fn pascal_to_snake_basic() {
        assert_eq!(pascal_to_snake("UserId"), "user_id");
        assert_eq!(pascal_to_snake("CreatedAt"), "created_at");
        assert_eq!(pascal_to_snake("Name"), "name");
    }

    #[test]
    fn pascal_to_snake_uppercase_run_keeps_leading_underscore() {
        // Known edge case with consecutive uppercase letters.
        assert_eq!(pascal_to_snake("ID"), "_i_d");
        assert_eq!(pascal_to_snake("URLPath"), "_u_r_l_path");
    }

    #[test]
    fn round_trip_holds_for_simple_identifiers() {
        for name in ["user_id", "created_at", "status", "first_name"] {
            assert_eq!(pascal_to_snake(&snake_to_pascal(name)), name);
        }
    }

    #[test]
    fn round_trip_is_lossy_for_digits_and_runs() {
        // "address_1" → "Address1" → "address1": the underscore is lost.
        assert_eq!(pascal_to_snake(&snake_to_pascal("address_1")), "address1");
    }
}
