//! Number literal parsing (spec.md §4.6): a token is a number if its
//! characters all belong to `[-.0-9eEiI]` in one of the shapes this
//! state machine recognizes. Anything else means "not a number" and the
//! compiler tries it as a word instead.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Float(f32),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Part {
    Int,
    Frac,
    Exp,
}

/// Parses spec.md §4.6's number grammar: optional leading `-`, digits,
/// an optional `.` fraction (integer part only), an optional `e`/`E`
/// exponent with its own optional `-`, and a trailing `i`/`I` suffix
/// that forces integer typing (only legal directly after the integer
/// part, and only as the token's very last character).
///
/// A token with no decimal point and no exponent is an integer by
/// default, matching spec.md's stated rule; only a token that crosses
/// into `Frac`/`Exp` state needs the suffix to be treated as an integer.
pub fn parse_number(word: &str) -> Option<Number> {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();
    if n == 0 {
        return None;
    }

    let negative = chars[0] == '-';
    let mut i = if negative { 1 } else { 0 };
    if i == n {
        return None; // "-" alone
    }

    let mut part = Part::Int;
    let (mut vi, mut vf, mut vx): (u64, u64, u64) = (0, 0, 0);
    let (mut ni, mut nf, mut nx): (u32, u32, u32) = (0, 0, 0);
    let mut negative_exp = false;
    let mut force_int = false;

    while i < n {
        let c = chars[i];
        if c == '.' {
            if part != Part::Int {
                return None;
            }
            part = Part::Frac;
        } else if c == '-' {
            if part != Part::Exp || nx != 0 || negative_exp {
                return None;
            }
            negative_exp = true;
        } else if c == 'i' || c == 'I' {
            if i != n - 1 || part != Part::Int {
                return None;
            }
            force_int = true;
        } else if c == 'e' || c == 'E' {
            if part == Part::Exp {
                return None;
            }
            part = Part::Exp;
        } else if c.is_ascii_digit() {
            let d = c as u64 - '0' as u64;
            match part {
                Part::Int => {
                    vi = vi * 10 + d;
                    ni += 1;
                }
                Part::Frac => {
                    vf = vf * 10 + d;
                    nf += 1;
                }
                Part::Exp => {
                    vx = vx * 10 + d;
                    nx += 1;
                }
            }
        } else {
            return None;
        }
        i += 1;
    }

    let is_int = force_int || part == Part::Int;
    if is_int {
        if ni > 10 {
            return None;
        }
        let mut v = vi as i64;
        if negative {
            v = -v;
        }
        if v < i32::MIN as i64 || v > i32::MAX as i64 {
            return None;
        }
        Some(Number::Int(v as i32))
    } else {
        if ni == 0 && nf == 0 {
            return None;
        }
        let mantissa = vi as f64 + vf as f64 * 10f64.powi(-(nf as i32));
        let exponent = if negative_exp { -(vx as i32) } else { vx as i32 };
        let mut v = mantissa * 10f64.powi(exponent);
        if negative {
            v = -v;
        }
        Some(Number::Float(v as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_digits_are_int() {
        assert_eq!(parse_number("42"), Some(Number::Int(42)));
        assert_eq!(parse_number("-7"), Some(Number::Int(-7)));
    }

    #[test]
    fn decimal_point_makes_float() {
        assert_eq!(parse_number("1.5"), Some(Number::Float(1.5)));
        assert_eq!(parse_number("-0.25"), Some(Number::Float(-0.25)));
    }

    #[test]
    fn i_suffix_forces_int_without_decimal() {
        assert_eq!(parse_number("5i"), Some(Number::Int(5)));
        assert_eq!(parse_number("5I"), Some(Number::Int(5)));
    }

    #[test]
    fn i_suffix_after_decimal_point_is_rejected() {
        assert_eq!(parse_number("1.2i"), None);
    }

    #[test]
    fn i_suffix_must_be_last_character() {
        assert_eq!(parse_number("5i5"), None);
    }

    #[test]
    fn exponent_applies() {
        match parse_number("1e3") {
            Some(Number::Float(v)) => assert!((v - 1000.0).abs() < 0.01),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn negative_exponent() {
        match parse_number("1e-2") {
            Some(Number::Float(v)) => assert!((v - 0.01).abs() < 0.0001),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn not_a_number_falls_through() {
        assert_eq!(parse_number("foo"), None);
        assert_eq!(parse_number("I+"), None);
    }

    #[test]
    fn too_many_integer_digits_is_rejected() {
        assert_eq!(parse_number("12345678901"), None);
    }

    #[test]
    fn lone_dash_is_not_a_number() {
        assert_eq!(parse_number("-"), None);
    }
}
