use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn parsed(text: &str) -> (Number, bool) {
    let parsed = parse_number(text.as_bytes());
    (parsed.number, parsed.numeric)
}

#[test]
fn test_integers() {
    assert_eq!(parsed("42"), (Number::Int(42), true));
    assert_eq!(parsed("  -17"), (Number::Int(-17), true));
    assert_eq!(parsed("+5"), (Number::Int(5), true));
    assert_eq!(parsed("7 \n"), (Number::Int(7), true));
}

#[test]
fn test_trailing_garbage() {
    assert_eq!(parsed("  42abc"), (Number::Int(42), false));
    assert_eq!(parsed("abc"), (Number::Int(0), false));
    assert_eq!(parsed(""), (Number::Int(0), false));
    assert_eq!(parsed("-"), (Number::Int(0), false));
    assert_eq!(parsed("1e"), (Number::Int(1), false));
    assert_eq!(parsed("3 4"), (Number::Int(3), false));
}

#[test]
fn test_fractions_and_exponents() {
    assert_eq!(parsed("3.25"), (Number::Float(3.25), true));
    assert_eq!(parsed(".5"), (Number::Float(0.5), true));
    assert_eq!(parsed("1."), (Number::Float(1.0), true));
    assert_eq!(parsed("1e3"), (Number::Float(1000.0), true));
    assert_eq!(parsed("-2.5E-1x"), (Number::Float(-0.25), false));
    assert_eq!(parsed("."), (Number::Int(0), false));
}

#[test]
fn test_inf_nan() {
    assert_eq!(parsed("Inf"), (Number::Float(f64::INFINITY), true));
    assert_eq!(parsed("-infinity"), (Number::Float(f64::NEG_INFINITY), true));
    let (nan, numeric) = parsed("NaN");
    assert!(numeric);
    assert!(matches!(nan, Number::Float(f) if f.is_nan()));
    let scan = scan_number(b"-nan");
    assert!(!scan.flags.contains(NumFlags::NEG));
}

#[test]
fn test_zero_but_true() {
    assert_eq!(parsed("0 but true"), (Number::Int(0), true));
    assert!(looks_like_number(b"0 but true"));
    assert!(!looks_like_number(b"0 but false"));
}

#[test]
fn test_overflow_carried_as_float() {
    assert_eq!(
        parsed("99999999999999999999"),
        (Number::Float(1e20), true)
    );
    assert_eq!(parsed("-9223372036854775808"), (Number::Int(i64::MIN), true));
    assert_eq!(
        parsed("9223372036854775808"),
        (Number::Float(9_223_372_036_854_775_808.0), true)
    );
    assert_eq!(Number::Float(1e20).as_int(), i64::MAX);
}

#[test]
fn test_looks_like_number() {
    assert!(looks_like_number(b" 12 "));
    assert!(looks_like_number(b"1.5e10"));
    assert!(!looks_like_number(b"12abc"));
    assert!(!looks_like_number(b"   "));
}

#[test]
fn test_format_float() {
    assert_eq!(format_float(0.5), "0.5");
    assert_eq!(format_float(3.0), "3");
    assert_eq!(format_float(-2.25), "-2.25");
    assert_eq!(format_float(0.1 + 0.2), "0.3");
    assert_eq!(format_float(1e15), "1e+15");
    assert_eq!(format_float(123_456_789_012_345.0), "123456789012345");
    assert_eq!(format_float(1.5e-7), "1.5e-07");
    assert_eq!(format_float(0.0001), "0.0001");
    assert_eq!(format_float(f64::INFINITY), "Inf");
    assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");
    assert_eq!(format_float(f64::NAN), "NaN");
    assert_eq!(format_float(0.0), "0");
    assert_eq!(format_float(1.0 / 3.0), "0.333333333333333");
}

#[test]
fn test_float_to_int() {
    assert_eq!(float_to_int(3.7), 3);
    assert_eq!(float_to_int(-3.7), -3);
    assert_eq!(float_to_int(f64::NAN), 0);
    assert!(float_is_int(4.0));
    assert!(!float_is_int(4.5));
    assert!(!float_is_int(f64::INFINITY));
}

proptest! {
    #[test]
    fn prop_integers_round_trip_through_text(n in any::<i64>()) {
        prop_assert_eq!(parse_number(n.to_string().as_bytes()).number, Number::Int(n));
    }

    #[test]
    fn prop_format_reparses_close(x in -1.0e12f64..1.0e12) {
        let text = format_float(x);
        let back = parse_number(text.as_bytes());
        prop_assert!(back.numeric);
        let diff = (back.number.as_float() - x).abs();
        prop_assert!(diff <= x.abs() * 1e-14 + 1e-300);
    }
}
