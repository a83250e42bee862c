// Unhappy-path tests for the lexing and binding stages.

use tyco_core::{analyze, TycoError};

fn analyze_err(source: &str) -> TycoError {
    match analyze(source, "test.tyco") {
        Ok(_) => panic!("Expected a TycoError, but got Ok"),
        Err(err) => err,
    }
}

#[test]
fn test_malformed_top_level_line() {
    let err = analyze_err("this is not tyco\n");
    assert!(matches!(err, TycoError::Syntax(_)));
    assert!(err.message().contains("malformatted"));
}

#[test]
fn test_error_carries_source_location() {
    let err = analyze_err("int port: 8080\nnonsense here\n");
    let location = err.location().expect("location should be attached");
    assert_eq!(location.line, 2);
    assert_eq!(location.raw_line.as_ref(), "nonsense here");
}

#[test]
fn test_global_without_value() {
    let err = analyze_err("int port:\n");
    assert!(matches!(err, TycoError::Syntax(_)));
    assert!(err.message().contains("must provide a value"));
}

#[test]
fn test_duplicate_global_declaration() {
    let err = analyze_err("int x: 1\nint x: 2\n");
    assert!(matches!(err, TycoError::Schema(_)));
    assert!(err.message().contains("duplicate global attribute x"));
}

#[test]
fn test_missing_trailing_colon_in_schema() {
    let err = analyze_err("Dog:\n  str name\n");
    assert!(matches!(err, TycoError::Schema(_)));
    assert!(err.message().contains("missing trailing colon"));
}

#[test]
fn test_duplicate_schema_field() {
    let err = analyze_err("Dog:\n  *str name:\n  int name:\n");
    assert!(matches!(err, TycoError::Schema(_)));
    assert!(err.message().contains("duplicate field"));
}

#[test]
fn test_primary_key_cannot_be_array() {
    let err = analyze_err("Dog:\n  *str[] names:\n");
    assert!(matches!(err, TycoError::Schema(_)));
    assert!(err.message().contains("cannot be an array"));
}

#[test]
fn test_schema_line_after_instances() {
    let err = analyze_err("Dog:\n  *str name:\n  - Rex\n\nDog:\n  int legs:\n");
    assert!(matches!(err, TycoError::Schema(_)));
    assert!(err.message().contains("after initial construction"));
}

#[test]
fn test_unquoted_comma_is_bad_delimiter() {
    let err = analyze_err("str greeting: hello, world\n");
    assert!(matches!(err, TycoError::Syntax(_)));
    assert!(err.message().contains("bad delimiter"));
}

#[test]
fn test_unclosed_single_quote() {
    let err = analyze_err("str s: \"oops\n");
    assert!(matches!(err, TycoError::Syntax(_)));
    assert!(err.message().contains("unclosed single-line string"));
}

#[test]
fn test_unclosed_triple_quote() {
    let err = analyze_err("str s: \"\"\"oops\nstill open\n");
    assert!(matches!(err, TycoError::Syntax(_)));
    assert!(err.message().contains("unclosed triple quote"));
}

#[test]
fn test_unclosed_array() {
    let err = analyze_err("int[] xs: [1, 2\n");
    assert!(matches!(err, TycoError::Syntax(_)));
}

#[test]
fn test_colon_inside_bare_content() {
    let err = analyze_err("Dog:\n  *str name:\n  - a, extra: b: c\n");
    assert!(matches!(err, TycoError::Syntax(_)));
    assert!(err.message().contains("wrap string in quotes"));
}

#[test]
fn test_too_many_positional_arguments() {
    let err = analyze_err("Dog:\n  *str name:\n  - Rex, 4\n");
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("too many positional"));
}

#[test]
fn test_unknown_keyword_argument() {
    let err = analyze_err("Dog:\n  *str name:\n  - Rex, wings: 2\n");
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("invalid attribute wings"));
}

#[test]
fn test_positional_after_keyword() {
    let err = analyze_err("Dog:\n  *str name:\n  int legs:\n  - name: Rex, 4\n");
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("positional values after keyed"));
}

#[test]
fn test_default_for_unknown_field() {
    let err = analyze_err("Dog:\n  *str name:\n  wings: 2\n");
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("invalid default"));
}

#[test]
fn test_declared_type_mismatch() {
    let err = analyze_err("int x: not_a_number\n");
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("invalid int literal"));
}

#[test]
fn test_bool_must_be_true_or_false() {
    let err = analyze_err("bool flag: yes\n");
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("not in (true, false)"));
}

#[test]
fn test_struct_type_where_scalar_expected() {
    let err = analyze_err("Dog:\n  *str name:\n  - Rex\n\nOwner:\n  *str name:\n  Dog pet:\n  - Ann, pet: Rex\n");
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("likely needs Dog(Rex)"));
}

#[test]
fn test_control_character_in_string() {
    let err = analyze_err("str s: \"bad\u{1}char\"\n");
    assert!(matches!(err, TycoError::Syntax(_)));
    assert!(err.message().contains("invalid characters"));
}
