//! Port flag parsing for the collector.

use edgefl_collector::parse_port;

fn args(v: &[&str]) -> Vec<String> {
    std::iter::once("collector")
        .chain(v.iter().copied())
        .map(String::from)
        .collect()
}

#[test]
fn port_long_short_and_assign() {
    assert_eq!(parse_port(args(&["--port", "9001"]), 8080), Ok(9001));
    assert_eq!(parse_port(args(&["-p", "9002"]), 8080), Ok(9002));
    assert_eq!(parse_port(args(&["--port=9003"]), 8080), Ok(9003));
    assert_eq!(parse_port(args(&[]), 8080), Ok(8080));
}

#[test]
fn long_form_wins() {
    assert_eq!(parse_port(args(&["-p", "1", "--port", "2"]), 8080), Ok(2));
}

#[test]
fn bad_ports_are_errors_not_defaults() {
    assert!(parse_port(args(&["--port", "http"]), 8080).is_err());
    assert!(parse_port(args(&["--port", "70000"]), 8080).is_err());
    let zero = parse_port(args(&["-p", "0"]), 8080).unwrap_err();
    assert!(zero.contains("non-zero"), "{zero}");
}

#[test]
fn missing_value_and_stray_flags_are_errors() {
    assert!(parse_port(args(&["--port"]), 8080).unwrap_err().contains("needs a value"));
    assert!(parse_port(args(&["--verbose"]), 8080)
        .unwrap_err()
        .contains("Unexpected argument"));
}
