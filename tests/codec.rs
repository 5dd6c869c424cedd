use rproxy::codec::{build_503, build_probe_request, build_request};

#[test]
fn build_request_includes_fixed_headers_and_terminator() {
    let bytes = build_request("HEAD", "/", "10.0.0.1:80", &[], None);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("HEAD / HTTP/1.1\r\n"));
    assert!(text.contains("Host: 10.0.0.1:80\r\n"));
    assert!(text.contains("User-Agent: rproxy/1.0\r\n"));
    assert!(text.contains("Accept: */*\r\n"));
    assert!(text.ends_with("\r\n\r\n"));
}

#[test]
fn build_request_with_body_sets_content_length() {
    let body = b"hello";
    let bytes = build_request(
        "POST",
        "/submit",
        "host",
        &[("X-Test".to_string(), "1".to_string())],
        Some(body),
    );
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("X-Test: 1\r\n"));
    assert!(text.contains("Content-Length: 5\r\n\r\nhello"));
}

#[test]
fn build_probe_request_is_the_bare_three_line_form() {
    let bytes = build_probe_request("10.0.0.1:80");
    assert_eq!(bytes, b"HEAD / HTTP/1.1\r\nHost: 10.0.0.1:80\r\n\r\n");
}

#[test]
fn build_503_has_expected_start_line_and_body() {
    let bytes = build_503();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
    assert!(text.contains("Content-Type: text/html\r\n"));
    assert!(text.contains("Unable to connect to server"));
}
