// tests/line_coalescing.rs

use cmdtrack::log::LineCoalescer;

fn feed_chars(coalescer: &mut LineCoalescer, text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for c in text.chars() {
        if let Some(line) = coalescer.push(c) {
            lines.push(line);
        }
    }
    lines
}

#[test]
fn test_partial_line_is_held_until_terminator() {
    let mut coalescer = LineCoalescer::new("\n");

    let first = feed_chars(&mut coalescer, "abc");
    assert!(first.is_empty());
    assert!(coalescer.has_pending());

    let second = feed_chars(&mut coalescer, "def\n");
    assert_eq!(second, vec!["abcdef".to_string()]);
    assert!(!coalescer.has_pending());
}

#[test]
fn test_feed_splits_multiple_lines_in_one_chunk() {
    let mut coalescer = LineCoalescer::default();
    let mut lines = Vec::new();
    coalescer.feed("one\ntwo\n\nthree", |l| lines.push(l));

    assert_eq!(lines, vec!["one", "two", ""]);
    assert_eq!(coalescer.finish(), Some("three".to_string()));
    assert_eq!(coalescer.finish(), None);
}

#[test]
fn test_multi_char_terminator_across_chunks() {
    let mut coalescer = LineCoalescer::new("\r\n");
    let mut lines = Vec::new();

    coalescer.feed("hello\r", |l| lines.push(l));
    assert!(lines.is_empty());
    coalescer.feed("\nworld\r\n", |l| lines.push(l));

    assert_eq!(lines, vec!["hello", "world"]);
}

#[test]
fn test_terminator_mismatch_keeps_characters() {
    let mut coalescer = LineCoalescer::new("\r\n");
    let mut lines = Vec::new();

    // A lone '\r' is ordinary text; the following "\r\n" still terminates.
    coalescer.feed("a\rb\r\r\n", |l| lines.push(l));

    assert_eq!(lines, vec!["a\rb\r"]);
}

#[test]
fn test_complete_with_joins_pending_text() {
    let mut coalescer = LineCoalescer::default();
    let mut lines = Vec::new();
    coalescer.feed("Return ", |l| lines.push(l));
    assert!(lines.is_empty());

    assert_eq!(coalescer.complete_with("code: 0"), "Return code: 0");
    assert!(!coalescer.has_pending());
}

#[test]
fn test_unicode_is_preserved() {
    let mut coalescer = LineCoalescer::default();
    let lines = feed_chars(&mut coalescer, "grüße ✓\nnext");

    assert_eq!(lines, vec!["grüße ✓"]);
    assert_eq!(coalescer.finish(), Some("next".to_string()));
}

#[test]
fn test_empty_terminator_falls_back_to_newline() {
    let mut coalescer = LineCoalescer::new("");
    let lines = feed_chars(&mut coalescer, "x\n");
    assert_eq!(lines, vec!["x"]);
}

#[test]
fn test_terminator_repeating_its_own_start() {
    let mut coalescer = LineCoalescer::new("\r\r\n");
    let mut lines = Vec::new();

    coalescer.feed("a\r\r\r\nb\r\r\r\r\n", |l| lines.push(l));

    assert_eq!(lines, vec!["a\r", "b\r\r"]);
    assert!(!coalescer.has_pending());
}

#[test]
fn test_overlapping_terminator_split_across_chunks() {
    let mut coalescer = LineCoalescer::new("abac");
    let mut lines = Vec::new();

    // "abab" fails on the last 'b' but its tail "ab" still starts "abac".
    coalescer.feed("abab", |l| lines.push(l));
    assert!(lines.is_empty());
    coalescer.feed("acrest", |l| lines.push(l));

    assert_eq!(lines, vec!["ab"]);
    assert_eq!(coalescer.finish(), Some("rest".to_string()));
}
