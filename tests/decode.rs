// tests/decode.rs

use scriptcast::process::decode::{Utf8Decoder, incomplete_tail_len, normalize_newlines};

#[test]
fn complete_text_has_no_incomplete_tail() {
    assert_eq!(incomplete_tail_len(b""), 0);
    assert_eq!(incomplete_tail_len(b"plain ascii"), 0);
    assert_eq!(incomplete_tail_len("héllo".as_bytes()), 0);
    assert_eq!(incomplete_tail_len("😀".as_bytes()), 0);
}

#[test]
fn truncated_sequences_are_detected() {
    let e_acute = "é".as_bytes();
    assert_eq!(incomplete_tail_len(&e_acute[..1]), 1);

    let euro = "€".as_bytes();
    assert_eq!(incomplete_tail_len(&euro[..1]), 1);
    assert_eq!(incomplete_tail_len(&euro[..2]), 2);

    let emoji = "😀".as_bytes();
    let mut bytes = b"ok ".to_vec();
    bytes.extend_from_slice(&emoji[..3]);
    assert_eq!(incomplete_tail_len(&bytes), 3);
}

#[test]
fn decoder_carries_split_characters_to_next_chunk() {
    let text = "añb€c😀";
    let bytes = text.as_bytes();
    let mut decoder = Utf8Decoder::new();

    let mut out = String::new();
    for chunk in bytes.chunks(1) {
        out.push_str(&decoder.decode(chunk));
    }
    out.push_str(&decoder.finish());

    assert_eq!(out, text);
    assert_eq!(decoder.finish(), "");
}

#[test]
fn decoder_returns_empty_text_while_waiting_for_continuation() {
    let euro = "€".as_bytes();
    let mut decoder = Utf8Decoder::new();

    assert_eq!(decoder.decode(&euro[..2]), "");
    assert_eq!(decoder.decode(&euro[2..]), "€");
}

#[test]
fn finish_replaces_dangling_bytes() {
    let mut decoder = Utf8Decoder::new();
    assert_eq!(decoder.decode(&[b'a', 0xE2, 0x82]), "a");
    assert_eq!(decoder.finish(), "\u{FFFD}");
}

#[test]
fn crlf_runs_collapse_to_newline() {
    assert_eq!(normalize_newlines("a\r\nb\r\r\nc\n"), "a\nb\nc\n");
}

#[test]
fn bare_carriage_returns_are_kept() {
    assert_eq!(normalize_newlines("10%\r20%\r"), "10%\r20%\r");
    assert_eq!(normalize_newlines("no newline here"), "no newline here");
}
