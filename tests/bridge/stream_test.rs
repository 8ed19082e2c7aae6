//! Tests for stdout line decoding.

use ccg_bridge::bridge::{read_lines, Decoded};
use futures_util::StreamExt;

async fn collect(reader: tokio_test::io::Mock) -> Vec<Decoded> {
    let lines = read_lines(reader);
    tokio::pin!(lines);
    let mut out = Vec::new();
    while let Some(item) = lines.next().await {
        out.push(item.unwrap());
    }
    out
}

#[tokio::test]
async fn decodes_lines_split_across_reads() {
    let reader = tokio_test::io::Builder::new()
        .read(b"{\"type\":\"agent_mes")
        .read(b"sage\",\"text\":\"hi\"}\n{\"type\":")
        .read(b"\"textDelta\"}\n")
        .build();

    let decoded = collect(reader).await;

    assert_eq!(decoded.len(), 2);
    match &decoded[0] {
        Decoded::Event(map) => assert_eq!(map["text"], "hi"),
        other => panic!("Expected Event, got {other:?}"),
    }
    assert!(matches!(&decoded[1], Decoded::Event(map) if map["type"] == "textDelta"));
}

#[tokio::test]
async fn skips_blank_lines_and_keeps_malformed() {
    let reader = tokio_test::io::Builder::new()
        .read(b"\n   \n{\"a\":1}\nnot json\n\r\n{\"b\":2}\n")
        .build();

    let decoded = collect(reader).await;

    assert_eq!(decoded.len(), 3);
    assert!(matches!(&decoded[0], Decoded::Event(_)));
    match &decoded[1] {
        Decoded::Malformed { line, .. } => assert_eq!(line, "not json"),
        other => panic!("Expected Malformed, got {other:?}"),
    }
    assert!(matches!(&decoded[2], Decoded::Event(map) if map.contains_key("b")));
}

#[tokio::test]
async fn final_line_without_newline_is_decoded() {
    let reader = tokio_test::io::Builder::new()
        .read(b"{\"a\":1}\n{\"last\":true}")
        .build();

    let decoded = collect(reader).await;

    assert_eq!(decoded.len(), 2);
    assert!(matches!(&decoded[1], Decoded::Event(map) if map["last"] == true));
}

#[tokio::test]
async fn crlf_terminators_are_removed() {
    let reader = tokio_test::io::Builder::new()
        .read(b"{\"text\":\"x\"}\r\n")
        .build();

    let decoded = collect(reader).await;

    assert_eq!(decoded.len(), 1);
    assert!(matches!(&decoded[0], Decoded::Event(map) if map["text"] == "x"));
}

#[tokio::test]
async fn invalid_utf8_only_affects_its_line() {
    let reader = tokio_test::io::Builder::new()
        .read(b"\xff\xfe garbage\n{\"ok\":1}\n")
        .build();

    let decoded = collect(reader).await;

    assert_eq!(decoded.len(), 2);
    assert!(matches!(&decoded[0], Decoded::Malformed { .. }));
    assert!(matches!(&decoded[1], Decoded::Event(_)));
}

#[tokio::test]
async fn empty_stream_yields_nothing() {
    let reader = tokio_test::io::Builder::new().build();
    assert!(collect(reader).await.is_empty());
}
