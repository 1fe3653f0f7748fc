//! Tests for wire decoding and the request body

use qcore::{Error, FinishReason, Model, ResponseChunk};
use quill_provider::{Request, decode, decode_event};
use std::{sync::Arc, time::Duration};

const RESPONSE_JSON: &str = include_str!("../templates/response.json");
const STREAM_TXT: &str = include_str!("../templates/stream.txt");
const REASONING_JSON: &str = include_str!("../templates/reasoning.json");

fn outbound(model: Model, stream: bool) -> qcore::Request {
    qcore::Request {
        prompt: "Translate: hi".into(),
        model: Arc::new(model),
        stream,
        timeout: Duration::from_secs(1),
    }
}

#[test]
fn decode_complete_message() {
    let chunks = decode(RESPONSE_JSON).unwrap();
    assert_eq!(
        chunks,
        [ResponseChunk::text("^^Bonjour$$")
            .with_usage(12, 5)
            .with_finish(FinishReason::Stop)]
    );
}

#[test]
fn decode_sse_body() {
    let chunks = decode(STREAM_TXT).unwrap();
    let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, ["", "Bon", "jour", "", ""]);
    assert!(chunks[3].is_stop());
    assert_eq!(chunks[4].prompt_tokens, 12);
    assert_eq!(chunks[4].completion_tokens, 2);
}

#[test]
fn decode_reasoning_delta() {
    let chunk = decode_event(REASONING_JSON.trim()).unwrap();
    assert_eq!(chunk.content, "");
    assert_eq!(
        chunk.reasoning_content.as_deref(),
        Some("The user wants French.")
    );
    assert_eq!(chunk.finish_reason, None);
}

#[test]
fn decode_usage_only_frame() {
    let chunk = decode_event(r#"{"choices":[],"usage":{"prompt_tokens":7}}"#).unwrap();
    assert_eq!(chunk, ResponseChunk::default().with_usage(7, 0));
}

#[test]
fn decode_other_finish_reason() {
    let chunk =
        decode_event(r#"{"choices":[{"delta":{"content":"x"},"finish_reason":"length"}]}"#)
            .unwrap();
    assert_eq!(chunk.finish_reason, Some(FinishReason::Other("length".into())));
}

#[test]
fn decode_rejects_unknown_shapes() {
    let err = decode_event("{}").unwrap_err();
    assert!(matches!(err, Error::Decode { ref payload, .. } if payload == "{}"));

    let err = decode("not json").unwrap_err();
    let Error::Decode { payload, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(payload, "not json");
}

#[test]
fn decode_rejects_choices_without_message() {
    let legacy = r#"{"choices":[{"index":0,"text":"Bonjour"}]}"#;
    let err = decode_event(legacy).unwrap_err();
    assert!(matches!(err, Error::Decode { ref payload, .. } if payload == legacy));

    assert!(decode_event(r#"{"choices":[{}]}"#).is_err());
    assert!(matches!(decode(legacy), Err(Error::Decode { .. })));
}

#[test]
fn decode_finish_without_delta() {
    let chunk = decode_event(r#"{"choices":[{"index":0,"finish_reason":"stop"}]}"#).unwrap();
    assert!(chunk.is_stop());
    assert_eq!(chunk.content, "");
}

#[test]
fn decode_empty_body() {
    assert!(decode("").unwrap().is_empty());
    assert!(decode("data: [DONE]\n").unwrap().is_empty());
}

#[test]
fn request_body_for_plain_model() {
    let model = Model::new("deepseek-chat", "https://api.deepseek.com", "k");
    let body = serde_json::to_value(Request::new(&outbound(model, false))).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "model": "deepseek-chat",
            "messages": [{ "role": "user", "content": "Translate: hi" }],
            "stream": false,
        })
    );
}

#[test]
fn request_body_with_extras() {
    let model = Model::new("deepseek-chat", "https://api.deepseek.com", "k")
        .without_thinking()
        .with_usage();
    let body = serde_json::to_value(Request::new(&outbound(model.clone(), true))).unwrap();
    assert_eq!(body["stream"], true);
    assert_eq!(body["stream_options"]["include_usage"], true);
    assert_eq!(body["thinking"]["type"], "disabled");

    let body = serde_json::to_value(Request::new(&outbound(model, false))).unwrap();
    assert!(body.get("stream_options").is_none());
}
