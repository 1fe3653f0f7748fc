//! Tests for the completion engine

use futures_util::StreamExt;
use qcore::{
    Completion, Error, FinishReason, Model, NormalizedInput, PromptInput, Registry,
    ResponseChunk, StaticTemplates, Step, StopReason, StreamCompletion, Templates,
    TextCompletion, normalize,
    testing::{MockTransport, RecordingEvents},
};
use quill_runtime::{Engine, OutputStream};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[derive(Serialize)]
struct TranslateInput {
    text: String,
}

impl PromptInput for TranslateInput {
    fn normalized(&self) -> NormalizedInput {
        normalize(self).unwrap_or_default()
    }
}

/// Streams the running translation.
struct Translate {
    input: TranslateInput,
}

impl Translate {
    fn new(text: &str) -> Self {
        Self {
            input: TranslateInput { text: text.into() },
        }
    }
}

impl Completion for Translate {
    type Input = TranslateInput;
    type Output = String;

    fn key(&self) -> &str {
        "translate"
    }

    fn input(&self) -> &TranslateInput {
        &self.input
    }

    fn output(&self, text: String) -> String {
        text
    }
}

impl StreamCompletion for Translate {
    type Cache = String;

    fn initial_cache(&self) -> String {
        String::new()
    }

    fn reduce(&self, fragment: &str, cache: &mut String) -> Step<String> {
        cache.push_str(fragment);
        Step::emit(cache.clone())
    }
}

fn engine(transport: MockTransport) -> (Engine<MockTransport>, Arc<RecordingEvents>) {
    let registry = Registry::new([
        Model::new("m1", "http://one.test", "k1"),
        Model::new("m2", "http://two.test", "k2"),
    ])
    .unwrap()
    .with_routes([("routed", "m2"), ("broken", "missing")]);
    let templates = Templates::new().with(
        StaticTemplates::new()
            .with("translate", "Translate: {{text}}")
            .with("echo", "{{text}}")
            .with("routed", "route me"),
    );
    let events = Arc::new(RecordingEvents::default());
    let engine = Engine::new(transport, registry)
        .with_templates(templates)
        .with_events(events.clone());
    (engine, events)
}

fn text_input(text: &str) -> NormalizedInput {
    [("text".to_owned(), text.to_owned())].into_iter().collect()
}

/// Collect the outputs of a stream without dropping it.
async fn drain<T>(stream: &mut OutputStream<T>) -> Vec<T> {
    let mut outputs = Vec::new();
    while let Some(output) = stream.next().await {
        outputs.push(output.unwrap());
    }
    outputs
}

/// Wait for the producer to report its final stop reason.
async fn stops_ending_with(events: &RecordingEvents, last: StopReason) -> Vec<StopReason> {
    for _ in 0..200 {
        let stops = events.stops();
        if stops.last() == Some(&last) {
            return stops;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    events.stops()
}

#[tokio::test]
async fn translate_streams_accumulated_text() {
    let (engine, events) = engine(MockTransport::new(vec![
        Ok(ResponseChunk::text("H")),
        Ok(ResponseChunk::text("i").with_finish(FinishReason::Stop)),
    ]));

    let outputs: Vec<_> = engine
        .stream(Translate::new("hi"))
        .await
        .unwrap()
        .map(|o| o.unwrap())
        .collect()
        .await;
    assert_eq!(outputs, ["H", "Hi"]);

    let stops = stops_ending_with(&events, StopReason::StreamFinished).await;
    assert_eq!(
        stops,
        [StopReason::LlmFinishReasonStop, StopReason::StreamFinished]
    );
    assert_eq!(events.params(), [r#"{"text":"hi"}"#]);
    assert_eq!(events.chunks().len(), 2);

    let requests = engine.transport().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "Translate: hi");
    assert!(requests[0].stream);
    assert_eq!(requests[0].model.name, "m1");
}

#[tokio::test]
async fn stream_trims_symbols_and_drains_the_wire() {
    let (engine, events) = engine(MockTransport::texts([
        "hello ^^",
        "world",
        " bye$$ extra",
        "after",
    ]));
    let task = TextCompletion::new("echo", &text_input("x")).delimited();

    let mut stream = engine.stream(task).await.unwrap();
    let outputs = drain(&mut stream).await;
    assert_eq!(outputs, ["world", " bye"]);

    let stops = stops_ending_with(&events, StopReason::StreamFinished).await;
    assert_eq!(stops, [StopReason::StreamFinished]);
    assert_eq!(events.chunks().len(), 4);
    drop(stream);
}

#[tokio::test]
async fn provider_stop_ends_the_output() {
    let (engine, events) = engine(MockTransport::new(vec![
        Ok(ResponseChunk::text("done").with_finish(FinishReason::Stop)),
        Ok(ResponseChunk::text("late")),
        Ok(ResponseChunk::default().with_usage(4, 1)),
    ]));
    let task = TextCompletion::new("echo", &text_input("x"));

    let mut stream = engine.stream(task).await.unwrap();
    assert_eq!(drain(&mut stream).await, ["done"]);

    let stops = stops_ending_with(&events, StopReason::StreamFinished).await;
    assert_eq!(
        stops,
        [StopReason::LlmFinishReasonStop, StopReason::StreamFinished]
    );
    assert_eq!(events.chunks().len(), 3);
    drop(stream);
}

#[tokio::test]
async fn dropping_a_closed_stream_stops_the_drain() {
    let (engine, events) = engine(
        MockTransport::texts(["done$$", "late", "later"])
            .with_delay(Duration::from_millis(20))
            .hanging(),
    );
    let task =
        TextCompletion::new("echo", &text_input("x")).with_symbols(None, Some("$$".into()));

    let mut stream = engine.stream(task).await.unwrap();
    assert_eq!(drain(&mut stream).await, ["done"]);
    assert!(stream.is_finished());
    drop(stream);

    let stops = stops_ending_with(&events, StopReason::StreamFinished).await;
    assert_eq!(stops, [StopReason::StreamFinished]);
    assert!(events.chunks().len() < 3);
}

#[tokio::test]
async fn stream_without_symbols_passes_fragments() {
    let (engine, _) = engine(MockTransport::texts(["a", "b", "c"]));
    let task = TextCompletion::new("echo", &text_input("x"));
    let outputs: Vec<_> = engine
        .stream(task)
        .await
        .unwrap()
        .map(|o| o.unwrap())
        .collect()
        .await;
    assert_eq!(outputs, ["a", "b", "c"]);
}

#[tokio::test]
async fn dropping_the_stream_cancels() {
    let (engine, events) = engine(
        MockTransport::texts(["a", "b"])
            .with_delay(Duration::from_millis(20))
            .hanging(),
    );

    let mut stream = engine.stream(Translate::new("hi")).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "a");
    drop(stream);

    let stops = stops_ending_with(&events, StopReason::Cancelled).await;
    assert_eq!(stops, [StopReason::Cancelled]);
}

#[tokio::test]
async fn cancel_ends_the_stream() {
    let (engine, events) = engine(MockTransport::new(Vec::new()).hanging());

    let mut stream = engine.stream(Translate::new("hi")).await.unwrap();
    stream.cancel();
    assert!(stream.next().await.is_none());
    assert!(stream.is_finished());

    let stops = stops_ending_with(&events, StopReason::Cancelled).await;
    assert_eq!(stops, [StopReason::Cancelled]);
}

#[tokio::test]
async fn wire_error_is_the_last_item() {
    let (engine, events) = engine(MockTransport::new(vec![
        Ok(ResponseChunk::text("a")),
        Err(Error::Transport("reset".into())),
        Ok(ResponseChunk::text("never")),
    ]));

    let items: Vec<_> = engine
        .stream(Translate::new("hi"))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(
        items,
        [Ok("a".to_owned()), Err(Error::Transport("reset".into()))]
    );

    let stops = stops_ending_with(&events, StopReason::Error("transport error: reset".into())).await;
    assert_eq!(stops, [StopReason::Error("transport error: reset".into())]);
}

#[tokio::test]
async fn stream_without_start_symbol_emits_nothing() {
    let (engine, events) = engine(MockTransport::texts(["no", " delimiters"]));
    let task = TextCompletion::new("echo", &text_input("x")).delimited();
    let outputs: Vec<_> = engine.stream(task).await.unwrap().collect().await;
    assert!(outputs.is_empty());

    let stops = stops_ending_with(&events, StopReason::StreamFinished).await;
    assert_eq!(stops, [StopReason::StreamFinished]);
}

#[tokio::test]
async fn stream_errors_before_sending() {
    let (engine, events) = engine(MockTransport::texts(["x"]));
    let err = engine
        .stream(TextCompletion::new("unknown", &text_input("x")))
        .await
        .unwrap_err();
    assert_eq!(err, Error::PromptTemplateNotFound("unknown".into()));
    assert!(engine.transport().requests().is_empty());
    assert!(events.events().is_empty());
}

#[tokio::test]
async fn generate_trims_the_response() {
    let (engine, events) = engine(MockTransport::new(vec![Ok(ResponseChunk::text(
        "noise ^^Bonjour$$ tail",
    )
    .with_usage(3, 2)
    .with_finish(FinishReason::Stop))]));
    let task = TextCompletion::new("echo", &text_input("x")).delimited();

    assert_eq!(engine.generate(&task).await.unwrap(), "Bonjour");
    assert_eq!(events.stops(), [StopReason::LlmFinishReasonStop]);
    assert_eq!(events.chunks().len(), 1);
    assert!(!engine.transport().requests()[0].stream);
}

#[tokio::test]
async fn generate_with_nothing_returned() {
    let (engine, events) = engine(MockTransport::new(vec![]));
    let err = engine
        .generate(&TextCompletion::new("echo", &text_input("x")))
        .await
        .unwrap_err();
    assert_eq!(err, Error::GenerateNothingReturned);
    assert!(matches!(events.stops().as_slice(), [StopReason::Error(_)]));
}

#[tokio::test]
async fn generate_reports_http_errors() {
    let (engine, events) = engine(MockTransport::new(vec![Err(Error::Http {
        status: 503,
        body: "busy".into(),
    })]));
    let err = engine
        .generate(&TextCompletion::new("echo", &text_input("x")))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(
        events.stops(),
        [StopReason::Error("http error 503: busy".into())]
    );
}

#[tokio::test]
async fn generate_can_be_cancelled() {
    let (engine, events) = engine(MockTransport::new(Vec::new()).hanging());
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = engine
        .generate_with_cancel(&TextCompletion::new("echo", &text_input("x")), token)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Cancelled);
    assert_eq!(events.stops(), [StopReason::Cancelled]);
}

#[tokio::test]
async fn inline_template_skips_lookup() {
    let (engine, _) = engine(MockTransport::texts(["ok"]));
    let task = TextCompletion::new("unknown", &text_input("1")).with_template("Say {{text}}");
    engine.generate(&task).await.unwrap();
    assert_eq!(engine.transport().requests()[0].prompt, "Say 1");
}

#[tokio::test]
async fn missing_parameter_is_rejected() {
    let (engine, _) = engine(MockTransport::texts(["ok"]));
    let err = engine
        .generate(&TextCompletion::new("translate", &NormalizedInput::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPromptParameters(_)));
    assert!(engine.transport().requests().is_empty());
}

#[tokio::test]
async fn routes_and_preferred_models() {
    let (engine, _) = engine(MockTransport::texts(["ok"]));
    engine
        .generate(&TextCompletion::new("routed", &NormalizedInput::new()))
        .await
        .unwrap();

    let preferred = Arc::new(Model::new("custom", "http://custom.test", "k"));
    engine
        .generate(&TextCompletion::new("echo", &text_input("x")).with_model(preferred))
        .await
        .unwrap();

    let requests = engine.transport().requests();
    assert_eq!(requests[0].model.name, "m2");
    assert_eq!(requests[1].model.name, "custom");
}

#[tokio::test]
async fn route_to_unknown_model_fails() {
    let (engine, _) = engine(MockTransport::texts(["ok"]));
    let task = TextCompletion::new("broken", &NormalizedInput::new()).with_template("fixed");
    assert_eq!(
        engine.generate(&task).await.unwrap_err(),
        Error::ModelNotFound("broken".into())
    );
}

#[tokio::test]
async fn advance_changes_the_model_of_later_requests() {
    let (engine, _) = engine(MockTransport::texts(["ok"]));
    let task = TextCompletion::new("echo", &text_input("x"));
    engine.generate(&task).await.unwrap();
    engine.registry().advance();
    engine.generate(&task).await.unwrap();

    let names: Vec<_> = engine
        .transport()
        .requests()
        .into_iter()
        .map(|r| r.model.name.clone())
        .collect();
    assert_eq!(names, ["m1", "m2"]);
}
