//! End-to-end agent turns over mock providers: routing, parallel
//! retrieval, streaming order, degradation, cancellation, and history
//! bookkeeping.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    assert_stream_shape, seeded_chunk, testbed, ChatBehavior, MemoryIndex, MockChat, MockWeb,
};
use studyweave::providers::ChatModel;
use studyweave::{Route, TurnEvent};
use sw_corpus::VectorIndex;

#[tokio::test]
async fn greeting_skips_retrieval_entirely() {
    let bed = testbed(MemoryIndex::default(), None, MockChat::default(), None);

    let (_, stream) = bed
        .service
        .chat_stream("Hello".to_string(), None, true);
    let events = stream.collect().await;

    let sources = assert_stream_shape(&events);
    let TurnEvent::Sources {
        pdf_sources,
        web_sources,
        route_used,
    } = sources
    else {
        unreachable!()
    };
    assert_eq!(*route_used, Route::None);
    assert!(pdf_sources.is_empty());
    assert!(web_sources.is_empty());
    assert_eq!(bed.index.searches(), 0, "greetings must not hit the index");
    assert_eq!(bed.web.searches(), 0, "greetings must not hit the web");
}

#[tokio::test]
async fn textbook_question_routes_pdf_only_and_attributes_the_page() {
    let index = MemoryIndex::default();
    let question = "What is a rational number?";
    index
        .add(vec![
            seeded_chunk(question, 3, Some("mathematics")).await,
            seeded_chunk("Polynomials have coefficients.", 7, Some("mathematics")).await,
        ])
        .await
        .unwrap();

    let bed = testbed(index, None, MockChat::streaming(&["A rational ", "number..."]), None);
    let (_, stream) = bed.service.chat_stream(question.to_string(), None, true);
    let events = stream.collect().await;

    let TurnEvent::Sources {
        pdf_sources,
        web_sources,
        route_used,
    } = assert_stream_shape(&events)
    else {
        unreachable!()
    };
    assert_eq!(*route_used, Route::PdfOnly);
    assert!(web_sources.is_empty());
    assert_eq!(pdf_sources[0].metadata.page, 3);
    assert_eq!(bed.web.searches(), 0);
}

#[tokio::test]
async fn recency_question_routes_web_only() {
    let bed = testbed(MemoryIndex::default(), None, MockChat::default(), None);

    let (_, stream) = bed.service.chat_stream(
        "What are the latest developments in quantum computing in 2024?".to_string(),
        None,
        true,
    );
    let events = stream.collect().await;

    let TurnEvent::Sources {
        pdf_sources,
        web_sources,
        route_used,
    } = assert_stream_shape(&events)
    else {
        unreachable!()
    };
    assert_eq!(*route_used, Route::WebOnly);
    assert!(pdf_sources.is_empty());
    assert!(!web_sources.is_empty());
    for source in web_sources {
        assert!(source.url.starts_with("http"));
    }
    assert_eq!(bed.index.searches(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn both_route_runs_backends_in_parallel() {
    let pdf_latency = Duration::from_millis(150);
    let web_latency = Duration::from_millis(150);

    let index = MemoryIndex::with_delay(pdf_latency);
    let question = "How do modern computers use rational numbers?";
    index
        .add(vec![seeded_chunk(question, 2, None).await])
        .await
        .unwrap();

    let classifier: Arc<dyn ChatModel> = Arc::new(MockChat {
        classifier_label: Some("BOTH".to_string()),
        ..Default::default()
    });
    let bed = testbed(
        index,
        Some(MockWeb::with_delay(web_latency)),
        MockChat::default(),
        Some(classifier),
    );

    let started = Instant::now();
    let (_, stream) = bed.service.chat_stream(question.to_string(), None, true);
    let events = stream.collect().await;
    let elapsed = started.elapsed();

    let TurnEvent::Sources {
        pdf_sources,
        web_sources,
        route_used,
    } = assert_stream_shape(&events)
    else {
        unreachable!()
    };
    assert_eq!(*route_used, Route::Both);
    assert!(!pdf_sources.is_empty());
    assert!(!web_sources.is_empty());

    assert!(elapsed >= pdf_latency, "retrieval latency must be observed");
    assert!(
        elapsed < pdf_latency + web_latency,
        "backends must overlap: took {elapsed:?} for max({pdf_latency:?}, {web_latency:?})"
    );
}

#[tokio::test]
async fn web_provider_failure_degrades_to_empty_sources() {
    let bed = testbed(
        MemoryIndex::default(),
        Some(MockWeb::failing()),
        MockChat::default(),
        None,
    );

    let (_, stream) = bed.service.chat_stream(
        "What is the latest news about exam schedules?".to_string(),
        None,
        true,
    );
    let events = stream.collect().await;

    let TurnEvent::Sources {
        pdf_sources,
        web_sources,
        route_used,
    } = assert_stream_shape(&events)
    else {
        unreachable!()
    };
    assert_eq!(*route_used, Route::WebOnly);
    assert!(pdf_sources.is_empty());
    assert!(web_sources.is_empty());

    // The generator was told there is no grounding to lean on.
    let system = bed.chat.last_system_prompt().unwrap();
    assert!(system.contains("no information was found"));
}

#[tokio::test]
async fn empty_index_produces_the_no_material_prompt() {
    let bed = testbed(MemoryIndex::default(), None, MockChat::default(), None);

    let (_, stream) = bed
        .service
        .chat_stream("What is in Chapter 1?".to_string(), None, true);
    let events = stream.collect().await;

    let TurnEvent::Sources { route_used, .. } = assert_stream_shape(&events) else {
        unreachable!()
    };
    assert_eq!(*route_used, Route::PdfOnly);

    let system = bed.chat.last_system_prompt().unwrap();
    assert!(system.contains("no information was found"));
}

#[tokio::test]
async fn grounded_turn_feeds_the_fused_context_to_the_generator() {
    let index = MemoryIndex::default();
    let question = "What is a rational number?";
    index
        .add(vec![seeded_chunk(question, 3, None).await])
        .await
        .unwrap();

    let bed = testbed(index, None, MockChat::default(), None);
    let (_, stream) = bed.service.chat_stream(question.to_string(), None, true);
    stream.collect().await;

    let system = bed.chat.last_system_prompt().unwrap();
    assert!(system.contains("[TEXTBOOK SOURCES]"));
    assert!(system.contains("(1)"));
}

#[tokio::test]
async fn use_rag_false_forces_a_direct_turn() {
    let index = MemoryIndex::default();
    index
        .add(vec![seeded_chunk("Chapter 1 is about numbers.", 0, None).await])
        .await
        .unwrap();

    let bed = testbed(index, None, MockChat::default(), None);
    let (_, stream) =
        bed.service
            .chat_stream("Explain chapter 1 of the textbook".to_string(), None, false);
    let events = stream.collect().await;

    let TurnEvent::Sources { route_used, .. } = assert_stream_shape(&events) else {
        unreachable!()
    };
    assert_eq!(*route_used, Route::None);
    assert_eq!(bed.index.searches(), 0);
}

#[tokio::test]
async fn successful_turn_appends_user_and_assistant() {
    let bed = testbed(
        MemoryIndex::default(),
        None,
        MockChat::streaming(&["An ", "answer."]),
        None,
    );

    let (session_id, stream) = bed
        .service
        .chat_stream("Hello there".to_string(), None, true);
    stream.collect().await;

    let history = bed.service.history(session_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[0].content, "Hello there");
    assert_eq!(history[1].role, "assistant");
    assert_eq!(history[1].content, "An answer.");
}

#[tokio::test]
async fn generation_failure_emits_error_and_keeps_only_the_user_message() {
    let bed = testbed(
        MemoryIndex::default(),
        None,
        MockChat {
            behavior: ChatBehavior::FailMidStream,
            ..Default::default()
        },
        None,
    );

    let (session_id, stream) = bed
        .service
        .chat_stream("Hello".to_string(), None, true);
    let events = stream.collect().await;

    assert!(matches!(events.last(), Some(TurnEvent::Error { .. })));
    assert!(!events
        .iter()
        .any(|event| matches!(event, TurnEvent::Done)));

    let history = bed.service.history(session_id).await.unwrap();
    assert_eq!(history.len(), 1, "partial answers must never be persisted");
    assert_eq!(history[0].role, "user");
}

#[tokio::test]
async fn generator_unavailable_up_front_emits_error() {
    let bed = testbed(
        MemoryIndex::default(),
        None,
        MockChat {
            behavior: ChatBehavior::UnavailableUpFront,
            ..Default::default()
        },
        None,
    );

    let result = bed
        .service
        .chat("Hello".to_string(), None, true)
        .await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_the_stream_cancels_the_turn_without_history() {
    let many_deltas: Vec<String> = (0..200).map(|i| format!("delta {i} ")).collect();
    let delta_refs: Vec<&str> = many_deltas.iter().map(String::as_str).collect();
    let bed = testbed(
        MemoryIndex::default(),
        None,
        MockChat {
            delta_delay: Duration::from_millis(10),
            ..MockChat::streaming(&delta_refs)
        },
        None,
    );

    let (session_id, mut stream) = bed
        .service
        .chat_stream("Hello".to_string(), None, true);

    // Read one chunk, then walk away.
    let first = stream.next().await;
    assert!(matches!(first, Some(TurnEvent::Chunk { .. })));
    drop(stream);

    // Give the turn task time to notice the closed channel.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let history = bed.service.history(session_id).await.unwrap();
    assert!(
        history.is_empty(),
        "a cancelled turn must append nothing to history"
    );
}

#[tokio::test]
async fn non_streaming_chat_returns_answer_and_sources() {
    let index = MemoryIndex::default();
    let question = "What is a rational number?";
    index
        .add(vec![seeded_chunk(question, 3, None).await])
        .await
        .unwrap();

    let bed = testbed(index, None, MockChat::streaming(&["p/q form."]), None);
    let outcome = bed
        .service
        .chat(question.to_string(), None, true)
        .await
        .unwrap();

    assert_eq!(outcome.response, "p/q form.");
    let sources = outcome.sources.unwrap();
    assert_eq!(sources.route_used, Route::PdfOnly);
    assert_eq!(sources.pdf_sources[0].metadata.page, 3);
}
