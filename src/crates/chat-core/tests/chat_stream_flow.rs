use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aiportal_chat_core::{ChatCoordinator, ConversationStore, SubmitOptions, VersionDirection};
use aiportal_chat_stream::{GatewayConfig, SessionAuthority};
use async_trait::async_trait;
use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use futures_util::Stream;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Default)]
struct RecordingAuthority {
    forbidden: AtomicBool,
}

#[async_trait]
impl SessionAuthority for RecordingAuthority {
    async fn on_forbidden(&self) {
        self.forbidden.store(true, Ordering::SeqCst);
    }
}

fn sse_response(payloads: Vec<String>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = tokio_stream::iter(
        payloads
            .into_iter()
            .map(|payload| Ok(Event::default().data(payload))),
    );
    Sse::new(stream)
}

/// Scripted gateway: a clean two-chunk answer for `m-ok`, an immediate
/// application error for `m-err`.
async fn chat_handler(Json(body): Json<Value>) -> impl IntoResponse {
    let model_id = body["modelId"].as_str().unwrap_or_default();
    let chat_id = format!("chat-{}", model_id);

    let payloads = match model_id {
        "m-err" => vec![json!({
            "chatId": chat_id,
            "msgType": "ERROR",
            "error": "RATE_LIMITED",
            "message": "rate limited",
        })
        .to_string()],
        _ => vec![
            json!({"chatId": chat_id, "msgType": "USER", "content": body["prompt"]}).to_string(),
            json!({"chatId": chat_id, "msgType": "ANSWER", "content": "Hi"}).to_string(),
            json!({"chatId": chat_id, "msgType": "ANSWER", "content": " there"}).to_string(),
            json!({
                "chatId": chat_id,
                "msgType": "STOP",
                "chatUsage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7},
            })
            .to_string(),
        ],
    };

    sse_response(payloads)
}

async fn forbidden_handler() -> impl IntoResponse {
    StatusCode::FORBIDDEN
}

async fn unavailable_handler() -> impl IntoResponse {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn coordinator_for(addr: SocketAddr, authority: Arc<RecordingAuthority>) -> ChatCoordinator {
    ChatCoordinator::new(GatewayConfig::new(format!("http://{}", addr)), authority)
}

async fn wait_until(store: &Arc<ConversationStore>, check: impl Fn(&ConversationStore) -> bool) {
    for _ in 0..200 {
        if check(store) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached within the polling window");
}

fn answer_of(store: &ConversationStore, model_id: &str) -> aiportal_chat_core::Answer {
    let model = store.snapshot(model_id).expect("model snapshot");
    model.conversations[0].questions[0]
        .answers
        .last()
        .expect("answer version")
        .clone()
}

#[tokio::test]
async fn multi_model_fan_out_isolates_failures() {
    let addr = spawn_server(Router::new().route("/v1/chat/stream", post(chat_handler))).await;
    let authority = Arc::new(RecordingAuthority::default());
    let coordinator = coordinator_for(addr, authority.clone());

    coordinator.add_model("m-ok", "Healthy Model");
    coordinator.add_model("m-err", "Throttled Model");

    let refs = coordinator
        .submit_prompt("hello", SubmitOptions::default())
        .expect("submitted");
    assert_eq!(refs.len(), 2);

    // Both placeholders exist synchronously, before any network event.
    let store = coordinator.store();
    for model_id in ["m-ok", "m-err"] {
        let model = store.snapshot(model_id).expect("placeholder");
        assert_eq!(model.conversations.len(), 1);
        assert!(model.conversations[0].loading);
    }

    wait_until(&store, |store| {
        answer_of(store, "m-ok").prompt_tokens.is_some()
            && !answer_of(store, "m-err").error.is_empty()
    })
    .await;

    let ok = answer_of(&store, "m-ok");
    assert_eq!(ok.content, "Hi there");
    assert_eq!(ok.error, "");
    assert_eq!(ok.prompt_tokens, Some(5));
    assert_eq!(ok.completion_tokens, Some(2));
    assert!(ok.elapsed_time.is_some());

    let err = answer_of(&store, "m-err");
    assert_eq!(err.content, "");
    assert_eq!(err.error, "rate limited");
    assert!(err.prompt_tokens.is_none());

    assert!(!authority.forbidden.load(Ordering::SeqCst));
}

#[tokio::test]
async fn regenerate_appends_a_version_and_repoints_the_active_index() {
    let addr = spawn_server(Router::new().route("/v1/chat/stream", post(chat_handler))).await;
    let coordinator = coordinator_for(addr, Arc::new(RecordingAuthority::default()));
    coordinator.add_model("m-ok", "Healthy Model");

    let refs = coordinator
        .submit_prompt("hello", SubmitOptions::default())
        .expect("submitted");
    let target = &refs[0];
    let store = coordinator.store();
    wait_until(&store, |store| {
        answer_of(store, "m-ok").prompt_tokens.is_some()
    })
    .await;

    coordinator
        .regenerate(
            &target.model_id,
            &target.conversation_id,
            &target.question_id,
            SubmitOptions::default(),
        )
        .expect("regeneration started");

    wait_until(&store, |store| {
        let model = store.snapshot("m-ok").expect("model");
        let question = &model.conversations[0].questions[0];
        question.answers.len() == 2 && question.active_answer_index == 1
    })
    .await;

    let model = store.snapshot("m-ok").expect("model");
    let question = &model.conversations[0].questions[0];
    assert_eq!(question.answers[0].content, "Hi there");
    assert_eq!(question.answers[1].content, "Hi there");

    // Version navigation is a pure store update.
    let index = coordinator
        .change_version(
            &target.model_id,
            &target.conversation_id,
            &target.question_id,
            VersionDirection::Prev,
        )
        .expect("version changed");
    assert_eq!(index, 0);
}

#[tokio::test]
async fn forbidden_escalates_to_the_session_authority_not_the_answer() {
    let addr = spawn_server(Router::new().route("/v1/chat/stream", post(forbidden_handler))).await;
    let authority = Arc::new(RecordingAuthority::default());
    let coordinator = coordinator_for(addr, authority.clone());
    coordinator.add_model("m-ok", "Healthy Model");

    coordinator
        .submit_prompt("hello", SubmitOptions::default())
        .expect("submitted");

    for _ in 0..200 {
        if authority.forbidden.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(authority.forbidden.load(Ordering::SeqCst));

    // The chat-level error path is never taken on a 403.
    let answer = answer_of(&coordinator.store(), "m-ok");
    assert_eq!(answer.error, "");
    assert_eq!(answer.content, "");
}

#[tokio::test]
async fn other_http_failures_surface_inline_with_the_status_code() {
    let addr =
        spawn_server(Router::new().route("/v1/chat/stream", post(unavailable_handler))).await;
    let authority = Arc::new(RecordingAuthority::default());
    let coordinator = coordinator_for(addr, authority.clone());
    coordinator.add_model("m-ok", "Healthy Model");

    coordinator
        .submit_prompt("hello", SubmitOptions::default())
        .expect("submitted");

    let store = coordinator.store();
    wait_until(&store, |store| !answer_of(store, "m-ok").error.is_empty()).await;

    let answer = answer_of(&store, "m-ok");
    assert!(answer.error.contains("503"), "error was: {}", answer.error);
    assert!(!authority.forbidden.load(Ordering::SeqCst));
}

#[tokio::test]
async fn new_chat_abandons_in_flight_streams_and_resets_the_forest() {
    let addr = spawn_server(Router::new().route("/v1/chat/stream", post(chat_handler))).await;
    let coordinator = coordinator_for(addr, Arc::new(RecordingAuthority::default()));
    coordinator.add_model("m-ok", "Healthy Model");

    coordinator
        .submit_prompt("hello", SubmitOptions::default())
        .expect("submitted");
    coordinator.new_chat();

    let store = coordinator.store();
    assert!(store.model_ids().is_empty());

    // Give abandoned streams time to drain; no callback may repopulate the
    // forest after the reset.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.snapshot_all().is_empty());
}
