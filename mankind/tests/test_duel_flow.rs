//! End-to-end duel sessions: the real runner, connection and session
//! against a scripted WebSocket server.

mod common;

use common::{ScriptedServer, ServerSide, TestClient};
use serde_json::json;

use mankind::error::{ConnectionError, MankindError, RejectReason};
use mankind::session::{Intent, Phase};
use mankind::sink::Transcript;

fn entered(phase: Phase) -> impl Fn(&Transcript) -> bool {
    move |t| t.phases().contains(&phase)
}

async fn start_duel(side: &mut ServerSide, client: &TestClient) {
    client.wait_for("waiting", entered(Phase::Waiting)).await;
    side.send(json!({"type": "game_start", "level": 1, "message": "Duel started!"}))
        .await;
    client.wait_for("duel start", entered(Phase::InProgress)).await;
}

fn result_frame(correct: bool, opponent: &str) -> serde_json::Value {
    json!({
        "type": "game_result",
        "correct": correct,
        "score": if correct { 10 } else { -5 },
        "opponent_type": opponent,
        "new_level": 1,
        "new_xp": if correct { 10 } else { 0 },
    })
}

#[tokio::test]
async fn happy_path() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 120);
    let mut side = server.accept().await;
    assert_eq!(side.path, "/ws/tester");

    start_duel(&mut side, &client).await;
    side.send(json!({
        "type": "message",
        "sender": "opponent",
        "content": "hi there",
        "time_remaining": 110,
    }))
    .await;

    client.intend(Intent::Chat("  hello  ".to_owned()));
    assert_eq!(
        side.recv().await,
        Some(json!({"type": "message", "content": "hello"}))
    );

    client.intend(Intent::Decide("human".to_owned()));
    assert_eq!(
        side.recv().await,
        Some(json!({"type": "decision", "decision": "human"}))
    );

    side.send(result_frame(true, "human")).await;
    client
        .wait_for("result", |t| !t.results().is_empty())
        .await;

    let result = client.transcript.results().remove(0);
    assert!(result.correct);
    assert!(result.opponent_was_human);
    assert_eq!(result.score_delta, 10);
    assert_eq!(
        client.transcript.messages(),
        vec![
            ("opponent".to_owned(), "hi there".to_owned()),
            ("you".to_owned(), "hello".to_owned()),
        ]
    );
    let affordances = client.transcript.last_affordances().unwrap();
    assert!(affordances.can_request_next);
    assert!(!affordances.can_decide);

    client.intend(Intent::Quit);
    assert_eq!(side.recv().await, None);

    let summary = client.finish().await.unwrap();
    assert_eq!(summary.reason, "quit");
    assert_eq!(summary.duels_completed, 1);
}

#[tokio::test]
async fn timeout_sends_one_abstention() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 1);
    let mut side = server.accept().await;

    start_duel(&mut side, &client).await;
    assert_eq!(
        side.recv().await,
        Some(json!({"type": "decision", "decision": null}))
    );
    client.wait_for("time up", entered(Phase::TimeUp)).await;

    // The server's own time_up arrives after the local one.
    side.send(json!({"type": "time_up"})).await;
    client.intend(Intent::Decide("ai".to_owned()));
    client
        .wait_for("late decision rejected", |t| {
            t.rejections().contains(&RejectReason::AlreadyDecided)
        })
        .await;

    side.send(result_frame(false, "ai")).await;
    client.wait_for("resolved", entered(Phase::Resolved)).await;

    client.intend(Intent::Quit);
    assert_eq!(side.recv().await, None, "only one decision frame expected");
    assert_eq!(client.transcript.last_tick(), Some(0));
    client.finish().await.unwrap();
}

#[tokio::test]
async fn premature_and_duplicate_decisions() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 120);
    let mut side = server.accept().await;

    client.wait_for("waiting", entered(Phase::Waiting)).await;
    client.intend(Intent::Decide("human".to_owned()));
    client
        .wait_for("premature decision rejected", |t| {
            t.rejections() == vec![RejectReason::NoDuelInProgress]
        })
        .await;

    start_duel(&mut side, &client).await;
    client.intend(Intent::Decide("ai".to_owned()));
    client.intend(Intent::Decide("human".to_owned()));
    client.intend(Intent::Decide("robot".to_owned()));
    assert_eq!(
        side.recv().await,
        Some(json!({"type": "decision", "decision": "ai"}))
    );
    client
        .wait_for("duplicate decisions rejected", |t| t.rejections().len() == 3)
        .await;
    assert_eq!(
        client.transcript.rejections(),
        vec![
            RejectReason::NoDuelInProgress,
            RejectReason::AlreadyDecided,
            RejectReason::InvalidChoice("robot".to_owned()),
        ]
    );

    client.intend(Intent::Quit);
    assert_eq!(side.recv().await, None);
    client.finish().await.unwrap();
}

#[tokio::test]
async fn next_duel_round_trip() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 120);
    let mut side = server.accept().await;

    client.intend(Intent::NextDuel);
    start_duel(&mut side, &client).await;
    client.intend(Intent::Decide("ai".to_owned()));
    assert!(side.recv().await.is_some());
    side.send(result_frame(true, "ai")).await;
    client.wait_for("resolved", entered(Phase::Resolved)).await;

    client.intend(Intent::NextDuel);
    assert_eq!(side.recv().await, Some(json!({"type": "next_duel"})));
    client
        .wait_for("waiting again", |t| {
            t.phases().iter().filter(|p| **p == Phase::Waiting).count() == 2
        })
        .await;

    side.send(json!({"type": "game_start", "level": 2})).await;
    client
        .wait_for("second duel", |t| {
            t.phases().iter().filter(|p| **p == Phase::InProgress).count() == 2
        })
        .await;
    client.intend(Intent::Decide("human".to_owned()));
    assert_eq!(
        side.recv().await,
        Some(json!({"type": "decision", "decision": "human"}))
    );

    client.intend(Intent::Quit);
    assert_eq!(side.recv().await, None);
    assert_eq!(client.finish().await.unwrap().duels_completed, 1);
}

#[tokio::test]
async fn malformed_frames_do_not_change_phase() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 120);
    let mut side = server.accept().await;

    start_duel(&mut side, &client).await;
    side.send_raw("{not json").await;
    side.send(json!({"type": "leaderboard"})).await;
    side.send(json!({"type": "game_result", "correct": true})).await;
    client
        .wait_for("three warnings", |t| {
            t.notices()
                .iter()
                .filter(|n| n.text.starts_with("Ignored a message"))
                .count()
                == 3
        })
        .await;
    assert_eq!(client.transcript.phases().last(), Some(&Phase::InProgress));

    client.intend(Intent::Decide("human".to_owned()));
    assert!(side.recv().await.is_some());
    client.intend(Intent::Quit);
    assert_eq!(side.recv().await, None);
    client.finish().await.unwrap();
}

#[tokio::test]
async fn chat_before_open_is_not_sent() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 120);
    let stream = server.accept_tcp().await;

    client.intend(Intent::Chat("too early".to_owned()));
    client
        .wait_for("send refused", |t| {
            t.notices()
                .iter()
                .any(|n| n.text.starts_with("Message not sent"))
        })
        .await;
    assert!(client.transcript.messages().is_empty());

    let mut side = ServerSide::upgrade(stream).await;
    client.wait_for("waiting", entered(Phase::Waiting)).await;
    client.intend(Intent::Chat("now".to_owned()));
    assert_eq!(
        side.recv().await,
        Some(json!({"type": "message", "content": "now"}))
    );

    client.intend(Intent::Quit);
    assert_eq!(side.recv().await, None);
    client.finish().await.unwrap();
}

#[tokio::test]
async fn server_close_ends_the_session() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 120);
    let mut side = server.accept().await;

    start_duel(&mut side, &client).await;
    side.close().await;

    let summary = client.finish().await.unwrap();
    assert_eq!(summary.reason, "disconnected");
    assert_eq!(summary.duels_completed, 0);
}

#[tokio::test]
async fn cancellation_closes_gracefully() {
    let server = ScriptedServer::bind().await;
    let client = TestClient::start(&server.url(), 120);
    let mut side = server.accept().await;

    client.wait_for("waiting", entered(Phase::Waiting)).await;
    client.cancel.cancel();
    assert_eq!(side.recv().await, None);

    let summary = client.finish().await.unwrap();
    assert_eq!(summary.reason, "interrupted");
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let server = ScriptedServer::bind().await;
    let url = server.url();
    drop(server);

    let client = TestClient::start(&url, 120);
    let err = client.finish().await.unwrap_err();
    assert!(
        matches!(
            err,
            MankindError::Connection(ConnectionError::Handshake { .. })
        ),
        "unexpected {err:?}"
    );
}
