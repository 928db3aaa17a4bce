//! Integration tests for rooms and rounds using a scripted executor.
//!
//! Every test runs on paused time, so 60-second rounds and 3-second
//! pauses finish instantly while their ordering stays exact.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use codeduel_protocol::{ConnectionId, Notification, PlayerScore, RoomId, TaskPayload};
use codeduel_room::{PlayerSender, RoomConfig, RoomError, RoomPhase, RoundEngine};
use codeduel_tasks::{
    CallKind, Callable, Catalog, ExecutionError, Executor, Task, TestCase, Value,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

// =========================================================================
// Scripted executor: the submitted "code" says how the submission behaves.
// =========================================================================

/// How long a `"slow"` submission takes per test case.
const SLOW: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, PartialEq)]
enum Behaviour {
    Correct,
    Wrong,
    Throw,
    Slow,
}

struct ScriptedExecutor;

struct Scripted {
    behaviour: Behaviour,
    answers: Vec<TestCase>,
}

impl Executor for ScriptedExecutor {
    type Callable = Scripted;

    async fn execute(
        &self,
        code: &str,
        _task_index: usize,
        task: &Task,
    ) -> Result<Scripted, ExecutionError> {
        let behaviour = match code {
            "correct" => Behaviour::Correct,
            "wrong" => Behaviour::Wrong,
            "throw" => Behaviour::Throw,
            "slow" => Behaviour::Slow,
            _ => return Err(ExecutionError::Load("SyntaxError: Unexpected token".into())),
        };
        Ok(Scripted {
            behaviour,
            answers: task.test_cases.clone(),
        })
    }
}

impl Callable for Scripted {
    async fn invoke(&self, _kind: CallKind, args: &[Value]) -> Result<Value, ExecutionError> {
        match self.behaviour {
            Behaviour::Wrong => return Ok(Value::Null),
            Behaviour::Throw => return Err(ExecutionError::Runtime("boom".into())),
            Behaviour::Slow => tokio::time::sleep(SLOW).await,
            Behaviour::Correct => {}
        }
        Ok(self
            .answers
            .iter()
            .find(|case| case.args == args)
            .map(|case| case.expected.clone())
            .unwrap_or(Value::Null))
    }
}

/// Loads take one second and always answer wrong. Tracks how many loads
/// run at once.
#[derive(Clone, Default)]
struct CountingExecutor {
    loads: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Executor for CountingExecutor {
    type Callable = Scripted;

    async fn execute(
        &self,
        _code: &str,
        _task_index: usize,
        task: &Task,
    ) -> Result<Scripted, ExecutionError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Scripted {
            behaviour: Behaviour::Wrong,
            answers: task.test_cases.clone(),
        })
    }
}

// =========================================================================
// Helpers
// =========================================================================

/// A fake client: a connection id plus the notifications it receives.
struct Client {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Client {
    fn new(id: u64) -> (Self, PlayerSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId(id),
                rx,
            },
            tx,
        )
    }

    /// Next notification, including timer updates.
    async fn next_raw(&mut self) -> Notification {
        timeout(Duration::from_secs(600), self.rx.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("room dropped this client")
    }

    /// Next notification that isn't a timer update.
    async fn next(&mut self) -> Notification {
        loop {
            match self.next_raw().await {
                Notification::TimerUpdate(_) => continue,
                other => return other,
            }
        }
    }

    /// Everything up to and including the first match, timer updates kept.
    async fn until(&mut self, done: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        let mut seen = Vec::new();
        loop {
            let n = self.next_raw().await;
            let stop = done(&n);
            seen.push(n);
            if stop {
                return seen;
            }
        }
    }

    /// Already-delivered notifications, timer updates dropped.
    fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.rx.try_recv() {
            if !matches!(n, Notification::TimerUpdate(_)) {
                out.push(n);
            }
        }
        out
    }

    /// Waits until the room has dropped this client's sender.
    async fn closed(&mut self) {
        while timeout(Duration::from_secs(600), self.rx.recv())
            .await
            .expect("timed out waiting for the room to close")
            .is_some()
        {}
    }
}

fn engine(config: RoomConfig) -> RoundEngine<ScriptedExecutor> {
    engine_with(config, Catalog::builtin())
}

fn engine_with(config: RoomConfig, catalog: Catalog) -> RoundEngine<ScriptedExecutor> {
    RoundEngine::new(ScriptedExecutor, catalog, config)
}

/// The first `n` builtin tasks.
fn short_catalog(n: usize) -> Catalog {
    Catalog::new(Catalog::builtin().iter().take(n).cloned().collect()).unwrap()
}

fn payload(catalog: &Catalog, index: usize) -> TaskPayload {
    TaskPayload {
        prompt: catalog[index].prompt.clone(),
        entry_point: catalog[index].entry_point.clone(),
    }
}

fn scores(pairs: &[(&str, u32)]) -> Vec<PlayerScore> {
    pairs
        .iter()
        .map(|(name, score)| PlayerScore {
            name: (*name).into(),
            score: *score,
        })
        .collect()
}

fn room(id: &str) -> RoomId {
    RoomId::from(id)
}

/// Creates "R1" with Alice, joins Bob, and consumes everything up to the
/// first task on both clients.
async fn start_duel<E: Executor>(engine: &RoundEngine<E>) -> (Client, Client) {
    let (mut alice, alice_tx) = Client::new(1);
    let (mut bob, bob_tx) = Client::new(2);
    engine
        .create_room(Some(room("R1")), "Alice".into(), alice.id, alice_tx)
        .await
        .unwrap();
    engine
        .join(&room("R1"), "Bob".into(), bob.id, bob_tx)
        .await
        .unwrap();
    alice.until(|n| matches!(n, Notification::Task(_))).await;
    bob.until(|n| matches!(n, Notification::Task(_))).await;
    (alice, bob)
}

/// Submits a correct solution as `client` and waits for `taskSolved`.
async fn solve(engine: &RoundEngine<ScriptedExecutor>, client: &mut Client) -> Vec<Notification> {
    engine
        .submit(&room("R1"), client.id, "correct".into())
        .await
        .unwrap();
    client
        .until(|n| matches!(n, Notification::TaskSolved { .. }))
        .await
}

// =========================================================================
// Creating and joining
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_announces_room_and_roster() {
    let engine = engine(RoomConfig::default());
    let (mut alice, tx) = Client::new(1);

    let id = engine
        .create_room(Some(room("R1")), "Alice".into(), alice.id, tx)
        .await
        .unwrap();

    assert_eq!(id, room("R1"));
    assert_eq!(alice.next().await, Notification::RoomCreated(room("R1")));
    match alice.next().await {
        Notification::CurrentPlayers(players) => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].name, "Alice");
            assert_eq!(players[0].score, 0);
        }
        other => panic!("expected currentPlayers, got {other:?}"),
    }
    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.phase, RoomPhase::Lobby);
    assert!(!info.clock_running);
}

#[tokio::test(start_paused = true)]
async fn test_create_without_id_generates_one() {
    let engine = engine(RoomConfig::default());
    let (mut alice, tx) = Client::new(1);

    let id = engine
        .create_room(None, "Alice".into(), alice.id, tx)
        .await
        .unwrap();

    assert_eq!(id.as_str().len(), 6);
    assert_eq!(alice.next().await, Notification::RoomCreated(id.clone()));
    assert!(engine.registry().contains(&id).await);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_room_rejected_and_untouched() {
    let engine = engine(RoomConfig::default());
    let (alice, alice_tx) = Client::new(1);
    let (carol, carol_tx) = Client::new(3);

    engine
        .create_room(Some(room("R1")), "Alice".into(), alice.id, alice_tx)
        .await
        .unwrap();
    let err = engine
        .create_room(Some(room("R1")), "Carol".into(), carol.id, carol_tx)
        .await
        .unwrap_err();

    assert_eq!(err, RoomError::DuplicateRoom(room("R1")));
    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.players.len(), 1);
    assert_eq!(info.players[0].name, "Alice");
    assert_eq!(engine.registry().room_of(carol.id).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_join_missing_room_not_found() {
    let engine = engine(RoomConfig::default());
    let (bob, tx) = Client::new(2);

    let err = engine
        .join(&room("nope"), "Bob".into(), bob.id, tx)
        .await
        .unwrap_err();

    assert_eq!(err, RoomError::NotFound(room("nope")));
    assert_eq!(engine.registry().room_of(bob.id).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_connection_in_one_room_at_a_time() {
    let engine = engine(RoomConfig::default());
    let (alice, alice_tx) = Client::new(1);
    let (bob, bob_tx) = Client::new(2);

    engine
        .create_room(Some(room("R1")), "Alice".into(), alice.id, alice_tx.clone())
        .await
        .unwrap();
    engine
        .create_room(Some(room("R2")), "Bob".into(), bob.id, bob_tx)
        .await
        .unwrap();

    let err = engine
        .join(&room("R2"), "Alice".into(), alice.id, alice_tx)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::AlreadyInRoom(ConnectionId(1), _)));
    assert_eq!(engine.room_info(&room("R2")).await.unwrap().players.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_player_starts_game() {
    let engine = engine(RoomConfig::default());
    let catalog = Catalog::builtin();
    let (mut alice, alice_tx) = Client::new(1);
    let (mut bob, bob_tx) = Client::new(2);

    engine
        .create_room(Some(room("R1")), "Alice".into(), alice.id, alice_tx)
        .await
        .unwrap();
    alice.next().await;
    alice.next().await;

    engine
        .join(&room("R1"), "Bob".into(), bob.id, bob_tx)
        .await
        .unwrap();

    assert_eq!(
        alice.next().await,
        Notification::PlayerJoined {
            id: ConnectionId(2),
            name: "Bob".into()
        }
    );
    assert!(matches!(alice.next().await, Notification::CurrentPlayers(p) if p.len() == 2));
    assert_eq!(alice.next().await, Notification::GameStarted { total_rounds: 5 });
    assert_eq!(alice.next().await, Notification::NewRound { round: 1 });
    assert_eq!(alice.next().await, Notification::Task(payload(&catalog, 0)));

    // Bob is in the room by the time the game starts.
    let bob_events = bob.until(|n| matches!(n, Notification::Task(_))).await;
    assert!(bob_events.contains(&Notification::GameStarted { total_rounds: 5 }));

    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.phase, RoomPhase::RoundInProgress);
    assert_eq!(info.round, 1);
    assert!(info.clock_running);
}

#[tokio::test(start_paused = true)]
async fn test_single_player_room_starts_immediately() {
    let engine = engine(RoomConfig {
        min_players: 1,
        ..RoomConfig::default()
    });
    let (mut alice, tx) = Client::new(1);

    engine
        .create_room(Some(room("solo")), "Alice".into(), alice.id, tx)
        .await
        .unwrap();

    assert!(matches!(alice.next().await, Notification::RoomCreated(_)));
    assert!(matches!(alice.next().await, Notification::CurrentPlayers(_)));
    assert_eq!(alice.next().await, Notification::GameStarted { total_rounds: 5 });
    assert_eq!(alice.next().await, Notification::NewRound { round: 1 });
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_receives_open_round() {
    let engine = engine(RoomConfig::default());
    let catalog = Catalog::builtin();
    let (mut alice, mut bob) = start_duel(&engine).await;
    solve(&engine, &mut bob).await;
    alice
        .until(|n| matches!(n, Notification::NewRound { round: 2 }))
        .await;

    let (mut carol, carol_tx) = Client::new(3);
    engine
        .join(&room("R1"), "Carol".into(), carol.id, carol_tx)
        .await
        .unwrap();

    assert!(matches!(carol.next().await, Notification::PlayerJoined { .. }));
    assert!(matches!(carol.next().await, Notification::CurrentPlayers(p) if p.len() == 3));
    assert_eq!(carol.next().await, Notification::GameStarted { total_rounds: 5 });
    assert_eq!(carol.next().await, Notification::NewRound { round: 2 });
    assert_eq!(carol.next().await, Notification::Task(payload(&catalog, 1)));

    // Everyone else just sees the join; the game doesn't restart.
    engine.room_info(&room("R1")).await.unwrap();
    let seen = alice.drain();
    assert!(!seen.iter().any(|n| matches!(n, Notification::GameStarted { .. })));
    assert!(seen.iter().any(|n| matches!(n, Notification::PlayerJoined { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_joiner_during_pause_waits_for_next_round() {
    let engine = engine(RoomConfig::default());
    let catalog = Catalog::builtin();
    let (_alice, mut bob) = start_duel(&engine).await;
    solve(&engine, &mut bob).await;

    let (mut carol, carol_tx) = Client::new(3);
    engine
        .join(&room("R1"), "Carol".into(), carol.id, carol_tx)
        .await
        .unwrap();

    assert!(matches!(carol.next().await, Notification::PlayerJoined { .. }));
    assert!(matches!(carol.next().await, Notification::CurrentPlayers(_)));
    assert_eq!(carol.next().await, Notification::GameStarted { total_rounds: 5 });
    // Nothing about the solved round; the next one arrives with everyone.
    assert!(matches!(carol.next().await, Notification::RoundEnded { .. }));
    assert_eq!(carol.next().await, Notification::NewRound { round: 2 });
    assert_eq!(carol.next().await, Notification::Task(payload(&catalog, 1)));
}

// =========================================================================
// Submissions
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_one_evaluation_in_flight_per_player() {
    let executor = CountingExecutor::default();
    let engine = RoundEngine::new(executor.clone(), Catalog::builtin(), RoomConfig::default());
    let (mut alice, mut bob) = start_duel(&engine).await;

    for _ in 0..50 {
        engine
            .submit(&room("R1"), bob.id, "wrong".into())
            .await
            .unwrap();
    }
    engine
        .submit(&room("R1"), alice.id, "wrong".into())
        .await
        .unwrap();

    assert!(matches!(bob.next().await, Notification::IncorrectSolution(_)));
    assert!(matches!(alice.next().await, Notification::IncorrectSolution(_)));
    // One evaluation each: Bob's extra submissions were dropped.
    assert_eq!(executor.loads.load(Ordering::SeqCst), 2);
    assert_eq!(executor.peak.load(Ordering::SeqCst), 2);
    engine.room_info(&room("R1")).await.unwrap();
    assert!(bob.drain().is_empty());

    // Once the verdict is in, Bob can submit again.
    engine
        .submit(&room("R1"), bob.id, "wrong".into())
        .await
        .unwrap();
    assert!(matches!(bob.next().await, Notification::IncorrectSolution(_)));
    assert_eq!(executor.loads.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_correct_submission_scores_then_advances_after_pause() {
    let engine = engine(RoomConfig::default());
    let catalog = Catalog::builtin();
    let (mut alice, mut bob) = start_duel(&engine).await;

    solve(&engine, &mut bob).await;

    assert_eq!(
        alice.next().await,
        Notification::ScoreUpdate(scores(&[("Alice", 0), ("Bob", 1)]))
    );
    assert_eq!(
        alice.next().await,
        Notification::TaskSolved {
            solver: "Bob".into(),
            code: "correct".into()
        }
    );

    let solved_at = Instant::now();
    let pause = alice
        .until(|n| matches!(n, Notification::RoundEnded { .. }))
        .await;
    assert!(solved_at.elapsed() >= Duration::from_secs(3));
    // The round clock stops on a solve.
    assert!(!pause.iter().any(|n| matches!(n, Notification::TimerUpdate(_))));
    assert_eq!(
        pause.last(),
        Some(&Notification::RoundEnded {
            scores: scores(&[("Alice", 0), ("Bob", 1)])
        })
    );

    assert_eq!(alice.next().await, Notification::NewRound { round: 2 });
    assert_eq!(alice.next().await, Notification::Task(payload(&catalog, 1)));
}

#[tokio::test(start_paused = true)]
async fn test_submission_after_solve_is_ignored() {
    let engine = engine(RoomConfig::default());
    let (mut alice, mut bob) = start_duel(&engine).await;

    solve(&engine, &mut bob).await;
    engine
        .submit(&room("R1"), alice.id, "correct".into())
        .await
        .unwrap();

    let pause = alice
        .until(|n| matches!(n, Notification::RoundEnded { .. }))
        .await;
    let score_updates = pause
        .iter()
        .filter(|n| matches!(n, Notification::ScoreUpdate(_)))
        .count();
    assert_eq!(score_updates, 1);
    assert_eq!(
        pause.last(),
        Some(&Notification::RoundEnded {
            scores: scores(&[("Alice", 0), ("Bob", 1)])
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_correct_submissions_credit_one_solver() {
    let engine = engine(RoomConfig::default());
    let (mut alice, bob) = start_duel(&engine).await;

    engine
        .submit(&room("R1"), alice.id, "correct".into())
        .await
        .unwrap();
    engine
        .submit(&room("R1"), bob.id, "correct".into())
        .await
        .unwrap();

    let events = alice
        .until(|n| matches!(n, Notification::RoundEnded { .. }))
        .await;
    let solved = events
        .iter()
        .filter(|n| matches!(n, Notification::TaskSolved { .. }))
        .count();
    assert_eq!(solved, 1);

    let info = engine.room_info(&room("R1")).await.unwrap();
    let total: u32 = info.players.iter().map(|p| p.score).sum();
    assert_eq!(total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_answer_is_private_and_round_stays_open() {
    let engine = engine(RoomConfig::default());
    let (mut alice, mut bob) = start_duel(&engine).await;

    engine
        .submit(&room("R1"), bob.id, "wrong".into())
        .await
        .unwrap();

    assert_eq!(
        bob.next().await,
        Notification::IncorrectSolution("Incorrect solution. Try again.".into())
    );
    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.phase, RoomPhase::RoundInProgress);
    assert!(info.players.iter().all(|p| p.score == 0));
    assert!(alice.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_runtime_error_counts_as_incorrect() {
    let engine = engine(RoomConfig::default());
    let (_alice, mut bob) = start_duel(&engine).await;

    engine
        .submit(&room("R1"), bob.id, "throw".into())
        .await
        .unwrap();

    assert_eq!(
        bob.next().await,
        Notification::IncorrectSolution("Incorrect solution. Try again.".into())
    );
}

#[tokio::test(start_paused = true)]
async fn test_unloadable_code_gets_syntax_feedback() {
    let engine = engine(RoomConfig::default());
    let (_alice, mut bob) = start_duel(&engine).await;

    engine
        .submit(&room("R1"), bob.id, "function multiply(a, b) {".into())
        .await
        .unwrap();

    match bob.next().await {
        Notification::IncorrectSolution(message) => assert!(message.contains("syntax")),
        other => panic!("expected incorrectSolution, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_submit_to_missing_room_not_found() {
    let engine = engine(RoomConfig::default());
    let err = engine
        .submit(&room("ghost"), ConnectionId(1), "correct".into())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NotFound(room("ghost")));
}

#[tokio::test(start_paused = true)]
async fn test_submit_in_lobby_is_ignored() {
    let engine = engine(RoomConfig::default());
    let (mut alice, tx) = Client::new(1);
    engine
        .create_room(Some(room("R1")), "Alice".into(), alice.id, tx)
        .await
        .unwrap();

    engine
        .submit(&room("R1"), alice.id, "correct".into())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.phase, RoomPhase::Lobby);
    assert_eq!(info.players[0].score, 0);
    let seen = alice.drain();
    assert!(!seen.iter().any(|n| matches!(n, Notification::ScoreUpdate(_))));
}

#[tokio::test(start_paused = true)]
async fn test_submission_from_non_member_is_ignored() {
    let engine = engine(RoomConfig::default());
    let (mut alice, _bob) = start_duel(&engine).await;

    engine
        .submit(&room("R1"), ConnectionId(99), "correct".into())
        .await
        .unwrap();
    engine.room_info(&room("R1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.phase, RoomPhase::RoundInProgress);
    assert!(alice.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_verdict_for_previous_task_is_ignored() {
    let engine = engine(RoomConfig {
        round_duration: Duration::from_secs(10),
        ..RoomConfig::default()
    });
    let (mut alice, bob) = start_duel(&engine).await;

    // Three slow cases finish at t=15s, after round 1 timed out at t=10s.
    engine
        .submit(&room("R1"), bob.id, "slow".into())
        .await
        .unwrap();
    alice
        .until(|n| matches!(n, Notification::NewRound { round: 2 }))
        .await;
    tokio::time::sleep(Duration::from_secs(6)).await;

    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.round, 2);
    assert_eq!(info.phase, RoomPhase::RoundInProgress);
    assert!(info.players.iter().all(|p| p.score == 0));
    let seen = alice.drain();
    assert!(!seen.iter().any(|n| matches!(n, Notification::TaskSolved { .. })));
}

// =========================================================================
// Round timer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_ends_round_with_unchanged_scores() {
    let engine = engine(RoomConfig {
        round_duration: Duration::from_secs(3),
        ..RoomConfig::default()
    });
    let (mut alice, _bob) = start_duel(&engine).await;

    assert_eq!(alice.next_raw().await, Notification::TimerUpdate(2));
    assert_eq!(alice.next_raw().await, Notification::TimerUpdate(1));
    assert_eq!(alice.next_raw().await, Notification::TimerUpdate(0));
    assert_eq!(
        alice.next_raw().await,
        Notification::RoundEnded {
            scores: scores(&[("Alice", 0), ("Bob", 0)])
        }
    );
    assert_eq!(alice.next_raw().await, Notification::NewRound { round: 2 });
    assert!(matches!(alice.next_raw().await, Notification::Task(_)));
    // The fresh round counts down from the top again.
    assert_eq!(alice.next_raw().await, Notification::TimerUpdate(2));
}

#[tokio::test(start_paused = true)]
async fn test_timer_ticks_once_per_period() {
    let engine = engine(RoomConfig::default());
    let (mut alice, _bob) = start_duel(&engine).await;

    let start = Instant::now();
    assert_eq!(alice.next_raw().await, Notification::TimerUpdate(59));
    assert_eq!(alice.next_raw().await, Notification::TimerUpdate(58));
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_one_timer_after_advance() {
    let engine = engine(RoomConfig::default());
    let (mut alice, mut bob) = start_duel(&engine).await;

    solve(&engine, &mut bob).await;
    alice
        .until(|n| matches!(n, Notification::NewRound { round: 2 }))
        .await;

    // A leftover countdown would show up as repeated or skipped values.
    let mut ticks = Vec::new();
    while ticks.len() < 5 {
        if let Notification::TimerUpdate(left) = alice.next_raw().await {
            ticks.push(left);
        }
    }
    assert_eq!(ticks, vec![59, 58, 57, 56, 55]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_on_last_task_ends_game() {
    let engine = engine_with(
        RoomConfig {
            round_duration: Duration::from_secs(2),
            ..RoomConfig::default()
        },
        short_catalog(1),
    );
    let (mut alice, mut bob) = start_duel(&engine).await;

    let events = alice
        .until(|n| matches!(n, Notification::GameEnded { .. }))
        .await;
    let tail: Vec<_> = events
        .into_iter()
        .filter(|n| !matches!(n, Notification::TimerUpdate(_)))
        .collect();
    assert_eq!(
        tail,
        vec![
            Notification::RoundEnded {
                scores: scores(&[("Alice", 0), ("Bob", 0)])
            },
            Notification::GameEnded {
                winner: Some("Alice".into()),
                scores: scores(&[("Alice", 0), ("Bob", 0)])
            },
        ]
    );

    alice.closed().await;
    bob.closed().await;
    assert!(!engine.registry().contains(&room("R1")).await);
}

// =========================================================================
// Ending the game
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reaching_win_score_ends_game_immediately() {
    let engine = engine(RoomConfig::default());
    let (mut alice, mut bob) = start_duel(&engine).await;

    for round in 1..=3 {
        solve(&engine, &mut bob).await;
        if round < 3 {
            bob.until(|n| matches!(n, Notification::Task(_))).await;
        }
    }

    let start = Instant::now();
    assert_eq!(
        bob.next().await,
        Notification::GameEnded {
            winner: Some("Bob".into()),
            scores: scores(&[("Alice", 0), ("Bob", 3)])
        }
    );
    assert_eq!(start.elapsed(), Duration::ZERO);

    let events = alice
        .until(|n| matches!(n, Notification::GameEnded { .. }))
        .await;
    let rounds_ended = events
        .iter()
        .filter(|n| matches!(n, Notification::RoundEnded { .. }))
        .count();
    // Two advances, and nothing between the final solve and the end.
    assert_eq!(rounds_ended, 2);

    alice.closed().await;
    assert!(!engine.registry().contains(&room("R1")).await);
    assert_eq!(engine.registry().room_of(alice.id).await, None);
    assert_eq!(engine.registry().room_of(bob.id).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_solving_last_task_ends_game_after_pause() {
    let engine = engine_with(RoomConfig::default(), short_catalog(2));
    let (mut alice, mut bob) = start_duel(&engine).await;

    solve(&engine, &mut bob).await;
    alice
        .until(|n| matches!(n, Notification::NewRound { round: 2 }))
        .await;
    solve(&engine, &mut alice).await;

    let solved_at = Instant::now();
    let tail = alice
        .until(|n| matches!(n, Notification::GameEnded { .. }))
        .await;
    assert!(solved_at.elapsed() >= Duration::from_secs(3));
    assert!(!tail.iter().any(|n| matches!(n, Notification::RoundEnded { .. })));
    // Tied at one each: the earlier joiner wins.
    assert_eq!(
        tail.last(),
        Some(&Notification::GameEnded {
            winner: Some("Alice".into()),
            scores: scores(&[("Alice", 1), ("Bob", 1)])
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_handles_fail_after_game_ends() {
    let engine = engine_with(
        RoomConfig {
            win_score: 1,
            ..RoomConfig::default()
        },
        short_catalog(2),
    );
    let (mut alice, mut bob) = start_duel(&engine).await;

    solve(&engine, &mut bob).await;
    alice.closed().await;

    let err = engine
        .submit(&room("R1"), bob.id, "correct".into())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NotFound(room("R1")));
    assert!(engine.room_info(&room("R1")).await.is_err());
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_game_keeps_round() {
    let engine = engine(RoomConfig::default());
    let (mut alice, bob) = start_duel(&engine).await;

    assert_eq!(engine.disconnect(bob.id).await, Some(room("R1")));

    assert_eq!(alice.next().await, Notification::PlayerLeft(ConnectionId(2)));
    assert!(matches!(alice.next().await, Notification::CurrentPlayers(p) if p.len() == 1));
    let info = engine.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.phase, RoomPhase::RoundInProgress);
    assert_eq!(info.round, 1);
    assert!(info.clock_running);
    assert_eq!(engine.registry().room_of(bob.id).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_last_player_leaving_deletes_room_and_stops_timer() {
    let engine = engine(RoomConfig::default());
    let (mut alice, bob) = start_duel(&engine).await;

    engine.disconnect(bob.id).await;
    engine.disconnect(alice.id).await;

    alice.closed().await;
    assert!(!engine.registry().contains(&room("R1")).await);
    assert_eq!(engine.registry().room_count().await, 0);
    assert!(matches!(
        engine.room_info(&room("R1")).await,
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_unknown_connection_is_noop() {
    let engine = engine(RoomConfig::default());
    assert_eq!(engine.disconnect(ConnectionId(42)).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_room_id_is_free_after_deletion() {
    let engine = engine(RoomConfig::default());
    let (alice, tx) = Client::new(1);
    engine
        .create_room(Some(room("R1")), "Alice".into(), alice.id, tx)
        .await
        .unwrap();
    engine.disconnect(alice.id).await;

    let (again, tx) = Client::new(1);
    engine
        .create_room(Some(room("R1")), "Alice".into(), again.id, tx)
        .await
        .unwrap();
    assert!(engine.registry().contains(&room("R1")).await);
}
