//! End-to-end search scenarios through the engine API.

use std::time::Duration;

use sporkfish_engine::{Clock, Engine, EngineConfig, SearchError, SearchMode};

fn engine_with_depth(depth: u8) -> Engine {
    Engine::new(EngineConfig {
        max_depth: depth,
        ..Default::default()
    })
    .unwrap()
}

fn generous_clock() -> Clock {
    Clock::from_millis(600_000, 0)
}

#[test]
fn mate_in_one_back_rank() {
    let mut engine = engine_with_depth(3);
    engine
        .set_position("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", &[])
        .unwrap();
    let outcome = engine.search(generous_clock()).unwrap();
    assert_eq!(outcome.best_move.to_string(), "a1a8");
    assert!(
        outcome.score >= 99_000,
        "mate score expected, got {}",
        outcome.score
    );
}

#[test]
fn scholars_mate_delivered() {
    let mut engine = engine_with_depth(4);
    engine
        .set_position(
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            &[],
        )
        .unwrap();
    let outcome = engine.search(generous_clock()).unwrap();
    assert_eq!(outcome.best_move.to_string(), "h5f7");
}

#[test]
fn stalemate_trap_avoided() {
    // Queen and king against bare king. Kh6 here would stalemate the won
    // position; the chosen move must keep mate on the board.
    let mut engine = engine_with_depth(4);
    engine
        .set_position("7k/5Q2/6K1/8/8/8/8/8 w - - 0 1", &[])
        .unwrap();
    let outcome = engine.search(generous_clock()).unwrap();

    let after = engine.position().apply(outcome.best_move);
    assert!(
        !(after.legal_moves().is_empty() && !after.is_check()),
        "{} stalemates a completely won position",
        outcome.best_move
    );
    assert!(
        outcome.score >= 99_000,
        "the win must still be proven, got {}",
        outcome.score
    );
}

#[test]
fn opening_move_from_startpos() {
    let mut engine = engine_with_depth(4);
    let outcome = engine
        .search(Clock::from_millis(10_000, 1_000))
        .unwrap();
    assert!(engine.position().legal_moves().contains(&outcome.best_move));
    assert!(outcome.nodes > 1_000, "got only {} nodes", outcome.nodes);
}

#[test]
fn insufficient_material_reports_draw() {
    let mut engine = engine_with_depth(4);
    engine
        .set_position("8/8/4k3/8/8/4K3/8/8 w - - 0 1", &[])
        .unwrap();
    let outcome = engine.search(generous_clock()).unwrap();
    assert_eq!(outcome.score, 0);
    assert!(engine.position().legal_moves().contains(&outcome.best_move));
}

#[test]
fn zugzwang_does_not_fool_null_move() {
    // White's lone legal move loses to the passed pawn; null-move pruning
    // must not manufacture a save.
    let mut engine = engine_with_depth(6);
    engine
        .set_position("8/8/8/8/8/5k2/4p3/4K3 w - - 0 1", &[])
        .unwrap();
    let outcome = engine.search(generous_clock()).unwrap();
    assert_eq!(outcome.best_move.to_string(), "e1d2", "the only legal move");
    assert!(outcome.score < 0, "White is losing, got {}", outcome.score);
}

#[test]
fn checkmated_root_is_an_error() {
    let mut engine = engine_with_depth(3);
    engine
        .set_position(
            "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4",
            &[],
        )
        .unwrap();
    let err = engine.search(generous_clock()).unwrap_err();
    assert!(matches!(err, SearchError::NoLegalMoves { mated: true }));
}

#[test]
fn all_three_search_modes_find_the_back_rank_mate() {
    for mode in [
        SearchMode::NegamaxSingle,
        SearchMode::PvsSingle,
        SearchMode::NegamaxSmp,
    ] {
        let mut engine = Engine::new(EngineConfig {
            max_depth: 3,
            search_mode: mode,
            smp_threads: 2,
            ..Default::default()
        })
        .unwrap();
        engine
            .set_position("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", &[])
            .unwrap();
        let outcome = engine.search(generous_clock()).unwrap();
        assert_eq!(
            outcome.best_move.to_string(),
            "a1a8",
            "mode {mode:?} missed the mate"
        );
    }
}

#[test]
fn stop_interrupts_a_long_search() {
    let mut engine = Engine::new(EngineConfig {
        max_depth: 64,
        ..Default::default()
    })
    .unwrap();

    let stop = engine.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.store(true, std::sync::atomic::Ordering::Release);
    });

    // Hour-long budget; only the stop flag can end this promptly.
    let outcome = engine.search(Clock::from_millis(36_000_000, 0)).unwrap();
    stopper.join().unwrap();
    assert!(
        outcome.elapsed < Duration::from_secs(30),
        "stop flag ignored, ran {:?}",
        outcome.elapsed
    );
    assert!(engine.position().legal_moves().contains(&outcome.best_move));
}

#[test]
fn deeper_search_is_at_least_as_strong_on_tactics() {
    // A free rook hangs on d5; any depth of 2 or more must take it or do better.
    let mut engine = engine_with_depth(3);
    engine
        .set_position("4k3/8/8/3r4/2P1N3/8/8/3QK3 w - - 0 1", &[])
        .unwrap();
    let outcome = engine.search(generous_clock()).unwrap();
    assert!(
        outcome.score > 300,
        "up a rook at least, got {}",
        outcome.score
    );
}
