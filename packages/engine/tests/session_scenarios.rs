//! End-to-end practice sessions over the in-memory store.

use chrono::{Duration, Utc};

use rememberizer_engine::{
    AnswerOutcome, DomainId, EngineConfig, FactId, InMemoryStore, LearningEngine, LearningStore,
    Outcome, Question, SelectionReason, SessionState, Turn, TurnDirective,
};

const USER: &str = "user-1";

fn planets(store: &InMemoryStore, count: usize) -> DomainId {
    let names = [
        "Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune", "Pluto",
        "Ceres",
    ];
    let rows: Vec<Vec<String>> = names[..count]
        .iter()
        .enumerate()
        .map(|(i, name)| vec![name.to_string(), (i + 1).to_string()])
        .collect();
    let rows: Vec<Vec<&str>> = rows
        .iter()
        .map(|row| row.iter().map(String::as_str).collect())
        .collect();
    let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
    store.add_domain_with_rows("Planets", &["name", "order"], &rows)
}

fn setup(count: usize, config: EngineConfig) -> (LearningEngine<InMemoryStore>, DomainId) {
    let store = InMemoryStore::new();
    let domain_id = planets(&store, count);
    let engine = LearningEngine::with_seed(store, config, 42).expect("valid config");
    (engine, domain_id)
}

fn expect_question(turn: &Turn) -> (Question, SelectionReason) {
    match &turn.directive {
        TurnDirective::AskQuestion {
            question, reason, ..
        } => (question.clone(), *reason),
        other => panic!("expected a question, got {other:?}"),
    }
}

fn expect_card(turn: &Turn) -> (FactId, SelectionReason, Option<String>) {
    match &turn.directive {
        TurnDirective::ShowFact {
            fact,
            reason,
            highlight_field,
        } => (fact.id, *reason, highlight_field.clone()),
        other => panic!("expected a fact card, got {other:?}"),
    }
}

/// Asks for the next turn, which must be a question, and answers it.
fn answer_next(
    engine: &LearningEngine<InMemoryStore>,
    domain_id: DomainId,
    session: &SessionState,
    correct: bool,
) -> (SessionState, AnswerOutcome) {
    let turn = engine.next_turn(domain_id, USER, session).expect("turn");
    let (question, _) = expect_question(&turn);
    let chosen = if correct {
        question.correct_index
    } else {
        (question.correct_index + 1) % question.options.len()
    };
    let answer = engine
        .submit_answer(
            domain_id,
            USER,
            question.fact_id,
            &question.field,
            chosen,
            question.correct_index,
            &turn.session.session_id,
        )
        .expect("answer");
    let session = engine.apply_answer(&turn.session, &answer).expect("apply");
    (session, answer)
}

/// Shows the next card and acknowledges it.
fn learn_next(
    engine: &LearningEngine<InMemoryStore>,
    domain_id: DomainId,
    session: &SessionState,
) -> (SessionState, FactId) {
    let turn = engine.next_turn(domain_id, USER, session).expect("turn");
    let (fact_id, _, _) = expect_card(&turn);
    let session = engine
        .acknowledge_fact(domain_id, USER, fact_id, &turn.session)
        .expect("acknowledge");
    (session, fact_id)
}

fn master(engine: &LearningEngine<InMemoryStore>, fact_id: FactId) {
    engine
        .fact_states()
        .mark_learned(fact_id, USER)
        .expect("learn");
    let start = Utc::now() - Duration::days(1);
    for i in 0..7 {
        engine
            .store()
            .push_attempt(USER, fact_id, true, start + Duration::seconds(i));
    }
}

#[test]
fn test_learn_then_advance_after_two_correct() {
    let (engine, domain_id) = setup(5, EngineConfig::default());
    let session = engine.start_session(domain_id, USER).expect("session");

    let (session, first) = learn_next(&engine, domain_id, &session);
    let (session, answer) = answer_next(&engine, domain_id, &session, true);
    assert_eq!(answer.fact_id, first);
    assert_eq!(answer.outcome, Outcome::Retry);
    assert_eq!(session.pending_fact, Some(first));

    let (session, answer) = answer_next(&engine, domain_id, &session, true);
    assert_eq!(answer.fact_id, first);
    assert_eq!(answer.outcome, Outcome::Advance);
    assert_eq!(session.pending_fact, None);

    // The next unlearned fact is introduced.
    let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
    let (next_fact, reason, _) = expect_card(&turn);
    assert_ne!(next_fact, first);
    assert_eq!(reason, SelectionReason::Unlearned);
    assert_eq!(turn.session.question_count, 2);
}

#[test]
fn test_two_wrong_answers_demote_and_reshow_card() {
    let (engine, domain_id) = setup(5, EngineConfig::default());
    let session = engine.start_session(domain_id, USER).expect("session");

    let (session, fact_id) = learn_next(&engine, domain_id, &session);
    let (session, answer) = answer_next(&engine, domain_id, &session, false);
    assert_eq!(answer.outcome, Outcome::Retry);
    assert!(answer.highlight_field.is_some());

    let (session, answer) = answer_next(&engine, domain_id, &session, false);
    assert_eq!(answer.outcome, Outcome::Demoted);
    let state = engine
        .store()
        .fact_state(USER, fact_id)
        .expect("read")
        .expect("state exists");
    assert!(state.learned_at.is_none());

    let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
    let (card, reason, highlight) = expect_card(&turn);
    assert_eq!(card, fact_id);
    assert_eq!(reason, SelectionReason::Relearn);
    assert_eq!(highlight, Some(answer.field));
}

#[test]
fn test_reinforcement_on_every_third_question() {
    let (engine, domain_id) = setup(6, EngineConfig::default());
    let ids = engine.store().fact_ids(domain_id);
    let mastered: Vec<FactId> = ids[..3].to_vec();
    for fact_id in &mastered {
        master(&engine, *fact_id);
    }
    for fact_id in &ids[3..] {
        engine
            .fact_states()
            .mark_learned(*fact_id, USER)
            .expect("learn");
    }

    let mut session = engine.start_session(domain_id, USER).expect("session");
    for number in 1..=9u32 {
        let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
        let (question, reason) = expect_question(&turn);
        assert_eq!(turn.session.question_count, number);
        if number % 3 == 0 {
            assert_eq!(reason, SelectionReason::Reinforcement, "question {number}");
            assert!(mastered.contains(&question.fact_id));
        } else {
            assert_eq!(reason, SelectionReason::LeastPracticed, "question {number}");
        }
        session = turn.session;
    }
}

#[test]
fn test_recovery_mode_consolidates_backlog() {
    let (engine, domain_id) = setup(10, EngineConfig::default());
    let ids = engine.store().fact_ids(domain_id);
    for fact_id in &ids[..6] {
        engine
            .fact_states()
            .mark_learned(*fact_id, USER)
            .expect("learn");
    }

    let session = engine.start_session(domain_id, USER).expect("session");
    let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
    assert!(turn.session.recovery.backlog);
    let (question, reason) = expect_question(&turn);
    assert_eq!(reason, SelectionReason::Recovery);
    assert!(ids[..6].contains(&question.fact_id));

    // Mastering most of the backlog ends recovery; new facts come back.
    for fact_id in &ids[..4] {
        master(&engine, *fact_id);
    }
    let turn = engine.next_turn(domain_id, USER, &turn.session).expect("turn");
    assert!(!turn.session.recovery.is_active());
    let (card, reason, _) = expect_card(&turn);
    assert_eq!(reason, SelectionReason::Unlearned);
    assert_eq!(card, ids[6]);
}

#[test]
fn test_failure_streak_activates_recovery() {
    let mut config = EngineConfig::default();
    config.recovery.activate_ratio = 1.0;
    let (engine, domain_id) = setup(6, config);

    let session = engine.start_session(domain_id, USER).expect("session");
    let (session, _) = learn_next(&engine, domain_id, &session);
    let (session, _) = answer_next(&engine, domain_id, &session, false);
    let (session, _) = answer_next(&engine, domain_id, &session, true);
    let (session, _) = answer_next(&engine, domain_id, &session, false);
    let (session, answer) = answer_next(&engine, domain_id, &session, false);
    assert_eq!(answer.outcome, Outcome::Demoted);

    let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
    assert!(turn.session.recovery.streak);
    assert!(!turn.session.recovery.backlog);
}

#[test]
fn test_four_fact_domain_uses_all_siblings_as_distractors() {
    let store = InMemoryStore::new();
    let domain_id = store.add_domain_with_rows(
        "Greek Muses",
        &["name"],
        &[&["Calliope"], &["Clio"], &["Erato"], &["Euterpe"]],
    );
    let engine = LearningEngine::with_seed(store, EngineConfig::default(), 5).expect("engine");

    let session = engine.start_session(domain_id, USER).expect("session");
    let (session, fact_id) = learn_next(&engine, domain_id, &session);
    let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
    let (question, _) = expect_question(&turn);

    assert_eq!(question.fact_id, fact_id);
    assert_eq!(question.field, "name");
    let mut options = question.options.clone();
    options.sort();
    assert_eq!(options, vec!["Calliope", "Clio", "Erato", "Euterpe"]);
}

#[test]
fn test_reset_leaves_other_users_untouched() {
    let (engine, domain_id) = setup(5, EngineConfig::default());
    let fact_id = engine.store().fact_ids(domain_id)[0];
    for user in ["user-1", "user-2"] {
        engine.fact_states().mark_learned(fact_id, user).expect("learn");
        engine
            .submit_answer(domain_id, user, fact_id, "name", 0, 0, "s")
            .expect("answer");
    }

    let summary = engine.reset_progress(domain_id, "user-1").expect("reset");
    assert_eq!(summary.fact_states_deleted, 1);
    assert_eq!(summary.attempts_deleted, 1);

    let progress = engine.progress_summary(domain_id, "user-1").expect("progress");
    assert_eq!(progress.learned, 0);
    assert!(engine
        .store()
        .attempts("user-1", domain_id)
        .expect("attempts")
        .is_empty());

    let other = engine.progress_summary(domain_id, "user-2").expect("progress");
    assert_eq!(other.learned, 1);
    assert_eq!(
        engine
            .store()
            .attempts("user-2", domain_id)
            .expect("attempts")
            .len(),
        1
    );
}

#[test]
fn test_progress_and_activity_follow_practice() {
    let (engine, domain_id) = setup(5, EngineConfig::default());
    let session = engine.start_session(domain_id, USER).expect("session");
    let (session, _) = learn_next(&engine, domain_id, &session);
    let (session, _) = answer_next(&engine, domain_id, &session, true);
    let (_, _) = answer_next(&engine, domain_id, &session, true);

    let progress = engine.progress_summary(domain_id, USER).expect("progress");
    assert_eq!(progress.total, 5);
    assert_eq!(progress.learned, 1);
    assert_eq!(progress.mastered, 0);
    assert_eq!(progress.symbols, "+····");

    let activity = engine.activity_summary(domain_id, USER).expect("activity");
    assert_eq!(activity.total_attempts, 2);
    assert_eq!(activity.correct_attempts, 2);
    assert_eq!(activity.sessions, 1);
    assert_eq!(activity.attempts_today, 2);
    assert_eq!(activity.current_streak, 1);
}

#[test]
fn test_mastered_domain_still_practices() {
    let (engine, domain_id) = setup(4, EngineConfig::default());
    for fact_id in engine.store().fact_ids(domain_id) {
        master(&engine, fact_id);
    }
    let progress = engine.progress_summary(domain_id, USER).expect("progress");
    assert_eq!(progress.symbols, "****");

    let session = engine.start_session(domain_id, USER).expect("session");
    let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
    let (_, reason) = expect_question(&turn);
    assert_eq!(reason, SelectionReason::LeastPracticed);
}

#[test]
fn test_empty_domain_reports_no_eligible_fact() {
    let store = InMemoryStore::new();
    let domain_id = store.add_domain_with_rows("Empty", &["name"], &[]);
    let engine = LearningEngine::with_seed(store, EngineConfig::default(), 1).expect("engine");
    let session = SessionState::new(domain_id, "s");
    let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
    assert_eq!(turn.directive, TurnDirective::NoEligibleFact);

    let progress = engine.progress_summary(domain_id, USER).expect("progress");
    assert_eq!(progress.total, 0);
    assert!(progress.symbols.is_empty());
}

#[test]
fn test_categorical_field_does_not_break_practice() {
    let store = InMemoryStore::new();
    let domain_id = store.add_domain_with_rows(
        "Planets",
        &["name", "kind"],
        &[
            &["Mercury", "rocky"],
            &["Venus", "rocky"],
            &["Earth", "rocky"],
            &["Mars", "rocky"],
            &["Jupiter", "gas"],
            &["Saturn", "gas"],
        ],
    );
    let engine = LearningEngine::with_seed(store, EngineConfig::default(), 9).expect("engine");
    let mut session = engine.start_session(domain_id, USER).expect("session");

    let mut questions = 0;
    for _ in 0..40 {
        let turn = engine.next_turn(domain_id, USER, &session).expect("turn");
        session = match &turn.directive {
            TurnDirective::ShowFact { fact, .. } => engine
                .acknowledge_fact(domain_id, USER, fact.id, &turn.session)
                .expect("acknowledge"),
            TurnDirective::AskQuestion { question, .. } => {
                questions += 1;
                assert_eq!(question.field, "name");
                let answer = engine
                    .submit_answer(
                        domain_id,
                        USER,
                        question.fact_id,
                        &question.field,
                        question.correct_index,
                        question.correct_index,
                        &turn.session.session_id,
                    )
                    .expect("answer");
                engine.apply_answer(&turn.session, &answer).expect("apply")
            }
            TurnDirective::NoEligibleFact => panic!("facts remain eligible"),
        };
    }
    assert!(questions > 0);
}
