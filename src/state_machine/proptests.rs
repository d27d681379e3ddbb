//! Property-based tests for the turn state machine
//!
//! A scripted model is replayed through `transition`, executing the effects
//! against a plain history vector, to check the loop invariants for arbitrary
//! scripts.

use super::*;
use crate::store::{merge, CapabilityRequest, CapabilityResult, Message, MessageContent};
use proptest::prelude::*;
use serde_json::json;

const MAX_ROUNDS: usize = 4;

fn test_context() -> TurnContext {
    TurnContext::new("test-thread", "test-model", MAX_ROUNDS)
}

/// One scripted model reply: a batch of tool names (empty = final answer)
type Script = Vec<Vec<String>>;

fn arb_tool_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("datetime_info".to_string()),
        Just("convert_date_to_timestamp".to_string()),
        Just("math_calculator".to_string()),
        "[a-z_]{3,10}",
    ]
}

/// `rounds` tool batches followed by a final text reply
fn arb_script(rounds: std::ops::Range<usize>) -> impl Strategy<Value = Script> {
    proptest::collection::vec(proptest::collection::vec(arb_tool_name(), 1..4), rounds)
        .prop_map(|mut batches| {
            batches.push(vec![]);
            batches
        })
}

fn arb_error_kind() -> impl Strategy<Value = TurnErrorKind> {
    prop_oneof![
        Just(TurnErrorKind::Timeout),
        Just(TurnErrorKind::Model),
        Just(TurnErrorKind::Internal),
    ]
}

fn arb_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        Just(TurnState::BuildInput),
        (0..MAX_ROUNDS + 2).prop_map(|round| TurnState::AwaitModel { round }),
        (1..MAX_ROUNDS + 1).prop_map(|round| TurnState::DispatchTools {
            round,
            pending: vec![CapabilityRequest::new("p1", "datetime_info", json!({}))],
        }),
        arb_terminal_state(),
    ]
}

fn arb_terminal_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        "[a-z ]{0,10}".prop_map(|answer| TurnState::Done { answer }),
        ("[a-z ]{1,10}", arb_error_kind()).prop_map(|(message, kind)| TurnState::Failed { message, kind }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-z ]{1,10}".prop_map(|text| Event::UserQuestion { text }),
        ("[a-z ]{0,10}", proptest::collection::vec(arb_tool_name(), 0..3)).prop_map(|(text, names)| {
            Event::ModelResponse {
                content: MessageContent::Text(text),
                requests: names
                    .into_iter()
                    .enumerate()
                    .map(|(i, n)| CapabilityRequest::new(format!("r{i}"), n, json!({})))
                    .collect(),
            }
        }),
        ("[a-z ]{1,10}", arb_error_kind()).prop_map(|(message, kind)| Event::ModelError { message, kind }),
        Just(Event::ToolsComplete { results: vec![] }),
    ]
}

/// Outcome of driving one turn
struct Run {
    state: TurnState,
    history: Vec<Message>,
    model_calls: usize,
    dispatch_rounds: usize,
}

/// Drive a turn with scripted model replies; tools echo their name.
fn drive(script: &Script) -> Run {
    let ctx = test_context();
    let mut run = Run {
        state: TurnState::BuildInput,
        history: vec![],
        model_calls: 0,
        dispatch_rounds: 0,
    };
    let mut replies = script.iter();
    let mut next_event = Some(Event::UserQuestion {
        text: "question".to_string(),
    });

    while let Some(event) = next_event.take() {
        let result = transition(&run.state, &ctx, event).expect("valid transition");
        run.state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::PersistMessage(message) => {
                    merge(&mut run.history, message).expect("well-formed history");
                }
                Effect::RequestModel => {
                    run.model_calls += 1;
                    let batch = replies.next().expect("script long enough");
                    let requests = batch
                        .iter()
                        .enumerate()
                        .map(|(i, name)| {
                            CapabilityRequest::new(format!("call_{}_{i}", run.model_calls), name, json!({}))
                        })
                        .collect::<Vec<_>>();
                    let content = if requests.is_empty() {
                        MessageContent::Text(format!("answer after {} calls", run.model_calls))
                    } else {
                        MessageContent::Text(String::new())
                    };
                    next_event = Some(Event::ModelResponse { content, requests });
                }
                Effect::DispatchTools { requests } => {
                    run.dispatch_rounds += 1;
                    let results = requests
                        .iter()
                        .rev()
                        .map(|r| CapabilityResult::success(r, r.name.clone()))
                        .collect();
                    next_event = Some(Event::ToolsComplete { results });
                }
            }
        }
    }
    run
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Within the cap, a script of N tool batches yields N dispatch rounds and N+1 model calls.
    #[test]
    fn prop_rounds_within_cap_complete(script in arb_script(0..MAX_ROUNDS + 1)) {
        let rounds = script.len() - 1;
        let run = drive(&script);

        prop_assert!(
            matches!(run.state, TurnState::Done { .. }),
            "turn did not finish: {:?}",
            run.state
        );
        prop_assert_eq!(run.dispatch_rounds, rounds);
        prop_assert_eq!(run.model_calls, rounds + 1);

        let requested: usize = script.iter().map(Vec::len).sum();
        let results = run.history.iter().filter(|m| matches!(m, Message::ToolResult { .. })).count();
        prop_assert_eq!(results, requested);
        // user + one assistant per model call + one result per request
        prop_assert_eq!(run.history.len(), 1 + run.model_calls + requested);
    }

    /// Past the cap the turn fails, but every request still has exactly one result.
    #[test]
    fn prop_rounds_past_cap_fail(script in arb_script(MAX_ROUNDS + 1..MAX_ROUNDS + 4)) {
        let run = drive(&script);

        let TurnState::Failed { kind, .. } = &run.state else {
            return Err(TestCaseError::fail(format!("expected failure, got {:?}", run.state)));
        };
        prop_assert_eq!(*kind, TurnErrorKind::ToolRoundLimit);
        prop_assert_eq!(run.dispatch_rounds, MAX_ROUNDS);
        prop_assert_eq!(run.model_calls, MAX_ROUNDS + 1);

        let requested: usize = run.history.iter().map(|m| m.capability_requests().len()).sum();
        let results = run.history.iter().filter(|m| matches!(m, Message::ToolResult { .. })).count();
        prop_assert_eq!(results, requested);
    }

    /// The answer is the text of the last assistant message.
    #[test]
    fn prop_answer_matches_last_assistant(script in arb_script(0..MAX_ROUNDS + 1)) {
        let run = drive(&script);
        let TurnState::Done { answer } = &run.state else {
            return Err(TestCaseError::fail("turn did not finish"));
        };
        let Some(Message::Assistant { content, capability_requests }) = run.history.last() else {
            return Err(TestCaseError::fail("last message is not from the assistant"));
        };
        prop_assert!(capability_requests.is_empty());
        prop_assert_eq!(&content.answer_text(), answer);
    }

    /// Same inputs, same outputs.
    #[test]
    fn prop_transition_is_deterministic(state in arb_state(), event in arb_event()) {
        let ctx = test_context();
        let first = transition(&state, &ctx, event.clone());
        let second = transition(&state, &ctx, event);
        prop_assert_eq!(first, second);
    }

    /// Terminal states reject every event.
    #[test]
    fn prop_terminal_states_are_final(state in arb_terminal_state(), event in arb_event()) {
        prop_assert!(state.is_terminal());
        prop_assert_eq!(transition(&state, &test_context(), event), Err(TransitionError::TurnFinished));
    }

    /// Any accepted transition that requests tools also persists the assistant message first.
    #[test]
    fn prop_dispatch_follows_persisted_requests(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, &test_context(), event) {
            if let Some(pos) = result.effects.iter().position(|e| matches!(e, Effect::DispatchTools { .. })) {
                prop_assert!(pos > 0);
                let persisted_requests = match &result.effects[pos - 1] {
                    Effect::PersistMessage(m) => m.capability_requests().to_vec(),
                    _ => vec![],
                };
                let Effect::DispatchTools { requests } = &result.effects[pos] else { unreachable!() };
                prop_assert_eq!(&persisted_requests, requests);
            }
        }
    }

    /// A failed model call ends the turn without effects.
    #[test]
    fn prop_model_error_has_no_effects(
        round in 0..MAX_ROUNDS,
        message in "[a-z ]{1,20}",
        kind in arb_error_kind(),
    ) {
        let result = transition(
            &TurnState::AwaitModel { round },
            &test_context(),
            Event::ModelError { message: message.clone(), kind },
        ).unwrap();
        prop_assert_eq!(result.new_state, TurnState::Failed { message, kind });
        prop_assert!(result.effects.is_empty());
    }
}
