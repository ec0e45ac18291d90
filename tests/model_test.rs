use serde_json::json;
use tasklane::model::{ExecutionState, Priority, Task, TaskClass};

#[test]
fn class_parses_and_displays() {
    assert_eq!("short".parse::<TaskClass>().unwrap(), TaskClass::Short);
    assert_eq!("long".parse::<TaskClass>().unwrap(), TaskClass::Long);
    assert!("medium".parse::<TaskClass>().is_err());

    assert_eq!(TaskClass::Short.to_string(), "short");
    assert_eq!(TaskClass::Long.queue_name(), "long_tasks");
    assert_eq!(TaskClass::Short.queue_name(), "short_tasks");
}

#[test]
fn only_short_tasks_are_deadline_bounded() {
    assert!(TaskClass::Short.is_deadline_bounded());
    assert!(!TaskClass::Long.is_deadline_bounded());
}

#[test]
fn default_priority_is_one_and_lower_sorts_first() {
    assert_eq!(Priority::default(), Priority(1));
    let mut ranks = vec![Priority(3), Priority(1), Priority(2)];
    ranks.sort();
    assert_eq!(ranks, vec![Priority(1), Priority(2), Priority(3)]);
}

#[test]
fn valid_execution_transitions() {
    use ExecutionState::*;
    assert!(Start.can_transition_to(CheckLedger));
    assert!(CheckLedger.can_transition_to(AlreadyDone));
    assert!(CheckLedger.can_transition_to(Executing));
    assert!(CheckLedger.can_transition_to(Failed));
    assert!(Executing.can_transition_to(Completed));
    assert!(Executing.can_transition_to(Failed));
}

#[test]
fn invalid_execution_transitions() {
    use ExecutionState::*;
    assert!(!Start.can_transition_to(Executing));
    assert!(!CheckLedger.can_transition_to(Completed));
    assert!(!Executing.can_transition_to(AlreadyDone));
    assert!(!Completed.can_transition_to(Executing));
    assert!(!Failed.can_transition_to(CheckLedger));
    assert!(!AlreadyDone.can_transition_to(Executing));
}

#[test]
fn terminal_states() {
    use ExecutionState::*;
    assert!(AlreadyDone.is_terminal());
    assert!(Completed.is_terminal());
    assert!(Failed.is_terminal());
    assert!(!Start.is_terminal());
    assert!(!CheckLedger.is_terminal());
    assert!(!Executing.is_terminal());
}

#[test]
fn task_serializes_as_flat_json() {
    let task = Task::new("t1", json!({ "to": "a@example.com" }));
    assert_eq!(
        serde_json::to_value(&task).unwrap(),
        json!({ "id": "t1", "payload": { "to": "a@example.com" } })
    );

    let parsed: Task = serde_json::from_value(json!({ "id": "t2" })).unwrap();
    assert_eq!(parsed.id.as_str(), "t2");
    assert!(parsed.payload.is_null());
}
