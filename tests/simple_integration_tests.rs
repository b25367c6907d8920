use sync_indicator::{extract_status_lines, AggregateState, StateReconciler, StatusLine};

fn lines(raw: &[&str]) -> Vec<StatusLine> {
    raw.iter().map(|l| StatusLine::new(l)).collect()
}

#[test]
fn test_two_up_to_date_lines() {
    let reconciler = StateReconciler::default();
    let input = lines(&["Status: Up to date", "Status: Up to date"]);

    assert_eq!(reconciler.reconcile(&input, false), (AggregateState::Ok, true));
}

#[test]
fn test_upload_beats_up_to_date() {
    let reconciler = StateReconciler::default();
    let input = lines(&["Status: Uploading file.txt", "Status: Up to date"]);

    assert_eq!(reconciler.reconcile(&input, false).0, AggregateState::Active);
}

#[test]
fn test_no_lines_is_error() {
    let reconciler = StateReconciler::default();

    for previous in [false, true] {
        assert_eq!(reconciler.reconcile(&[], previous), (AggregateState::Error, previous));
    }
}

#[test]
fn test_corrupted_entry_is_error() {
    let reconciler = StateReconciler::default();
    let input = lines(&["Status: corrupted entry"]);

    assert_eq!(reconciler.reconcile(&input, false).0, AggregateState::Error);
}

#[test]
fn test_non_status_lines_contribute_nothing() {
    let reconciler = StateReconciler::default();
    let input = extract_status_lines("Device: laptop\nStatus: Up to date\nFolder: ~/Docs\n");

    assert_eq!(input.len(), 1);
    assert_eq!(reconciler.reconcile(&input, true), (AggregateState::Ok, false));
}

#[test]
fn test_all_case_variants_are_ok() {
    let reconciler = StateReconciler::default();
    let output = "Status: Up To Date\nSTATUS: UP TO DATE\nstatus: up to date";
    let input = extract_status_lines(output);

    assert_eq!(input.len(), 3);
    assert_eq!(reconciler.reconcile(&input, false).0, AggregateState::Ok);
}
