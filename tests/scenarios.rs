mod common;

use common::{bags, flights, table};
use csv_autojoin::{
    config::{JoinHow, MatchConfig, NameStrategy},
    match_and_join,
    report::{PairOutcome, UnmatchedReason},
};

#[test]
fn identical_keys_match_at_threshold_one() {
    let tables = [
        table("cities", &["id", "city"], &[&["1", "Oslo"], &["2", "Bergen"], &["3", "Bodo"]]),
        table("population", &["id", "pop"], &[&["1", "700"], &["2", "290"], &["3", "52"]]),
    ];
    let config = MatchConfig {
        threshold: 1.0,
        ..MatchConfig::default()
    };
    let (joined, report) = match_and_join(&tables, &config).expect("join succeeds");

    assert_eq!(joined.headers(), vec!["id", "city", "pop"]);
    assert_eq!(joined.row_count(), 3);
    assert_eq!(joined.row(1), vec![Some("2"), Some("Bergen"), Some("290")]);
    match report.outcome("population") {
        Some(PairOutcome::Matched { correspondence, .. }) => {
            assert_eq!(correspondence.score.combined, 1.0);
            assert_eq!(correspondence.left.names, vec!["id"]);
            assert_eq!(correspondence.right.names, vec!["id"]);
        }
        other => panic!("expected a match, got {other:?}"),
    }
}

#[test]
fn whitespace_in_values_does_not_prevent_a_match() {
    let (joined, report) =
        match_and_join(&[flights(), bags()], &MatchConfig::default()).expect("join succeeds");

    match report.outcome("bags") {
        Some(PairOutcome::Matched { correspondence, .. }) => {
            assert_eq!(correspondence.left.names, vec!["Flight"]);
            assert_eq!(correspondence.right.names, vec!["FLNo"]);
            assert_eq!(correspondence.score.value_overlap, 1.0);
        }
        other => panic!("expected a match, got {other:?}"),
    }
    assert_eq!(joined.headers(), vec!["Flight", "Origin", "Bags"]);
    assert_eq!(joined.row_count(), 3);
    assert_eq!(joined.row(0), vec![Some("ABC1234"), Some("FRA"), Some("12")]);
}

#[test]
fn composite_keys_align_by_best_first_name_matching() {
    let schedule = table(
        "schedule",
        &["Flight", "Date", "Pax"],
        &[
            &["AB100", "2024-01-01", "100"],
            &["AB100", "2024-01-02", "100"],
            &["CD200", "2024-01-01", "80"],
        ],
    );
    let delays = table(
        "delays",
        &["FLDate", "FLNo", "Delay"],
        &[
            &["01/01/2024", "AB 100", "5"],
            &["02/01/2024", "AB 100", "5"],
            &["01/01/2024", "CD 200", "10"],
        ],
    );
    let (joined, report) =
        match_and_join(&[schedule, delays], &MatchConfig::default()).expect("join succeeds");

    match report.outcome("delays") {
        Some(PairOutcome::Matched {
            correspondence,
            execution,
            ..
        }) => {
            assert_eq!(correspondence.left.names, vec!["Flight", "Date"]);
            assert_eq!(correspondence.right.names, vec!["FLNo", "FLDate"]);
            assert_eq!(correspondence.score.value_overlap, 1.0);
            let execution = execution.as_ref().expect("step executed");
            assert_eq!(execution.matched_left_rows, 3);
        }
        other => panic!("expected a composite match, got {other:?}"),
    }
    assert_eq!(joined.headers(), vec!["Flight", "Date", "Pax", "Delay"]);
    assert_eq!(joined.row(2), vec![Some("CD200"), Some("2024-01-01"), Some("80"), Some("10")]);
}

#[test]
fn unrelated_table_is_reported_and_left_out() {
    let weather = table(
        "weather",
        &["Station", "Temperature"],
        &[&["S-1", "12.5"], &["S-2", "13.1"]],
    );
    let (joined, report) = match_and_join(&[flights(), bags(), weather], &MatchConfig::default())
        .expect("run completes");

    assert_eq!(report.matched_tables(), vec!["bags"]);
    assert_eq!(report.unmatched_tables(), vec!["weather"]);
    match report.outcome("weather") {
        Some(PairOutcome::Unmatched {
            attempted, reason, ..
        }) => {
            assert_eq!(attempted, &vec!["flights".to_string(), "bags".to_string()]);
            assert!(matches!(reason, UnmatchedReason::BelowThreshold { .. }));
        }
        other => panic!("expected unmatched, got {other:?}"),
    }
    assert_eq!(joined.headers(), vec!["Flight", "Origin", "Bags"]);
    assert_eq!(joined.row_count(), 3);
}

#[test]
fn outer_join_keeps_rows_from_both_sides() {
    let left = table("a", &["code", "x"], &[&["k1", "1"], &["k2", "2"]]);
    let right = table("b", &["code", "y"], &[&["k2", "p"], &["k3", "q"]]);
    let config = MatchConfig {
        how: JoinHow::Outer,
        threshold: 0.4,
        ..MatchConfig::default()
    };
    let (joined, _) = match_and_join(&[left, right], &config).expect("join succeeds");
    assert_eq!(joined.row_count(), 3);
    assert_eq!(joined.row(2), vec![Some("k3"), None, Some("q")]);
}

#[test]
fn typed_column_matches_string_column_with_same_values() {
    let orders = table(
        "orders",
        &["day", "qty"],
        &[&["2024-01-01", "5"], &["2024-01-02", "6"], &["2024-01-03", "7"]],
    );
    let notes = table(
        "notes",
        &["day", "note"],
        &[&["2024-01-01", "n1"], &["2024-01-02", "n2"], &["pending", "n3"]],
    );
    let (joined, report) =
        match_and_join(&[orders, notes], &MatchConfig::default()).expect("join succeeds");

    match report.outcome("notes") {
        Some(PairOutcome::Matched {
            correspondence,
            execution,
            ..
        }) => {
            assert_eq!(correspondence.score.value_overlap, 1.0);
            assert_eq!(correspondence.score.combined, 1.0);
            assert_eq!(execution.as_ref().expect("step executed").right_skipped, 1);
        }
        other => panic!("expected a match, got {other:?}"),
    }
    assert_eq!(joined.row_count(), 2);
    assert_eq!(joined.row(1), vec![Some("2024-01-02"), Some("6"), Some("n2")]);
}

#[test]
fn chained_outer_joins_reuse_keys_from_earlier_steps() {
    let visits = table(
        "visits",
        &["when", "x"],
        &[&["01/03/2024", "x1"], &["02/03/2024", "x2"], &["13/03/2024", "x3"]],
    );
    let sales = table("sales", &["when", "y"], &[&["2024-03-01", "p"], &["2024-03-09", "q"]]);
    let returns = table("returns", &["when", "z"], &[&["2024-03-02", "r"], &["2024-03-09", "zz"]]);
    let config = MatchConfig {
        how: JoinHow::Outer,
        ..MatchConfig::default()
    };
    let (joined, report) =
        match_and_join(&[visits, sales, returns], &config).expect("join succeeds");

    assert_eq!(report.matched_tables(), vec!["sales", "returns"]);
    assert_eq!(joined.headers(), vec!["when", "x", "y", "z"]);
    assert_eq!(joined.row_count(), 4);
    assert_eq!(joined.row(1), vec![Some("02/03/2024"), Some("x2"), None, Some("r")]);
    assert_eq!(joined.row(3), vec![Some("09/03/2024"), None, Some("q"), Some("zz")]);
    match report.outcome("returns") {
        Some(PairOutcome::Matched {
            execution: Some(execution),
            ..
        }) => {
            assert_eq!(execution.left_skipped, 0);
            assert_eq!(execution.matched_right_rows, 2);
        }
        other => panic!("expected an executed match, got {other:?}"),
    }
}

#[test]
fn misspelled_values_join_when_fuzzy_values_are_enabled() {
    let people = table(
        "people",
        &["name", "age"],
        &[&["John Smith", "41"], &["Mary Jones", "35"], &["Peter Pan", "12"]],
    );
    let cities = table(
        "cities",
        &["name", "city"],
        &[&["Jon Smith", "Leeds"], &["Mary Jones", "York"], &["Peter Pann", "Hull"]],
    );
    let config = MatchConfig {
        value_similarity: Some(0.8),
        ..MatchConfig::default()
    };
    let (joined, _) = match_and_join(&[people, cities], &config).expect("join succeeds");
    assert_eq!(joined.row_count(), 3);
    assert_eq!(joined.row(2), vec![Some("Peter Pan"), Some("12"), Some("Hull")]);
}

#[test]
fn phonetic_strategy_matches_transposed_names() {
    let left = table("a", &["carrier", "n"], &[&["LH", "1"], &["BA", "2"]]);
    let right = table("b", &["carreir", "m"], &[&["LH", "7"], &["BA", "8"]]);
    let config = MatchConfig {
        strategy: NameStrategy::Phonetic,
        ..MatchConfig::default()
    };
    let (joined, report) = match_and_join(&[left, right], &config).expect("join succeeds");
    assert_eq!(report.matched_tables(), vec!["b"]);
    assert_eq!(joined.headers(), vec!["carrier", "n", "m"]);
}

#[test]
fn report_serializes_to_json() {
    let (_, report) =
        match_and_join(&[flights(), bags()], &MatchConfig::default()).expect("join succeeds");
    let json: serde_json::Value =
        serde_json::from_str(&report.to_json().expect("serialize")).expect("valid json");
    assert_eq!(json["anchor"], "flights");
    assert_eq!(json["outcomes"][0]["status"], "matched");
    assert_eq!(json["outcomes"][0]["table"], "bags");
    assert_eq!(json["config"]["how"], "inner");
    assert_eq!(json["output_rows"], 3);
}
