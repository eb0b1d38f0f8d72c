use csv_autojoin::{
    candidates::generate_candidates,
    config::{JoinHow, MatchConfig},
    match_and_join,
    matcher::{MatchOutcome, match_tables},
    planner::analyze,
    profile::profile_table,
    similarity::MatchScore,
    table::Table,
};
use proptest::prelude::*;

const CELLS: &[&str] = &[
    "1", "2", "3", "01", "1.5", "a", "B", "b c", "2024-01-01", "01/02/2024", "02/01/2024", "",
];

fn table_strategy(name: &'static str, headers: &'static [&'static str]) -> impl Strategy<Value = Table> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(CELLS), headers.len()),
        1..8,
    )
    .prop_map(move |rows| {
        let rows = rows.iter().map(Vec::as_slice).collect::<Vec<_>>();
        Table::from_text_rows(name, headers, &rows).expect("rectangular rows")
    })
}

fn three_tables() -> impl Strategy<Value = Vec<Table>> {
    (
        table_strategy("a", &["id", "x", "tag"]),
        table_strategy("b", &["id", "y"]),
        table_strategy("c", &["key", "x"]),
    )
        .prop_map(|(a, b, c)| vec![a, b, c])
}

proptest! {
    #[test]
    fn profiling_is_deterministic(table in table_strategy("t", &["p", "q", "r"])) {
        prop_assert_eq!(profile_table(&table), profile_table(&table));
    }

    #[test]
    fn composite_uniqueness_is_at_least_each_component(
        table in table_strategy("t", &["p", "q", "r"]),
        arity in 1usize..=3,
    ) {
        let config = MatchConfig {
            max_composite_arity: arity,
            min_uniqueness: 0.0,
            max_candidates: 50,
            ..MatchConfig::default()
        };
        let profile = profile_table(&table);
        for candidate in generate_candidates(&profile, &config).expect("candidates") {
            for column in &candidate.columns {
                prop_assert!(candidate.uniqueness >= profile.column(*column).uniqueness);
            }
        }
    }

    #[test]
    fn combined_score_stays_in_unit_interval(
        name in 0.0f64..=1.0,
        overlap in 0.0f64..=1.0,
        weight in 0.0f64..=1.0,
    ) {
        let score = MatchScore::new(name, overlap, weight);
        prop_assert!((0.0..=1.0).contains(&score.combined));
        prop_assert!(score.clears(0.0));
    }

    #[test]
    fn threshold_zero_accepts_any_evaluated_pair(tables in three_tables()) {
        let config = MatchConfig { threshold: 0.0, ..MatchConfig::default() };
        let left = analyze(&tables[0], &config).expect("analyze");
        let right = analyze(&tables[1], &config).expect("analyze");
        let outcome = match_tables(
            &left.profile,
            &left.candidates,
            &right.profile,
            &right.candidates,
            &config,
        );
        if let MatchOutcome::Unmatched { evaluated, .. } = outcome {
            prop_assert_eq!(evaluated, 0);
        }
    }

    #[test]
    fn threshold_one_accepts_only_exact_matches(tables in three_tables()) {
        let config = MatchConfig { threshold: 1.0, ..MatchConfig::default() };
        let left = analyze(&tables[0], &config).expect("analyze");
        let right = analyze(&tables[1], &config).expect("analyze");
        let outcome = match_tables(
            &left.profile,
            &left.candidates,
            &right.profile,
            &right.candidates,
            &config,
        );
        if let MatchOutcome::Matched(correspondence) = outcome {
            prop_assert_eq!(correspondence.score.name_similarity, 1.0);
            prop_assert_eq!(correspondence.score.value_overlap, 1.0);
        }
    }

    #[test]
    fn row_counts_grow_from_inner_to_left_to_outer(tables in three_tables()) {
        let rows = [JoinHow::Inner, JoinHow::Left, JoinHow::Outer].map(|how| {
            let config = MatchConfig { how, ..MatchConfig::default() };
            match_and_join(&tables, &config).expect("join runs").0.row_count()
        });
        prop_assert!(rows[0] <= rows[1], "inner {} > left {}", rows[0], rows[1]);
        prop_assert!(rows[1] <= rows[2], "left {} > outer {}", rows[1], rows[2]);
    }

    #[test]
    fn reruns_are_identical(tables in three_tables()) {
        let config = MatchConfig { how: JoinHow::Outer, ..MatchConfig::default() };
        let first = match_and_join(&tables, &config).expect("join runs");
        let second = match_and_join(&tables, &config).expect("join runs");
        prop_assert_eq!(first, second);
    }
}
