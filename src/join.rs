//! Executes a [`JoinPlan`] as a sequence of in-memory hash joins.
//!
//! The accumulated result starts as the anchor table. Each step builds a
//! lookup over the coerced keys of the incoming table, queries it with the
//! coerced keys of the already-joined side, and appends the incoming table's
//! non-key columns. Output order is deterministic: accumulated rows keep
//! their order (one output row per matching right row, in right order),
//! followed by unmatched right rows in right order for outer joins.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::{
    coerce::{KeyCell, KeyForm, coerce_keys},
    data::parse_date_with,
    error::Result,
    planner::{JoinPlan, JoinStep, TableAnalysis},
    profile::ColumnProfile,
    report::StepExecution,
    table::Table,
};

/// `(input table, column)` position of a value's origin.
type ColumnRef = (usize, usize);

/// Rows and headers of the merge so far, with the position of every input
/// column that has been carried into it.
struct Accumulated {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    /// Input column each output column was created from.
    owners: Vec<ColumnRef>,
    /// Per row, output cells whose value came from another input column than
    /// the owner: right key values written by unmatched outer-join rows.
    borrowed: Vec<Vec<(usize, ColumnRef)>>,
    /// `(table, column)` -> output column. Right key columns map onto the left
    /// key columns they were joined with.
    locations: HashMap<ColumnRef, usize>,
}

impl Accumulated {
    fn seed(table_id: usize, table: &Table) -> Self {
        let headers = table.headers();
        let locations = (0..headers.len()).map(|c| ((table_id, c), c)).collect();
        let owners = (0..headers.len()).map(|c| (table_id, c)).collect();
        Self {
            headers,
            borrowed: vec![Vec::new(); table.row_count()],
            rows: table.rows(),
            owners,
            locations,
        }
    }

    fn width(&self) -> usize {
        self.headers.len()
    }

    /// Current cells of `columns` of input table `table_id`, one vector per
    /// column, each cell paired with the profile of the column it came from.
    fn key_cells<'a>(
        &'a self,
        table_id: usize,
        columns: &[usize],
        analyses: &'a [TableAnalysis],
    ) -> Vec<Vec<KeyCell<'a>>> {
        let profile_of = move |(table, column): ColumnRef| -> &'a ColumnProfile {
            analyses[table].profile.column(column)
        };
        columns
            .iter()
            .map(|column| {
                let location = self.locations.get(&(table_id, *column)).copied();
                self.rows
                    .iter()
                    .zip(&self.borrowed)
                    .map(|(row, borrowed)| match location {
                        Some(loc) => {
                            let source = borrowed
                                .iter()
                                .find(|(at, _)| *at == loc)
                                .map(|(_, origin)| *origin)
                                .unwrap_or(self.owners[loc]);
                            KeyCell {
                                value: row[loc].as_deref(),
                                source: profile_of(source),
                            }
                        }
                        None => KeyCell {
                            value: None,
                            source: profile_of((table_id, *column)),
                        },
                    })
                    .collect()
            })
            .collect()
    }

    fn join(
        self,
        step: &JoinStep,
        right: &Table,
        analyses: &[TableAnalysis],
    ) -> (Self, StepExecution) {
        let correspondence = &step.correspondence;
        let right_profile = &analyses[step.right].profile;
        let keys = {
            let left_cells = self.key_cells(step.left, &correspondence.left.columns, analyses);
            let right_cells = correspondence
                .right
                .columns
                .iter()
                .map(|c| {
                    right.columns()[*c]
                        .values()
                        .iter()
                        .map(|value| KeyCell {
                            value: value.as_deref(),
                            source: right_profile.column(*c),
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            coerce_keys(
                correspondence,
                &analyses[step.left].profile,
                &left_cells,
                right_profile,
                &right_cells,
                step.snap,
            )
        };
        if keys.left_skipped + keys.right_skipped > 0 {
            info!(
                "{} | {} key value(s) could not be coerced and will not join",
                right.name(),
                keys.left_skipped + keys.right_skipped
            );
        }
        if keys.left_snapped > 0 {
            info!(
                "{} | {} key value(s) joined through a similar value",
                right.name(),
                keys.left_snapped
            );
        }

        let Accumulated {
            mut headers,
            rows,
            mut owners,
            borrowed,
            mut locations,
        } = self;
        let left_width = headers.len();

        let right_key_columns = correspondence.right.columns.iter().copied().collect::<HashSet<_>>();
        let carried = (0..right.column_count())
            .filter(|c| !right_key_columns.contains(c))
            .collect::<Vec<_>>();
        let mut seen = headers.iter().cloned().collect::<HashSet<_>>();
        let mut added_columns = Vec::with_capacity(carried.len());
        for column in &carried {
            let name = unique_header(&mut seen, right.columns()[*column].name(), right.name());
            locations.insert((step.right, *column), headers.len());
            owners.push((step.right, *column));
            added_columns.push(name.clone());
            headers.push(name);
        }
        let left_key_locations = correspondence
            .left
            .columns
            .iter()
            .map(|c| locations.get(&(step.left, *c)).copied())
            .collect::<Vec<_>>();
        for (right_column, location) in correspondence.right.columns.iter().zip(&left_key_locations) {
            if let Some(location) = location {
                locations.insert((step.right, *right_column), *location);
            }
        }

        let mut lookup: HashMap<&str, Vec<usize>> = HashMap::new();
        for (row, key) in keys.right.iter().enumerate() {
            if let Some(key) = key {
                lookup.entry(key.as_str()).or_default().push(row);
            }
        }

        let right_value = |row: usize, column: usize| right.columns()[column].values()[row].clone();
        let mut matched_right = vec![false; right.row_count()];
        let mut matched_left_rows = 0usize;
        let mut output = Vec::with_capacity(rows.len());
        let mut output_borrowed = Vec::with_capacity(rows.len());
        for (row_idx, (row, row_borrowed)) in rows.into_iter().zip(borrowed).enumerate() {
            let bucket = keys.left[row_idx].as_deref().and_then(|k| lookup.get(k));
            match bucket {
                Some(bucket) => {
                    matched_left_rows += 1;
                    for &r in bucket {
                        matched_right[r] = true;
                        let mut combined = row.clone();
                        combined.extend(carried.iter().map(|c| right_value(r, *c)));
                        output.push(combined);
                        output_borrowed.push(row_borrowed.clone());
                    }
                }
                None if step.how.keeps_unmatched_left() => {
                    let mut combined = row;
                    combined.resize(left_width + carried.len(), None);
                    output.push(combined);
                    output_borrowed.push(row_borrowed);
                }
                None => {}
            }
        }

        if step.how.keeps_unmatched_right() {
            for r in (0..right.row_count()).filter(|r| !matched_right[*r]) {
                let mut combined = vec![None; left_width];
                let mut row_borrowed = Vec::new();
                let components = correspondence
                    .right
                    .columns
                    .iter()
                    .zip(&left_key_locations)
                    .zip(keys.forms.iter().zip(&keys.right_components));
                for ((right_column, location), (form, coerced)) in components {
                    let Some(location) = *location else {
                        continue;
                    };
                    let (owner_table, owner_column) = owners[location];
                    let owner = analyses[owner_table].profile.column(owner_column);
                    match render_in_owner_layout(*form, coerced[r].as_deref(), owner) {
                        Some(rendered) => combined[location] = Some(rendered),
                        None => {
                            combined[location] = right_value(r, *right_column);
                            if combined[location].is_some() {
                                row_borrowed.push((location, (step.right, *right_column)));
                            }
                        }
                    }
                }
                combined.extend(carried.iter().map(|c| right_value(r, *c)));
                output.push(combined);
                output_borrowed.push(row_borrowed);
            }
        }

        let execution = StepExecution {
            index: step.right,
            table: right.name().to_string(),
            key_forms: keys.forms.clone(),
            left_skipped: keys.left_skipped,
            right_skipped: keys.right_skipped,
            left_snapped: keys.left_snapped,
            matched_left_rows,
            matched_right_rows: matched_right.iter().filter(|m| **m).count(),
            added_columns,
            output_rows: output.len(),
        };
        debug!(
            "{} | {} accumulated row(s) matched, {} output row(s)",
            right.name(),
            execution.matched_left_rows,
            execution.output_rows
        );
        (
            Self {
                headers,
                rows: output,
                owners,
                borrowed: output_borrowed,
                locations,
            },
            execution,
        )
    }
}

/// A right date key written into a left date column takes that column's
/// layout, so the merged column stays uniform and later steps read it with
/// the column's own format.
fn render_in_owner_layout(
    form: KeyForm,
    coerced: Option<&str>,
    owner: &ColumnProfile,
) -> Option<String> {
    if form != KeyForm::Date {
        return None;
    }
    let format = owner.date_format.as_deref()?;
    let date = parse_date_with(coerced?, "%Y-%m-%d")?;
    Some(date.format(format).to_string())
}

/// First free name among `name`, `name_table`, `name_table_2`, ...
fn unique_header(seen: &mut HashSet<String>, name: &str, table: &str) -> String {
    let mut candidate = name.to_string();
    if seen.contains(&candidate) {
        let base = format!("{name}_{table}");
        candidate = base.clone();
        let mut counter = 2usize;
        while seen.contains(&candidate) {
            candidate = format!("{base}_{counter}");
            counter += 1;
        }
    }
    seen.insert(candidate.clone());
    candidate
}

/// Runs every step of `plan` and returns the merged table (named after the
/// anchor) with per-step statistics in step order.
pub fn execute_plan(
    tables: &[Table],
    analyses: &[TableAnalysis],
    plan: &JoinPlan,
) -> Result<(Table, Vec<StepExecution>)> {
    let anchor = &tables[plan.anchor];
    let mut accumulated = Accumulated::seed(plan.anchor, anchor);
    let mut executions = Vec::with_capacity(plan.steps.len());

    for step in &plan.steps {
        let before = accumulated.rows.len();
        let (next, execution) = accumulated.join(step, &tables[step.right], analyses);
        if execution.added_columns.is_empty() {
            warn!("{} | no new columns", execution.table);
        } else {
            info!(
                "{} | columns added: {}",
                execution.table,
                execution.added_columns.join(", ")
            );
        }
        if execution.output_rows < before && !step.how.keeps_unmatched_left() {
            let lost = before - execution.output_rows;
            warn!(
                "{} | {} join removed {} row(s) ({:.1}%)",
                execution.table,
                step.how,
                lost,
                100.0 * lost as f64 / before as f64
            );
        }
        accumulated = next;
        executions.push(execution);
    }

    info!(
        "Join complete: {} row(s), {} column(s)",
        accumulated.rows.len(),
        accumulated.width()
    );
    let table = Table::from_rows(anchor.name(), accumulated.headers, accumulated.rows)?;
    Ok((table, executions))
}
