mod builder;
mod config;
pub mod manual;

use log::{debug, info};

use std::cmp::Ordering;

pub use crate::builder::{normalize, round2};
pub use crate::config::*;

// ********* Category split ***********

/// Decides whether a unit label names a company-wide rollup row.
pub trait Classifier {
    fn is_aggregate(&self, unit: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Classifier for F {
    fn is_aggregate(&self, unit: &str) -> bool {
        self(unit)
    }
}

/// Case-insensitive substring match on the unit label.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SubstringClassifier {
    needle: String,
}

impl SubstringClassifier {
    /// "company": the label of rollup rows in the exports.
    pub const COMPANY: &'static str = "công ty";

    pub fn new(needle: &str) -> SubstringClassifier {
        SubstringClassifier {
            needle: needle.to_lowercase(),
        }
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        SubstringClassifier::new(SubstringClassifier::COMPANY)
    }
}

impl Classifier for SubstringClassifier {
    fn is_aggregate(&self, unit: &str) -> bool {
        unit.to_lowercase().contains(&self.needle)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct CategorySplit<R> {
    pub aggregate: Vec<R>,
    pub unit_level: Vec<R>,
}

/// Partitions the rows. Relative order is kept on both sides.
pub fn split_by_category<R: KpiRecord>(
    rows: Vec<R>,
    classifier: &dyn Classifier,
) -> CategorySplit<R> {
    let (aggregate, unit_level): (Vec<R>, Vec<R>) = rows
        .into_iter()
        .partition(|r| classifier.is_aggregate(r.unit()));
    debug!(
        "split_by_category: aggregate: {:?} unit_level: {:?}",
        aggregate.len(),
        unit_level.len()
    );
    CategorySplit {
        aggregate,
        unit_level,
    }
}

// ********* Ranking ***********

// Missing values go last in both directions.
fn compare_metric(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let o = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Ascending => o,
                SortDirection::Descending => o.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort of the rows by one metric column.
pub fn sort_by_metric<R: KpiRecord>(rows: &mut [R], metric: &str, direction: SortDirection) {
    rows.sort_by(|a, b| compare_metric(a.value(metric), b.value(metric), direction));
}

/// Sorts the unit-level rows and appends the aggregate rows, unsorted, at the end.
pub fn rank<R: KpiRecord>(
    unit_level: Vec<R>,
    aggregate: Vec<R>,
    metric: &str,
    direction: SortDirection,
) -> Vec<R> {
    let mut res = unit_level;
    sort_by_metric(&mut res, metric, direction);
    res.extend(aggregate);
    res
}

// ********* Top / bottom ***********

#[derive(PartialEq, Debug, Clone)]
pub struct TopBottom<R> {
    /// The (up to) 3 rows with the largest metric values, largest first.
    pub top: Vec<R>,
    /// The (up to) 3 rows with the smallest metric values, smallest first.
    pub bottom: Vec<R>,
}

pub const TOP_BOTTOM_SIZE: usize = 3;

/// Picks the top and bottom rows out of unit-level rows.
///
/// The rows are ranked first (in the direction given by `higher_is_better`), then the
/// head and the tail of the ranking are taken. The tail is re-sorted so that both
/// lists read from the most extreme value inwards: when higher is better the bottom
/// list starts with the worst row, otherwise the top list starts with the worst row.
pub fn select_top_bottom<R: KpiRecord>(
    unit_level: &[R],
    metric: &str,
    higher_is_better: bool,
) -> TopBottom<R> {
    let direction = if higher_is_better {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    let mut ranked: Vec<R> = unit_level.to_vec();
    sort_by_metric(&mut ranked, metric, direction);

    let n = ranked.len();
    let head: Vec<R> = ranked.iter().take(TOP_BOTTOM_SIZE).cloned().collect();
    let mut tail: Vec<R> = ranked[n.saturating_sub(TOP_BOTTOM_SIZE)..].to_vec();

    if higher_is_better {
        sort_by_metric(&mut tail, metric, SortDirection::Ascending);
        TopBottom {
            top: head,
            bottom: tail,
        }
    } else {
        sort_by_metric(&mut tail, metric, SortDirection::Descending);
        TopBottom {
            top: tail,
            bottom: head,
        }
    }
}

// ********* Unit filter ***********

/// The pick-list selection on the unit column.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum UnitFilter {
    All,
    Unit(String),
}

impl UnitFilter {
    /// Label of the "everything" entry in the pick-list.
    pub const ALL_LABEL: &'static str = "-- Tất cả --";

    pub fn from_choice(choice: Option<&str>) -> UnitFilter {
        match choice {
            None => UnitFilter::All,
            Some(s) if s == UnitFilter::ALL_LABEL || s.is_empty() => UnitFilter::All,
            Some(s) => UnitFilter::Unit(s.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            UnitFilter::All => UnitFilter::ALL_LABEL,
            UnitFilter::Unit(s) => s.as_str(),
        }
    }
}

/// The pick-list: the sentinel, then the distinct units in order of appearance.
pub fn unit_choices<R: KpiRecord>(rows: &[R]) -> Vec<String> {
    let mut res: Vec<String> = vec![UnitFilter::ALL_LABEL.to_string()];
    for r in rows {
        if !res[1..].iter().any(|s| s == r.unit()) {
            res.push(r.unit().to_string());
        }
    }
    res
}

/// Keeps the rows matching the selection. Narrowing cannot be undone.
pub fn apply_filter<R: KpiRecord>(rows: Vec<R>, filter: &UnitFilter) -> Vec<R> {
    match filter {
        UnitFilter::All => rows,
        UnitFilter::Unit(name) => rows.into_iter().filter(|r| r.unit() == name).collect(),
    }
}

// ********* Full pipeline ***********

/// Everything needed to display and report one analysis.
#[derive(PartialEq, Debug, Clone)]
pub struct Analysis<R> {
    /// Ranked unit-level rows followed by the aggregate rows, after filtering.
    pub full: Vec<R>,
    /// The unit-level rows of `full`, in ranked order.
    pub unit_level: Vec<R>,
    pub top: Vec<R>,
    pub bottom: Vec<R>,
}

/// Ranks freshly normalized rows: unit-level rows sorted, then the aggregate rows.
pub fn rank_rows<R: KpiRecord>(rows: Vec<R>, classifier: &dyn Classifier) -> Vec<R> {
    let kind = R::KIND;
    let split = split_by_category(rows, classifier);
    rank(
        split.unit_level,
        split.aggregate,
        kind.metric(),
        kind.direction(),
    )
}

/// Runs the pipeline on ranked rows for the current selection.
pub fn run_analysis<R: KpiRecord>(
    ranked: &[R],
    classifier: &dyn Classifier,
    filter: &UnitFilter,
) -> Analysis<R> {
    let kind = R::KIND;
    info!(
        "Processing {:?} rows for {:?}, selection: {:?}",
        ranked.len(),
        kind,
        filter.label()
    );
    let full = apply_filter(ranked.to_vec(), filter);
    let unit_level: Vec<R> = full
        .iter()
        .filter(|r| !classifier.is_aggregate(r.unit()))
        .cloned()
        .collect();
    let tb = select_top_bottom(&unit_level, kind.metric(), kind.higher_is_better());
    debug!(
        "run_analysis: full: {:?} unit_level: {:?} top: {:?} bottom: {:?}",
        full.len(),
        unit_level.len(),
        tb.top.len(),
        tb.bottom.len()
    );
    Analysis {
        full,
        unit_level,
        top: tb.top,
        bottom: tb.bottom,
    }
}
