//! Query execution: filter, then sort.
//!
//! Key invariants:
//! - Filters combine with AND
//! - Malformed filters (unsupported operator, non-list `between` bound)
//!   pass the row through rather than failing the query
//! - `between` reads the first two list elements; missing bounds are NaN
//! - Sort compares raw values loosely (see [`loose_compare`]) and is stable:
//!   equal keys keep their input order in both directions

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::coerce::{display_string, to_number};
use crate::instruction::{Filter, FilterOperator, Instruction, Sort, SortDirection};
use crate::model::{Row, Value};

/// Apply `instruction` to `rows`, returning the filtered and sorted rows.
pub fn execute(rows: &[Row], instruction: &Instruction) -> Vec<Row> {
    let mut out = apply_filters(rows, &instruction.filters);
    if let Some(sort) = &instruction.sort {
        sort_rows(&mut out, sort);
    }
    out
}

/// Rows passing every filter, in input order.
pub fn apply_filters(rows: &[Row], filters: &[Filter]) -> Vec<Row> {
    rows.iter()
        .filter(|row| filters.iter().all(|f| filter_matches(f, row)))
        .cloned()
        .collect()
}

/// Evaluate one filter against one row.
pub fn filter_matches(filter: &Filter, row: &Row) -> bool {
    let value = row.get(&filter.column);

    match filter.operator {
        FilterOperator::Equals => strict_equals(value, &filter.value),
        FilterOperator::Contains => match value {
            None | Some(Value::Null) => false,
            Some(v) => display_string(v)
                .to_lowercase()
                .contains(&display_string(&filter.value).to_lowercase()),
        },
        FilterOperator::GreaterThan => {
            compare_numbers(to_number(value), to_number(Some(&filter.value)), |a, b| a > b)
        }
        FilterOperator::LessThan => {
            compare_numbers(to_number(value), to_number(Some(&filter.value)), |a, b| a < b)
        }
        FilterOperator::Between => match filter.value.as_list() {
            Some(bounds) => {
                let n = to_number(value);
                compare_numbers(n, to_number(bounds.first()), |a, b| a >= b)
                    && compare_numbers(n, to_number(bounds.get(1)), |a, b| a <= b)
            }
            None => true,
        },
        FilterOperator::Unsupported => true,
    }
}

/// Equality without coercion. An absent key equals nothing; lists never
/// compare equal.
fn strict_equals(value: Option<&Value>, expected: &Value) -> bool {
    match (value, expected) {
        (Some(Value::Null), Value::Null) => true,
        (Some(Value::Bool(a)), Value::Bool(b)) => a == b,
        (Some(Value::Number(a)), Value::Number(b)) => a == b,
        (Some(Value::Text(a)), Value::Text(b)) => a == b,
        _ => false,
    }
}

/// NaN on either side is always false.
fn compare_numbers(a: Option<f64>, b: Option<f64>, op: impl Fn(f64, f64) -> bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

// ----------------------------------------------------------------------------
// Sorting
// ----------------------------------------------------------------------------

/// Loose relational order of two raw cells.
///
/// Two textual operands (strings, lists and objects after stringification)
/// compare by UTF-16 code units. Any other pair compares numerically after
/// [`to_number`], so `null` is 0 and `"28"` sits between 12 and 31. An absent
/// value or NaN on either side is neither less nor greater: `Equal`.
pub fn loose_compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    if let (Some(x), Some(y)) = (as_text(a), as_text(b)) {
        return x.encode_utf16().cmp(y.encode_utf16());
    }
    match (to_number(a), to_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

fn as_text(value: Option<&Value>) -> Option<Cow<'_, str>> {
    match value? {
        Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
        v @ (Value::List(_) | Value::Object(_)) => Some(Cow::Owned(display_string(v))),
        _ => None,
    }
}

/// Stable in-place sort by `sort.column`. `desc` inverts the comparison;
/// rows that compare equal keep their input order in both directions.
pub fn sort_rows(rows: &mut Vec<Row>, sort: &Sort) {
    let descending = sort.direction == SortDirection::Desc;
    let order = stable_order(rows.len(), |i, j| {
        let ord = loose_compare(rows[i].get(&sort.column), rows[j].get(&sort.column));
        if descending { ord.reverse() } else { ord }
    });

    let mut slots: Vec<Option<Row>> = rows.drain(..).map(Some).collect();
    rows.extend(order.into_iter().filter_map(|i| slots[i].take()));
}

/// Bottom-up merge sort over indices `0..len`.
///
/// `slice::sort_by` may panic when the comparator is not a total order, and
/// [`loose_compare`] is not one (NaN and absent values equal everything).
/// A merge never inspects more than the pairwise result, so any comparator
/// is accepted and ties keep their index order.
fn stable_order(len: usize, cmp: impl Fn(usize, usize) -> Ordering) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut buf = vec![0; len];
    let mut width = 1;

    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut i, mut j, mut k) = (start, mid, start);
            while i < mid && j < end {
                if cmp(order[j], order[i]) == Ordering::Less {
                    buf[k] = order[j];
                    j += 1;
                } else {
                    buf[k] = order[i];
                    i += 1;
                }
                k += 1;
            }
            buf[k..k + (mid - i)].copy_from_slice(&order[i..mid]);
            k += mid - i;
            buf[k..k + (end - j)].copy_from_slice(&order[j..end]);
            start = end;
        }
        std::mem::swap(&mut order, &mut buf);
        width *= 2;
    }
    order
}
