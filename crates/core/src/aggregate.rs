//! Per-slice state aggregation.
//!
//! Facts are ordered by ascending `begin` (ties keep input order) and every
//! slice collects the facts that cover it. Overrides shallow-merge into one
//! map per slice and touching slices with equal maps are collapsed. Links
//! append one entry per fact and are never collapsed, so two slices with the
//! same compositions stay distinct.

use crate::error::CoreError;
use crate::timeline::{self, Interval, OPEN, Segment};
use crate::value::Data;

/// Build the override timeline for one entity from its live facts.
pub fn aggregate_overrides<'a, I>(facts: I) -> Result<Vec<Segment<Data>>, CoreError>
where
    I: IntoIterator<Item = (Interval, &'a Data)>,
{
    let mut facts: Vec<(Interval, &Data)> = facts.into_iter().collect();
    facts.sort_by_key(|(interval, _)| interval.begin);

    let slices = timeline::slice(facts.iter().map(|(interval, _)| *interval));
    let mut segments = Vec::new();
    for slice in slices {
        let mut merged = Data::new();
        for (_, data) in facts.iter().filter(|(interval, _)| interval.covers(&slice)) {
            for (key, value) in data.iter() {
                merged.insert(key.clone(), value.clone());
            }
        }
        if !merged.is_empty() {
            segments.push(Segment::new(slice, merged));
        }
    }

    let segments = merge_adjacent(segments);
    check_timeline(&segments)?;
    Ok(segments)
}

/// Build the link timeline for one entity. Each slice lists every covering
/// fact in precedence order.
pub fn aggregate_links<T, I>(facts: I) -> Result<Vec<Segment<Vec<T>>>, CoreError>
where
    T: Clone,
    I: IntoIterator<Item = (Interval, T)>,
{
    let mut facts: Vec<(Interval, T)> = facts.into_iter().collect();
    facts.sort_by_key(|(interval, _)| interval.begin);

    let slices = timeline::slice(facts.iter().map(|(interval, _)| *interval));
    let mut segments = Vec::new();
    for slice in slices {
        let entries: Vec<T> = facts
            .iter()
            .filter(|(interval, _)| interval.covers(&slice))
            .map(|(_, item)| item.clone())
            .collect();
        if !entries.is_empty() {
            segments.push(Segment::new(slice, entries));
        }
    }

    check_timeline(&segments)?;
    Ok(segments)
}

/// Collapse neighbouring segments that touch and carry equal data.
/// Segments separated by a gap are never joined.
pub fn merge_adjacent<T: PartialEq>(segments: Vec<Segment<T>>) -> Vec<Segment<T>> {
    let mut out: Vec<Segment<T>> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(last) = out.last_mut()
            && last.end != OPEN
            && last.end == segment.begin
            && last.data == segment.data
        {
            last.end = segment.end;
            continue;
        }
        out.push(segment);
    }
    out
}

/// Segments must be well formed, strictly ordered by `begin` and must not
/// overlap. Only the final segment may be open.
pub fn check_timeline<T>(segments: &[Segment<T>]) -> Result<(), CoreError> {
    for (idx, segment) in segments.iter().enumerate() {
        if segment.end != OPEN && segment.end <= segment.begin {
            return Err(invariant(format!(
                "segment {idx} is empty or inverted: [{}, {})",
                segment.begin, segment.end
            )));
        }
        if let Some(next) = segments.get(idx + 1)
            && (segment.end == OPEN || segment.end > next.begin)
        {
            return Err(invariant(format!(
                "segment {idx} [{}, {}) overlaps segment starting at {}",
                segment.begin, segment.end, next.begin
            )));
        }
    }
    Ok(())
}

fn invariant(msg: String) -> CoreError {
    log::error!("{msg}");
    CoreError::AggregationInvariant(msg)
}
