use std::collections::BTreeMap;

use crate::core::time::{InternalHorzScaleItem, TickMarkWeight, Time, TimePointIndex, TimeScalePoint};

/// Candidate axis label at one timeline index.
#[derive(Debug, Clone, PartialEq)]
pub struct TickMark {
    pub index: TimePointIndex,
    pub time: InternalHorzScaleItem,
    pub weight: TickMarkWeight,
    pub original_time: Time,
}

#[derive(Debug, Clone)]
struct BuiltMarks {
    max_indexes_per_mark: i64,
    marks: Vec<TickMark>,
}

/// Per-weight index of tick-mark candidates with a declutter cache.
#[derive(Debug, Clone, Default)]
pub struct TickMarks {
    marks_by_weight: BTreeMap<TickMarkWeight, Vec<TickMark>>,
    cache: Option<BuiltMarks>,
    uniform_distribution: bool,
}

impl TickMarks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_uniform_distribution(&mut self, value: bool) {
        if self.uniform_distribution != value {
            self.uniform_distribution = value;
            self.cache = None;
        }
    }

    /// Re-indexes candidates for `points[first_changed_point_index..]`.
    pub fn set_time_scale_points(
        &mut self,
        points: &[TimeScalePoint],
        first_changed_point_index: usize,
    ) {
        self.remove_marks_since_index(first_changed_point_index as TimePointIndex);
        self.cache = None;
        for (index, point) in points.iter().enumerate().skip(first_changed_point_index) {
            self.marks_by_weight
                .entry(point.time_weight)
                .or_default()
                .push(TickMark {
                    index: index as TimePointIndex,
                    time: point.time,
                    weight: point.time_weight,
                    original_time: point.original_time.clone(),
                });
        }
    }

    /// Returns the decluttered mark set for the given bar spacing and label width.
    pub fn build(&mut self, spacing: f64, max_width: f64) -> &[TickMark] {
        let max_indexes_per_mark = (max_width / spacing).ceil() as i64;
        let stale = self
            .cache
            .as_ref()
            .is_none_or(|cache| cache.max_indexes_per_mark != max_indexes_per_mark);
        if stale {
            let marks = self.build_marks_impl(max_indexes_per_mark);
            self.cache = Some(BuiltMarks {
                max_indexes_per_mark,
                marks,
            });
        }
        self.cache
            .as_ref()
            .map(|cache| cache.marks.as_slice())
            .unwrap_or_default()
    }

    fn remove_marks_since_index(&mut self, since_index: TimePointIndex) {
        if since_index == 0 {
            self.marks_by_weight.clear();
            return;
        }
        self.marks_by_weight.retain(|_, marks| {
            let keep = marks.partition_point(|mark| mark.index < since_index);
            marks.truncate(keep);
            !marks.is_empty()
        });
    }

    fn build_marks_impl(&self, max_indexes_per_mark: i64) -> Vec<TickMark> {
        let mut marks: Vec<TickMark> = Vec::new();
        for candidates in self.marks_by_weight.values().rev() {
            let prev_marks = std::mem::take(&mut marks);
            let mut prev_pointer = 0_usize;
            let mut right_index = i64::MAX;
            let mut left_index = i64::MIN;

            for mark in candidates {
                let current_index = mark.index;
                // marks of higher weights left of the candidate move over unchanged
                while prev_pointer < prev_marks.len() {
                    let kept = &prev_marks[prev_pointer];
                    if kept.index < current_index {
                        prev_pointer += 1;
                        left_index = kept.index;
                        right_index = i64::MAX;
                        marks.push(kept.clone());
                    } else {
                        right_index = kept.index;
                        break;
                    }
                }

                let fits_right = right_index.saturating_sub(current_index) >= max_indexes_per_mark;
                let fits_left = current_index.saturating_sub(left_index) >= max_indexes_per_mark;
                if fits_right && fits_left {
                    marks.push(mark.clone());
                    left_index = current_index;
                } else if self.uniform_distribution {
                    return prev_marks;
                }
            }

            marks.extend(prev_marks.into_iter().skip(prev_pointer));
        }
        marks
    }
}
