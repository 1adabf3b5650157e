//! Daily PV/UV series with gap filling

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::trace;

use crate::analytics::models::{DailyVisitRecord, DateRange, SeriesCategory, SeriesPoint};

/// Dense day → count mapping over a date range
///
/// Every day of the range has a bucket, so charts never show gaps on days
/// without visits. Iteration is chronological.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketedSeries {
    buckets: BTreeMap<NaiveDate, u64>,
}

impl BucketedSeries {
    /// Zero-initialized bucket for each day of the range
    ///
    /// An inverted range yields an empty series.
    pub fn bucketize(range: &DateRange) -> Self {
        let buckets = range.iter_days().map(|day| (day, 0)).collect();
        Self { buckets }
    }

    /// Add `amount` to the bucket for `day`
    ///
    /// Returns false, leaving the series untouched, when the day has no
    /// bucket. Counts saturate at `u64::MAX`.
    pub fn add(&mut self, day: NaiveDate, amount: u64) -> bool {
        match self.buckets.get_mut(&day) {
            Some(count) => {
                *count = count.saturating_add(amount);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, day: NaiveDate) -> Option<u64> {
        self.buckets.get(&day).copied()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.buckets
            .values()
            .fold(0u64, |sum, count| sum.saturating_add(*count))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u64)> + '_ {
        self.buckets.iter().map(|(day, count)| (*day, *count))
    }

    fn points(&self, category: SeriesCategory) -> impl Iterator<Item = SeriesPoint> + '_ {
        self.iter().map(move |(time, value)| SeriesPoint {
            time,
            value,
            category,
        })
    }
}

/// Fold raw per-day records into the PV and UV buckets
///
/// Records for the same day accumulate. Records outside the bucketed range
/// (the backend may return some because of time zone skew at the edges)
/// are dropped.
pub fn aggregate_visits(
    pv: &mut BucketedSeries,
    uv: &mut BucketedSeries,
    records: &[DailyVisitRecord],
) {
    for record in records {
        let in_pv = pv.add(record.day, record.pv);
        let in_uv = uv.add(record.day, record.uv);
        if !in_pv && !in_uv {
            trace!("Dropping visit record for {} outside range", record.day);
        }
    }
}

/// Concatenate PV then UV points into one line-chart sequence
pub fn into_points(pv: &BucketedSeries, uv: &BucketedSeries) -> Vec<SeriesPoint> {
    pv.points(SeriesCategory::Pv)
        .chain(uv.points(SeriesCategory::Uv))
        .collect()
}

/// Bucketize the range, fill it from `records` and flatten to chart points
pub fn build_timeline(range: &DateRange, records: &[DailyVisitRecord]) -> Vec<SeriesPoint> {
    let mut pv = BucketedSeries::bucketize(range);
    let mut uv = BucketedSeries::bucketize(range);
    aggregate_visits(&mut pv, &mut uv, records);
    into_points(&pv, &uv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::models::DAY_FORMAT;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DAY_FORMAT).unwrap()
    }

    fn record(d: &str, pv: u64, uv: u64) -> DailyVisitRecord {
        DailyVisitRecord { day: day(d), pv, uv }
    }

    #[test]
    fn test_bucketize_is_dense_and_ordered() {
        let range = DateRange::new(day("2020-02-27"), day("2020-03-02"));
        let series = BucketedSeries::bucketize(&range);

        assert_eq!(series.len(), 5);
        let days: Vec<_> = series.iter().map(|(d, _)| d).collect();
        assert_eq!(
            days,
            vec![
                day("2020-02-27"),
                day("2020-02-28"),
                day("2020-02-29"),
                day("2020-03-01"),
                day("2020-03-02"),
            ]
        );
        assert!(series.iter().all(|(_, count)| count == 0));
    }

    #[test]
    fn test_bucketize_density_over_many_ranges() {
        let start = day("2019-12-15");
        for span in 0..400 {
            let end = start + chrono::Duration::days(span);
            let series = BucketedSeries::bucketize(&DateRange::new(start, end));
            assert_eq!(series.len(), span as usize + 1);
        }
    }

    #[test]
    fn test_bucketize_inverted_range_is_empty() {
        let range = DateRange::new(day("2021-01-03"), day("2021-01-01"));
        assert!(BucketedSeries::bucketize(&range).is_empty());
        assert!(build_timeline(&range, &[record("2021-01-02", 1, 1)]).is_empty());
    }

    #[test]
    fn test_same_day_records_accumulate() {
        let range = DateRange::new(day("2021-01-01"), day("2021-01-02"));
        let mut pv = BucketedSeries::bucketize(&range);
        let mut uv = BucketedSeries::bucketize(&range);

        aggregate_visits(
            &mut pv,
            &mut uv,
            &[record("2021-01-02", 4, 1), record("2021-01-02", 6, 2)],
        );

        assert_eq!(pv.get(day("2021-01-02")), Some(10));
        assert_eq!(uv.get(day("2021-01-02")), Some(3));
        assert_eq!(pv.get(day("2021-01-01")), Some(0));
    }

    #[test]
    fn test_same_day_counts_saturate() {
        let range = DateRange::new(day("2021-01-01"), day("2021-01-02"));
        let mut pv = BucketedSeries::bucketize(&range);
        let mut uv = BucketedSeries::bucketize(&range);

        aggregate_visits(
            &mut pv,
            &mut uv,
            &[
                record("2021-01-01", u64::MAX, 1),
                record("2021-01-01", 1, 1),
                record("2021-01-02", 1, 1),
            ],
        );

        assert_eq!(pv.get(day("2021-01-01")), Some(u64::MAX));
        assert_eq!(pv.total(), u64::MAX);
        assert_eq!(uv.total(), 3);
    }

    #[test]
    fn test_sum_invariant_drops_out_of_range_records() {
        let range = DateRange::new(day("2021-01-10"), day("2021-01-20"));
        let records = vec![
            record("2021-01-09", 100, 10),
            record("2021-01-10", 3, 1),
            record("2021-01-15", 7, 2),
            record("2021-01-15", 2, 2),
            record("2021-01-20", 5, 5),
            record("2021-01-21", 100, 10),
        ];

        let mut pv = BucketedSeries::bucketize(&range);
        let mut uv = BucketedSeries::bucketize(&range);
        aggregate_visits(&mut pv, &mut uv, &records);

        let expected_pv: u64 = records
            .iter()
            .filter(|r| range.contains(r.day))
            .map(|r| r.pv)
            .sum();
        assert_eq!(pv.total(), expected_pv);
        assert_eq!(pv.total(), 17);
        assert_eq!(uv.total(), 10);
    }

    #[test]
    fn test_timeline_example() {
        let range = DateRange::new(day("2021-01-01"), day("2021-01-03"));
        let points = build_timeline(&range, &[record("2021-01-02", 4, 1)]);

        let expected = [
            ("2021-01-01", 0, SeriesCategory::Pv),
            ("2021-01-02", 4, SeriesCategory::Pv),
            ("2021-01-03", 0, SeriesCategory::Pv),
            ("2021-01-01", 0, SeriesCategory::Uv),
            ("2021-01-02", 1, SeriesCategory::Uv),
            ("2021-01-03", 0, SeriesCategory::Uv),
        ]
        .into_iter()
        .map(|(d, value, category)| SeriesPoint {
            time: day(d),
            value,
            category,
        })
        .collect::<Vec<_>>();

        assert_eq!(points, expected);
    }
}
