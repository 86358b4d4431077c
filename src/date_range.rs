use chrono::{NaiveDate, NaiveDateTime};

/// Plage de jours, bornes incluses, appliquée aux messages récupérés.
///
/// Chaque borne peut être ouverte. Un message sans date passe toujours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    /// Comme [`DateRange::new`], mais refuse une date de début postérieure à la date de fin.
    pub fn checked(start: Option<NaiveDate>, end: Option<NaiveDate>) -> anyhow::Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                anyhow::bail!(
                    "Plage de dates invalide : --from {} est postérieur à --to {}",
                    start,
                    end
                );
            }
        }
        Ok(DateRange { start, end })
    }

    /// Tout ce qui est daté de `date` ou après.
    pub fn single(date: NaiveDate) -> Self {
        DateRange {
            start: Some(date),
            end: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: Option<NaiveDateTime>) -> bool {
        let Some(timestamp) = timestamp else {
            return true;
        };
        let day = timestamp.date();
        self.start.map_or(true, |start| day >= start) && self.end.map_or(true, |end| day <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(y: i32, m: u32, d: u32) -> Option<NaiveDateTime> {
        day(y, m, d).and_hms_opt(12, 0, 0)
    }

    #[test]
    fn test_january_window() {
        let range = DateRange::new(Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
        assert!(range.contains(noon(2024, 1, 15)));
        assert!(!range.contains(noon(2024, 2, 1)));
        assert!(!range.contains(noon(2023, 12, 31)));
        // both bounds are whole days
        assert!(range.contains(day(2024, 1, 31).and_hms_opt(23, 59, 59)));
        assert!(range.contains(day(2024, 1, 1).and_hms_opt(0, 0, 0)));
    }

    #[test]
    fn test_undated_messages_always_pass() {
        let range = DateRange::new(Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
        assert!(range.contains(None));
    }

    #[test]
    fn test_single_date_is_open_ended() {
        let range = DateRange::single(day(2024, 3, 10));
        assert!(!range.contains(noon(2024, 3, 9)));
        assert!(range.contains(noon(2024, 3, 10)));
        assert!(range.contains(noon(2030, 1, 1)));
        assert!(DateRange::unbounded().contains(noon(1999, 1, 1)));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = DateRange::checked(Some(day(2024, 2, 1)), Some(day(2024, 1, 1))).unwrap_err();
        assert!(err.to_string().contains("2024-02-01"));

        let same_day = DateRange::checked(Some(day(2024, 1, 1)), Some(day(2024, 1, 1))).unwrap();
        assert!(same_day.contains(noon(2024, 1, 1)));
        assert!(DateRange::checked(None, Some(day(2024, 1, 1))).is_ok());
        assert!(DateRange::checked(Some(day(2024, 1, 1)), None).is_ok());
    }
}
