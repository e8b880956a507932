use crate::domain::model::price::{price_to_cents, start_of_day, DATE_FORMAT};
use crate::domain::model::{AppError, AppResult};
use bigdecimal::num_bigint::Sign;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::str::FromStr;

/// GET /prices 的查询参数，所有字段均为可选
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    #[serde(rename = "type")]
    pub archive_type: Option<String>,
}

/// 闭区间日期范围，`end` 覆盖当天全天
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn start_bound(&self) -> NaiveDateTime {
        start_of_day(self.start)
    }

    pub fn end_bound(&self) -> NaiveDateTime {
        self.end.and_time(end_of_day())
    }
}

/// 闭区间价格范围，已换算为整数分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    pub min_cents: i64,
    pub max_cents: i64,
}

/// 两个可选范围按 AND 组合，均为 `None` 时不过滤
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceFilter {
    pub date_range: Option<DateRange>,
    pub price_range: Option<PriceRange>,
}

impl PriceFilter {
    pub fn is_unfiltered(&self) -> bool {
        self.date_range.is_none() && self.price_range.is_none()
    }
}

impl TryFrom<&PriceQuery> for PriceFilter {
    type Error = AppError;

    fn try_from(query: &PriceQuery) -> AppResult<Self> {
        build_filter(
            query.start.as_deref(),
            query.end.as_deref(),
            query.min.as_deref(),
            query.max.as_deref(),
        )
    }
}

/// 只有上下界都给出时才构成范围，单独的边界无论内容如何都忽略
pub fn build_filter(
    start: Option<&str>,
    end: Option<&str>,
    min: Option<&str>,
    max: Option<&str>,
) -> AppResult<PriceFilter> {
    let date_range = match (present(start), present(end)) {
        (Some(start), Some(end)) => Some(DateRange {
            start: parse_date("start", start)?,
            end: parse_date("end", end)?,
        }),
        _ => None,
    };

    let price_range = match (present(min), present(max)) {
        (Some(min), Some(max)) => Some(PriceRange {
            min_cents: parse_price("min", min)?,
            max_cents: parse_price("max", max)?,
        }),
        _ => None,
    };

    Ok(PriceFilter {
        date_range,
        price_range,
    })
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|err| AppError::InvalidInput(format!("{}={:?}: {}", field, value, err)))
}

fn parse_price(field: &str, value: &str) -> AppResult<i64> {
    let invalid = || AppError::InvalidInput(format!("{}={:?} is not a valid price", field, value));
    let price = BigDecimal::from_str(value).map_err(|_| invalid())?;
    if price.sign() == Sign::Minus {
        return Err(invalid());
    }
    price_to_cents(&price).ok_or_else(invalid)
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn no_parameters_is_unfiltered() {
        let filter = build_filter(None, None, None, None).unwrap();
        assert!(filter.is_unfiltered());
        assert_eq!(filter, PriceFilter::default());
    }

    #[test]
    fn lone_bounds_are_ignored() {
        assert!(build_filter(Some("2024-01-01"), None, None, None).unwrap().is_unfiltered());
        assert!(build_filter(None, Some("2024-01-31"), None, Some("10")).unwrap().is_unfiltered());
        assert!(build_filter(Some("garbage"), None, Some("1"), Some("")).unwrap().is_unfiltered());
    }

    #[test]
    fn date_range_covers_the_whole_end_day() {
        let filter = build_filter(Some("2024-01-01"), Some("2024-01-31"), None, None).unwrap();
        let range = filter.date_range.unwrap();
        assert_eq!(range.start, date(2024, 1, 1));
        assert_eq!(range.end, date(2024, 1, 31));
        assert!(filter.price_range.is_none());

        assert_eq!(range.start_bound(), start_of_day(date(2024, 1, 1)));
        let day_end = date(2024, 1, 31).and_hms_opt(23, 59, 59).unwrap();
        assert!(day_end < range.end_bound());
        assert!(range.end_bound() < start_of_day(date(2024, 2, 1)));
    }

    #[test]
    fn both_ranges_combine() {
        let filter =
            build_filter(Some("2024-01-01"), Some("2024-01-01"), Some("1.5"), Some(" 20 ")).unwrap();
        assert!(filter.date_range.is_some());
        assert_eq!(
            filter.price_range,
            Some(PriceRange {
                min_cents: 150,
                max_cents: 2000
            })
        );
    }

    #[test]
    fn requested_range_with_bad_bound_is_rejected() {
        assert!(matches!(
            build_filter(Some("2024-01-01"), Some("tomorrow"), None, None),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            build_filter(None, None, Some("-1"), Some("5")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            build_filter(None, None, Some("1"), Some("1; DROP TABLE prices")),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn query_string_maps_to_filter() {
        let query = PriceQuery {
            start: Some("2024-03-01".to_string()),
            end: Some("2024-03-02".to_string()),
            min: Some(String::new()),
            max: Some("3".to_string()),
            archive_type: Some("tar".to_string()),
        };
        let filter = PriceFilter::try_from(&query).unwrap();
        assert!(filter.date_range.is_some());
        assert!(filter.price_range.is_none());
    }
}
