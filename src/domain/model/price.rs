use crate::common::serde_fun::{deserialize_bigdecimal, serialize_bigdecimal_as_number};
use crate::domain::model::{AppError, AppResult};
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// 日期在 CSV 与查询参数中的统一格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 价格保留两位小数
pub const PRICE_SCALE: i64 = 2;

/// 超出该指数范围的价格直接视为非法，避免大数运算
const MAX_PRICE_EXPONENT: u64 = 64;

/// 一条商品价格记录（领域模型）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    /// 调用方提供的唯一标识
    pub id: i64,

    /// 商品名称
    pub name: String,

    /// 商品分类
    pub category: String,

    /// 价格，非负
    pub price: BigDecimal,

    /// 生效日期，不含时间
    pub create_date: NaiveDate,
}

/// prices 表查询模型
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::prices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceRow {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub create_date: NaiveDateTime,
}

/// 用于插入 prices 表的模型
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::prices)]
pub struct NewPriceRow<'a> {
    pub id: i64,
    pub name: &'a str,
    pub category: &'a str,
    pub price_cents: i64,
    pub create_date: NaiveDateTime,
}

impl From<PriceRow> for PriceRecord {
    fn from(row: PriceRow) -> Self {
        PriceRecord {
            id: row.id,
            name: row.name,
            category: row.category,
            price: cents_to_price(row.price_cents),
            create_date: row.create_date.date(),
        }
    }
}

impl<'a> TryFrom<&'a PriceRecord> for NewPriceRow<'a> {
    type Error = AppError;

    fn try_from(record: &'a PriceRecord) -> AppResult<Self> {
        let price_cents = price_to_cents(&record.price).ok_or_else(|| {
            AppError::InvalidInput(format!("price out of range for id {}", record.id))
        })?;
        Ok(NewPriceRow {
            id: record.id,
            name: &record.name,
            category: &record.category,
            price_cents,
            create_date: start_of_day(record.create_date),
        })
    }
}

/// 批次写入后回读的全库统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAggregates {
    pub total_items: i64,
    /// 因库中已有完全相同的记录而跳过的行数
    pub duplicates: i64,
    pub total_categories: i64,
    pub total_price: BigDecimal,
}

/// 单次上传的统计结果：批次维度与全库维度混合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub total_count: i64,
    pub duplicates_count: i64,
    pub total_items: i64,
    pub total_categories: i64,
    #[serde(
        serialize_with = "serialize_bigdecimal_as_number",
        deserialize_with = "deserialize_bigdecimal"
    )]
    pub total_price: BigDecimal,
}

/// 价格转换为整数分（四舍五入），超出 i64 范围时返回 `None`
pub fn price_to_cents(price: &BigDecimal) -> Option<i64> {
    let (_, exponent) = price.as_bigint_and_exponent();
    if exponent.unsigned_abs() > MAX_PRICE_EXPONENT {
        return None;
    }
    (price.clone() * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
}

pub fn cents_to_price(cents: i64) -> BigDecimal {
    BigDecimal::new(cents.into(), PRICE_SCALE)
}

/// 按整数分格式化，始终保留两位小数（`0` 输出为 `0.00`）
pub fn format_price(price: &BigDecimal) -> Option<String> {
    let cents = price_to_cents(price)?;
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    Some(format!("{}{}.{:02}", sign, abs / 100, abs % 100))
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn cents_conversion_rounds_half_up() {
        assert_eq!(price_to_cents(&dec("10")), Some(1000));
        assert_eq!(price_to_cents(&dec("0.125")), Some(13));
        assert_eq!(price_to_cents(&dec("1.004")), Some(100));
        assert_eq!(price_to_cents(&dec("1e30")), None);
        assert_eq!(price_to_cents(&dec("1e999999999")), None);
        assert_eq!(cents_to_price(1999), dec("19.99"));
    }

    #[test]
    fn price_is_always_formatted_with_two_digits() {
        let fmt = |s: &str| format_price(&dec(s)).unwrap();
        assert_eq!(fmt("10"), "10.00");
        assert_eq!(fmt("5.5"), "5.50");
        assert_eq!(fmt("3.14159"), "3.14");
        assert_eq!(fmt("0"), "0.00");
        assert_eq!(fmt("0.00"), "0.00");
        assert_eq!(fmt("0.004"), "0.00");
        assert_eq!(fmt("0.05"), "0.05");
        assert_eq!(fmt("-1.5"), "-1.50");
        assert_eq!(format_price(&cents_to_price(0)).unwrap(), "0.00");
        assert_eq!(format_price(&dec("1e30")), None);
    }

    #[test]
    fn row_conversion_keeps_date_and_price() {
        let record = PriceRecord {
            id: 7,
            name: "Milk".to_string(),
            category: "dairy".to_string(),
            price: dec("2.49"),
            create_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let new_row = NewPriceRow::try_from(&record).unwrap();
        assert_eq!(new_row.price_cents, 249);
        assert_eq!(new_row.create_date, start_of_day(record.create_date));

        let row = PriceRow {
            id: new_row.id,
            name: new_row.name.to_string(),
            category: new_row.category.to_string(),
            price_cents: new_row.price_cents,
            create_date: new_row.create_date,
        };
        assert_eq!(PriceRecord::from(row), record);
    }

    #[test]
    fn statistics_serialize_total_price_as_number() {
        let stats = PriceStatistics {
            total_count: 3,
            duplicates_count: 1,
            total_items: 10,
            total_categories: 2,
            total_price: dec("123.45"),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_count"], 3);
        assert_eq!(json["duplicates_count"], 1);
        assert_eq!(json["total_price"], serde_json::json!(123.45));
    }
}
