use crate::domain::model::price::{format_price, price_to_cents, PriceRecord, DATE_FORMAT};
use crate::domain::model::{AppError, AppResult};
use bigdecimal::num_bigint::Sign;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashSet;
use std::io::Read;
use std::str::FromStr;
use tracing::debug;

/// 导出 CSV 的固定表头
pub const HEADER: [&str; 5] = ["id", "name", "category", "price", "create_date"];

const EXPECTED_COLUMNS: usize = HEADER.len();

/// 单次解析结果，仅在当前请求内有效
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedBatch {
    /// 合法记录：每个 id 首次出现的行，保持输入顺序
    pub records: Vec<PriceRecord>,
    /// 成功切分的行数（无论是否合法）
    pub total_count: i64,
    /// 本次上传内 id 重复而被丢弃的行数
    pub duplicates_count: i64,
}

/// 解析 CSV 负载，首行为至少五列的表头
///
/// 无法切分的行直接跳过且不计数；能切分但校验失败的行计入 `total_count` 后丢弃。
pub fn parse<R: Read>(input: R) -> AppResult<ParsedBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let mut rows = reader.records();

    let header = match rows.next() {
        None => return Ok(ParsedBatch::default()),
        Some(Err(err)) => return Err(AppError::InvalidHeader(err.to_string())),
        Some(Ok(header)) => header,
    };
    if header.len() < EXPECTED_COLUMNS {
        return Err(AppError::InvalidHeader(format!(
            "expected at least {} columns, got {}",
            EXPECTED_COLUMNS,
            header.len()
        )));
    }

    let mut batch = ParsedBatch::default();
    let mut seen_ids = HashSet::new();

    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                debug!(error = %err, "skipping malformed csv row");
                continue;
            }
        };
        batch.total_count += 1;

        let Some(record) = validate_row(&row) else {
            continue;
        };
        if !seen_ids.insert(record.id) {
            batch.duplicates_count += 1;
            continue;
        }
        batch.records.push(record);
    }

    debug!(
        total = batch.total_count,
        accepted = batch.records.len(),
        duplicates = batch.duplicates_count,
        "csv parsed"
    );
    Ok(batch)
}

fn validate_row(row: &StringRecord) -> Option<PriceRecord> {
    if row.len() < EXPECTED_COLUMNS {
        return None;
    }

    let id = row[0].trim().parse::<i64>().ok()?;

    let (name, category) = (&row[1], &row[2]);
    if name.trim().is_empty() || category.trim().is_empty() {
        return None;
    }

    let price = BigDecimal::from_str(row[3].trim()).ok()?;
    if price.sign() == Sign::Minus {
        return None;
    }
    // 必须能落库为整数分
    price_to_cents(&price)?;

    let create_date = NaiveDate::parse_from_str(row[4].trim(), DATE_FORMAT).ok()?;

    Some(PriceRecord {
        id,
        name: name.to_string(),
        category: category.to_string(),
        price,
        create_date,
    })
}

/// [`parse`] 的逆操作：固定表头，价格两位小数，日期 `YYYY-MM-DD`
pub fn serialize(records: &[PriceRecord]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(write_failed)?;

    for record in records {
        let id = record.id.to_string();
        let price = format_price(&record.price).ok_or_else(|| {
            AppError::Internal(format!("price out of range for id {}", record.id))
        })?;
        let date = record.create_date.format(DATE_FORMAT).to_string();
        writer
            .write_record([
                id.as_str(),
                record.name.as_str(),
                record.category.as_str(),
                price.as_str(),
                date.as_str(),
            ])
            .map_err(write_failed)?;
    }

    writer.into_inner().map_err(write_failed)
}

fn write_failed<E: std::fmt::Display>(err: E) -> AppError {
    AppError::Internal(format!("failed to write csv: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::price::{cents_to_price, price_to_cents};

    fn record(id: i64, name: &str, category: &str, price: &str, date: (i32, u32, u32)) -> PriceRecord {
        PriceRecord {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price: BigDecimal::from_str(price).unwrap(),
            create_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        }
    }

    #[test]
    fn duplicate_and_invalid_rows_are_counted() {
        let csv = "id,name,category,price,create_date\n\
                   1,A,cat,10.00,2024-01-01\n\
                   1,B,cat,5.00,2024-01-02\n\
                   x,C,cat,1,2024-01-01\n";
        let batch = parse(csv.as_bytes()).unwrap();

        assert_eq!(batch.total_count, 3);
        assert_eq!(batch.duplicates_count, 1);
        assert_eq!(batch.records, vec![record(1, "A", "cat", "10.00", (2024, 1, 1))]);
    }

    #[test]
    fn short_header_is_rejected() {
        let csv = "id,name,category,price\n1,A,cat,10.00\n";
        assert!(matches!(parse(csv.as_bytes()), Err(AppError::InvalidHeader(_))));
    }

    #[test]
    fn header_only_and_empty_payloads_yield_nothing() {
        let header_only = parse("id,name,category,price,create_date\n".as_bytes()).unwrap();
        assert_eq!(header_only, ParsedBatch::default());

        let empty = parse("".as_bytes()).unwrap();
        assert_eq!(empty, ParsedBatch::default());
    }

    #[test]
    fn header_contents_are_not_checked() {
        let csv = "a,b,c,d,e,f\n5,Tea,drinks,3.50,2024-02-29\n";
        let batch = parse(csv.as_bytes()).unwrap();
        assert_eq!(batch.records, vec![record(5, "Tea", "drinks", "3.50", (2024, 2, 29))]);
    }

    #[test]
    fn short_rows_count_toward_total() {
        let csv = "id,name,category,price,create_date\n\
                   1,A,cat\n\
                   2,B,cat,1.00,2024-01-01\n";
        let batch = parse(csv.as_bytes()).unwrap();
        assert_eq!(batch.total_count, 2);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, 2);
    }

    #[test]
    fn untokenizable_rows_are_not_counted() {
        let mut csv = b"id,name,category,price,create_date\n".to_vec();
        csv.extend_from_slice(b"1,\xff\xfe,cat,1.00,2024-01-01\n");
        csv.extend_from_slice(b"2,B,cat,1.00,2024-01-01\n");

        let batch = parse(csv.as_slice()).unwrap();
        assert_eq!(batch.total_count, 1);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, 2);
    }

    #[test]
    fn field_validation_drops_bad_rows() {
        let csv = "id,name,category,price,create_date\n\
                   1,,cat,1.00,2024-01-01\n\
                   2,A,  ,1.00,2024-01-01\n\
                   3,A,cat,-1.00,2024-01-01\n\
                   4,A,cat,abc,2024-01-01\n\
                   5,A,cat,1.00,01/02/2024\n\
                   6,A,cat,1.00,2024-13-01\n\
                   7,A,cat,1e999999999,2024-01-01\n\
                   8,A,cat,1.00,2024-01-01\n";
        let batch = parse(csv.as_bytes()).unwrap();
        assert_eq!(batch.total_count, 8);
        assert_eq!(batch.duplicates_count, 0);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, 8);
    }

    #[test]
    fn numeric_fields_are_trimmed_and_extra_columns_ignored() {
        let csv = "id,name,category,price,create_date,extra\n \
                   9 ,Bread,bakery, 2.5 , 2024-05-06 ,whatever\n";
        let batch = parse(csv.as_bytes()).unwrap();
        assert_eq!(batch.records, vec![record(9, "Bread", "bakery", "2.5", (2024, 5, 6))]);
    }

    #[test]
    fn output_keeps_input_order() {
        let csv = "id,name,category,price,create_date\n\
                   3,C,x,1,2024-01-01\n\
                   1,A,x,1,2024-01-01\n\
                   3,D,x,1,2024-01-01\n\
                   2,B,x,1,2024-01-01\n";
        let ids: Vec<i64> = parse(csv.as_bytes()).unwrap().records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn serialize_uses_fixed_header_and_formats() {
        let out = serialize(&[record(1, "Apple", "fruit", "1.5", (2024, 1, 9))]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,name,category,price,create_date\n1,Apple,fruit,1.50,2024-01-09\n"
        );
    }

    #[test]
    fn zero_price_keeps_two_decimals() {
        let records = vec![record(1, "Free", "x", "0", (2024, 1, 1))];
        let out = serialize(&records).unwrap();
        assert_eq!(
            String::from_utf8(out.clone()).unwrap(),
            "id,name,category,price,create_date\n1,Free,x,0.00,2024-01-01\n"
        );

        let batch = parse(out.as_slice()).unwrap();
        assert_eq!(batch.records, records);
    }

    #[test]
    fn serialize_then_parse_reproduces_records() {
        let records = vec![
            record(1, "Apple", "fruit", "1.5", (2024, 1, 9)),
            record(2, "Cheese, aged", "dairy \"premium\"", "12.345", (2023, 12, 31)),
            record(3, " padded ", "misc", "0", (2020, 2, 29)),
            record(-4, "Negative id", "misc", "99999.99", (1999, 7, 1)),
        ];

        let batch = parse(serialize(&records).unwrap().as_slice()).unwrap();
        assert_eq!(batch.total_count, records.len() as i64);
        assert_eq!(batch.duplicates_count, 0);

        let expected: Vec<PriceRecord> = records
            .into_iter()
            .map(|r| PriceRecord { price: cents_to_price(price_to_cents(&r.price).unwrap()), ..r })
            .collect();
        assert_eq!(batch.records, expected);
    }
}
