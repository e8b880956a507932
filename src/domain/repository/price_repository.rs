use crate::common::VecConvert;
use crate::domain::model::price::{cents_to_price, NewPriceRow, PriceRecord, PriceRow, StoreAggregates};
use crate::domain::model::{AppError, AppResult};
use crate::domain::repository::{BatchRepository, FilterableRepository, Repository};
use crate::ingest::filter::PriceFilter;
use crate::schema::prices;
use crate::util::check_deadline;
use diesel::sql_types::BigInt;
use diesel::{
    ExpressionMethods, QueryDsl, QueryableByName, RunQueryDsl, SelectableHelper, SqliteConnection,
};
use std::time::Instant;
use tracing::{debug, info};

const CALCULATE_STATS_QUERY: &str = r#"
    SELECT
        COUNT(*) AS total_items,
        COUNT(DISTINCT category) AS total_categories,
        COALESCE(SUM(price_cents), 0) AS total_price_cents
    FROM prices
"#;

#[derive(Debug, QueryableByName)]
struct StoreTotals {
    #[diesel(sql_type = BigInt)]
    total_items: i64,
    #[diesel(sql_type = BigInt)]
    total_categories: i64,
    #[diesel(sql_type = BigInt)]
    total_price_cents: i64,
}

// price_repository
pub struct PriceRepository<'a> {
    pub conn: &'a mut SqliteConnection,
}

impl<'a> PriceRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        Self { conn }
    }
}

impl<'a> Repository<PriceRecord> for PriceRepository<'a> {
    fn get_all(&mut self) -> AppResult<Vec<PriceRecord>> {
        let rows = prices::table
            .select(PriceRow::as_select())
            .order(prices::id.asc())
            .load::<PriceRow>(self.conn)?;
        Ok(rows.convert_vec())
    }

    fn count(&mut self) -> AppResult<i64> {
        prices::table
            .count()
            .get_result::<i64>(self.conn)
            .map_err(AppError::from)
    }
}

impl<'a> FilterableRepository<PriceFilter, PriceRecord> for PriceRepository<'a> {
    fn get_filtered(&mut self, filter: &PriceFilter) -> AppResult<Vec<PriceRecord>> {
        if filter.is_unfiltered() {
            return self.get_all();
        }

        // 所有边界值都以绑定参数传入
        let mut q = prices::table.select(PriceRow::as_select()).into_boxed();

        if let Some(range) = &filter.date_range {
            q = q.filter(
                prices::create_date.between(range.start_bound(), range.end_bound()),
            );
        }

        if let Some(range) = &filter.price_range {
            q = q.filter(prices::price_cents.between(range.min_cents, range.max_cents));
        }

        let rows = q.order(prices::id.asc()).load::<PriceRow>(self.conn)?;
        debug!(rows = rows.len(), ?filter, "filtered prices loaded");
        Ok(rows.convert_vec())
    }
}

impl<'a> BatchRepository<PriceRecord> for PriceRepository<'a> {
    type Aggregates = StoreAggregates;

    fn insert_and_aggregate(
        &mut self,
        records: &[PriceRecord],
        deadline: Option<Instant>,
    ) -> AppResult<StoreAggregates> {
        // immediate 事务在开始时即获取写锁，查重与插入对并发导入是原子的
        self.conn.immediate_transaction(|conn| {
            let mut inserted = 0usize;
            let mut duplicates = 0i64;

            for record in records {
                check_deadline(deadline)?;
                let row = NewPriceRow::try_from(record)?;

                let existing = prices::table
                    .filter(prices::name.eq(row.name))
                    .filter(prices::category.eq(row.category))
                    .filter(prices::price_cents.eq(row.price_cents))
                    .filter(prices::create_date.eq(row.create_date))
                    .count()
                    .get_result::<i64>(conn)?;
                if existing > 0 {
                    duplicates += 1;
                    continue;
                }

                // 仅忽略主键冲突，约束失败仍须中止整个批次
                inserted += diesel::insert_into(prices::table)
                    .values(&row)
                    .on_conflict(prices::id)
                    .do_nothing()
                    .execute(conn)?;
            }

            check_deadline(deadline)?;
            let totals = diesel::sql_query(CALCULATE_STATS_QUERY).get_result::<StoreTotals>(conn)?;

            info!(
                batch = records.len(),
                inserted,
                store_duplicates = duplicates,
                total_items = totals.total_items,
                "price batch committed"
            );
            Ok(StoreAggregates {
                total_items: totals.total_items,
                duplicates,
                total_categories: totals.total_categories,
                total_price: cents_to_price(totals.total_price_cents),
            })
        })
    }
}
