use crate::domain::model::price::{PriceStatistics, StoreAggregates};
use crate::ingest::parser::ParsedBatch;

/// 合并本次上传的计数与全库统计
///
/// `store` 必须在同一事务内、批次写入之后读取
pub fn assemble(batch: &ParsedBatch, store: &StoreAggregates) -> PriceStatistics {
    PriceStatistics {
        total_count: batch.total_count,
        duplicates_count: batch.duplicates_count,
        total_items: store.total_items,
        total_categories: store.total_categories,
        total_price: store.total_price.clone(),
    }
}
