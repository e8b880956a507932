use crate::domain::model::AppResult;
use std::time::Instant;

pub mod price_repository;

// 定义 Repository trait
pub trait Repository<T> {
    /// 按 id 升序返回全部记录
    fn get_all(&mut self) -> AppResult<Vec<T>>;
    fn count(&mut self) -> AppResult<i64>;
}

pub trait FilterableRepository<F, T> {
    fn get_filtered(&mut self, filter: &F) -> AppResult<Vec<T>>;
}

/// 工作单元：同一事务内写入批次，再读取全库统计
pub trait BatchRepository<T> {
    type Aggregates;

    /// 任一步骤失败或提交前超过 `deadline` 时整体回滚
    fn insert_and_aggregate(
        &mut self,
        items: &[T],
        deadline: Option<Instant>,
    ) -> AppResult<Self::Aggregates>;
}
