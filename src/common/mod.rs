pub mod serde_fun;

/// 通用批量转换 trait，支持将 `Vec<T>` 转换为 `Vec<U>`，前提是 `U: From<T>`
pub trait VecConvert<T, U> {
    fn convert_vec(self) -> Vec<U>;
}

impl<T, U> VecConvert<T, U> for Vec<T>
where
    U: From<T>,
{
    fn convert_vec(self) -> Vec<U> {
        self.into_iter().map(U::from).collect()
    }
}
