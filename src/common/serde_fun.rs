use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

/// BigDecimal 以 JSON 数字输出（精度超出 f64 时退化为字符串）
pub fn serialize_bigdecimal_as_number<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value.to_f64() {
        Some(f) if f.is_finite() => serializer.serialize_f64(f),
        _ => serializer.serialize_str(&value.to_string()),
    }
}

/// 兼容字符串与数字两种输入的 BigDecimal 反序列化
pub fn deserialize_bigdecimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BigDecimalRaw {
        String(String),
        Float(f64),
    }

    match BigDecimalRaw::deserialize(deserializer)? {
        BigDecimalRaw::String(s) => BigDecimal::from_str(s.trim()).map_err(serde::de::Error::custom),
        BigDecimalRaw::Float(f) => {
            let s = f.to_string(); // 间接转换以保证精度
            BigDecimal::from_str(&s).map_err(serde::de::Error::custom)
        }
    }
}
