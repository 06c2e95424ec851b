//! 参数规范化与缓存键摘要。

use crate::strategy::entity::{ParamValue, StrategyParams};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// 参数摘要：规范化 JSON 的 SHA-256 十六进制串
pub type ParamsHash = String;

fn to_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Bool(b) => Value::Bool(*b),
        ParamValue::Int(i) => Value::from(*i),
        ParamValue::Float(f) => Value::from(*f),
        ParamValue::Text(s) => Value::String(s.clone()),
        ParamValue::List(items) => Value::Array(items.iter().map(to_json).collect()),
    }
}

/// # Summary
/// 生成参数的规范化 JSON 表示，作为摘要输入。
///
/// # Logic
/// 1. 对所有取值做规范化 (整数值浮点数归一为整数)。
/// 2. 按键名升序写出紧凑 JSON。
pub fn canonical_json(params: &StrategyParams) -> String {
    let mut map = Map::new();
    for (key, value) in params.canonical().iter() {
        map.insert(key.clone(), to_json(value));
    }
    Value::Object(map).to_string()
}

/// # Summary
/// 计算参数摘要。
///
/// # Invariants
/// - 与插入顺序无关；语义相同的参数集合得到相同摘要。
pub fn params_hash(params: &StrategyParams) -> ParamsHash {
    hex::encode(Sha256::digest(canonical_json(params).as_bytes()))
}
