use crate::strategy::error::StrategyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// # Summary
/// 策略参数的标量或列表取值。
///
/// # Invariants
/// - JSON 无标签表示，`5` 解析为 `Int`，`5.5` 解析为 `Float`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

// 2^53，超过该范围的浮点整数不再精确，不做归一
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

impl ParamValue {
    /// # Summary
    /// 返回语义等价的规范形式。
    ///
    /// # Logic
    /// 1. 值为整数且在精确范围内的浮点数转为 `Int`，使 `5` 与 `5.0` 等价。
    /// 2. 列表逐元素递归规范化。
    #[allow(clippy::cast_possible_truncation)]
    pub fn canonical(&self) -> ParamValue {
        match self {
            ParamValue::Float(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_FLOAT_INT => {
                ParamValue::Int(*v as i64)
            }
            ParamValue::List(items) => {
                ParamValue::List(items.iter().map(ParamValue::canonical).collect())
            }
            other => other.clone(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.canonical() {
            ParamValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// # Summary
/// 策略参数映射，参数名到取值。
///
/// # Invariants
/// - 底层为 `BTreeMap`，键天然有序，插入顺序不影响序列化结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, ParamValue>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式追加参数
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// # Summary
    /// 以 `defaults` 为底合并显式参数，显式参数优先。
    pub fn merged_over(&self, defaults: &StrategyParams) -> StrategyParams {
        let mut merged = defaults.0.clone();
        for (k, v) in &self.0 {
            merged.insert(k.clone(), v.clone());
        }
        StrategyParams(merged)
    }

    /// 所有取值规范化后的副本
    pub fn canonical(&self) -> StrategyParams {
        StrategyParams(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.canonical()))
                .collect(),
        )
    }

    /// # Summary
    /// 读取正整数参数 (窗口长度、周期等)。
    ///
    /// # Returns
    /// 缺失、非整数或非正数均返回 `StrategyError::UnsupportedParameter`。
    pub fn positive_int(&self, key: &str) -> Result<usize, StrategyError> {
        let value = self
            .get(key)
            .ok_or_else(|| StrategyError::unsupported(key, "missing"))?;
        value
            .as_i64()
            .filter(|v| *v > 0)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| StrategyError::unsupported(key, "expected a positive integer"))
    }

    /// 读取非负整数参数 (位移量等，允许为零)
    pub fn non_negative_int(&self, key: &str) -> Result<usize, StrategyError> {
        let value = self
            .get(key)
            .ok_or_else(|| StrategyError::unsupported(key, "missing"))?;
        value
            .as_i64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| StrategyError::unsupported(key, "expected a non-negative integer"))
    }

    /// 读取正整数列表参数
    pub fn positive_int_list(&self, key: &str) -> Result<Vec<usize>, StrategyError> {
        match self.get(key) {
            Some(ParamValue::List(items)) if !items.is_empty() => items
                .iter()
                .map(|item| {
                    item.as_i64()
                        .filter(|v| *v > 0)
                        .and_then(|v| usize::try_from(v).ok())
                        .ok_or_else(|| {
                            StrategyError::unsupported(key, "expected positive integers")
                        })
                })
                .collect(),
            Some(_) => Err(StrategyError::unsupported(
                key,
                "expected a non-empty list",
            )),
            None => Err(StrategyError::unsupported(key, "missing")),
        }
    }

    /// 读取文本参数
    pub fn text(&self, key: &str) -> Result<&str, StrategyError> {
        self.get(key)
            .ok_or_else(|| StrategyError::unsupported(key, "missing"))?
            .as_str()
            .ok_or_else(|| StrategyError::unsupported(key, "expected a string"))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for StrategyParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        StrategyParams(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// 输出列：列名到与输入序列逐行对齐的数值，`None` 代表 "无值"
pub type Columns = BTreeMap<String, Vec<Option<f64>>>;

/// 未显式配置的输出所使用的默认颜色
pub const DEFAULT_OUTPUT_COLOR: &str = "#FFA500";

/// # Summary
/// 单个输出序列的图形类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Line,
    Bar,
}

/// # Summary
/// 单个输出序列的可视化描述。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "type")]
    pub kind: OutputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub name: String,
    pub order: i32,
    // 按数值正负着色的柱状图引用的列名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_color_from: Option<String>,
}

impl OutputConfig {
    pub fn line(name: impl Into<String>, color: &str, order: i32) -> Self {
        Self {
            kind: OutputKind::Line,
            color: Some(color.to_string()),
            name: name.into(),
            order,
            use_color_from: None,
        }
    }

    pub fn bar(name: impl Into<String>, color: Option<&str>, order: i32) -> Self {
        Self {
            kind: OutputKind::Bar,
            color: color.map(str::to_string),
            name: name.into(),
            order,
            use_color_from: None,
        }
    }

    /// 未显式配置时的兜底描述：`{type: line, color: #FFA500, name: <列名>, order: 1}`
    pub fn fallback(output_name: &str) -> Self {
        Self::line(output_name, DEFAULT_OUTPUT_COLOR, 1)
    }
}

/// # Summary
/// 策略整体的图表分组描述。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub chart_group: String,
    pub chart_name: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputConfig>,
}

impl ChartConfig {
    pub fn new(chart_group: impl Into<String>, chart_name: impl Into<String>) -> Self {
        Self {
            chart_group: chart_group.into(),
            chart_name: chart_name.into(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, config: OutputConfig) -> Self {
        self.outputs.insert(key.into(), config);
        self
    }
}

/// # Summary
/// 缓存中保存的策略结果文档。
///
/// # Invariants
/// - `config.outputs` 的键集合与 `data` 的键集合一致 (由引擎打包时保证)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutput {
    pub data: Columns,
    pub config: ChartConfig,
}

/// # Summary
/// 策略的计算拓扑。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    // 只需单个标的数据
    SelfBased,
    // 需要全市场按日期联合计算
    CrossBased,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::SelfBased => write!(f, "self_based"),
            Topology::CrossBased => write!(f, "cross_based"),
        }
    }
}

/// # Summary
/// 自身型策略一次计算的结果：输出列与实际生效的参数。
#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub columns: Columns,
    pub params: StrategyParams,
}

/// # Summary
/// 截面型策略一次全市场计算的结果。
///
/// # Invariants
/// - 每个标的的输出列与该标的序列逐行对齐。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossComputation {
    pub params: StrategyParams,
    by_entity: BTreeMap<String, Columns>,
}

impl CrossComputation {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            params,
            by_entity: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, entity_id: impl Into<String>, columns: Columns) {
        self.by_entity.insert(entity_id.into(), columns);
    }

    /// 切出单个标的的结果
    pub fn slice(&self, entity_id: &str) -> Option<Columns> {
        self.by_entity.get(entity_id).cloned()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.by_entity.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_explicit_wins() {
        let defaults = StrategyParams::new().with("period", 5i64).with("column", "close");
        let explicit = StrategyParams::new().with("period", 14i64);
        let merged = explicit.merged_over(&defaults);
        assert_eq!(merged.positive_int("period").unwrap(), 14);
        assert_eq!(merged.text("column").unwrap(), "close");
    }

    #[test]
    fn test_param_accessors_reject_bad_values() {
        let params = StrategyParams::new()
            .with("zero", 0i64)
            .with("float", 2.5)
            .with("whole", 3.0)
            .with("list", vec![5i64, 10]);
        assert!(params.positive_int("zero").is_err());
        assert!(params.positive_int("float").is_err());
        assert!(params.positive_int("missing").is_err());
        assert_eq!(params.positive_int("whole").unwrap(), 3);
        assert_eq!(params.positive_int_list("list").unwrap(), vec![5, 10]);
        assert!(params.positive_int_list("zero").is_err());
    }

    #[test]
    fn test_non_negative_int_accepts_zero() {
        let params = StrategyParams::new()
            .with("zero", 0i64)
            .with("negative", -1i64)
            .with("float", 0.5);
        assert_eq!(params.non_negative_int("zero").unwrap(), 0);
        assert!(params.non_negative_int("negative").is_err());
        assert!(params.non_negative_int("float").is_err());
        assert!(params.non_negative_int("missing").is_err());
    }

    #[test]
    fn test_untagged_param_value_json() {
        let params: StrategyParams =
            serde_json::from_str(r#"{"a": 5, "b": 5.5, "c": "x", "d": [1, 2], "e": true}"#)
                .unwrap();
        assert_eq!(params.get("a"), Some(&ParamValue::Int(5)));
        assert_eq!(params.get("b"), Some(&ParamValue::Float(5.5)));
        assert_eq!(params.get("c"), Some(&ParamValue::Text("x".into())));
        assert_eq!(params.get("e"), Some(&ParamValue::Bool(true)));
    }

    #[test]
    fn test_output_config_serialization() {
        let json = serde_json::to_value(OutputConfig::fallback("rsi")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "line", "color": "#FFA500", "name": "rsi", "order": 1})
        );
    }
}
