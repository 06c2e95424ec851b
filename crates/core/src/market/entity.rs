use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// # Summary
/// 单根日线数据实体。
///
/// # Invariants
/// - 无效数值 (缺失、非数字、非有限值) 统一以 `f64::NAN` 表示，由各策略自行剔除或补零。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    // 交易日
    pub date: NaiveDate,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 成交量
    pub volume: f64,
    // 成交额
    pub amount: f64,
}

impl Bar {
    /// 按字段名读取数值
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
            Field::Amount => self.amount,
        }
    }
}

/// # Summary
/// 日线数值字段枚举，供带 `column` 参数的策略选择输入列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
    Amount,
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Field::Open),
            "high" => Ok(Field::High),
            "low" => Ok(Field::Low),
            "close" => Ok(Field::Close),
            "volume" | "vol" => Ok(Field::Volume),
            "amount" => Ok(Field::Amount),
            _ => Err(format!("Unknown column: {}", s)),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Open => write!(f, "open"),
            Field::High => write!(f, "high"),
            Field::Low => write!(f, "low"),
            Field::Close => write!(f, "close"),
            Field::Volume => write!(f, "volume"),
            Field::Amount => write!(f, "amount"),
        }
    }
}

/// # Summary
/// 存储层读出的原始行，数值以文本形式保留，等待 SNAPSHOT 阶段归一化。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBar {
    pub entity_id: String,
    pub date: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
    pub amount: Option<String>,
}

impl RawBar {
    /// # Summary
    /// 将原始行归一化为 `Bar`。
    ///
    /// # Logic
    /// 1. 日期支持 `YYYYMMDD` 与 `YYYY-MM-DD` 两种格式，无法解析时返回 None。
    /// 2. 数值按 `f64` 解析，缺失、非数字或非有限值记为 NaN。
    ///
    /// # Returns
    /// 日期合法时返回 `Some(Bar)`。
    pub fn normalize(&self) -> Option<Bar> {
        let date = parse_date(&self.date)?;
        Some(Bar {
            date,
            open: parse_number(self.open.as_deref()),
            high: parse_number(self.high.as_deref()),
            low: parse_number(self.low.as_deref()),
            close: parse_number(self.close.as_deref()),
            volume: parse_number(self.volume.as_deref()),
            amount: parse_number(self.amount.as_deref()),
        })
    }
}

/// 解析 `YYYYMMDD` 或 `YYYY-MM-DD` 日期
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn parse_number(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}

/// # Summary
/// 单个标的的有序时间序列。
///
/// # Invariants
/// - `bars` 按日期严格升序且日期唯一，由构造函数保证。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    entity_id: String,
    bars: Vec<Bar>,
}

impl TimeSeries {
    /// # Summary
    /// 构造时间序列。
    ///
    /// # Logic
    /// 1. 按日期稳定排序。
    /// 2. 同一日期出现多次时保留最后一行。
    pub fn new(entity_id: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            entity_id: entity_id.into(),
            bars: deduped,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// 抽取指定字段的数值列
    pub fn column(&self, field: Field) -> Vec<f64> {
        self.bars.iter().map(|b| b.get(field)).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }
}

/// # Summary
/// 全市场标的集合，供截面型策略按日期联合计算。
///
/// # Invariants
/// - 每个标的最多一条序列，按标的代码有序。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    series: BTreeMap<String, TimeSeries>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Summary
    /// 由原始行构建全市场集合。
    ///
    /// # Logic
    /// 1. 逐行归一化，日期非法的行被丢弃并计数。
    /// 2. 按标的分组后构造 `TimeSeries`。
    ///
    /// # Returns
    /// `(Universe, 被丢弃的行数)`
    pub fn from_raw(rows: impl IntoIterator<Item = RawBar>) -> (Self, usize) {
        let mut grouped: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        let mut dropped = 0usize;
        for row in rows {
            match row.normalize() {
                Some(bar) => grouped.entry(row.entity_id).or_default().push(bar),
                None => dropped += 1,
            }
        }
        let universe = grouped
            .into_iter()
            .map(|(id, bars)| TimeSeries::new(id, bars))
            .collect();
        (universe, dropped)
    }

    pub fn insert(&mut self, series: TimeSeries) {
        self.series.insert(series.entity_id().to_string(), series);
    }

    pub fn get(&self, entity_id: &str) -> Option<&TimeSeries> {
        self.series.get(entity_id)
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeries> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// 仅保留行数不少于 `min_rows` 的标的
    pub fn eligible(&self, min_rows: usize) -> Universe {
        self.series
            .values()
            .filter(|s| s.len() >= min_rows)
            .cloned()
            .collect()
    }
}

impl FromIterator<TimeSeries> for Universe {
    fn from_iter<I: IntoIterator<Item = TimeSeries>>(iter: I) -> Self {
        let mut universe = Universe::new();
        for series in iter {
            universe.insert(series);
        }
        universe
    }
}
