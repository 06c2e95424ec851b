use crate::pool::{StoreError, open_pool};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use tessera_core::common::is_valid;
use tessera_core::market::entity::{Bar, RawBar, TimeSeries, Universe};
use tessera_core::market::error::MarketError;
use tessera_core::market::port::UniverseSource;
use tracing::{info, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS daily_bars (
    ts_code TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL,
    high REAL,
    low REAL,
    close REAL,
    vol REAL,
    amount REAL,
    PRIMARY KEY (ts_code, date)
);
"#;

// 数值列统一转为文本读出，由 RawBar 负责归一化
const SELECT_ALL: &str = r#"
SELECT ts_code, CAST(date AS TEXT),
       CAST(open AS TEXT), CAST(high AS TEXT), CAST(low AS TEXT),
       CAST(close AS TEXT), CAST(vol AS TEXT), CAST(amount AS TEXT)
FROM daily_bars
"#;

type Row = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn to_raw(row: Row) -> RawBar {
    RawBar {
        entity_id: row.0,
        date: row.1,
        open: row.2,
        high: row.3,
        low: row.4,
        close: row.5,
        volume: row.6,
        amount: row.7,
    }
}

fn finite(x: f64) -> Option<f64> {
    is_valid(x).then_some(x)
}

/// UniverseSource 的 SQLite 实现。
///
/// # Summary
/// 从日线表 `daily_bars (ts_code, date, open, high, low, close, vol, amount)` 读取全市场历史。
///
/// # Invariants
/// * 读出的原始行经 `RawBar::normalize` 归一化，日期非法的行被丢弃并记录告警。
pub struct SqliteUniverseSource {
    pool: SqlitePool,
}

impl SqliteUniverseSource {
    /// 打开 (必要时创建) 指定路径的行情库。
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let pool = open_pool(path.as_ref(), 4, SCHEMA).await?;
        Ok(Self { pool })
    }

    /// # Summary
    /// 写入单个标的的日线，已存在的日期被覆盖。
    ///
    /// # Logic
    /// 1. 开启事务，逐行 `INSERT OR REPLACE`，日期写为 `YYYYMMDD`。
    /// 2. NaN 数值写为 NULL。
    pub async fn save_bars(&self, entity_id: &str, bars: &[Bar]) -> Result<(), MarketError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        for bar in bars {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO daily_bars (ts_code, date, open, high, low, close, vol, amount)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entity_id)
            .bind(bar.date.format("%Y%m%d").to_string())
            .bind(finite(bar.open))
            .bind(finite(bar.high))
            .bind(finite(bar.low))
            .bind(finite(bar.close))
            .bind(finite(bar.volume))
            .bind(finite(bar.amount))
            .execute(&mut *tx)
            .await
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 原样写入文本形式的原始行，用于导入外部数据。
    pub async fn save_raw_bars(&self, rows: &[RawBar]) -> Result<(), MarketError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO daily_bars (ts_code, date, open, high, low, close, vol, amount)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.entity_id)
            .bind(&row.date)
            .bind(&row.open)
            .bind(&row.high)
            .bind(&row.low)
            .bind(&row.close)
            .bind(&row.volume)
            .bind(&row.amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, entity_id: Option<&str>) -> Result<Universe, MarketError> {
        let rows = match entity_id {
            Some(id) => {
                sqlx::query_as::<_, Row>(&format!("{} WHERE ts_code = ?", SELECT_ALL))
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => sqlx::query_as::<_, Row>(SELECT_ALL).fetch_all(&self.pool).await,
        }
        .map_err(|e| MarketError::Storage(e.to_string()))?;

        let (universe, dropped) = Universe::from_raw(rows.into_iter().map(to_raw));
        if dropped > 0 {
            warn!("Dropped {} daily bars with unparseable dates", dropped);
        }
        Ok(universe)
    }
}

#[async_trait]
impl UniverseSource for SqliteUniverseSource {
    async fn load_universe(&self) -> Result<Universe, MarketError> {
        let universe = self.fetch(None).await?;
        info!("Loaded universe snapshot of {} entities", universe.len());
        Ok(universe)
    }

    async fn load_series(&self, entity_id: &str) -> Result<Option<TimeSeries>, MarketError> {
        let universe = self.fetch(Some(entity_id)).await?;
        Ok(universe.get(entity_id).cloned())
    }
}
