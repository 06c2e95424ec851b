use crate::strategy::port::Strategy;
use std::collections::HashMap;
use thiserror::Error;

/// # Summary
/// 注册表错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    // 名称未注册
    #[error("Strategy not found: {0}")]
    NotFound(String),
    // 名称重复注册
    #[error("Strategy already registered: {0}")]
    Duplicate(String),
}

/// # Summary
/// 进程级策略目录，名称到策略实例的映射。
///
/// # Invariants
/// - 名称大小写不敏感，统一以小写存储与查找。
/// - 进程启动时一次性构建，之后通过 `Arc<StrategyRegistry>` 只读共享，生命周期内不再变化。
/// - `list()` 保持注册顺序。
#[derive(Debug, Default, Clone)]
pub struct StrategyRegistry {
    by_name: HashMap<String, Strategy>,
    order: Vec<String>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Summary
    /// 由一组策略构建注册表。
    ///
    /// # Returns
    /// 出现重复名称时返回 `RegistryError::Duplicate`。
    pub fn from_strategies(
        strategies: impl IntoIterator<Item = Strategy>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for strategy in strategies {
            registry.register(strategy)?;
        }
        Ok(registry)
    }

    /// 注册单个策略
    pub fn register(&mut self, strategy: Strategy) -> Result<(), RegistryError> {
        let key = strategy.name().to_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(RegistryError::Duplicate(key));
        }
        self.order.push(key.clone());
        self.by_name.insert(key, strategy);
        Ok(())
    }

    /// 按名称查找 (大小写不敏感)
    pub fn get(&self, name: &str) -> Result<Strategy, RegistryError> {
        self.by_name
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// 按注册顺序列出全部名称
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// 按注册顺序遍历全部策略
    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::entity::TimeSeries;
    use crate::strategy::entity::{ChartConfig, Computation, StrategyParams, Topology};
    use crate::strategy::error::StrategyError;
    use crate::strategy::port::{SelfBasedStrategy, StrategyMeta};

    struct Named(&'static str);

    impl StrategyMeta for Named {
        fn name(&self) -> &'static str {
            self.0
        }
        fn default_parameters(&self) -> StrategyParams {
            StrategyParams::new()
        }
        fn chart_config(&self, _: &StrategyParams) -> ChartConfig {
            ChartConfig::new(self.0, self.0)
        }
    }

    impl SelfBasedStrategy for Named {
        fn compute(
            &self,
            _: &TimeSeries,
            params: &StrategyParams,
        ) -> Result<Computation, StrategyError> {
            Ok(Computation {
                columns: Default::default(),
                params: params.clone(),
            })
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry =
            StrategyRegistry::from_strategies(vec![Strategy::self_based(Named("macd"))]).unwrap();
        assert_eq!(registry.get("MACD").unwrap().name(), "macd");
        assert_eq!(registry.get("macd").unwrap().topology(), Topology::SelfBased);
        assert_eq!(
            registry.get("kdj").unwrap_err(),
            RegistryError::NotFound("kdj".into())
        );
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let registry = StrategyRegistry::from_strategies(vec![
            Strategy::self_based(Named("rsi")),
            Strategy::self_based(Named("macd")),
            Strategy::self_based(Named("ma")),
        ])
        .unwrap();
        assert_eq!(registry.list(), vec!["rsi", "macd", "ma"]);
        assert_eq!(registry.strategies().count(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = StrategyRegistry::from_strategies(vec![
            Strategy::self_based(Named("rsi")),
            Strategy::self_based(Named("rsi")),
        ]);
        assert_eq!(result.unwrap_err(), RegistryError::Duplicate("rsi".into()));
    }
}
