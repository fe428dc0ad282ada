/// 交易对符号池
///
/// 同一个符号在行情帧、订单簿、处理通道、事件中反复出现。
/// 符号池保证每个交易对只分配一次 `Arc<str>`，之后只做原子增量克隆，
/// 同时可以用 `Arc::ptr_eq` 判等。
///
/// - 命中：读锁 + Arc克隆
/// - 未命中：写锁 + 一次堆分配

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SymbolPool {
    symbols: RwLock<HashMap<Arc<str>, ()>>,
}

impl SymbolPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回共享的 `Arc<str>`，首次出现时插入
    #[inline]
    pub fn intern(&self, symbol: &str) -> Arc<str> {
        if let Some((key, _)) = self.symbols.read().get_key_value(symbol) {
            return key.clone();
        }

        // 获取写锁期间可能已被其他线程插入
        let mut symbols = self.symbols.write();
        if let Some((key, _)) = symbols.get_key_value(symbol) {
            return key.clone();
        }
        let key: Arc<str> = Arc::from(symbol);
        symbols.insert(key.clone(), ());
        key
    }

    /// 已存在时返回，不插入
    pub fn get(&self, symbol: &str) -> Option<Arc<str>> {
        self.symbols
            .read()
            .get_key_value(symbol)
            .map(|(key, _)| key.clone())
    }

    /// 取消订阅后释放符号
    pub fn release(&self, symbol: &str) -> bool {
        self.symbols.write().remove(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}
