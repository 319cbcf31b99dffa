//! 在途对账登记表
//!
//! 记录每个正在对账（排队、处理中或退避等待）的订单，
//! 保证同一订单同一时刻只有一个对账任务，并向运维暴露在途数量和明细。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use loyalty_shared::observability::metrics;
use serde::Serialize;

/// 在途订单快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InFlightEntry {
    pub order_number: String,
    pub user_id: i64,
    /// 已完成的尝试次数
    pub attempts: u32,
    pub since: DateTime<Utc>,
}

#[derive(Default)]
pub struct InFlightRegistry {
    entries: DashMap<String, InFlightEntry>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记订单；已在途时返回 false
    pub fn try_register(&self, order_number: &str, user_id: i64) -> bool {
        let registered = match self.entries.entry(order_number.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(InFlightEntry {
                    order_number: order_number.to_string(),
                    user_id,
                    attempts: 0,
                    since: Utc::now(),
                });
                true
            }
        };
        if registered {
            metrics::set_reconciliation_in_flight(self.entries.len());
        }
        registered
    }

    pub fn record_attempt(&self, order_number: &str, attempts: u32) {
        if let Some(mut entry) = self.entries.get_mut(order_number) {
            entry.attempts = attempts;
        }
    }

    pub fn release(&self, order_number: &str) {
        if self.entries.remove(order_number).is_some() {
            metrics::set_reconciliation_in_flight(self.entries.len());
        }
    }

    pub fn contains(&self, order_number: &str) -> bool {
        self.entries.contains_key(order_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按登记时间排序的在途明细
    pub fn snapshot(&self) -> Vec<InFlightEntry> {
        let mut entries: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.since.cmp(&b.since));
        entries
    }
}
