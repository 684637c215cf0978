//! Queue-backed order intake.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::domain::SwapRequest;
use crate::ports::OrderSource;

/// Orders pushed in-process (config file, operator API, tests).
#[derive(Default)]
pub struct StaticOrderSource {
    queue: Mutex<VecDeque<SwapRequest>>,
}

impl StaticOrderSource {
    /// Source preloaded with `orders`.
    pub fn new(orders: Vec<SwapRequest>) -> Self {
        Self {
            queue: Mutex::new(orders.into()),
        }
    }

    /// Enqueue an order.
    pub fn push(&self, order: SwapRequest) {
        self.queue.lock().push_back(order);
    }

    /// Orders not yet taken.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl OrderSource for StaticOrderSource {
    async fn next_order(&self) -> Option<SwapRequest> {
        self.queue.lock().pop_front()
    }
}
