//! Bounded rolling window of price observations for one instrument.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::instrument::InstrumentId;

pub const DEFAULT_WINDOW_SIZE: usize = 60;

/// A price produced by the price-fetch collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub instrument: InstrumentId,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// FIFO window holding at most `capacity` points in insertion order.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    capacity: usize,
    points: VecDeque<PricePoint>,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, price: Decimal, timestamp: DateTime<Utc>) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(PricePoint { price, timestamp });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    pub fn points(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    /// Prices oldest-first, ready for the indicator functions.
    pub fn prices(&self) -> Vec<Decimal> {
        self.points.iter().map(|p| p.price).collect()
    }
}
