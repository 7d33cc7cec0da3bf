//! Running finances with category-tagged deltas

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Admissions,
    RideTickets,
    Food,
    Shops,
    Taxes,
    Bounty,
    Refunds,
    Construction,
    Upkeep,
    Wages,
    Staffing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub category: Category,
    pub amount: i64,
}

impl LedgerDelta {
    pub fn income(category: Category, amount: i64) -> Self {
        Self {
            category,
            amount: amount.abs(),
        }
    }

    pub fn expense(category: Category, amount: i64) -> Self {
        Self {
            category,
            amount: -amount.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub year: u32,
    pub month: u32,
    pub closing_balance: i64,
    pub totals: BTreeMap<Category, i64>,
}

impl PeriodRecord {
    pub fn net(&self) -> i64 {
        self.totals.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientFunds {
    pub balance: i64,
    pub cost: i64,
}

fn default_retention() -> usize {
    12
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    balance: i64,
    opening_balance: i64,
    /// Net of every period already rolled into history, including dropped ones.
    archived_net: i64,
    period: BTreeMap<Category, i64>,
    history: VecDeque<PeriodRecord>,
    #[serde(default = "default_retention")]
    retention: usize,
}

impl Ledger {
    pub fn new(opening_balance: i64, retention: usize) -> Self {
        Self {
            balance: opening_balance,
            opening_balance,
            archived_net: 0,
            period: BTreeMap::new(),
            history: VecDeque::new(),
            retention: retention.max(1),
        }
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn opening_balance(&self) -> i64 {
        self.opening_balance
    }

    pub fn period_total(&self, category: Category) -> i64 {
        self.period.get(&category).copied().unwrap_or(0)
    }

    pub fn period_totals(&self) -> &BTreeMap<Category, i64> {
        &self.period
    }

    pub fn history(&self) -> impl Iterator<Item = &PeriodRecord> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn apply(&mut self, delta: LedgerDelta) {
        if delta.amount == 0 {
            return;
        }
        self.balance += delta.amount;
        *self.period.entry(delta.category).or_insert(0) += delta.amount;
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.balance >= cost
    }

    /// Gate and deduct in one step; nothing changes on failure.
    pub fn spend(&mut self, category: Category, cost: i64) -> Result<(), InsufficientFunds> {
        if !self.can_afford(cost) {
            return Err(InsufficientFunds {
                balance: self.balance,
                cost,
            });
        }
        self.apply(LedgerDelta::expense(category, cost));
        Ok(())
    }

    /// Close the period labelled `year`/`month`. The balance is untouched.
    pub fn rollover(&mut self, year: u32, month: u32) {
        let totals = std::mem::take(&mut self.period);
        let record = PeriodRecord {
            year,
            month,
            closing_balance: self.balance,
            totals,
        };
        self.archived_net += record.net();
        self.history.push_back(record);
        while self.history.len() > self.retention {
            self.history.pop_front();
        }
    }

    pub fn reconciles(&self) -> bool {
        let open_period: i64 = self.period.values().sum();
        self.balance == self.opening_balance + self.archived_net + open_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_gate_leaves_balance_on_failure() {
        let mut ledger = Ledger::new(50, 12);
        let err = ledger.spend(Category::Construction, 100).unwrap_err();
        assert_eq!(err, InsufficientFunds { balance: 50, cost: 100 });
        assert_eq!(ledger.balance(), 50);
        assert!(ledger.period_totals().is_empty());

        ledger.spend(Category::Construction, 50).unwrap();
        assert_eq!(ledger.balance(), 0);
        assert_eq!(ledger.period_total(Category::Construction), -50);
    }

    #[test]
    fn rollover_resets_period_but_not_balance() {
        let mut ledger = Ledger::new(1_000, 12);
        ledger.apply(LedgerDelta::income(Category::Admissions, 200));
        ledger.apply(LedgerDelta::expense(Category::Wages, 80));
        ledger.rollover(1, 3);
        assert_eq!(ledger.balance(), 1_120);
        assert!(ledger.period_totals().is_empty());
        let record = ledger.history().next().unwrap();
        assert_eq!(record.net(), 120);
        assert_eq!(record.closing_balance, 1_120);
        assert!(ledger.reconciles());
    }

    #[test]
    fn history_is_bounded() {
        let mut ledger = Ledger::new(0, 3);
        for month in 1..=5 {
            ledger.apply(LedgerDelta::income(Category::Food, month as i64));
            ledger.rollover(1, month);
        }
        assert_eq!(ledger.history_len(), 3);
        assert_eq!(ledger.history().next().unwrap().month, 3);
        assert_eq!(ledger.balance(), 15);
        assert!(ledger.reconciles());
    }
}
