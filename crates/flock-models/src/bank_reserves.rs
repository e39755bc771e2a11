//! Bank reserves: money creation through fractional-reserve lending.
//!
//! People wander a grid and trade with whoever shares their cell. After
//! every trade they balance their books against a single bank: surplus
//! cash is deposited, shortfalls are covered from savings and then by
//! loans, which the bank grants only up to its excess reserves.

use flock_core::{ConfigError, ParamSet, Value};
use flock_engine::{Activation, Agent, AgentContext, AgentError, DataCollector, Environment, Model};
use flock_space::walk::random_move;
use flock_space::{GridQuery, Membership, OrthogonalGrid, Space, SpaceError};

use crate::{dim, setup_config, space_config};

/// Catalog name.
pub const NAME: &str = "bank_reserves";

/// Loans above which a person counts as poor.
const POOR_LOANS: i64 = 10;

/// The only bank.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bank {
    /// Percentage of deposits held back from lending.
    pub reserve_percent: f64,
    /// Total deposits held.
    pub deposits: i64,
    /// Total loans outstanding.
    pub loans: i64,
}

impl Bank {
    /// Cash held in reserve.
    pub fn reserves(&self) -> i64 {
        (self.deposits as f64 * self.reserve_percent / 100.0).ceil() as i64
    }

    /// What the bank can still lend.
    pub fn available(&self) -> i64 {
        (self.deposits - self.reserves() - self.loans).max(0)
    }
}

/// Grid plus bank.
#[derive(Debug)]
pub struct Economy {
    /// Multi-occupancy torus.
    pub grid: OrthogonalGrid,
    /// The bank every person uses.
    pub bank: Bank,
    /// Savings above which a person counts as rich.
    pub rich_threshold: i64,
}

impl Environment for Economy {
    fn visit_spaces(&mut self, f: &mut dyn FnMut(&mut dyn Membership)) {
        f(&mut self.grid);
    }
}

/// Wealth class of a person.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    /// Savings above the rich threshold.
    Rich,
    /// Loans above ten.
    Poor,
    /// Everyone else.
    Middle,
}

/// A person with a wallet, savings and loans.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Person {
    /// Cash on hand; negative after overspending.
    pub wallet: i64,
    /// Deposited money.
    pub savings: i64,
    /// Borrowed money.
    pub loans: i64,
}

impl Person {
    /// Savings minus loans.
    pub fn wealth(&self) -> i64 {
        self.savings - self.loans
    }

    /// Wealth class under `rich_threshold`.
    pub fn class(&self, rich_threshold: i64) -> Class {
        if self.savings > rich_threshold {
            Class::Rich
        } else if self.loans > POOR_LOANS {
            Class::Poor
        } else {
            Class::Middle
        }
    }

    /// Settle the wallet against the bank.
    pub fn balance_books(&mut self, bank: &mut Bank) {
        if self.wallet < 0 {
            let need = -self.wallet;
            let withdraw = need.min(self.savings);
            self.savings -= withdraw;
            bank.deposits -= withdraw;
            self.wallet += withdraw;
            if self.wallet < 0 {
                let loan = (-self.wallet).min(bank.available());
                self.loans += loan;
                bank.loans += loan;
                self.wallet += loan;
            }
        } else if self.wallet > 0 {
            self.savings += self.wallet;
            bank.deposits += self.wallet;
            self.wallet = 0;
        }
        if self.loans > 0 && self.savings > 0 {
            let repay = self.loans.min(self.savings);
            self.savings -= repay;
            bank.deposits -= repay;
            self.loans -= repay;
            bank.loans -= repay;
        }
    }
}

impl Agent for Person {
    type Env = Economy;

    fn type_tag(&self) -> &'static str {
        "person"
    }

    fn step(&mut self, ctx: &mut AgentContext<'_, Self>) -> Result<(), AgentError> {
        let id = ctx.id();
        {
            let parts = ctx.parts();
            random_move(&mut parts.env.grid, id, &GridQuery::moore(1), parts.rng)?;
        }
        let can_pay = self.wallet > 0 || self.savings > 0 || ctx.env().bank.available() > 0;
        if can_pay {
            let here = ctx.env().grid.position(id).ok_or(SpaceError::NotPlaced { agent: id })?;
            let mates: Vec<_> = ctx
                .env()
                .grid
                .contents(here)?
                .into_iter()
                .filter(|&o| o != id)
                .collect();
            if let Some(&customer) = ctx.rng().choose(&mates) {
                let amount = if ctx.rng().bernoulli(0.5) { 5 } else { 2 };
                if let Some(other) = ctx.agent_mut(customer) {
                    other.wallet += amount;
                    self.wallet -= amount;
                }
            }
        }
        self.balance_books(&mut ctx.env_mut().bank);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "wallet" => Some(self.wallet.into()),
            "savings" => Some(self.savings.into()),
            "loans" => Some(self.loans.into()),
            "wealth" => Some(self.wealth().into()),
            _ => None,
        }
    }
}

/// Default parameters.
pub fn defaults() -> ParamSet {
    ParamSet::new()
        .with("width", 20i64)
        .with("height", 20i64)
        .with("init_people", 25i64)
        .with("rich_threshold", 10i64)
        .with("reserve_percent", 50i64)
}

fn class_count(model: &Model<Person>, class: Class) -> usize {
    let threshold = model.env().rich_threshold;
    model.agents().count_where(|p| p.class(threshold) == class)
}

fn total(model: &Model<Person>, f: impl Fn(&Person) -> i64) -> i64 {
    model.agents().iter().map(|(_, p)| f(p)).sum()
}

/// Build a seeded economy. Each person starts with a wallet uniform in
/// `[1, rich_threshold + 1]` on a random cell.
pub fn build(params: &ParamSet, seed: u64) -> Result<Model<Person>, ConfigError> {
    let width = dim(params, "width", 20)?;
    let height = dim(params, "height", 20)?;
    let people = params.usize_or("init_people", 25)?;
    let rich_threshold = params.i64_or("rich_threshold", 10)?;
    let reserve_percent = params.f64_or("reserve_percent", 50.0)?;
    if !(0.0..=100.0).contains(&reserve_percent) {
        return Err(ConfigError::invalid(
            "reserve_percent",
            format!("must be in [0, 100], got {reserve_percent}"),
        ));
    }
    let economy = Economy {
        grid: OrthogonalGrid::multi(width, height, true).map_err(space_config)?,
        bank: Bank {
            reserve_percent,
            ..Bank::default()
        },
        rich_threshold,
    };

    let collector = DataCollector::builder()
        .model("rich", |m: &Model<Person>| class_count(m, Class::Rich).into())
        .model("poor", |m: &Model<Person>| class_count(m, Class::Poor).into())
        .model("middle", |m: &Model<Person>| class_count(m, Class::Middle).into())
        .model("savings", |m: &Model<Person>| total(m, |p| p.savings).into())
        .model("wallets", |m: &Model<Person>| total(m, |p| p.wallet).into())
        .model("money", |m: &Model<Person>| total(m, |p| p.savings + p.wallet).into())
        .model("loans", |m: &Model<Person>| total(m, |p| p.loans).into())
        .attribute("wealth")
        .build()?;
    let mut model = Model::builder(economy)
        .seed(seed)
        .params(params.clone())
        .activation(Activation::Random)
        .collector(collector)
        .build()?;

    for _ in 0..people {
        let wallet = model.rng().int_range(1, rich_threshold.max(0) + 1);
        model
            .create_with(
                Person {
                    wallet,
                    ..Person::default()
                },
                |id, env, rng| {
                    let x = rng.int_range(0, i64::from(width) - 1) as i32;
                    let y = rng.int_range(0, i64::from(height) - 1) as i32;
                    env.grid.place(id, (x, y))?;
                    Ok(())
                },
            )
            .map_err(setup_config)?;
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_then_borrow_within_reserves() {
        let mut bank = Bank {
            reserve_percent: 50.0,
            ..Bank::default()
        };
        let mut saver = Person {
            wallet: 20,
            ..Person::default()
        };
        saver.balance_books(&mut bank);
        assert_eq!((saver.savings, bank.deposits), (20, 20));
        assert_eq!(bank.available(), 10);

        let mut borrower = Person {
            wallet: -15,
            ..Person::default()
        };
        borrower.balance_books(&mut bank);
        assert_eq!(borrower.loans, 10);
        assert_eq!(borrower.wallet, -5);
        assert_eq!(bank.available(), 0);
    }

    #[test]
    fn savings_repay_loans() {
        let mut bank = Bank {
            reserve_percent: 0.0,
            deposits: 0,
            loans: 4,
        };
        let mut p = Person {
            wallet: 10,
            savings: 0,
            loans: 4,
        };
        p.balance_books(&mut bank);
        assert_eq!((p.savings, p.loans), (6, 0));
        assert_eq!((bank.deposits, bank.loans), (6, 0));
    }

    #[test]
    fn money_stock_is_consistent_with_the_bank() {
        let mut m = build(&defaults(), 9).unwrap();
        m.run_for(30).unwrap();
        let savings = total(&m, |p| p.savings);
        let loans = total(&m, |p| p.loans);
        assert_eq!(savings, m.env().bank.deposits);
        assert_eq!(loans, m.env().bank.loans);
        assert_eq!(
            class_count(&m, Class::Rich) + class_count(&m, Class::Poor) + class_count(&m, Class::Middle),
            25
        );
    }
}
