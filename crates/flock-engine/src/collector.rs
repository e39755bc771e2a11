//! Model-level and agent-level time series plus named event tables.
//!
//! Reporters are registered once through [`DataCollectorBuilder`] and
//! evaluated each time the model collects. Storage is wide internally
//! (one row of reporter values per tick, or per tick and agent); the
//! accessors render either the long `(tick, reporter, value)` shape or
//! the wide shape for export.

use std::fmt;

use flock_core::{AgentId, ConfigError, Record, Table, TickId, Value};
use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use crate::agent::Agent;
use crate::model::Model;

type ModelReporter<A> = Box<dyn Fn(&Model<A>) -> Value>;

enum AgentReporter<A> {
    Func(Box<dyn Fn(&A) -> Value>),
    /// Read through [`Agent::attribute`]; `Null` when absent.
    Attribute,
}

/// Builder for [`DataCollector`].
pub struct DataCollectorBuilder<A: Agent> {
    model: IndexMap<String, ModelReporter<A>>,
    agent: IndexMap<String, AgentReporter<A>>,
    tables: IndexMap<String, Vec<String>>,
    seen: IndexSet<String>,
    duplicate: Option<String>,
}

impl<A: Agent> DataCollectorBuilder<A> {
    fn claim(&mut self, name: &str) -> bool {
        if self.seen.insert(name.to_owned()) {
            true
        } else {
            self.duplicate.get_or_insert_with(|| name.to_owned());
            false
        }
    }

    /// Model-level reporter evaluated once per collection.
    pub fn model(mut self, name: impl Into<String>, f: impl Fn(&Model<A>) -> Value + 'static) -> Self {
        let name = name.into();
        if self.claim(&name) {
            self.model.insert(name, Box::new(f));
        }
        self
    }

    /// Agent-level reporter evaluated for every active agent.
    pub fn agent(mut self, name: impl Into<String>, f: impl Fn(&A) -> Value + 'static) -> Self {
        let name = name.into();
        if self.claim(&name) {
            self.agent.insert(name, AgentReporter::Func(Box::new(f)));
        }
        self
    }

    /// Agent-level reporter reading a named attribute.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.claim(&name) {
            self.agent.insert(name, AgentReporter::Attribute);
        }
        self
    }

    /// Declare an event table. Rows carry `tick` and `agent_id` followed
    /// by `columns`.
    pub fn table<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if self.claim(&name) {
            self.tables
                .insert(name, columns.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Finish the collector.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateReporter`] if any reporter or table name
    /// was registered twice.
    pub fn build(self) -> Result<DataCollector<A>, ConfigError> {
        if let Some(name) = self.duplicate {
            return Err(ConfigError::DuplicateReporter { name });
        }
        let tables = self
            .tables
            .into_iter()
            .map(|(name, cols)| {
                let header = ["tick".to_owned(), "agent_id".to_owned()]
                    .into_iter()
                    .chain(cols);
                (name, Table::new(header))
            })
            .collect();
        Ok(DataCollector {
            model_reporters: self.model,
            agent_reporters: self.agent,
            model_rows: Vec::new(),
            agent_rows: Vec::new(),
            tables,
            last_collected: None,
        })
    }
}

/// Records reporter values and event rows over the course of a run.
pub struct DataCollector<A: Agent> {
    model_reporters: IndexMap<String, ModelReporter<A>>,
    agent_reporters: IndexMap<String, AgentReporter<A>>,
    model_rows: Vec<(TickId, Vec<Value>)>,
    agent_rows: Vec<(TickId, AgentId, Vec<Value>)>,
    tables: IndexMap<String, Table>,
    last_collected: Option<TickId>,
}

impl<A: Agent> fmt::Debug for DataCollector<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCollector")
            .field("model_reporters", &self.model_reporters.keys().collect::<Vec<_>>())
            .field("agent_reporters", &self.agent_reporters.keys().collect::<Vec<_>>())
            .field("model_rows", &self.model_rows.len())
            .field("agent_rows", &self.agent_rows.len())
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<A: Agent> DataCollector<A> {
    /// Start configuring a collector.
    pub fn builder() -> DataCollectorBuilder<A> {
        DataCollectorBuilder {
            model: IndexMap::new(),
            agent: IndexMap::new(),
            tables: IndexMap::new(),
            seen: IndexSet::new(),
            duplicate: None,
        }
    }

    /// Evaluate every reporter against `model`, labelled with its tick.
    pub fn collect(&mut self, model: &Model<A>) {
        self.collect_at(model, model.tick());
    }

    pub(crate) fn collect_at(&mut self, model: &Model<A>, tick: TickId) {
        if !self.model_reporters.is_empty() {
            let row = self.model_reporters.values().map(|f| f(model)).collect();
            self.model_rows.push((tick, row));
        }
        if !self.agent_reporters.is_empty() {
            for (id, agent) in model.agents().iter() {
                let row = self
                    .agent_reporters
                    .iter()
                    .map(|(name, r)| match r {
                        AgentReporter::Func(f) => f(agent),
                        AgentReporter::Attribute => agent.attribute(name).unwrap_or_default(),
                    })
                    .collect();
                self.agent_rows.push((tick, id, row));
            }
        }
        self.last_collected = Some(tick);
    }

    /// Tick label of the most recent collection.
    pub fn last_collected(&self) -> Option<TickId> {
        self.last_collected
    }

    /// Append an event row. Rows for undeclared tables or with unknown
    /// fields are dropped with a warning.
    pub fn push_event(&mut self, tick: TickId, agent: Option<AgentId>, table: &str, record: &Record) {
        let Some(t) = self.tables.get_mut(table) else {
            warn!(table, tick = tick.0, "event dropped: undeclared table");
            return;
        };
        let mut full = Record::new()
            .with("tick", tick.0)
            .with("agent_id", agent.map(|a| a.0));
        for (k, v) in record.0.iter() {
            full.insert(k.clone(), v.clone());
        }
        if let Err(e) = t.push_record(&full) {
            warn!(table, tick = tick.0, error = %e, "event dropped");
        }
    }

    /// Model reporter names in registration order.
    pub fn model_reporters(&self) -> impl Iterator<Item = &str> {
        self.model_reporters.keys().map(String::as_str)
    }

    /// Agent reporter names in registration order.
    pub fn agent_reporters(&self) -> impl Iterator<Item = &str> {
        self.agent_reporters.keys().map(String::as_str)
    }

    /// Most recent value of a model reporter.
    pub fn latest(&self, reporter: &str) -> Option<&Value> {
        let col = self.model_reporters.get_index_of(reporter)?;
        self.model_rows.last().map(|(_, row)| &row[col])
    }

    /// Every collected value of a model reporter, with its tick.
    pub fn series(&self, reporter: &str) -> Option<Vec<(TickId, Value)>> {
        let col = self.model_reporters.get_index_of(reporter)?;
        Some(
            self.model_rows
                .iter()
                .map(|(t, row)| (*t, row[col].clone()))
                .collect(),
        )
    }

    /// Number of model-level collections made.
    pub fn collections(&self) -> usize {
        self.model_rows.len()
    }

    /// Long model table: `tick, reporter, value`.
    pub fn model_table(&self) -> Table {
        let names: Vec<&String> = self.model_reporters.keys().collect();
        let rows = self.model_rows.iter().flat_map(|(tick, row)| {
            names
                .iter()
                .zip(row)
                .map(move |(name, v)| vec![Value::from(tick.0), Value::from(name.as_str()), v.clone()])
        });
        table_from(["tick", "reporter", "value"], rows)
    }

    /// Long agent table: `tick, agent_id, reporter, value`.
    pub fn agent_table(&self) -> Table {
        let names: Vec<&String> = self.agent_reporters.keys().collect();
        let rows = self.agent_rows.iter().flat_map(|(tick, id, row)| {
            names.iter().zip(row).map(move |(name, v)| {
                vec![
                    Value::from(tick.0),
                    Value::from(id.0),
                    Value::from(name.as_str()),
                    v.clone(),
                ]
            })
        });
        table_from(["tick", "agent_id", "reporter", "value"], rows)
    }

    /// Wide model table: `tick` followed by one column per reporter.
    pub fn model_wide(&self) -> Table {
        let header = std::iter::once("tick").chain(self.model_reporters());
        let rows = self.model_rows.iter().map(|(tick, row)| {
            std::iter::once(Value::from(tick.0))
                .chain(row.iter().cloned())
                .collect()
        });
        table_from(header, rows)
    }

    /// Wide agent table: `tick, agent_id` followed by one column per reporter.
    pub fn agent_wide(&self) -> Table {
        let header = ["tick", "agent_id"].into_iter().chain(self.agent_reporters());
        let rows = self.agent_rows.iter().map(|(tick, id, row)| {
            [Value::from(tick.0), Value::from(id.0)]
                .into_iter()
                .chain(row.iter().cloned())
                .collect()
        });
        table_from(header, rows)
    }

    /// A declared event table.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Declared event table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Drop every collected row, keeping the configuration.
    pub fn clear(&mut self) {
        self.model_rows.clear();
        self.agent_rows.clear();
        for t in self.tables.values_mut() {
            *t = Table::new(t.columns().to_vec());
        }
        self.last_collected = None;
    }
}

fn table_from<I, S>(header: I, rows: impl Iterator<Item = Vec<Value>>) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut t = Table::new(header);
    for row in rows {
        let pushed = t.push_row(row);
        debug_assert!(pushed.is_ok(), "row width follows the header");
    }
    t
}
