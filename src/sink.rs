//! Item sinks
//!
//! A sink receives every record a traversal discovers. Returning an error from
//! [`ItemSink::accept`] aborts the traversal that produced the record.

use crate::scrape::ResourceKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{Stdout, Write};
use std::sync::Mutex;

/// Destination for discovered records
pub trait ItemSink: Send + Sync + 'static {
    fn accept<T: Serialize>(&self, kind: ResourceKind, item: &T) -> Result<()>;
}

/// Self-describing output record: the resource tagged with its kind
#[derive(Debug, Serialize)]
struct Tagged<'a, T> {
    kind: ResourceKind,
    resource: &'a T,
}

/// A collected record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: ResourceKind,
    pub resource: Value,
}

/// Writes one JSON document per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))
    }
}

impl JsonLinesSink<Stdout> {
    /// The default sink: records go to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W> ItemSink for JsonLinesSink<W>
where
    W: Write + Send + 'static,
{
    fn accept<T: Serialize>(&self, kind: ResourceKind, item: &T) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        serde_json::to_writer(&mut *writer, &Tagged { kind, resource: item })
            .context("Failed to encode record")?;
        writer.write_all(b"\n").context("Failed to write record")?;
        Ok(())
    }
}

/// Keeps every record in memory, for request/response use
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<Record>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records collected so far
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of records collected per kind
    pub fn counts(&self) -> HashMap<ResourceKind, usize> {
        let mut counts = HashMap::new();
        for record in self.records() {
            *counts.entry(record.kind).or_insert(0) += 1;
        }
        counts
    }
}

impl ItemSink for CollectingSink {
    fn accept<T: Serialize>(&self, kind: ResourceKind, item: &T) -> Result<()> {
        let resource = serde_json::to_value(item).context("Failed to encode record")?;
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("record store poisoned"))?
            .push(Record { kind, resource });
        Ok(())
    }
}

/// Adapts a closure into a sink; the item is handed over as JSON
pub struct FnSink<F>(pub F);

impl<F> ItemSink for FnSink<F>
where
    F: Fn(ResourceKind, Value) -> Result<()> + Send + Sync + 'static,
{
    fn accept<T: Serialize>(&self, kind: ResourceKind, item: &T) -> Result<()> {
        let value = serde_json::to_value(item).context("Failed to encode record")?;
        (self.0)(kind, value)
    }
}
