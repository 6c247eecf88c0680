use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::{matches, Counter, StatValue, StatsError, StatsProvider};

#[derive(Default)]
struct Table {
    counters: BTreeMap<String, StatValue>,
    disconnected: bool,
}

/// Counters held in process; clones share the same table.
#[derive(Clone, Default)]
pub struct MemoryStats(Arc<Mutex<Table>>);

impl MemoryStats {
    pub fn set(&self, name: &str, value: StatValue) {
        self.0.lock().unwrap().counters.insert(name.into(), value);
    }

    pub fn disconnect(&self) {
        self.0.lock().unwrap().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.0.lock().unwrap().disconnected = false;
    }
}

impl StatsProvider for MemoryStats {
    fn query(&mut self, prefix: &str) -> Result<Vec<Counter>, StatsError> {
        let table = self.0.lock().unwrap();

        if table.disconnected {
            return Err(StatsError::Disconnected("memory table disconnected".into()));
        }

        Ok(table
            .counters
            .iter()
            .filter(|(name, _)| matches(name, prefix))
            .map(|(name, value)| Counter {
                name: name.clone(),
                value: value.clone(),
            })
            .collect())
    }
}
