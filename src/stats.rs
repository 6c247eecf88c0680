//! Access to the counters backend.
//!
//! Backends are not assumed to be thread safe: a single thread owns the
//! provider and answers queries one at a time, sessions talk to it through
//! a clonable [`Stats`] handle.

use std::fmt;
use std::io;
use std::thread;

use log::{error, info, trace};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::proto::{typed_value, TypedValue};

mod file;
pub use file::FileStats;

#[cfg(test)]
mod memory;
#[cfg(test)]
pub use memory::MemoryStats;

const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CombinedCounter {
    pub packets: u64,
    pub bytes: u64,
}

/// One stats segment entry, by kind.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatValue {
    /// Per-thread, per-index packet counts.
    Simple(Vec<Vec<u64>>),
    /// Per-thread, per-index packet and byte counts.
    Combined(Vec<Vec<CombinedCounter>>),
    Error(u64),
    Scalar(f64),
    Name(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Counter {
    pub name: String,
    pub value: StatValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    Disconnected(String),
}

impl fmt::Display for StatsError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected(why) => write!(fmt, "stats backend disconnected: {why}"),
        }
    }
}

/// A counters backend. An empty result means nothing matched `prefix`;
/// an error means the backend is gone for good.
pub trait StatsProvider: Send + 'static {
    fn query(&mut self, prefix: &str) -> Result<Vec<Counter>, StatsError>;
}

/// Whether counter `name` lives at or below `prefix`.
///
/// Matching is on whole path segments: `/if/rx` covers `/if/rx/0` but not
/// `/if/rx-miss`. VPP's own `stat_segment_ls` does a regex substring match
/// and returns more counters for the same pattern.
pub fn matches(name: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }

    match name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl From<&StatValue> for TypedValue {
    fn from(value: &StatValue) -> Self {
        fn joined<T: ToString>(values: impl Iterator<Item = T>) -> String {
            values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
        }

        let value = match value {
            StatValue::Simple(threads) => {
                typed_value::Value::StringVal(joined(threads.iter().flatten()))
            }
            StatValue::Combined(threads) => typed_value::Value::StringVal(joined(
                threads
                    .iter()
                    .flatten()
                    .map(|c| format!("{} {}", c.packets, c.bytes)),
            )),
            StatValue::Error(count) => typed_value::Value::IntVal(*count as i64),
            StatValue::Scalar(scalar) => typed_value::Value::IntVal(*scalar as i64),
            StatValue::Name(names) => typed_value::Value::StringVal(names.join(" ")),
        };

        TypedValue { value: Some(value) }
    }
}

struct Query {
    prefix: String,
    reply: oneshot::Sender<Result<Vec<Counter>, StatsError>>,
}

#[derive(Clone)]
pub struct Stats {
    queries: mpsc::Sender<Query>,
}

impl Stats {
    /// Hands `provider` to a dedicated thread which serves every query.
    pub fn spawn(provider: impl StatsProvider) -> io::Result<Self> {
        let (queries, rx) = mpsc::channel(QUEUE_DEPTH);

        thread::Builder::new()
            .name("stats".into())
            .spawn(move || serve(provider, rx))?;

        Ok(Self { queries })
    }

    /// Every counter under `prefix`, as resolved names and typed values.
    pub async fn query(&self, prefix: &str) -> Result<Vec<(String, TypedValue)>, StatsError> {
        let gone = || StatsError::Disconnected("stats thread has exited".into());
        let (reply, response) = oneshot::channel();

        self.queries
            .send(Query {
                prefix: prefix.into(),
                reply,
            })
            .await
            .map_err(|_| gone())?;

        let counters = response.await.map_err(|_| gone())??;
        trace!("{prefix}: {} counters", counters.len());

        Ok(counters
            .iter()
            .map(|counter| (counter.name.clone(), TypedValue::from(&counter.value)))
            .collect())
    }
}

fn serve(mut provider: impl StatsProvider, mut queries: mpsc::Receiver<Query>) {
    while let Some(Query { prefix, reply }) = queries.blocking_recv() {
        let result = provider.query(&prefix);

        if let Err(ref e) = result {
            error!("querying \"{prefix}\": {e}");
            let _ = reply.send(result);
            // a broken backend is not resumed; pending and later queries fail
            return;
        }

        let _ = reply.send(result);
    }

    info!("stats handles dropped, stopping");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefix_matching() {
        assert!(matches("/if/rx", "/if"));
        assert!(matches("/if/rx", "/if/"));
        assert!(matches("/if/rx", "/if/rx"));
        assert!(matches("/if/rx", ""));
        assert!(matches("/if/rx", "/"));

        assert!(!matches("/if/rx-miss", "/if/rx"));
        assert!(!matches("/iface/rx", "/if"));
        assert!(!matches("/if", "/if/rx"));
    }

    #[test]
    fn simple_counters_become_strings() {
        let value = TypedValue::from(&StatValue::Simple(vec![vec![1, 2], vec![3]]));
        assert_eq!(value.value, Some(typed_value::Value::StringVal("1 2 3".into())));
    }

    #[test]
    fn combined_counters_become_pairs() {
        let value = TypedValue::from(&StatValue::Combined(vec![vec![
            CombinedCounter { packets: 4, bytes: 400 },
            CombinedCounter { packets: 1, bytes: 64 },
        ]]));
        assert_eq!(
            value.value,
            Some(typed_value::Value::StringVal("4 400 1 64".into()))
        );
    }

    #[test]
    fn indexes_become_ints() {
        assert_eq!(
            TypedValue::from(&StatValue::Error(7)).value,
            Some(typed_value::Value::IntVal(7))
        );
        assert_eq!(
            TypedValue::from(&StatValue::Scalar(12.9)).value,
            Some(typed_value::Value::IntVal(12))
        );
    }

    #[tokio::test]
    async fn queries_go_through_the_owner_thread() {
        let memory = MemoryStats::default();
        memory.set("/if/rx", StatValue::Simple(vec![vec![5]]));
        memory.set("/if/tx", StatValue::Error(2));
        memory.set("/sys/heartbeat", StatValue::Scalar(1.0));

        let stats = Stats::spawn(memory.clone()).unwrap();

        let found = stats.query("/if").await.unwrap();
        let names: Vec<_> = found.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["/if/rx", "/if/tx"]);

        assert!(stats.query("/nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fault_is_not_resumed() {
        let memory = MemoryStats::default();
        memory.set("/if/rx", StatValue::Error(1));

        let stats = Stats::spawn(memory.clone()).unwrap();
        assert_eq!(stats.query("/if").await.unwrap().len(), 1);

        memory.disconnect();
        assert!(stats.query("/if").await.is_err());

        memory.reconnect();
        assert!(matches!(
            stats.query("/if").await,
            Err(StatsError::Disconnected(_))
        ));
    }
}
