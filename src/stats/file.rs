use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use log::{error, warn};

use super::{matches, Counter, StatsError, StatsProvider};

/// A stats segment dumped to disk, one JSON counter per line:
///
/// ```text
/// {"name": "/if/rx", "value": {"simple": [[10, 20]]}}
/// {"name": "/err/ip4-input/drops", "value": {"error": 3}}
/// ```
///
/// The file is re-read on every query.
pub struct FileStats {
    path: PathBuf,
}

impl FileStats {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StatsProvider for FileStats {
    fn query(&mut self, prefix: &str) -> Result<Vec<Counter>, StatsError> {
        let path = &self.path;
        let fault = |e: std::io::Error| {
            error!("read {path:?}: {e}");
            StatsError::Disconnected(format!("{path:?}: {e}"))
        };

        let file = File::open(path).map_err(fault)?;
        let mut counters = vec![];

        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(fault)?;
            if line.trim().is_empty() {
                continue;
            }

            let counter: Counter = match serde_json::from_str(&line) {
                Ok(c) => c,
                Err(e) => {
                    warn!("{path:?}:{}: skipping counter: {e}", lineno + 1);
                    continue;
                }
            };

            if matches(&counter.name, prefix) {
                counters.push(counter);
            }
        }

        counters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counters)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::stats::{CombinedCounter, StatValue};

    fn dump(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn reads_matching_counters_sorted() {
        let file = dump(&[
            r#"{"name": "/if/tx", "value": {"combined": [[{"packets": 2, "bytes": 128}]]}}"#,
            r#"{"name": "/if/rx", "value": {"simple": [[1, 2]]}}"#,
            "",
            r#"{"name": "/sys/vector_rate", "value": {"scalar": 3.5}}"#,
        ]);
        let mut stats = FileStats::new(file.path().into());

        let counters = stats.query("/if").unwrap();

        assert_eq!(
            counters,
            [
                Counter {
                    name: "/if/rx".into(),
                    value: StatValue::Simple(vec![vec![1, 2]]),
                },
                Counter {
                    name: "/if/tx".into(),
                    value: StatValue::Combined(vec![vec![CombinedCounter {
                        packets: 2,
                        bytes: 128
                    }]]),
                },
            ]
        );
    }

    #[test]
    fn skips_bad_lines() {
        let file = dump(&[
            "not json",
            r#"{"name": "/err/drops", "value": {"error": 9}}"#,
            r#"{"name": "/err/bogus", "value": {"mystery": 1}}"#,
        ]);
        let mut stats = FileStats::new(file.path().into());

        let counters = stats.query("/err").unwrap();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].value, StatValue::Error(9));
    }

    #[test]
    fn miss_is_empty() {
        let file = dump(&[r#"{"name": "/if/rx", "value": {"error": 1}}"#]);
        let mut stats = FileStats::new(file.path().into());

        assert!(stats.query("/nodes").unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_a_fault() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = FileStats::new(dir.path().join("gone.json"));

        assert!(matches!(
            stats.query("/if"),
            Err(StatsError::Disconnected(_))
        ));
    }
}
