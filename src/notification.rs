use log::{error, trace};

use crate::gnmi::{Error, Result};
use crate::path;
use crate::proto::{Notification, Path, PathElem, Subscription, Update};
use crate::stats::Stats;
use crate::time::Timestamp;

/// Builds notifications from the current backend values.
#[derive(Clone)]
pub struct NotificationBuilder {
    stats: Stats,
    measurement: Option<String>,
}

impl NotificationBuilder {
    /// `measurement`, when set, is appended to every notification prefix.
    pub fn new(stats: Stats, measurement: Option<String>) -> Self {
        Self { stats, measurement }
    }

    /// One notification holding every counter each subscription resolves
    /// to, in subscription order then backend order. A subscription with
    /// no matching counters contributes no updates.
    pub async fn build<'a>(
        &self,
        subscriptions: impl IntoIterator<Item = &'a Subscription>,
        prefix: Option<&Path>,
    ) -> Result<Notification> {
        let timestamp = Timestamp::now().map_err(|()| Error::Internal("no clock".into()))?;

        let prefix = prefix.map(|request| Path {
            target: request.target.clone(),
            elem: self
                .measurement
                .iter()
                .map(|name| PathElem {
                    name: name.clone(),
                    key: Default::default(),
                })
                .collect(),
            ..Default::default()
        });

        let mut update = vec![];
        for subscription in subscriptions {
            let requested = subscription
                .path
                .as_ref()
                .map(path::encode)
                .unwrap_or_default();

            let counters = self.stats.query(&requested).await.map_err(|e| {
                error!("couldn't fetch {requested}: {e}");
                Error::from(e)
            })?;

            update.extend(counters.into_iter().map(|(resolved, val)| Update {
                path: Some(path::decode(&resolved)),
                val: Some(val),
                duplicates: 0,
            }));
        }

        trace!("notification at {timestamp}: {} updates", update.len());

        Ok(Notification {
            timestamp: timestamp.millis(),
            prefix,
            update,
            atomic: false,
            ..Default::default()
        })
    }
}
