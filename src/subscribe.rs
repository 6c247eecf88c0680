//! The Subscribe RPC: the first request picks a delivery mode, then one of
//! the STREAM, ONCE or POLL handlers serves the session until it closes.

use std::pin::Pin;
use std::result;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use uuid::Uuid;

use crate::gnmi::{Error, Result};
use crate::notification::NotificationBuilder;
use crate::proto::{
    subscribe_request::Request, subscription_list, SubscribeRequest, SubscribeResponse,
    Subscription, SubscriptionList,
};
use crate::sampler::Sampler;

/// How often the streaming loop checks for due subscriptions.
pub const TICK: Duration = Duration::from_millis(200);

/// Upper bound for `sample_interval`, the largest signed 64-bit nanosecond duration.
const MAX_SAMPLE_INTERVAL: u64 = i64::MAX as u64;

pub type Outbound = mpsc::Sender<result::Result<SubscribeResponse, Status>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryMode {
    Stream,
    Once,
    Poll,
    Unknown(i32),
}

impl From<i32> for DeliveryMode {
    fn from(mode: i32) -> Self {
        match subscription_list::Mode::try_from(mode) {
            Ok(subscription_list::Mode::Stream) => Self::Stream,
            Ok(subscription_list::Mode::Once) => Self::Once,
            Ok(subscription_list::Mode::Poll) => Self::Poll,
            Err(_) => Self::Unknown(mode),
        }
    }
}

struct Session {
    id: Uuid,
    builder: NotificationBuilder,
    outbound: Outbound,
}

type Inbound<S> = Pin<Box<S>>;

/// Serves one Subscribe RPC. Errors are reported to the client as the
/// final status of the response stream; the stream ends when this returns.
pub async fn run<S>(builder: NotificationBuilder, inbound: S, outbound: Outbound)
where
    S: Stream<Item = result::Result<SubscribeRequest, Status>> + Send,
{
    let session = Session {
        id: Uuid::new_v4(),
        builder,
        outbound,
    };
    let id = session.id;

    info!("{id}: subscribe started");

    match session.dispatch(Box::pin(inbound)).await {
        Ok(()) => info!("{id}: subscribe done"),
        Err(e) => {
            warn!("{id}: subscribe failed: {e:?}");
            let _ = session.outbound.send(Err(e.into())).await;
        }
    }
}

impl Session {
    async fn dispatch<S>(&self, mut inbound: Inbound<S>) -> Result<()>
    where
        S: Stream<Item = result::Result<SubscribeRequest, Status>> + Send,
    {
        let id = self.id;

        let list = match inbound.next().await {
            Some(Ok(SubscribeRequest {
                request: Some(Request::Subscribe(list)),
            })) => list,
            Some(Err(status)) => {
                debug!("{id}: reading first request: {status}");
                return Err(no_subscription_list());
            }
            _ => return Err(no_subscription_list()),
        };

        if list.use_aliases {
            warn!("{id}: unsupported usage of aliases, full paths will be sent");
        }
        if list.updates_only {
            warn!("{id}: unsupported usage of updates_only, every path will be sent");
        }

        match DeliveryMode::from(list.mode) {
            DeliveryMode::Stream => self.stream(list).await,
            DeliveryMode::Once => self.once(list).await,
            DeliveryMode::Poll => self.poll(list, inbound).await,
            DeliveryMode::Unknown(mode) => {
                debug!("{id}: mode {mode}");
                Err(Error::Unknown("Unknown subscription mode".into()))
            }
        }
    }

    /// Returns false once the client has gone away.
    async fn send(&self, response: SubscribeResponse) -> bool {
        debug!("{}: sending {response:?}", self.id);
        self.outbound.send(Ok(response)).await.is_ok()
    }

    /// One notification for every subscription, followed by the sync marker.
    async fn initial_sync(&self, list: &SubscriptionList) -> Result<bool> {
        let notification = self
            .builder
            .build(&list.subscription, list.prefix.as_ref())
            .await?;

        Ok(self.send(SubscribeResponse::update(notification)).await
            && self.send(SubscribeResponse::sync()).await)
    }

    async fn stream(&self, list: SubscriptionList) -> Result<()> {
        let id = self.id;

        validate_intervals(&list.subscription)?;

        if !self.initial_sync(&list).await? {
            return Ok(());
        }

        let mut sampler = Sampler::new(&list.subscription);
        let unsampled = list.subscription.len() - sampler.len();
        if unsampled > 0 {
            warn!("{id}: {unsampled} subscriptions are not in SAMPLE mode and won't be updated");
        }

        while !self.outbound.is_closed() {
            let start = Instant::now();

            let due = sampler.tick();
            if !due.is_empty() {
                debug!("{id}: {} subscriptions due", due.len());
                let notification = self.builder.build(due, list.prefix.as_ref()).await?;
                if !self.send(SubscribeResponse::update(notification)).await {
                    break;
                }
            }

            tokio::select! {
                _ = time::sleep(TICK.saturating_sub(start.elapsed())) => {}
                _ = self.outbound.closed() => break,
            }
        }

        info!("{id}: client cancelled stream");
        Ok(())
    }

    async fn once(&self, list: SubscriptionList) -> Result<()> {
        self.initial_sync(&list).await?;
        Ok(())
    }

    async fn poll<S>(&self, list: SubscriptionList, mut inbound: Inbound<S>) -> Result<()>
    where
        S: Stream<Item = result::Result<SubscribeRequest, Status>> + Send,
    {
        let id = self.id;

        while let Some(request) = inbound.next().await {
            let request = match request {
                Ok(r) => r,
                Err(status) => {
                    debug!("{id}: inbound stream ended: {status}");
                    break;
                }
            };

            match request.request {
                Some(Request::Poll(_)) => {
                    let notification = self
                        .builder
                        .build(&list.subscription, list.prefix.as_ref())
                        .await?;
                    if !self.send(SubscribeResponse::update(notification)).await {
                        break;
                    }
                }
                Some(Request::Aliases(_)) => {
                    return Err(Error::Unimplemented("Aliases not implemented yet".into()));
                }
                Some(Request::Subscribe(_)) => {
                    return Err(Error::InvalidArgument(
                        "A SubscriptionList has already been received for this RPC".into(),
                    ));
                }
                None => {
                    return Err(Error::InvalidArgument(
                        "Unknown content for SubscribeRequest message".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn no_subscription_list() -> Error {
    Error::InvalidArgument("SubscribeRequest needs non-empty SubscriptionList".into())
}

fn validate_intervals(subscriptions: &[Subscription]) -> Result<()> {
    if subscriptions
        .iter()
        .any(|sub| sub.sample_interval > MAX_SAMPLE_INTERVAL)
    {
        return Err(Error::InvalidArgument(format!(
            "sample_interval must be less than {MAX_SAMPLE_INTERVAL} nanoseconds"
        )));
    }
    Ok(())
}
