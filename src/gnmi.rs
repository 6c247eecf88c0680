use std::net::SocketAddr;
use std::result;

use log::info;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

use crate::notification::NotificationBuilder;
use crate::proto::{
    self, CapabilityRequest, CapabilityResponse, GetRequest, GetResponse, GnmiServer, SetRequest,
    SetResponse, SubscribeRequest, SubscribeResponse,
};
use crate::security::SecurityContext;
use crate::stats::StatsError;
use crate::subscribe;

/// Responses buffered per session before the session waits on the client.
const OUTBOUND_DEPTH: usize = 16;

pub struct Gnmi {
    builder: NotificationBuilder,
}

#[derive(Clone, Debug)]
pub enum Error {
    InvalidArgument(String),
    Unimplemented(String),
    Unknown(String),
    Internal(String),
    Unauthenticated,
}

pub type Result<T> = result::Result<T, Error>;

impl From<Error> for Status {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidArgument(msg) => Status::invalid_argument(msg),
            Error::Unimplemented(msg) => Status::unimplemented(msg),
            Error::Unknown(msg) => Status::unknown(msg),
            Error::Internal(msg) => Status::internal(msg),
            Error::Unauthenticated => Status::unauthenticated("invalid username or password"),
        }
    }
}

impl From<StatsError> for Error {
    fn from(e: StatsError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl Gnmi {
    pub fn new(builder: NotificationBuilder) -> Self {
        Self { builder }
    }

    fn not_implemented<T>(method: &str) -> result::Result<Response<T>, Status> {
        Err(Error::Unimplemented(format!("'{method}' method not implemented yet")).into())
    }
}

#[tonic::async_trait]
impl proto::Gnmi for Gnmi {
    async fn capabilities(
        &self,
        _request: Request<CapabilityRequest>,
    ) -> result::Result<Response<CapabilityResponse>, Status> {
        Self::not_implemented("Capabilities")
    }

    async fn get(
        &self,
        _request: Request<GetRequest>,
    ) -> result::Result<Response<GetResponse>, Status> {
        Self::not_implemented("Get")
    }

    async fn set(
        &self,
        _request: Request<SetRequest>,
    ) -> result::Result<Response<SetResponse>, Status> {
        Self::not_implemented("Set")
    }

    type SubscribeStream = ReceiverStream<result::Result<SubscribeResponse, Status>>;

    async fn subscribe(
        &self,
        request: Request<Streaming<SubscribeRequest>>,
    ) -> result::Result<Response<Self::SubscribeStream>, Status> {
        let inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(OUTBOUND_DEPTH);

        tokio::spawn(subscribe::run(self.builder.clone(), inbound, tx));

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

pub async fn serve(
    gnmi: Gnmi,
    security: SecurityContext,
    addr: SocketAddr,
) -> result::Result<(), tonic::transport::Error> {
    let SecurityContext { tls, gate } = security;
    let mut server = Server::builder();

    if let Some(tls) = tls {
        #[cfg(feature = "rustls")]
        {
            info!("serving over TLS");
            server = server.tls_config(tls)?;
        }
        #[cfg(not(feature = "rustls"))]
        match tls {}
    }

    info!("server listening on {addr}");

    server
        .add_service(GnmiServer::with_interceptor(gnmi, gate))
        .serve(addr)
        .await
}
