use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::handler::{Confirmation, PaymentConfirmationHandler};
use crate::signature::SIGNATURE_HEADER;

/// Cooperative shutdown flag shared between the runtime and the server.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self { sender, receiver }
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow() {
            if receiver.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch the webhook gateway alongside the rest of the runtime.
pub fn spawn_gateway(
    addr: SocketAddr,
    webhook_path: String,
    handler: Arc<PaymentConfirmationHandler>,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    info!(%addr, path = %webhook_path, "starting payment webhook gateway");
    tokio::spawn(async move {
        let make_svc = make_service_fn(move |_conn| {
            let handler = handler.clone();
            let path = webhook_path.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    route(handler.clone(), path.clone(), req)
                }))
            }
        });
        let wait = shutdown.clone();
        if let Err(err) = Server::bind(&addr)
            .serve(make_svc)
            .with_graceful_shutdown(async move { wait.wait().await })
            .await
        {
            warn!(error = %err, "webhook gateway exited with error");
        }
    })
}

async fn route(
    handler: Arc<PaymentConfirmationHandler>,
    webhook_path: String,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, path) if path == webhook_path => confirm(handler, req).await,
        (&Method::GET, "/healthz") => text(StatusCode::OK, "ok"),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response)
}

async fn confirm(
    handler: Arc<PaymentConfirmationHandler>,
    req: Request<Body>,
) -> Response<Body> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to read webhook body");
            return text(StatusCode::BAD_REQUEST, "unreadable body");
        }
    };

    // The vault is synchronous SQLite; keep it off the reactor threads.
    let outcome = tokio::task::spawn_blocking(move || {
        handler.confirm(signature.as_deref(), &body)
    })
    .await;

    match outcome {
        Ok(Confirmation::Unauthorized) => text(StatusCode::UNAUTHORIZED, "invalid signature"),
        Ok(Confirmation::Retry(reason)) => {
            text(StatusCode::INTERNAL_SERVER_ERROR, &format!("webhook error: {reason}"))
        }
        Ok(_) => text(StatusCode::OK, "webhook received"),
        Err(err) => {
            warn!(error = %err, "webhook worker task failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn text(status: StatusCode, body: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(body.to_owned()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
