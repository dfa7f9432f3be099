use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Status, StatusClass},
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket, Route,
};

use crate::error::AuthFailure;

/// A unique identifier for a particular request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Atomically get the next ID. Wraps back to zero on overflow.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Allow the ID to be accessed via request guard.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestId::next))
    }
}

/// Logs every request and response, tagged with the request's ID.
///
/// Responses rejected by the authentication guard also name the reason, so
/// that failed sign-ins can be traced without logging the token itself.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

/// `name (uri)` for a matched route.
fn describe_route(route: Option<&Route>) -> String {
    match route {
        Some(r) => match r.name {
            Some(ref name) => format!("{name} ({})", r.uri),
            None => r.uri.to_string(),
        },
        None => "UNKNOWN ROUTE".to_string(),
    }
}

fn response_line(id: RequestId, code: Status, route: &str, auth: &AuthFailure) -> String {
    match auth.0 {
        Some(ref rejected) => format!("<-rsp{id} {code} {route} [{}]", rejected.code),
        None => format!("<-rsp{id} {code} {route}"),
    }
}

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!(
            "Server launched on {protocol}://{ip}:{port} with {} routes",
            rocket.routes().count()
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = req.local_cache(RequestId::next);
        info!("->req{id} {} {}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = *req.local_cache(RequestId::next);
        let code = res.status();
        let route = describe_route(req.route());
        let auth = req.local_cache(AuthFailure::default);
        let line = response_line(id, code, &route, auth);
        match code.class() {
            StatusClass::ServerError => error!("{line}"),
            StatusClass::ClientError => warn!("{line}"),
            _ => info!("{line}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}
