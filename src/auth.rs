use std::str::FromStr;
use std::sync::Arc;

use base64_light::base64_decode;
use log::{error, trace};
use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::gnmi::Error;

/// A username and password presented by a client.
pub struct Auth {
    user: String,
    pass: String,
}

/// The credentials a client must present.
pub struct Credentials {
    user: String,
    pwhash: String,
}

impl FromStr for Auth {
    type Err = &'static str;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let (basic, auth_b64) = header
            .split_once(' ')
            .ok_or("no space in auth header")?;

        if basic != "Basic" {
            return Err("only basic auth supported");
        }

        let auth_bytes = base64_decode(auth_b64);
        let auth = std::str::from_utf8(&auth_bytes)
            .map_err(|e| {
                error!("invalid utf-8 for password: {e:?}");
                "none-utf8 in auth header"
            })?;

        let (user, pass) = auth.split_once(':')
            .ok_or("no colon in auth value")?;

        let user = user.into();
        let pass = pass.into();

        Ok(Self { user, pass })
    }
}

impl Auth {
    /// gNMI clients send `username` and `password` metadata; an
    /// `authorization: Basic ...` header is accepted too.
    pub fn from_metadata(metadata: &MetadataMap) -> Result<Self, &'static str> {
        let get = |key: &str| metadata.get(key).and_then(|v| v.to_str().ok());

        match (get("username"), get("password")) {
            (Some(user), Some(pass)) => Ok(Self {
                user: user.into(),
                pass: pass.into(),
            }),
            (Some(_), None) | (None, Some(_)) => Err("username and password must both be sent"),
            (None, None) => get("authorization")
                .ok_or("no credentials sent")?
                .parse(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

impl Credentials {
    pub fn new(user: &str, pass: &str) -> Self {
        Self {
            user: user.into(),
            pwhash: sha256::digest(pass),
        }
    }

    pub fn admits(&self, attempt: &Auth) -> bool {
        attempt.user == self.user && sha256::digest(attempt.pass.as_str()) == self.pwhash
    }
}

/// Checks every RPC against the configured credentials, if any.
#[derive(Clone)]
pub struct Gate(Option<Arc<Credentials>>);

impl Gate {
    pub fn open() -> Self {
        Self(None)
    }

    pub fn new(credentials: Credentials) -> Self {
        Self(Some(Arc::new(credentials)))
    }
}

impl Interceptor for Gate {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let Some(ref credentials) = self.0 else {
            return Ok(request);
        };

        let attempt = Auth::from_metadata(request.metadata()).map_err(|e| {
            error!("rejecting request: {e}");
            Status::from(Error::Unauthenticated)
        })?;

        if !credentials.admits(&attempt) {
            error!("wrong username or password for user {}", attempt.user());
            return Err(Error::Unauthenticated.into());
        }

        trace!("{} authenticated", attempt.user());
        Ok(request)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(pairs: &[(&'static str, &str)]) -> Request<()> {
        let mut request = Request::new(());
        for &(key, value) in pairs {
            request.metadata_mut().insert(key, value.parse().unwrap());
        }
        request
    }

    fn gate() -> Gate {
        Gate::new(Credentials::new("admin", "secret"))
    }

    #[test]
    fn parses_basic_header() {
        // admin:secret
        let auth: Auth = "Basic YWRtaW46c2VjcmV0".parse().unwrap();
        assert_eq!(auth.user, "admin");
        assert_eq!(auth.pass, "secret");

        assert!("Bearer abc".parse::<Auth>().is_err());
        assert!("Basic".parse::<Auth>().is_err());
    }

    #[test]
    fn open_gate_admits_everyone() {
        assert!(Gate::open().call(request(&[])).is_ok());
    }

    #[test]
    fn admits_metadata_credentials() {
        let admitted = gate().call(request(&[("username", "admin"), ("password", "secret")]));
        assert!(admitted.is_ok());
    }

    #[test]
    fn admits_basic_header() {
        let admitted = gate().call(request(&[("authorization", "Basic YWRtaW46c2VjcmV0")]));
        assert!(admitted.is_ok());
    }

    #[test]
    fn rejects_bad_credentials() {
        let cases: [&[(&'static str, &str)]; 4] = [
            &[],
            &[("username", "admin")],
            &[("username", "admin"), ("password", "wrong")],
            &[("username", "root"), ("password", "secret")],
        ];

        for pairs in cases {
            let status = gate().call(request(pairs)).unwrap_err();
            assert_eq!(status.code(), tonic::Code::Unauthenticated);
        }
    }
}
