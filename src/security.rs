use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::args::Args;
use crate::auth::{Credentials, Gate};

#[cfg(feature = "rustls")]
pub type Tls = tonic::transport::ServerTlsConfig;
#[cfg(not(feature = "rustls"))]
pub type Tls = std::convert::Infallible;

/// Transport security and the credential check, as configured at startup.
pub struct SecurityContext {
    pub tls: Option<Tls>,
    pub gate: Gate,
}

impl SecurityContext {
    pub fn insecure() -> Self {
        Self {
            tls: None,
            gate: Gate::open(),
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, String> {
        let user_pass = args.user_pass()?;

        if args.insecure() {
            warn!("insecure mode: no TLS, no password authentication");
            return Ok(Self::insecure());
        }

        let (key, cert) = args
            .tls_paths()?
            .ok_or("both private key and certificate required")?;

        let gate = match user_pass {
            Some((user, pass)) => {
                info!("clients must authenticate as {user}");
                Gate::new(Credentials::new(user, pass))
            }
            None => Gate::open(),
        };

        Ok(Self {
            tls: Some(load_tls(key, cert)?),
            gate,
        })
    }
}

fn read(what: &str, path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|e| format!("couldn't read {what} {path:?}: {e}"))
}

#[cfg(feature = "rustls")]
fn load_tls(key: &Path, cert: &Path) -> Result<Tls, String> {
    use tonic::transport::Identity;

    let identity = Identity::from_pem(read("certificate chain", cert)?, read("private key", key)?);
    Ok(Tls::new().identity(identity))
}

#[cfg(not(feature = "rustls"))]
fn load_tls(key: &Path, cert: &Path) -> Result<Tls, String> {
    read("certificate chain", cert)?;
    read("private key", key)?;
    Err("built without TLS support, use --force-insecure".into())
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    fn args(args: &[&str]) -> Args {
        Args::try_parse_from(["gnmi-server", "-s", "stats.json"].iter().chain(args)).unwrap()
    }

    #[test]
    fn insecure_skips_everything() {
        let ctx =
            SecurityContext::from_args(&args(&["-f", "-u", "admin", "-p", "hunter2"])).unwrap();
        assert!(ctx.tls.is_none());
    }

    #[test]
    fn insecure_still_needs_both_credentials() {
        let err = SecurityContext::from_args(&args(&["-f", "-u", "admin"]))
            .err()
            .unwrap();
        assert_eq!(err, "both username and password required");
    }

    #[test]
    fn secure_needs_key_and_cert() {
        let err = SecurityContext::from_args(&args(&[])).err().unwrap();
        assert_eq!(err, "both private key and certificate required");
    }

    #[test]
    fn unreadable_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.pem");
        let cert = dir.path().join("cert.pem");
        fs::write(&cert, "not really a certificate").unwrap();

        let err = SecurityContext::from_args(&args(&[
            "-k",
            key.to_str().unwrap(),
            "-c",
            cert.to_str().unwrap(),
        ]))
        .err()
        .unwrap();

        assert!(err.contains("private key"), "{err}");
    }

    #[test]
    fn half_credentials_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.pem");
        let cert = dir.path().join("cert.pem");
        fs::write(&key, "k").unwrap();
        fs::write(&cert, "c").unwrap();

        let err = SecurityContext::from_args(&args(&[
            "-k",
            key.to_str().unwrap(),
            "-c",
            cert.to_str().unwrap(),
            "-p",
            "hunter2",
        ]))
        .err()
        .unwrap();

        assert_eq!(err, "both username and password required");
    }
}
