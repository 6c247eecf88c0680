use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// The address to listen on. By default gnmi-server
    /// listens on every IPv4 interface.
    #[arg(short, long)]
    address: Option<String>,

    /// The port to listen on.
    #[arg(short = 'P', long, default_value_t = 50051)]
    port: u16,

    /// Username clients must present.
    #[arg(short, long)]
    username: Option<String>,

    /// Password clients must present.
    #[arg(short, long)]
    password: Option<String>,

    /// Path to the server's PEM private key.
    #[arg(short = 'k', long)]
    private_key: Option<PathBuf>,

    /// Path to the server's PEM certificate chain.
    #[arg(short, long)]
    cert_chain: Option<PathBuf>,

    /// No TLS and no username/password check.
    #[arg(short, long)]
    force_insecure: bool,

    /// Counters dump the stats backend reads from.
    #[arg(short, long)]
    stats_file: PathBuf,

    /// Path element appended to the prefix of every notification.
    #[arg(short, long)]
    measurement: Option<String>,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("0.0.0.0")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn insecure(&self) -> bool {
        self.force_insecure
    }

    /// Key and certificate paths, when both were given.
    pub fn tls_paths(&self) -> Result<Option<(&PathBuf, &PathBuf)>, &'static str> {
        match (&self.private_key, &self.cert_chain) {
            (Some(key), Some(cert)) => Ok(Some((key, cert))),
            (None, None) => Ok(None),
            _ => Err("both private key and certificate required"),
        }
    }

    pub fn user_pass(&self) -> Result<Option<(&str, &str)>, &'static str> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Ok(Some((user, pass))),
            (None, None) => Ok(None),
            _ => Err("both username and password required"),
        }
    }

    pub fn stats_file(&self) -> &PathBuf {
        &self.stats_file
    }

    pub fn measurement(&self) -> Option<&str> {
        self.measurement.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(["gnmi-server"].iter().chain(args)).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["-s", "/run/stats.json"]);

        assert_eq!(args.addr().unwrap(), "0.0.0.0:50051".parse().unwrap());
        assert!(!args.insecure());
        assert_eq!(args.tls_paths(), Ok(None));
        assert_eq!(args.user_pass(), Ok(None));
        assert_eq!(args.measurement(), None);
    }

    #[test]
    fn stats_file_is_required() {
        assert!(Args::try_parse_from(["gnmi-server"]).is_err());
    }

    #[test]
    fn pairs_must_be_complete() {
        let args = parse(&["-s", "x", "-u", "admin", "-k", "key.pem"]);

        assert!(args.user_pass().is_err());
        assert!(args.tls_paths().is_err());
    }

    #[test]
    fn listen_address() {
        let args = parse(&["-s", "x", "-a", "127.0.0.1", "-P", "9339"]);
        assert_eq!(args.addr().unwrap(), "127.0.0.1:9339".parse().unwrap());

        let args = parse(&["-s", "x", "-a", "not-an-ip"]);
        assert!(args.addr().is_err());
    }
}
