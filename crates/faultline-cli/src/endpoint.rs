use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

/// Error that can occur when parsing or resolving an endpoint.
#[derive(thiserror::Error, Debug)]
pub enum EndpointError {
    /// The endpoint is not of the form `proto:host:port`.
    #[error("malformed endpoint {0:?} (expected `tcp:host:port`)")]
    Malformed(String),

    /// The endpoint names a protocol other than TCP.
    #[error("unsupported protocol {0:?} (only `tcp` is supported)")]
    UnsupportedProtocol(String),

    /// The port is not a valid number.
    #[error("invalid port {0:?}")]
    InvalidPort(String),

    /// The host did not resolve to any address.
    #[error("host {0:?} did not resolve")]
    Unresolved(String),
}

/// A TCP endpoint of the form `tcp:host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Resolves the endpoint to a socket address.
    pub fn resolve(&self) -> Result<SocketAddr, EndpointError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| EndpointError::Unresolved(self.host.clone()))
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let (Some(proto), Some(host), Some(port)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(EndpointError::Malformed(s.to_owned()));
        };

        if !proto.eq_ignore_ascii_case("tcp") {
            return Err(EndpointError::UnsupportedProtocol(proto.to_owned()));
        }

        if host.is_empty() {
            return Err(EndpointError::Malformed(s.to_owned()));
        }

        let port = port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(port.to_owned()))?;

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tcp:{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::{Endpoint, EndpointError};

    #[test]
    fn parses_tcp_endpoints() {
        let endpoint = "tcp:127.0.0.1:8080".parse::<Endpoint>().unwrap();
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 8080);

        let endpoint = "TCP:localhost:25".parse::<Endpoint>().unwrap();
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 25);
    }

    #[test]
    fn rejects_other_protocols() {
        assert!(matches!(
            "udp:127.0.0.1:53".parse::<Endpoint>(),
            Err(EndpointError::UnsupportedProtocol(proto)) if proto == "udp"
        ));
        assert!(matches!(
            "unix:/tmp/sock:0".parse::<Endpoint>(),
            Err(EndpointError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn rejects_malformed_endpoints() {
        assert!(matches!(
            "127.0.0.1:8080".parse::<Endpoint>(),
            Err(EndpointError::Malformed(_))
        ));
        assert!(matches!("tcp:8080".parse::<Endpoint>(), Err(EndpointError::Malformed(_))));
        assert!(matches!(
            "tcp:host:notaport".parse::<Endpoint>(),
            Err(EndpointError::InvalidPort(_))
        ));
        assert!(matches!("tcp::99".parse::<Endpoint>(), Err(EndpointError::Malformed(_))));
    }

    #[test]
    fn resolves_literal_addresses() {
        let endpoint = "tcp:127.0.0.1:8080".parse::<Endpoint>().unwrap();
        assert_eq!(endpoint.resolve().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn displays_in_parseable_form() {
        let endpoint = "tcp:example.org:443".parse::<Endpoint>().unwrap();
        assert_eq!(endpoint.to_string(), "tcp:example.org:443");
    }
}
