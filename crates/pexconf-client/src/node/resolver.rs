//! Resolution of a conference host into candidate node endpoints.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::dns::{DnsLookup, HickoryDnsLookup};
use super::records::{ARecord, SrvRecord};
use crate::endpoint::NodeEndpoint;
use crate::error::{NodeError, NodeResult};

/// Service label queried for conferencing nodes.
pub const SRV_SERVICE: &str = "_pexapp._tcp";

const HTTPS_PORT: u16 = 443;

/// Turns a host into an ordered list of node endpoints.
///
/// SRV records under `_pexapp._tcp.<host>` win whenever any exist. Only when
/// there are none is `<host>` looked up as an A record.
#[derive(Clone)]
pub struct NodeResolver {
    dns: Arc<dyn DnsLookup>,
}

impl NodeResolver {
    /// Creates a resolver over the given DNS source.
    pub fn new(dns: Arc<dyn DnsLookup>) -> Self {
        Self { dns }
    }

    /// Creates a resolver over the system DNS configuration.
    pub fn system() -> Self {
        Self::new(Arc::new(HickoryDnsLookup::from_system_conf()))
    }

    /// Resolves `host` into node endpoints, best candidate first.
    #[instrument(skip(self))]
    pub async fn resolve(&self, host: &str) -> NodeResult<Vec<NodeEndpoint>> {
        let host = host.trim_end_matches('.');

        let srv = self.srv_records(host).await;
        if !srv.is_empty() {
            let endpoints = srv
                .iter()
                .map(|record| endpoint_for(&record.target, record.port))
                .collect::<NodeResult<Vec<_>>>()?;
            debug!(count = endpoints.len(), "resolved nodes from SRV records");
            return Ok(endpoints);
        }

        let a = self.a_records(host).await;
        if let Some(record) = a.first() {
            let endpoint = endpoint_for(&record.to_string(), HTTPS_PORT)?;
            debug!(node = %endpoint, "resolved node from A record");
            return Ok(vec![endpoint]);
        }

        Err(NodeError::NodeNotFound(host.to_string()))
    }

    /// Valid SRV records for the host, sorted. Lookup failures count as none.
    async fn srv_records(&self, host: &str) -> Vec<SrvRecord> {
        let name = format!("{SRV_SERVICE}.{host}");
        let raw = match self.dns.srv_records(&name).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(name = %name, error = %e, "SRV lookup failed");
                return Vec::new();
            }
        };

        let mut records: Vec<SrvRecord> = raw
            .iter()
            .filter_map(|data| match SrvRecord::decode(data) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(name = %name, error = %e, "skipping SRV record");
                    None
                }
            })
            .collect();

        if records.len() == 1 && records[0].is_root() {
            debug!(name = %name, "service explicitly unavailable");
            return Vec::new();
        }
        records.retain(|record| !record.is_root());

        sort_srv(&mut records);
        records
    }

    async fn a_records(&self, host: &str) -> Vec<ARecord> {
        let raw = match self.dns.a_records(host).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(host = %host, error = %e, "A lookup failed");
                return Vec::new();
            }
        };

        raw.iter()
            .filter_map(|data| match ARecord::decode(data) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(host = %host, error = %e, "skipping A record");
                    None
                }
            })
            .collect()
    }
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::system()
    }
}

/// Orders by priority ascending, then weight descending.
pub fn sort_srv(records: &mut [SrvRecord]) {
    records.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.weight.cmp(&a.weight))
    });
}

fn endpoint_for(target: &str, port: u16) -> NodeResult<NodeEndpoint> {
    let url = if port == HTTPS_PORT {
        format!("https://{target}")
    } else {
        format!("https://{target}:{port}")
    };
    NodeEndpoint::parse(&url)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::BoxFuture;
    use crate::node::records::encode_srv;

    /// In-memory DNS for tests.
    #[derive(Default)]
    pub(crate) struct FakeDns {
        pub srv: HashMap<String, NodeResult<Vec<Vec<u8>>>>,
        pub a: HashMap<String, NodeResult<Vec<Vec<u8>>>>,
    }

    impl FakeDns {
        pub fn with_srv(mut self, name: &str, records: Vec<Vec<u8>>) -> Self {
            self.srv.insert(name.to_string(), Ok(records));
            self
        }

        pub fn with_a(mut self, name: &str, records: Vec<Vec<u8>>) -> Self {
            self.a.insert(name.to_string(), Ok(records));
            self
        }

        fn get(map: &HashMap<String, NodeResult<Vec<Vec<u8>>>>, name: &str) -> NodeResult<Vec<Vec<u8>>> {
            map.get(name).cloned().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    impl DnsLookup for FakeDns {
        fn srv_records<'a>(&'a self, name: &'a str) -> BoxFuture<'a, NodeResult<Vec<Vec<u8>>>> {
            Box::pin(async move { Self::get(&self.srv, name) })
        }

        fn a_records<'a>(&'a self, name: &'a str) -> BoxFuture<'a, NodeResult<Vec<Vec<u8>>>> {
            Box::pin(async move { Self::get(&self.a, name) })
        }
    }

    fn resolver(dns: FakeDns) -> NodeResolver {
        NodeResolver::new(Arc::new(dns))
    }

    fn urls(endpoints: &[NodeEndpoint]) -> Vec<String> {
        endpoints.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn sorts_by_priority_then_weight() {
        let mut records = vec![
            SrvRecord {
                priority: 2,
                weight: 10,
                port: 443,
                target: "a".into(),
            },
            SrvRecord {
                priority: 1,
                weight: 10,
                port: 443,
                target: "b".into(),
            },
            SrvRecord {
                priority: 2,
                weight: 20,
                port: 443,
                target: "c".into(),
            },
        ];
        sort_srv(&mut records);
        let targets: Vec<_> = records.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["b", "c", "a"]);
    }

    #[tokio::test]
    async fn resolves_srv_target() {
        let dns = FakeDns::default().with_srv(
            "_pexapp._tcp.example.com",
            vec![encode_srv(10, 10, 443, "px01.vc.example.com")],
        );
        let endpoints = resolver(dns).resolve("example.com").await.unwrap();
        assert_eq!(urls(&endpoints), ["https://px01.vc.example.com"]);
    }

    #[tokio::test]
    async fn srv_ordering_and_ports() {
        let dns = FakeDns::default().with_srv(
            "_pexapp._tcp.example.com",
            vec![
                encode_srv(2, 10, 443, "low.example.com"),
                encode_srv(1, 10, 8443, "first.example.com"),
                encode_srv(2, 20, 443, "heavy.example.com"),
            ],
        );
        let endpoints = resolver(dns).resolve("example.com").await.unwrap();
        assert_eq!(
            urls(&endpoints),
            [
                "https://first.example.com:8443",
                "https://heavy.example.com",
                "https://low.example.com",
            ]
        );
    }

    #[tokio::test]
    async fn never_falls_back_when_srv_exists() {
        let dns = FakeDns::default()
            .with_srv(
                "_pexapp._tcp.example.com",
                vec![encode_srv(1, 1, 443, "node.example.com")],
            )
            .with_a("example.com", vec![vec![198, 51, 100, 40]]);
        let endpoints = resolver(dns).resolve("example.com").await.unwrap();
        assert_eq!(urls(&endpoints), ["https://node.example.com"]);
    }

    #[tokio::test]
    async fn falls_back_to_first_a_record() {
        let dns = FakeDns::default().with_a(
            "example.com",
            vec![vec![198, 51, 100, 40], vec![198, 51, 100, 41]],
        );
        let endpoints = resolver(dns).resolve("example.com").await.unwrap();
        assert_eq!(urls(&endpoints), ["https://198.51.100.40"]);
    }

    #[tokio::test]
    async fn srv_errors_and_root_target_fall_back() {
        let mut dns = FakeDns::default().with_a("example.com", vec![vec![10, 0, 0, 1]]);
        dns.srv.insert(
            "_pexapp._tcp.example.com".into(),
            Err(NodeError::lookup("SERVFAIL")),
        );
        let endpoints = resolver(dns).resolve("example.com").await.unwrap();
        assert_eq!(urls(&endpoints), ["https://10.0.0.1"]);

        let dns = FakeDns::default()
            .with_srv("_pexapp._tcp.example.com", vec![encode_srv(0, 0, 0, ".")])
            .with_a("example.com", vec![vec![10, 0, 0, 2]]);
        let endpoints = resolver(dns).resolve("example.com").await.unwrap();
        assert_eq!(urls(&endpoints), ["https://10.0.0.2"]);
    }

    #[tokio::test]
    async fn skips_invalid_records() {
        let dns = FakeDns::default()
            .with_srv(
                "_pexapp._tcp.example.com",
                vec![vec![0, 1, 2], encode_srv(1, 1, 443, "ok.example.com")],
            )
            .with_a("example.com", vec![vec![1, 2, 3]]);
        let endpoints = resolver(dns).resolve("example.com").await.unwrap();
        assert_eq!(urls(&endpoints), ["https://ok.example.com"]);
    }

    #[tokio::test]
    async fn nothing_found() {
        let result = resolver(FakeDns::default()).resolve("example.com").await;
        assert_eq!(result, Err(NodeError::NodeNotFound("example.com".into())));
    }
}
