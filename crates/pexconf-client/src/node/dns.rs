//! DNS lookups used by the node resolver.

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::proto::serialize::binary::BinEncodable;
use tracing::{debug, warn};

use crate::BoxFuture;
use crate::error::{NodeError, NodeResult};

/// Source of raw DNS record data.
///
/// Implementations return the RDATA of each answer, which the resolver
/// decodes itself. A name without records yields an empty list.
pub trait DnsLookup: Send + Sync {
    /// Returns the RDATA of the SRV records for `name`.
    fn srv_records<'a>(&'a self, name: &'a str) -> BoxFuture<'a, NodeResult<Vec<Vec<u8>>>>;

    /// Returns the RDATA of the A records for `name`.
    fn a_records<'a>(&'a self, name: &'a str) -> BoxFuture<'a, NodeResult<Vec<Vec<u8>>>>;
}

/// [`DnsLookup`] backed by the system resolver.
pub struct HickoryDnsLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsLookup {
    /// Uses the system resolver configuration, falling back to the
    /// library defaults if it cannot be read.
    pub fn from_system_conf() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read system DNS configuration, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }

    /// Wraps an existing resolver.
    pub fn new(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }

    async fn lookup(&self, name: &str, record_type: RecordType) -> NodeResult<Vec<Vec<u8>>> {
        let lookup = match self.resolver.lookup(name, record_type).await {
            Ok(lookup) => lookup,
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                debug!(name = %name, record_type = %record_type, "no records");
                return Ok(Vec::new());
            }
            Err(e) => return Err(NodeError::lookup(e.to_string())),
        };

        let mut records = Vec::new();
        for record in lookup.record_iter() {
            if record.record_type() != record_type {
                continue;
            }
            let Some(data) = record.data() else {
                continue;
            };
            match data.to_bytes() {
                Ok(bytes) => records.push(bytes),
                Err(e) => warn!(name = %name, error = %e, "failed to encode record data"),
            }
        }
        Ok(records)
    }
}

impl Default for HickoryDnsLookup {
    fn default() -> Self {
        Self::from_system_conf()
    }
}

impl DnsLookup for HickoryDnsLookup {
    fn srv_records<'a>(&'a self, name: &'a str) -> BoxFuture<'a, NodeResult<Vec<Vec<u8>>>> {
        Box::pin(self.lookup(name, RecordType::SRV))
    }

    fn a_records<'a>(&'a self, name: &'a str) -> BoxFuture<'a, NodeResult<Vec<Vec<u8>>>> {
        Box::pin(self.lookup(name, RecordType::A))
    }
}
