//! Node discovery and node-level requests.
//!
//! - [`NodeResolver`] maps a conference host to [`NodeEndpoint`](crate::NodeEndpoint)s
//! - [`DnsLookup`] is the seam to the DNS, implemented by [`HickoryDnsLookup`]
//! - [`NodeClient`] checks node availability

mod dns;
mod records;
mod resolver;
mod status;

pub use dns::{DnsLookup, HickoryDnsLookup};
pub use records::{ARecord, SrvRecord};
pub use resolver::{NodeResolver, SRV_SERVICE, sort_srv};
pub use status::NodeClient;

#[cfg(test)]
pub(crate) use records::encode_srv;
#[cfg(test)]
pub(crate) use resolver::tests::FakeDns;
