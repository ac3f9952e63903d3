//! Decoding of DNS SRV and A record data.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{NodeError, NodeResult};

/// Size of the fixed SRV fields (priority, weight, port).
const SRV_FIXED_LEN: usize = 6;

/// A decoded SRV record (RFC 2782).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    /// Target host name without the trailing dot, or `.` for the root.
    pub target: String,
}

impl SrvRecord {
    /// Decodes SRV RDATA: three big-endian u16 followed by the target name
    /// as length-prefixed labels.
    pub fn decode(data: &[u8]) -> NodeResult<Self> {
        if data.len() <= SRV_FIXED_LEN {
            return Err(NodeError::InvalidSrvRecord(format!(
                "{} bytes is too short",
                data.len()
            )));
        }

        let priority = u16::from_be_bytes([data[0], data[1]]);
        let weight = u16::from_be_bytes([data[2], data[3]]);
        let port = u16::from_be_bytes([data[4], data[5]]);
        let target = decode_name(&data[SRV_FIXED_LEN..])?;

        Ok(Self {
            priority,
            weight,
            port,
            target,
        })
    }

    /// Returns true if the target is the root, meaning "no service".
    pub fn is_root(&self) -> bool {
        self.target == "."
    }
}

fn decode_name(mut data: &[u8]) -> NodeResult<String> {
    let mut labels = Vec::new();
    loop {
        let Some((&len, rest)) = data.split_first() else {
            return Err(NodeError::InvalidSrvRecord(
                "target name is not terminated".to_string(),
            ));
        };
        let len = usize::from(len);
        if len == 0 {
            break;
        }
        // Compression pointers are not valid in SRV targets.
        if len > 63 || rest.len() < len {
            return Err(NodeError::InvalidSrvRecord(format!(
                "invalid label length {len}"
            )));
        }
        let label = std::str::from_utf8(&rest[..len])
            .map_err(|_| NodeError::InvalidSrvRecord("label is not ASCII".to_string()))?;
        labels.push(label.to_ascii_lowercase());
        data = &rest[len..];
    }

    if labels.is_empty() {
        Ok(".".to_string())
    } else {
        Ok(labels.join("."))
    }
}

/// A decoded A record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ARecord {
    pub address: Ipv4Addr,
}

impl ARecord {
    /// Decodes A RDATA, which must be exactly 4 bytes.
    pub fn decode(data: &[u8]) -> NodeResult<Self> {
        let octets: [u8; 4] = data
            .try_into()
            .map_err(|_| NodeError::InvalidARecord(data.len()))?;
        Ok(Self {
            address: Ipv4Addr::from(octets),
        })
    }
}

impl fmt::Display for ARecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

#[cfg(test)]
pub(crate) fn encode_srv(priority: u16, weight: u16, port: u16, target: &str) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&priority.to_be_bytes());
    data.extend_from_slice(&weight.to_be_bytes());
    data.extend_from_slice(&port.to_be_bytes());
    for label in target.split('.').filter(|l| !l.is_empty()) {
        data.push(label.len() as u8);
        data.extend_from_slice(label.as_bytes());
    }
    data.push(0);
    data
}
