//! `pexconf resolve`: print the nodes serving a conference.

use pexconf_client::{NodeEndpoint, NodeResolver};
use pexconf_core::ConferenceAddress;

use crate::error::CliResult;

pub async fn run(address: &ConferenceAddress, resolver: &NodeResolver) -> CliResult<()> {
    let nodes = resolver.resolve(address.host()).await?;
    print!("{}", render(&nodes));
    Ok(())
}

fn render(nodes: &[NodeEndpoint]) -> String {
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| format!("{}. {node}\n", i + 1))
        .collect()
}
