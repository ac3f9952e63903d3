//! `pexconf status`: check the nodes serving a conference.

use pexconf_client::{NodeClient, NodeResolver, NodeResult};
use pexconf_core::ConferenceAddress;

use crate::error::CliResult;

pub async fn run(
    address: &ConferenceAddress,
    resolver: &NodeResolver,
    client: &NodeClient,
) -> CliResult<()> {
    for node in resolver.resolve(address.host()).await? {
        println!("{node}: {}", describe(&client.status(&node).await));
    }
    Ok(())
}

fn describe(status: &NodeResult<bool>) -> String {
    match status {
        Ok(true) => "available".to_string(),
        Ok(false) => "in maintenance".to_string(),
        Err(e) => format!("error: {e}"),
    }
}
