//! `pexconf join`: join a conference and print what happens in it.

use pexconf_client::{HttpClient, NodeResolver, TokenRequest};
use pexconf_core::ConferenceAddress;
use pexconf_protocol::DomainEvent;
use pexconf_session::{ConferenceSession, RosterEvent, SessionState};
use tracing::{debug, info};

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::secret;

/// Command-line overrides for the token request.
#[derive(Debug, Default)]
pub struct JoinOptions {
    pub name: Option<String>,
    pub pin: Option<String>,
    pub extension: Option<String>,
}

pub async fn run(
    address: ConferenceAddress,
    options: JoinOptions,
    config: &CliConfig,
    http: HttpClient,
    resolver: NodeResolver,
) -> CliResult<()> {
    let request = token_request(options, config)?;
    let session = ConferenceSession::new(address, request)?
        .with_config(config.network.session_config())
        .with_http(http)
        .with_resolver(resolver);

    let mut events = session.subscribe();
    let mut roster = session.subscribe_roster();
    let mut state = session.state();

    session.join().await?;
    println!("joined {}", session.address());

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
            Some(event) = events.recv() => println!("{}", describe_event(&event)),
            Some(change) = roster.recv() => println!("{}", describe_roster(&change)),
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = state.borrow_and_update().clone();
                debug!(state = ?current, "session state");
                match current {
                    SessionState::Error(e) => break Err(e.into()),
                    SessionState::Closed => break Ok(()),
                    _ => {}
                }
            }
        }
    };

    session.leave().await;
    println!("left {}", session.address());
    result
}

fn token_request(options: JoinOptions, config: &CliConfig) -> CliResult<TokenRequest> {
    let name = options
        .name
        .unwrap_or_else(|| config.identity.display_name.clone());
    let mut request = TokenRequest::new(name);

    if let Some(pin) = options.pin.or_else(|| config.conference.pin.clone()) {
        request = request.with_pin(secret::resolve(&pin)?);
    }
    if let Some(extension) = options
        .extension
        .or_else(|| config.conference.conference_extension.clone())
    {
        request = request.with_conference_extension(extension);
    }
    Ok(request)
}

fn describe_event(event: &DomainEvent) -> String {
    match event {
        DomainEvent::MessageReceived(message) => {
            format!("[chat] {}: {}", message.sender_name, message.payload)
        }
        DomainEvent::ConferenceUpdate(status) => format!(
            "[conference] started={} locked={} guests_muted={} live_captions={}",
            status.started, status.locked, status.guests_muted, status.live_captions_available
        ),
        DomainEvent::PresentationStart(start) => {
            format!("[presentation] {} started presenting", start.presenter_name)
        }
        DomainEvent::PresentationStop => "[presentation] stopped".to_string(),
        DomainEvent::LiveCaptions(captions) if captions.is_final => {
            format!("[captions] {}", captions.data)
        }
        DomainEvent::ClientDisconnected(disconnect) => {
            format!("[disconnected] {}", disconnect.reason)
        }
        other => format!("[event] {}", other.name().as_str()),
    }
}

fn describe_roster(change: &RosterEvent) -> String {
    match change {
        RosterEvent::Reloaded(participants) => {
            let names: Vec<_> = participants
                .iter()
                .map(|p| p.display_name.as_str())
                .collect();
            format!("[roster] {} present: {}", names.len(), names.join(", "))
        }
        RosterEvent::Added(p) => format!("[roster] + {}", p.display_name),
        RosterEvent::Updated(p) => format!("[roster] ~ {}", p.display_name),
        RosterEvent::Deleted(p) => format!("[roster] - {}", p.display_name),
    }
}

#[cfg(test)]
mod tests {
    use pexconf_protocol::{ChatMessage, Participant};

    use super::*;

    #[test]
    fn flags_override_config() {
        let mut config = CliConfig::default();
        config.identity.display_name = "Configured".to_string();
        config.conference.conference_extension = Some("1000".to_string());

        let request = token_request(
            JoinOptions {
                name: Some("Alice".to_string()),
                pin: Some("1234".to_string()),
                extension: None,
            },
            &config,
        )
        .unwrap();
        assert_eq!(request.display_name, "Alice");
        assert_eq!(request.pin.as_deref(), Some("1234"));
        assert_eq!(request.conference_extension.as_deref(), Some("1000"));

        let request = token_request(JoinOptions::default(), &config).unwrap();
        assert_eq!(request.display_name, "Configured");
        assert!(request.pin.is_none());
    }

    #[test]
    fn pin_reference_is_resolved() {
        unsafe {
            std::env::set_var("_PEXCONF_JOIN_TEST_PIN", "9999");
        }
        let mut config = CliConfig::default();
        config.conference.pin = Some("env::_PEXCONF_JOIN_TEST_PIN".to_string());

        let request = token_request(JoinOptions::default(), &config).unwrap();
        assert_eq!(request.pin.as_deref(), Some("9999"));
        unsafe {
            std::env::remove_var("_PEXCONF_JOIN_TEST_PIN");
        }
    }

    #[test]
    fn describes_events() {
        let message = DomainEvent::MessageReceived(ChatMessage::text("Bob", "p-2", "hi"));
        assert_eq!(describe_event(&message), "[chat] Bob: hi");
        assert_eq!(
            describe_event(&DomainEvent::PeerDisconnected),
            "[event] peer_disconnect"
        );

        let bob: Participant = serde_json::from_value(serde_json::json!({
            "uuid": "p-2", "display_name": "Bob", "role": "guest", "call_direction": "out"
        }))
        .unwrap();
        assert_eq!(
            describe_roster(&RosterEvent::Reloaded(vec![bob.clone()])),
            "[roster] 1 present: Bob"
        );
        assert_eq!(describe_roster(&RosterEvent::Deleted(bob)), "[roster] - Bob");
    }
}
