//! Participant roster maintained from `participant_*` events.

use pexconf_protocol::{DomainEvent, Participant};
use tracing::{debug, trace};

/// A change to the roster, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterEvent {
    /// A full sync finished; this is the complete list.
    Reloaded(Vec<Participant>),
    Added(Participant),
    Updated(Participant),
    Deleted(Participant),
}

/// The participants of a conference, in join order.
///
/// Between `participant_sync_begin` and `participant_sync_end` changes are
/// collected silently and reported once as [`RosterEvent::Reloaded`].
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
    me: Option<String>,
    syncing: bool,
}

impl Roster {
    /// Creates an empty roster for the participant with id `me`.
    pub fn new(me: Option<String>) -> Self {
        Self {
            participants: Vec::new(),
            me,
            syncing: false,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// The local participant, once it appears in the roster.
    pub fn me(&self) -> Option<&Participant> {
        self.me.as_deref().and_then(|id| self.get(id))
    }

    pub fn is_me(&self, participant: &Participant) -> bool {
        self.me.as_deref() == Some(participant.id.as_str())
    }

    /// Applies a roster event. Returns what subscribers should be told, if
    /// anything.
    pub fn apply(&mut self, event: &DomainEvent) -> Option<RosterEvent> {
        match event {
            DomainEvent::ParticipantSyncBegin => {
                debug!("participant sync started");
                self.participants.clear();
                self.syncing = true;
                None
            }
            DomainEvent::ParticipantSyncEnd => {
                debug!(count = self.participants.len(), "participant sync finished");
                self.syncing = false;
                Some(RosterEvent::Reloaded(self.participants.clone()))
            }
            DomainEvent::ParticipantCreate(participant) => {
                let change = self.upsert(participant.clone());
                self.notify(change)
            }
            DomainEvent::ParticipantUpdate(participant) => {
                if self.get(&participant.id).is_none() {
                    trace!(id = %participant.id, "update for unknown participant ignored");
                    return None;
                }
                let change = self.upsert(participant.clone());
                self.notify(change)
            }
            DomainEvent::ParticipantDelete(delete) => {
                let Some(index) = self.participants.iter().position(|p| p.id == delete.id) else {
                    trace!(id = %delete.id, "delete for unknown participant ignored");
                    return None;
                };
                let removed = self.participants.remove(index);
                self.notify(RosterEvent::Deleted(removed))
            }
            _ => None,
        }
    }

    /// Drops every participant.
    pub fn clear(&mut self) {
        self.participants.clear();
        self.syncing = false;
    }

    fn upsert(&mut self, participant: Participant) -> RosterEvent {
        match self.participants.iter_mut().find(|p| p.id == participant.id) {
            Some(existing) => {
                *existing = participant.clone();
                RosterEvent::Updated(participant)
            }
            None => {
                self.participants.push(participant.clone());
                RosterEvent::Added(participant)
            }
        }
    }

    fn notify(&self, change: RosterEvent) -> Option<RosterEvent> {
        (!self.syncing).then_some(change)
    }
}

#[cfg(test)]
mod tests {
    use pexconf_protocol::ParticipantDelete;

    use super::*;

    fn participant(id: &str, name: &str) -> Participant {
        serde_json::from_value(serde_json::json!({
            "uuid": id,
            "display_name": name,
            "role": "guest",
            "call_direction": "in",
        }))
        .unwrap()
    }

    fn delete(id: &str) -> DomainEvent {
        DomainEvent::ParticipantDelete(ParticipantDelete { id: id.to_string() })
    }

    #[test]
    fn sync_reports_once() {
        let mut roster = Roster::new(Some("p-2".to_string()));
        roster.apply(&DomainEvent::ParticipantCreate(participant("stale", "Old")));

        assert_eq!(roster.apply(&DomainEvent::ParticipantSyncBegin), None);
        assert!(roster.is_syncing());
        assert_eq!(
            roster.apply(&DomainEvent::ParticipantCreate(participant("p-1", "Alice"))),
            None
        );
        assert_eq!(
            roster.apply(&DomainEvent::ParticipantCreate(participant("p-2", "Bob"))),
            None
        );

        let Some(RosterEvent::Reloaded(list)) = roster.apply(&DomainEvent::ParticipantSyncEnd)
        else {
            panic!("expected a reload");
        };
        let names: Vec<_> = list.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
        assert_eq!(roster.me().map(|p| p.display_name.as_str()), Some("Bob"));
        assert!(roster.is_me(&list[1]));
        assert!(!roster.is_me(&list[0]));
        assert!(roster.get("stale").is_none());
    }

    #[test]
    fn incremental_changes_are_reported() {
        let mut roster = Roster::default();
        assert_eq!(
            roster.apply(&DomainEvent::ParticipantCreate(participant("p-1", "Alice"))),
            Some(RosterEvent::Added(participant("p-1", "Alice")))
        );
        assert_eq!(
            roster.apply(&DomainEvent::ParticipantUpdate(participant("p-1", "Alicia"))),
            Some(RosterEvent::Updated(participant("p-1", "Alicia")))
        );
        assert_eq!(
            roster.apply(&delete("p-1")),
            Some(RosterEvent::Deleted(participant("p-1", "Alicia")))
        );
        assert!(roster.is_empty());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut roster = Roster::default();
        assert_eq!(
            roster.apply(&DomainEvent::ParticipantUpdate(participant("ghost", "Nobody"))),
            None
        );
        assert_eq!(roster.apply(&delete("ghost")), None);
        assert_eq!(roster.apply(&DomainEvent::PresentationStop), None);
        assert!(roster.is_empty());
        assert!(roster.me().is_none());
    }
}
