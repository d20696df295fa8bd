use meshroom_core::{Member, MemberId};
use std::collections::HashMap;
use tracing::debug;

/// Members currently present in the room, excluding ourselves.
pub struct MemberDirectory {
    local_id: MemberId,
    members: HashMap<MemberId, Member>,
}

impl MemberDirectory {
    pub fn new(local_id: MemberId) -> Self {
        Self {
            local_id,
            members: HashMap::new(),
        }
    }

    pub fn local_id(&self) -> &MemberId {
        &self.local_id
    }

    /// Returns `true` when `member` was not known before.
    /// Our own presence and repeated joins are ignored.
    pub fn on_member_joined(&mut self, member: Member) -> bool {
        if member.id == self.local_id {
            debug!("Skipping self-join of {}", member.id);
            return false;
        }
        if self.members.contains_key(&member.id) {
            debug!("Member {} already known", member.id);
            return false;
        }
        self.members.insert(member.id.clone(), member);
        true
    }

    pub fn on_member_left(&mut self, member_id: &MemberId) -> Option<Member> {
        self.members.remove(member_id)
    }

    pub fn lookup(&self, member_id: &MemberId) -> Option<&Member> {
        self.members.get(member_id)
    }

    pub fn contains(&self, member_id: &MemberId) -> bool {
        self.members.contains_key(member_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Snapshot ordered by member id.
    pub fn members(&self) -> Vec<Member> {
        let mut members: Vec<_> = self.members.values().cloned().collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }
}
