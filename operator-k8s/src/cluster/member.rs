use std::collections::BTreeMap;

/// One replica participant, 1:1 with a pod
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Member {
    /// Name unique within the cluster, e.g. `cluster-0000`
    pub(crate) name: String,
    /// Peer URL other members dial to reach this one
    pub(crate) peer_url: String,
    /// Client URL clients dial to reach this one
    pub(crate) client_url: String,
    /// Whether this member's lifecycle is externally hosted (migrated in, not seeded)
    pub(crate) self_hosted: bool,
    /// `"new"` for a freshly bootstrapped cluster token holder, `"existing"` for one joining
    pub(crate) state: MemberState,
}

/// Bootstrap state of a member, mirrors the replica process' own `--initial-cluster-state` flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MemberState {
    /// This member is the first in a brand new (or freshly recovered) cluster
    New,
    /// This member is joining a cluster that already has voting members
    Existing,
}

impl Member {
    /// Build the name for the `index`-th member of `cluster_name`
    pub(crate) fn name_for(cluster_name: &str, index: u64) -> String {
        format!("{cluster_name}-{index:04}")
    }
}

impl MemberState {
    /// The value sent to the replica process via [`crate::consts::XLINE_MEMBER_STATE_ENV`]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Existing => "existing",
        }
    }
}

/// The controller's in-memory view of live members, keyed by name
#[derive(Clone, Debug, Default)]
pub(crate) struct MemberSet {
    /// Members ordered by name for deterministic tie-breaking
    members: BTreeMap<String, Member>,
}

impl MemberSet {
    /// An empty set
    pub(crate) fn new() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }

    /// Number of members currently tracked
    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set has no members, the signal that it must be rebuilt from live pods
    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Insert or replace a member
    pub(crate) fn insert(&mut self, member: Member) {
        _ = self.members.insert(member.name.clone(), member);
    }

    /// Remove a member by name
    pub(crate) fn remove(&mut self, name: &str) -> Option<Member> {
        self.members.remove(name)
    }

    /// Look up a member by name
    pub(crate) fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Whether a member with this name is tracked
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Members in lexicographic name order, the tie-break order used by the reconciler
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// The highest-indexed (lexicographically last) member name, if any
    pub(crate) fn last_name(&self) -> Option<&str> {
        self.members.keys().next_back().map(String::as_str)
    }

    /// Discard all members, used when rebuilding from scratch after total loss
    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }
}

#[cfg(test)]
mod test {
    use super::{Member, MemberSet, MemberState};

    fn member(name: &str) -> Member {
        Member {
            name: name.to_owned(),
            peer_url: format!("https://{name}:2380"),
            client_url: format!("https://{name}:2379"),
            self_hosted: false,
            state: MemberState::Existing,
        }
    }

    #[test]
    fn member_state_as_str_matches_sidecar_env_contract() {
        assert_eq!(MemberState::New.as_str(), "new");
        assert_eq!(MemberState::Existing.as_str(), "existing");
    }

    #[test]
    fn name_for_pads_index() {
        assert_eq!(Member::name_for("my-cluster", 0), "my-cluster-0000");
        assert_eq!(Member::name_for("my-cluster", 12), "my-cluster-0012");
    }

    #[test]
    fn last_name_is_lexicographic() {
        let mut set = MemberSet::new();
        set.insert(member("c-0001"));
        set.insert(member("c-0000"));
        set.insert(member("c-0002"));
        assert_eq!(set.last_name(), Some("c-0002"));
    }

    #[test]
    fn insert_remove_round_trip() {
        let mut set = MemberSet::new();
        assert!(set.is_empty());
        set.insert(member("c-0000"));
        assert!(set.contains("c-0000"));
        assert_eq!(set.len(), 1);
        let removed = set.remove("c-0000");
        assert_eq!(removed.map(|m| m.name), Some("c-0000".to_owned()));
        assert!(set.is_empty());
    }
}
