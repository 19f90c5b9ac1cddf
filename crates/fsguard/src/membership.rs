// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nix::unistd::{Gid, Group, Uid, User};
use parking_lot::Mutex;

/// Bits of `st_mode` this module cares about: the owner/group/world
/// permission triad, with `setuid`/`setgid`/sticky stripped — those don't
/// affect the read/write discretion we're checking (spec §4.4).
const PERM_MASK: u32 = 0o777;

/// The subset of a file's metadata relevant to a discretionary-access
/// decision. Callers build this from a `stat`/`fstat` result.
#[derive(Debug, Clone, Copy)]
pub struct FileOwnership {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl FileOwnership {
    fn perm_bits(&self) -> u32 {
        self.mode & PERM_MASK
    }
}

struct CacheEntry {
    recorded_at: Instant,
    /// Explicit supplementary members of the group (from the group
    /// database), used to approximate "sole member" for group-write
    /// safety. A user who owns the group as their primary GID but has no
    /// explicit entry is accounted for separately by the caller.
    members: Vec<String>,
}

/// Bounded-TTL cache over OS group-database lookups, so a hot path that
/// checks "am I the sole member of this file's group" a few thousand
/// times per run doesn't hit `getgrgid` that many times.
pub struct GroupMembership {
    ttl: Duration,
    cache: Mutex<HashMap<u32, CacheEntry>>,
}

impl GroupMembership {
    pub fn new(ttl: Duration) -> Self {
        GroupMembership {
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn lookup_members(&self, gid: u32) -> Vec<String> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get(&gid) {
            if entry.recorded_at.elapsed() < self.ttl {
                return entry.members.clone();
            }
        }
        let members = Group::from_gid(Gid::from_raw(gid))
            .ok()
            .flatten()
            .map(|g| g.mem)
            .unwrap_or_default();
        cache.insert(
            gid,
            CacheEntry {
                recorded_at: Instant::now(),
                members: members.clone(),
            },
        );
        members
    }

    fn current_username(&self) -> Option<String> {
        User::from_uid(Uid::current()).ok().flatten().map(|u| u.name)
    }

    pub fn is_current_user_in_group(&self, gid: u32) -> bool {
        if nix::unistd::getgid().as_raw() == gid {
            return true;
        }
        let current = match self.current_username() {
            Some(name) => name,
            None => return false,
        };
        nix::unistd::getgroups()
            .map(|groups| groups.iter().any(|g| g.as_raw() == gid))
            .unwrap_or(false)
            || self.lookup_members(gid).iter().any(|m| m == &current)
    }

    /// Best-effort "is the current user the sole effective member of this
    /// group": the group database lists at most this one explicit member
    /// (or none, treating the caller as the implicit primary-group owner).
    fn is_sole_group_member(&self, gid: u32) -> bool {
        let members = self.lookup_members(gid);
        match members.len() {
            0 => true,
            1 => self.current_username().as_deref() == Some(members[0].as_str()),
            _ => false,
        }
    }

    /// spec §4.4: true iff owner == current user AND (no group-write bit
    /// OR current user is the sole member of the file's group) AND no
    /// world-write bit. UID 0 is a trusted boundary: always safe.
    pub fn can_current_user_safely_write(&self, file: &FileOwnership) -> bool {
        if Uid::current().is_root() {
            return true;
        }
        if file.uid != Uid::current().as_raw() {
            return false;
        }
        let perms = file.perm_bits();
        if perms & 0o002 != 0 {
            return false; // world-writable is never safe
        }
        if perms & 0o020 != 0 && !self.is_sole_group_member(file.gid) {
            return false;
        }
        true
    }

    /// Analogous read-side check: owner match and no world-read escape
    /// hatch beyond what the group-write rule already covers; read safety
    /// only cares about write bits that would let another principal
    /// replace the content out from under us.
    pub fn can_current_user_safely_read(&self, file: &FileOwnership) -> bool {
        if Uid::current().is_root() {
            return true;
        }
        if file.uid != Uid::current().as_raw() {
            return false;
        }
        let perms = file.perm_bits();
        if perms & 0o002 != 0 {
            return false;
        }
        if perms & 0o020 != 0 && !self.is_sole_group_member(file.gid) {
            return false;
        }
        true
    }
}
