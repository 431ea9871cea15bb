// src/core/recsa/predicates.rs

//! The stale-info detectors and supporting macros from Algorithm 3.1,
//! ported verbatim from `original_source/modules/recsa/module.py`.

use super::state::{ConfigValue, Notification, ProposalSet, RecsaInner, max_lex};
use crate::core::NodeId;
use std::collections::BTreeSet;

/// `get_fd_j(i)` is always the live failure-detector output, not the
/// processor's own stashed copy; everything else is read out of `inner`.
pub struct View<'a> {
    pub id: NodeId,
    pub n: u32,
    pub inner: &'a RecsaInner,
    pub fd_i: BTreeSet<NodeId>,
}

impl<'a> View<'a> {
    pub fn get_fd_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        if j == self.id {
            self.fd_i.clone()
        } else {
            self.inner.fd.get(&j).cloned().unwrap_or_default()
        }
    }

    /// `get_fd_part_j`: for `i` this recomputes straight from `fd_i` and the
    /// current config map rather than trusting a stashed value.
    pub fn get_fd_part_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        if j == self.id {
            self.get_fd_j(self.id)
                .into_iter()
                .filter(|pj| !self.inner.get_config_j(*pj).is_not_participant())
                .collect()
        } else {
            self.inner.get_fd_part_j(j)
        }
    }

    pub fn get_echo_part_j(&self, j: NodeId) -> BTreeSet<NodeId> {
        if j == self.id { self.get_fd_part_j(self.id) } else { self.inner.get_echo_part_j(j) }
    }

    pub fn get_echo_prp_j(&self, j: NodeId) -> Notification {
        if j == self.id { self.get_prp_j(self.id) } else { self.inner.get_echo_prp_j(j) }
    }

    pub fn get_echo_all_j(&self, j: NodeId) -> bool {
        if j == self.id { self.get_all_j(self.id) } else { self.inner.get_echo_all_j(j) }
    }

    pub fn get_prp_j(&self, j: NodeId) -> Notification {
        self.inner.get_prp_j(j)
    }

    pub fn get_all_j(&self, j: NodeId) -> bool {
        self.inner.get_all_j(j)
    }

    pub fn get_config_j(&self, j: NodeId) -> ConfigValue {
        self.inner.get_config_j(j)
    }

    /// `my_alll(k)`: `all[k]`, or for `k == i` whether some `p_l` already
    /// seen this round is one phase ahead.
    pub fn my_alll(&self, k: NodeId) -> bool {
        let all_k = self.get_all_j(k);
        if all_k {
            return true;
        }
        if k != self.id {
            return false;
        }
        let ahead = (self.get_prp_j(self.id).phase + 1) % 3;
        self.inner.all_seen.iter().any(|l| self.get_prp_j(*l).phase == ahead)
    }

    /// `degree(k)`: twice the phase, plus one iff `my_alll(k)`.
    pub fn degree(&self, k: NodeId) -> u32 {
        let one = if self.my_alll(k) { 1 } else { 0 };
        (2 * self.get_prp_j(k).phase as u32) + one
    }

    /// `corr_deg(k, k')`: true iff the two degrees are adjacent mod 6 (or
    /// equal), per the original's explicit `{0,5}`/`{x,x}`/`{x,x+1}` table.
    pub fn corr_deg(&self, k: NodeId, k_prime: NodeId) -> bool {
        let dk = self.degree(k);
        let dkp = self.degree(k_prime);
        let diff = dk.abs_diff(dkp);
        diff == 0 || diff == 1 || (dk.min(dkp) == 0 && dk.max(dkp) == 5)
    }

    /// `echo_no_all(k)`: whether `p_i`'s own participant set and current
    /// notification are exactly echoed back by `k`.
    pub fn echo_no_all(&self, k: NodeId) -> bool {
        let same_fd_part = self.get_fd_part_j(self.id) == self.get_echo_part_j(k);
        let prp_i = self.get_prp_j(self.id);
        let prp_k = self.get_echo_prp_j(k);
        same_fd_part && prp_i == prp_k
    }

    /// `echo_fun(k)`: `echo_no_all` plus agreement on `all[]` and a degree
    /// within one step (mod 6) of `p_i`'s own.
    pub fn echo_fun(&self, k: NodeId) -> bool {
        let same_all = self.my_alll(self.id) == self.get_echo_all_j(k);
        let ok_deg = (self.degree(k) + 6 - self.degree(self.id) % 6) % 6 <= 1;
        self.echo_no_all(k) && same_all && ok_deg
    }

    /// `chs_config()`: the union of every known participant's configuration,
    /// or `BOTTOM` if none is known.
    pub fn chs_config(&self) -> ConfigValue {
        let mut conf = BTreeSet::new();
        for j in self.get_fd_j(self.id) {
            if let ConfigValue::Set(s) = self.get_config_j(j) {
                conf.extend(s);
            }
        }
        if conf.is_empty() { ConfigValue::Bottom } else { ConfigValue::Set(conf) }
    }

    /// `mod_max()`: catches a trailing `prp[i].phase` up to the max phase 1
    /// reported by `fd_part_i`, clearing `all_seen`, when no member is yet
    /// at phase 2.
    pub fn mod_max(&mut self, all_seen: &mut BTreeSet<NodeId>) -> u8 {
        let phs: BTreeSet<u8> = self.get_fd_part_j(self.id).iter().map(|k| self.get_prp_j(*k).phase).collect();
        let my_phase = self.get_prp_j(self.id).phase;
        if phs.contains(&1) && !phs.contains(&2) && my_phase != *phs.iter().max().unwrap_or(&0) {
            all_seen.clear();
            *phs.iter().max().unwrap()
        } else {
            my_phase
        }
    }

    /// `max_ntf()`: the notification with maximal lexicographic set among
    /// `fd_part_i`, provided every member's degree is within one step of
    /// `p_i`'s; otherwise `p_i`'s own notification is left unchanged.
    pub fn max_ntf(&mut self, all_seen: &mut BTreeSet<NodeId>) -> Notification {
        let deg_diffs: BTreeSet<u32> = self
            .get_fd_part_j(self.id)
            .iter()
            .map(|k| (self.degree(*k) + 6 - self.degree(self.id) % 6) % 6)
            .collect();
        if !deg_diffs.iter().all(|d| *d == 0 || *d == 1) {
            return self.get_prp_j(self.id);
        }
        let mut max_lex_set = ProposalSet::Bottom;
        for k in self.get_fd_part_j(self.id) {
            max_lex_set = max_lex(&max_lex_set, &self.get_prp_j(k).set);
        }
        Notification { phase: self.mod_max(all_seen), set: max_lex_set }
    }

    /// `stale_info_type_1`: any stored notification claims phase 0 with a
    /// non-`BOTTOM` set.
    pub fn stale_info_type_1(&self) -> bool {
        self.inner.prp.values().any(|n| n.phase == 0 && n.set != ProposalSet::Bottom)
    }

    /// `stale_info_type_2`: any `config[k]` is still `BOTTOM` or an empty set.
    pub fn stale_info_type_2(&self) -> bool {
        self.inner.config.values().any(|c| match c {
            ConfigValue::Bottom => true,
            ConfigValue::Set(s) => s.is_empty(),
            ConfigValue::NotParticipant => false,
        })
    }

    /// `stale_info_type_3`: degree desync, a phase advance not yet reflected
    /// in `all_seen`, or two distinct proposal sets both claiming phase 2.
    pub fn stale_info_type_3(&self) -> bool {
        let part = self.get_fd_part_j(self.id);
        let mut type_3_a = false;
        let mut type_3_b_set = BTreeSet::new();
        let mut prp_sets: Vec<BTreeSet<NodeId>> = Vec::new();
        let mut exists_phase_2 = false;
        let my_phase = self.get_prp_j(self.id).phase;
        for k in &part {
            if !self.corr_deg(self.id, *k) {
                type_3_a = true;
            }
            let prp_k = self.get_prp_j(*k);
            if prp_k.phase == (my_phase + 1) % 3 {
                type_3_b_set.insert(*k);
            }
            if let ProposalSet::Set(s) = &prp_k.set {
                if !prp_sets.contains(s) {
                    prp_sets.push(s.clone());
                }
            }
            if prp_k.phase == 2 {
                exists_phase_2 = true;
            }
        }
        let type_3_b = !type_3_b_set.is_subset(&self.inner.all_seen);
        let type_3_c = exists_phase_2 && prp_sets.len() > 1;
        type_3_a || type_3_b || type_3_c
    }

    /// `stale_info_type_4`: every `fd_part` member agrees on `fd`/`fd_part`,
    /// yet `p_i`'s own config is not `BOTTOM` and excludes some such member.
    pub fn stale_info_type_4(&self) -> bool {
        let part = self.get_fd_part_j(self.id);
        let type_4_a = !part.is_empty()
            && part.iter().all(|k| {
                self.get_fd_j(self.id) == self.get_fd_j(*k)
                    && self.get_fd_part_j(self.id) == self.get_fd_part_j(*k)
            });
        let config_i = self.get_config_j(self.id);
        let type_4_b = !config_i.is_bottom();
        let type_4_c = match &config_i {
            ConfigValue::Bottom | ConfigValue::NotParticipant => true,
            ConfigValue::Set(s) => part.iter().all(|k| !s.contains(k)),
        };
        type_4_a && type_4_b && type_4_c
    }

    /// `no_ntf_arrived`: no `fd_part_i` member has posted a non-phase-0
    /// notification.
    pub fn no_ntf_arrived(&self) -> bool {
        !self.get_fd_part_j(self.id).iter().any(|k| self.get_prp_j(*k).phase != 0)
    }

    /// `config_conflict`: two or more distinct non-sentinel config values
    /// are visible among `fd_i`.
    pub fn config_conflict(&self) -> bool {
        let mut found: Vec<BTreeSet<NodeId>> = Vec::new();
        for k in self.get_fd_j(self.id) {
            let c = self.get_config_j(k);
            if let ConfigValue::Set(s) = c {
                if !found.contains(&s) {
                    found.push(s);
                }
            }
        }
        found.len() > 1
    }

    /// `fds_stabilized`: every `fd_i` member's own stashed failure-detector
    /// view matches `p_i`'s.
    pub fn fds_stabilized(&self) -> bool {
        let fd_i = self.get_fd_j(self.id);
        self.get_fd_j(self.id).iter().all(|j| {
            self.inner.fd.get(j).cloned().unwrap_or_default() == fd_i
        })
    }

    /// `all_seen_fun`: `p_i` has finished the phase and every active
    /// participant is known (directly or via self) to have finished too.
    pub fn all_seen_fun(&self) -> bool {
        let part = self.get_fd_part_j(self.id);
        let mut seen = self.inner.all_seen.clone();
        seen.insert(self.id);
        self.get_all_j(self.id) && part.is_subset(&seen)
    }

    /// `increment(prp)`: the phase-1→2 and phase-2→0 transitions; phase 0
    /// leaves the notification untouched (handled by the caller's guard).
    pub fn increment(&self, prp: Notification) -> (Notification, bool) {
        match prp.phase {
            1 => (Notification { phase: 2, set: prp.set }, false),
            2 => (Notification::default(), false),
            _ => (self.get_prp_j(self.id), self.get_all_j(self.id)),
        }
    }

    /// `allow_reco()`: the full precondition for RecSA to accept either an
    /// `estab` proposal or a `participate` join.
    pub fn allow_reco(&self) -> bool {
        let mut fd_of_trusted: Vec<BTreeSet<NodeId>> = Vec::new();
        let mut part_of_trusted: Vec<BTreeSet<NodeId>> = vec![self.get_fd_part_j(self.id)];
        let mut no_reset = true;
        let mut all_dflt_ntf = true;
        for j in self.get_fd_j(self.id) {
            if j != self.id {
                fd_of_trusted.push(self.get_fd_j(j));
                let mut part_of_j = self.get_fd_part_j(j);
                part_of_j.extend(self.get_echo_part_j(j));
                if !part_of_trusted.contains(&part_of_j) {
                    part_of_trusted.push(part_of_j);
                }
            }
            if self.get_config_j(j).is_bottom() {
                no_reset = false;
            }
            if self.get_prp_j(j) != Notification::default() || !self.get_all_j(j) {
                all_dflt_ntf = false;
            }
        }
        let trusted_by_trusted = if fd_of_trusted.is_empty() {
            false
        } else {
            fd_of_trusted
                .iter()
                .skip(1)
                .fold(fd_of_trusted[0].clone(), |acc, s| acc.intersection(s).copied().collect())
                .contains(&self.id)
        };
        let part_stabilized = part_of_trusted.len() == 1;
        let all_part_echo = self.get_fd_part_j(self.id).iter().all(|k| self.echo_fun(*k));
        !self.config_conflict()
            && self.all_seen_fun()
            && all_part_echo
            && trusted_by_trusted
            && part_stabilized
            && no_reset
            && all_dflt_ntf
    }
}
