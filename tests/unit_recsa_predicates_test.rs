//! Direct unit tests against `RecsaInner`/`View`, scenario numbers matching
//! the testable-properties list.

use quorumd::core::recsa::predicates::View;
use quorumd::core::recsa::{ConfigValue, Notification, ProposalSet, RecsaInner};
use std::collections::BTreeSet;

fn inner_with(id: u32) -> RecsaInner {
    RecsaInner::new(id, BTreeSet::from([id]))
}

/// Scenario 3: `chs_config` unions every trusted peer's configuration.
#[test]
fn chs_config_unions_trusted_configs() {
    let mut inner = inner_with(0);
    inner.config.insert(0, ConfigValue::Set(BTreeSet::from([0, 1])));
    inner.config.insert(1, ConfigValue::Set(BTreeSet::from([1, 2, 3])));
    inner.config.insert(2, ConfigValue::Set(BTreeSet::from([1, 5])));

    let view = View { id: 0, n: 6, inner: &inner, fd_i: BTreeSet::from([0, 2]) };

    assert_eq!(view.chs_config(), ConfigValue::Set(BTreeSet::from([0, 1, 5])));
}

#[test]
fn chs_config_is_bottom_when_nothing_known() {
    let inner = inner_with(0);
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0]) };
    assert_eq!(view.chs_config(), ConfigValue::Bottom);
}

/// Scenario 4: `degree(k) = 2*phase[k] + (1 if my_alll(k) else 0)`.
#[test]
fn degree_reflects_phase_and_all_completion() {
    let mut inner = inner_with(0);
    inner.prp.insert(1, Notification { phase: 1, set: ProposalSet::Bottom });
    inner.alll.insert(1, true);
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert_eq!(view.degree(1), 3);

    let mut inner2 = inner_with(0);
    inner2.prp.insert(1, Notification { phase: 1, set: ProposalSet::Bottom });
    inner2.alll.insert(1, false);
    let view2 = View { id: 0, n: 3, inner: &inner2, fd_i: BTreeSet::from([0, 1]) };
    assert_eq!(view2.degree(1), 2);
}

/// Scenario 5: `increment`'s three transitions.
#[test]
fn increment_cycles_phase_1_to_2_to_default() {
    let inner = inner_with(0);
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0]) };

    let s = BTreeSet::from([1, 2]);
    let (next, all) = view.increment(Notification { phase: 1, set: ProposalSet::Set(s.clone()) });
    assert_eq!(next, Notification { phase: 2, set: ProposalSet::Set(s.clone()) });
    assert!(!all);

    let (next2, all2) = view.increment(Notification { phase: 2, set: ProposalSet::Set(s) });
    assert_eq!(next2, Notification::default());
    assert!(!all2);
}

#[test]
fn increment_phase_zero_keeps_current_state() {
    let mut inner = inner_with(0);
    inner.prp.insert(0, Notification { phase: 1, set: ProposalSet::Set(BTreeSet::from([9])) });
    inner.alll.insert(0, true);
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0]) };

    let (next, all) = view.increment(Notification { phase: 0, set: ProposalSet::Bottom });
    assert_eq!(next, inner.get_prp_j(0));
    assert!(all);
}

/// Applying `config_set` twice is idempotent (the idempotence law).
#[test]
fn config_set_is_idempotent() {
    let mut inner = inner_with(0);
    inner.config_set(3, ConfigValue::Bottom);
    let after_one = inner.clone();
    inner.config_set(3, ConfigValue::Bottom);
    assert_eq!(inner.config, after_one.config);
    assert_eq!(inner.prp, after_one.prp);
}

#[test]
fn stale_info_type_1_fires_on_phase_zero_with_nonbottom_set() {
    let mut inner = inner_with(0);
    inner.prp.insert(1, Notification { phase: 0, set: ProposalSet::Set(BTreeSet::from([1])) });
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0]) };
    assert!(view.stale_info_type_1());
}

#[test]
fn stale_info_type_2_fires_on_bottom_or_empty_config() {
    let mut inner = inner_with(0);
    inner.config.insert(1, ConfigValue::Bottom);
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0]) };
    assert!(view.stale_info_type_2());

    let mut inner2 = inner_with(0);
    inner2.config.insert(0, ConfigValue::Set(BTreeSet::new()));
    let view2 = View { id: 0, n: 3, inner: &inner2, fd_i: BTreeSet::from([0]) };
    assert!(view2.stale_info_type_2());
}

/// `no_ntf_arrived` is true only while every `fd_part_i` member is still at
/// phase 0.
#[test]
fn no_ntf_arrived_requires_every_member_at_phase_zero() {
    let mut inner = inner_with(0);
    inner.config.insert(1, ConfigValue::Set(BTreeSet::from([0, 1])));
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(view.no_ntf_arrived());

    inner.prp.insert(1, Notification { phase: 1, set: ProposalSet::Set(BTreeSet::from([1])) });
    let view2 = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(!view2.no_ntf_arrived());
}

/// Open-question fix: `allow_reco`'s trusted-participant-set accumulation
/// must converge to a single shared set, not diverge from a self-append.
#[test]
fn allow_reco_true_when_every_trusted_peer_agrees() {
    let mut inner = inner_with(0);
    inner.config.insert(0, ConfigValue::Set(BTreeSet::from([0, 1])));
    inner.config.insert(1, ConfigValue::Set(BTreeSet::from([0, 1])));
    inner.fd.insert(0, BTreeSet::from([0, 1]));
    inner.fd.insert(1, BTreeSet::from([0, 1]));
    inner.fd_part.insert(0, BTreeSet::from([0, 1]));
    inner.fd_part.insert(1, BTreeSet::from([0, 1]));
    inner.prp.insert(0, Notification::default());
    inner.prp.insert(1, Notification::default());
    inner.alll.insert(0, true);
    inner.alll.insert(1, true);
    inner.all_seen.insert(0);
    inner.all_seen.insert(1);
    // Peer 1's echoed view of `p_0` must agree with `p_0`'s own state, or
    // `echo_fun(1)` (and so `allow_reco`) stays false.
    inner.echo_part.insert(1, BTreeSet::from([0, 1]));
    inner.echo_prp.insert(1, Notification::default());
    inner.echo_all.insert(1, true);

    let view = View { id: 0, n: 2, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(view.allow_reco());
}

#[test]
fn config_conflict_true_when_trusted_peers_disagree() {
    let mut inner = inner_with(0);
    inner.config.insert(0, ConfigValue::Set(BTreeSet::from([0, 1])));
    inner.config.insert(1, ConfigValue::Set(BTreeSet::from([0, 2])));
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(view.config_conflict());
}

#[test]
fn config_conflict_false_when_trusted_peers_agree() {
    let mut inner = inner_with(0);
    inner.config.insert(0, ConfigValue::Set(BTreeSet::from([0, 1])));
    inner.config.insert(1, ConfigValue::Set(BTreeSet::from([0, 1])));
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(!view.config_conflict());
}

#[test]
fn fds_stabilized_requires_every_trusted_peer_to_mirror_fd_i() {
    let mut inner = inner_with(0);
    // Mirrors what `tick()` does each round: sync our own stashed `fd[i]`
    // to the live failure-detector view before evaluating the predicate.
    inner.fd.insert(0, BTreeSet::from([0, 1]));
    inner.fd.insert(1, BTreeSet::from([0, 1]));
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(view.fds_stabilized());

    inner.fd.insert(1, BTreeSet::from([0]));
    let view2 = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(!view2.fds_stabilized());
}

#[test]
fn allow_reco_false_on_config_conflict() {
    let mut inner = inner_with(0);
    inner.config.insert(0, ConfigValue::Set(BTreeSet::from([0, 1])));
    inner.config.insert(1, ConfigValue::Set(BTreeSet::from([0, 2])));
    let view = View { id: 0, n: 3, inner: &inner, fd_i: BTreeSet::from([0, 1]) };
    assert!(!view.allow_reco());
}
