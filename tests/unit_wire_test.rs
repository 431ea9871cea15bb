use quorumd::core::recsa::{ConfigValue, Notification, ProposalSet};
use quorumd::core::wire::{AbdPayload, JoinPayload, RecmaPayload, WireMessage};
use std::collections::BTreeSet;

#[test]
fn sender_extracts_correctly_across_every_variant() {
    let variants = vec![
        WireMessage::Recsa {
            sender: 1,
            data: quorumd::core::wire::RecsaPayload {
                fd: BTreeSet::from([1]),
                fd_part: BTreeSet::from([1]),
                config: ConfigValue::Bottom,
                prp: Notification::default(),
                alll: false,
                echo_fd_part: BTreeSet::new(),
                echo_prp: Notification::default(),
                echo_all: false,
            },
        },
        WireMessage::Recma { sender: 2, data: RecmaPayload { no_maj: false, need_reconf: false } },
        WireMessage::FailureDetector { sender: 3 },
        WireMessage::Joining { sender: 4, data: JoinPayload::Join },
        WireMessage::Abd { sender: 5, data: AbdPayload::ReadRequest },
    ];

    let senders: Vec<_> = variants.iter().map(WireMessage::sender).collect();
    assert_eq!(senders, vec![1, 2, 3, 4, 5]);
}

/// The `type` tag must round-trip through JSON untouched, since peers on
/// both sides of the wire rely on it to dispatch without a length-prefixed
/// variant index.
#[test]
fn json_tag_identifies_the_variant() {
    let msg = WireMessage::FailureDetector { sender: 7 };
    let encoded = serde_json::to_value(&msg).unwrap();
    assert_eq!(encoded["type"], "FailureDetector");
    assert_eq!(encoded["sender"], 7);
}

/// `max_lex` prefers the longer set, and breaks ties between equal-length
/// sets by the sorted element vector, not by insertion order.
#[test]
fn proposal_set_ordering_is_not_mechanically_tested_elsewhere() {
    use quorumd::core::recsa::state::max_lex;
    let a = ProposalSet::Set(BTreeSet::from([1, 2]));
    let b = ProposalSet::Set(BTreeSet::from([1, 3]));
    assert_eq!(max_lex(&a, &b), b);
    assert_eq!(max_lex(&ProposalSet::Bottom, &a), a);
}
