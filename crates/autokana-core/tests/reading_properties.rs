//! Property-based tests for the reading accumulator.
//!
//! Random composition sequences are generated with proptest and the reading
//! invariants are checked after every step.

use std::collections::HashSet;

use autokana_core::kana::{self, PROLONGED_SOUND_MARK};
use autokana_core::{Decision, KanaAccumulator, Options, ReadingEvent, Script};
use proptest::prelude::*;

fn arb_hiragana() -> impl Strategy<Value = char> {
    prop_oneof![
        10 => (0x3041u32..=0x3093).prop_map(|cp| char::from_u32(cp).unwrap()),
        1 => Just(PROLONGED_SOUND_MARK),
    ]
}

fn arb_segment() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_hiragana(), 0..8).prop_map(|v| v.into_iter().collect())
}

/// A buffer holding at least one character outside the syllabary.
fn arb_candidate() -> impl Strategy<Value = String> {
    (
        arb_segment(),
        prop::sample::select(vec!['漢', '字', '今', '日', 'A', 'k', 'カ', '1']),
        arb_segment(),
    )
        .prop_map(|(head, odd, tail)| format!("{}{}{}", head, odd, tail))
}

fn arb_script() -> impl Strategy<Value = Script> {
    prop_oneof![Just(Script::Hiragana), Just(Script::Katakana)]
}

#[derive(Debug, Clone)]
enum Action {
    Update(String),
    Candidate(String),
    Commit,
    SourceEmptied,
    SinkEdit(String),
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        8 => arb_segment().prop_map(Action::Update),
        3 => arb_candidate().prop_map(Action::Candidate),
        4 => Just(Action::Commit),
        1 => Just(Action::SourceEmptied),
        1 => arb_segment().prop_map(Action::SinkEdit),
    ]
}

proptest! {
    #[test]
    fn candidate_updates_never_change_state(
        script in arb_script(),
        prefix in prop::collection::vec(arb_segment(), 0..4),
        candidate in arb_candidate(),
    ) {
        let mut acc = KanaAccumulator::new(Options::default().with_script(script));
        for seg in &prefix {
            acc.on_composition_update(seg);
            acc.on_composition_end();
        }
        acc.on_composition_update("か");
        let before = acc.state().clone();

        prop_assert_eq!(acc.on_composition_update(&candidate), Decision::Keep);
        prop_assert_eq!(acc.state(), &before);
    }

    #[test]
    fn committed_segments_concatenate(segments in prop::collection::vec(arb_segment(), 1..6)) {
        let mut acc = KanaAccumulator::default();
        for seg in &segments {
            acc.on_composition_update(seg);
            acc.on_composition_end();
        }
        prop_assert_eq!(acc.reading(), segments.concat());
        prop_assert_eq!(acc.state().committed(), segments.concat());
        prop_assert_eq!(acc.state().pending(), "");
    }

    #[test]
    fn displayed_is_committed_plus_pending(
        script in arb_script(),
        actions in prop::collection::vec(arb_action(), 1..40),
    ) {
        let mut acc = KanaAccumulator::new(Options::default().with_script(script));
        for action in actions {
            match action {
                Action::Update(seg) | Action::Candidate(seg) => {
                    acc.on_event(ReadingEvent::CompositionUpdate(&seg));
                    let s = acc.state();
                    prop_assert_eq!(
                        s.displayed(),
                        format!("{}{}", s.committed(), s.pending())
                    );
                }
                Action::Commit => {
                    acc.on_event(ReadingEvent::CompositionEnd);
                    prop_assert_eq!(acc.state().pending(), "");
                    prop_assert_eq!(acc.state().committed(), acc.state().displayed());
                }
                Action::SourceEmptied => {
                    let composing = acc.is_composing();
                    let before = acc.state().clone();
                    acc.on_event(ReadingEvent::SourceEdited(""));
                    if composing {
                        prop_assert_eq!(acc.state(), &before);
                    } else {
                        prop_assert!(acc.state().is_empty());
                    }
                }
                Action::SinkEdit(value) => {
                    acc.on_event(ReadingEvent::SinkEdited(&value));
                    prop_assert_eq!(acc.state().committed(), value.as_str());
                    prop_assert_eq!(acc.state().displayed(), value.as_str());
                }
            }
        }
    }

    #[test]
    fn katakana_run_matches_per_char_mapping(seg in arb_segment()) {
        let mut acc = KanaAccumulator::new(Options::default().with_script(Script::Katakana));
        acc.on_composition_update(&seg);
        let expected: String = seg.chars().map(kana::to_katakana).collect();
        prop_assert_eq!(acc.reading(), expected);
    }
}

#[test]
fn katakana_mapping_is_injective_and_reversible() {
    let mut seen = HashSet::new();
    for cp in 0x3041u32..=0x3093 {
        let c = char::from_u32(cp).unwrap();
        let k = kana::to_katakana(c);
        assert_ne!(k, c, "{} was not converted", c);
        assert!(seen.insert(k), "{} maps onto an already used char", c);
        assert_eq!(k as u32 - c as u32, kana::KATAKANA_OFFSET);
        assert_eq!(kana::to_hiragana(k), c);
    }
    assert!(!seen.contains(&PROLONGED_SOUND_MARK));
    assert_eq!(kana::to_katakana(PROLONGED_SOUND_MARK), PROLONGED_SOUND_MARK);
    assert_eq!(kana::to_hiragana(PROLONGED_SOUND_MARK), PROLONGED_SOUND_MARK);
}
