//! End-to-end resolution flows: formula digestion, advantage dialogs,
//! roll modes, form merging, and spell target checks.

use darkdelve_core::testing::{assert_flag_update, assert_messages, assert_no_flag_updates, MockHost};
use darkdelve_core::{
    Actor, Advantage, Item, Resolver, RollData, RollKind, RollMode, RollOptions, RollPart,
    RollRequest, SpellData,
};

fn parts(src: &[&str]) -> Vec<RollPart> {
    src.iter().map(|s| RollPart::from(*s)).collect()
}

#[tokio::test]
async fn ability_check_elides_zero_bonuses() {
    let host = MockHost::new();
    host.queue_faces(&[10]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(
        parts(&["1d20", "@abilityBonus", "@talentBonus"]),
        RollData::new()
            .with_bonus("abilityBonus", 2.0)
            .with_bonus("talentBonus", 0.0),
    );
    let outcome = resolver
        .resolve_roll(
            &request,
            None,
            Advantage::Normal,
            &RollOptions::new().fast_forward(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.roll.formula, "1d20+@abilityBonus");
    assert_eq!(outcome.roll.total, 12);
    assert!(outcome.critical.is_none());
    assert!(outcome.damage.is_none());
    assert!(outcome.target.is_none());
    assert_messages(&host, 1);
}

#[tokio::test]
async fn hit_point_roll_gets_no_classification() {
    let host = MockHost::new();
    host.queue_faces(&[8]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::hit_points(parts(&["1d8"]), RollData::new());
    let outcome = resolver
        .resolve_roll(
            &request,
            None,
            Advantage::Normal,
            &RollOptions::new().fast_forward(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.roll.total, 8);
    assert!(outcome.critical.is_none());
    assert!(outcome.damage.is_none());
}

#[tokio::test]
async fn dialog_advantage_keeps_highest() {
    let host = MockHost::new();
    host.submit_dialog(Advantage::Advantage);
    host.queue_faces(&[3, 17]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(
        parts(&["1d20", "@abilityBonus"]),
        RollData::new().with_bonus("abilityBonus", 1.0),
    );
    let outcome = resolver
        .resolve_with_dialog(&request, &RollOptions::new())
        .await
        .unwrap()
        .expect("dialog was submitted");

    assert_eq!(outcome.roll.formula, "2d20kh+@abilityBonus");
    assert_eq!(outcome.roll.total, 18);
}

#[tokio::test]
async fn dialog_disadvantage_keeps_lowest() {
    let host = MockHost::new();
    host.submit_dialog(Advantage::Disadvantage);
    host.queue_faces(&[3, 17]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(parts(&["1d20"]), RollData::new());
    let outcome = resolver
        .resolve_with_dialog(&request, &RollOptions::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.roll.formula, "2d20kl");
    assert_eq!(outcome.roll.total, 3);
}

#[tokio::test]
async fn dialog_form_supplies_bonuses_and_roll_mode() {
    let host = MockHost::new();
    host.submit_dialog_with_form(
        Advantage::Advantage,
        darkdelve_core::FormData::new()
            .with_bonus("situational", 2.0)
            .with_roll_mode(RollMode::Private),
    );
    host.queue_faces(&[3, 17]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(parts(&["1d20", "@situational"]), RollData::new());
    let outcome = resolver
        .resolve_with_dialog(&request, &RollOptions::new())
        .await
        .unwrap()
        .expect("dialog was submitted");

    assert_eq!(outcome.roll.formula, "2d20kh+@situational");
    assert_eq!(outcome.roll.total, 19);
    assert_eq!(host.last_message().unwrap().roll_mode, RollMode::Private);
}

#[tokio::test]
async fn dismissed_dialog_cancels_the_roll() {
    let host = MockHost::new();
    host.dismiss_dialog();
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(parts(&["1d20"]), RollData::new());
    let outcome = resolver
        .resolve_with_dialog(&request, &RollOptions::new())
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert_messages(&host, 0);
    assert!(host.animated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fast_forward_skips_the_dialog() {
    let host = MockHost::new();
    // A scripted dismissal must not matter when fast-forwarded.
    host.dismiss_dialog();
    host.queue_faces(&[10]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(parts(&["1d20"]), RollData::new());
    let outcome = resolver
        .resolve_with_dialog(&request, &RollOptions::new().fast_forward())
        .await
        .unwrap();

    assert!(outcome.is_some());
    assert_messages(&host, 1);
}

#[tokio::test]
async fn form_bonuses_merge_unless_fast_forwarded() {
    let host = MockHost::new();
    host.queue_faces(&[10, 10]);
    let resolver = Resolver::new(&host);
    let request = RollRequest::ability(parts(&["1d20", "@situational"]), RollData::new());

    let form = darkdelve_core::FormData::new().with_bonus("situational", 2.0);
    let outcome = resolver
        .resolve_roll(&request, Some(&form), Advantage::Normal, &RollOptions::new())
        .await
        .unwrap();
    assert_eq!(outcome.roll.formula, "1d20+@situational");
    assert_eq!(outcome.roll.total, 12);

    // Fast-forwarded rolls ignore the form; the unmatched placeholder
    // is elided.
    let outcome = resolver
        .resolve_roll(
            &request,
            Some(&form),
            Advantage::Normal,
            &RollOptions::new().fast_forward(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.roll.formula, "1d20");
}

#[tokio::test]
async fn roll_mode_priority_options_then_form_then_default() {
    let host = MockHost::new();
    host.queue_faces(&[10, 10, 10]);
    let resolver = Resolver::new(&host);
    let request = RollRequest::ability(parts(&["1d20"]), RollData::new());

    let form = darkdelve_core::FormData::new().with_roll_mode(RollMode::Private);

    resolver
        .resolve_roll(
            &request,
            Some(&form),
            Advantage::Normal,
            &RollOptions::new().with_roll_mode(RollMode::Blind),
        )
        .await
        .unwrap();
    assert_eq!(host.last_message().unwrap().roll_mode, RollMode::Blind);

    resolver
        .resolve_roll(&request, Some(&form), Advantage::Normal, &RollOptions::new())
        .await
        .unwrap();
    assert_eq!(host.last_message().unwrap().roll_mode, RollMode::Private);

    resolver
        .resolve_roll(&request, None, Advantage::Normal, &RollOptions::new())
        .await
        .unwrap();
    assert_eq!(host.last_message().unwrap().roll_mode, RollMode::Public);
}

#[tokio::test]
async fn suppressed_chat_message_still_resolves() {
    let host = MockHost::new();
    host.queue_faces(&[10]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(parts(&["1d20"]), RollData::new());
    let outcome = resolver
        .resolve_roll(
            &request,
            None,
            Advantage::Normal,
            &RollOptions::new().fast_forward().without_chat_message(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.roll.total, 10);
    assert_messages(&host, 0);
}

#[tokio::test]
async fn character_spell_difficulty_is_tier_plus_ten() {
    let host = MockHost::new();
    host.queue_faces(&[15]);
    let resolver = Resolver::new(&host);

    let data = RollData::new()
        .with_actor(Actor::character("Vex"))
        .with_item(Item::spell("Ray of Frost", SpellData::tier(2)));
    let request = RollRequest::new(RollKind::Spell, parts(&["1d20"]), data).unwrap();

    let outcome = resolver
        .resolve_roll(
            &request,
            None,
            Advantage::Normal,
            &RollOptions::new().fast_forward(),
        )
        .await
        .unwrap();

    let target = outcome.target.unwrap();
    assert_eq!(target.target, 12);
    assert!(target.met);
    assert_no_flag_updates(&host);

    let flavor = host.last_message().unwrap().flavor.unwrap();
    assert!(flavor.contains("tier=2"));
    assert!(flavor.contains("difficulty=12"));
}

#[tokio::test]
async fn npc_spell_uses_stored_difficulty() {
    let host = MockHost::new();
    host.queue_faces(&[13]);
    let resolver = Resolver::new(&host);

    let data = RollData::new()
        .with_actor(Actor::npc("Hag"))
        .with_item(Item::spell(
            "Curse",
            SpellData::tier(1).with_difficulty(14),
        ));
    let request = RollRequest::new(RollKind::Spell, parts(&["1d20"]), data).unwrap();

    let outcome = resolver
        .resolve_roll(
            &request,
            None,
            Advantage::Normal,
            &RollOptions::new().fast_forward(),
        )
        .await
        .unwrap();

    let target = outcome.target.unwrap();
    assert_eq!(target.target, 14);
    assert!(!target.met);

    // Display tier derives from the stored difficulty.
    let flavor = host.last_message().unwrap().flavor.unwrap();
    assert!(flavor.contains("tier=4"));
    assert!(flavor.contains("difficulty=14"));
}

#[tokio::test]
async fn failed_spell_is_marked_lost() {
    let host = MockHost::new();
    host.queue_faces(&[3]);
    let resolver = Resolver::new(&host);

    let data = RollData::new().with_item(Item::spell("Ray of Frost", SpellData::tier(2)));
    let request = RollRequest::new(RollKind::Spell, parts(&["1d20"]), data).unwrap();

    let outcome = resolver
        .resolve_roll(
            &request,
            None,
            Advantage::Normal,
            &RollOptions::new().fast_forward(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.met_target(), Some(false));
    assert_flag_update(&host, "ray-of-frost", "lost");
}

#[tokio::test]
async fn caller_target_applies_to_plain_checks() {
    let host = MockHost::new();
    host.queue_faces(&[14]);
    let resolver = Resolver::new(&host);

    let request = RollRequest::ability(parts(&["1d20"]), RollData::new());
    let outcome = resolver
        .resolve_roll(
            &request,
            None,
            Advantage::Normal,
            &RollOptions::new().fast_forward().with_target(15),
        )
        .await
        .unwrap();

    let target = outcome.target.unwrap();
    assert_eq!(target.target, 15);
    assert!(!target.met);
}
