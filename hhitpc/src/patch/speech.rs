//! Speech-check predicates and constructors
//!
//! A speech check is a GetActorValue(Speech) condition; the amulet check
//! is a GetEquipped condition against the Amulet of Articulation form
//! list. Normalization turns float-threshold checks into global
//! comparisons on the player and keeps the two conditions last, in a
//! fixed order, so the OR between them reads the same in every record.

use tesplugin::formats::condition::{
    CompareOperator, Condition, ConditionValue, Function, Param, RunOn, ACTOR_VALUE_SPEECH,
};
use tesplugin::formats::dialog::DialogResponse;
use tesplugin::FormKey;

use crate::patch::difficulty::{Difficulty, SpeechGlobals};

/// Whether a condition tests the player's Speech skill.
#[must_use]
pub fn is_speech_check(condition: &Condition) -> bool {
    condition.function == Function::GetActorValue
        && condition.param1 == Param::Raw(ACTOR_VALUE_SPEECH)
}

/// Whether any condition of a response is a speech check.
#[must_use]
pub fn has_speech_check(response: &DialogResponse) -> bool {
    response.conditions.iter().any(is_speech_check)
}

/// The response's speech check, if it has one.
#[must_use]
pub fn speech_check(response: &DialogResponse) -> Option<&Condition> {
    response.conditions.iter().find(|c| is_speech_check(c))
}

/// Whether a condition tests the amulet form list being equipped.
#[must_use]
pub fn is_amulet_check(condition: &Condition, amulet_list: &FormKey) -> bool {
    condition.function == Function::GetEquipped
        && condition
            .param1
            .as_form()
            .is_some_and(|key| key.same_record(amulet_list))
}

/// Whether any condition of a response is an amulet check.
#[must_use]
pub fn has_amulet_check(response: &DialogResponse, amulet_list: &FormKey) -> bool {
    response
        .conditions
        .iter()
        .any(|c| is_amulet_check(c, amulet_list))
}

/// Build a normalized speech check against a tier global. The inverted
/// form is the failure branch: Speech below the tier.
#[must_use]
pub fn make_speech_check(global: FormKey, inverted: bool) -> Condition {
    Condition {
        operator: if inverted {
            CompareOperator::LessThan
        } else {
            CompareOperator::GreaterThanOrEqualTo
        },
        value: ConditionValue::Global(global),
        function: Function::GetActorValue,
        param1: Param::Raw(ACTOR_VALUE_SPEECH),
        run_on: RunOn::Reference,
        reference: Some(FormKey::player_ref()),
        ..Condition::default()
    }
}

/// Build the amulet-equipped check. The OR flag ties it to the speech
/// check in front of it; the inverted form requires the amulet absent.
#[must_use]
pub fn make_amulet_check(amulet_list: FormKey, inverted: bool) -> Condition {
    let mut condition = Condition {
        operator: if inverted {
            CompareOperator::NotEqualTo
        } else {
            CompareOperator::EqualTo
        },
        value: ConditionValue::Float(1.0),
        function: Function::GetEquipped,
        param1: Param::Form(amulet_list),
        run_on: RunOn::Reference,
        reference: Some(FormKey::player_ref()),
        ..Condition::default()
    };
    condition.set_or(true);
    condition
}

/// Normalize one speech check in place: a vanilla float threshold becomes
/// a `>=` comparison against the matching global, the condition runs on
/// the player, and success checks get the OR flag for the amulet bypass.
pub fn normalize_speech_check(condition: &mut Condition, globals: &SpeechGlobals) {
    if let ConditionValue::Float(value) = condition.value {
        if let Some(tier) = Difficulty::from_threshold(value) {
            *condition = make_speech_check(globals.global(tier).clone(), false);
        }
    }
    condition.run_on = RunOn::Reference;
    condition.reference = Some(FormKey::player_ref());
    if condition.operator == CompareOperator::GreaterThanOrEqualTo {
        condition.set_or(true);
    }
}

/// The tier a condition checks, after normalization.
#[must_use]
pub fn check_tier(condition: &Condition, globals: &SpeechGlobals) -> Option<Difficulty> {
    match &condition.value {
        ConditionValue::Global(key) => globals.tier(key),
        ConditionValue::Float(value) => Difficulty::from_threshold(*value),
    }
}

/// The tier of a response's speech check.
#[must_use]
pub fn response_tier(response: &DialogResponse, globals: &SpeechGlobals) -> Option<Difficulty> {
    speech_check(response).and_then(|c| check_tier(c, globals))
}

/// Move the speech check, then the amulet check, to the end of the list.
pub fn reorder_conditions(conditions: &mut Vec<Condition>, amulet_list: &FormKey) {
    if let Some(index) = conditions.iter().position(is_speech_check) {
        let speech = conditions.remove(index);
        conditions.push(speech);
    }
    if let Some(index) = conditions.iter().position(|c| is_amulet_check(c, amulet_list)) {
        let amulet = conditions.remove(index);
        conditions.push(amulet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn globals() -> SpeechGlobals {
        let mut by_tier = HashMap::new();
        let mut by_key = HashMap::new();
        for (tier, id) in [
            (Difficulty::VeryEasy, 0x0D16A3u32),
            (Difficulty::Easy, 0x0D16A4),
            (Difficulty::Average, 0x0D16A5),
            (Difficulty::Hard, 0x0D1943),
            (Difficulty::VeryHard, 0x0D1944),
        ] {
            let key = FormKey::new("Skyrim.esm", id);
            by_key.insert(key.clone(), tier);
            by_tier.insert(tier, key);
        }
        SpeechGlobals::from_parts(by_tier, by_key)
    }

    fn amulet_list() -> FormKey {
        FormKey::new("Skyrim.esm", 0x0F759C)
    }

    #[test]
    fn float_threshold_becomes_global_check() {
        let globals = globals();
        let mut condition = Condition {
            operator: CompareOperator::GreaterThanOrEqualTo,
            value: ConditionValue::Float(75.0),
            function: Function::GetActorValue,
            param1: Param::Raw(ACTOR_VALUE_SPEECH),
            ..Condition::default()
        };
        normalize_speech_check(&mut condition, &globals);
        assert_eq!(
            condition.value,
            ConditionValue::Global(globals.global(Difficulty::Hard).clone())
        );
        assert_eq!(condition.run_on, RunOn::Reference);
        assert_eq!(condition.reference, Some(FormKey::player_ref()));
        assert!(condition.is_or());
    }

    #[test]
    fn inverted_checks_keep_their_operator() {
        let globals = globals();
        let mut condition = make_speech_check(globals.global(Difficulty::Easy).clone(), true);
        normalize_speech_check(&mut condition, &globals);
        assert_eq!(condition.operator, CompareOperator::LessThan);
        assert!(!condition.is_or());
    }

    #[test]
    fn nonstandard_floats_are_left_as_floats() {
        let globals = globals();
        let mut condition = Condition {
            operator: CompareOperator::GreaterThanOrEqualTo,
            value: ConditionValue::Float(60.0),
            function: Function::GetActorValue,
            param1: Param::Raw(ACTOR_VALUE_SPEECH),
            ..Condition::default()
        };
        normalize_speech_check(&mut condition, &globals);
        assert_eq!(condition.value, ConditionValue::Float(60.0));
        assert!(condition.is_or());
    }

    #[test]
    fn reorder_puts_speech_then_amulet_last() {
        let globals = globals();
        let speech = make_speech_check(globals.global(Difficulty::Average).clone(), false);
        let amulet = make_amulet_check(amulet_list(), false);
        let other = Condition {
            function: Function::GetStage,
            param1: Param::Form(FormKey::new("Skyrim.esm", 0x024E0F)),
            ..Condition::default()
        };
        let mut conditions = vec![amulet.clone(), speech.clone(), other.clone()];
        reorder_conditions(&mut conditions, &amulet_list());
        assert_eq!(conditions, vec![other, speech, amulet]);
    }

    #[test]
    fn amulet_check_is_an_or_condition() {
        let condition = make_amulet_check(amulet_list(), false);
        assert!(condition.is_or());
        assert!(is_amulet_check(&condition, &amulet_list()));
        assert!(!is_speech_check(&condition));

        let inverted = make_amulet_check(amulet_list(), true);
        assert_eq!(inverted.operator, CompareOperator::NotEqualTo);
    }
}
