//! Difficulty labels on dialog text
//!
//! Vanilla persuasion options are tagged `(Persuade)` with no hint of
//! how hard the check is. These passes rewrite the tag to carry the
//! tier label, hoist prompts into topic names where the topic has no
//! name of its own, and handle topics whose responses mix tiers by
//! labeling each response individually.

use std::collections::HashSet;

use tracing::warn;

use tesplugin::formats::dialog::{DialogResponse, DialogTopic};
use tesplugin::FormKey;

use crate::patch::difficulty::{Difficulty, SpeechGlobals};
use crate::patch::speech::{
    has_speech_check, is_amulet_check, is_speech_check, response_tier, speech_check,
};
use crate::settings::Labels;

/// Tag the selection predicate looks for. Matching is case-sensitive
/// here but case-insensitive when rewriting, same as the records vary.
pub const LABEL_MARKER: &str = "(Persuade)";

const TOPIC_NAME_UNIFORM_EXCLUDED: &str = "MS09ThoraldQuestionsBranchTopic";

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.to_ascii_lowercase();
    haystack.find(&needle.to_ascii_lowercase())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    find_ci(haystack, needle).is_some()
}

fn replace_ci(haystack: &str, needle: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(at) = find_ci(rest, needle) {
        out.push_str(&rest[..at]);
        out.push_str(replacement);
        rest = &rest[at + needle.len()..];
    }
    out.push_str(rest);
    out
}

/// Whether a piece of dialog text carries the bare persuade tag.
#[must_use]
pub fn has_marker(text: Option<&str>) -> bool {
    text.is_some_and(|t| t.contains(LABEL_MARKER))
}

/// Whether the topic's name carries the tag.
#[must_use]
pub fn topic_has_marker(topic: &DialogTopic) -> bool {
    has_marker(topic.name.as_deref())
}

/// Whether the response's prompt carries the tag.
#[must_use]
pub fn response_has_marker(response: &DialogResponse) -> bool {
    has_marker(response.prompt.as_deref())
}

/// Rewrite a text to carry a tier label: an existing `(Persuade)` or
/// `(Coerce)` tag gains the label, untagged text gets ` (Persuade: ..)`
/// appended. Already-labeled, intimidate, and bribe options are left
/// alone. Absent text counts as empty, so it comes back as a bare label.
#[must_use]
pub fn apply_label(text: Option<&str>, label: &str) -> Option<String> {
    let str = text.unwrap_or("");
    if contains_ci(str, "(Persuade)") {
        return Some(replace_ci(str, "(Persuade)", &format!("(Persuade: {label})")));
    }
    if contains_ci(str, "(Coerce)") {
        return Some(replace_ci(str, "(Coerce)", &format!("(Coerce: {label})")));
    }
    if !contains_ci(str, "(Persuade:")
        && !contains_ci(str, "(Intimidate)")
        && !(contains_ci(str, "gold)") || contains_ci(str, "septim)"))
    {
        return Some(format!("{str} (Persuade: {label})"));
    }
    text.map(str::to_string)
}

/// Remove a bare `(Persuade)` tag.
#[must_use]
pub fn strip_label(text: &str) -> String {
    if contains_ci(text, "(Persuade)") {
        replace_ci(text, "(Persuade)", "")
    } else {
        text.to_string()
    }
}

/// Whether the topic's speech responses span more than one tier.
#[must_use]
pub fn mixed_tiers(topic: &DialogTopic, globals: &SpeechGlobals) -> bool {
    let tiers: HashSet<Option<Difficulty>> = topic
        .responses
        .iter()
        .filter(|r| has_speech_check(r))
        .map(|r| response_tier(r, globals))
        .collect();
    tiers.len() > 1
}

fn tier_label<'a>(tier: Option<Difficulty>, labels: &'a Labels, key: &FormKey) -> Option<&'a str> {
    match tier {
        Some(tier) => Some(labels.get(tier)),
        None => {
            warn!(form_key = %key, "speech check compares against no known tier, leaving text");
            None
        }
    }
}

/// Label the topic name when every speech response shares one tier.
pub fn label_uniform_name(topic: &mut DialogTopic, globals: &SpeechGlobals, labels: &Labels) {
    if topic.name.is_none()
        || !topic.responses.iter().any(|r| has_speech_check(r))
        || mixed_tiers(topic, globals)
        || topic.editor_id.as_deref() == Some(TOPIC_NAME_UNIFORM_EXCLUDED)
    {
        return;
    }
    let tier = topic
        .responses
        .iter()
        .find(|r| has_speech_check(r))
        .and_then(|r| response_tier(r, globals));
    if let Some(label) = tier_label(tier, labels, &topic.form_key) {
        topic.name = apply_label(topic.name.as_deref(), label);
    }
}

/// An unnamed topic with exactly one speech response takes that
/// response's prompt as its name, labeled, and the prompt is cleared.
pub fn hoist_single_prompt(topic: &mut DialogTopic, globals: &SpeechGlobals, labels: &Labels) {
    if topic.name.is_some() {
        return;
    }
    let speech_count = topic.responses.iter().filter(|r| has_speech_check(r)).count();
    if speech_count != 1 {
        return;
    }
    let Some(index) = topic
        .responses
        .iter()
        .position(|r| response_has_marker(r) && has_speech_check(r))
    else {
        return;
    };
    let tier = response_tier(&topic.responses[index], globals);
    if let Some(label) = tier_label(tier, labels, &topic.form_key) {
        topic.name = apply_label(topic.responses[index].prompt.as_deref(), label);
        topic.responses[index].prompt = None;
    }
}

/// A tagged topic name with no speech responses loses the bare tag.
pub fn strip_unlabeled(topic: &mut DialogTopic) {
    if !topic_has_marker(topic) || topic.responses.iter().any(|r| has_speech_check(r)) {
        return;
    }
    if let Some(name) = topic.name.as_deref() {
        topic.name = Some(strip_label(name));
    }
}

/// When the topic name carries no tag, label response prompts instead,
/// spreading each speech response's label onto every response that
/// shares its prompt text.
pub fn propagate_prompt_labels(topic: &mut DialogTopic, globals: &SpeechGlobals, labels: &Labels) {
    if topic_has_marker(topic) {
        return;
    }
    for index in 0..topic.responses.len() {
        let source = &topic.responses[index];
        let prompt = match source.prompt.as_deref() {
            Some(p) if !p.is_empty() && has_speech_check(source) => p.to_string(),
            _ => continue,
        };
        let Some(label) = tier_label(response_tier(source, globals), labels, &source.form_key)
        else {
            continue;
        };
        let label = label.to_string();
        for response in &mut topic.responses {
            if response.prompt.as_deref() == Some(prompt.as_str()) {
                response.prompt = apply_label(response.prompt.as_deref(), &label);
            }
        }
    }
}

/// Whether two responses gate on the same things, speech and amulet
/// checks aside. Used to pair a success response with its failure twin.
#[must_use]
pub fn conditions_match(a: &DialogResponse, b: &DialogResponse, amulet_list: &FormKey) -> bool {
    let filter = |c: &&tesplugin::formats::condition::Condition| {
        !is_speech_check(c) && !is_amulet_check(c, amulet_list)
    };
    let a_data: Vec<_> = a.conditions.iter().filter(filter).collect();
    let b_data: Vec<_> = b.conditions.iter().filter(filter).collect();
    a_data.len() == b_data.len() && a_data.iter().zip(&b_data).all(|(x, y)| x.data_eq(y))
}

/// Mixed-tier topics label each speech response's prompt individually,
/// together with its condition-matched sibling, falling back to the
/// topic name when a response has no prompt of its own.
pub fn label_mixed_tiers(
    topic: &mut DialogTopic,
    globals: &SpeechGlobals,
    labels: &Labels,
    amulet_list: &FormKey,
) {
    if !mixed_tiers(topic, globals) {
        return;
    }
    for index in 0..topic.responses.len() {
        if !has_speech_check(&topic.responses[index]) {
            continue;
        }
        let info = &topic.responses[index];
        let tier = speech_check(info).and_then(|c| {
            crate::patch::speech::check_tier(c, globals)
        });
        let Some(label) = tier_label(tier, labels, &info.form_key) else {
            continue;
        };
        let label = label.to_string();
        let sibling = topic
            .responses
            .iter()
            .enumerate()
            .position(|(i, other)| i != index && conditions_match(info, other, amulet_list));

        if info.prompt.is_none() && topic.name.is_some() {
            let labeled = apply_label(topic.name.as_deref(), &label);
            topic.responses[index].prompt = labeled.clone();
            if let Some(sibling) = sibling {
                topic.responses[sibling].prompt = labeled;
            }
        } else if info.prompt.is_some() {
            let labeled = apply_label(info.prompt.as_deref(), &label);
            if let Some(sibling) = sibling {
                let sibling_prompt = topic.responses[sibling].prompt.clone();
                topic.responses[sibling].prompt = match sibling_prompt {
                    None => apply_label(labeled.as_deref(), &label),
                    Some(existing) => apply_label(Some(&existing), &label),
                };
            }
            topic.responses[index].prompt = labeled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tesplugin::formats::condition::{CompareOperator, Condition, ConditionValue};

    use crate::patch::speech::make_speech_check;

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

    fn speech_response(globals: &SpeechGlobals, tier: Difficulty) -> DialogResponse {
        let mut response = DialogResponse::new(FormKey::new("Skyrim.esm", 0x1000 + tier as u32));
        response
            .conditions
            .push(make_speech_check(globals.global(tier).clone(), false));
        response
    }

    #[test]
    fn tag_gains_label() {
        assert_eq!(
            apply_label(Some("Let me in. (Persuade)"), "Adept"),
            Some("Let me in. (Persuade: Adept)".to_string())
        );
        assert_eq!(
            apply_label(Some("Think it over. (coerce)"), "Expert"),
            Some("Think it over. (Coerce: Expert)".to_string())
        );
    }

    #[test]
    fn untagged_text_gets_label_appended() {
        assert_eq!(
            apply_label(Some("Surely we can work something out."), "Novice"),
            Some("Surely we can work something out. (Persuade: Novice)".to_string())
        );
        assert_eq!(apply_label(None, "Novice"), Some(" (Persuade: Novice)".to_string()));
    }

    #[test]
    fn labeled_and_bribe_text_is_untouched() {
        for text in [
            "Let me pass. (Persuade: Adept)",
            "Move aside. (Intimidate)",
            "Here, take it. (500 gold)",
            "A small token. (1 septim)",
        ] {
            assert_eq!(apply_label(Some(text), "Master"), Some(text.to_string()));
        }
    }

    #[test]
    fn strip_removes_bare_tag_only() {
        assert_eq!(strip_label("Open up. (Persuade)"), "Open up. ");
        assert_eq!(strip_label("Open up. (Persuade: Adept)"), "Open up. (Persuade: Adept)");
    }

    #[test]
    fn uniform_name_is_labeled() {
        let globals = globals();
        let labels = Labels::default();
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x2000));
        topic.name = Some("Let me through. (Persuade)".to_string());
        topic.responses.push(speech_response(&globals, Difficulty::Average));
        topic.responses.push(speech_response(&globals, Difficulty::Average));

        label_uniform_name(&mut topic, &globals, &labels);
        assert_eq!(topic.name.as_deref(), Some("Let me through. (Persuade: Adept)"));
    }

    #[test]
    fn mixed_tier_topic_keeps_its_name() {
        let globals = globals();
        let labels = Labels::default();
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x2001));
        topic.name = Some("Let me through. (Persuade)".to_string());
        topic.responses.push(speech_response(&globals, Difficulty::Easy));
        topic.responses.push(speech_response(&globals, Difficulty::Hard));

        assert!(mixed_tiers(&topic, &globals));
        label_uniform_name(&mut topic, &globals, &labels);
        assert_eq!(topic.name.as_deref(), Some("Let me through. (Persuade)"));
    }

    #[test]
    fn single_prompt_is_hoisted_into_the_name() {
        let globals = globals();
        let labels = Labels::default();
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x2002));
        let mut response = speech_response(&globals, Difficulty::Hard);
        response.prompt = Some("Tell me where he went. (Persuade)".to_string());
        topic.responses.push(response);

        hoist_single_prompt(&mut topic, &globals, &labels);
        assert_eq!(topic.name.as_deref(), Some("Tell me where he went. (Persuade: Expert)"));
        assert_eq!(topic.responses[0].prompt, None);
    }

    #[test]
    fn tag_without_speech_checks_is_stripped() {
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x2003));
        topic.name = Some("You can trust me. (Persuade)".to_string());
        topic.responses.push(DialogResponse::new(FormKey::new("Skyrim.esm", 0x3000)));

        strip_unlabeled(&mut topic);
        assert_eq!(topic.name.as_deref(), Some("You can trust me. "));
    }

    #[test]
    fn prompt_labels_spread_to_shared_prompts() {
        let globals = globals();
        let labels = Labels::default();
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x2004));
        topic.name = Some("Guard dialogue".to_string());
        let mut success = speech_response(&globals, Difficulty::VeryHard);
        success.prompt = Some("Let him go. (Persuade)".to_string());
        let mut failure = DialogResponse::new(FormKey::new("Skyrim.esm", 0x3001));
        failure.prompt = Some("Let him go. (Persuade)".to_string());
        topic.responses.push(success);
        topic.responses.push(failure);

        propagate_prompt_labels(&mut topic, &globals, &labels);
        for response in &topic.responses {
            assert_eq!(response.prompt.as_deref(), Some("Let him go. (Persuade: Master)"));
        }
    }

    #[test]
    fn mixed_tiers_label_each_response_and_its_twin() {
        let globals = globals();
        let labels = Labels::default();
        let amulet = FormKey::new("Skyrim.esm", 0x0F759C);
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x2005));
        topic.name = Some("Open the gate. (Persuade)".to_string());

        let gate = Condition {
            operator: CompareOperator::EqualTo,
            value: ConditionValue::Float(1.0),
            function: tesplugin::formats::condition::Function::GetStage,
            param1: tesplugin::formats::condition::Param::Form(FormKey::new(
                "Skyrim.esm",
                0x024E0F,
            )),
            ..Condition::default()
        };

        let mut easy = speech_response(&globals, Difficulty::Easy);
        easy.conditions.push(gate.clone());
        let mut easy_fail = DialogResponse::new(FormKey::new("Skyrim.esm", 0x3002));
        easy_fail.conditions.push(gate.clone());
        let hard = speech_response(&globals, Difficulty::Hard);
        topic.responses.push(easy);
        topic.responses.push(easy_fail);
        topic.responses.push(hard);

        label_mixed_tiers(&mut topic, &globals, &labels, &amulet);
        assert_eq!(
            topic.responses[0].prompt.as_deref(),
            Some("Open the gate. (Persuade: Apprentice)")
        );
        assert_eq!(
            topic.responses[1].prompt.as_deref(),
            Some("Open the gate. (Persuade: Apprentice)")
        );
        assert_eq!(
            topic.responses[2].prompt.as_deref(),
            Some("Open the gate. (Persuade: Expert)")
        );
    }
}
