//! Bespoke per-topic repairs
//!
//! A couple dozen vanilla topics have broken persuasion plumbing: a
//! success branch with no failure twin, a missing speech condition, a
//! script fragment wired to the wrong event, links that dead-end. Each
//! gets its own edit here, keyed by the topic's editor id for base-game
//! records and by form key where the original data carries no usable
//! editor id. Fix targets reference specific vanilla responses by form
//! key; a target missing from the load order logs a warning and the
//! edit is skipped.

use tracing::{debug, warn};

use tesplugin::formats::condition::{
    CompareOperator, Condition, ConditionValue, Function, Param,
};
use tesplugin::formats::dialog::{
    DialogResponse, DialogTopic, Emotion, ResponseFlags, ResponseLine,
    LINE_USE_EMOTION_ANIMATION, RESPONSE_GOODBYE, RESPONSE_SAY_ONCE,
};
use tesplugin::formats::vmad::{Fragment, Property};
use tesplugin::formats::PatchMod;
use tesplugin::FormKey;

use crate::patch::difficulty::Difficulty;
use crate::patch::speech::{has_speech_check, make_speech_check};
use crate::patch::PatchContext;

const SKYRIM: &str = "Skyrim.esm";
const DAWNGUARD: &str = "Dawnguard.esm";
const DRAGONBORN: &str = "Dragonborn.esm";

/// Quest holding the generic favor dialog scripts.
const FAVOR_GENERIC_QUEST: &str = "DialogueFavorGeneric";

fn skyrim(id: u32) -> FormKey {
    FormKey::new(SKYRIM, id)
}

fn dawnguard(id: u32) -> FormKey {
    FormKey::new(DAWNGUARD, id)
}

fn dragonborn(id: u32) -> FormKey {
    FormKey::new(DRAGONBORN, id)
}

/// Topics whose vanilla data is broken enough that the selection
/// predicate alone would miss them.
const BROKEN_TOPIC_EDITOR_IDS: [&str; 12] = [
    "DB01MiscGuardPlayerCiceroFramed3",
    "DB01MiscGuardPlayerCiceroFramed2",
    "DB01MiscGuardPlayerCiceroFramed1",
    "DA11IntroVerulusPersuade",
    "DB01MiscLoreiusHelpCiceroResponseb",
    "DB02Captive3Persuade",
    "DB02Captive2Persuade",
    "DB02Captive1Persuade",
    "DialogueWhiterunGuardGateStopIntimidate",
    "DialogueWhiterunGuardGateStopBribe",
    "DialogueWhiterunGuardGateStopPersuade",
    "DA03StartLodBranchPersuadeTopic",
];

/// Whether a topic is on the broken-records list.
#[must_use]
pub fn is_broken_topic(topic: &DialogTopic) -> bool {
    topic
        .editor_id
        .as_deref()
        .is_some_and(|edid| BROKEN_TOPIC_EDITOR_IDS.contains(&edid))
        || topic.form_key.same_record(&dawnguard(0x01_4035))
}

fn add_favor_script_property(response: &mut DialogResponse, quest: FormKey, name: &str) {
    let Some(script) = response
        .script_data
        .as_mut()
        .and_then(|sd| sd.scripts.first_mut())
    else {
        warn!(form_key = %response.form_key, "no attached script to add a property to");
        return;
    };
    script.properties.push(Property::object(name, quest));
}

fn ensure_on_begin_fragment(response: &mut DialogResponse, script_name: &str, fragment_name: &str) {
    if let Some(fragments) = response.script_data.as_mut().and_then(|sd| sd.fragments.as_mut()) {
        if fragments.on_begin.is_none() {
            fragments.on_begin = Some(Fragment::new(script_name, fragment_name));
        }
    }
}

fn clear_on_end_fragment(response: &mut DialogResponse) {
    if let Some(fragments) = response.script_data.as_mut().and_then(|sd| sd.fragments.as_mut()) {
        fragments.on_end = None;
    }
}

fn add_speech_condition(response: &mut DialogResponse, ctx: &PatchContext, tier: Difficulty) {
    response
        .conditions
        .push(make_speech_check(ctx.globals.global(tier).clone(), false));
}

fn overwrite_flags(response: &mut DialogResponse, flags: u16) {
    match response.flags.as_mut() {
        Some(existing) => existing.flags = flags,
        None => response.flags = Some(ResponseFlags::new(flags)),
    }
}

fn add_flag(response: &mut DialogResponse, flag: u16) {
    response.flags.get_or_insert_with(|| ResponseFlags::new(0)).set(flag);
}

fn subject_float(function: Function, operator: CompareOperator, value: f32) -> Condition {
    Condition {
        operator,
        value: ConditionValue::Float(value),
        function,
        ..Condition::default()
    }
}

/// What a fix wants in the response it inserts after its base response.
struct FollowUp {
    copied_conditions: usize,
    flags: Option<u16>,
    response_data: FormKey,
    link_to: Vec<FormKey>,
}

/// Insert a follow-up after the base response, with the base's leading
/// conditions copied over.
fn insert_follow_up(
    topic: &mut DialogTopic,
    patch: &mut PatchMod,
    base: &FormKey,
    spec: FollowUp,
) -> Option<usize> {
    let Some(index) = topic.response_index(base) else {
        warn!(form_key = %base, topic = %topic.form_key, "response to repair is missing");
        return None;
    };
    let source = &topic.responses[index];
    if source.conditions.len() < spec.copied_conditions {
        warn!(form_key = %base, "response has fewer conditions than expected");
        return None;
    }
    let mut follow_up = patch.new_response();
    follow_up.conditions = source.conditions[..spec.copied_conditions].to_vec();
    follow_up.flags = spec.flags.map(ResponseFlags::new);
    follow_up.response_data = Some(spec.response_data);
    follow_up.link_to = spec.link_to;
    topic.responses.insert(index + 1, follow_up);
    Some(index)
}

/// Move the base response's prompt into the topic name.
fn hoist_prompt(topic: &mut DialogTopic, base: &FormKey) {
    if let Some(response) = topic.response_mut(base) {
        let prompt = response.prompt.take();
        topic.name = prompt;
    }
}

/// Apply the per-topic repair, if this topic has one.
pub fn apply_topic_fix(topic: &mut DialogTopic, ctx: &PatchContext, patch: &mut PatchMod) {
    let editor_id = topic.editor_id.clone().unwrap_or_default();
    match editor_id.as_str() {
        "MG04MirabelleAugurInfoBranchTopic" => {
            insert_follow_up(
                topic,
                patch,
                &skyrim(0x04_FA11),
                FollowUp {
                    copied_conditions: 2,
                    flags: Some(RESPONSE_GOODBYE),
                    response_data: skyrim(0x0E_0CC4),
                    link_to: Vec::new(),
                },
            );
        }
        "DB01MiscGuardPlayerCiceroFramed3" => {
            cicero_framed_fix(topic, ctx, patch, skyrim(0x05_56FA), Difficulty::Easy, None);
        }
        "DB01MiscGuardPlayerCiceroFramed2" => {
            cicero_framed_fix(topic, ctx, patch, skyrim(0x05_56F8), Difficulty::Average, Some(0));
        }
        "DB01MiscGuardPlayerCiceroFramed1" => {
            cicero_framed_fix(topic, ctx, patch, skyrim(0x05_56F7), Difficulty::Easy, None);
        }
        "MQ201PartyOndolomarDistractionYes" => {
            favor_fragment_fix(topic, ctx, skyrim(0x06_7EC6), "TIF__00067EC6", "Fragment_1");
        }
        "DA11IntroVerulusPersuade" => {
            let base = skyrim(0x06_0652);
            if let Some(response) = topic.response_mut(&base) {
                add_speech_condition(response, ctx, Difficulty::Easy);
            }
            insert_follow_up(
                topic,
                patch,
                &base,
                FollowUp {
                    copied_conditions: 1,
                    flags: Some(RESPONSE_GOODBYE),
                    response_data: skyrim(0x0E_0CC4),
                    link_to: Vec::new(),
                },
            );
        }
        "DB01MiscLoreiusHelpCiceroResponseb" => {
            let base = skyrim(0x07_DE91);
            if topic.response(&base).is_some() {
                hoist_prompt(topic, &base);
                if let Some(response) = topic.response_mut(&base) {
                    add_speech_condition(response, ctx, Difficulty::Easy);
                }
                insert_follow_up(
                    topic,
                    patch,
                    &base,
                    FollowUp {
                        copied_conditions: 1,
                        flags: Some(RESPONSE_GOODBYE),
                        response_data: skyrim(0x0E_0CC4),
                        link_to: ctx.resolve_all(&[
                            "DB01MiscLoreiusScrewCiceroYes",
                            "DB01MiscLoreiusScrewCiceroNo",
                            "DB01MiscLoreiusHelpCiceroResponseb",
                        ]),
                    },
                );
            }
        }
        "DB02Captive3Persuade" => {
            captive_fix(topic, ctx, patch, skyrim(0x09_DEA6), skyrim(0x0E_0CC5), "DB02Captive3");
        }
        "DB02Captive2Persuade" => {
            captive_fix(topic, ctx, patch, skyrim(0x09_DEA1), skyrim(0x0E_0CC4), "DB02Captive2");
        }
        "DB02Captive1Persuade" => {
            captive_fix(topic, ctx, patch, skyrim(0x09_DEA2), skyrim(0x0E_0CC3), "DB02Captive1");
        }
        "WERJ02Persuade" => {
            if let Some(response) = topic.response_mut(&skyrim(0x0B_815A)) {
                overwrite_flags(response, RESPONSE_GOODBYE);
            }
        }
        "MQ201PartyDistractionPersuadeSiddgeir" => {
            favor_fragment_fix(topic, ctx, skyrim(0x0C_0809), "TIF__000C0809", "Fragment_2");
        }
        "MQ201PartyDistractionPersuadeIgmund" => {
            favor_fragment_fix(topic, ctx, skyrim(0x0C_080D), "TIF__000C080D", "Fragment_2");
        }
        "MQ201PartyDistractionPersuadeVittoria" => {
            favor_fragment_fix(topic, ctx, skyrim(0x06_65D9), "TIF__000665D9", "Fragment_2");
        }
        "MQ201PartyDistractionPersuadeElisif" => {
            favor_fragment_fix(topic, ctx, skyrim(0x0C_0813), "TIF__000C0813", "Fragment_2");
        }
        "DA14AskAboutStaffPersuadeTopic" => {
            if let Some(quest) = ctx.resolve(FAVOR_GENERIC_QUEST) {
                if let Some(response) = topic.response_mut(&skyrim(0x0C_4206)) {
                    add_favor_script_property(response, quest, "pFDS");
                }
            }
        }
        "DialogueWhiterunGuardGateStopIntimidate" => whiterun_intimidate_fix(topic, patch),
        "DialogueWhiterunGuardGateStopBribe" => whiterun_bribe_fix(topic, ctx, patch),
        "DialogueWhiterunGuardGateStopPersuade" => whiterun_persuade_fix(topic, ctx, patch),
        "FFRiften22SapphireBranchTopic01" => {
            if let Some(response) = topic.response_mut(&skyrim(0x0D_4FC2)) {
                add_speech_condition(response, ctx, Difficulty::Average);
                overwrite_flags(response, RESPONSE_GOODBYE);
                add_flag(response, RESPONSE_SAY_ONCE);
            }
            if let Some(response) = topic.response_mut(&skyrim(0x0D_4FC3)) {
                response.link_to.clear();
                overwrite_flags(response, RESPONSE_GOODBYE);
                add_flag(response, RESPONSE_SAY_ONCE);
            }
        }
        "DA03StartLodBranchPersuadeTopic" => lod_persuade_fix(topic, ctx, patch),
        "DialogueRiftenGateNonNorthBranchTopic02" => {
            if let Some(name) = topic.name.as_deref() {
                topic.name = Some(name.replace("(Persuade)", ""));
            }
        }
        "FreeformCidhnaMineADuachPersuade" => {
            if let Some(response) = topic.response_mut(&skyrim(0x0D_B837)) {
                ensure_on_begin_fragment(response, "TIF__000DB837", "Fragment_1");
            }
        }
        "WE31Persuade" => we_persuade_fix(topic, ctx, skyrim(0x0F_F125)),
        "WEJS27Persuade" => we_persuade_fix(topic, ctx, skyrim(0x10_5D0B)),
        "WERoad06Persuade" => we_persuade_fix(topic, ctx, skyrim(0x10_6015)),
        _ => {
            if topic.form_key.same_record(&dawnguard(0x01_4035)) {
                if let Some(response) = topic.response_mut(&dawnguard(0x01_403A)) {
                    response.clear();
                }
            } else if topic.form_key.same_record(&dragonborn(0x02_7573)) {
                if let Some(response) = topic.response_mut(&dragonborn(0x02_75A4)) {
                    if let Some(line) = response.lines.first_mut() {
                        line.text = line.text.replace("(Failed)", "");
                    }
                }
            } else if topic.form_key.same_record(&dragonborn(0x02_C07D)) {
                raven_rock_gate_fix(topic, patch);
            }
        }
    }
}

/// The three Cicero framing accusations share one shape: hoist the
/// prompt, add the missing speech check, and give the success branch a
/// failure twin linking back to all three accusations.
fn cicero_framed_fix(
    topic: &mut DialogTopic,
    ctx: &PatchContext,
    patch: &mut PatchMod,
    base: FormKey,
    tier: Difficulty,
    follow_up_flags: Option<u16>,
) {
    if topic.response(&base).is_none() {
        warn!(form_key = %base, "response to repair is missing");
        return;
    }
    hoist_prompt(topic, &base);
    if let Some(response) = topic.response_mut(&base) {
        add_speech_condition(response, ctx, tier);
    }
    insert_follow_up(
        topic,
        patch,
        &base,
        FollowUp {
            copied_conditions: 2,
            flags: follow_up_flags,
            response_data: skyrim(0x0E_0CC4),
            link_to: ctx.resolve_all(&[
                "DB01MiscGuardPlayerCiceroFramed1",
                "DB01MiscGuardPlayerCiceroFramed2",
                "DB01MiscGuardPlayerCiceroFramed3",
            ]),
        },
    );
}

/// The three Dark Brotherhood captive pleas likewise: hoist the prompt,
/// add an Average speech check, and link the failure twin back to the
/// captive's persuade and intimidate options.
fn captive_fix(
    topic: &mut DialogTopic,
    ctx: &PatchContext,
    patch: &mut PatchMod,
    base: FormKey,
    response_data: FormKey,
    captive: &str,
) {
    if topic.response(&base).is_none() {
        warn!(form_key = %base, "response to repair is missing");
        return;
    }
    hoist_prompt(topic, &base);
    if let Some(response) = topic.response_mut(&base) {
        add_speech_condition(response, ctx, Difficulty::Average);
    }
    let intimidate = format!("{captive}Intimidate");
    let persuade = format!("{captive}Persuade");
    insert_follow_up(
        topic,
        patch,
        &base,
        FollowUp {
            copied_conditions: 1,
            flags: None,
            response_data,
            link_to: ctx.resolve_all(&[intimidate.as_str(), persuade.as_str()]),
        },
    );
}

/// Favor-quest persuasions whose reward fragment never fires: add the
/// favor quest as a script property and wire the fragment to OnBegin.
fn favor_fragment_fix(
    topic: &mut DialogTopic,
    ctx: &PatchContext,
    base: FormKey,
    script_name: &str,
    fragment_name: &str,
) {
    let Some(quest) = ctx.resolve(FAVOR_GENERIC_QUEST) else {
        return;
    };
    if let Some(response) = topic.response_mut(&base) {
        add_favor_script_property(response, quest, "pFDS");
        ensure_on_begin_fragment(response, script_name, fragment_name);
    } else {
        warn!(form_key = %base, "response to repair is missing");
    }
}

/// World-encounter persuasions whose script is missing its quest
/// property under the name the fragment expects.
fn we_persuade_fix(topic: &mut DialogTopic, ctx: &PatchContext, base: FormKey) {
    let Some(quest) = ctx.resolve(FAVOR_GENERIC_QUEST) else {
        return;
    };
    if let Some(response) = topic.response_mut(&base) {
        add_favor_script_property(response, quest, "WEPersuade");
    } else {
        warn!(form_key = %base, "response to repair is missing");
    }
}

fn whiterun_gate_links(ctx: &PatchContext) -> Vec<FormKey> {
    ctx.resolve_all(&[
        "DialogueWhiterunGuardGateStopNote",
        "DialogueWhiterunGuardGateStopPersuade",
        "DialogueWhiterunGuardGateStopBribe",
        "DialogueWhiterunGuardGateStopIntimidate",
        "DialogueWhiterunGuardGateStopNevermind",
    ])
}

/// The Whiterun gate intimidation succeeds unconditionally. Gate the
/// success branch on the intimidation result and add a failure branch
/// that inherits the script fragments.
fn whiterun_intimidate_fix(topic: &mut DialogTopic, patch: &mut PatchMod) {
    let base = skyrim(0x0D_197F);
    let Some(index) = topic.response_index(&base) else {
        warn!(form_key = %base, "response to repair is missing");
        return;
    };
    if topic.responses[index].conditions.is_empty() {
        warn!(form_key = %base, "response has no conditions to copy");
        return;
    }
    {
        let response = &mut topic.responses[index];
        response.conditions.push(subject_float(
            Function::GetIntimidateSuccess,
            CompareOperator::EqualTo,
            0.0,
        ));
    }
    let mut follow_up = patch.new_response();
    follow_up.script_data = topic.responses[index].script_data.take();
    follow_up.flags = Some(ResponseFlags::new(RESPONSE_GOODBYE));
    follow_up.response_data = Some(skyrim(0x0E_0CBC));
    follow_up.conditions = vec![
        topic.responses[index].conditions[0].clone(),
        subject_float(Function::GetIntimidateSuccess, CompareOperator::EqualTo, 1.0),
    ];
    topic.responses.insert(index + 1, follow_up);
}

/// Same story for the gate bribe: gate on the bribe result, fix the
/// fragment event, add the refusal branch.
fn whiterun_bribe_fix(topic: &mut DialogTopic, ctx: &PatchContext, patch: &mut PatchMod) {
    let base = skyrim(0x0D_197B);
    let Some(index) = topic.response_index(&base) else {
        warn!(form_key = %base, "response to repair is missing");
        return;
    };
    if topic.responses[index].conditions.is_empty() {
        warn!(form_key = %base, "response has no conditions to copy");
        return;
    }
    {
        let response = &mut topic.responses[index];
        response.conditions.push(subject_float(
            Function::GetBribeSuccess,
            CompareOperator::EqualTo,
            1.0,
        ));
        clear_on_end_fragment(response);
        ensure_on_begin_fragment(response, "TIF__000D197B", "Fragment_2");
    }
    let mut follow_up = patch.new_response();
    follow_up.flags = Some(ResponseFlags::new(0));
    follow_up.response_data = Some(skyrim(0x0E_0CC4));
    follow_up.conditions = vec![
        topic.responses[index].conditions[0].clone(),
        subject_float(Function::GetIntimidateSuccess, CompareOperator::EqualTo, 0.0),
    ];
    follow_up.link_to = whiterun_gate_links(ctx);
    topic.responses.insert(index + 1, follow_up);
}

/// And the gate persuasion: add the missing speech check, make it a
/// one-time line, fix the fragment event, add the refusal branch.
fn whiterun_persuade_fix(topic: &mut DialogTopic, ctx: &PatchContext, patch: &mut PatchMod) {
    let base = skyrim(0x0D_1981);
    let Some(index) = topic.response_index(&base) else {
        warn!(form_key = %base, "response to repair is missing");
        return;
    };
    if topic.responses[index].conditions.is_empty() {
        warn!(form_key = %base, "response has no conditions to copy");
        return;
    }
    {
        let response = &mut topic.responses[index];
        add_speech_condition(response, ctx, Difficulty::Average);
        add_flag(response, RESPONSE_SAY_ONCE);
        clear_on_end_fragment(response);
        ensure_on_begin_fragment(response, "TIF__000D1981", "Fragment_1");
    }
    let mut follow_up = patch.new_response();
    follow_up.flags = Some(ResponseFlags::new(0));
    follow_up.link_to = whiterun_gate_links(ctx);
    follow_up.response_data = Some(skyrim(0x0E_0CC3));
    follow_up.conditions = vec![topic.responses[index].conditions[0].clone()];
    topic.responses.insert(index + 1, follow_up);
}

/// Lod's persuasion has no speech check, no reward fragment, and no
/// response once his quest is underway.
fn lod_persuade_fix(topic: &mut DialogTopic, ctx: &PatchContext, patch: &mut PatchMod) {
    let base = skyrim(0x0D_7933);
    let Some(index) = topic.response_index(&base) else {
        warn!(form_key = %base, "response to repair is missing");
        return;
    };
    {
        let response = &mut topic.responses[index];
        add_speech_condition(response, ctx, Difficulty::Easy);
        if let Some(quest) = ctx.resolve(FAVOR_GENERIC_QUEST) {
            add_favor_script_property(response, quest, "pFDS");
        }
        ensure_on_begin_fragment(response, "TIF__000D7933", "Fragment_1");
    }
    let mut follow_up = patch.new_response();
    follow_up.flags = Some(ResponseFlags::new(0));
    follow_up.response_data = Some(skyrim(0x0E_0CC3));
    let mut stage_check = subject_float(Function::GetStage, CompareOperator::LessThan, 10.0);
    if let Some(quest) = ctx.resolve("DA03Start") {
        stage_check.param1 = Param::Form(quest);
    }
    follow_up.conditions = vec![stage_check];
    topic.responses.insert(index + 1, follow_up);
}

/// The Raven Rock gate guards have no bribe-refusal dialog at all.
/// Build the two generic branches and point every non-speech response's
/// voice-type check at the guard voice list.
fn raven_rock_gate_fix(topic: &mut DialogTopic, patch: &mut PatchMod) {
    let link_to = vec![
        dragonborn(0x02_C07C),
        dragonborn(0x02_C07A),
        dragonborn(0x02_C079),
        dragonborn(0x02_C078),
    ];
    let guard_conditions = |voice_match: f32| {
        vec![
            Condition {
                operator: CompareOperator::EqualTo,
                value: ConditionValue::Float(0.0),
                function: Function::IsTrespassing,
                reference: Some(FormKey::player_ref()),
                ..Condition::default()
            },
            subject_float(Function::GetCrimeGold, CompareOperator::GreaterThan, 0.0),
            subject_float(Function::GetCrimeGoldViolent, CompareOperator::EqualTo, 0.0),
            subject_float(Function::IsBribedbyPlayer, CompareOperator::EqualTo, 0.0),
            subject_float(Function::GetIsVoiceType, CompareOperator::EqualTo, voice_match),
        ]
    };

    let mut refusal = patch.new_response();
    refusal.flags = Some(ResponseFlags::new(0));
    refusal.link_to = link_to.clone();
    refusal.response_data = Some(skyrim(0x0E_0CC4));
    refusal.conditions = guard_conditions(0.0);
    topic.responses.push(refusal);

    let mut rebuff = patch.new_response();
    rebuff.flags = Some(ResponseFlags::new(0));
    rebuff.link_to = link_to;
    rebuff.lines.push(ResponseLine {
        emotion: Emotion::Anger,
        emotion_value: 50,
        response_number: 1,
        sound: None,
        flags: LINE_USE_EMOTION_ANIMATION,
        text: "That's not going to happen.".to_string(),
        notes: None,
        edits: None,
    });
    rebuff.conditions = guard_conditions(1.0);
    topic.responses.push(rebuff);

    let voice_list = dragonborn(0x01_8469);
    for response in topic.responses.iter_mut().filter(|r| !has_speech_check(r)) {
        match response.conditions.last_mut() {
            Some(last) if last.function == Function::GetIsVoiceType => {
                last.param1 = Param::Form(voice_list.clone());
            }
            _ => debug!(form_key = %response.form_key, "no voice-type check to retarget"),
        }
    }
}

/// The handful of per-response touch-ups that are not tied to one
/// topic's repair: a stray condition, a relationship check against the
/// wrong person, prompts that duplicate the topic name.
pub fn apply_response_touchups(topic: &mut DialogTopic, ctx: &PatchContext) {
    let falk = ctx.resolve("FalkFirebeardREF");
    for response in &mut topic.responses {
        if response.form_key.same_record(&skyrim(0x02_7F63)) && !response.conditions.is_empty() {
            response.conditions.remove(0);
        }
        if response.form_key.same_record(&skyrim(0x02_B8BD)) {
            if let (Some(first), Some(falk)) = (response.conditions.first_mut(), falk.as_ref()) {
                if first.function == Function::GetRelationshipRank {
                    first.param1 = Param::Form(falk.clone());
                }
            }
        }
        if response.form_key.same_record(&skyrim(0x0E_7752))
            || response.form_key.same_record(&skyrim(0x04_DDAA))
        {
            response.prompt = None;
        }
    }
}
