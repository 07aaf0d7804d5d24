//! The patching pass, end to end
//!
//! Selection picks every winning topic that looks like a persuasion
//! check; collection rebuilds its response list from every override
//! version in the load order so edits from earlier plugins survive;
//! then the repairs, condition normalization, text passes, and cleanup
//! run in that order. Responses that come out identical to what the
//! load order already has are dropped, so the patch only overrides
//! what it changes.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use tesplugin::formats::condition::CompareOperator;
use tesplugin::formats::dialog::{DialogResponse, DialogTopic};
use tesplugin::formats::PatchMod;
use tesplugin::FormKey;

use crate::error::Result;
use crate::patch::speech::{
    has_amulet_check, has_speech_check, is_speech_check, make_amulet_check,
    normalize_speech_check, reorder_conditions, response_tier,
};
use crate::patch::{fixes, text, PatchContext};

fn excluded(key: &FormKey) -> bool {
    // Riverwood sawmill argument; matches the predicate but needs no patch.
    key.same_record(&FormKey::new("Skyrim.esm", 0x02_BDDD))
}

/// Whether a winning topic belongs in the patch.
#[must_use]
pub fn selects(topic: &DialogTopic) -> bool {
    if excluded(&topic.form_key) {
        return false;
    }
    text::topic_has_marker(topic)
        || topic.responses.iter().any(text::response_has_marker)
        || topic.responses.iter().any(|r| has_speech_check(r))
        || fixes::is_broken_topic(topic)
}

/// One patched topic in the run summary.
#[derive(Debug, Serialize)]
pub struct TopicSummary {
    pub form_key: String,
    pub editor_id: Option<String>,
    pub name: Option<String>,
    /// Tier labels detected on the topic's speech checks.
    pub tiers: Vec<String>,
    /// Responses the patch overrides after deduplication.
    pub responses: usize,
}

/// Machine-readable result of a run.
#[derive(Debug, Serialize)]
pub struct PatchSummary {
    pub plugin: String,
    pub topics: Vec<TopicSummary>,
}

/// Responses of a topic across every override version: later versions
/// win per response, order follows first appearance.
fn collect_responses(ctx: &PatchContext, key: &FormKey) -> Vec<DialogResponse> {
    let mut merged: IndexMap<FormKey, DialogResponse> = IndexMap::new();
    for version in ctx.load_order.topic_versions(key) {
        for response in &version.responses {
            merged.insert(response.form_key.clone(), response.clone());
        }
    }
    merged.into_values().collect()
}

fn normalize_conditions(topic: &mut DialogTopic, ctx: &PatchContext) {
    for response in &mut topic.responses {
        let Some(index) = response.conditions.iter().position(is_speech_check) else {
            continue;
        };
        normalize_speech_check(&mut response.conditions[index], &ctx.globals);
        if !has_amulet_check(response, &ctx.amulet_list) {
            let inverted =
                response.conditions[index].operator != CompareOperator::GreaterThanOrEqualTo;
            response
                .conditions
                .insert(index + 1, make_amulet_check(ctx.amulet_list.clone(), inverted));
        }
        reorder_conditions(&mut response.conditions, &ctx.amulet_list);
    }
}

fn chain_previous_links(topic: &mut DialogTopic) {
    for index in 1..topic.responses.len() {
        if topic.responses[index].previous.is_none() {
            let predecessor = topic.responses[index - 1].form_key.clone();
            topic.responses[index].previous = Some(predecessor);
        }
    }
}

fn run_text_passes(topic: &mut DialogTopic, ctx: &PatchContext) {
    text::label_uniform_name(topic, &ctx.globals, &ctx.labels);
    text::hoist_single_prompt(topic, &ctx.globals, &ctx.labels);
    text::strip_unlabeled(topic);
    text::propagate_prompt_labels(topic, &ctx.globals, &ctx.labels);
    text::label_mixed_tiers(topic, &ctx.globals, &ctx.labels, &ctx.amulet_list);
}

fn summarize(topic: &DialogTopic, ctx: &PatchContext) -> TopicSummary {
    let mut tiers: Vec<String> = Vec::new();
    for response in &topic.responses {
        if let Some(tier) = response_tier(response, &ctx.globals) {
            let label = ctx.labels.get(tier).to_string();
            if !tiers.contains(&label) {
                tiers.push(label);
            }
        }
    }
    TopicSummary {
        form_key: topic.form_key.to_string(),
        editor_id: topic.editor_id.clone(),
        name: topic.name.clone(),
        tiers,
        responses: topic.responses.len(),
    }
}

/// The winning topics the pass would patch.
#[must_use]
pub fn select_topics<'a>(ctx: &'a PatchContext, extra: &[FormKey]) -> Vec<&'a DialogTopic> {
    let winning = ctx.load_order.winning_topics();
    let mut selected: Vec<&DialogTopic> = Vec::new();
    for topic in winning.values().copied() {
        if selects(topic) || extra.iter().any(|key| key.same_record(&topic.form_key)) {
            selected.push(topic);
        }
    }
    selected
}

/// Run the whole pass and build the patch plugin.
pub fn build_patch(
    ctx: &PatchContext,
    extra: &[FormKey],
    output_name: &str,
) -> Result<(PatchMod, PatchSummary)> {
    let selected = select_topics(ctx, extra);
    info!(topics = selected.len(), "patching persuasion checks");

    let mut patch = PatchMod::new(output_name, ctx.load_order.plugin_names());
    patch.description = "Persuasion checks with explicit difficulty, \
                         bypassed by the Amulet of Articulation."
        .to_string();
    let mut summary = PatchSummary {
        plugin: output_name.to_string(),
        topics: Vec::new(),
    };

    let selected: Vec<DialogTopic> = selected.into_iter().cloned().collect();
    for source in selected {
        debug!(form_key = %source.form_key, editor_id = ?source.editor_id, "patching topic");
        let originals = collect_responses(ctx, &source.form_key);
        let mut topic = source;
        topic.responses = originals.clone();

        fixes::apply_topic_fix(&mut topic, ctx, &mut patch);
        normalize_conditions(&mut topic, ctx);
        run_text_passes(&mut topic, ctx);
        chain_previous_links(&mut topic);
        fixes::apply_response_touchups(&mut topic, ctx);

        topic.responses.retain(|response| !originals.contains(response));
        summary.topics.push(summarize(&topic, ctx));
        patch.topics.insert(topic.form_key.clone(), topic);
    }

    Ok((patch, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tesplugin::formats::condition::{Condition, ConditionValue, Function, Param};
    use tesplugin::formats::condition::ACTOR_VALUE_SPEECH;

    fn topic_with(name: Option<&str>, responses: Vec<DialogResponse>) -> DialogTopic {
        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x10_0000));
        topic.name = name.map(str::to_string);
        topic.responses = responses;
        topic
    }

    fn float_speech_response(id: u32, threshold: f32) -> DialogResponse {
        let mut response = DialogResponse::new(FormKey::new("Skyrim.esm", id));
        response.conditions.push(Condition {
            operator: CompareOperator::GreaterThanOrEqualTo,
            value: ConditionValue::Float(threshold),
            function: Function::GetActorValue,
            param1: Param::Raw(ACTOR_VALUE_SPEECH),
            ..Condition::default()
        });
        response
    }

    #[test]
    fn selection_wants_markers_or_speech_checks() {
        assert!(selects(&topic_with(Some("Calm down. (Persuade)"), Vec::new())));
        assert!(selects(&topic_with(
            None,
            vec![float_speech_response(0x3000, 50.0)]
        )));
        assert!(!selects(&topic_with(Some("Nothing here"), Vec::new())));

        let mut excluded = topic_with(Some("Sawmill spat (Persuade)"), Vec::new());
        excluded.form_key = FormKey::new("Skyrim.esm", 0x02_BDDD);
        assert!(!selects(&excluded));
    }

    #[test]
    fn previous_links_chain_in_order() {
        let mut topic = topic_with(
            None,
            vec![
                DialogResponse::new(FormKey::new("Skyrim.esm", 0x3001)),
                DialogResponse::new(FormKey::new("Skyrim.esm", 0x3002)),
                DialogResponse::new(FormKey::new("Skyrim.esm", 0x3003)),
            ],
        );
        topic.responses[2].previous = Some(FormKey::new("Skyrim.esm", 0x2FFF));

        chain_previous_links(&mut topic);
        assert_eq!(topic.responses[0].previous, None);
        assert_eq!(
            topic.responses[1].previous,
            Some(FormKey::new("Skyrim.esm", 0x3001))
        );
        assert_eq!(
            topic.responses[2].previous,
            Some(FormKey::new("Skyrim.esm", 0x2FFF))
        );
    }
}
