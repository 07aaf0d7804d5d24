use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::patch::difficulty::SpeechGlobals;
use crate::patch::speech::response_tier;
use crate::patch::{pipeline, PatchContext};
use crate::settings::{Labels, Settings};

use tesplugin::formats::dialog::DialogTopic;

#[derive(Debug, Serialize)]
struct ScanEntry {
    form_key: String,
    editor_id: Option<String>,
    name: Option<String>,
    tiers: Vec<String>,
}

fn entry(topic: &DialogTopic, globals: &SpeechGlobals, labels: &Labels) -> ScanEntry {
    let mut tiers: Vec<String> = Vec::new();
    for response in &topic.responses {
        if let Some(tier) = response_tier(response, globals) {
            let label = labels.get(tier).to_string();
            if !tiers.contains(&label) {
                tiers.push(label);
            }
        }
    }
    ScanEntry {
        form_key: topic.form_key.to_string(),
        editor_id: topic.editor_id.clone(),
        name: topic.name.clone(),
        tiers,
    }
}

pub fn execute(
    data_dir: &Path,
    plugins: &[String],
    plugin_list: Option<&Path>,
    settings: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let settings = match settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let extra = settings.extra_topic_keys().context("parsing extra_topics")?;

    let order = super::load_plugins(data_dir, plugins, plugin_list)?;
    let ctx = PatchContext::new(&order, settings.labels)?;

    let entries: Vec<ScanEntry> = pipeline::select_topics(&ctx, &extra)
        .into_iter()
        .map(|topic| entry(topic, &ctx.globals, &ctx.labels))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!(
                "{}  {}  {}  [{}]",
                entry.form_key,
                entry.editor_id.as_deref().unwrap_or("-"),
                entry.name.as_deref().unwrap_or("-"),
                entry.tiers.join(", ")
            );
        }
        println!("{} matching topics", entries.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tesplugin::FormKey;

    use crate::patch::difficulty::Difficulty;
    use crate::patch::speech::make_speech_check;

    #[test]
    fn entries_use_the_configured_labels() {
        let average = FormKey::new("Skyrim.esm", 0x0D16A5);
        let globals = SpeechGlobals::from_parts(
            HashMap::from([(Difficulty::Average, average.clone())]),
            HashMap::from([(average.clone(), Difficulty::Average)]),
        );
        let labels = Labels {
            average: Some("Journeyman".to_string()),
            ..Labels::default()
        };

        let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x2000));
        let mut response =
            tesplugin::formats::dialog::DialogResponse::new(FormKey::new("Skyrim.esm", 0x3000));
        response.conditions.push(make_speech_check(average, false));
        topic.responses.push(response);

        let entry = entry(&topic, &globals, &labels);
        assert_eq!(entry.tiers, vec!["Journeyman".to_string()]);
    }
}
