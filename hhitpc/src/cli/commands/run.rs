use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::patch::{pipeline, PatchContext};
use crate::settings::Settings;

pub fn execute(
    data_dir: &Path,
    plugins: &[String],
    plugin_list: Option<&Path>,
    output: &Path,
    settings: Option<&Path>,
    dry_run: bool,
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

    let plugin_name = output
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("HHITPC.esp");
    let (patch, summary) = pipeline::build_patch(&ctx, &extra, plugin_name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for topic in &summary.topics {
            info!(
                form_key = %topic.form_key,
                editor_id = topic.editor_id.as_deref().unwrap_or("-"),
                tiers = topic.tiers.join(", "),
                responses = topic.responses,
                "patched"
            );
        }
    }

    if dry_run {
        info!("dry run, nothing written");
        return Ok(());
    }

    patch
        .write_to(output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), topics = summary.topics.len(), "patch written");
    Ok(())
}
