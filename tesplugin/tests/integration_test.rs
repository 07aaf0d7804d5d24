use tesplugin::formats::headers::{FourCc, GroupHeader, RecordHeader, GROUP_TOP, HEADER_SIZE};
use tesplugin::formats::subrecord::Subrecord;
use tesplugin::prelude::*;

fn base_plugin() -> PatchMod {
    let mut base = PatchMod::new("Skyrim.esm", Vec::new());
    let mut topic = DialogTopic::new(FormKey::new("Skyrim.esm", 0x0D197A));
    topic.editor_id = Some("DialogueWhiterunGuardGateStopPersuade".to_string());
    topic.name = Some("Let me through. (Persuade)".to_string());
    let mut response = DialogResponse::new(FormKey::new("Skyrim.esm", 0x0D1981));
    response.prompt = Some("Let me through. (Persuade)".to_string());
    response.conditions.push(Condition {
        operator: CompareOperator::GreaterThanOrEqualTo,
        value: ConditionValue::Float(50.0),
        function: Function::GetActorValue,
        param1: Param::Raw(17),
        ..Condition::default()
    });
    topic.responses.push(response);
    base.get_or_add_override(&topic);
    base
}

/// Append a hand-framed GLOB top group so the editor-id skim has a
/// non-dialog record to chew on.
fn append_global(bytes: &mut Vec<u8>, editor_id: &str, form_id: u32) {
    let mut data = Vec::new();
    Subrecord::zstring(FourCc::new(b"EDID"), editor_id)
        .write(&mut data)
        .unwrap();
    Subrecord::new(FourCc::new(b"FLTV"), 50.0f32.to_le_bytes().to_vec())
        .write(&mut data)
        .unwrap();

    let mut record = Vec::new();
    let mut header = RecordHeader::new(FourCc::new(b"GLOB"), form_id);
    header.data_size = data.len() as u32;
    header.write(&mut record).unwrap();
    record.extend_from_slice(&data);

    let group = GroupHeader {
        size: HEADER_SIZE + record.len() as u32,
        label: *b"GLOB",
        group_type: GROUP_TOP,
        timestamp: 0,
        vc_info: 0,
        unknown: 0,
    };
    group.write(bytes).unwrap();
    bytes.extend_from_slice(&record);
}

#[test]
fn write_read_and_resolve_through_a_load_order() {
    let dir = tempfile::tempdir().unwrap();

    let mut base_bytes = base_plugin().write_bytes().unwrap();
    append_global(&mut base_bytes, "SpeechAverage", 0x0D16A5);
    std::fs::write(dir.path().join("Skyrim.esm"), &base_bytes).unwrap();

    // An override plugin that renames the topic.
    let mut patch = PatchMod::new("Rename.esp", vec!["Skyrim.esm".to_string()]);
    let base = base_plugin();
    let mut renamed = base.topics.values().next().unwrap().clone();
    renamed.name = Some("Open the gate. (Persuade)".to_string());
    patch.get_or_add_override(&renamed);
    patch
        .write_to(dir.path().join("Rename.esp"))
        .unwrap();

    let names = vec!["Skyrim.esm".to_string(), "Rename.esp".to_string()];
    let load_order = LoadOrder::load(dir.path(), &names).unwrap();

    // Winning override comes from the later plugin.
    let winning = load_order.winning_topics();
    let topic = winning
        .get(&FormKey::new("Skyrim.esm", 0x0D197A))
        .copied()
        .unwrap();
    assert_eq!(topic.name.as_deref(), Some("Open the gate. (Persuade)"));

    // Both versions remain reachable, winning last.
    let versions = load_order.topic_versions(&FormKey::new("Skyrim.esm", 0x0D197A));
    assert_eq!(versions.len(), 2);
    assert_eq!(
        versions[0].name.as_deref(),
        Some("Let me through. (Persuade)")
    );

    // The skimmed GLOB record resolves by editor id.
    assert_eq!(
        load_order.resolve_editor_id("SpeechAverage"),
        Some(FormKey::new("Skyrim.esm", 0x0D16A5))
    );

    // The response's condition survived the trip.
    let condition = &topic.responses[0].conditions[0];
    assert_eq!(condition.function, Function::GetActorValue);
    assert_eq!(condition.value, ConditionValue::Float(50.0));
}

#[test]
fn missing_plugin_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let names = vec!["Missing.esp".to_string()];
    let err = LoadOrder::load(dir.path(), &names).unwrap_err();
    assert!(matches!(err, Error::PluginNotFound { .. }));
}
