use hhitpc::patch::{pipeline, PatchContext};
use hhitpc::settings::Labels;
use hhitpc::tesplugin::formats::condition::FLAG_OR;
use hhitpc::tesplugin::formats::headers::{FourCc, GroupHeader, RecordHeader, GROUP_TOP, HEADER_SIZE};
use hhitpc::tesplugin::formats::subrecord::Subrecord;
use hhitpc::tesplugin::prelude::*;

/// Append a hand-framed top group holding one record with just an
/// editor id, enough for editor-id resolution to find it.
fn append_record(bytes: &mut Vec<u8>, record_type: &[u8; 4], editor_id: &str, form_id: u32) {
    let mut data = Vec::new();
    Subrecord::zstring(FourCc::new(b"EDID"), editor_id)
        .write(&mut data)
        .unwrap();

    let mut record = Vec::new();
    let mut header = RecordHeader::new(FourCc::new(record_type), form_id);
    header.data_size = data.len() as u32;
    header.write(&mut record).unwrap();
    record.extend_from_slice(&data);

    let group = GroupHeader {
        size: HEADER_SIZE + record.len() as u32,
        label: *record_type,
        group_type: GROUP_TOP,
        timestamp: 0,
        vc_info: 0,
        unknown: 0,
    };
    group.write(bytes).unwrap();
    bytes.extend_from_slice(&record);
}

fn speech_check(threshold: f32) -> Condition {
    Condition {
        operator: CompareOperator::GreaterThanOrEqualTo,
        value: ConditionValue::Float(threshold),
        function: Function::GetActorValue,
        param1: Param::Raw(17),
        ..Condition::default()
    }
}

fn base_plugin_bytes() -> Vec<u8> {
    let mut base = PatchMod::new("Skyrim.esm", Vec::new());

    // A persuasion topic with a float-threshold check and a plain
    // follow-up response.
    let mut persuade = DialogTopic::new(FormKey::new("Skyrim.esm", 0x10_0100));
    persuade.editor_id = Some("GateGuardPersuadeTopic".to_string());
    persuade.name = Some("Let me through. (Persuade)".to_string());
    let mut success = DialogResponse::new(FormKey::new("Skyrim.esm", 0x10_0200));
    success.conditions.push(speech_check(50.0));
    let mut aside = DialogResponse::new(FormKey::new("Skyrim.esm", 0x10_0201));
    aside.lines.push(ResponseLine {
        emotion: Emotion::Neutral,
        emotion_value: 0,
        response_number: 1,
        sound: None,
        flags: 0,
        text: "Fine. Go on through.".to_string(),
        notes: None,
        edits: None,
    });
    persuade.responses.push(success);
    persuade.responses.push(aside);
    base.get_or_add_override(&persuade);

    // An unrelated topic the selection must leave alone.
    let mut mundane = DialogTopic::new(FormKey::new("Skyrim.esm", 0x10_0101));
    mundane.editor_id = Some("GateGuardRumorsTopic".to_string());
    mundane.name = Some("Heard any rumors?".to_string());
    base.get_or_add_override(&mundane);

    let mut bytes = base.write_bytes().unwrap();
    for (edid, id) in [
        ("SpeechVeryEasy", 0x0D_16A3u32),
        ("SpeechEasy", 0x0D_16A4),
        ("SpeechAverage", 0x0D_16A5),
        ("SpeechHard", 0x0D_1943),
        ("SpeechVeryHard", 0x0D_1944),
    ] {
        append_record(&mut bytes, b"GLOB", edid, id);
    }
    append_record(&mut bytes, b"FLST", "TGAmuletofArticulationList", 0x0F_759C);
    append_record(&mut bytes, b"QUST", "DialogueFavorGeneric", 0x03_4E64);
    bytes
}

#[test]
fn full_pass_over_a_synthetic_load_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Skyrim.esm"), base_plugin_bytes()).unwrap();

    let names = vec!["Skyrim.esm".to_string()];
    let order = LoadOrder::load(dir.path(), &names).unwrap();
    let ctx = PatchContext::new(&order, Labels::default()).unwrap();

    let (patch, summary) = pipeline::build_patch(&ctx, &[], "HHITPC.esp").unwrap();

    // Only the persuasion topic is patched.
    assert_eq!(summary.topics.len(), 1);
    assert_eq!(summary.topics[0].tiers, vec!["Adept".to_string()]);
    let topic = patch
        .topics
        .get(&FormKey::new("Skyrim.esm", 0x10_0100))
        .unwrap();
    assert!(!patch.topics.contains_key(&FormKey::new("Skyrim.esm", 0x10_0101)));

    // The name carries the tier label.
    assert_eq!(topic.name.as_deref(), Some("Let me through. (Persuade: Adept)"));

    // The float check became a global comparison on the player with an
    // amulet bypass, speech then amulet last.
    let success = topic.response(&FormKey::new("Skyrim.esm", 0x10_0200)).unwrap();
    let conditions = &success.conditions;
    assert_eq!(conditions.len(), 2);
    let speech = &conditions[0];
    assert_eq!(speech.function, Function::GetActorValue);
    assert_eq!(
        speech.value,
        ConditionValue::Global(FormKey::new("Skyrim.esm", 0x0D_16A5))
    );
    assert_eq!(speech.run_on, RunOn::Reference);
    assert_eq!(speech.reference, Some(FormKey::player_ref()));
    assert!(speech.flags & FLAG_OR != 0);
    let amulet = &conditions[1];
    assert_eq!(amulet.function, Function::GetEquipped);
    assert_eq!(
        amulet.param1.as_form(),
        Some(&FormKey::new("Skyrim.esm", 0x0F_759C))
    );
    assert!(amulet.flags & FLAG_OR != 0);

    // The follow-up got chained to its predecessor, which keeps it in
    // the patch even though nothing else about it changed.
    let aside = topic.response(&FormKey::new("Skyrim.esm", 0x10_0201)).unwrap();
    assert_eq!(aside.previous, Some(FormKey::new("Skyrim.esm", 0x10_0200)));

    // The written plugin reads back with the label intact.
    patch.write_to(dir.path().join("HHITPC.esp")).unwrap();
    let names = vec!["Skyrim.esm".to_string(), "HHITPC.esp".to_string()];
    let reread = LoadOrder::load(dir.path(), &names).unwrap();
    let winning = reread.winning_topics();
    let topic = winning
        .get(&FormKey::new("Skyrim.esm", 0x10_0100))
        .copied()
        .unwrap();
    assert_eq!(topic.name.as_deref(), Some("Let me through. (Persuade: Adept)"));
    assert_eq!(topic.responses.len(), 2);
}

#[test]
fn unchanged_responses_are_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Skyrim.esm"), base_plugin_bytes()).unwrap();

    let names = vec!["Skyrim.esm".to_string()];
    let order = LoadOrder::load(dir.path(), &names).unwrap();
    let ctx = PatchContext::new(&order, Labels::default()).unwrap();

    let (patch, _) = pipeline::build_patch(&ctx, &[], "HHITPC.esp").unwrap();
    let topic = patch
        .topics
        .get(&FormKey::new("Skyrim.esm", 0x10_0100))
        .unwrap();

    // Every surviving response differs from its load-order original.
    let originals = order.topic_versions(&FormKey::new("Skyrim.esm", 0x10_0100));
    for response in &topic.responses {
        let original = originals
            .iter()
            .find_map(|version| version.response(&response.form_key));
        assert_ne!(original, Some(response));
    }
}
