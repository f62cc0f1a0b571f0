//! Render map tests — the layout snapshot handed to renderers and the
//! playback cursor, and the JSON/FFI helpers around it.

use systemlib::playback::{PlaybackSettings, VibratoEvent, VibratoEventType, VibratoType};
use systemlib::{
    build_render_map, encode_system, render_map_to_json, system_from_json, system_to_json,
    BarType, Barline, KeySignature, KeyType, System,
};

fn sample_system() -> System {
    let mut system = System::new();
    system.init(&[6, 4], &[true, true], false).unwrap();
    let mut bar = Barline::new(8, BarType::Bar);
    bar.key_signature = KeySignature::shown(KeyType::Major, 1);
    system.insert_barline(bar).unwrap();
    system
        .insert_barline(Barline::new(16, BarType::DoubleBar))
        .unwrap();
    system
}

#[test]
fn render_map_matches_layout_queries() {
    let system = sample_system();
    let map = build_render_map(&system);

    assert_eq!(map.position_x.len() as u32, system.position_count() + 1);
    for (i, &x) in map.position_x.iter().enumerate() {
        assert_eq!(x, system.position_x(i as u32), "x of position {i}");
    }

    let positions: Vec<u32> = map.barlines.iter().map(|b| b.position).collect();
    assert_eq!(positions, vec![0, 8, 16, system.position_count()]);
    assert_eq!(map.barlines[0].x, system.first_position_x() - 1);
    assert_eq!(map.barlines[1].signature_width, 5);
    assert_eq!(map.barlines[2].bar_type, BarType::DoubleBar);

    assert_eq!(map.measures.len(), 3, "Three bars between four barlines");
    for m in &map.measures {
        assert!(m.width > 0, "Measure at {} should have positive width", m.start_position);
    }

    assert_eq!(map.staves.len(), 2);
    assert_eq!(map.staves[0].y, 0);
    assert_eq!(map.staves[1].y, map.staves[0].height);
    println!(
        "✓ render map: {} positions, {} barlines, {} measures",
        map.position_x.len(),
        map.barlines.len(),
        map.measures.len()
    );
}

#[test]
fn render_map_json_has_expected_fields() {
    let json = render_map_to_json(&build_render_map(&sample_system()));
    let value: serde_json::Value = serde_json::from_str(&json).expect("Valid JSON");

    for key in ["rect", "position_spacing", "position_x", "barlines", "measures", "staves"] {
        assert!(value.get(key).is_some(), "Render map JSON should contain {key}");
    }
    assert_eq!(value["barlines"][2]["bar_type"], "DoubleBar");
}

#[test]
fn render_map_from_bytes() {
    let bytes = encode_system(&sample_system()).unwrap();
    let json = systemlib::render_map_json_from_bytes(&bytes, 4).unwrap();
    assert!(json.contains("\"measures\""));

    let err = systemlib::render_map_json_from_bytes(&bytes[..10], 4).unwrap_err();
    assert!(err.contains("version 4"), "Error should name the version: {err}");
}

#[test]
fn json_round_trip() {
    let system = sample_system();
    let json = system_to_json(&system).unwrap();
    let parsed = system_from_json(&json).unwrap();
    assert_eq!(parsed, system);

    assert!(system_from_json("{").is_err());
}

#[test]
fn vibrato_uses_the_settings_it_is_given() {
    let settings = PlaybackSettings {
        vibrato_width: 70,
        wide_vibrato_width: 110,
    };
    let on = VibratoEvent::new(3, 250.0, 8, VibratoEventType::On, VibratoType::Wide);
    let off = VibratoEvent::new(3, 500.0, 9, VibratoEventType::Off, VibratoType::Wide);

    assert_eq!(on.perform(&settings).bytes, vec![0xB3, 1, 110]);
    assert_eq!(off.perform(&settings).bytes, vec![0xB3, 1, 0]);
}
