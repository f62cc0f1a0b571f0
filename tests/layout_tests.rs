//! Layout engine tests — position count, position ↔ x mapping and spacing
//! validity.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use systemlib::system::{CLEF_WIDTH, DEFAULT_POSITION_SPACING, MIN_POSITION_SPACING};
use systemlib::{BarType, Barline, ChordText, KeySignature, KeyType, System, TimeSignature};

fn bar_with_key(position: u32, key_type: KeyType, accidentals: u8) -> Barline {
    let mut bar = Barline::new(position, BarType::Bar);
    bar.key_signature = KeySignature::shown(key_type, accidentals);
    bar
}

/// A system with a handful of interior barlines, some carrying shown key
/// and time signatures.
fn random_system(rng: &mut SmallRng) -> System {
    let mut system = System::new();
    system
        .set_width(rng.random_range(300..1200))
        .expect("an empty system fits any width");

    let mut position = 0;
    for _ in 0..rng.random_range(0..6) {
        position += rng.random_range(2..6);
        let mut bar = Barline::new(position, BarType::Bar);
        if rng.random_bool(0.5) {
            bar.key_signature = KeySignature::shown(KeyType::Major, rng.random_range(0..15));
        }
        if rng.random_bool(0.3) {
            bar.time_signature = TimeSignature::new(3, 4);
            bar.time_signature.shown = true;
        }
        // Bars past the end are simply rejected.
        let _ = system.insert_barline(bar);
    }
    system
}

// ═══════════════════════════════════════════════════════════════════════
// Position count
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn default_system_position_count() {
    let system = System::new();

    // 750 - (22 + 1) - 20 = 707, 707 / 20 = 35
    assert_eq!(system.first_position_x(), CLEF_WIDTH + 1);
    assert_eq!(system.position_count(), 35);
    assert_eq!(
        system.end_bar().position,
        35,
        "End bar should sit at the position count"
    );
    println!("✓ default system: {} positions", system.position_count());
}

#[test]
fn interior_key_signature_narrows_the_system() {
    let mut system = System::new();
    assert_eq!(system.rect().width, 750);
    assert_eq!(system.position_spacing(), DEFAULT_POSITION_SPACING);

    // Two sharps: 2 * 5 = 10 units of key signature
    system
        .insert_barline(bar_with_key(10, KeyType::Major, 2))
        .expect("Barline at 10 should fit");
    assert_eq!(system.cumulative_interior_key_time_width(None), 10);

    let expected = (750 - (CLEF_WIDTH + 1) - 10 - 20) / 20;
    assert_eq!(expected, 34);
    assert_eq!(system.position_count(), expected as u32);
    assert_eq!(system.end_bar().position, 34);
    println!("✓ width 750, spacing 20, key width 10 → {expected} positions");
}

#[test]
fn position_count_never_increases_with_spacing() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_0001);

    for round in 0..50 {
        let system = random_system(&mut rng);
        let mut previous = u32::MAX;
        for spacing in MIN_POSITION_SPACING as i32..=255 {
            let count = system.compute_position_count(spacing);
            assert!(
                count <= previous,
                "round {round}: count rose from {previous} to {count} at spacing {spacing}"
            );
            previous = count;
        }
    }
    println!("✓ position count is non-increasing in spacing");
}

#[test]
fn spacing_below_minimum_is_never_valid() {
    let system = System::new();
    for spacing in -5..MIN_POSITION_SPACING as i32 {
        assert!(
            !system.is_valid_spacing(spacing),
            "Spacing {spacing} should be invalid"
        );
        assert_eq!(system.compute_position_count(spacing), 0);
    }
    assert!(system.is_valid_spacing(MIN_POSITION_SPACING as i32));
}

#[test]
fn spacing_must_leave_room_for_content() {
    let mut system = System::new();
    system.insert_chord_text(ChordText::new(30, "G")).unwrap();

    // 30 must be < count: at spacing 20 the count is 35
    assert!(system.is_valid_spacing(20));
    // (750 - 23 - 23) / 23 = 30, not enough
    assert!(!system.is_valid_spacing(23));
    assert_eq!(system.max_position(), 30);
}

// ═══════════════════════════════════════════════════════════════════════
// Position ↔ x
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn position_x_is_strictly_increasing() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_0002);

    for round in 0..100 {
        let system = random_system(&mut rng);
        let count = system.position_count();
        for i in 1..=count {
            assert!(
                system.position_x(i - 1) < system.position_x(i),
                "round {round}: x({}) = {} is not left of x({i}) = {}",
                i - 1,
                system.position_x(i - 1),
                system.position_x(i)
            );
        }
    }
    println!("✓ position_x strictly increasing over 100 random systems");
}

#[test]
fn position_x_includes_preceding_signatures() {
    let mut system = System::new();
    system
        .insert_barline(bar_with_key(4, KeyType::Minor, 9))
        .unwrap();

    let first = system.first_position_x();
    // Two flats take 10 units, added only after the barline.
    assert_eq!(system.position_x(4), first + 5 * 20);
    assert_eq!(system.position_x(5), first + 6 * 20 + 10);

    // Out of range falls back to the first position's x.
    assert_eq!(system.position_x(system.position_count() + 1), first);
}

#[test]
fn position_from_x_boundaries() {
    let system = System::new();
    let count = system.position_count();
    let x0 = system.position_x(0);
    assert_eq!(x0, 43);

    // At or before the first position.
    assert_eq!(system.position_from_x(i32::MIN), 0);
    assert_eq!(system.position_from_x(0), 0);
    assert_eq!(system.position_from_x(x0), 0);

    // Between positions 0 and 1, and exactly on position 1: the scan
    // stops at the first position reaching x and answers the one before.
    assert_eq!(system.position_from_x(x0 + 1), 0);
    assert_eq!(system.position_from_x(system.position_x(1)), 0);
    assert_eq!(system.position_from_x(system.position_x(1) + 1), 1);
    assert_eq!(system.position_from_x(system.position_x(10)), 9);

    // Past the last position clamps to count - 1.
    assert_eq!(system.position_from_x(i32::MAX), count - 1);
    assert_eq!(system.position_from_x(system.position_x(count)), count - 1);
    println!("✓ position_from_x boundaries pinned");
}

#[test]
fn width_too_narrow_for_any_position_is_rejected() {
    let mut system = System::new();
    let before = system.clone();

    // Even position 0 needs one slot before the end bar.
    assert!(system.set_width(30).is_err());
    assert_eq!(system, before, "Rejected width change should leave the system unchanged");

    system.set_width(400).unwrap();
    assert_eq!(system.position_count(), (400 - 23 - 20) / 20);
}

// ═══════════════════════════════════════════════════════════════════════
// Staff offsets
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn staff_offsets_stack_staff_heights() {
    let mut system = System::new();
    system.init(&[6, 4], &[true, true], false).unwrap();
    system.set_extra_spacing(5);

    let first = system.staff(0).unwrap().height();
    assert_eq!(system.staff_height_offset(0, false), Some(5));
    assert_eq!(system.staff_height_offset(1, false), Some(5 + first as i32));
    assert_eq!(
        system.staff_height_offset(1, true),
        Some(system.rect().top + 5 + first as i32)
    );
    assert_eq!(system.staff_height_offset(2, false), None);

    let second = system.staff(1).unwrap().height();
    assert_eq!(system.rect().height as u32, 5 + first + second);
}
