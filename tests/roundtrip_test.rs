use std::fs;
use std::time::Duration;
use pretty_assertions::assert_eq;
use vfx_breakdown::document::{tokens_to_document, DocumentConverter};
use vfx_breakdown::models::{BlockClass, BreakdownError, ScriptToken};
use vfx_breakdown::{parse, serialize_script, Conf};

fn sample() -> String {
    fs::read_to_string("tests/test_data/sample_breakdown.txt").expect("无法读取测试文件")
}

#[test]
fn serialized_script_parses_back_to_same_tokens() {
    let conf = Conf::default();
    let first = parse(&sample(), &conf).unwrap();

    let text = serialize_script(&first.tokens, &first.entities, false);
    let second = parse(&text, &conf).unwrap();

    assert_eq!(second.tokens, first.tokens);
    assert_eq!(second.entities, first.entities);
    assert!(second.line_errors.is_empty());
}

#[test]
fn serializer_round_trip_handles_forced_lines() {
    let conf = Conf::default();
    let script = "\
.SPACESHIP BRIDGE #12B#

!BOOM
!(the lights flicker)
INT. STILL ACTION

@McGee ^
Wait.
(beat)
Go.

EMPTY

!WAVES
crash.
";
    let first = parse(script, &conf).unwrap();
    let text = serialize_script(&first.tokens, &first.entities, false);
    let second = parse(&text, &conf).unwrap();
    assert_eq!(second.tokens, first.tokens);
}

#[test]
fn clean_export_has_no_markup() {
    let parsed = parse(&sample(), &Conf::default()).unwrap();
    let text = serialize_script(&parsed.tokens, &parsed.entities, true);
    assert!(!text.contains("[["));
    assert!(!text.contains("**"));
    assert!(text.contains("Dust hangs in the air. Rex drags a crate across the floor."));
    assert!(text.contains("1  WAREHOUSE - NIGHT"));
}

#[test]
fn document_round_trip_is_exact() {
    let conf = Conf::default();
    let parsed = parse(&sample(), &conf).unwrap();

    let document = tokens_to_document(&parsed.tokens, &parsed.entities);
    assert_eq!(document.declarations.len(), parsed.entities.len());
    assert!(document
        .blocks
        .iter()
        .any(|b| b.class == BlockClass::SceneHeading && b.get_str("data-vfx") == Some("easy")));

    let (tokens, entities) = DocumentConverter::new(&conf).document_to_tokens(&document).unwrap();
    assert_eq!(tokens, parsed.tokens);
    assert_eq!(entities, parsed.entities);
}

#[test]
fn document_round_trip_keeps_adjacent_blocks_apart() {
    let tokens = vec![
        ScriptToken::action("First."),
        ScriptToken::action("Second."),
        ScriptToken::DialogueBegin,
        ScriptToken::character("ANNA", "ANNA", false),
        ScriptToken::dialogue("One."),
        ScriptToken::dialogue("Two."),
        ScriptToken::DialogueEnd,
    ];
    let mut entities = vfx_breakdown::EntityRegistry::new();
    entities.define("ANNA", vfx_breakdown::EntityKind::Char);
    entities.tally(&tokens);

    let conf = Conf::default();
    let document = tokens_to_document(&tokens, &entities);
    let (back, _) = DocumentConverter::new(&conf).document_to_tokens(&document).unwrap();
    assert_eq!(back, tokens);
}

#[test]
fn conversion_deadline_yields_no_partial_result() {
    let parsed = parse(&sample(), &Conf::default()).unwrap();
    let document = tokens_to_document(&parsed.tokens, &parsed.entities);
    let result = DocumentConverter::new(&Conf::default())
        .with_timeout(Some(Duration::ZERO))
        .document_to_tokens(&document);
    assert!(matches!(result, Err(BreakdownError::ConversionTimeout(_))));
}
