use std::fs;
use pretty_assertions::assert_eq;
use vfx_breakdown::models::{EntityKind, ParseLineError, ScriptToken, VfxTag};
use vfx_breakdown::{parse, Conf};

fn sample() -> String {
    fs::read_to_string("tests/test_data/sample_breakdown.txt").expect("无法读取测试文件")
}

fn action(text: &str, vfx: Option<VfxTag>) -> ScriptToken {
    ScriptToken::Action { text: text.to_string(), vfx }
}

#[test]
fn end_to_end_dialogue_scenario() {
    let script = "INT. HOUSE - DAY\n\nJOHN\nHello there.\n\n===                              2\n";
    let result = parse(script, &Conf::default()).unwrap();

    assert_eq!(
        result.tokens,
        vec![
            ScriptToken::scene_heading("HOUSE - DAY", "1", 1),
            ScriptToken::DialogueBegin,
            ScriptToken::character("JOHN", "JOHN", false),
            ScriptToken::dialogue("Hello there.\n"),
            ScriptToken::DialogueEnd,
            ScriptToken::PageBreak { page_num: 2 },
        ]
    );
    assert_eq!(result.entities.len(), 1);
    let john = result.entities.get("JOHN").unwrap();
    assert_eq!(john.kind, EntityKind::Char);
    assert_eq!(john.count, 1);
    assert!(result.line_errors.is_empty());
}

#[test]
fn sample_script_tokens() {
    let result = parse(&sample(), &Conf::default()).unwrap();

    let expected = vec![
        ScriptToken::SceneHeading {
            text: "WAREHOUSE - NIGHT".to_string(),
            scene_num: "1".to_string(),
            page_num: 1,
            vfx: Some(VfxTag::new("easy")),
            collapsed: false,
        },
        action(
            "Dust hangs in the air. **Rex**[[char]] drags a crate across the floor. [[need CG dust]]\nSparks fly from the wall.",
            Some(VfxTag::with_shot("3", "hard")),
        ),
        ScriptToken::DialogueBegin,
        ScriptToken::character("REX", "REX", false),
        ScriptToken::Parenthetical { text: "(whispering)".to_string() },
        ScriptToken::dialogue("Is anyone here?\n"),
        ScriptToken::DialogueEnd,
        ScriptToken::DialogueBegin,
        ScriptToken::character("MARA (V.O.)", "MARA", false),
        ScriptToken::dialogue("Behind you.\n"),
        ScriptToken::DialogueEnd,
        action(
            "BOOM! The Explosion rips through the gun rack.",
            Some(VfxTag::with_shot("4", "epic")),
        ),
        ScriptToken::Transition { text: "CUT TO:".to_string() },
        ScriptToken::scene_heading("ROOFTOP - DAY", "2", 1),
        action("Rex climbs onto the roof.", None),
        ScriptToken::PageBreak { page_num: 2 },
        ScriptToken::Flashback {
            text: "FLASHBACK - 1995".to_string(),
            scene_num: "3".to_string(),
            page_num: 2,
        },
        ScriptToken::DialogueBegin,
        ScriptToken::character("YOUNG REX", "YOUNG REX", false),
        ScriptToken::dialogue("Wait for me!\n"),
        ScriptToken::DialogueEnd,
        ScriptToken::Centered { text: "THE END".to_string() },
    ];
    assert_eq!(result.tokens, expected);
}

#[test]
fn sample_script_entities() {
    let result = parse(&sample(), &Conf::default()).unwrap();
    let entities = &result.entities;

    let rex = entities.get("rex").unwrap();
    assert_eq!(rex.name, "Rex");
    assert_eq!(rex.kind, EntityKind::Char);
    // 内联标记、角色提示行、正文各一次
    assert_eq!(rex.count, 3);

    assert_eq!(entities.get("crate").unwrap().kind, EntityKind::Prop);
    assert_eq!(entities.get("crate").unwrap().count, 1);
    assert_eq!(entities.get("GUN").unwrap().count, 1);
    assert_eq!(entities.get("explosion").unwrap().kind, EntityKind::Fx);
    assert_eq!(entities.get("MARA").unwrap().count, 1);
    assert_eq!(entities.get("YOUNG REX").unwrap().count, 1);
    assert_eq!(entities.len(), 6);
}

#[test]
fn malformed_lines_are_skipped() {
    let script = "\
INT. LAB - NIGHT

Smoke fills the room. [[vfx ultra]]

The door opens.

=== two

[[char]] waves.

EXT. YARD - DAY
";
    let result = parse(script, &Conf::default()).unwrap();

    assert_eq!(
        result.line_errors,
        vec![
            ParseLineError::UnknownVfxLevel {
                line: 2,
                annotation: "[[vfx ultra]]".to_string()
            },
            ParseLineError::InvalidPageNumber {
                line: 6,
                value: "two".to_string()
            },
            ParseLineError::MalformedAnnotation {
                line: 8,
                annotation: "[[char]]".to_string()
            },
        ]
    );
    assert_eq!(
        result.tokens,
        vec![
            ScriptToken::scene_heading("LAB - NIGHT", "1", 1),
            ScriptToken::action("The door opens."),
            ScriptToken::scene_heading("YARD - DAY", "2", 1),
        ]
    );
}

#[test]
fn explicit_numbers_push_auto_numbers_to_suffixes() {
    let script = "\
INT. A - DAY #5#

Text.

INT. B - DAY

Text.

INT. C - DAY #6#

Text.
";
    let result = parse(script, &Conf::default()).unwrap();
    let numbers: Vec<&str> = result.tokens.iter().filter_map(|t| t.scene_num()).collect();
    assert_eq!(numbers, vec!["5", "5A", "6"]);
}

#[test]
fn flush_left_layout_and_forced_sigils() {
    let script = "\
EXT. BEACH - DAY

!WAVES
crash against the rocks.

@McGee ^
(softly)
What now?

BOOM
";
    let result = parse(script, &Conf::default()).unwrap();
    assert_eq!(
        result.tokens,
        vec![
            ScriptToken::scene_heading("BEACH - DAY", "1", 1),
            ScriptToken::action("WAVES\ncrash against the rocks."),
            ScriptToken::DialogueBegin,
            ScriptToken::character("McGee", "McGee", true),
            ScriptToken::Parenthetical { text: "(softly)".to_string() },
            ScriptToken::dialogue("What now?\n"),
            ScriptToken::DialogueEnd,
            ScriptToken::DialogueBegin,
            ScriptToken::character("BOOM", "BOOM", false),
            ScriptToken::DialogueEnd,
        ]
    );
}

#[test]
fn dialogue_continues_after_indented_parenthetical() {
    let script = "                      JOHN\n                (quietly)\n          Go now.\n          Please.\n";
    let result = parse(script, &Conf::default()).unwrap();
    assert_eq!(
        result.tokens,
        vec![
            ScriptToken::DialogueBegin,
            ScriptToken::character("JOHN", "JOHN", false),
            ScriptToken::Parenthetical { text: "(quietly)".to_string() },
            ScriptToken::dialogue("Go now.\nPlease."),
            ScriptToken::DialogueEnd,
        ]
    );

    let script = "                      JOHN\n          Wait.\n                (beat)\n          Go now.\n";
    let result = parse(script, &Conf::default()).unwrap();
    assert_eq!(
        result.tokens,
        vec![
            ScriptToken::DialogueBegin,
            ScriptToken::character("JOHN", "JOHN", false),
            ScriptToken::dialogue("Wait."),
            ScriptToken::Parenthetical { text: "(beat)".to_string() },
            ScriptToken::dialogue("Go now."),
            ScriptToken::DialogueEnd,
        ]
    );
}

#[test]
fn empty_input_fails_fast() {
    assert!(parse("", &Conf::default()).is_err());
}
