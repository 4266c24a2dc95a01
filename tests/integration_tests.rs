//! Integration tests for the kara lyric editor
//!
//! Tests the parse -> edit -> serialize pipeline and the editing session.

use kara::lexer::{tokenize, TextLine};
use kara::serializer::render_segments;
use kara::time::{format_time, parse_time};
use kara::{
    parse, reformat, reformat_bytes, serialize, Block, Command, CommandOutcome, Cursor, CursorPosition,
    EditorConfig, KaraError, Line, ManualTimerHost, RubySegment, Session,
};
use proptest::prelude::*;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

const SONG: &str = "@Title=Hoshi no Uta\r\n\
@Artist=Someone\r\n\
@Offset=-120\r\n\
@TimeRatio=1.5\r\n\
@Ruby1=愛,[00:00.00]あ[00:00.40]い\r\n\
@Ruby2=空,そら\r\n\
\r\n\
[00:01.00]愛[00:01.80]の[00:02.20]空\r\n\
[00:04.00]Hello [00:05.00]World[00:06.00]\r\n\
[00:0x.00]broken line";

#[test]
fn test_end_to_end_scenario() {
    let doc = parse("[00:01.00]Hello [00:02.50]World");
    assert_eq!(
        doc.row(0).unwrap(),
        &[
            Block::new("Hello ", Some(1.0)),
            Block::new("World", Some(2.5)),
            Block::new("", None),
        ]
    );

    let mut cursor = Cursor::new(false);
    assert!(cursor.right(&doc));
    assert_eq!(cursor.position(), CursorPosition::new(0, 1, 0));
}

#[test]
fn test_ruby_propagation() {
    let doc = parse("@Ruby1=愛,[00:01.00]あ[00:01.50]い\n[00:01.00]愛");
    let block = doc.block(0, 0).unwrap();
    assert_eq!(
        block.ruby.as_deref(),
        Some(&[RubySegment::new("あ", Some(1.0)), RubySegment::new("い", Some(1.5))][..])
    );
}

#[test]
fn test_time_precision() {
    assert_eq!(format_time(75.256), "01:15.25");
    assert_eq!(parse_time("01:15.25"), Some(75.25));
    assert_eq!(parse_time("01:15"), Some(75.0));
}

#[test]
fn test_song_metadata_and_lines() {
    let doc = parse(SONG);
    assert_eq!(doc.metadata.title.as_deref(), Some("Hoshi no Uta"));
    assert_eq!(doc.metadata.artist.as_deref(), Some("Someone"));
    assert_eq!(doc.metadata.offset, Some(-120));
    assert_eq!(doc.metadata.time_ratio, Some(1.5));
    assert_eq!(doc.row_count(), 2);
    assert_eq!(doc.lines.last(), Some(&Line::Text("[00:0x.00]broken line".to_string())));

    let sky = doc.block(0, 2).unwrap();
    assert_eq!(sky.word, "空");
    assert_eq!(sky.ruby.as_ref().map(|r| r.len()), Some(2));
}

#[test]
fn test_song_round_trip() {
    let doc = parse(SONG);
    let again = parse(&serialize(&doc));
    assert_eq!(doc.data(), again.data());
    assert_eq!(doc.metadata, again.metadata);

    let text = |d: &kara::Document| -> Vec<String> {
        d.lines
            .iter()
            .filter_map(|line| match line {
                Line::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    };
    assert_eq!(text(&doc), text(&again));
}

#[test]
fn test_reformat_is_stable() {
    let once = reformat(SONG);
    assert_eq!(reformat(&once), once);
    assert!(once.contains("@Ruby1=愛,[00:00.00]あ[00:00.40]い\r\n"));
    assert!(once.contains("@Ruby2=空,そら\r\n"));
}

#[test]
fn test_reformat_shift_jis_bytes() {
    let bytes = kara::encoding::encode("@Title=歌\n[00:01.00]歌", "shift_jis").unwrap();
    let text = reformat_bytes(&bytes, "sjis").unwrap();
    assert_eq!(text, "@Title=歌\r\n[00:01.00]歌");

    let err = reformat_bytes(&bytes, "latin-9000").unwrap_err();
    assert!(matches!(err, KaraError::UnknownEncoding(_)));
}

#[test]
fn test_edited_ruby_splits_into_runs() {
    let mut doc = parse("@Ruby1=空,そら\n[00:01.00]空\n[00:03.00]空\n[00:05.00]空");
    doc.block_mut(1, 0).unwrap().ruby = Some(vec![RubySegment::new("から", None)]);

    let out = serialize(&doc);
    assert_eq!(
        out,
        "@Ruby1=空,そら\r\n[00:01.00]空\r\n[00:03.00]空\r\n[00:05.00]空\r\n\
@Ruby2=空,から,[00:03.00],[00:03.00]"
    );

    let again = parse(&out);
    let rubies: Vec<String> = (0..3)
        .map(|row| render_segments(again.block(row, 0).unwrap().ruby.as_ref().unwrap()))
        .collect();
    assert_eq!(rubies, vec!["そら", "から", "そら"]);
}

#[test]
fn test_navigator_boundaries() {
    let doc = parse("@Ruby1=愛,あい\n愛の\nla la");
    let mut cursor = Cursor::new(true);
    assert!(!cursor.left(&doc));
    assert_eq!(cursor.position(), CursorPosition::default());

    // Two segments: two rights to leave the block.
    assert!(cursor.right(&doc));
    assert_eq!(cursor.position(), CursorPosition::new(0, 0, 1));
    assert!(cursor.right(&doc));
    assert_eq!(cursor.position(), CursorPosition::new(0, 1, 0));

    let mut cursor = Cursor::new(false);
    cursor.set(&doc, 1, 2, 0);
    assert!(!cursor.right(&doc));
    assert_eq!(cursor.position(), CursorPosition::new(1, 2, 0));
}

#[test]
fn test_session_tagging_flow() {
    let source = kara::encoding::encode("@Ruby1=愛,あい\n愛してる\nla la", "shift_jis").unwrap();
    let config = EditorConfig::from_yaml("enable-ruby: true\nblink-interval-ms: 250").unwrap();
    let mut session = Session::new(config, ManualTimerHost::new());

    let positions = Rc::new(RefCell::new(Vec::new()));
    let p = positions.clone();
    session.on_did_change(move |pos| p.borrow_mut().push(*pos));

    session.load_document(&source, "shift_jis").unwrap();
    for seconds in [1.0, 1.25, 1.5, 2.0, 2.5] {
        session.execute(Command::Record(seconds)).unwrap();
    }
    assert_eq!(session.position(), CursorPosition::new(0, 4, 0));
    assert_eq!(
        session.execute("down".parse().unwrap()).unwrap(),
        CommandOutcome::Moved(true)
    );
    assert_eq!(positions.borrow().len(), 6);

    let bytes = session.export_document().unwrap();
    let text = kara::encoding::decode(&bytes, "shift_jis").unwrap();
    assert_eq!(
        text,
        "@Ruby1=愛,[00:00.00]あ[00:00.25]い\r\n[00:01.00]愛[00:01.50]し[00:02.00]て[00:02.50]る\r\nla la"
    );
}

#[test]
fn test_session_blink_follows_cursor() {
    let mut session = Session::new(EditorConfig::default(), ManualTimerHost::new());
    session.load_text("a b c");
    let frames = Rc::new(RefCell::new(Vec::new()));
    let f = frames.clone();
    session.on_render(move |frame| f.borrow_mut().push(*frame));

    session.run_script("wait 0.5\nright\nwait 0.25\n").unwrap();
    let frames = frames.borrow();
    let summary: Vec<(usize, bool)> = frames.iter().map(|f| (f.position.col, f.highlighted)).collect();
    assert_eq!(summary, vec![(0, false), (1, true)]);
}

#[test]
fn test_tag_with_config_file() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "encoding: utf-8\nadvance-on-record: false").unwrap();
    let config = EditorConfig::load(config.path()).unwrap();

    let mut session = Session::new(config, ManualTimerHost::new());
    session.load_text("one");
    session.run_script("record 3\nrecord 4").unwrap();
    assert_eq!(session.export_document().unwrap(), b"[00:04.00]one");
}

#[test]
fn test_malformed_lines_survive() {
    let source = "[00:01.00]ok\r\n[00:01.00]a [0a:00]b\r\n[1.00]no colon\r\n[00:02.00 unterminated";
    let doc = parse(source);
    assert_eq!(doc.row_count(), 1);
    assert_eq!(serialize(&doc), source);
}

fn time_tag() -> impl Strategy<Value = String> {
    (0u32..60, 0u32..60, 0u32..100).prop_map(|(m, s, c)| format!("[{:02}:{:02}.{:02}]", m, s, c))
}

fn lyric_line() -> impl Strategy<Value = String> {
    prop::collection::vec((prop::option::of(time_tag()), "[a-z あ愛]{0,6}"), 0..6).prop_map(|segments| {
        segments
            .into_iter()
            .map(|(tag, word)| format!("{}{}", tag.unwrap_or_default(), word))
            .collect()
    })
}

const READINGS: [&str; 3] = ["そら", "から", "くう"];

fn sky_directive() -> impl Strategy<Value = String> {
    (0..READINGS.len(), prop::option::of(time_tag()), prop::option::of(time_tag())).prop_map(|(r, start, end)| {
        format!("空,{},{},{}", READINGS[r], start.unwrap_or_default(), end.unwrap_or_default())
    })
}

fn sky_line() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::option::of(time_tag()), 1..4)
        .prop_map(|tags| tags.into_iter().map(|tag| format!("{}空", tag.unwrap_or_default())).collect())
}

fn rendered_ruby(doc: &kara::Document) -> Vec<Option<String>> {
    doc.rows()
        .flatten()
        .map(|block| block.ruby.as_deref().map(render_segments))
        .collect()
}

proptest! {
    #[test]
    fn prop_round_trip_preserves_ruby(
        directives in prop::collection::vec(sky_directive(), 0..4),
        lines in prop::collection::vec(sky_line(), 1..6),
        edit in any::<bool>(),
        timed_choices in prop::collection::vec(0..READINGS.len(), 8),
        untimed_choice in 0..READINGS.len(),
    ) {
        let mut source: Vec<String> = directives
            .iter()
            .enumerate()
            .map(|(i, def)| format!("@Ruby{}={}", i + 1, def))
            .collect();
        source.extend(lines);
        let mut doc = parse(&source.join("\n"));

        if edit {
            // Blocks at the same time share a reading, as do untimed blocks.
            for block in doc.rows_mut().flatten().filter(|b| b.word == "空") {
                let reading = match block.time {
                    Some(t) => READINGS[timed_choices[(t * 100.0).round() as usize % timed_choices.len()]],
                    None => READINGS[untimed_choice],
                };
                block.ruby = Some(vec![RubySegment::new(reading, None)]);
            }
        }

        let again = parse(&serialize(&doc));
        prop_assert_eq!(rendered_ruby(&doc), rendered_ruby(&again));
    }


    #[test]
    fn prop_round_trip_preserves_blocks(lines in prop::collection::vec(lyric_line(), 1..6)) {
        let source = lines.join("\n");
        let doc = parse(&source);
        let again = parse(&serialize(&doc));
        prop_assert_eq!(doc.data(), again.data());
        prop_assert_eq!(&doc.lines, &again.lines);
    }

    #[test]
    fn prop_ascii_words_concatenate_to_input(input in "[a-zA-Z0-9,.!?' ]{1,40}") {
        match tokenize(&input, 1, true).unwrap() {
            TextLine::Blocks(blocks) => {
                let joined: String = blocks.iter().map(|b| b.word.as_str()).collect();
                prop_assert_eq!(joined, input);
            }
            TextLine::Blank(text) => prop_assert!(text.trim().is_empty()),
            TextLine::Fragment(_) => prop_assert!(false, "no tags, no fragment"),
        }
    }
}
