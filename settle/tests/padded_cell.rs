//! Convergence scenarios, driven through a real formatter and file bytes.

use std::path::Path;

use settle::core::padded_cell::{CellType, MAX_CYCLE, PaddedCell};
use settle::dirty::DirtyState;
use settle::formatter::Formatter;
use settle::step::Step;
use settle::test_support::{ROOT, fn_step, formatter_with};

fn single(step: impl Step + 'static) -> Formatter {
    formatter_with(vec![Box::new(step)])
}

fn cell(formatter: &Formatter, input: &str) -> PaddedCell {
    let file = Path::new(ROOT).join("a.txt");
    PaddedCell::check(&file, input, |text| formatter.compute(text, &file)).expect("no step failure")
}

fn dirty(formatter: &Formatter, input: &str) -> DirtyState {
    DirtyState::of(formatter, &Path::new(ROOT).join("a.txt"), input.as_bytes()).expect("dirty state")
}

#[test]
fn shrinking_step_converges_to_empty() {
    let formatter = single(fn_step("shrink", |text| {
        let mut chars = text.chars();
        chars.next_back();
        chars.as_str().to_string()
    }));
    let cell = cell(&formatter, "CCC");
    assert_eq!(cell.kind(), CellType::Converge);
    assert_eq!(cell.steps(), ["CC", "C", ""]);
    assert_eq!(cell.canonical(), "");
    assert_eq!(dirty(&formatter, "CCC"), DirtyState::Resolved(Vec::new()));
}

#[test]
fn ping_pong_step_cycles_and_resolves_to_smallest() {
    let formatter = single(fn_step("ping", |text| {
        (if text == "A" { "B" } else { "A" }).to_string()
    }));
    let cell = cell(&formatter, "CCC");
    assert_eq!(cell.kind(), CellType::Cycle);
    assert_eq!(cell.steps(), ["A", "B"]);
    assert_eq!(cell.canonical(), "A");

    assert_eq!(dirty(&formatter, "CCC"), DirtyState::Resolved(b"A".to_vec()));
    assert_eq!(dirty(&formatter, "A"), DirtyState::Clean);
    assert_eq!(dirty(&formatter, "B"), DirtyState::Resolved(b"A".to_vec()));
}

#[test]
fn growing_step_diverges_after_max_cycle() {
    let formatter = single(fn_step("grow", |text| format!("{text} ")));
    let cell = cell(&formatter, "");
    assert_eq!(cell.kind(), CellType::Diverge);
    assert_eq!(cell.steps().len(), MAX_CYCLE);
    assert_eq!(cell.steps().last().map(String::len), Some(MAX_CYCLE));
    assert!(cell.try_canonical().is_none());
    assert!(dirty(&formatter, "").did_not_converge());
}

#[test]
#[should_panic(expected = "diverged")]
fn diverging_cell_has_no_canonical_form() {
    let formatter = single(fn_step("grow", |text| format!("{text} ")));
    let _ = cell(&formatter, "").canonical();
}

#[test]
fn cycle_canonical_ignores_starting_point() {
    let formatter = single(fn_step("rotate", |text| match text {
        "A" => "B".to_string(),
        "B" => "C".to_string(),
        "C" => "D".to_string(),
        _ => "A".to_string(),
    }));
    for start in ["A", "B", "C", "D", "X"] {
        let cell = cell(&formatter, start);
        assert_eq!(cell.try_canonical(), Some("A"), "starting from {start}");
    }
}

#[test]
fn cycle_contains_no_duplicates() {
    let formatter = single(fn_step("rotate", |text| match text {
        "A" => "B".to_string(),
        "B" => "C".to_string(),
        _ => "A".to_string(),
    }));
    let cell = cell(&formatter, "lead-in");
    assert_eq!(cell.kind(), CellType::Cycle);
    let mut sorted = cell.steps().to_vec();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), cell.steps().len());
}
