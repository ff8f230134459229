use vtree_core::VNode;
use vtree_testing::prelude::*;

fn list(keys: &[&str]) -> VNode {
    VNode::element("ul").children(
        keys.iter()
            .map(|key| VNode::element("li").key(*key).text_content(*key)),
    )
}

fn patched(before: &[&str], after: &[&str]) -> RenderTestRule {
    let mut rule = RenderTestRule::new();
    rule.set_content(list(before)).expect("mount");
    rule.take_ops();
    rule.set_content(list(after)).expect("patch");
    rule
}

#[test]
fn identical_patch_touches_nothing() {
    let rule = patched(&["a", "b", "c"], &["a", "b", "c"]);
    assert!(rule.host().ops().is_empty(), "{:?}", rule.host().ops());
}

#[test]
fn reversing_moves_all_but_one() {
    let rule = patched(&["a", "b", "c", "d"], &["d", "c", "b", "a"]);
    assert_eq!(rule.html(), "<ul><li>d</li><li>c</li><li>b</li><li>a</li></ul>");
    assert_eq!(rule.host().count("move"), 3);
    assert_eq!(rule.host().count("create_element"), 0);
}

#[test]
fn swapping_the_ends_moves_two() {
    let rule = patched(&["a", "b", "c", "d", "e"], &["e", "b", "c", "d", "a"]);
    assert_eq!(
        rule.html(),
        "<ul><li>e</li><li>b</li><li>c</li><li>d</li><li>a</li></ul>"
    );
    assert_eq!(rule.host().count("move"), 2);
}

#[test]
fn rotating_the_last_to_the_front_moves_one() {
    let rule = patched(&["a", "b", "c", "d"], &["d", "a", "b", "c"]);
    assert_eq!(
        rule.html(),
        "<ul><li>d</li><li>a</li><li>b</li><li>c</li></ul>"
    );
    assert_eq!(rule.host().count("move"), 1);
    assert_eq!(rule.host().count("create_element"), 0);
    assert_eq!(rule.host().count("remove"), 0);
}

#[test]
fn appending_mounts_one_row() {
    let rule = patched(&["a", "b", "c"], &["a", "b", "c", "e"]);
    assert_eq!(
        rule.html(),
        "<ul><li>a</li><li>b</li><li>c</li><li>e</li></ul>"
    );
    assert_eq!(rule.host().count("create_element"), 1);
    assert_eq!(rule.host().count("move"), 0);
    assert_eq!(rule.host().count("remove"), 0);
}

#[test]
fn prepend_and_append_only_insert() {
    let rule = patched(&["b", "c"], &["a", "b", "c", "d"]);
    assert_eq!(
        rule.html(),
        "<ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>"
    );
    assert_eq!(rule.host().count("move"), 0);
    assert_eq!(rule.host().count("create_element"), 2);
}

#[test]
fn removing_from_the_middle_removes_one_node() {
    let rule = patched(&["a", "b", "c"], &["a", "c"]);
    assert_eq!(rule.html(), "<ul><li>a</li><li>c</li></ul>");
    let counts = rule.host().op_counts();
    assert_eq!(counts.get("remove"), Some(&1));
    assert_eq!(counts.len(), 1, "{counts:?}");
}

#[test]
fn unknown_keys_are_created_before_the_remaining_old_range() {
    let rule = patched(&["a", "b", "c"], &["a", "x", "c"]);
    assert_eq!(rule.html(), "<ul><li>a</li><li>x</li><li>c</li></ul>");
    assert_eq!(rule.host().count("create_element"), 1);
    assert_eq!(rule.host().count("remove"), 1);
    assert_eq!(rule.host().count("move"), 0);
}
